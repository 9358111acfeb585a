//! Tauri commands for browsing and editing files inside a project.
//!
//! Paths are relative to the project's root, which the backend resolves
//! from `project_id` on every call.

use atlas_host::{CommandError, DirEntry};

use crate::state::AppState;

#[tauri::command]
pub async fn dev_read_dir(
    state: tauri::State<'_, AppState>,
    project_id: String,
    rel_path: String,
) -> Result<Vec<DirEntry>, CommandError> {
    state.host.bus().list_dir(&project_id, &rel_path).await
}

#[tauri::command]
pub async fn dev_read_file(
    state: tauri::State<'_, AppState>,
    project_id: String,
    file_path: String,
) -> Result<String, CommandError> {
    state.host.bus().read_file(&project_id, &file_path).await
}

#[tauri::command]
pub async fn dev_write_file(
    state: tauri::State<'_, AppState>,
    project_id: String,
    file_path: String,
    content: String,
) -> Result<(), CommandError> {
    state
        .host
        .bus()
        .write_file(&project_id, &file_path, &content)
        .await
}
