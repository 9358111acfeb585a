use atlas_host::{CommandError, PickResult};

use crate::state::AppState;

/// Ask the user for a project root folder. Cancelling is not an error.
#[tauri::command]
pub async fn select_project_root(
    state: tauri::State<'_, AppState>,
) -> Result<PickResult, CommandError> {
    state.host.bus().pick_directory().await
}
