//! Folder picker backed by the native dialog plugin.

use async_trait::async_trait;
use atlas_host::{CommandError, DirectoryPicker, PickResult};
use tauri::AppHandle;
use tauri_plugin_dialog::DialogExt;
use tokio::sync::oneshot;

pub struct NativePicker {
    app: AppHandle,
}

impl NativePicker {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

#[async_trait]
impl DirectoryPicker for NativePicker {
    async fn pick_directory(&self) -> atlas_host::Result<PickResult> {
        let (tx, rx) = oneshot::channel();
        self.app
            .dialog()
            .file()
            .set_title("Select project root")
            .pick_folder(move |folder| {
                let _ = tx.send(folder);
            });

        let folder = rx
            .await
            .map_err(|_| CommandError::Internal("folder dialog closed without a result".to_string()))?;
        match folder {
            None => Ok(PickResult::Cancelled),
            Some(folder) => folder
                .into_path()
                .map(|path| PickResult::Selected { path })
                .map_err(|e| CommandError::Internal(format!("unusable folder selection: {e}"))),
        }
    }
}
