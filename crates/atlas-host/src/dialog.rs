use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Outcome of a directory pick. Cancelling is a normal result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PickResult {
    Selected { path: PathBuf },
    Cancelled,
}

/// Native folder picker, provided by the windowing layer.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    async fn pick_directory(&self) -> Result<PickResult>;
}
