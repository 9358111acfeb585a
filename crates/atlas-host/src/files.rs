//! File operations behind the dev file commands.

use std::path::Path;

use serde::Serialize;

use crate::error::{CommandError, Result};

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
}

/// List `dir`, sorted by name. Symlinks are reported as non-directories.
pub async fn list_dir(dir: &Path) -> Result<Vec<DirEntry>> {
    let context = || format!("failed to list {}", dir.display());
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CommandError::io(context(), e))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| CommandError::io(context(), e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| CommandError::io(context(), e))?;
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: file_type.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

pub async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CommandError::io(format!("failed to read {}", path.display()), e))
}

/// Replace the contents of `path`. Parent directories are not created.
pub async fn write_file(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| CommandError::io(format!("failed to write {}", path.display()), e))
}
