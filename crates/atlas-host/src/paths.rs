//! Confinement of UI-supplied relative paths to a project root.

use std::path::{Component, Path, PathBuf};

use crate::error::{CommandError, Result};

/// Join `relative` onto `root`, refusing anything that could leave it.
///
/// Absolute paths, drive prefixes and `..` components are rejected. An
/// empty path or `.` addresses the root itself.
pub fn join_relative(root: &Path, relative: &str) -> Result<PathBuf> {
    validate_relative(relative)?;
    let mut joined = root.to_path_buf();
    for component in Path::new(relative).components() {
        if let Component::Normal(part) = component {
            joined.push(part);
        }
    }
    Ok(joined)
}

/// Check a relative path without touching the filesystem.
pub fn validate_relative(relative: &str) -> Result<()> {
    if relative.contains('\0') {
        return Err(CommandError::InvalidInput("path contains a NUL byte".to_string()));
    }
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(CommandError::InvalidInput(format!(
                    "path {relative:?} escapes the project root"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(CommandError::InvalidInput(format!(
                    "path {relative:?} must be relative to the project root"
                )));
            }
        }
    }
    Ok(())
}
