use std::io;

use atlas_backend::BackendError;
use atlas_pty::PtyError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Failure of a request/response command, as seen by the UI.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown project {project_id}: {reason}")]
    UnknownProject { project_id: String, reason: String },

    #[error("{context}: {source}")]
    IoFailure {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch process: {0}")]
    ProcessSpawnFailure(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        CommandError::IoFailure {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::UnknownProject { .. } => "unknown_project",
            CommandError::IoFailure { .. } => "io_failure",
            CommandError::ProcessSpawnFailure(_) => "process_spawn_failure",
            CommandError::InvalidInput(_) => "invalid_input",
            CommandError::Internal(_) => "internal",
        }
    }
}

/// Serialized as `{ "kind": ..., "message": ... }` for the UI.
impl Serialize for CommandError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("CommandError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

impl From<BackendError> for CommandError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::UnknownProject { project_id, reason } => {
                CommandError::UnknownProject { project_id, reason }
            }
            e @ BackendError::ProcessSpawnFailure { .. } => {
                CommandError::ProcessSpawnFailure(e.to_string())
            }
            other => CommandError::Internal(other.to_string()),
        }
    }
}

impl From<PtyError> for CommandError {
    fn from(e: PtyError) -> Self {
        match e {
            PtyError::SpawnFailed(msg) => CommandError::ProcessSpawnFailure(msg),
            PtyError::Io(source) => CommandError::io("terminal I/O failed", source),
            PtyError::ResizeFailed(msg) => {
                CommandError::io("terminal resize failed", io::Error::other(msg))
            }
        }
    }
}

impl From<tokio::task::JoinError> for CommandError {
    fn from(e: tokio::task::JoinError) -> Self {
        CommandError::Internal(format!("background task failed: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
