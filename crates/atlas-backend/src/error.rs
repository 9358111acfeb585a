use std::time::Duration;

/// Errors from supervising and talking to the backend service.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend did not become healthy in time. Fatal to launch.
    #[error("backend health check timed out after {}ms", timeout.as_millis())]
    StartupTimeout { timeout: Duration },

    /// The backend executable could not be launched.
    #[error("failed to launch backend `{program}`: {source}")]
    ProcessSpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A logical project id did not resolve to a root directory.
    #[error("project {project_id} not found: {reason}")]
    UnknownProject { project_id: String, reason: String },

    #[error("invalid backend URL {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;
