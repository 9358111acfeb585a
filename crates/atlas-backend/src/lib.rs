//! atlas-backend: supervision of the local backend service and the HTTP
//! client used to resolve projects through it.

pub mod config;
pub mod error;
pub mod projects;
pub mod supervisor;

pub use config::{BackendConfig, BuildMode};
pub use error::{BackendError, Result};
pub use projects::{BackendClient, Project, ProjectResolver};
pub use supervisor::{BackendSupervisor, StartOutcome};
