//! Launch configuration for the supervised backend service.
//!
//! The execution target is picked by build mode only; nothing here is
//! user-configurable at runtime.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the compiled-in build mode.
pub const BUILD_MODE_ENV: &str = "ATLAS_ENV";

/// Fixed local port the backend listens on.
pub const DEFAULT_PORT: u16 = 4100;

/// Entry script inside the backend directory.
pub const ENTRY_SCRIPT: &str = "uvicorn_entry.py";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// `ATLAS_ENV=development|production` wins; otherwise debug builds are
    /// development builds.
    pub fn detect() -> Self {
        std::env::var(BUILD_MODE_ENV)
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or(if cfg!(debug_assertions) {
                BuildMode::Development
            } else {
                BuildMode::Production
            })
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(BuildMode::Development),
            "production" | "prod" => Some(BuildMode::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    /// Path of the readiness endpoint, e.g. `/health`
    pub health_path: String,
    /// Interpreter used to run the entry script
    pub interpreter: PathBuf,
    /// Arguments passed to the interpreter
    pub args: Vec<String>,
    /// Working directory of the backend process
    pub working_dir: PathBuf,
    /// How long `start` waits for the backend to become healthy
    pub startup_timeout: Duration,
    /// Delay between health probes
    pub poll_interval: Duration,
    /// Upper bound for one health probe
    pub probe_timeout: Duration,
}

impl BackendConfig {
    /// Resolve the execution target for `mode`.
    ///
    /// Development runs `<app_root>/backend` with its virtualenv python;
    /// production runs the bundled `<resources_dir>/backend` with `python3`.
    pub fn for_mode(mode: BuildMode, app_root: &Path, resources_dir: &Path) -> Self {
        let (working_dir, interpreter) = match mode {
            BuildMode::Development => {
                let dir = app_root.join("backend");
                let python = dir.join("venv").join("bin").join("python");
                (dir, python)
            }
            BuildMode::Production => (resources_dir.join("backend"), PathBuf::from("python3")),
        };
        let entry = working_dir.join(ENTRY_SCRIPT);

        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            health_path: "/health".to_string(),
            interpreter,
            args: vec![
                entry.to_string_lossy().into_owned(),
                "--port".to_string(),
                DEFAULT_PORT.to_string(),
            ],
            working_dir,
            startup_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(2),
        }
    }

    /// Base URL of the backend, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url(), self.health_path)
    }
}
