//! Application state managed by Tauri.

use atlas_host::Host;

pub struct AppState {
    /// Orchestrator owning the backend supervisor and the command bus.
    pub host: Host,
}

impl AppState {
    pub fn new(host: Host) -> Self {
        Self { host }
    }
}
