//! Top-level orchestrator: owns the backend supervisor and the command bus.

use std::sync::Arc;

use atlas_backend::{BackendClient, BackendConfig, BackendError, BackendSupervisor};
use atlas_pty::{Multiplexer, MultiplexerConfig};

use crate::bus::CommandBus;
use crate::dialog::DirectoryPicker;

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub backend: BackendConfig,
    pub terminals: MultiplexerConfig,
}

pub struct Host {
    supervisor: BackendSupervisor,
    bus: CommandBus,
}

impl Host {
    /// Bring the backend up and wire the command bus.
    ///
    /// Returns only once the backend is healthy. On failure any backend we
    /// spawned is terminated and the caller should abort startup.
    pub async fn launch(
        config: HostConfig,
        picker: Arc<dyn DirectoryPicker>,
    ) -> Result<Self, BackendError> {
        let supervisor = BackendSupervisor::new(config.backend.clone())?;
        if let Err(e) = supervisor.start().await {
            log::error!("Backend failed to start: {e}");
            supervisor.terminate().await;
            return Err(e);
        }

        let client = BackendClient::from_config(&config.backend)?;
        let terminals = Arc::new(Multiplexer::with_config(config.terminals));
        let bus = CommandBus::new(Arc::new(client), picker, terminals);
        Ok(Self { supervisor, bus })
    }

    pub fn bus(&self) -> &CommandBus {
        &self.bus
    }

    pub fn supervisor(&self) -> &BackendSupervisor {
        &self.supervisor
    }

    /// Stop every session, then the backend.
    pub async fn shutdown(&self) {
        let terminals = Arc::clone(self.bus.terminals());
        let count = terminals.list().len();
        if let Err(e) = tokio::task::spawn_blocking(move || terminals.stop_all()).await {
            log::warn!("Failed to stop terminal sessions: {e}");
        }
        log::info!("Stopped {count} terminal session(s)");
        self.supervisor.terminate().await;
    }
}
