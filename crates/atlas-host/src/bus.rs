//! The command bus: the closed set of privileged operations the UI may call.
//!
//! Request/response operations return [`Result`] and never panic across the
//! boundary. Fire-and-forget operations are queued onto a one-way channel
//! drained by a background task and have no result at all.

use std::path::PathBuf;
use std::sync::Arc;

use atlas_backend::ProjectResolver;
use atlas_pty::{Multiplexer, SessionId, TerminalEvent};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::dialog::{DirectoryPicker, PickResult};
use crate::error::{CommandError, Result};
use crate::files::{self, DirEntry};
use crate::paths;

/// Messages accepted by the one-way queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneWay {
    StopSession(SessionId),
}

/// Response of `start_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub terminal_id: SessionId,
}

pub struct CommandBus {
    resolver: Arc<dyn ProjectResolver>,
    picker: Arc<dyn DirectoryPicker>,
    terminals: Arc<Multiplexer>,
    one_way: mpsc::UnboundedSender<OneWay>,
}

impl CommandBus {
    /// Build the bus and start its one-way worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        resolver: Arc<dyn ProjectResolver>,
        picker: Arc<dyn DirectoryPicker>,
        terminals: Arc<Multiplexer>,
    ) -> Self {
        let (one_way, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_one_way(Arc::clone(&terminals), rx));
        Self {
            resolver,
            picker,
            terminals,
            one_way,
        }
    }

    pub fn terminals(&self) -> &Arc<Multiplexer> {
        &self.terminals
    }

    pub async fn pick_directory(&self) -> Result<PickResult> {
        self.picker.pick_directory().await
    }

    pub async fn list_dir(&self, project_id: &str, relative: &str) -> Result<Vec<DirEntry>> {
        let path = self.project_path(project_id, relative).await?;
        files::list_dir(&path).await
    }

    pub async fn read_file(&self, project_id: &str, relative: &str) -> Result<String> {
        let path = self.project_path(project_id, relative).await?;
        files::read_file(&path).await
    }

    pub async fn write_file(&self, project_id: &str, relative: &str, contents: &str) -> Result<()> {
        let path = self.project_path(project_id, relative).await?;
        files::write_file(&path, contents).await
    }

    /// Start a shell rooted at the project's directory.
    pub async fn start_session(&self, project_id: &str) -> Result<StartedSession> {
        let root = self.resolver.resolve_root(project_id).await?;
        let terminals = Arc::clone(&self.terminals);
        let terminal_id = tokio::task::spawn_blocking(move || terminals.start(&root)).await??;
        Ok(StartedSession { terminal_id })
    }

    /// Forward text to a session's shell. Unknown sessions are ignored.
    ///
    /// Runs inline so that writes land in the order they were received.
    pub fn send_input(&self, id: SessionId, data: &str) -> Result<()> {
        self.terminals.write(id, data.as_bytes())?;
        Ok(())
    }

    pub fn resize_session(&self, id: SessionId, cols: u16, rows: u16) -> Result<()> {
        if cols == 0 || rows == 0 {
            return Err(CommandError::InvalidInput(format!(
                "terminal size must be non-zero, got {cols}x{rows}"
            )));
        }
        self.terminals.resize(id, cols, rows)?;
        Ok(())
    }

    /// Queue a stop. Accepted for processing; nothing is reported back.
    pub fn stop_session(&self, id: SessionId) {
        if self.one_way.send(OneWay::StopSession(id)).is_err() {
            log::debug!("one-way queue closed, dropping stop for session {id}");
        }
    }

    /// Attach the UI's single output stream, replacing any previous one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TerminalEvent> {
        self.terminals.subscribe()
    }

    /// Resolve `project_id` and confine `relative` to its root.
    ///
    /// The path is validated before the backend is asked, and nothing touches
    /// the filesystem unless both steps succeed.
    async fn project_path(&self, project_id: &str, relative: &str) -> Result<PathBuf> {
        paths::validate_relative(relative)?;
        let root = self.resolver.resolve_root(project_id).await?;
        paths::join_relative(&root, relative)
    }
}

async fn run_one_way(terminals: Arc<Multiplexer>, mut rx: mpsc::UnboundedReceiver<OneWay>) {
    while let Some(message) = rx.recv().await {
        match message {
            OneWay::StopSession(id) => {
                let terminals = Arc::clone(&terminals);
                match tokio::task::spawn_blocking(move || terminals.stop(id)).await {
                    Ok(true) => {}
                    Ok(false) => log::debug!("stop for unknown session {id} ignored"),
                    Err(e) => log::warn!("stopping session {id} failed: {e}"),
                }
            }
        }
    }
}
