use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::output::OutputSink;
use crate::pty::{PtyError, PtyHandle};

/// Opaque identifier for a terminal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an ID received from the UI. Returns `None` for anything that is
    /// not a well-formed UUID.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a live session, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
}

/// One interactive shell attached to its own PTY.
///
/// The working directory is fixed at creation. Input and resize go through
/// the PTY lock; output leaves through the session's sink, which `stop`
/// revokes so nothing is published for the session afterwards.
pub struct PtySession {
    id: SessionId,
    cwd: PathBuf,
    pty: Mutex<PtyHandle>,
    size: Mutex<(u16, u16)>,
    sink: Mutex<Option<OutputSink>>,
}

impl PtySession {
    pub(crate) fn new(
        id: SessionId,
        cwd: PathBuf,
        pty: PtyHandle,
        cols: u16,
        rows: u16,
        sink: OutputSink,
    ) -> Self {
        Self {
            id,
            cwd,
            pty: Mutex::new(pty),
            size: Mutex::new((cols, rows)),
            sink: Mutex::new(Some(sink)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Current terminal dimensions as `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        *lock(&self.size)
    }

    pub fn info(&self) -> SessionInfo {
        let (cols, rows) = self.size();
        SessionInfo {
            id: self.id,
            cwd: self.cwd.clone(),
            cols,
            rows,
        }
    }

    /// Forward bytes verbatim to the shell.
    ///
    /// A failure caused by the shell having already exited is absorbed: the
    /// session is on its way out and the relay will remove it.
    pub fn write_input(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut pty = lock(&self.pty);
        match pty.write(data) {
            Err(_) if !pty.is_alive() => Ok(()),
            other => other,
        }
    }

    /// Apply new dimensions to the PTY.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let mut pty = lock(&self.pty);
        match pty.resize(cols, rows) {
            Ok(()) => {}
            Err(_) if !pty.is_alive() => return Ok(()),
            Err(e) => return Err(e),
        }
        *lock(&self.size) = (cols, rows);
        Ok(())
    }

    /// Publish a chunk of shell output, unless the session has been stopped.
    ///
    /// Returns `false` once the sink is revoked so the relay can wind down.
    pub(crate) fn publish_output(&self, chunk: String) -> bool {
        let sink = lock(&self.sink);
        match sink.as_ref() {
            Some(sink) => {
                sink.data(self.id, chunk);
                true
            }
            None => false,
        }
    }

    /// Revoke the sink and hand it back, if it was still held.
    pub(crate) fn revoke_sink(&self) -> Option<OutputSink> {
        lock(&self.sink).take()
    }

    /// The shell's exit code once it has exited, `None` while it runs.
    pub(crate) fn exit_code(&self) -> Option<u32> {
        lock(&self.pty).try_wait()
    }

    /// Kill the shell (if still running) and reap it.
    pub(crate) fn terminate(&self) -> Result<u32, PtyError> {
        lock(&self.pty).kill()
    }
}

/// Lock a session mutex, recovering the data if a panicking thread poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}


#[cfg(all(test, unix))]
mod pty_tests {
    use super::*;
    use crate::output::OutputHub;

    fn session() -> (PtySession, tokio::sync::mpsc::UnboundedReceiver<crate::TerminalEvent>) {
        let hub = OutputHub::new();
        let rx = hub.subscribe();
        let pty = PtyHandle::spawn("/bin/sh", Path::new("/tmp"), "xterm-256color", 80, 24).unwrap();
        let session = PtySession::new(SessionId::new(), PathBuf::from("/tmp"), pty, 80, 24, hub.sink());
        (session, rx)
    }

    #[test]
    fn test_resize_updates_size() {
        let (session, _rx) = session();
        assert_eq!(session.size(), (80, 24));
        session.resize(120, 40).unwrap();
        assert_eq!(session.size(), (120, 40));
        assert_eq!(session.info().cols, 120);
        assert_eq!(session.info().rows, 40);
        assert_eq!(session.cwd(), Path::new("/tmp"));
    }

    #[test]
    fn test_publish_stops_after_revoke() {
        let (session, mut rx) = session();
        assert!(session.publish_output("one".to_string()));
        assert!(session.revoke_sink().is_some());
        assert!(!session.publish_output("two".to_string()));
        assert!(session.revoke_sink().is_none());

        match rx.try_recv().unwrap() {
            crate::TerminalEvent::Data { data, .. } => assert_eq!(data, "one"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
        session.terminate().unwrap();
    }
}
