use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::output::{OutputHub, TerminalEvent};
use crate::pty::{default_shell, PtyError, PtyHandle};
use crate::registry::SessionRegistry;
use crate::relay::{start_exit_watch, start_relay};
use crate::session::{PtySession, SessionId, SessionInfo};

/// Configuration for new sessions.
#[derive(Debug, Clone)]
pub struct MultiplexerConfig {
    /// Initial terminal columns
    pub cols: u16,
    /// Initial terminal rows
    pub rows: u16,
    /// Shell to launch; the platform default when `None`
    pub shell: Option<String>,
    /// Value exported as `TERM`
    pub term: String,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            shell: None,
            term: "xterm-256color".to_string(),
        }
    }
}

/// Creates, addresses, feeds and destroys concurrent terminal sessions.
///
/// Every session's output is fanned into one [`TerminalEvent`] stream; see
/// [`Multiplexer::subscribe`]. Write, resize and stop on an unknown ID are
/// silent no-ops, since either side may tear a session down at any time.
pub struct Multiplexer {
    registry: Arc<SessionRegistry>,
    hub: OutputHub,
    config: MultiplexerConfig,
}

impl Multiplexer {
    /// Create a new, empty multiplexer.
    pub fn new() -> Self {
        Self::with_config(MultiplexerConfig::default())
    }

    pub fn with_config(config: MultiplexerConfig) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            hub: OutputHub::new(),
            config,
        }
    }

    /// Attach the single output subscriber, replacing any previous one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TerminalEvent> {
        self.hub.subscribe()
    }

    /// Start a shell in `cwd` and return its session ID.
    ///
    /// The output relay runs independently once this returns.
    pub fn start(&self, cwd: &Path) -> Result<SessionId, PtyError> {
        let shell = self.config.shell.clone().unwrap_or_else(default_shell);
        let (cols, rows) = (self.config.cols, self.config.rows);
        let id = self.registry.allocate_id();

        let mut pty = match PtyHandle::spawn(&shell, cwd, &self.config.term, cols, rows) {
            Ok(pty) => pty,
            Err(e) => {
                self.registry.release(id);
                return Err(e);
            }
        };
        let Some(reader) = pty.take_reader() else {
            self.registry.release(id);
            return Err(PtyError::SpawnFailed("PTY reader unavailable".to_string()));
        };

        let session = Arc::new(PtySession::new(
            id,
            cwd.to_path_buf(),
            pty,
            cols,
            rows,
            self.hub.sink(),
        ));
        self.registry.insert(Arc::clone(&session));
        let watching = start_relay(Arc::clone(&self.registry), Arc::clone(&session), reader)
            .and_then(|()| start_exit_watch(Arc::clone(&self.registry), session));
        if let Err(e) = watching {
            self.stop(id);
            return Err(PtyError::Io(e));
        }

        log::info!("session {id}: started {shell} in {}", cwd.display());
        Ok(id)
    }

    /// Forward input to a session's shell. No-op if the session is gone.
    pub fn write(&self, id: SessionId, data: &[u8]) -> Result<(), PtyError> {
        match self.registry.get(id) {
            Some(session) => session.write_input(data),
            None => Ok(()),
        }
    }

    /// Apply new dimensions to a session's PTY. No-op if the session is gone.
    pub fn resize(&self, id: SessionId, cols: u16, rows: u16) -> Result<(), PtyError> {
        match self.registry.get(id) {
            Some(session) => session.resize(cols, rows),
            None => Ok(()),
        }
    }

    /// Terminate a session's shell and drop it from the registry.
    ///
    /// Returns `false` if there was nothing to stop. Once this returns no
    /// further events are published for `id`.
    pub fn stop(&self, id: SessionId) -> bool {
        let Some(session) = self.registry.remove(id) else {
            return false;
        };
        session.revoke_sink();
        match session.terminate() {
            Ok(code) => log::info!("session {id}: stopped (exit code {code})"),
            Err(e) => log::warn!("session {id}: failed to terminate shell: {e}"),
        }
        true
    }

    /// Stop every live session.
    pub fn stop_all(&self) {
        for id in self.registry.ids() {
            self.stop(id);
        }
    }

    /// Snapshots of the live sessions, sorted by ID.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.registry.list()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.registry.contains(id)
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn mux() -> Multiplexer {
        Multiplexer::with_config(MultiplexerConfig {
            shell: Some("/bin/sh".to_string()),
            ..MultiplexerConfig::default()
        })
    }

    /// Collect events for `id` until one contains `needle`.
    async fn wait_for_output(
        rx: &mut mpsc::UnboundedReceiver<TerminalEvent>,
        id: SessionId,
        needle: &str,
    ) -> String {
        let mut seen = String::new();
        let result = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = rx.recv().await {
                if let TerminalEvent::Data { terminal_id, data } = event {
                    if terminal_id == id {
                        seen.push_str(&data);
                        if seen.contains(needle) {
                            return;
                        }
                    }
                }
            }
        })
        .await;
        assert!(result.is_ok(), "timed out waiting for {needle:?}, got: {seen:?}");
        seen
    }

    #[tokio::test]
    async fn test_start_write_observe_stop() {
        let mux = mux();
        let mut rx = mux.subscribe();

        let id = mux.start(Path::new("/tmp")).unwrap();
        assert!(mux.contains(id));

        mux.write(id, b"echo hi$((1+1))\n").unwrap();
        wait_for_output(&mut rx, id, "hi2").await;

        assert!(mux.stop(id));
        assert!(!mux.contains(id));
        assert!(mux.list().is_empty());
        // Whatever is queued now was published before stop returned.
        while rx.try_recv().is_ok() {}

        // After stop: silent no-ops and no more events for the session.
        mux.write(id, b"echo again\n").unwrap();
        mux.resize(id, 100, 30).unwrap();
        assert!(!mux.stop(id));

        tokio::time::sleep(Duration::from_millis(300)).await;
        while let Ok(event) = rx.try_recv() {
            assert_ne!(event.terminal_id(), id, "event after stop: {event:?}");
        }
        // The exit watch must not report a shell that was stopped.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let mux = mux();
        let ids: Vec<SessionId> = (0..5).map(|_| mux.start(Path::new("/tmp")).unwrap()).collect();
        let unique: HashSet<SessionId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());

        let mut listed: Vec<SessionId> = mux.list().into_iter().map(|s| s.id).collect();
        let mut expected = ids.clone();
        listed.sort();
        expected.sort();
        assert_eq!(listed, expected);
        mux.stop_all();
        assert!(mux.list().is_empty());
    }

    #[test]
    fn test_unknown_session_operations_are_noops() {
        let mux = mux();
        let ghost = SessionId::new();
        assert!(mux.write(ghost, b"ls\n").is_ok());
        assert!(mux.resize(ghost, 120, 40).is_ok());
        assert!(!mux.stop(ghost));
        assert!(mux.list().is_empty());
    }

    #[test]
    fn test_resize_applies_dimensions() {
        let mux = mux();
        let id = mux.start(Path::new("/tmp")).unwrap();
        assert_eq!((mux.list()[0].cols, mux.list()[0].rows), (80, 24));
        mux.resize(id, 120, 40).unwrap();
        let info = &mux.list()[0];
        assert_eq!((info.cols, info.rows), (120, 40));
        assert_eq!(info.cwd, Path::new("/tmp"));
    }

    #[test]
    fn test_start_with_missing_shell_fails_cleanly() {
        let mux = Multiplexer::with_config(MultiplexerConfig {
            shell: Some("/definitely/not/a/shell".to_string()),
            ..MultiplexerConfig::default()
        });
        assert!(mux.start(Path::new("/tmp")).is_err());
        assert!(mux.list().is_empty());
    }

    #[tokio::test]
    async fn test_shell_exit_removes_session_and_reports_code() {
        let mux = mux();
        let mut rx = mux.subscribe();
        let id = mux.start(Path::new("/tmp")).unwrap();
        mux.write(id, b"exit 7\n").unwrap();

        let code = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(TerminalEvent::Exited { terminal_id, code }) if terminal_id == id => {
                        return code;
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await
        .expect("no exit event");

        assert_eq!(code, Some(7));
        assert!(!mux.contains(id));
        // Stop after a natural exit is a no-op.
        assert!(!mux.stop(id));
    }

    #[tokio::test]
    async fn test_shell_exit_detected_while_background_job_holds_pty() {
        let mux = mux();
        let mut rx = mux.subscribe();
        let id = mux.start(Path::new("/tmp")).unwrap();
        // The backgrounded sleep keeps the PTY open well past the shell's exit.
        mux.write(id, b"sleep 3 & exit 5\n").unwrap();

        let code = tokio::time::timeout(Duration::from_millis(1500), async {
            loop {
                match rx.recv().await {
                    Some(TerminalEvent::Exited { terminal_id, code }) if terminal_id == id => {
                        return code;
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await
        .expect("exit not reported while the background job was running");

        assert_eq!(code, Some(5));
        assert!(!mux.contains(id));
        assert!(mux.list().is_empty());
    }

    #[tokio::test]
    async fn test_output_before_exit_precedes_exit_event() {
        let mux = mux();
        let mut rx = mux.subscribe();
        let id = mux.start(Path::new("/tmp")).unwrap();
        mux.write(id, b"echo BYE_$((6*7)); exit 0\n").unwrap();

        let mut seen = String::new();
        let code = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(TerminalEvent::Data { terminal_id, data }) if terminal_id == id => {
                        seen.push_str(&data)
                    }
                    Some(TerminalEvent::Exited { terminal_id, code }) if terminal_id == id => {
                        return code;
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await
        .expect("no exit event");

        assert_eq!(code, Some(0));
        assert!(seen.contains("BYE_42"), "output lost: {seen:?}");
    }

    #[tokio::test]
    async fn test_interleaved_sessions_keep_their_own_order() {
        let mux = mux();
        let mut rx = mux.subscribe();
        let a = mux.start(Path::new("/tmp")).unwrap();
        let b = mux.start(Path::new("/tmp")).unwrap();

        mux.write(a, b"for i in 1 2 3 4 5; do echo A$i; done; echo A_$((9*9))\n").unwrap();
        mux.write(b, b"for i in 1 2 3 4 5; do echo B$i; done; echo B_$((9*9))\n").unwrap();

        let mut out_a = String::new();
        let mut out_b = String::new();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !(out_a.contains("A_81") && out_b.contains("B_81")) {
                match rx.recv().await {
                    Some(TerminalEvent::Data { terminal_id, data }) if terminal_id == a => {
                        out_a.push_str(&data)
                    }
                    Some(TerminalEvent::Data { terminal_id, data }) if terminal_id == b => {
                        out_b.push_str(&data)
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        })
        .await
        .expect("timed out");

        for (out, tag) in [(&out_a, 'A'), (&out_b, 'B')] {
            let positions: Vec<usize> = (1..=5)
                .map(|i| out.find(&format!("{tag}{i}\r\n")).expect("missing line"))
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]), "reordered: {out:?}");
        }
    }

    #[tokio::test]
    async fn test_resize_racing_stop_never_errors() {
        let mux = Arc::new(mux());
        let id = mux.start(Path::new("/tmp")).unwrap();

        let stopper = {
            let mux = Arc::clone(&mux);
            std::thread::spawn(move || mux.stop(id))
        };
        for _ in 0..50 {
            assert!(mux.resize(id, 120, 40).is_ok());
            assert!(mux.write(id, b"\n").is_ok());
        }
        stopper.join().unwrap();
        assert!(mux.resize(id, 120, 40).is_ok());
        assert!(!mux.contains(id));
    }
}
