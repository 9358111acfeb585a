//! Per-session output relay and exit watch.
//!
//! PTY reads are blocking, so each session gets a dedicated OS thread that
//! owns the read side of its PTY and publishes every chunk through the
//! session's sink. A second thread watches the shell process itself: a
//! background job can keep the PTY open after the shell is gone, so EOF alone
//! does not mean the session ended.
//!
//! Whichever of relay EOF, exit watch or `stop` removes the registry entry
//! first owns the teardown; the others just wind down.

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::output::Utf8Decoder;
use crate::registry::SessionRegistry;
use crate::session::PtySession;

/// How often the exit watch polls the shell.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long the relay gets to drain trailing output after the shell exits.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

pub(crate) fn start_relay(
    registry: Arc<SessionRegistry>,
    session: Arc<PtySession>,
    reader: Box<dyn Read + Send>,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("pty-relay-{}", session.id()))
        .spawn(move || relay_loop(registry, session, reader))?;
    Ok(())
}

pub(crate) fn start_exit_watch(
    registry: Arc<SessionRegistry>,
    session: Arc<PtySession>,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("pty-exit-{}", session.id()))
        .spawn(move || exit_watch_loop(registry, session))?;
    Ok(())
}

fn relay_loop(
    registry: Arc<SessionRegistry>,
    session: Arc<PtySession>,
    mut reader: Box<dyn Read + Send>,
) {
    let mut buf = [0u8; 65536];
    let mut decoder = Utf8Decoder::default();

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // EIO once the shell side closes.
            Err(_) => break,
        };

        let text = decoder.decode(&buf[..n]);
        if text.is_empty() {
            continue;
        }
        if !session.publish_output(text) {
            // Torn down elsewhere.
            return;
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        session.publish_output(tail);
    }
    finish_exited(&registry, &session);
}

fn exit_watch_loop(registry: Arc<SessionRegistry>, session: Arc<PtySession>) {
    let id = session.id();
    loop {
        if !registry.contains(id) {
            return;
        }
        if session.exit_code().is_some() {
            break;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }

    // Prefer the relay's EOF path so output written just before exit is
    // delivered ahead of the exit event.
    let deadline = Instant::now() + DRAIN_GRACE;
    while registry.contains(id) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    finish_exited(&registry, &session);
}

/// Drop a session whose shell ended by itself and report its exit code.
///
/// No-op unless this call is the one that removes the registry entry.
fn finish_exited(registry: &SessionRegistry, session: &PtySession) {
    let id = session.id();
    if registry.remove(id).is_none() {
        return;
    }
    let code = match session.terminate() {
        Ok(code) => Some(code),
        Err(e) => {
            log::warn!("session {id}: failed to reap shell: {e}");
            None
        }
    };
    log::info!("session {id}: shell exited with code {code:?}");
    if let Some(sink) = session.revoke_sink() {
        sink.exited(id, code);
    }
}
