//! Lifecycle of the out-of-process backend service.
//!
//! At most one backend child exists per supervisor. `ensure_running` holds
//! the slot lock across probe-and-spawn, so two near-simultaneous first
//! starts cannot both launch a process.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

/// How long a terminated backend gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What `ensure_running` found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The health endpoint already answered; nothing was spawned.
    AlreadyRunning,
    /// A child we launched earlier is still alive but not yet healthy.
    AlreadySpawned,
    /// A new backend process was launched.
    Spawned { pid: Option<u32> },
}

struct BackendProcess {
    pid: Option<u32>,
    shutdown: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
}

pub struct BackendSupervisor {
    config: BackendConfig,
    http: reqwest::Client,
    slot: Mutex<Option<BackendProcess>>,
}

impl BackendSupervisor {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            slot: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Make sure a backend is running, launching one only if needed.
    ///
    /// Does not wait for readiness; see [`BackendSupervisor::await_healthy`].
    pub async fn ensure_running(&self) -> Result<StartOutcome> {
        let mut slot = self.slot.lock().await;

        if self.probe(&self.config.health_url()).await {
            log::info!("Backend already running, skipping spawn");
            return Ok(StartOutcome::AlreadyRunning);
        }

        match slot.as_ref() {
            Some(process) if !process.monitor.is_finished() => {
                return Ok(StartOutcome::AlreadySpawned);
            }
            Some(_) => {
                log::info!("Previous backend process has exited, launching a new one");
                *slot = None;
            }
            None => {}
        }

        let process = self.spawn()?;
        let pid = process.pid;
        *slot = Some(process);
        Ok(StartOutcome::Spawned { pid })
    }

    /// Poll `url` every `poll_interval` until it answers with success.
    ///
    /// Connection errors and non-success statuses mean "not ready yet"; only
    /// running out of time is an error.
    pub async fn await_healthy(&self, url: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.probe(url).await {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                log::error!("Backend health check timed out after {timeout:?}");
                return Err(BackendError::StartupTimeout { timeout });
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// `ensure_running` followed by a readiness wait bounded by the
    /// configured startup timeout. This is the launch gate for the UI.
    pub async fn start(&self) -> Result<StartOutcome> {
        let outcome = self.ensure_running().await?;
        self.await_healthy(&self.config.health_url(), self.config.startup_timeout)
            .await?;
        log::info!("Backend ready");
        Ok(outcome)
    }

    /// Ask the backend to shut down and forget it. Idempotent.
    pub async fn terminate(&self) {
        let Some(mut process) = self.slot.lock().await.take() else {
            return;
        };
        log::info!("Stopping backend (pid {:?})", process.pid);
        if let Some(shutdown) = process.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(SHUTDOWN_GRACE + Duration::from_secs(1), process.monitor)
            .await
            .is_err()
        {
            log::warn!("Backend monitor did not finish in time");
        }
    }

    /// Whether the slot holds a child that has not exited.
    pub async fn has_live_process(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.monitor.is_finished())
    }

    /// One health probe. Any transport error counts as "not healthy".
    pub async fn probe(&self, url: &str) -> bool {
        match self.http.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("Health probe to {url} failed: {e}");
                false
            }
        }
    }

    fn spawn(&self) -> Result<BackendProcess> {
        let program = self.config.interpreter.display().to_string();
        log::info!("Spawning backend: {program} {}", self.config.args.join(" "));

        let mut child = Command::new(&self.config.interpreter)
            .args(&self.config.args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::ProcessSpawnFailure { program, source })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, log::Level::Info));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, log::Level::Warn));
        }

        let pid = child.id();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor(child, shutdown_rx));

        Ok(BackendProcess {
            pid,
            shutdown: Some(shutdown_tx),
            monitor,
        })
    }
}

/// Forward a child's output stream to the host log, line by line.
///
/// Keeps draining until EOF whatever the bytes are, so the child never
/// writes into a closed pipe.
async fn forward_lines<R>(stream: R, level: log::Level)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                log::log!(level, "[backend] {}", text.trim_end_matches(&['\r', '\n'][..]));
            }
            Err(e) => {
                log::warn!("Lost backend output stream: {e}");
                break;
            }
        }
    }
}

/// Observe the child until it exits or a shutdown is requested.
///
/// An unexpected exit is logged and left alone; restarting is up to the
/// next explicit `ensure_running`.
async fn monitor(mut child: Child, shutdown: oneshot::Receiver<()>) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => log::warn!("Backend exited with {status}"),
            Err(e) => log::error!("Failed to wait for backend: {e}"),
        },
        _ = shutdown => {
            request_shutdown(&mut child);
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => log::info!("Backend exited with {status}"),
                Ok(Err(e)) => log::error!("Failed to wait for backend: {e}"),
                Err(_) => {
                    log::warn!("Backend ignored SIGTERM, killing it");
                    let _ = child.kill().await;
                }
            }
        }
    }
}

#[cfg(unix)]
fn request_shutdown(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain signal delivery to a pid we spawned and have not reaped.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn request_shutdown(child: &mut Child) {
    let _ = child.start_kill();
}
