use std::io::{Read, Write};
use std::path::Path;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

/// Errors from PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("PTY spawn failed: {0}")]
    SpawnFailed(String),
    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PTY resize failed: {0}")]
    ResizeFailed(String),
}

/// Owns a portable-pty child process and the master side of its terminal.
///
/// The reader is handed out once via [`PtyHandle::take_reader`] so a relay
/// thread can block on it without holding any lock over the handle.
pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    exit_code: Option<u32>,
}

impl PtyHandle {
    /// Spawn `shell` attached to a new PTY of the given size, running in `cwd`.
    ///
    /// The child inherits the host environment; `term` is exported as `TERM`.
    pub fn spawn(
        shell: &str,
        cwd: &Path,
        term: &str,
        cols: u16,
        rows: u16,
    ) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(size(cols, rows))
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(cwd);
        cmd.env("TERM", term);

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn {shell}: {e}")))?;
        // Only the child keeps the slave open, so the reader sees EOF when it exits.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone reader: {e}")))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take writer: {e}")))?;

        Ok(Self {
            master: pair.master,
            reader: Some(reader),
            writer,
            child,
            exit_code: None,
        })
    }

    /// Resize the PTY to new dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(size(cols, rows))
            .map_err(|e| PtyError::ResizeFailed(format!("{e}")))
    }

    /// Write bytes to the PTY master (user input -> shell).
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Hand out the blocking PTY reader. Returns `None` once taken.
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    /// Get the child exit code if it has exited, `None` while it is running.
    pub fn try_wait(&mut self) -> Option<u32> {
        if self.exit_code.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit_code = Some(status.exit_code());
            }
        }
        self.exit_code
    }

    /// Check if the child process is still alive.
    pub fn is_alive(&mut self) -> bool {
        self.try_wait().is_none()
    }

    /// Block until the child exits and return its exit code.
    pub fn wait(&mut self) -> Result<u32, PtyError> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        let status = self.child.wait()?;
        self.exit_code = Some(status.exit_code());
        Ok(status.exit_code())
    }

    /// Terminate the shell and reap it.
    ///
    /// A shell that already exited is only reaped.
    pub fn kill(&mut self) -> Result<u32, PtyError> {
        if self.is_alive() {
            if let Err(e) = self.child.kill() {
                // Lost the race against a natural exit.
                if self.is_alive() {
                    return Err(PtyError::Io(e));
                }
            }
        }
        self.wait()
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.try_wait();
        }
    }
}

fn size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Returns the platform default shell.
///
/// Windows always gets PowerShell; elsewhere `$SHELL` is honoured with a
/// `/bin/sh` fallback.
pub fn default_shell() -> String {
    if cfg!(windows) {
        return "powershell.exe".to_string();
    }
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn spawn_sh() -> PtyHandle {
        PtyHandle::spawn("/bin/sh", Path::new("/"), "xterm-256color", 80, 24)
            .expect("spawn /bin/sh")
    }

    /// Drain `reader` on a background thread until `needle` shows up or EOF.
    fn read_until(mut reader: Box<dyn Read + Send>, needle: &'static str) -> String {
        let drain = thread::spawn(move || {
            let mut output = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        output.extend_from_slice(&buf[..n]);
                        if String::from_utf8_lossy(&output).contains(needle) {
                            break;
                        }
                    }
                }
            }
            String::from_utf8_lossy(&output).into_owned()
        });
        drain.join().unwrap()
    }

    #[test]
    fn test_spawn_pty() {
        let mut handle = spawn_sh();
        assert!(handle.is_alive());
    }

    #[test]
    fn test_spawn_missing_shell_fails() {
        let result = PtyHandle::spawn(
            "/definitely/not/a/shell",
            Path::new("/"),
            "xterm-256color",
            80,
            24,
        );
        assert!(matches!(result, Err(PtyError::SpawnFailed(_))));
    }

    #[test]
    fn test_write_read_echo() {
        let mut handle = spawn_sh();
        let reader = handle.take_reader().unwrap();
        assert!(handle.take_reader().is_none());

        handle.write(b"echo ATLAS_$((6*7))\n").unwrap();

        let text = read_until(reader, "ATLAS_42");
        assert!(
            text.contains("ATLAS_42"),
            "Expected output to contain ATLAS_42, got: {text}"
        );
    }

    #[test]
    fn test_spawn_in_working_directory() {
        let mut handle = spawn_sh();
        let reader = handle.take_reader().unwrap();
        handle.write(b"pwd; echo DONE_$((40+2))\n").unwrap();
        let text = read_until(reader, "DONE_42");
        assert!(text.contains("\r\n/\r\n"), "unexpected pwd output: {text}");
    }

    #[test]
    fn test_resize() {
        let handle = spawn_sh();
        let result = handle.resize(120, 40);
        assert!(result.is_ok(), "Resize failed: {:?}", result.err());
    }

    #[test]
    fn test_child_exit() {
        let mut handle = spawn_sh();
        let reader = handle.take_reader().unwrap();
        handle.write(b"exit 3\n").unwrap();

        // The reader hits EOF (or EIO) once the shell is gone.
        let _ = read_until(reader, "\u{0}never");

        let deadline = Instant::now() + Duration::from_secs(3);
        while handle.is_alive() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(handle.try_wait(), Some(3));
    }

    #[test]
    fn test_kill_reaps_child() {
        let mut handle = spawn_sh();
        let _reader = handle.take_reader();
        handle.kill().unwrap();
        assert!(!handle.is_alive());
        // Killing again only reports the recorded exit.
        assert!(handle.kill().is_ok());
    }

    #[test]
    fn test_default_shell_detection() {
        let shell = default_shell();
        assert!(!shell.is_empty(), "Default shell should not be empty");
        assert!(
            shell.starts_with('/'),
            "Default shell should be an absolute path, got: {shell}"
        );
    }
}
