//! atlas-pty: pseudo-terminal sessions and their multiplexer for the Atlas host.
//!
//! # Architecture
//!
//! - [`PtyHandle`]: Low-level PTY process management (spawn, write, resize, kill).
//! - [`PtySession`]: One shell bound to a PTY, a fixed working directory and
//!   a revocable output sink.
//! - [`SessionRegistry`]: The table of live sessions and identifier allocation.
//! - [`Multiplexer`]: Starts, feeds, resizes and stops sessions, relaying all
//!   of their output as tagged [`TerminalEvent`]s on one shared stream.

pub mod multiplexer;
pub mod output;
pub mod pty;
pub mod registry;
mod relay;
pub mod session;

pub use multiplexer::{Multiplexer, MultiplexerConfig};
pub use output::{OutputHub, TerminalEvent};
pub use pty::{default_shell, PtyError, PtyHandle};
pub use registry::SessionRegistry;
pub use session::{PtySession, SessionId, SessionInfo};
