//! atlas-host: the privileged side of the Atlas desktop app.
//!
//! [`Host`] launches the backend and gates startup on its readiness, then
//! exposes a [`CommandBus`] through which the UI reaches terminals, project
//! files and the native folder picker.

pub mod bus;
pub mod dialog;
pub mod error;
pub mod files;
pub mod host;
pub mod paths;

pub use bus::{CommandBus, OneWay, StartedSession};
pub use dialog::{DirectoryPicker, PickResult};
pub use error::{CommandError, Result};
pub use files::DirEntry;
pub use host::{Host, HostConfig};
