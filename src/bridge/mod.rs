//! Command-line implementations of the coordinator's outbound contracts.

mod console;
mod files;
mod history;

pub use console::{ConsoleMessages, ConsoleNotifier, LoggingKeepAlive};
pub use files::SystemFileAccess;
pub use history::{JsonlHistory, NoHistory};
