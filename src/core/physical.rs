//! Physical controller input abstraction used by passthrough

use crate::core::types::Action;
use std::time::Duration;

/// Errors raised while opening or reading a physical controller
#[derive(Debug, thiserror::Error)]
pub enum PhysicalError {
    /// No controller at the configured location (unplugged, not enumerated yet)
    #[error("physical controller not found: {0}")]
    NotFound(String),

    /// The controller went away while being read
    #[error("physical controller disconnected")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can (re)open the configured physical controller
pub trait PhysicalSource: Send {
    /// Human-readable location for logs
    fn describe(&self) -> String;

    /// Open the controller. Called again after every disconnect.
    fn open(&mut self) -> Result<Box<dyn PhysicalController>, PhysicalError>;
}

/// An open physical controller
pub trait PhysicalController: Send {
    /// Wait up to `timeout` for input and translate it into actions.
    ///
    /// Returns an empty vector on timeout and `Err(Disconnected)` once the
    /// device is gone.
    fn read_actions(&mut self, timeout: Duration) -> Result<Vec<Action>, PhysicalError>;
}
