//! Error types for YantraIO

use crate::core::backend::DeviceError;
use crate::core::types::RequestError;
use crate::moves::DefinitionError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// YantraIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Move vocabulary definition error (fatal at startup)
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Virtual device error
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Request rejected by the daemon
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Wire framing or protocol violation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend named in config is unknown or not compiled in
    #[error("Unknown device backend: {0}")]
    UnknownBackend(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
