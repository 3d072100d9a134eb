//! Error types for symvm-server

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error type
#[derive(Error, Debug)]
pub enum ServerError {
    /// Socket or storage I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-level failure
    #[error("engine error: {0}")]
    Core(#[from] symvm_core::Error),

    /// The peer sent malformed MessagePack or an unknown command
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Config file was present but unreadable
    #[error("config error: {0}")]
    Config(String),
}
