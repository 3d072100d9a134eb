//! Error types for symvm-core

use symvm_vocab::Symbol;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A guaranteed lookup found nothing
    #[error("missing triple: ({entity}, {attribute}, ?)")]
    MissingTriple {
        /// Entity the lookup started from
        entity: Symbol,
        /// Attribute that had no value
        attribute: Symbol,
    },

    /// A blob type assertion failed
    #[error("invalid blob type on symbol {symbol}: expected {expected}")]
    TypeMismatch {
        /// Symbol whose blob had the wrong type
        symbol: Symbol,
        /// Expected BlobType value
        expected: Symbol,
    },

    /// The deserializer saw malformed input
    #[error("{message} at {row}:{column}")]
    Parse {
        /// Human-readable description of the problem
        message: &'static str,
        /// 1-based source row
        row: u64,
        /// 1-based source column
        column: u64,
    },

    /// The triple-graph shape was violated
    #[error("{0}")]
    Structure(String),

    /// A storage primitive failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage file is not readable by this build
    #[error("bad storage format: {0}")]
    BadStorage(String),
}

impl Error {
    /// Create a structure error
    pub fn structure(msg: impl Into<String>) -> Self {
        Error::Structure(msg.into())
    }
}
