//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source couldn't be read or didn't match the expected shape. The
    /// figment error in the tree names the offending key and source.
    #[display("failed to load configuration")]
    Load,
    /// A value parsed but isn't usable.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Configuration errors need a human to fix the source.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
