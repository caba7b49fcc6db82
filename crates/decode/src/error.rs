//! Decode Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A decode error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for decode operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// A frame without a symbol is **not** an error; engines report that as
/// `Ok(None)`.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Symbology tag not recognised.
    #[display("unknown symbology: {_0}")]
    UnknownSymbology(#[error(not(source))] String),
    /// Image bytes could not be decoded into a frame. Try another image.
    #[display("unreadable image")]
    InvalidImage,
    /// The decode engine failed on this frame.
    #[display("decode engine error: {_0}")]
    Engine(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}
