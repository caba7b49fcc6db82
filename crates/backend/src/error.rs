//! Backend Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. The underlying capture or decode
//! error, where there is one, is kept as a child in the error tree.

use derive_more::{Display, Error};

/// A backend error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// [`start()`](crate::DecodeBackend::start) called on a running backend.
    #[display("backend already started")]
    AlreadyStarted,
    /// The backend was stopped. Backends are single-use; build a new one.
    #[display("backend already stopped; backends cannot be restarted")]
    Exhausted,
    /// Acquiring the source (camera track or image) failed.
    #[display("backend failed to initialise")]
    InitFailed,
    /// The source died mid-stream (camera unplugged, track ended).
    #[display("capture stream failed")]
    FatalStreamError,
}

impl ErrorKind {
    /// Returns `true` if a fresh backend might succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InitFailed | Self::FatalStreamError)
    }
}
