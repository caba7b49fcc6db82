//! Session Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Probe and backend failures are not errors of this module: they move the
//! session into [`Failed`](crate::SessionState::Failed) and are read from
//! the session state. These errors are for requests the session refuses.

use crate::state::SessionState;
use binscan_backend::BackendKind;
use binscan_capture::error::ErrorKind as CaptureErrorKind;
use derive_more::{Display, Error};

/// A session error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request doesn't apply to the current state.
    #[display("not allowed while {_0}")]
    InvalidState(#[error(not(source))] SessionState),
    /// A value was already committed; the session accepts nothing further.
    #[display("scan already committed")]
    AlreadyCommitted,
    /// A typed code was blank after trimming.
    #[display("manual code is empty")]
    EmptyManualCode,
    /// Still images were submitted to a camera session.
    #[display("{_0} scanner does not accept still images")]
    WrongSource(#[error(not(source))] BackendKind),
    /// A torch or zoom request failed. Scanning continues.
    #[display("camera control failed: {_0}")]
    Control(#[error(not(source))] CaptureErrorKind),
    /// The session task has ended.
    #[display("scan session closed")]
    SessionClosed,
}

impl ErrorKind {
    /// Returns `true` if repeating the request later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidState(_) | Self::Control(_))
    }
}
