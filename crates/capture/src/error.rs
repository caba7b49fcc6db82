//! Capture Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::models::Capability;
use derive_more::{Display, Error};

/// A capture error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for capture operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The runtime exposes no capture API at all. Retrying will not help; the
    /// user has to fall back to manual entry or a still image.
    #[display("camera API not supported on this device")]
    NoMediaApi,
    /// The user (or a policy) rejected camera access.
    #[display("camera access denied")]
    PermissionDenied,
    /// Acquisition failed, timed out, or the device went away mid-stream.
    #[display("camera device unavailable")]
    DeviceUnavailable,
    /// The active track lacks the requested control. Never fatal.
    #[display("{_0} not available on this device")]
    Unsupported(#[error(not(source))] Capability),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::DeviceUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::PermissionDenied.to_string(), "camera access denied");
        assert_eq!(ErrorKind::Unsupported(Capability::Torch).to_string(), "torch not available on this device");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::NoMediaApi.is_retryable());
        assert!(ErrorKind::PermissionDenied.is_retryable());
        assert!(ErrorKind::DeviceUnavailable.is_retryable());
        assert!(!ErrorKind::Unsupported(Capability::Zoom).is_retryable());
    }
}
