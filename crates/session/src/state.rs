use binscan_backend::BackendKind;
use binscan_backend::error::ErrorKind as BackendErrorKind;
use binscan_capture::CameraCapabilities;
use binscan_capture::error::ErrorKind as CaptureErrorKind;
use derive_more::Display;

/// Why a session landed in [`SessionState::Failed`].
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum FailureReason {
    /// The probe couldn't get a usable camera.
    #[display("{_0}")]
    Capability(CaptureErrorKind),
    /// The backend couldn't start, or died while scanning.
    #[display("{_0}")]
    Backend(BackendErrorKind),
}
impl FailureReason {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Capability(kind) => kind.is_retryable(),
            Self::Backend(kind) => kind.is_retryable(),
        }
    }
}

/// Scan session lifecycle.
///
/// ```text
/// Idle -> Initializing -> Scanning -> Committed
///             |              |
///             +--> Failed <--+
///                    |
///                    +--> Initializing (retry)
/// ```
///
/// Any state except `Committed` may jump straight to `Committed` through the
/// manual override.
#[derive(Clone, Debug, Default, Display, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    #[display("idle")]
    Idle,
    #[display("initializing")]
    Initializing,
    #[display("scanning")]
    Scanning,
    #[display("committed")]
    Committed,
    #[display("failed ({_0})")]
    Failed(FailureReason),
}
impl SessionState {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of the latest still image, for the "try another image" prompt.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ImageAttempt {
    #[display("decoding")]
    Pending,
    #[display("no barcode found")]
    NotFound,
    #[display("image could not be read")]
    Unreadable,
}

/// What the UI shell renders. Published on every change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub state: SessionState,
    pub kind: Option<BackendKind>,
    /// Set once the session is committed. Empty means "manual entry".
    pub committed: Option<String>,
    pub image_attempt: Option<ImageAttempt>,
    pub capabilities: Option<CameraCapabilities>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Scanning.to_string(), "scanning");
        let failed = SessionState::Failed(FailureReason::Capability(CaptureErrorKind::PermissionDenied));
        assert_eq!(failed.to_string(), "failed (camera access denied)");
        assert!(failed.is_failed());
        let lost = FailureReason::Backend(BackendErrorKind::FatalStreamError);
        assert!(lost.is_retryable());
        assert!(!FailureReason::Capability(CaptureErrorKind::NoMediaApi).is_retryable());
    }
}
