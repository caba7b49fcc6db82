//! Capture device traits.

use crate::TrackHandle;
use crate::error::{ErrorKind, Result};
use crate::models::{CameraCapabilities, Constraint, Facing, Frame};
use async_trait::async_trait;

/// The platform's camera API.
///
/// Implementations wrap whatever the runtime provides (V4L2, a browser's
/// media devices, a test double). Acquiring a track may trigger a permission
/// prompt, so callers should acquire once per scan attempt and hand the
/// resulting [`TrackHandle`] along rather than acquiring again.
#[async_trait]
pub trait MediaApi: Send + Sync {
    /// Name of the API implementation, used for logging only.
    fn name(&self) -> &str;

    /// Whether the runtime exposes a capture API at all. When this returns
    /// `false` the [probe](crate::probe) fails with
    /// [`NoMediaApi`](ErrorKind::NoMediaApi) without calling
    /// [`acquire()`](Self::acquire).
    fn is_supported(&self) -> bool {
        true
    }

    /// Acquire exclusive use of a video track facing the given direction.
    ///
    /// Returns [`PermissionDenied`](ErrorKind::PermissionDenied) when access
    /// is rejected and [`DeviceUnavailable`](ErrorKind::DeviceUnavailable)
    /// when no matching device can be opened.
    async fn acquire(&self, facing: Facing) -> Result<TrackHandle>;
}

/// An acquired video track.
///
/// The track stays live (and the camera stays locked) until
/// [`stop()`](Self::stop) is called. Stopping is idempotent.
#[async_trait]
pub trait VideoTrack: Send + Sync {
    /// Human-readable device label, used for logging only.
    fn label(&self) -> &str;

    /// Snapshot of the controls this track supports.
    fn capabilities(&self) -> CameraCapabilities;

    /// Apply a runtime constraint. Tracks that don't support the control
    /// return [`Unsupported`](ErrorKind::Unsupported).
    async fn apply(&self, constraint: Constraint) -> Result<()>;

    /// Wait for the next frame from the device.
    ///
    /// Returns [`DeviceUnavailable`](ErrorKind::DeviceUnavailable) once the
    /// track has been stopped or the device disconnected; both are terminal.
    async fn next_frame(&self) -> Result<Frame>;

    /// Release the device.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Apply `constraint` to `track` only when the track reports the matching
/// capability. Unsupported controls are reported, never attempted.
pub async fn apply_supported(track: &TrackHandle, constraint: Constraint) -> Result<()> {
    let capability = constraint.capability();
    if !track.capabilities().supports(capability) {
        tracing::debug!(track = track.label(), %capability, "Track does not support control");
        exn::bail!(ErrorKind::Unsupported(capability));
    }
    if !track.is_live() {
        exn::bail!(ErrorKind::DeviceUnavailable);
    }
    track.apply(constraint).await
}
