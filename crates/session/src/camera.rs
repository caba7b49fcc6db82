//! Torch and zoom for the active track.

use crate::error::{ErrorKind, Result};
use crate::state::SessionState;
use binscan_backend::DecodeBackend;
use binscan_capture::error::ErrorKind as CaptureErrorKind;
use binscan_capture::{CameraCapabilities, Capability};
use exn::ResultExt;

/// Forwards torch and zoom requests to whichever backend is scanning.
///
/// Obtained from [`ScanSession::camera`](crate::ScanSession::camera).
/// Failures come back as [`Control`](ErrorKind::Control) errors and are
/// logged as warnings; they never change the session state.
pub struct CameraController<'a> {
    backend: Option<&'a (dyn DecodeBackend + Send + Sync)>,
    state: &'a SessionState,
}
impl<'a> CameraController<'a> {
    pub(crate) fn new(backend: Option<&'a (dyn DecodeBackend + Send + Sync)>, state: &'a SessionState) -> Self {
        Self { backend, state }
    }

    pub fn capabilities(&self) -> Option<CameraCapabilities> {
        self.backend.and_then(|backend| backend.capabilities())
    }

    pub async fn set_torch(&self, on: bool) -> Result<()> {
        let backend = self.active()?;
        match backend.apply_torch(on).await {
            Ok(()) => {
                tracing::debug!(on, "Torch applied");
                Ok(())
            },
            Err(err) => {
                let kind = (*err).clone();
                tracing::warn!(on, error = %kind, "Torch request failed");
                Err(err).or_raise(|| ErrorKind::Control(kind))
            },
        }
    }

    /// Clamp `level` into the track's zoom range and apply it. Returns the
    /// level actually applied.
    pub async fn set_zoom(&self, level: f64) -> Result<f64> {
        let backend = self.active()?;
        let Some(range) = backend.capabilities().and_then(|capabilities| capabilities.zoom) else {
            tracing::warn!(requested = level, "Zoom not supported by this track");
            exn::bail!(ErrorKind::Control(CaptureErrorKind::Unsupported(Capability::Zoom)));
        };
        let applied = range.clamp(level);
        if applied != level {
            tracing::debug!(requested = level, applied, min = range.min, max = range.max, "Zoom clamped");
        }
        match backend.apply_zoom(applied).await {
            Ok(()) => Ok(applied),
            Err(err) => {
                let kind = (*err).clone();
                tracing::warn!(level = applied, error = %kind, "Zoom request failed");
                Err(err).or_raise(|| ErrorKind::Control(kind))
            },
        }
    }

    fn active(&self) -> Result<&'a (dyn DecodeBackend + Send + Sync)> {
        match (self.state, self.backend) {
            (SessionState::Scanning, Some(backend)) => Ok(backend),
            (state, _) => exn::bail!(ErrorKind::InvalidState(state.clone())),
        }
    }
}
