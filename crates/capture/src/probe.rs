//! Capability probing.
//!
//! Every camera-based scan starts here: check that a capture API exists, ask
//! for a track (which may prompt the user for permission) and report what the
//! track can do. The acquired track is handed to the first backend through
//! [`Ready::into_track`] so the user isn't prompted twice.

use crate::error::{ErrorKind, Result};
use crate::models::{CameraCapabilities, Facing};
use crate::{MediaApiHandle, TrackHandle};
use std::fmt;
use std::time::Duration;

/// How long a permission prompt (or a slow driver) may keep a probe waiting
/// before it's reported as [`DeviceUnavailable`](ErrorKind::DeviceUnavailable).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A successful probe, holding the acquired track.
///
/// The track is live. Either pass it on with [`into_track()`](Self::into_track)
/// or give it back with [`release()`](Self::release).
pub struct Ready {
    track: TrackHandle,
}
impl Ready {
    pub fn track(&self) -> &TrackHandle {
        &self.track
    }

    pub fn capabilities(&self) -> CameraCapabilities {
        self.track.capabilities()
    }

    pub fn into_track(self) -> TrackHandle {
        self.track
    }

    pub fn release(self) {
        tracing::debug!(track = self.track.label(), "Releasing probe track");
        self.track.stop();
    }
}

/// Acquire a capture track facing `facing`, giving up after `timeout`.
///
/// # Errors
/// - [`NoMediaApi`](ErrorKind::NoMediaApi) if the runtime has no capture API.
/// - [`PermissionDenied`](ErrorKind::PermissionDenied) if access was refused.
/// - [`DeviceUnavailable`](ErrorKind::DeviceUnavailable) if acquisition failed
///   or did not finish within `timeout`.
pub async fn probe(media: &MediaApiHandle, facing: Facing, timeout: Duration) -> Result<Ready> {
    if !media.is_supported() {
        tracing::warn!(media = media.name(), "No media capture API available");
        exn::bail!(ErrorKind::NoMediaApi);
    }
    tracing::debug!(media = media.name(), %facing, ?timeout, "Probing capture device");
    let track = match tokio::time::timeout(timeout, media.acquire(facing)).await {
        Ok(acquired) => acquired?,
        Err(_elapsed) => {
            tracing::warn!(media = media.name(), ?timeout, "Camera acquisition timed out");
            exn::bail!(ErrorKind::DeviceUnavailable);
        },
    };
    let capabilities = track.capabilities();
    tracing::info!(
        track = track.label(),
        torch = capabilities.supports_torch(),
        zoom = capabilities.supports_zoom(),
        "Capture device ready"
    );
    Ok(Ready { track })
}

/// Result of [`diagnose`]: what the device offers, for a "check camera
/// support" screen.
#[derive(Clone, Debug, PartialEq)]
pub struct SupportReport {
    pub media_api: bool,
    pub access: std::result::Result<CameraCapabilities, ErrorKind>,
}
impl SupportReport {
    pub fn camera_usable(&self) -> bool {
        self.access.is_ok()
    }
}
impl fmt::Display for SupportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |ok: bool| if ok { "yes" } else { "no" };
        writeln!(f, "media capture API: {}", mark(self.media_api))?;
        match &self.access {
            Ok(capabilities) => {
                writeln!(f, "camera access: granted")?;
                writeln!(f, "torch: {}", mark(capabilities.supports_torch()))?;
                match capabilities.zoom {
                    Some(range) => write!(f, "zoom: {:.1}x to {:.1}x (step {})", range.min, range.max, range.step),
                    None => write!(f, "zoom: no"),
                }
            },
            Err(kind) => write!(f, "camera access: {kind}"),
        }
    }
}

/// Probe the device and immediately release the track, reporting what was
/// found. Never fails; failures are part of the report.
pub async fn diagnose(media: &MediaApiHandle, facing: Facing, timeout: Duration) -> SupportReport {
    let media_api = media.is_supported();
    let access = match probe(media, facing, timeout).await {
        Ok(ready) => {
            let capabilities = ready.capabilities();
            ready.release();
            Ok(capabilities)
        },
        Err(err) => Err((*err).clone()),
    };
    SupportReport { media_api, access }
}
