//! Decode backend trait and implementations.
//!
//! This module defines the `DecodeBackend` trait, the single contract that
//! the scan session drives regardless of where frames come from.

mod live;
mod still;
mod worker;

pub use self::live::LiveStreamBackend;
pub use self::still::{ImageSource, StillImageBackend};
pub use self::worker::WorkerLoopBackend;
use crate::config::BackendKind;
use crate::error::{ErrorKind, Result};
use crate::event::EventSink;
use async_trait::async_trait;
use binscan_capture::error::{ErrorKind as CaptureErrorKind, Result as CaptureResult};
use binscan_capture::{CameraCapabilities, Constraint, Facing, MediaApiHandle, TrackHandle, apply_supported};
use exn::ResultExt;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Unified interface for decode backends.
///
/// # Lifecycle
/// A backend is built fresh, started at most once and stopped at least once.
///
/// - A second [`start()`](Self::start) while running fails with
///   [`AlreadyStarted`](ErrorKind::AlreadyStarted).
/// - [`start()`](Self::start) after [`stop()`](Self::stop), or after a
///   failed start, fails with [`Exhausted`](ErrorKind::Exhausted).
/// - [`stop()`](Self::stop) may be called any number of times, including
///   before `start()`. It releases the camera track (even one handed over at
///   construction and never used) and tears down every task the backend
///   spawned. Once it returns, no further events reach the sink.
///
/// # Controls
/// [`apply_torch()`](Self::apply_torch) and
/// [`apply_zoom()`](Self::apply_zoom) return
/// [`Unsupported`](binscan_capture::error::ErrorKind::Unsupported) when the
/// active track lacks the control. Range checking is the caller's job.
#[async_trait]
pub trait DecodeBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Acquire the source and begin delivering events to `events`.
    async fn start(&mut self, events: EventSink) -> Result<()>;

    /// Release every resource. Synchronous and idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Controls offered by the track this backend holds, if it holds one.
    fn capabilities(&self) -> Option<CameraCapabilities>;

    async fn apply_torch(&self, on: bool) -> CaptureResult<()>;

    async fn apply_zoom(&self, level: f64) -> CaptureResult<()>;
}

/// Resources held while a backend runs.
pub(crate) struct Running {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    track: Option<TrackHandle>,
}
impl Running {
    pub(crate) fn new(cancel: CancellationToken, tasks: JoinSet<()>, track: Option<TrackHandle>) -> Self {
        Self { cancel, tasks, track }
    }
}

/// Single-use lifecycle shared by every backend.
pub(crate) enum Lifecycle {
    /// Not started. May hold a track handed over by the probe.
    Fresh(Option<TrackHandle>),
    Running(Running),
    Stopped,
}
impl Lifecycle {
    /// Move out of [`Fresh`](Self::Fresh), returning the handed-over track.
    ///
    /// The lifecycle is left [`Stopped`](Self::Stopped) until
    /// [`run()`](Self::run) is called, so a start that fails part-way can't
    /// be retried on the same backend.
    pub(crate) fn begin(&mut self) -> Result<Option<TrackHandle>> {
        match std::mem::replace(self, Self::Stopped) {
            Self::Fresh(track) => Ok(track),
            Self::Running(running) => {
                *self = Self::Running(running);
                exn::bail!(ErrorKind::AlreadyStarted)
            },
            Self::Stopped => exn::bail!(ErrorKind::Exhausted),
        }
    }

    pub(crate) fn run(&mut self, running: Running) {
        *self = Self::Running(running);
    }

    pub(crate) fn track(&self) -> Option<&TrackHandle> {
        match self {
            Self::Fresh(track) => track.as_ref(),
            Self::Running(running) => running.track.as_ref(),
            Self::Stopped => None,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    /// Tear everything down. Returns `false` if there was nothing to stop.
    pub(crate) fn stop(&mut self) -> bool {
        match std::mem::replace(self, Self::Stopped) {
            Self::Fresh(track) => {
                if let Some(track) = track {
                    track.stop();
                }
                false
            },
            Self::Running(mut running) => {
                running.cancel.cancel();
                running.tasks.abort_all();
                if let Some(track) = running.track {
                    track.stop();
                }
                true
            },
            Self::Stopped => false,
        }
    }
}

/// Use the handed-over track if it's still live, otherwise acquire one,
/// giving up after `timeout`.
pub(crate) async fn acquire_track(
    media: &MediaApiHandle,
    facing: Facing,
    handed: Option<TrackHandle>,
    timeout: Duration,
) -> Result<TrackHandle> {
    if let Some(track) = handed {
        if track.is_live() {
            return Ok(track);
        }
        tracing::debug!(track = track.label(), "Handed-over track already stopped; acquiring a new one");
    }
    match tokio::time::timeout(timeout, media.acquire(facing)).await {
        Ok(acquired) => acquired.or_raise(|| ErrorKind::InitFailed),
        Err(_elapsed) => {
            tracing::warn!(media = media.name(), ?timeout, "Camera acquisition timed out");
            exn::bail!(ErrorKind::InitFailed);
        },
    }
}

/// Forward a constraint to the lifecycle's track, if there is one.
pub(crate) async fn apply_to_track(lifecycle: &Lifecycle, constraint: Constraint) -> CaptureResult<()> {
    match lifecycle.track() {
        Some(track) => apply_supported(track, constraint).await,
        None => exn::bail!(CaptureErrorKind::Unsupported(constraint.capability())),
    }
}
