//! Continuous live-stream backend.

use crate::attempt::{forward, live_attempts};
use crate::backend::{DecodeBackend, Lifecycle, Running, acquire_track, apply_to_track};
use crate::config::{BackendKind, ScannerBackendConfig};
use crate::error::Result;
use crate::event::EventSink;
use async_trait::async_trait;
use binscan_capture::error::Result as CaptureResult;
use binscan_capture::{CameraCapabilities, Constraint, DEFAULT_PROBE_TIMEOUT, MediaApiHandle, TrackHandle};
use binscan_decode::DecoderHandle;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Decodes every frame the track produces, as fast as the engine allows.
///
/// Misses and engine hiccups are swallowed; the only event besides a decode
/// is a [`Fatal`](crate::BackendEvent::Fatal) when the track dies.
pub struct LiveStreamBackend {
    media: MediaApiHandle,
    decoder: DecoderHandle,
    config: ScannerBackendConfig,
    acquire_timeout: Duration,
    lifecycle: Lifecycle,
}
impl LiveStreamBackend {
    pub fn new(media: MediaApiHandle, decoder: DecoderHandle, config: ScannerBackendConfig) -> Self {
        Self { media, decoder, config, acquire_timeout: DEFAULT_PROBE_TIMEOUT, lifecycle: Lifecycle::Fresh(None) }
    }

    /// Bound on acquiring a track when none was handed over.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Start on an already-acquired track instead of acquiring one.
    pub fn with_track(mut self, track: TrackHandle) -> Self {
        self.lifecycle = Lifecycle::Fresh(Some(track));
        self
    }
}

#[async_trait]
impl DecodeBackend for LiveStreamBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LiveStream
    }

    async fn start(&mut self, events: EventSink) -> Result<()> {
        let handed = self.lifecycle.begin()?;
        let track = acquire_track(&self.media, self.config.facing, handed, self.acquire_timeout).await?;
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let attempts = live_attempts(track.clone(), self.decoder.clone(), self.config.preferred_formats.clone());
        tasks.spawn(forward(attempts, events, cancel.clone()));
        tracing::info!(
            backend = %self.kind(),
            track = track.label(),
            engine = self.decoder.name(),
            formats = %self.config.preferred_formats,
            "Decode backend started"
        );
        self.lifecycle.run(Running::new(cancel, tasks, Some(track)));
        Ok(())
    }

    fn stop(&mut self) {
        if self.lifecycle.stop() {
            tracing::info!(backend = %self.kind(), "Decode backend stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    fn capabilities(&self) -> Option<CameraCapabilities> {
        self.lifecycle.track().map(|track| track.capabilities())
    }

    async fn apply_torch(&self, on: bool) -> CaptureResult<()> {
        apply_to_track(&self.lifecycle, Constraint::Torch(on)).await
    }

    async fn apply_zoom(&self, level: f64) -> CaptureResult<()> {
        apply_to_track(&self.lifecycle, Constraint::Zoom(level)).await
    }
}

impl Drop for LiveStreamBackend {
    fn drop(&mut self) {
        self.lifecycle.stop();
    }
}
