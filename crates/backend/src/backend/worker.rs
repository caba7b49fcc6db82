//! Timer-sampled worker-loop backend.

use crate::attempt::{Sample, forward, sampled_attempts};
use crate::backend::{DecodeBackend, Lifecycle, Running, acquire_track, apply_to_track};
use crate::config::{BackendKind, ScannerBackendConfig};
use crate::error::Result;
use crate::event::EventSink;
use async_trait::async_trait;
use binscan_capture::error::Result as CaptureResult;
use binscan_capture::{CameraCapabilities, Constraint, DEFAULT_PROBE_TIMEOUT, MediaApiHandle, TrackHandle};
use binscan_decode::DecoderHandle;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Samples one frame per [`frame_interval`](ScannerBackendConfig::frame_interval)
/// and hands it to a single decode worker.
///
/// Frames sampled while the worker is busy are dropped rather than queued, so
/// a slow engine never builds a backlog. [`stop()`](DecodeBackend::stop)
/// tears down the sampling timer and the worker as well as the track.
pub struct WorkerLoopBackend {
    media: MediaApiHandle,
    decoder: DecoderHandle,
    config: ScannerBackendConfig,
    acquire_timeout: Duration,
    lifecycle: Lifecycle,
}
impl WorkerLoopBackend {
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
impl DecodeBackend for WorkerLoopBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::WorkerLoop
    }

    async fn start(&mut self, events: EventSink) -> Result<()> {
        let handed = self.lifecycle.begin()?;
        let track = acquire_track(&self.media, self.config.facing, handed, self.acquire_timeout).await?;
        let interval = self.config.frame_interval();
        let cancel = CancellationToken::new();
        // One slot: the frame the worker picks up next.
        let (samples_tx, samples_rx) = mpsc::channel(1);
        let mut tasks = JoinSet::new();
        tasks.spawn(sample(track.clone(), interval, samples_tx, cancel.clone()));
        let attempts = sampled_attempts(samples_rx, self.decoder.clone(), self.config.preferred_formats.clone());
        tasks.spawn(forward(attempts, events, cancel.clone()));
        tracing::info!(
            backend = %self.kind(),
            track = track.label(),
            engine = self.decoder.name(),
            ?interval,
            "Decode backend started"
        );
        self.lifecycle.run(Running::new(cancel, tasks, Some(track)));
        Ok(())
    }

    fn stop(&mut self) {
        if self.lifecycle.stop() {
            tracing::info!(backend = %self.kind(), "Sampling timer and decode worker stopped");
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

impl Drop for WorkerLoopBackend {
    fn drop(&mut self) {
        self.lifecycle.stop();
    }
}

/// The sampling timer: grab a frame every tick and offer it to the worker.
async fn sample(track: TrackHandle, interval: Duration, samples: mpsc::Sender<Sample>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = async {
                ticker.tick().await;
                track.next_frame().await
            } => frame,
        };
        match frame {
            Ok(frame) => match samples.try_send(Sample::Frame(frame)) {
                Ok(()) => {},
                Err(TrySendError::Full(_)) => tracing::trace!("Decode worker busy; dropping frame"),
                Err(TrySendError::Closed(_)) => break,
            },
            Err(err) => {
                tracing::warn!(track = track.label(), error = %*err, "Capture track lost");
                // Worker gone means the backend is being torn down anyway.
                let _ = samples.send(Sample::Lost).await;
                break;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::event::BackendEvent;
    use binscan_capture::error::ErrorKind as CaptureErrorKind;
    use binscan_capture::mock::MockMediaApi;
    use binscan_capture::{Capability, ZoomRange};
    use binscan_decode::mock::ScriptedDecoder;
    use std::sync::Arc;

    fn config(frame_interval_ms: u64) -> ScannerBackendConfig {
        ScannerBackendConfig { frame_interval_ms, ..Default::default() }
    }

    #[tokio::test]
    async fn test_samples_and_decodes() {
        let media = Arc::new(MockMediaApi::granting());
        let decoder = Arc::new(ScriptedDecoder::new().misses(2).hit("XYZ999"));
        let mut backend = WorkerLoopBackend::new(media.clone(), decoder.clone(), config(5));
        let (sink, mut events) = EventSink::channel();
        backend.start(sink).await.unwrap();
        match events.recv().await {
            Some(BackendEvent::Decoded(event)) => assert_eq!(event.text, "XYZ999"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(decoder.calls() >= 3);
        backend.stop();
        assert_eq!(media.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_stop_tears_down_timer_and_worker() {
        let media = Arc::new(MockMediaApi::granting());
        let decoder = Arc::new(ScriptedDecoder::new());
        let mut backend = WorkerLoopBackend::new(media.clone(), decoder.clone(), config(5));
        backend.start(EventSink::new(|_| {})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        backend.stop();
        // Let any in-flight blocking decode land.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let calls = decoder.calls();
        let frames = media.last_track().unwrap().frames_served();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(decoder.calls(), calls);
        assert_eq!(media.last_track().unwrap().frames_served(), frames);
        assert!(!backend.is_running());
    }

    #[tokio::test]
    async fn test_lost_track_is_fatal() {
        let media = Arc::new(MockMediaApi::granting().disconnect_after(2));
        let mut backend = WorkerLoopBackend::new(media.clone(), Arc::new(ScriptedDecoder::new()), config(1));
        let (sink, mut events) = EventSink::channel();
        backend.start(sink).await.unwrap();
        assert_eq!(events.recv().await, Some(BackendEvent::Fatal(ErrorKind::FatalStreamError)));
        backend.stop();
        backend.stop();
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let media = Arc::new(MockMediaApi::granting());
        let mut backend = WorkerLoopBackend::new(media.clone(), Arc::new(ScriptedDecoder::new().hit("A1")), config(0));
        let (sink, mut events) = EventSink::channel();
        backend.start(sink).await.unwrap();
        assert!(matches!(events.recv().await, Some(BackendEvent::Decoded(_))));
    }

    #[tokio::test]
    async fn test_controls() {
        let capabilities = CameraCapabilities { torch: true, zoom: Some(ZoomRange::new(1.0, 3.0, 0.5)) };
        let media = Arc::new(MockMediaApi::granting().with_capabilities(capabilities));
        let mut backend = WorkerLoopBackend::new(media.clone(), Arc::new(ScriptedDecoder::new()), config(5));
        assert_eq!(backend.capabilities(), None);
        let err = backend.apply_torch(true).await.err().unwrap();
        assert_eq!(*err, CaptureErrorKind::Unsupported(Capability::Torch));
        backend.start(EventSink::new(|_| {})).await.unwrap();
        assert_eq!(backend.capabilities(), Some(capabilities));
        backend.apply_torch(true).await.unwrap();
        backend.apply_zoom(2.5).await.unwrap();
        assert_eq!(media.last_track().unwrap().applied(), vec![Constraint::Torch(true), Constraint::Zoom(2.5)]);
        backend.stop();
        assert_eq!(backend.capabilities(), None);
        let err = backend.apply_zoom(1.5).await.err().unwrap();
        assert_eq!(*err, CaptureErrorKind::Unsupported(Capability::Zoom));
    }
}
