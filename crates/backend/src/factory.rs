use crate::BackendHandle;
use crate::backend::{ImageSource, LiveStreamBackend, StillImageBackend, WorkerLoopBackend};
use crate::config::{BackendKind, ScannerBackendConfig};
use crate::error::{ErrorKind, Result};
use binscan_capture::{DEFAULT_PROBE_TIMEOUT, MediaApiHandle, TrackHandle};
use binscan_decode::DecoderHandle;
use std::time::Duration;

/// Builds fresh backends from one configuration.
///
/// Every call returns a new single-use instance; nothing is pooled.
#[derive(Clone)]
pub struct BackendFactory {
    media: MediaApiHandle,
    decoder: DecoderHandle,
    config: ScannerBackendConfig,
    acquire_timeout: Duration,
}
impl BackendFactory {
    pub fn new(media: MediaApiHandle, decoder: DecoderHandle, config: ScannerBackendConfig) -> Self {
        Self { media, decoder, config, acquire_timeout: DEFAULT_PROBE_TIMEOUT }
    }

    /// Bound on a camera backend acquiring its own track.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn media(&self) -> &MediaApiHandle {
        &self.media
    }

    pub fn config(&self) -> &ScannerBackendConfig {
        &self.config
    }

    /// A camera backend of `kind`, optionally taking over an acquired track.
    ///
    /// # Errors
    /// [`InitFailed`](ErrorKind::InitFailed) for [`BackendKind::StillImage`],
    /// which has no camera; the track, if any, is released.
    pub fn camera(&self, kind: BackendKind, track: Option<TrackHandle>) -> Result<BackendHandle> {
        let backend: BackendHandle = match kind {
            BackendKind::LiveStream => {
                let backend = LiveStreamBackend::new(self.media.clone(), self.decoder.clone(), self.config.clone())
                    .with_acquire_timeout(self.acquire_timeout);
                match track {
                    Some(track) => Box::new(backend.with_track(track)),
                    None => Box::new(backend),
                }
            },
            BackendKind::WorkerLoop => {
                let backend = WorkerLoopBackend::new(self.media.clone(), self.decoder.clone(), self.config.clone())
                    .with_acquire_timeout(self.acquire_timeout);
                match track {
                    Some(track) => Box::new(backend.with_track(track)),
                    None => Box::new(backend),
                }
            },
            BackendKind::StillImage => {
                if let Some(track) = track {
                    track.stop();
                }
                tracing::warn!(%kind, "Still-image backend requested as a camera backend");
                exn::bail!(ErrorKind::InitFailed);
            },
        };
        Ok(backend)
    }

    pub fn still_image(&self, source: ImageSource) -> BackendHandle {
        Box::new(StillImageBackend::new(self.decoder.clone(), self.config.preferred_formats.clone(), source))
    }
}
