//! Single still-image backend.

use crate::attempt::{Attempt, decode_frame};
use crate::backend::{DecodeBackend, Lifecycle, Running};
use crate::config::BackendKind;
use crate::error::{ErrorKind, Result};
use crate::event::{BackendEvent, EventSink};
use async_trait::async_trait;
use binscan_capture::error::{ErrorKind as CaptureErrorKind, Result as CaptureResult};
use binscan_capture::{CameraCapabilities, Capability};
use binscan_decode::{DecoderHandle, Formats, load_frame};
use exn::{OptionExt, ResultExt};
use std::fmt;
use std::path::PathBuf;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Where a still image comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Encoded image bytes, e.g. straight from a capture-to-file input.
    Bytes(Vec<u8>),
    /// An uploaded file on disk.
    Path(PathBuf),
}
impl ImageSource {
    async fn read(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Path(path) => {
                tracing::debug!(path = %path.display(), "Reading still image");
                tokio::fs::read(&path).await.or_raise(|| ErrorKind::InitFailed)
            },
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// One image, one decode attempt, no retry loop.
///
/// Emits exactly one [`Decoded`](BackendEvent::Decoded) or
/// [`NotFound`](BackendEvent::NotFound). An image that can't be read fails
/// [`start()`](DecodeBackend::start) with
/// [`InitFailed`](ErrorKind::InitFailed). To try another image, build
/// another backend.
pub struct StillImageBackend {
    decoder: DecoderHandle,
    formats: Formats,
    source: Option<ImageSource>,
    lifecycle: Lifecycle,
}
impl StillImageBackend {
    pub fn new(decoder: DecoderHandle, formats: Formats, source: ImageSource) -> Self {
        Self { decoder, formats, source: Some(source), lifecycle: Lifecycle::Fresh(None) }
    }
}

#[async_trait]
impl DecodeBackend for StillImageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::StillImage
    }

    async fn start(&mut self, events: EventSink) -> Result<()> {
        self.lifecycle.begin()?;
        let source = self.source.take().ok_or_raise(|| ErrorKind::Exhausted)?;
        let bytes = source.read().await?;
        let frame = tokio::task::spawn_blocking(move || load_frame(&bytes))
            .await
            .or_raise(|| ErrorKind::InitFailed)?
            .or_raise(|| ErrorKind::InitFailed)?;
        tracing::info!(
            backend = %self.kind(),
            width = frame.width(),
            height = frame.height(),
            engine = self.decoder.name(),
            "Decoding still image"
        );
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let (decoder, formats, token) = (self.decoder.clone(), self.formats.clone(), cancel.clone());
        tasks.spawn(async move {
            let attempt = decode_frame(&decoder, frame, &formats).await;
            if token.is_cancelled() {
                return;
            }
            match attempt {
                Attempt::Hit(event) => events.emit(BackendEvent::Decoded(event)),
                Attempt::Miss | Attempt::Lost => {
                    tracing::info!("No symbol found in still image");
                    events.emit(BackendEvent::NotFound);
                },
            }
        });
        self.lifecycle.run(Running::new(cancel, tasks, None));
        Ok(())
    }

    fn stop(&mut self) {
        self.source = None;
        if self.lifecycle.stop() {
            tracing::debug!(backend = %self.kind(), "Decode backend stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    fn capabilities(&self) -> Option<CameraCapabilities> {
        None
    }

    async fn apply_torch(&self, _on: bool) -> CaptureResult<()> {
        exn::bail!(CaptureErrorKind::Unsupported(Capability::Torch))
    }

    async fn apply_zoom(&self, _level: f64) -> CaptureResult<()> {
        exn::bail!(CaptureErrorKind::Unsupported(Capability::Zoom))
    }
}

impl Drop for StillImageBackend {
    fn drop(&mut self) {
        self.lifecycle.stop();
    }
}
