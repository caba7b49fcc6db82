//! The scan session state machine.
//!
//! A session is driven from one place: the owner calls the request methods
//! ([`start()`](ScanSession::start), [`skip()`](ScanSession::skip), ...) and
//! feeds every [`SessionEvent`] from [`SessionEvents`] back into
//! [`handle()`](ScanSession::handle), in arrival order. Slow work (probing,
//! backend start) runs in spawned tasks that report back through the same
//! channel, so the session itself never blocks.
//!
//! Every release of the backend bumps the session's generation. Events are
//! tagged with the generation they were produced under and anything stale is
//! dropped on arrival, as is anything arriving after the commit.

use crate::camera::CameraController;
use crate::error::{ErrorKind, Result};
use crate::handoff::{Handoff, PendingHandoff};
use crate::state::{FailureReason, ImageAttempt, SessionState, Snapshot};
use binscan_backend::{BackendEvent, BackendFactory, BackendHandle, BackendKind, EventSink, ImageSource};
use binscan_capture::{CameraCapabilities, DEFAULT_PROBE_TIMEOUT, probe};
use binscan_decode::DecodedEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::instrument;

/// How long the success state is shown before the form takes over.
pub const DEFAULT_FEEDBACK_DELAY: Duration = Duration::from_millis(800);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Delay between a decode commit and the handoff. Manual commits don't
    /// wait.
    pub feedback_delay: Duration,
    pub probe_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { feedback_delay: DEFAULT_FEEDBACK_DELAY, probe_timeout: DEFAULT_PROBE_TIMEOUT }
    }
}

/// Something that happened outside the session and must be fed back into
/// [`ScanSession::handle`].
#[derive(Debug)]
pub enum SessionEvent {
    /// A backend finished starting, or failed to. A started backend waits in
    /// the session's landing slot rather than travelling with the event.
    Initialized { generation: u64, outcome: std::result::Result<(), FailureReason> },
    Backend { generation: u64, event: BackendEvent },
}

/// Where an initialisation task leaves its started backend.
///
/// Shared between the task and the session so that releasing the session
/// stops a backend that started but hasn't been collected yet. Once closed,
/// late deposits are stopped on arrival.
#[derive(Clone, Default)]
struct Landing(Arc<Mutex<LandingState>>);

#[derive(Default)]
struct LandingState {
    backend: Option<BackendHandle>,
    closed: bool,
}

impl Landing {
    /// Returns `false`, having stopped `backend`, if the slot is closed.
    fn deposit(&self, mut backend: BackendHandle) -> bool {
        let mut state = self.lock();
        if state.closed {
            tracing::debug!(backend = %backend.kind(), "Session moved on; stopping late backend");
            backend.stop();
            return false;
        }
        state.backend = Some(backend);
        true
    }

    /// Take the deposited backend, if any, and close the slot.
    fn collect(&self) -> Option<BackendHandle> {
        let mut state = self.lock();
        state.closed = true;
        state.backend.take()
    }

    fn lock(&self) -> MutexGuard<'_, LandingState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Init {
    task: JoinHandle<()>,
    landing: Landing,
}

/// Receiving end of a session's event channel.
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}
impl SessionEvents {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

/// One scan attempt, from scanner-screen entry to handoff.
///
/// Owns at most one backend. Must be used from within a Tokio runtime.
/// Dropping the session releases the backend and cancels a handoff that is
/// still waiting out its feedback delay.
pub struct ScanSession {
    factory: BackendFactory,
    options: SessionOptions,
    handoff: Handoff,
    state: SessionState,
    kind: Option<BackendKind>,
    /// The duplicate-suppression candidate, and the committed value once
    /// committed.
    last_value: Option<String>,
    backend: Option<BackendHandle>,
    init: Option<Init>,
    generation: u64,
    image_attempt: Option<ImageAttempt>,
    pending: Option<PendingHandoff>,
    delivered: bool,
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshot: watch::Sender<Snapshot>,
}

impl ScanSession {
    /// Backends built by `factory` are bound by the session's probe timeout
    /// when they have to acquire a track themselves.
    pub fn new(factory: BackendFactory, options: SessionOptions, handoff: Handoff) -> (Self, SessionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot, _) = watch::channel(Snapshot::default());
        let session = Self {
            factory: factory.with_acquire_timeout(options.probe_timeout),
            options,
            handoff,
            state: SessionState::Idle,
            kind: None,
            last_value: None,
            backend: None,
            init: None,
            generation: 0,
            image_attempt: None,
            pending: None,
            delivered: false,
            events: tx,
            snapshot,
        };
        (session, SessionEvents { rx })
    }

    /// Seed the duplicate candidate with the lane the previous session
    /// committed, so holding the same label up again doesn't re-submit it.
    pub fn with_previous_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.last_value = (!value.is_empty()).then_some(value);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn kind(&self) -> Option<BackendKind> {
        self.kind
    }

    pub fn is_committed(&self) -> bool {
        self.state.is_committed()
    }

    pub fn committed_value(&self) -> Option<&str> {
        self.last_value.as_deref().filter(|_| self.is_committed())
    }

    pub fn image_attempt(&self) -> Option<ImageAttempt> {
        self.image_attempt
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Controls of the active track. `None` without a camera backend.
    pub fn capabilities(&self) -> Option<CameraCapabilities> {
        self.backend.as_ref().and_then(|backend| backend.capabilities())
    }

    /// Torch and zoom for the active backend.
    pub fn camera(&self) -> CameraController<'_> {
        CameraController::new(self.backend.as_deref(), &self.state)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            kind: self.kind,
            committed: self.committed_value().map(str::to_string),
            image_attempt: self.image_attempt,
            capabilities: self.capabilities(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Begin scanning with the chosen backend. Only valid from `Idle`.
    ///
    /// Camera backends probe first; the session stays `Initializing` until
    /// the outcome arrives as a [`SessionEvent`]. The still-image source has
    /// nothing to probe and goes straight to `Scanning`, waiting for
    /// [`submit_image()`](Self::submit_image).
    pub fn start(&mut self, kind: BackendKind) -> Result<()> {
        self.ensure_open()?;
        if self.state != SessionState::Idle {
            exn::bail!(ErrorKind::InvalidState(self.state.clone()));
        }
        tracing::info!(%kind, "Starting scan session");
        self.kind = Some(kind);
        self.initialize(kind);
        Ok(())
    }

    /// Start over after a failure. The failed backend is released before
    /// the new probe begins.
    pub fn retry(&mut self) -> Result<()> {
        self.ensure_open()?;
        let (SessionState::Failed(reason), Some(kind)) = (&self.state, self.kind) else {
            exn::bail!(ErrorKind::InvalidState(self.state.clone()));
        };
        tracing::info!(%kind, %reason, "Retrying scan session");
        self.initialize(kind);
        Ok(())
    }

    /// Release the backend and return to `Idle`. Safe in any state and any
    /// number of times; a committed session stays committed.
    pub fn stop(&mut self) {
        self.release();
        match self.state {
            SessionState::Idle | SessionState::Committed => {},
            SessionState::Initializing | SessionState::Scanning | SessionState::Failed(_) => {
                self.image_attempt = None;
                self.transition(SessionState::Idle);
            },
        }
    }

    /// Abandon scanning and go to the form with an empty lane.
    pub fn skip(&mut self) -> Result<()> {
        self.ensure_open()?;
        tracing::info!(state = %self.state, "Scanning skipped; manual entry requested");
        self.commit(String::new(), Duration::ZERO);
        Ok(())
    }

    /// Commit a hand-typed code. Returns the trimmed code that was committed.
    pub fn submit_code(&mut self, input: &str) -> Result<String> {
        self.ensure_open()?;
        let code = input.trim();
        if code.is_empty() {
            exn::bail!(ErrorKind::EmptyManualCode);
        }
        tracing::info!(code, state = %self.state, "Manual code submitted");
        self.commit(code.to_string(), Duration::ZERO);
        Ok(code.to_string())
    }

    /// Try a (new) still image. Any previous image's backend is released
    /// first.
    pub fn submit_image(&mut self, source: ImageSource) -> Result<()> {
        self.ensure_open()?;
        match self.kind {
            Some(BackendKind::StillImage) => {},
            Some(kind) => exn::bail!(ErrorKind::WrongSource(kind)),
            None => exn::bail!(ErrorKind::InvalidState(self.state.clone())),
        }
        if self.state != SessionState::Scanning {
            exn::bail!(ErrorKind::InvalidState(self.state.clone()));
        }
        self.release();
        tracing::debug!(?source, generation = self.generation, "Submitting still image");
        let mut backend = self.factory.still_image(source);
        let sink = self.sink();
        self.launch(async move {
            backend.start(sink).await.map_err(|err| FailureReason::Backend(*err))?;
            Ok(backend)
        });
        self.image_attempt = Some(ImageAttempt::Pending);
        self.publish();
        Ok(())
    }

    /// Apply one event. Events must be handled in the order they arrive.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Initialized { generation, outcome } => {
                if self.is_committed() || generation != self.generation {
                    tracing::debug!(generation, current = self.generation, "Discarding stale initialisation");
                    return;
                }
                let landed = self.init.take().and_then(|init| init.landing.collect());
                let outcome = match (outcome, landed) {
                    (Ok(()), Some(backend)) => Ok(backend),
                    (Ok(()), None) => {
                        tracing::debug!(generation, "Initialisation reported without a backend");
                        return;
                    },
                    (Err(reason), _) => Err(reason),
                };
                self.on_initialized(outcome);
            },
            SessionEvent::Backend { generation, event } => {
                if self.is_committed() || generation != self.generation {
                    tracing::trace!(generation, current = self.generation, ?event, "Discarding stale backend event");
                    return;
                }
                self.on_backend_event(event);
            },
        }
    }

    /// Wait until the handoff has happened (or been cancelled). Returns
    /// whether the form received the value.
    pub async fn finish(&mut self) -> bool {
        match self.pending.as_mut() {
            Some(pending) => pending.wait().await,
            None => self.delivered,
        }
    }

    fn on_initialized(&mut self, outcome: std::result::Result<BackendHandle, FailureReason>) {
        let still_image = self.kind == Some(BackendKind::StillImage);
        match outcome {
            Ok(backend) => {
                tracing::debug!(backend = %backend.kind(), generation = self.generation, "Backend running");
                self.backend = Some(backend);
                if still_image {
                    self.publish();
                } else {
                    self.transition(SessionState::Scanning);
                }
            },
            Err(reason) if still_image => {
                tracing::warn!(%reason, "Still image could not be read");
                self.image_attempt = Some(ImageAttempt::Unreadable);
                self.publish();
            },
            Err(reason) => {
                tracing::warn!(%reason, "Scan session failed to initialise");
                self.transition(SessionState::Failed(reason));
            },
        }
    }

    fn on_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Decoded(decoded) => self.on_decoded(decoded),
            BackendEvent::NotFound => {
                tracing::info!("No barcode in still image");
                self.release();
                self.image_attempt = Some(ImageAttempt::NotFound);
                self.publish();
            },
            BackendEvent::Fatal(kind) => {
                tracing::warn!(%kind, "Decode backend failed while scanning");
                self.release();
                self.transition(SessionState::Failed(FailureReason::Backend(kind)));
            },
        }
    }

    fn on_decoded(&mut self, decoded: DecodedEvent) {
        if self.last_value.as_deref() == Some(decoded.text.as_str()) {
            tracing::trace!(text = %decoded.text, "Duplicate decode discarded");
            return;
        }
        tracing::info!(text = %decoded.text, format = %decoded.format, timestamp = ?decoded.timestamp, "Barcode accepted");
        self.commit(decoded.text, self.options.feedback_delay);
    }

    fn commit(&mut self, value: String, delay: Duration) {
        self.release();
        self.last_value = Some(value.clone());
        self.transition(SessionState::Committed);
        if delay.is_zero() {
            self.handoff.deliver(&value);
            self.delivered = true;
        } else {
            self.pending = Some(self.handoff.schedule(value, delay));
        }
    }

    fn initialize(&mut self, kind: BackendKind) {
        self.release();
        self.transition(SessionState::Initializing);
        if !kind.uses_camera() {
            self.image_attempt = None;
            self.transition(SessionState::Scanning);
            return;
        }
        let factory = self.factory.clone();
        let timeout = self.options.probe_timeout;
        let sink = self.sink();
        self.launch(start_camera(factory, kind, timeout, sink));
    }

    /// Run a backend start in the background for the current generation.
    fn launch<F>(&mut self, start: F)
    where
        F: Future<Output = std::result::Result<BackendHandle, FailureReason>> + Send + 'static,
    {
        let generation = self.generation;
        let landing = Landing::default();
        let slot = landing.clone();
        let tx = self.events.clone();
        let task = tokio::spawn(async move {
            let outcome = match start.await {
                Ok(backend) => {
                    if !slot.deposit(backend) {
                        return;
                    }
                    Ok(())
                },
                Err(reason) => Err(reason),
            };
            let _ = tx.send(SessionEvent::Initialized { generation, outcome });
        });
        self.init = Some(Init { task, landing });
    }

    /// Mark everything in flight stale, then tear the backend down.
    fn release(&mut self) {
        self.generation += 1;
        if let Some(init) = self.init.take() {
            init.task.abort();
            if let Some(mut backend) = init.landing.collect() {
                backend.stop();
            }
        }
        if let Some(mut backend) = self.backend.take() {
            backend.stop();
        }
    }

    fn sink(&self) -> EventSink {
        let tx = self.events.clone();
        let generation = self.generation;
        EventSink::new(move |event| {
            let _ = tx.send(SessionEvent::Backend { generation, event });
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_committed() {
            exn::bail!(ErrorKind::AlreadyCommitted);
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, generation = self.generation, "Scan session transition");
            self.state = next;
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.snapshot());
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.release();
        if let Some(pending) = &self.pending {
            pending.cancel();
        }
    }
}

/// Probe, then hand the probe's track to a fresh camera backend and start it.
#[instrument(level = "debug", skip(factory, sink))]
async fn start_camera(
    factory: BackendFactory,
    kind: BackendKind,
    timeout: Duration,
    sink: EventSink,
) -> std::result::Result<BackendHandle, FailureReason> {
    let ready = probe(factory.media(), factory.config().facing, timeout)
        .await
        .map_err(|err| FailureReason::Capability((*err).clone()))?;
    let mut backend = factory.camera(kind, Some(ready.into_track())).map_err(|err| FailureReason::Backend(*err))?;
    backend.start(sink).await.map_err(|err| FailureReason::Backend(*err))?;
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingHandoff;
    use binscan_backend::ScannerBackendConfig;
    use binscan_backend::error::ErrorKind as BackendErrorKind;
    use binscan_capture::error::ErrorKind as CaptureErrorKind;
    use binscan_capture::mock::{Access, MockMediaApi};
    use binscan_capture::{Capability, Constraint, VideoTrack, ZoomRange};
    use binscan_decode::Symbology;
    use binscan_decode::mock::ScriptedDecoder;
    use image::{GrayImage, ImageFormat, Luma};
    use rstest::rstest;
    use std::io::Cursor;
    use std::sync::Arc;

    const OPTIONS: SessionOptions =
        SessionOptions { feedback_delay: Duration::from_millis(20), probe_timeout: Duration::from_millis(200) };

    struct Harness {
        media: Arc<MockMediaApi>,
        decoder: Arc<ScriptedDecoder>,
        recorder: Arc<RecordingHandoff>,
        session: ScanSession,
        events: SessionEvents,
    }
    impl Harness {
        fn new(media: MockMediaApi, decoder: ScriptedDecoder) -> Self {
            let media = Arc::new(media);
            let decoder = Arc::new(decoder);
            let recorder = Arc::new(RecordingHandoff::default());
            let factory = BackendFactory::new(media.clone(), decoder.clone(), ScannerBackendConfig::default());
            let (session, events) = ScanSession::new(factory, OPTIONS, recorder.handoff());
            Self { media, decoder, recorder, session, events }
        }

        fn seeded(mut self, previous: &str) -> Self {
            let (session, events) = {
                let factory =
                    BackendFactory::new(self.media.clone(), self.decoder.clone(), ScannerBackendConfig::default());
                ScanSession::new(factory, OPTIONS, self.recorder.handoff())
            };
            self.session = session.with_previous_value(previous);
            self.events = events;
            self
        }

        /// Feed events into the session until `done` holds.
        async fn pump_until(&mut self, done: impl Fn(&ScanSession) -> bool) {
            let session = &mut self.session;
            let events = &mut self.events;
            let pump = async {
                while !done(&*session) {
                    match events.recv().await {
                        Some(event) => session.handle(event),
                        None => break,
                    }
                }
            };
            tokio::time::timeout(Duration::from_secs(2), pump).await.expect("session did not settle");
        }

        async fn scanning(media: MockMediaApi, decoder: ScriptedDecoder) -> Self {
            let mut harness = Self::new(media, decoder);
            harness.session.start(BackendKind::LiveStream).unwrap();
            harness.pump_until(|session| *session.state() == SessionState::Scanning).await;
            harness
        }
    }

    fn png() -> Vec<u8> {
        let image = GrayImage::from_pixel(16, 8, Luma([255]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[tokio::test]
    async fn test_scenario_a_seeded_duplicate_then_new_value() {
        let decoder = ScriptedDecoder::new().hit("ABC123").hit("ABC123").hit("XYZ999");
        let mut harness = Harness::new(MockMediaApi::granting(), decoder).seeded("ABC123");
        harness.session.start(BackendKind::LiveStream).unwrap();
        harness.pump_until(ScanSession::is_committed).await;
        assert_eq!(harness.session.committed_value(), Some("XYZ999"));
        assert_eq!(harness.media.live_tracks(), 0);
        assert!(harness.recorder.values().is_empty());
        assert!(harness.session.finish().await);
        assert_eq!(harness.recorder.values(), vec!["XYZ999"]);
        assert_eq!(harness.recorder.navigations(), 1);
    }

    #[tokio::test]
    async fn test_identical_decodes_commit_once() {
        let decoder = ScriptedDecoder::new().hit("ABC123").repeat_last();
        let mut harness = Harness::new(MockMediaApi::granting(), decoder);
        harness.session.start(BackendKind::WorkerLoop).unwrap();
        harness.pump_until(ScanSession::is_committed).await;
        assert!(harness.session.finish().await);
        while let Some(event) = harness.events.try_recv() {
            harness.session.handle(event);
        }
        assert_eq!(harness.recorder.values(), vec!["ABC123"]);
        assert_eq!(harness.recorder.navigations(), 1);
    }

    #[tokio::test]
    async fn test_first_distinct_value_wins() {
        let mut harness = Harness::scanning(MockMediaApi::granting(), ScriptedDecoder::new()).await;
        let generation = harness.session.generation();
        for text in ["FIRST", "SECOND"] {
            let event = BackendEvent::Decoded(DecodedEvent::new(text, Symbology::Code128));
            harness.session.handle(SessionEvent::Backend { generation, event });
        }
        assert_eq!(harness.session.committed_value(), Some("FIRST"));
        assert!(harness.session.finish().await);
        assert_eq!(harness.recorder.values(), vec!["FIRST"]);
    }

    #[tokio::test]
    async fn test_no_second_handoff_after_commit() {
        let mut harness = Harness::scanning(MockMediaApi::granting(), ScriptedDecoder::new()).await;
        harness.session.submit_code("LANE-1").unwrap();
        let generation = harness.session.generation();
        let late = BackendEvent::Decoded(DecodedEvent::new("LANE-2", Symbology::Code128));
        harness.session.handle(SessionEvent::Backend { generation, event: late });
        assert_eq!(*harness.session.skip().err().unwrap(), ErrorKind::AlreadyCommitted);
        assert_eq!(*harness.session.submit_code("LANE-3").err().unwrap(), ErrorKind::AlreadyCommitted);
        assert!(harness.session.finish().await);
        assert_eq!(harness.recorder.values(), vec!["LANE-1"]);
        assert_eq!(harness.recorder.navigations(), 1);
    }

    #[tokio::test]
    async fn test_scenario_b_still_image_not_found_then_retry_image() {
        let mut harness = Harness::new(MockMediaApi::granting(), ScriptedDecoder::new().miss().hit("LANE-42"));
        harness.session.start(BackendKind::StillImage).unwrap();
        assert_eq!(*harness.session.state(), SessionState::Scanning);
        assert_eq!(harness.media.acquisitions(), 0);

        harness.session.submit_image(ImageSource::Bytes(png())).unwrap();
        assert_eq!(harness.session.image_attempt(), Some(ImageAttempt::Pending));
        harness.pump_until(|session| session.image_attempt() == Some(ImageAttempt::NotFound)).await;
        assert_eq!(*harness.session.state(), SessionState::Scanning);
        assert!(harness.recorder.values().is_empty());

        harness.session.submit_image(ImageSource::Bytes(png())).unwrap();
        harness.pump_until(ScanSession::is_committed).await;
        assert!(harness.session.finish().await);
        assert_eq!(harness.recorder.values(), vec!["LANE-42"]);
    }

    #[tokio::test]
    async fn test_unreadable_image_keeps_scanning() {
        let mut harness = Harness::new(MockMediaApi::granting(), ScriptedDecoder::new());
        harness.session.start(BackendKind::StillImage).unwrap();
        harness.session.submit_image(ImageSource::Bytes(b"garbage".to_vec())).unwrap();
        harness.pump_until(|session| session.image_attempt() == Some(ImageAttempt::Unreadable)).await;
        assert_eq!(*harness.session.state(), SessionState::Scanning);
        assert_eq!(harness.decoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_images_rejected_by_camera_sessions() {
        let mut harness = Harness::scanning(MockMediaApi::granting(), ScriptedDecoder::new()).await;
        let err = harness.session.submit_image(ImageSource::Bytes(png())).err().unwrap();
        assert_eq!(*err, ErrorKind::WrongSource(BackendKind::LiveStream));
    }

    #[tokio::test]
    async fn test_scenario_c_skip_while_initializing() {
        let mut harness = Harness::new(MockMediaApi::new(Access::Hang), ScriptedDecoder::new());
        harness.session.start(BackendKind::LiveStream).unwrap();
        assert_eq!(*harness.session.state(), SessionState::Initializing);
        harness.session.skip().unwrap();
        assert_eq!(harness.recorder.records(), vec![crate::ScannedData::lane("")]);
        assert_eq!(harness.recorder.navigations(), 1);
        assert_eq!(harness.session.committed_value(), Some(""));
        assert!(harness.session.finish().await);
    }

    #[tokio::test]
    async fn test_scenario_d_permission_denied_then_retry() {
        let media = MockMediaApi::denying().then(Access::Granted);
        let mut harness = Harness::new(media, ScriptedDecoder::new());
        harness.session.start(BackendKind::LiveStream).unwrap();
        harness.pump_until(|session| session.state().is_failed()).await;
        assert_eq!(
            *harness.session.state(),
            SessionState::Failed(FailureReason::Capability(CaptureErrorKind::PermissionDenied))
        );
        harness.session.retry().unwrap();
        assert_eq!(*harness.session.state(), SessionState::Initializing);
        harness.pump_until(|session| *session.state() == SessionState::Scanning).await;
        assert_eq!(harness.media.acquisitions(), 1);
        assert!(harness.recorder.values().is_empty());
    }

    #[tokio::test]
    async fn test_probe_timeout_fails_session() {
        let mut harness = Harness::new(MockMediaApi::new(Access::Hang), ScriptedDecoder::new());
        harness.session.start(BackendKind::LiveStream).unwrap();
        harness.pump_until(|session| session.state().is_failed()).await;
        assert_eq!(
            *harness.session.state(),
            SessionState::Failed(FailureReason::Capability(CaptureErrorKind::DeviceUnavailable))
        );
    }

    #[tokio::test]
    async fn test_lost_stream_fails_and_retry_releases_first() {
        let media = MockMediaApi::granting().disconnect_after(3);
        let mut harness = Harness::scanning(media, ScriptedDecoder::new()).await;
        harness.pump_until(|session| session.state().is_failed()).await;
        assert_eq!(
            *harness.session.state(),
            SessionState::Failed(FailureReason::Backend(BackendErrorKind::FatalStreamError))
        );
        assert_eq!(harness.media.live_tracks(), 0);
        harness.session.retry().unwrap();
        harness.pump_until(|session| *session.state() == SessionState::Scanning).await;
        assert_eq!(harness.media.acquisitions(), 2);
        assert!(harness.media.live_tracks() <= 1);
    }

    #[rstest]
    #[case::idle("idle")]
    #[case::initializing("initializing")]
    #[case::scanning("scanning")]
    #[case::failed("failed")]
    #[tokio::test]
    async fn test_manual_override_from_any_open_state(#[case] from: &str) {
        let mut harness = match from {
            "idle" => Harness::new(MockMediaApi::granting(), ScriptedDecoder::new()),
            "initializing" => {
                let mut harness = Harness::new(MockMediaApi::new(Access::Hang), ScriptedDecoder::new());
                harness.session.start(BackendKind::LiveStream).unwrap();
                harness
            },
            "scanning" => Harness::scanning(MockMediaApi::granting(), ScriptedDecoder::new()).await,
            _ => {
                let mut harness = Harness::new(MockMediaApi::denying(), ScriptedDecoder::new());
                harness.session.start(BackendKind::LiveStream).unwrap();
                harness.pump_until(|session| session.state().is_failed()).await;
                harness
            },
        };
        assert_eq!(harness.session.submit_code("   ").err().map(|err| (*err).clone()), Some(ErrorKind::EmptyManualCode));
        assert_eq!(harness.session.submit_code("  A-01-07 \n").unwrap(), "A-01-07");
        assert_eq!(harness.recorder.values(), vec!["A-01-07"]);
        assert_eq!(harness.media.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_stop_is_safe_everywhere() {
        let mut harness = Harness::new(MockMediaApi::granting(), ScriptedDecoder::new());
        harness.session.stop();
        harness.session.stop();
        harness.session.start(BackendKind::LiveStream).unwrap();
        harness.session.stop();
        assert_eq!(*harness.session.state(), SessionState::Idle);
        harness.session.start(BackendKind::LiveStream).unwrap();
        harness.pump_until(|session| *session.state() == SessionState::Scanning).await;
        harness.session.stop();
        harness.session.stop();
        assert_eq!(*harness.session.state(), SessionState::Idle);
        harness.session.skip().unwrap();
        harness.session.stop();
        assert!(harness.session.is_committed());
        while let Some(event) = harness.events.try_recv() {
            harness.session.handle(event);
        }
        assert_eq!(harness.media.live_tracks(), 0);
        assert_eq!(harness.recorder.navigations(), 1);
    }

    #[tokio::test]
    async fn test_stop_releases_backend_that_started_but_was_not_collected() {
        let mut harness = Harness::new(MockMediaApi::granting(), ScriptedDecoder::new());
        harness.session.start(BackendKind::LiveStream).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.media.live_tracks(), 1);
        assert_eq!(*harness.session.state(), SessionState::Initializing);

        harness.session.stop();
        assert_eq!(harness.media.live_tracks(), 0);

        harness.session.start(BackendKind::LiveStream).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.media.acquisitions(), 2);
        assert_eq!(harness.media.live_tracks(), 1);
        harness.pump_until(|session| *session.state() == SessionState::Scanning).await;
        let tracks = harness.media.tracks();
        assert_eq!(tracks.len(), 2);
        assert!(!tracks[0].is_live());
        assert!(tracks[1].is_live());
    }

    #[tokio::test]
    async fn test_retry_releases_uncollected_backend_before_probing() {
        let media = MockMediaApi::granting().disconnect_after(0);
        let mut harness = Harness::new(media, ScriptedDecoder::new());
        harness.session.start(BackendKind::LiveStream).unwrap();
        harness.pump_until(|session| session.state().is_failed()).await;
        harness.session.retry().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        harness.session.stop();
        assert_eq!(harness.media.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let mut harness = Harness::new(MockMediaApi::granting(), ScriptedDecoder::new());
        assert!(matches!(*harness.session.retry().err().unwrap(), ErrorKind::InvalidState(SessionState::Idle)));
        harness.session.start(BackendKind::LiveStream).unwrap();
        let err = harness.session.start(BackendKind::LiveStream).err().unwrap();
        assert_eq!(*err, ErrorKind::InvalidState(SessionState::Initializing));
    }

    #[tokio::test]
    async fn test_zoom_is_clamped_and_controls_are_non_fatal() {
        let capabilities = CameraCapabilities { torch: false, zoom: Some(ZoomRange::new(1.0, 5.0, 0.1)) };
        let media = MockMediaApi::granting().with_capabilities(capabilities);
        let harness = Harness::scanning(media, ScriptedDecoder::new()).await;
        assert_eq!(harness.session.capabilities(), Some(capabilities));
        assert_eq!(harness.session.camera().set_zoom(12.0).await.unwrap(), 5.0);
        assert_eq!(harness.session.camera().set_zoom(0.2).await.unwrap(), 1.0);
        let err = harness.session.camera().set_torch(true).await.err().unwrap();
        assert_eq!(*err, ErrorKind::Control(CaptureErrorKind::Unsupported(Capability::Torch)));
        assert_eq!(*harness.session.state(), SessionState::Scanning);
        let applied = harness.media.last_track().unwrap().applied();
        assert_eq!(applied, vec![Constraint::Zoom(5.0), Constraint::Zoom(1.0)]);
    }

    #[tokio::test]
    async fn test_supported_torch_reaches_track() {
        let capabilities = CameraCapabilities { torch: true, zoom: None };
        let media = MockMediaApi::granting().with_capabilities(capabilities);
        let harness = Harness::scanning(media, ScriptedDecoder::new()).await;
        harness.session.camera().set_torch(true).await.unwrap();
        harness.session.camera().set_torch(false).await.unwrap();
        let err = harness.session.camera().set_zoom(2.0).await.err().unwrap();
        assert_eq!(*err, ErrorKind::Control(CaptureErrorKind::Unsupported(Capability::Zoom)));
        let applied = harness.media.last_track().unwrap().applied();
        assert_eq!(applied, vec![Constraint::Torch(true), Constraint::Torch(false)]);
    }

    #[tokio::test]
    async fn test_dropping_session_cancels_handoff_and_releases() {
        let mut harness = Harness::scanning(MockMediaApi::granting(), ScriptedDecoder::new()).await;
        let generation = harness.session.generation();
        let event = BackendEvent::Decoded(DecodedEvent::new("ABC123", Symbology::Code128));
        harness.session.handle(SessionEvent::Backend { generation, event });
        let Harness { session, recorder, media, .. } = harness;
        drop(session);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(recorder.values().is_empty());
        assert_eq!(media.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_follows_state() {
        let mut harness = Harness::new(MockMediaApi::granting(), ScriptedDecoder::new());
        let mut snapshots = harness.session.subscribe();
        harness.session.start(BackendKind::LiveStream).unwrap();
        harness.pump_until(|session| *session.state() == SessionState::Scanning).await;
        let snapshot = snapshots.borrow_and_update().clone();
        assert_eq!(snapshot.state, SessionState::Scanning);
        assert_eq!(snapshot.kind, Some(BackendKind::LiveStream));
        assert!(snapshot.capabilities.is_some());
        harness.session.skip().unwrap();
        assert_eq!(snapshots.borrow().committed.as_deref(), Some(""));
    }
}
