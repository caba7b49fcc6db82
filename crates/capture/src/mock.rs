//! In-memory capture devices for testing.

use crate::TrackHandle;
use crate::error::{ErrorKind, Result};
use crate::media::{MediaApi, VideoTrack};
use crate::models::{CameraCapabilities, Constraint, Facing, Frame};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How a [`MockMediaApi`] answers an acquisition request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
    Unavailable,
    /// Never answers, like a permission prompt the user ignores.
    Hang,
}

/// A scriptable [`MediaApi`].
///
/// Answers acquisitions from a queue of [`Access`] outcomes; the last outcome
/// is repeated once the queue runs down. Every granted track is kept so tests
/// can assert it was released.
pub struct MockMediaApi {
    name: String,
    supported: bool,
    access: Mutex<VecDeque<Access>>,
    capabilities: CameraCapabilities,
    frame_interval: Duration,
    disconnect_after: Option<usize>,
    tracks: Mutex<Vec<Arc<MockTrack>>>,
}

impl MockMediaApi {
    pub fn new(access: Access) -> Self {
        Self {
            name: "mock".to_string(),
            supported: true,
            access: Mutex::new(VecDeque::from([access])),
            capabilities: CameraCapabilities::default(),
            frame_interval: Duration::from_millis(2),
            disconnect_after: None,
            tracks: Mutex::new(Vec::new()),
        }
    }

    pub fn granting() -> Self {
        Self::new(Access::Granted)
    }

    pub fn denying() -> Self {
        Self::new(Access::Denied)
    }

    /// A runtime without any capture API.
    pub fn unsupported() -> Self {
        Self { supported: false, ..Self::granting() }
    }

    /// Queue another outcome for the next acquisition.
    pub fn then(self, access: Access) -> Self {
        lock(&self.access).push_back(access);
        self
    }

    pub fn with_capabilities(mut self, capabilities: CameraCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Tracks report [`DeviceUnavailable`](ErrorKind::DeviceUnavailable)
    /// after serving `frames` frames, like a camera being unplugged.
    pub fn disconnect_after(mut self, frames: usize) -> Self {
        self.disconnect_after = Some(frames);
        self
    }

    /// Number of tracks handed out so far.
    pub fn acquisitions(&self) -> usize {
        lock(&self.tracks).len()
    }

    /// Number of handed-out tracks that haven't been stopped.
    pub fn live_tracks(&self) -> usize {
        lock(&self.tracks).iter().filter(|track| track.is_live()).count()
    }

    pub fn tracks(&self) -> Vec<Arc<MockTrack>> {
        lock(&self.tracks).clone()
    }

    pub fn last_track(&self) -> Option<Arc<MockTrack>> {
        lock(&self.tracks).last().cloned()
    }

    fn next_access(&self) -> Access {
        let mut queue = lock(&self.access);
        match queue.len() {
            0 => Access::Unavailable,
            1 => queue[0],
            _ => queue.pop_front().unwrap_or(Access::Unavailable),
        }
    }
}

#[async_trait]
impl MediaApi for MockMediaApi {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn acquire(&self, facing: Facing) -> Result<TrackHandle> {
        match self.next_access() {
            Access::Granted => {
                let track = Arc::new(MockTrack {
                    label: format!("{} camera ({facing})", self.name),
                    capabilities: self.capabilities,
                    frame_interval: self.frame_interval,
                    disconnect_after: self.disconnect_after,
                    frames: AtomicUsize::new(0),
                    stopped: AtomicBool::new(false),
                    applied: Mutex::new(Vec::new()),
                });
                lock(&self.tracks).push(track.clone());
                Ok(track)
            },
            Access::Denied => exn::bail!(ErrorKind::PermissionDenied),
            Access::Unavailable => exn::bail!(ErrorKind::DeviceUnavailable),
            Access::Hang => std::future::pending().await,
        }
    }
}

/// A [`VideoTrack`] serving blank frames at a fixed interval.
pub struct MockTrack {
    label: String,
    capabilities: CameraCapabilities,
    frame_interval: Duration,
    disconnect_after: Option<usize>,
    frames: AtomicUsize,
    stopped: AtomicBool,
    applied: Mutex<Vec<Constraint>>,
}

impl MockTrack {
    /// Every constraint that reached the track, in order.
    pub fn applied(&self) -> Vec<Constraint> {
        lock(&self.applied).clone()
    }

    pub fn frames_served(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoTrack for MockTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn capabilities(&self) -> CameraCapabilities {
        self.capabilities
    }

    async fn apply(&self, constraint: Constraint) -> Result<()> {
        if !self.capabilities.supports(constraint.capability()) {
            exn::bail!(ErrorKind::Unsupported(constraint.capability()));
        }
        lock(&self.applied).push(constraint);
        Ok(())
    }

    async fn next_frame(&self) -> Result<Frame> {
        if !self.is_live() {
            exn::bail!(ErrorKind::DeviceUnavailable);
        }
        tokio::time::sleep(self.frame_interval).await;
        let served = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.is_live() || self.disconnect_after.is_some_and(|limit| served > limit) {
            exn::bail!(ErrorKind::DeviceUnavailable);
        }
        Ok(Frame::blank(8, 8))
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

// Poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
