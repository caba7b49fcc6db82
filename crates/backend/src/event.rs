use crate::error::ErrorKind;
use binscan_decode::DecodedEvent;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a backend reports to its owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    /// A frame yielded a symbol. Live backends repeat this for as long as
    /// the symbol stays in view.
    Decoded(DecodedEvent),
    /// The still image held no readable symbol. Not a failure.
    NotFound,
    /// The backend can no longer produce events.
    Fatal(ErrorKind),
}

/// The callback a backend delivers events through.
///
/// Cheap to clone; every clone feeds the same callback.
#[derive(Clone)]
pub struct EventSink {
    callback: Arc<dyn Fn(BackendEvent) + Send + Sync>,
}
impl EventSink {
    pub fn new(callback: impl Fn(BackendEvent) + Send + Sync + 'static) -> Self {
        Self { callback: Arc::new(callback) }
    }

    /// A sink feeding an unbounded channel, plus the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BackendEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self::new(move |event| {
            // Receiver gone means the owner stopped listening.
            let _ = tx.send(event);
        });
        (sink, rx)
    }

    pub fn emit(&self, event: BackendEvent) {
        (self.callback)(event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}
