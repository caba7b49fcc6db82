//! Scan session orchestration for binscan.
//!
//! A [`ScanSession`] owns at most one decode backend, filters its events
//! down to a single committed lane code and hands that code to the form
//! exactly once. The [`driver`] module wraps a session in a task for UI
//! shells that want a cloneable [`SessionHandle`].

mod camera;
pub mod driver;
pub mod error;
mod handoff;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod session;
mod state;

pub use crate::camera::CameraController;
pub use crate::driver::{SessionHandle, spawn};
pub use crate::handoff::{FormSink, Handoff, Navigator, PendingHandoff, ScannedData};
pub use crate::session::{DEFAULT_FEEDBACK_DELAY, ScanSession, SessionEvent, SessionEvents, SessionOptions};
pub use crate::state::{FailureReason, ImageAttempt, SessionState, Snapshot};
pub use binscan_backend::{BackendKind, ImageSource};
use std::sync::Arc;

pub type FormHandle = Arc<dyn FormSink + Send + Sync>;
pub type NavigatorHandle = Arc<dyn Navigator + Send + Sync>;
