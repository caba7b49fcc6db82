//! Decode backends for binscan.
//!
//! A backend turns a frame source into [`BackendEvent`]s. Three variants
//! share the [`DecodeBackend`] contract:
//!
//! - [`LiveStreamBackend`] decodes a camera track continuously.
//! - [`WorkerLoopBackend`] samples a camera track on a fixed timer and hands
//!   frames to a single decode worker.
//! - [`StillImageBackend`] makes one attempt on one image.
//!
//! Backends are single-use. The scan session builds them through a
//! [`BackendFactory`] and owns at most one at a time.

mod attempt;
pub mod backend;
mod config;
pub mod error;
mod event;
mod factory;

pub use crate::attempt::Attempt;
pub use crate::backend::{DecodeBackend, ImageSource, LiveStreamBackend, StillImageBackend, WorkerLoopBackend};
pub use crate::config::{BackendKind, DEFAULT_FRAME_INTERVAL_MS, ScannerBackendConfig, SourceMode};
pub use crate::event::{BackendEvent, EventSink};
pub use crate::factory::BackendFactory;

pub type BackendHandle = Box<dyn DecodeBackend + Send + Sync>;
