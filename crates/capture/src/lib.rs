//! Camera acquisition for binscan.
//!
//! This crate owns everything that touches a capture device: the
//! [`MediaApi`] that hands out tracks, the [`VideoTrack`] that produces
//! [`Frame`]s and accepts runtime [`Constraint`]s (torch, zoom), and the
//! capability [`probe`] that gates every camera-based scan.
//!
//! The capture track is the one exclusively owned resource in a scan session.
//! Whoever holds a [`TrackHandle`] is responsible for calling
//! [`VideoTrack::stop`] once they are done with it; a stale track keeps the
//! camera locked and prevents the next backend from acquiring it.

pub mod error;
mod media;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod models;
mod probe;

pub use crate::media::{MediaApi, VideoTrack, apply_supported};
pub use crate::models::{CameraCapabilities, Capability, Constraint, Facing, Frame, ZoomRange};
pub use crate::probe::{DEFAULT_PROBE_TIMEOUT, Ready, SupportReport, diagnose, probe};
use std::sync::Arc;

pub type MediaApiHandle = Arc<dyn MediaApi + Send + Sync>;
pub type TrackHandle = Arc<dyn VideoTrack + Send + Sync>;
