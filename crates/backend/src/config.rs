//! Backend selection and configuration.

use binscan_capture::Facing;
use binscan_decode::Formats;
use derive_more::Display;
use std::time::Duration;

pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 100;

/// Where frames come from.
///
/// Serialized in snake_case like every other configuration key; the
/// camelCase spellings are accepted on input.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum SourceMode {
    #[default]
    #[display("live_stream")]
    #[cfg_attr(feature = "serde", serde(alias = "liveStream"))]
    LiveStream,
    #[display("still_image")]
    #[cfg_attr(feature = "serde", serde(alias = "stillImage"))]
    StillImage,
}

/// The three-way scanner toggle. Chosen once per session.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum BackendKind {
    #[default]
    #[display("live_stream")]
    #[cfg_attr(feature = "serde", serde(alias = "liveStream"))]
    LiveStream,
    #[display("still_image")]
    #[cfg_attr(feature = "serde", serde(alias = "stillImage"))]
    StillImage,
    #[display("worker_loop")]
    #[cfg_attr(feature = "serde", serde(alias = "workerLoop"))]
    WorkerLoop,
}
impl BackendKind {
    pub fn source_mode(&self) -> SourceMode {
        match self {
            Self::LiveStream | Self::WorkerLoop => SourceMode::LiveStream,
            Self::StillImage => SourceMode::StillImage,
        }
    }

    pub fn uses_camera(&self) -> bool {
        self.source_mode() == SourceMode::LiveStream
    }
}

/// Settings a backend is built from. Immutable once the backend exists; the
/// backend keeps its own copy.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct ScannerBackendConfig {
    /// Symbologies to try, highest priority first.
    pub preferred_formats: Formats,
    pub facing: Facing,
    /// Sampling interval of the [worker loop](crate::WorkerLoopBackend).
    pub frame_interval_ms: u64,
    pub source_mode: SourceMode,
}
impl ScannerBackendConfig {
    /// Sampling interval, never zero.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for ScannerBackendConfig {
    fn default() -> Self {
        Self {
            preferred_formats: Formats::default(),
            facing: Facing::Environment,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            source_mode: SourceMode::LiveStream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BackendKind::LiveStream, SourceMode::LiveStream)]
    #[case(BackendKind::WorkerLoop, SourceMode::LiveStream)]
    #[case(BackendKind::StillImage, SourceMode::StillImage)]
    fn test_source_mode(#[case] kind: BackendKind, #[case] expected: SourceMode) {
        assert_eq!(kind.source_mode(), expected);
        assert_eq!(kind.uses_camera(), expected == SourceMode::LiveStream);
    }

    #[test]
    fn test_frame_interval_never_zero() {
        let config = ScannerBackendConfig { frame_interval_ms: 0, ..Default::default() };
        assert_eq!(config.frame_interval(), Duration::from_millis(1));
        assert_eq!(ScannerBackendConfig::default().frame_interval(), Duration::from_millis(100));
    }
}
