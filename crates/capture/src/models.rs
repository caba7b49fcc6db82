//! Capture models.

use derive_more::Display;

/// Which camera to ask for. Warehouse scanning wants the rear camera.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "lowercase"))]
pub enum Facing {
    #[default]
    #[display("environment")]
    Environment,
    #[display("user")]
    User,
}

/// A runtime control that a track may or may not support.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Capability {
    #[display("torch")]
    Torch,
    #[display("zoom")]
    Zoom,
}

/// A runtime adjustment applied to the active track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Constraint {
    Torch(bool),
    Zoom(f64),
}
impl Constraint {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Torch(_) => Capability::Torch,
            Self::Zoom(_) => Capability::Zoom,
        }
    }
}

/// Zoom levels reported by a track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}
impl ZoomRange {
    /// Create a range, swapping the bounds if a driver reports them backwards.
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        if min > max { Self { min: max, max: min, step } } else { Self { min, max, step } }
    }

    /// Clamp a requested level into the range. `NaN` maps to the minimum.
    /// Never panics, unlike [`f64::clamp`] on a range with `NaN` bounds.
    pub fn clamp(&self, level: f64) -> f64 {
        if level.is_nan() {
            return self.min;
        }
        level.max(self.min).min(self.max)
    }

    pub fn contains(&self, level: f64) -> bool {
        level >= self.min && level <= self.max
    }
}

/// Read-only snapshot of what the active track can do.
///
/// Derived from the track; recomputed whenever the track changes and never
/// mutated directly.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraCapabilities {
    pub torch: bool,
    pub zoom: Option<ZoomRange>,
}
impl CameraCapabilities {
    pub fn supports_torch(&self) -> bool {
        self.torch
    }

    pub fn supports_zoom(&self) -> bool {
        self.zoom.is_some()
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Torch => self.supports_torch(),
            Capability::Zoom => self.supports_zoom(),
        }
    }
}

/// A single 8-bit greyscale frame, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    luma: Vec<u8>,
}
impl Frame {
    /// Returns `None` when the buffer length doesn't match the dimensions.
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Option<Self> {
        let expected = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        (luma.len() == expected).then_some(Self { width, height, luma })
    }

    /// An all-white frame; what a camera pointed at nothing looks like to a
    /// decoder.
    pub fn blank(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize);
        Self { width, height, luma: vec![u8::MAX; len] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = (y as usize) * (self.width as usize);
        self.luma.get(start..start + self.width as usize)
    }
}
