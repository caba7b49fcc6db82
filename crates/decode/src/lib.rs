//! Decoding seam for binscan.
//!
//! Pixel-level symbol recognition is not done here. This crate defines the
//! [`SymbolDecoder`] trait that external engines implement, the
//! [`Symbology`] tags they report, the [`DecodedEvent`] values the scan
//! session consumes, and [`load_frame`] for turning an uploaded photo into a
//! [`Frame`](binscan_capture::Frame) an engine can read.

mod engine;
pub mod error;
mod event;
mod loader;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod symbology;

pub use crate::engine::SymbolDecoder;
pub use crate::event::{DecodedEvent, Symbol};
pub use crate::loader::load_frame;
pub use crate::symbology::{DEFAULT_FORMATS, Formats, Symbology};
use std::sync::Arc;

pub type DecoderHandle = Arc<dyn SymbolDecoder + Send + Sync>;
