use crate::error::Result;
use crate::event::Symbol;
use crate::symbology::Symbology;
use binscan_capture::Frame;
use std::time::Duration;

/// A barcode recognition engine.
///
/// Engines are synchronous and may be CPU heavy; backends call
/// [`decode()`](Self::decode) off the async runtime.
pub trait SymbolDecoder: Send + Sync {
    /// Engine name, used for logging only.
    fn name(&self) -> &str;

    /// Look for a symbol of one of `formats` (in priority order) in `frame`.
    ///
    /// Returns `Ok(None)` when the frame holds no readable symbol. Errors are
    /// reserved for the engine itself failing.
    fn decode(&self, frame: &Frame, formats: &[Symbology]) -> Result<Option<Symbol>>;

    /// Preferred minimum time between attempts on a live stream, if the
    /// engine has one. `None` means "as fast as frames arrive".
    fn cadence(&self) -> Option<Duration> {
        None
    }
}
