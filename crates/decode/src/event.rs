use crate::symbology::Symbology;
use time::UtcDateTime;

/// What an engine found in a single frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub text: String,
    pub format: Symbology,
}
impl Symbol {
    pub fn new(text: impl Into<String>, format: Symbology) -> Self {
        Self { text: text.into(), format }
    }
}

/// A successful decode, as delivered to the scan session.
///
/// Emitted by a backend each time a frame yields a symbol, so the same value
/// may arrive many times in a row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedEvent {
    pub text: String,
    pub format: Symbology,
    pub timestamp: UtcDateTime,
}
impl DecodedEvent {
    /// Stamp a decode with the current time.
    pub fn new(text: impl Into<String>, format: Symbology) -> Self {
        Self { text: text.into(), format, timestamp: UtcDateTime::now() }
    }
}

impl From<Symbol> for DecodedEvent {
    fn from(symbol: Symbol) -> Self {
        Self::new(symbol.text, symbol.format)
    }
}
