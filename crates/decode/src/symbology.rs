//! Barcode symbologies and the ordered format preference list.

use crate::error::{Error, ErrorKind};
use derive_more::Display;
use std::str::FromStr;

/// A linear barcode symbology an engine may be asked to recognise.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum Symbology {
    #[display("code_128")]
    Code128,
    #[display("code_39")]
    Code39,
    #[display("ean_13")]
    Ean13,
    #[display("ean_8")]
    Ean8,
    #[display("upc_a")]
    UpcA,
    #[display("upc_e")]
    UpcE,
}

/// Tried in this order unless configured otherwise. Inventory labels in the
/// field are overwhelmingly Code 128.
pub const DEFAULT_FORMATS: [Symbology; 6] = [
    Symbology::Code128,
    Symbology::Ean13,
    Symbology::Ean8,
    Symbology::Code39,
    Symbology::UpcA,
    Symbology::UpcE,
];

impl FromStr for Symbology {
    type Err = Error;

    /// Accepts the canonical tag (`code_128`), upper case (`CODE_128`),
    /// unseparated (`code128`) and reader-style (`code_128_reader`) spellings.
    /// A bare `ean` means EAN-13.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let lowered = tag.trim().to_ascii_lowercase();
        let stem = lowered.strip_suffix("_reader").unwrap_or(&lowered);
        let normalized: String = stem.chars().filter(|c| !matches!(c, '_' | '-' | ' ')).collect();
        let symbology = match normalized.as_str() {
            "code128" => Self::Code128,
            "code39" => Self::Code39,
            "ean" | "ean13" => Self::Ean13,
            "ean8" => Self::Ean8,
            "upc" | "upca" => Self::UpcA,
            "upce" => Self::UpcE,
            _ => exn::bail!(ErrorKind::UnknownSymbology(tag.to_string())),
        };
        Ok(symbology)
    }
}

impl TryFrom<String> for Symbology {
    type Error = ErrorKind;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse::<Self>().map_err(|err| (*err).clone())
    }
}

impl From<Symbology> for String {
    fn from(symbology: Symbology) -> Self {
        symbology.to_string()
    }
}

/// Ordered, duplicate-free list of symbologies to try.
///
/// Order expresses priority; the first entry is the primary symbology.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "Vec<Symbology>", into = "Vec<Symbology>")
)]
pub struct Formats(Vec<Symbology>);
impl Formats {
    /// Build a list, keeping the first occurrence of each symbology.
    pub fn new(symbologies: impl IntoIterator<Item = Symbology>) -> Self {
        let mut list = Vec::new();
        for symbology in symbologies {
            if !list.contains(&symbology) {
                list.push(symbology);
            }
        }
        Self(list)
    }

    /// Parse a list of tags, failing on the first unknown one.
    pub fn parse<S: AsRef<str>>(tags: impl IntoIterator<Item = S>) -> crate::error::Result<Self> {
        tags.into_iter().map(|tag| tag.as_ref().parse::<Symbology>()).collect()
    }

    pub fn as_slice(&self) -> &[Symbology] {
        &self.0
    }

    pub fn primary(&self) -> Option<Symbology> {
        self.0.first().copied()
    }

    pub fn contains(&self, symbology: Symbology) -> bool {
        self.0.contains(&symbology)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Formats {
    fn default() -> Self {
        Self(DEFAULT_FORMATS.to_vec())
    }
}

impl From<Vec<Symbology>> for Formats {
    fn from(symbologies: Vec<Symbology>) -> Self {
        Self::new(symbologies)
    }
}

impl From<Formats> for Vec<Symbology> {
    fn from(formats: Formats) -> Self {
        formats.0
    }
}

impl FromIterator<Symbology> for Formats {
    fn from_iter<I: IntoIterator<Item = Symbology>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl std::fmt::Display for Formats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, symbology) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{symbology}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("code_128", Symbology::Code128)]
    #[case("CODE_128", Symbology::Code128)]
    #[case("code128", Symbology::Code128)]
    #[case("code_128_reader", Symbology::Code128)]
    #[case(" Code-39 ", Symbology::Code39)]
    #[case("ean", Symbology::Ean13)]
    #[case("EAN_8", Symbology::Ean8)]
    #[case("upc_e_reader", Symbology::UpcE)]
    fn test_parse_symbology(#[case] tag: &str, #[case] expected: Symbology) {
        assert_eq!(tag.parse::<Symbology>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_symbology() {
        let err = "qr_code".parse::<Symbology>().err().unwrap();
        assert_eq!(*err, ErrorKind::UnknownSymbology("qr_code".to_string()));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for symbology in DEFAULT_FORMATS {
            assert_eq!(symbology.to_string().parse::<Symbology>().unwrap(), symbology);
        }
    }

    #[test]
    fn test_default_priority() {
        let formats = Formats::default();
        assert_eq!(formats.primary(), Some(Symbology::Code128));
        assert_eq!(formats.len(), 6);
        assert_eq!(formats.to_string(), "code_128, ean_13, ean_8, code_39, upc_a, upc_e");
    }

    #[test]
    fn test_formats_dedupe_keeps_first() {
        let formats = Formats::parse(["EAN_13", "code_128", "ean"]).unwrap();
        assert_eq!(formats.as_slice(), &[Symbology::Ean13, Symbology::Code128]);
        assert!(Formats::parse(["code_128", "aztec"]).is_err());
    }
}
