//! Hex-encoded identifiers.
//!
//! A transaction ID is a 64-bit value carried as exactly 16 hex characters.
//! A checksum is an opaque hex string of any non-zero length. Both keep the
//! text they were decoded from, so re-encoding reproduces the wire form
//! byte for byte, including letter case.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Number of hex characters in an encoded transaction ID.
const TXID_WIDTH: usize = 16;

/// Error returned when a hex identifier cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseHexIdError {
    /// A transaction ID was not exactly 16 characters long.
    #[error("expected 16 hex characters, got {0}")]
    Length(usize),
    /// A checksum was empty.
    #[error("empty hex string")]
    Empty,
    /// The string contained a non-hex character.
    #[error("invalid hex character in {0:?}")]
    Digit(String),
}

fn check_hex_digits(s: &str) -> Result<(), ParseHexIdError> {
    // from_str_radix accepts a leading '+', the wire form does not
    if s.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ParseHexIdError::Digit(s.to_string()))
    }
}

/// Replicated transaction identifier.
///
/// Compares, orders and hashes by numeric value; `000000000000002A` and
/// `000000000000002a` are the same transaction. `Display` and serialization
/// reproduce the text it was parsed from.
#[derive(Clone, Copy)]
pub struct TxId {
    value: u64,
    text: [u8; TXID_WIDTH],
}

impl TxId {
    /// Returns the numeric value.
    pub fn as_u64(&self) -> u64 {
        self.value
    }

    /// Returns the hex text, as received or zero-padded lowercase.
    pub fn as_str(&self) -> &str {
        // only ASCII hex digits are ever stored
        std::str::from_utf8(&self.text).unwrap_or_default()
    }
}

impl From<u64> for TxId {
    fn from(value: u64) -> Self {
        let mut text = [0u8; TXID_WIDTH];
        text.copy_from_slice(format!("{value:016x}").as_bytes());
        Self { value, text }
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::from(0)
    }
}

impl PartialEq for TxId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for TxId {}

impl PartialOrd for TxId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TxId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for TxId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TxId").field(&self.as_str()).finish()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxId {
    type Err = ParseHexIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != TXID_WIDTH {
            return Err(ParseHexIdError::Length(s.len()));
        }
        check_hex_digits(s)?;
        let value =
            u64::from_str_radix(s, 16).map_err(|_| ParseHexIdError::Digit(s.to_string()))?;
        let mut text = [0u8; TXID_WIDTH];
        text.copy_from_slice(s.as_bytes());
        Ok(Self { value, text })
    }
}

/// Database checksum after a transaction is applied.
///
/// Opaque to the subscriber: any non-empty hex string is accepted and kept
/// verbatim. Equality is textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum(String);

impl Checksum {
    /// Returns the hex text as received.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value, if the checksum fits in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        u64::from_str_radix(&self.0, 16).ok()
    }
}

impl From<u64> for Checksum {
    /// Encodes `value` as 16 lowercase hex characters.
    fn from(value: u64) -> Self {
        Self(format!("{value:016x}"))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Checksum {
    type Err = ParseHexIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseHexIdError::Empty);
        }
        check_hex_digits(s)?;
        Ok(Self(s.to_string()))
    }
}

macro_rules! string_serde {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(TxId);
string_serde!(Checksum);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_u64_is_zero_padded() {
        assert_eq!(TxId::from(0x27).to_string(), "0000000000000027");
        assert_eq!(Checksum::from(u64::MAX).to_string(), "ffffffffffffffff");
    }

    #[test]
    fn txid_keeps_case_but_compares_by_value() {
        let lower: TxId = "000000000000002a".parse().unwrap();
        let upper: TxId = "000000000000002A".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.as_u64(), 42);
        assert_eq!(upper.to_string(), "000000000000002A");
    }

    #[test]
    fn txid_rejects_wrong_width() {
        assert_eq!("27".parse::<TxId>(), Err(ParseHexIdError::Length(2)));
        assert_eq!(
            "00000000000000270".parse::<TxId>(),
            Err(ParseHexIdError::Length(17))
        );
    }

    #[test]
    fn rejects_non_hex() {
        assert!(matches!(
            "000000000000002g".parse::<TxId>(),
            Err(ParseHexIdError::Digit(_))
        ));
        assert!(matches!(
            "+000000000000027".parse::<TxId>(),
            Err(ParseHexIdError::Digit(_))
        ));
        assert!(matches!("83x0".parse::<Checksum>(), Err(ParseHexIdError::Digit(_))));
        assert_eq!("".parse::<Checksum>(), Err(ParseHexIdError::Empty));
    }

    #[test]
    fn checksum_accepts_any_width() {
        let short: Checksum = "83b0".parse().unwrap();
        assert_eq!(short.as_str(), "83b0");
        assert_eq!(short.to_u64(), Some(0x83b0));

        let long: Checksum = "0123456789abcdef0123456789abcdef".parse().unwrap();
        assert_eq!(long.to_u64(), None);
    }

    #[test]
    fn checksum_keeps_case() {
        let upper: Checksum = "83B05248774CE767".parse().unwrap();
        assert_eq!(upper.to_string(), "83B05248774CE767");
        assert_ne!(upper, Checksum::from(0x83b0_5248_774c_e767));
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&TxId::from(39)).unwrap();
        assert_eq!(json, "\"0000000000000027\"");
        let back: TxId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TxId::from(39));
        assert!(serde_json::from_str::<TxId>("39").is_err());

        let checksum: Checksum = serde_json::from_str("\"83B0\"").unwrap();
        assert_eq!(serde_json::to_string(&checksum).unwrap(), "\"83B0\"");
    }

    proptest! {
        #[test]
        fn txid_text_round_trip(s in "[0-9a-fA-F]{16}") {
            let id: TxId = s.parse().unwrap();
            prop_assert_eq!(id.to_string(), s.clone());
            prop_assert_eq!(id.as_u64(), u64::from_str_radix(&s, 16).unwrap());
        }

        #[test]
        fn checksum_text_round_trip(s in "[0-9a-fA-F]{1,40}") {
            let checksum: Checksum = s.parse().unwrap();
            let json = serde_json::to_string(&checksum).unwrap();
            let back: Checksum = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back.as_str(), s.as_str());
        }
    }
}
