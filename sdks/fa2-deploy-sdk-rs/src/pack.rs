//! Michelson `PACK` encoding of string metadata values.
//!
//! A packed string is `05` (packed data tag) `01` (string tag), a 4-byte
//! big-endian length and the UTF-8 payload, all rendered as lowercase hex.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PackError;

const PACK_TAG: &str = "05";
const STRING_TAG: &str = "01";
const HEADER_LEN: usize = 4 + 8;

/// One encoded metadata entry, as hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackedValue(String);

impl PackedValue {
    /// Validate and wrap an already-packed hex string.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, PackError> {
        let hex = hex.into().to_ascii_lowercase();
        decode(&hex)?;
        Ok(Self(hex))
    }

    /// Hex form, as sent to the contract.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Raw bytes of the packed value.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Constructors guarantee well-formed hex.
        hex::decode(&self.0).unwrap_or_default()
    }

    /// Byte length of the payload, as declared by the length prefix.
    pub fn payload_len(&self) -> u32 {
        u32::from_str_radix(&self.0[4..HEADER_LEN], 16).unwrap_or_default()
    }
}

impl fmt::Display for PackedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackedValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<PackedValue> for String {
    fn from(value: PackedValue) -> Self {
        value.0
    }
}

impl TryFrom<String> for PackedValue {
    type Error = PackError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PackedValue::from_hex(value)
    }
}

/// Pack a string the way the contract expects metadata values.
///
/// # Panics
///
/// Panics if `value` is longer than `u32::MAX` bytes, the most the 4-byte
/// length prefix can express.
pub fn pack(value: &str) -> PackedValue {
    let payload = hex::encode(value.as_bytes());
    let byte_count = payload.len() / 2;
    let byte_count = u32::try_from(byte_count).expect("packed strings are limited to 2^32 - 1 bytes");
    PackedValue(format!("{PACK_TAG}{STRING_TAG}{byte_count:08x}{payload}"))
}

/// Recover the original string from a packed value.
pub fn unpack(value: &PackedValue) -> Result<String, PackError> {
    decode(value.as_hex())
}

fn decode(hex: &str) -> Result<String, PackError> {
    if !hex.is_ascii() {
        return Err(PackError::InvalidHex(hex.to_string()));
    }
    if !hex.starts_with("0501") {
        return Err(PackError::InvalidTag);
    }
    if hex.len() < HEADER_LEN {
        return Err(PackError::TruncatedLength);
    }

    let declared = u32::from_str_radix(&hex[4..HEADER_LEN], 16)
        .map_err(|_| PackError::InvalidHex(hex[4..HEADER_LEN].to_string()))?;
    let payload = hex::decode(&hex[HEADER_LEN..]).map_err(|e| PackError::InvalidHex(e.to_string()))?;

    if payload.len() != declared as usize {
        return Err(PackError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    String::from_utf8(payload).map_err(|_| PackError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_known_vectors() {
        assert_eq!(pack("").as_hex(), "050100000000");
        assert_eq!(pack("0").as_hex(), "05010000000130");
        assert_eq!(pack("baab").as_hex(), "05010000000462616162");
        assert_eq!(pack("eeee").as_hex(), "05010000000465656565");
    }

    #[test]
    fn length_prefix_counts_bytes_not_chars() {
        let long = "x".repeat(300);
        for s in ["", "a", "héllo", "日本語", "🦀🦀", long.as_str()] {
            let packed = pack(s);
            let hex = packed.as_hex();
            assert!(hex.starts_with("0501"));
            let declared = u32::from_str_radix(&hex[4..12], 16).unwrap();
            assert_eq!(declared as usize, s.len(), "prefix for {s:?}");
            assert_eq!(hex.len(), 4 + 8 + 2 * s.len());
            assert_eq!(packed.payload_len() as usize, s.len());
        }
    }

    #[test]
    fn pack_is_deterministic() {
        assert_eq!(pack("abba"), pack("abba"));
    }

    #[test]
    fn unpack_recovers_input() {
        for s in ["", "0", "baab", "tezos-storage:content", "日本語"] {
            assert_eq!(unpack(&pack(s)).unwrap(), s);
        }
    }

    #[test]
    fn from_hex_rejects_malformed_values() {
        assert_eq!(PackedValue::from_hex("0502000000"), Err(PackError::InvalidTag));
        assert_eq!(PackedValue::from_hex("0501000"), Err(PackError::TruncatedLength));
        assert_eq!(
            PackedValue::from_hex("05010000000230"),
            Err(PackError::LengthMismatch {
                declared: 2,
                actual: 1
            })
        );
        assert!(matches!(
            PackedValue::from_hex("0501000000013z"),
            Err(PackError::InvalidHex(_))
        ));
        assert_eq!(
            PackedValue::from_hex("050100000001ff"),
            Err(PackError::InvalidUtf8)
        );
    }

    #[test]
    fn from_hex_normalises_case() {
        let v = PackedValue::from_hex("05010000000462616162").unwrap();
        assert_eq!(v, PackedValue::from_hex("05010000000462616162".to_uppercase()).unwrap());
    }

    #[test]
    fn serde_roundtrip_validates() {
        let json = serde_json::to_string(&pack("0")).unwrap();
        assert_eq!(json, "\"05010000000130\"");
        let err = serde_json::from_str::<PackedValue>("\"0601\"");
        assert!(err.is_err());
    }
}
