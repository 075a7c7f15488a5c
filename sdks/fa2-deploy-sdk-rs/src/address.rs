//! Base58check account and contract addresses.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::DeployError;

const PAYLOAD_LEN: usize = 20;

/// Known address prefixes: (human prefix, version bytes).
const PREFIXES: [(&str, [u8; 3]); 5] = [
    ("tz1", [6, 161, 159]),
    ("tz2", [6, 161, 161]),
    ("tz3", [6, 161, 164]),
    ("tz4", [6, 161, 166]),
    ("KT1", [2, 90, 121]),
];

const TZ1: [u8; 3] = [6, 161, 159];
const KT1: [u8; 3] = [2, 90, 121];

/// A validated implicit account (`tz1`…`tz4`) or originated contract (`KT1`) address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and checksum-validate an address.
    pub fn parse(s: &str) -> Result<Self, DeployError> {
        let bytes = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| DeployError::InvalidAddress(format!("{s}: {e}")))?;

        if bytes.len() != 3 + PAYLOAD_LEN {
            return Err(DeployError::InvalidAddress(format!(
                "{s}: expected {} payload bytes, got {}",
                3 + PAYLOAD_LEN,
                bytes.len()
            )));
        }

        let known = PREFIXES
            .iter()
            .any(|(text, version)| s.starts_with(text) && bytes[..3] == version[..]);
        if !known {
            return Err(DeployError::InvalidAddress(format!("{s}: unknown prefix")));
        }

        Ok(Self(s.to_string()))
    }

    /// Build a contract address from a 20-byte hash.
    pub fn contract_from_hash(hash: [u8; PAYLOAD_LEN]) -> Self {
        Self::encode(KT1, &hash)
    }

    /// Build a `tz1` account address from a 20-byte public key hash.
    pub fn tz1_from_hash(hash: [u8; PAYLOAD_LEN]) -> Self {
        Self::encode(TZ1, &hash)
    }

    fn encode(version: [u8; 3], hash: &[u8; PAYLOAD_LEN]) -> Self {
        let mut bytes = version.to_vec();
        bytes.extend_from_slice(hash);
        Self(bs58::encode(bytes).with_check().into_string())
    }

    /// True for originated (`KT1`) contract addresses.
    pub fn is_contract(&self) -> bool {
        self.0.starts_with("KT1")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = DeployError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "tz1NbEC653mQc1M8GhmAkNdqBogF2wFzGWEw";

    #[test]
    fn parses_implicit_account() {
        let addr = Address::parse(OWNER).unwrap();
        assert_eq!(addr.as_str(), OWNER);
        assert!(!addr.is_contract());
    }

    #[test]
    fn contract_addresses_roundtrip() {
        let kt1 = Address::contract_from_hash([7u8; 20]);
        assert!(kt1.as_str().starts_with("KT1"));
        assert_eq!(kt1.as_str().len(), 36);
        assert!(kt1.is_contract());
        assert_eq!(Address::parse(kt1.as_str()).unwrap(), kt1);
    }

    #[test]
    fn tz1_from_hash_is_parseable() {
        let tz1 = Address::tz1_from_hash([7u8; 20]);
        assert!(tz1.as_str().starts_with("tz1"));
        assert!(!tz1.is_contract());
        assert_eq!(Address::parse(tz1.as_str()).unwrap(), tz1);
    }

    #[test]
    fn rejects_bad_checksum_and_garbage() {
        let mut corrupted = OWNER.to_string();
        corrupted.pop();
        corrupted.push('x');
        assert!(Address::parse(&corrupted).is_err());
        assert!(Address::parse("").is_err());
        assert!(Address::parse("not-an-address").is_err());
    }

    #[test]
    fn rejects_unknown_prefix() {
        // Valid base58check, wrong version bytes.
        let mut bytes = vec![1u8, 2, 3];
        bytes.extend_from_slice(&[0u8; 20]);
        let s = bs58::encode(bytes).with_check().into_string();
        assert!(matches!(
            Address::parse(&s),
            Err(DeployError::InvalidAddress(_))
        ));
    }
}
