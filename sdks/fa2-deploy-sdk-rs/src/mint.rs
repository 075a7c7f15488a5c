//! Mint requests and the mint plan file.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    error::{DeployError, Result},
    pack::{pack, unpack, PackedValue},
};

/// Default location of the mint plan.
pub const DEFAULT_MINTS_PATH: &str = "artifacts/mints.json";

/// Argument of the contract's `mint` entrypoint.
///
/// Serializes to `{"owner": "...", "metadata": {"key": "0501..."}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub owner: Address,
    pub metadata: BTreeMap<String, PackedValue>,
}

impl MintRequest {
    /// Build a request, packing each plain-text metadata value.
    pub fn new<K, V>(owner: Address, metadata: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        Self {
            owner,
            metadata: metadata
                .into_iter()
                .map(|(k, v)| (k.into(), pack(v.as_ref())))
                .collect(),
        }
    }

    /// Metadata with every value unpacked back to text.
    pub fn metadata_text(&self) -> Result<BTreeMap<String, String>> {
        self.metadata
            .iter()
            .map(|(k, v)| Ok((k.clone(), unpack(v)?)))
            .collect()
    }
}

/// Plan file entry: metadata given as plain strings.
#[derive(Debug, Deserialize)]
struct PlannedMint {
    owner: String,
    metadata: BTreeMap<String, String>,
}

/// Load the ordered mint plan, packing metadata values up front.
pub fn load_mint_plan(path: impl AsRef<Path>) -> Result<Vec<MintRequest>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DeployError::artifact(path, format!("read failed: {e}")))?;
    parse_mint_plan(&raw).map_err(|e| match e {
        DeployError::Artifact { reason, .. } => DeployError::artifact(path, reason),
        other => other,
    })
}

/// Parse a mint plan from JSON text.
pub fn parse_mint_plan(json: &str) -> Result<Vec<MintRequest>> {
    let planned: Vec<PlannedMint> = serde_json::from_str(json)
        .map_err(|e| DeployError::artifact("mints", format!("invalid json: {e}")))?;

    planned
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let owner = Address::parse(&p.owner)
                .map_err(|e| DeployError::artifact("mints", format!("entry {i}: {e}")))?;
            Ok(MintRequest::new(owner, p.metadata))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "tz1NbEC653mQc1M8GhmAkNdqBogF2wFzGWEw";

    #[test]
    fn request_serializes_as_entrypoint_argument() {
        let req = MintRequest::new(
            Address::parse(OWNER).unwrap(),
            [("decimals", "0"), ("key1", "baab")],
        );
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["owner"], OWNER);
        assert_eq!(v["metadata"]["decimals"], "05010000000130");
        assert_eq!(v["metadata"]["key1"], "05010000000462616162");
    }

    #[test]
    fn plan_keeps_order_and_packs_values() {
        let plan = parse_mint_plan(&format!(
            r#"[
                {{"owner": "{OWNER}", "metadata": {{"key1": "baab"}}}},
                {{"owner": "{OWNER}", "metadata": {{"key1": "abba"}}}}
            ]"#
        ))
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].metadata_text().unwrap()["key1"], "baab");
        assert_eq!(plan[1].metadata_text().unwrap()["key1"], "abba");
    }

    #[test]
    fn plan_rejects_bad_owner() {
        let err = parse_mint_plan(r#"[{"owner": "tz1nope", "metadata": {}}]"#).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("entry 0"));
    }
}
