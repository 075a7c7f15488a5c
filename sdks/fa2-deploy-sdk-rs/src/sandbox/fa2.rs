//! FA2 contract semantics for the sandbox ledger.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::{
    address::Address,
    error::{DeployError, Result},
};

pub const NOT_ADMIN: &str = "FA2_NOT_ADMIN";
pub const TX_DENIED: &str = "FA2_TX_DENIED";
pub const OPERATORS_UNSUPPORTED: &str = "FA2_OPERATORS_UNSUPPORTED";

/// Storage of the FA2 contract:
/// `pair (pair %metadata %minter) (pair %next_token_id (pair %token_metadata %token_owners))`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fa2Storage {
    pub metadata: BTreeMap<String, Vec<u8>>,
    pub minter: Address,
    pub next_token_id: u64,
    pub token_metadata: BTreeMap<u64, BTreeMap<String, Vec<u8>>>,
    pub token_owners: BTreeMap<u64, Address>,
}

#[derive(Deserialize)]
struct MintArgs {
    owner: String,
    metadata: BTreeMap<String, String>,
}

impl Fa2Storage {
    /// Decode the initial storage expression.
    pub fn from_micheline(value: &Value) -> Result<Self> {
        let top = comb(value).ok_or_else(|| bad("storage is not a pair"))?;
        let [head, next_token_id, token_metadata, token_owners] = top.as_slice() else {
            return Err(bad(format!("expected 4 top-level fields, got {}", top.len())));
        };
        let head = comb(head).ok_or_else(|| bad("metadata/minter is not a pair"))?;
        let [metadata, minter] = head.as_slice() else {
            return Err(bad("expected (metadata, minter)"));
        };

        let metadata = elts(metadata)?
            .into_iter()
            .map(|(k, v)| Ok((string(k)?, bytes(v)?)))
            .collect::<Result<_>>()?;

        let minter = Address::parse(&string(minter)?)?;
        let next_token_id = nat(next_token_id)?;

        let token_metadata = elts(token_metadata)?
            .into_iter()
            .map(|(k, v)| {
                let inner = elts(v)?
                    .into_iter()
                    .map(|(ik, iv)| Ok((string(ik)?, bytes(iv)?)))
                    .collect::<Result<_>>()?;
                Ok((nat(k)?, inner))
            })
            .collect::<Result<_>>()?;

        let token_owners = elts(token_owners)?
            .into_iter()
            .map(|(k, v)| Ok((nat(k)?, Address::parse(&string(v)?)?)))
            .collect::<Result<_>>()?;

        Ok(Self {
            metadata,
            minter,
            next_token_id,
            token_metadata,
            token_owners,
        })
    }

    /// Storage with record fields by name; nats as decimal strings, bytes as hex.
    pub fn to_json(&self) -> Value {
        let hex_map = |m: &BTreeMap<String, Vec<u8>>| -> Value {
            m.iter()
                .map(|(k, v)| (k.clone(), Value::String(hex::encode(v))))
                .collect::<Map<_, _>>()
                .into()
        };

        let token_metadata: Map<String, Value> = self
            .token_metadata
            .iter()
            .map(|(id, md)| (id.to_string(), hex_map(md)))
            .collect();
        let token_owners: Map<String, Value> = self
            .token_owners
            .iter()
            .map(|(id, owner)| (id.to_string(), Value::String(owner.to_string())))
            .collect();

        json!({
            "metadata": hex_map(&self.metadata),
            "minter": self.minter.as_str(),
            "next_token_id": self.next_token_id.to_string(),
            "token_metadata": token_metadata,
            "token_owners": token_owners,
        })
    }

    /// Execute an entrypoint as `sender`. On failure the storage is unchanged.
    pub fn call(&mut self, sender: &Address, entrypoint: &str, args: &Value) -> Result<(), String> {
        match entrypoint {
            "mint" => self.mint(sender, args),
            "transfer" => Err(TX_DENIED.to_string()),
            "update_operators" => Err(OPERATORS_UNSUPPORTED.to_string()),
            // Responses go to a callback contract, which the sandbox does not run.
            "balance_of" => Ok(()),
            other => Err(format!("unknown entrypoint `{other}`")),
        }
    }

    fn mint(&mut self, sender: &Address, args: &Value) -> Result<(), String> {
        if sender != &self.minter {
            return Err(NOT_ADMIN.to_string());
        }

        let args: MintArgs =
            serde_json::from_value(args.clone()).map_err(|e| format!("bad mint argument: {e}"))?;
        let owner = Address::parse(&args.owner).map_err(|e| e.to_string())?;
        let metadata = args
            .metadata
            .into_iter()
            .map(|(k, v)| {
                let bytes = hex::decode(&v).map_err(|e| format!("{k}: bad bytes: {e}"))?;
                Ok((k, bytes))
            })
            .collect::<Result<BTreeMap<_, _>, String>>()?;

        let id = self.next_token_id;
        self.token_owners.insert(id, owner);
        self.token_metadata.insert(id, metadata);
        self.next_token_id += 1;
        Ok(())
    }
}

fn bad(reason: impl Into<String>) -> DeployError {
    DeployError::artifact("storage", reason)
}

// Flatten a right comb: Pair a (Pair b c) and [a, b, c] both give [a, b, c].
fn comb(value: &Value) -> Option<Vec<&Value>> {
    let args: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) if value.get("prim").and_then(Value::as_str) == Some("Pair") => {
            value.get("args")?.as_array()?.iter().collect()
        }
        _ => return None,
    };

    let (last, init) = args.split_last()?;
    let last: &Value = *last;
    let mut out: Vec<&Value> = init.to_vec();
    let is_pair = last.get("prim").and_then(Value::as_str) == Some("Pair");
    match comb(last) {
        Some(rest) if is_pair => out.extend(rest),
        _ => out.push(last),
    }
    Some(out)
}

fn elts(value: &Value) -> Result<Vec<(&Value, &Value)>> {
    let items = value
        .as_array()
        .ok_or_else(|| bad(format!("expected a map literal, got {value}")))?;
    items
        .iter()
        .map(|item| {
            if item.get("prim").and_then(Value::as_str) != Some("Elt") {
                return Err(bad(format!("expected Elt, got {item}")));
            }
            match item.get("args").and_then(Value::as_array).map(Vec::as_slice) {
                Some([k, v]) => Ok((k, v)),
                _ => Err(bad(format!("malformed Elt {item}"))),
            }
        })
        .collect()
}

fn string(value: &Value) -> Result<String> {
    value
        .get("string")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| bad(format!("expected string, got {value}")))
}

fn bytes(value: &Value) -> Result<Vec<u8>> {
    let hex = value
        .get("bytes")
        .and_then(Value::as_str)
        .ok_or_else(|| bad(format!("expected bytes, got {value}")))?;
    hex::decode(hex).map_err(|e| bad(format!("bad bytes literal: {e}")))
}

fn nat(value: &Value) -> Result<u64> {
    value
        .get("int")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| bad(format!("expected nat, got {value}")))
}
