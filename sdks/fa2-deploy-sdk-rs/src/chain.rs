//! Chain client boundary.
//!
//! The orchestrator only talks to the network through these traits. An RPC
//! backed implementation lives outside this crate; [`crate::sandbox`] provides
//! an in-process one.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{address::Address, artifacts::Artifacts, error::Result};

/// Amount in mutez (10^-6 tez).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mutez(pub u64);

impl fmt::Display for Mutez {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extensions a contract handle can be asked to carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Extension {
    /// TZIP-16 contract metadata
    Tzip16,
}

/// Inclusion receipt of a confirmed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub operation_hash: String,
    pub level: u64,
}

/// A submitted, not yet confirmed, operation.
#[async_trait]
pub trait PendingOperation: Send + Sync {
    fn hash(&self) -> &str;

    /// Suspend until the operation is included, or fail if it is rejected.
    async fn confirmation(&self) -> Result<Confirmation>;
}

/// Result of submitting an origination.
pub struct Origination<Op> {
    /// Address the contract will live at once the operation confirms
    pub contract_address: Address,
    pub operation: Op,
}

/// Live reference to a deployed contract.
#[async_trait]
pub trait ContractHandle: Send + Sync {
    type Operation: PendingOperation;

    fn address(&self) -> &Address;

    /// Current decoded storage, with record fields by name.
    async fn storage(&self) -> Result<Value>;

    /// Submit a call to the named entrypoint.
    async fn call_entrypoint(&self, entrypoint: &str, args: Value) -> Result<Self::Operation>;
}

/// TZIP-16 metadata as returned by [`MetadataView::fetch_metadata`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContractMetadata {
    pub uri: String,
    pub metadata: Value,
}

impl fmt::Display for ContractMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&body)
    }
}

/// Capability of fetching TZIP-16 metadata for a contract.
#[async_trait]
pub trait MetadataView: Send + Sync {
    async fn fetch_metadata(&self) -> Result<ContractMetadata>;
}

/// Network access used by the deployment workflow.
#[async_trait]
pub trait ChainClient: Send + Sync {
    type Operation: PendingOperation;
    type Contract: ContractHandle + MetadataView;

    async fn get_balance(&self, address: &Address) -> Result<Mutez>;

    /// Submit an origination signed by the client's signer.
    async fn originate(&self, artifacts: &Artifacts) -> Result<Origination<Self::Operation>>;

    /// Bind a handle to a live contract, with the requested extensions attached.
    async fn contract_at(
        &self,
        address: &Address,
        extensions: &[Extension],
    ) -> Result<Self::Contract>;
}
