//! FA2 deploy SDK (client-side workflow)
//!
//! This crate provides:
//! - `pack`/`unpack` for the packed string values the contract stores as token metadata
//! - Chain client, contract handle and signer traits the workflow runs against
//! - The originate-then-mint [`Orchestrator`], confirming each operation before the next
//! - TZIP-16 metadata resolution for `tezos-storage:` locations
//! - An in-process [`sandbox`] chain for dry runs and tests
//!
//! Key material and network transport are left to the chain client implementation.

pub mod address;
pub mod artifacts;
pub mod chain;
pub mod config;
pub mod error;
pub mod mint;
pub mod orchestrator;
pub mod pack;
pub mod report;
pub mod sandbox;
pub mod signer;
pub mod tzip16;

pub use address::Address;
pub use artifacts::Artifacts;
pub use chain::{
    ChainClient, Confirmation, ContractHandle, ContractMetadata, Extension, MetadataView, Mutez,
    Origination, PendingOperation,
};
pub use config::{DeployConfig, DeployInputs};
pub use error::{DeployError, PackError};
pub use mint::{load_mint_plan, parse_mint_plan, MintRequest};
pub use orchestrator::{DeploymentReport, MintedToken, Orchestrator, Stage};
pub use pack::{pack, unpack, PackedValue};
pub use report::{RecordingReporter, Reporter, StderrReporter, StdoutReporter};
pub use signer::{SeedPhrase, Signer};
