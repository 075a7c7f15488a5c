//! In-process chain for dry runs and tests.
//!
//! The ledger is shared by every client, operation and contract handle cloned
//! from one [`SandboxChain`]. Operations are validated when submitted and
//! applied when their confirmation is awaited, each confirmation baking one
//! level. Every boundary call is journaled and can be made to fail.

pub mod fa2;

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    address::Address,
    artifacts::Artifacts,
    chain::{
        ChainClient, Confirmation, ContractHandle, ContractMetadata, Extension, MetadataView,
        Mutez, Origination, PendingOperation,
    },
    error::{DeployError, Result},
    signer::{SeedPhrase, Signer},
    tzip16::{self, MetadataSource, RemoteFetch},
};

use fa2::Fa2Storage;

/// Fee charged to the source of every operation.
pub const DEFAULT_FEE: Mutez = Mutez(1_000);

const OPERATION_HASH_PREFIX: [u8; 2] = [5, 116];

/// Boundary calls, as seen by the ledger, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    GetBalance(Address),
    Originate { operation: String },
    Confirm { operation: String },
    ContractAt(Address),
    Storage(Address),
    Call { operation: String, entrypoint: String },
    FetchMetadata(Address),
}

/// Where an injected fault fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Balance,
    Originate,
    OriginationConfirmation,
    ContractAt,
    Storage,
    /// The nth (0-based) entrypoint call submission
    CallSubmission(usize),
    /// Confirmation of the nth (0-based) entrypoint call
    CallConfirmation(usize),
    FetchMetadata,
}

/// What an injected fault does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Fail with [`DeployError::Rpc`]
    Rpc(String),
    /// Fail with [`DeployError::Rejected`]
    Reject(String),
    /// Never resolve
    Stall,
}

struct SandboxContract {
    code: Value,
    entrypoints: BTreeSet<String>,
    storage: Fa2Storage,
}

enum Effect {
    Originate {
        source: Address,
        address: Address,
        contract: SandboxContract,
    },
    Call {
        source: Address,
        contract: Address,
        entrypoint: String,
        args: Value,
        call_index: usize,
    },
}

struct Ledger {
    fee: Mutez,
    level: u64,
    operations: u64,
    originations: u64,
    calls: usize,
    balances: HashMap<Address, u64>,
    contracts: HashMap<Address, SandboxContract>,
    pending: HashMap<String, Effect>,
    confirmed: HashMap<String, Confirmation>,
    faults: HashMap<FaultPoint, Fault>,
    journal: Vec<ChainEvent>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            fee: DEFAULT_FEE,
            level: 0,
            operations: 0,
            originations: 0,
            calls: 0,
            balances: HashMap::new(),
            contracts: HashMap::new(),
            pending: HashMap::new(),
            confirmed: HashMap::new(),
            faults: HashMap::new(),
            journal: Vec::new(),
        }
    }
}

enum Outcome<T> {
    Ready(Result<T>),
    Stall,
}

impl Ledger {
    fn fault(&self, point: FaultPoint) -> Option<Outcome<()>> {
        match self.faults.get(&point)? {
            Fault::Rpc(msg) => Some(Outcome::Ready(Err(DeployError::Rpc(msg.clone())))),
            Fault::Reject(reason) => Some(Outcome::Ready(Err(DeployError::rejected(
                format!("{point:?}"),
                reason.clone(),
            )))),
            Fault::Stall => Some(Outcome::Stall),
        }
    }

    fn next_operation_hash(&mut self) -> String {
        self.operations += 1;
        let mut bytes = OPERATION_HASH_PREFIX.to_vec();
        let mut digest = [0u8; 32];
        digest[24..].copy_from_slice(&self.operations.to_be_bytes());
        bytes.extend_from_slice(&digest);
        bs58::encode(bytes).with_check().into_string()
    }

    fn charge(&mut self, source: &Address, operation: &str) -> Result<()> {
        let fee = self.fee.0;
        let balance = self.balances.entry(source.clone()).or_default();
        if *balance < fee {
            return Err(DeployError::rejected(operation, "balance_too_low"));
        }
        *balance -= fee;
        Ok(())
    }

    fn apply(&mut self, hash: &str) -> Result<Confirmation> {
        if let Some(done) = self.confirmed.get(hash) {
            return Ok(done.clone());
        }
        let effect = self
            .pending
            .remove(hash)
            .ok_or_else(|| DeployError::Rpc(format!("unknown operation {hash}")))?;

        match effect {
            Effect::Originate {
                source,
                address,
                contract,
            } => {
                debug!(%source, contract = %address, "baking origination");
                self.contracts.insert(address, contract);
            }
            Effect::Call {
                source,
                contract,
                entrypoint,
                args,
                ..
            } => {
                let target = self
                    .contracts
                    .get_mut(&contract)
                    .ok_or_else(|| DeployError::rejected(hash, "contract not found"))?;
                let mut next = target.storage.clone();
                next.call(&source, &entrypoint, &args)
                    .map_err(|reason| DeployError::rejected(hash, reason))?;
                target.storage = next;
                debug!(%source, %contract, %entrypoint, "baking call");
            }
        }

        self.level += 1;
        let confirmation = Confirmation {
            operation_hash: hash.to_string(),
            level: self.level,
        };
        self.confirmed.insert(hash.to_string(), confirmation.clone());
        Ok(confirmation)
    }

    fn confirm(&mut self, hash: &str) -> Outcome<Confirmation> {
        self.journal.push(ChainEvent::Confirm {
            operation: hash.to_string(),
        });

        let point = match self.pending.get(hash) {
            Some(Effect::Originate { .. }) => Some(FaultPoint::OriginationConfirmation),
            Some(Effect::Call { call_index, .. }) => Some(FaultPoint::CallConfirmation(*call_index)),
            None => None,
        };
        if let Some(outcome) = point.and_then(|p| self.fault(p)) {
            return match outcome {
                Outcome::Ready(Err(e)) => {
                    self.pending.remove(hash);
                    Outcome::Ready(Err(e))
                }
                Outcome::Ready(Ok(())) => Outcome::Ready(self.apply(hash)),
                Outcome::Stall => Outcome::Stall,
            };
        }

        Outcome::Ready(self.apply(hash))
    }
}

/// Shared in-memory ledger.
#[derive(Clone, Default)]
pub struct SandboxChain {
    ledger: Arc<Mutex<Ledger>>,
    remote: Option<Arc<dyn RemoteFetch>>,
}

impl SandboxChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_fee(self, fee: Mutez) -> Self {
        self.ledger().fee = fee;
        self
    }

    /// Let contract handles follow off-chain metadata locations.
    pub fn with_remote_metadata(mut self, remote: Arc<dyn RemoteFetch>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Credit an account.
    pub fn fund(&self, address: &Address, amount: Mutez) {
        *self.ledger().balances.entry(address.clone()).or_default() += amount.0;
    }

    /// Make the given boundary call misbehave from now on.
    pub fn inject(&self, point: FaultPoint, fault: Fault) {
        self.ledger().faults.insert(point, fault);
    }

    pub fn clear_faults(&self) {
        self.ledger().faults.clear();
    }

    pub fn journal(&self) -> Vec<ChainEvent> {
        self.ledger().journal.clone()
    }

    pub fn level(&self) -> u64 {
        self.ledger().level
    }

    pub fn balance(&self, address: &Address) -> Mutez {
        Mutez(self.ledger().balances.get(address).copied().unwrap_or_default())
    }

    /// Storage of a live contract.
    pub fn contract_storage(&self, address: &Address) -> Option<Fa2Storage> {
        self.ledger()
            .contracts
            .get(address)
            .map(|c| c.storage.clone())
    }

    /// Code a live contract was originated with.
    pub fn contract_code(&self, address: &Address) -> Option<Value> {
        self.ledger().contracts.get(address).map(|c| c.code.clone())
    }

    /// A client that signs as `source`.
    pub fn client_for(&self, source: Address) -> SandboxClient {
        SandboxClient {
            chain: self.clone(),
            source,
        }
    }

    /// A client that signs as the signer's account.
    pub async fn connect<S: Signer + ?Sized>(&self, signer: &S) -> Result<SandboxClient> {
        Ok(self.client_for(signer.public_key_hash().await?))
    }

    fn check(&self, point: FaultPoint) -> Outcome<()> {
        self.ledger()
            .fault(point)
            .unwrap_or(Outcome::Ready(Ok(())))
    }
}

// Stalls never return; everything else is resolved immediately.
async fn settle<T>(outcome: Outcome<T>) -> Result<T> {
    match outcome {
        Outcome::Ready(result) => result,
        Outcome::Stall => std::future::pending().await,
    }
}

/// Operation handle returned by sandbox submissions.
#[derive(Clone)]
pub struct SandboxOperation {
    chain: SandboxChain,
    hash: String,
}

#[async_trait]
impl PendingOperation for SandboxOperation {
    fn hash(&self) -> &str {
        &self.hash
    }

    async fn confirmation(&self) -> Result<Confirmation> {
        let outcome = self.chain.ledger().confirm(&self.hash);
        settle(outcome).await
    }
}

/// Chain client bound to one signing account.
#[derive(Clone)]
pub struct SandboxClient {
    chain: SandboxChain,
    source: Address,
}

impl SandboxClient {
    pub fn source(&self) -> &Address {
        &self.source
    }
}

#[async_trait]
impl ChainClient for SandboxClient {
    type Operation = SandboxOperation;
    type Contract = SandboxContractHandle;

    async fn get_balance(&self, address: &Address) -> Result<Mutez> {
        self.chain
            .ledger()
            .journal
            .push(ChainEvent::GetBalance(address.clone()));
        settle(self.chain.check(FaultPoint::Balance)).await?;
        Ok(self.chain.balance(address))
    }

    async fn originate(&self, artifacts: &Artifacts) -> Result<Origination<SandboxOperation>> {
        let storage = Fa2Storage::from_micheline(&artifacts.storage)?;
        let entrypoints = artifacts.entrypoints();

        let hash = {
            let mut ledger = self.chain.ledger();
            let hash = ledger.next_operation_hash();
            ledger.journal.push(ChainEvent::Originate {
                operation: hash.clone(),
            });
            hash
        };
        settle(self.chain.check(FaultPoint::Originate)).await?;

        let mut ledger = self.chain.ledger();
        ledger.charge(&self.source, &hash)?;
        ledger.originations += 1;
        let mut seed = [0u8; 20];
        seed[0] = 0xfa;
        seed[12..].copy_from_slice(&ledger.originations.to_be_bytes());
        let address = Address::contract_from_hash(seed);

        ledger.pending.insert(
            hash.clone(),
            Effect::Originate {
                source: self.source.clone(),
                address: address.clone(),
                contract: SandboxContract {
                    code: artifacts.code.clone(),
                    entrypoints,
                    storage,
                },
            },
        );
        debug!(operation = %hash, contract = %address, "origination injected");

        Ok(Origination {
            contract_address: address,
            operation: SandboxOperation {
                chain: self.chain.clone(),
                hash,
            },
        })
    }

    async fn contract_at(
        &self,
        address: &Address,
        extensions: &[Extension],
    ) -> Result<SandboxContractHandle> {
        self.chain
            .ledger()
            .journal
            .push(ChainEvent::ContractAt(address.clone()));
        settle(self.chain.check(FaultPoint::ContractAt)).await?;

        if !self.chain.ledger().contracts.contains_key(address) {
            return Err(DeployError::Rpc(format!("contract {address} not found")));
        }
        Ok(SandboxContractHandle {
            chain: self.chain.clone(),
            source: self.source.clone(),
            address: address.clone(),
            extensions: extensions.to_vec(),
        })
    }
}

/// Handle on a live sandbox contract.
#[derive(Clone)]
pub struct SandboxContractHandle {
    chain: SandboxChain,
    source: Address,
    address: Address,
    extensions: Vec<Extension>,
}

#[async_trait]
impl ContractHandle for SandboxContractHandle {
    type Operation = SandboxOperation;

    fn address(&self) -> &Address {
        &self.address
    }

    async fn storage(&self) -> Result<Value> {
        self.chain
            .ledger()
            .journal
            .push(ChainEvent::Storage(self.address.clone()));
        settle(self.chain.check(FaultPoint::Storage)).await?;

        self.chain
            .contract_storage(&self.address)
            .map(|s| s.to_json())
            .ok_or_else(|| DeployError::Rpc(format!("contract {} not found", self.address)))
    }

    async fn call_entrypoint(&self, entrypoint: &str, args: Value) -> Result<SandboxOperation> {
        let (hash, call_index) = {
            let mut ledger = self.chain.ledger();
            let hash = ledger.next_operation_hash();
            let call_index = ledger.calls;
            ledger.calls += 1;
            ledger.journal.push(ChainEvent::Call {
                operation: hash.clone(),
                entrypoint: entrypoint.to_string(),
            });
            (hash, call_index)
        };
        settle(self.chain.check(FaultPoint::CallSubmission(call_index))).await?;

        let mut ledger = self.chain.ledger();
        let contract = ledger
            .contracts
            .get(&self.address)
            .ok_or_else(|| DeployError::Rpc(format!("contract {} not found", self.address)))?;
        if !contract.entrypoints.contains(entrypoint) {
            return Err(DeployError::rejected(
                &hash,
                format!("no entrypoint `{entrypoint}`"),
            ));
        }

        // Simulate against current storage before injecting.
        let mut simulated = contract.storage.clone();
        simulated
            .call(&self.source, entrypoint, &args)
            .map_err(|reason| DeployError::rejected(&hash, reason))?;

        ledger.charge(&self.source, &hash)?;
        ledger.pending.insert(
            hash.clone(),
            Effect::Call {
                source: self.source.clone(),
                contract: self.address.clone(),
                entrypoint: entrypoint.to_string(),
                args,
                call_index,
            },
        );
        debug!(operation = %hash, %entrypoint, "call injected");

        Ok(SandboxOperation {
            chain: self.chain.clone(),
            hash,
        })
    }
}

#[async_trait]
impl MetadataSource for SandboxContractHandle {
    async fn metadata_entry(
        &self,
        contract: Option<&Address>,
        key: &str,
    ) -> Result<Option<Vec<u8>>> {
        let target = contract.unwrap_or(&self.address);
        let ledger = self.chain.ledger();
        let storage = &ledger
            .contracts
            .get(target)
            .ok_or_else(|| DeployError::Metadata(format!("contract {target} not found")))?
            .storage;
        Ok(storage.metadata.get(key).cloned())
    }
}

#[async_trait]
impl MetadataView for SandboxContractHandle {
    async fn fetch_metadata(&self) -> Result<ContractMetadata> {
        self.chain
            .ledger()
            .journal
            .push(ChainEvent::FetchMetadata(self.address.clone()));
        settle(self.chain.check(FaultPoint::FetchMetadata)).await?;

        if !self.extensions.contains(&Extension::Tzip16) {
            return Err(DeployError::Metadata(
                "contract handle was created without the tzip16 extension".into(),
            ));
        }
        tzip16::resolve_with(self, self.chain.remote.as_deref()).await
    }
}

/// Account a seed phrase controls on the sandbox: the `tz1` of the first 20
/// bytes of SHA-256 over the normalised words. Not the wallet derivation used
/// on real networks.
pub fn sandbox_account(seed: &SeedPhrase) -> Address {
    let digest = Sha256::digest(seed.expose().as_bytes());
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest[..20]);
    Address::tz1_from_hash(hash)
}

/// Signer for sandbox accounts, constructed from a seed phrase. Only the
/// derived address is kept.
#[derive(Debug, Clone)]
pub struct SandboxSigner {
    address: Address,
}

impl SandboxSigner {
    pub fn new(seed: SeedPhrase) -> Self {
        Self {
            address: sandbox_account(&seed),
        }
    }
}

#[async_trait]
impl Signer for SandboxSigner {
    async fn public_key_hash(&self) -> Result<Address> {
        Ok(self.address.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: &str =
        "abandon ability able about above absent absorb abstract absurd abuse access accident";

    #[tokio::test]
    async fn signer_address_follows_the_seed() {
        let a = SandboxSigner::new(SeedPhrase::new(WORDS).unwrap());
        let b = SandboxSigner::new(SeedPhrase::new(WORDS.replace("accident", "account")).unwrap());

        let a = a.public_key_hash().await.unwrap();
        let b = b.public_key_hash().await.unwrap();

        assert_eq!(a.as_str(), "tz1VC2xq1QYH7axUUZAdi3MeDqzJVDAkd6CS");
        assert_ne!(a, b);
    }

    #[test]
    fn derivation_ignores_whitespace() {
        let spaced = SeedPhrase::new(format!("  {}\n", WORDS.replace(' ', "  "))).unwrap();
        assert_eq!(
            sandbox_account(&spaced),
            sandbox_account(&SeedPhrase::new(WORDS).unwrap())
        );
    }
}
