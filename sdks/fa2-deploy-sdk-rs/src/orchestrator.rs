//! Originate-then-mint workflow.
//!
//! The run is a state machine with exactly one successor per [`Stage`]. Each
//! mint is confirmed before the next one is submitted, since the contract
//! assigns token ids from its own counter.

use std::{fmt, time::Duration};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    address::Address,
    artifacts::Artifacts,
    chain::{
        ChainClient, Confirmation, ContractHandle, ContractMetadata, Extension, MetadataView,
        Mutez, Origination, PendingOperation,
    },
    error::{DeployError, Result},
    mint::MintRequest,
    report::Reporter,
    signer::Signer,
};

/// Default bound on every confirmation wait.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Name of the contract's minting entrypoint.
pub const MINT_ENTRYPOINT: &str = "mint";

/// Storage field read before each mint.
pub const NEXT_TOKEN_ID_FIELD: &str = "next_token_id";

/// Workflow states, in the only order they can be visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Stage {
    Start,
    IdentityResolved,
    BalanceChecked,
    Originated,
    OriginConfirmed,
    MintSubmitted(usize),
    MintConfirmed(usize),
    MetadataFetched,
    Done,
}

impl Stage {
    /// The single successor of this stage for a plan of `mints` requests.
    pub fn next(self, mints: usize) -> Option<Stage> {
        use Stage::*;
        match self {
            Start => Some(IdentityResolved),
            IdentityResolved => Some(BalanceChecked),
            BalanceChecked => Some(Originated),
            Originated => Some(OriginConfirmed),
            OriginConfirmed if mints == 0 => Some(MetadataFetched),
            OriginConfirmed => Some(MintSubmitted(0)),
            MintSubmitted(i) => Some(MintConfirmed(i)),
            MintConfirmed(i) if i + 1 < mints => Some(MintSubmitted(i + 1)),
            MintConfirmed(_) => Some(MetadataFetched),
            MetadataFetched => Some(Done),
            Done => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::MintSubmitted(i) => write!(f, "MintSubmitted({i})"),
            Stage::MintConfirmed(i) => write!(f, "MintConfirmed({i})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// One confirmed mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MintedToken {
    /// Position in the mint plan
    pub index: usize,
    /// Counter value observed right before submission
    pub token_id: u64,
    pub operation_hash: String,
    pub level: u64,
}

/// Everything a completed run observed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeploymentReport {
    pub address: Address,
    pub balance: Mutez,
    pub contract_address: Address,
    pub minted: Vec<MintedToken>,
    pub metadata: ContractMetadata,
}

type MintOperation<C> = <<C as ChainClient>::Contract as ContractHandle>::Operation;

/// Drives one deployment. Owns its client, signer and contract handle.
pub struct Orchestrator<C, S, R>
where
    C: ChainClient,
{
    client: C,
    signer: S,
    reporter: R,
    artifacts: Artifacts,
    mints: Vec<MintRequest>,
    confirmation_timeout: Duration,

    stage: Stage,
    history: Vec<Stage>,

    address: Option<Address>,
    balance: Option<Mutez>,
    origination: Option<Origination<C::Operation>>,
    contract: Option<C::Contract>,
    pending_mint: Option<(u64, MintOperation<C>)>,
    minted: Vec<MintedToken>,
    metadata: Option<ContractMetadata>,
}

impl<C, S, R> Orchestrator<C, S, R>
where
    C: ChainClient,
    S: Signer,
    R: Reporter,
{
    pub fn new(
        client: C,
        signer: S,
        reporter: R,
        artifacts: Artifacts,
        mints: Vec<MintRequest>,
    ) -> Self {
        Self {
            client,
            signer,
            reporter,
            artifacts,
            mints,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            stage: Stage::Start,
            history: vec![Stage::Start],
            address: None,
            balance: None,
            origination: None,
            contract: None,
            pending_mint: None,
            minted: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Last stage reached.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stages reached so far, starting with [`Stage::Start`].
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Address of the originated contract, once known. Still set after a failed run.
    pub fn contract_address(&self) -> Option<&Address> {
        self.origination.as_ref().map(|o| &o.contract_address)
    }

    /// Run every remaining stage. The first failure ends the run.
    pub async fn run(&mut self) -> Result<DeploymentReport> {
        if self.stage != Stage::Start {
            return Err(DeployError::OutOfOrder(self.stage.to_string()));
        }

        while let Some(next) = self.stage.next(self.mints.len()) {
            debug!(from = %self.stage, to = %next, "advancing");
            if let Err(e) = self.enter(next).await {
                warn!(stage = %next, error = %e, "deployment aborted");
                return Err(e);
            }
            self.stage = next;
            self.history.push(next);
        }

        self.report()
    }

    async fn enter(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::Start => Ok(()),
            Stage::IdentityResolved => {
                let address = self.signer.public_key_hash().await?;
                info!(%address, "identity resolved");
                self.say(format!("Account address: {address}"));
                self.address = Some(address);
                Ok(())
            }
            Stage::BalanceChecked => {
                let address = require(&self.address, stage)?;
                let balance = self.client.get_balance(address).await?;
                info!(%balance, "balance checked");
                self.say(format!("Account balance: {balance}"));
                self.balance = Some(balance);
                Ok(())
            }
            Stage::Originated => {
                self.say("Originating contract…");
                let origination = self.client.originate(&self.artifacts).await?;
                info!(
                    contract = %origination.contract_address,
                    operation = origination.operation.hash(),
                    "origination submitted"
                );
                self.say(format!("Contract address: {}", origination.contract_address));
                self.origination = Some(origination);
                Ok(())
            }
            Stage::OriginConfirmed => {
                self.say("Awaiting confirmation…");
                let origination = require(&self.origination, stage)?;
                let confirmation = self.confirm(&origination.operation).await?;
                let address = origination.contract_address.clone();
                info!(contract = %address, level = confirmation.level, "origination confirmed");

                let contract = self
                    .client
                    .contract_at(&address, &[Extension::Tzip16])
                    .await?;
                self.contract = Some(contract);
                Ok(())
            }
            Stage::MintSubmitted(index) => {
                let contract = require(&self.contract, stage)?;
                let storage = contract.storage().await?;
                let token_id = next_token_id(&storage)?;
                self.say(format!("Minting token #{index} (id: {token_id})…"));

                let request = self.mints.get(index).ok_or_else(|| {
                    DeployError::OutOfOrder(format!("{stage} beyond plan of {}", self.mints.len()))
                })?;
                let args = serde_json::to_value(request)
                    .map_err(|e| DeployError::Config(format!("mint request {index}: {e}")))?;

                let contract = require(&self.contract, stage)?;
                let operation = contract.call_entrypoint(MINT_ENTRYPOINT, args).await?;
                info!(index, token_id, operation = operation.hash(), "mint submitted");
                self.pending_mint = Some((token_id, operation));
                Ok(())
            }
            Stage::MintConfirmed(index) => {
                self.say("Awaiting confirmation…");
                let (token_id, operation) = self
                    .pending_mint
                    .take()
                    .ok_or_else(|| DeployError::OutOfOrder(stage.to_string()))?;
                let confirmation = self.confirm(&operation).await?;
                info!(index, token_id, level = confirmation.level, "mint confirmed");
                self.minted.push(MintedToken {
                    index,
                    token_id,
                    operation_hash: confirmation.operation_hash,
                    level: confirmation.level,
                });
                Ok(())
            }
            Stage::MetadataFetched => {
                let contract = require(&self.contract, stage)?;
                let metadata = contract.fetch_metadata().await?;
                info!(uri = %metadata.uri, "metadata fetched");
                self.say(metadata.to_string());
                self.metadata = Some(metadata);
                Ok(())
            }
            Stage::Done => {
                info!(minted = self.minted.len(), "deployment complete");
                Ok(())
            }
        }
    }

    async fn confirm<Op: PendingOperation>(&self, operation: &Op) -> Result<Confirmation> {
        debug!(operation = operation.hash(), "awaiting confirmation");
        tokio::time::timeout(self.confirmation_timeout, operation.confirmation())
            .await
            .map_err(|_| DeployError::ConfirmationTimeout {
                operation: operation.hash().to_string(),
                after: self.confirmation_timeout,
            })?
    }

    fn say(&mut self, line: impl AsRef<str>) {
        self.reporter.line(line.as_ref());
    }

    fn report(&self) -> Result<DeploymentReport> {
        let done = Stage::Done;
        Ok(DeploymentReport {
            address: require(&self.address, done)?.clone(),
            balance: *require(&self.balance, done)?,
            contract_address: require(&self.origination, done)?.contract_address.clone(),
            minted: self.minted.clone(),
            metadata: require(&self.metadata, done)?.clone(),
        })
    }
}

fn require<T>(slot: &Option<T>, stage: Stage) -> Result<&T> {
    slot.as_ref()
        .ok_or_else(|| DeployError::OutOfOrder(stage.to_string()))
}

/// Read the next-token-id counter from decoded storage. Nats may come back as
/// JSON numbers or as decimal strings.
pub fn next_token_id(storage: &Value) -> Result<u64> {
    let field = storage.get(NEXT_TOKEN_ID_FIELD).ok_or_else(|| {
        DeployError::Storage(format!("missing `{NEXT_TOKEN_ID_FIELD}` field"))
    })?;

    let id = match field {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| DeployError::Storage(format!("`{NEXT_TOKEN_ID_FIELD}` is not a nat: {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_sequence_interleaves_submit_and_confirm() {
        let mut stage = Stage::Start;
        let mut seen = vec![stage];
        while let Some(next) = stage.next(2) {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                Stage::Start,
                Stage::IdentityResolved,
                Stage::BalanceChecked,
                Stage::Originated,
                Stage::OriginConfirmed,
                Stage::MintSubmitted(0),
                Stage::MintConfirmed(0),
                Stage::MintSubmitted(1),
                Stage::MintConfirmed(1),
                Stage::MetadataFetched,
                Stage::Done,
            ]
        );
    }

    #[test]
    fn empty_plan_skips_minting() {
        assert_eq!(Stage::OriginConfirmed.next(0), Some(Stage::MetadataFetched));
        assert_eq!(Stage::Done.next(0), None);
    }

    #[test]
    fn reads_counter_in_both_encodings() {
        assert_eq!(next_token_id(&json!({ "next_token_id": "7" })).unwrap(), 7);
        assert_eq!(next_token_id(&json!({ "next_token_id": 3 })).unwrap(), 3);
        assert!(matches!(
            next_token_id(&json!({})),
            Err(DeployError::Storage(_))
        ));
        assert!(next_token_id(&json!({ "next_token_id": "-1" })).is_err());
    }
}
