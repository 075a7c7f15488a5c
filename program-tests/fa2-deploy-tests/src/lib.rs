use std::path::PathBuf;

use fa2_deploy_sdk::{
    load_mint_plan,
    sandbox::{sandbox_account, SandboxChain, SandboxClient, SandboxSigner},
    Address, Artifacts, MintRequest, Mutez, Orchestrator, RecordingReporter, SeedPhrase,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

pub const TEST_SEED: &str =
    "abandon ability able about above absent absorb abstract absurd abuse access accident";

/// Seed phrase of an account that is not the minter.
pub const STRANGER_SEED: &str = "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong";

/// Minter recorded in the shipped initial storage, controlled by [`TEST_SEED`].
pub const MINTER: &str = "tz1VC2xq1QYH7axUUZAdi3MeDqzJVDAkd6CS";

/// Owner of the tokens in the shipped mint plan.
pub const OWNER: &str = "tz1NbEC653mQc1M8GhmAkNdqBogF2wFzGWEw";

/// Some other account.
pub const STRANGER: &str = "tz1KjMn6Hb23eu1rNemou6ytAzzNxzvaYHyK";

pub const FUNDING: Mutez = Mutez(100_000_000);

pub type TestOrchestrator = Orchestrator<SandboxClient, SandboxSigner, RecordingReporter>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_test_writer()
        .try_init();
}

pub fn artifacts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../artifacts")
}

pub fn load_artifacts() -> anyhow::Result<Artifacts> {
    let dir = artifacts_dir();
    Ok(Artifacts::load(dir.join("code.json"), dir.join("storage.json"))?)
}

pub fn load_mints() -> anyhow::Result<Vec<MintRequest>> {
    Ok(load_mint_plan(artifacts_dir().join("mints.json"))?)
}

/// Shipped artifacts with the token counter starting at `id`.
pub fn artifacts_with_next_token_id(id: u64) -> anyhow::Result<Artifacts> {
    let mut artifacts = load_artifacts()?;
    let counter = artifacts
        .storage
        .pointer_mut("/args/1/args/0")
        .ok_or_else(|| anyhow::anyhow!("storage has no counter slot"))?;
    *counter = json!({ "int": id.to_string() });
    Ok(Artifacts::from_values(artifacts.code, artifacts.storage)?)
}

pub fn address(s: &str) -> Address {
    Address::parse(s).expect("valid test address")
}

/// A plan of `n` requests minted to [`OWNER`].
pub fn mint_plan(n: usize) -> Vec<MintRequest> {
    (0..n)
        .map(|i| {
            MintRequest::new(
                address(OWNER),
                [("decimals", "0".to_string()), ("key1", format!("token-{i}"))],
            )
        })
        .collect()
}

/// One sandbox chain, a funded account and a recorder for its status lines.
pub struct TestContext {
    pub chain: SandboxChain,
    pub seed: SeedPhrase,
    pub account: Address,
    pub reporter: RecordingReporter,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_seed(TEST_SEED, FUNDING)
    }

    pub fn with_seed(words: &str, funding: Mutez) -> Self {
        init_tracing();
        let chain = SandboxChain::new();
        let seed = SeedPhrase::new(words).expect("valid test seed");
        let account = sandbox_account(&seed);
        chain.fund(&account, funding);
        Self {
            chain,
            seed,
            account,
            reporter: RecordingReporter::new(),
        }
    }

    pub fn signer(&self) -> anyhow::Result<SandboxSigner> {
        Ok(SandboxSigner::new(self.seed.clone()))
    }

    pub async fn orchestrator(
        &self,
        artifacts: Artifacts,
        mints: Vec<MintRequest>,
    ) -> anyhow::Result<TestOrchestrator> {
        let signer = self.signer()?;
        let client = self.chain.connect(&signer).await?;
        Ok(Orchestrator::new(
            client,
            signer,
            self.reporter.clone(),
            artifacts,
            mints,
        ))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
