mod seed;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use fa2_deploy_sdk::{
    artifacts::{DEFAULT_CODE_PATH, DEFAULT_STORAGE_PATH},
    mint::DEFAULT_MINTS_PATH,
    pack, unpack,
    sandbox::{SandboxChain, SandboxSigner},
    tzip16::HttpFetcher,
    DeployConfig, Mutez, Orchestrator, PackedValue, Reporter, StderrReporter, StdoutReporter,
};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::seed::seed_from_source;

#[derive(Clone, Debug, Args)]
struct SeedArg {
    /// Seed phrase source: prompt|stdin|file:/path|env:VAR
    #[arg(long = "seed", default_value = "env:FA2_DEPLOY_MNEMONIC")]
    seed: String,
}

#[derive(Parser, Debug)]
#[command(
    name = "fa2-deploy",
    version,
    about = "Originate an FA2 contract and mint its initial tokens",
    long_about = "Originate an FA2 contract from compiled artifacts, mint the tokens listed in the mint plan one confirmed operation at a time, then print the contract's TZIP-16 metadata.\nProgress lines go to stdout (stderr with --json); logs go to stderr."
)]
struct Cli {
    /// Compiled contract code (Micheline JSON)
    #[arg(long, env = "FA2_DEPLOY_CODE", global = true, default_value = DEFAULT_CODE_PATH)]
    code: PathBuf,

    /// Initial storage (Micheline JSON)
    #[arg(long, env = "FA2_DEPLOY_STORAGE", global = true, default_value = DEFAULT_STORAGE_PATH)]
    storage: PathBuf,

    /// Mint plan: a JSON array of {owner, metadata} objects
    #[arg(long, env = "FA2_DEPLOY_MINTS", global = true, default_value = DEFAULT_MINTS_PATH)]
    mints: PathBuf,

    /// Upper bound on each confirmation wait
    #[arg(
        long,
        env = "FA2_DEPLOY_CONFIRMATION_TIMEOUT",
        global = true,
        default_value_t = 180
    )]
    confirmation_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the originate-then-mint workflow against an in-process sandbox chain
    #[command(alias = "run")]
    Deploy {
        #[command(flatten)]
        seed: SeedArg,

        /// Sandbox funding credited to the source before the run
        #[arg(long, default_value_t = 100_000_000)]
        fund_mutez: u64,

        /// Print the deployment report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Pack strings the way token metadata values are stored (JSON on stdout)
    Pack {
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Decode packed string values (JSON on stdout)
    Unpack {
        #[arg(required = true)]
        hexes: Vec<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn deploy<R: Reporter>(
    config: &DeployConfig,
    signer: SandboxSigner,
    fund: Mutez,
    reporter: R,
) -> anyhow::Result<fa2_deploy_sdk::DeploymentReport> {
    let inputs = config.load_inputs()?;

    let remote = HttpFetcher::new(config.confirmation_timeout)?;
    let chain = SandboxChain::new().with_remote_metadata(Arc::new(remote));
    let client = chain.connect(&signer).await?;
    chain.fund(client.source(), fund);

    let mut orchestrator =
        Orchestrator::new(client, signer, reporter, inputs.artifacts, inputs.mints)
            .with_confirmation_timeout(config.confirmation_timeout);

    match orchestrator.run().await {
        Ok(report) => {
            info!(
                contract = %report.contract_address,
                minted = report.minted.len(),
                "deployment finished"
            );
            Ok(report)
        }
        Err(e) => {
            let stage = orchestrator.stage();
            let err = anyhow::Error::new(e).context(format!("deployment failed after {stage}"));
            match orchestrator.contract_address() {
                Some(address) => {
                    Err(err.context(format!("contract {address} may be partially minted")))
                }
                None => Err(err),
            }
        }
    }
}

fn pack_json(values: &[String]) -> Value {
    values
        .iter()
        .map(|value| json!({ "value": value, "packed": pack(value) }))
        .collect()
}

fn unpack_json(hexes: &[String]) -> anyhow::Result<Value> {
    hexes
        .iter()
        .map(|hex| {
            let packed =
                PackedValue::from_hex(hex.trim()).with_context(|| format!("decode {hex}"))?;
            let value = unpack(&packed).with_context(|| format!("decode {hex}"))?;
            Ok(json!({ "packed": packed, "value": value }))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv().ok();
    init_tracing();
    let args = Cli::parse();

    match args.command {
        Commands::Deploy {
            seed,
            fund_mutez,
            json,
        } => {
            let config = DeployConfig {
                code_path: args.code,
                storage_path: args.storage,
                mints_path: args.mints,
                confirmation_timeout: Duration::from_secs(args.confirmation_timeout_secs),
            };
            let signer = SandboxSigner::new(seed_from_source(&seed.seed)?);

            if json {
                let report = deploy(&config, signer, Mutez(fund_mutez), StderrReporter).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                deploy(&config, signer, Mutez(fund_mutez), StdoutReporter).await?;
            }
        }
        Commands::Pack { values } => {
            println!("{}", serde_json::to_string_pretty(&pack_json(&values))?);
        }
        Commands::Unpack { hexes } => {
            println!("{}", serde_json::to_string_pretty(&unpack_json(&hexes)?)?);
        }
    }
    Ok(())
}
