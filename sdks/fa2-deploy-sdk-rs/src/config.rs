//! Run configuration.

use std::{path::PathBuf, time::Duration};

use tracing::debug;

use crate::{
    artifacts::{Artifacts, DEFAULT_CODE_PATH, DEFAULT_STORAGE_PATH},
    error::Result,
    mint::{load_mint_plan, MintRequest, DEFAULT_MINTS_PATH},
    orchestrator::DEFAULT_CONFIRMATION_TIMEOUT,
};

/// Where the run's static inputs live and how long confirmations may take.
#[derive(Clone, Debug)]
pub struct DeployConfig {
    pub code_path: PathBuf,
    pub storage_path: PathBuf,
    pub mints_path: PathBuf,
    pub confirmation_timeout: Duration,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            code_path: DEFAULT_CODE_PATH.into(),
            storage_path: DEFAULT_STORAGE_PATH.into(),
            mints_path: DEFAULT_MINTS_PATH.into(),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}

/// Everything read from disk before the first chain call.
#[derive(Clone, Debug)]
pub struct DeployInputs {
    pub artifacts: Artifacts,
    pub mints: Vec<MintRequest>,
}

impl DeployConfig {
    /// Load and validate artifacts and the mint plan.
    pub fn load_inputs(&self) -> Result<DeployInputs> {
        let artifacts = Artifacts::load(&self.code_path, &self.storage_path)?;
        let mints = load_mint_plan(&self.mints_path)?;
        debug!(
            code = %self.code_path.display(),
            storage = %self.storage_path.display(),
            mints = mints.len(),
            "inputs loaded"
        );
        Ok(DeployInputs { artifacts, mints })
    }
}
