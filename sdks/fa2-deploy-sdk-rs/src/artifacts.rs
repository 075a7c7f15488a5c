//! Contract code and initial storage, loaded from Micheline JSON.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::error::{DeployError, Result};

/// Default location of the compiled contract.
pub const DEFAULT_CODE_PATH: &str = "artifacts/code.json";
/// Default location of the initial storage.
pub const DEFAULT_STORAGE_PATH: &str = "artifacts/storage.json";

const SECTIONS: [&str; 3] = ["parameter", "storage", "code"];

/// Origination payload. Both values are treated as opaque by the orchestrator.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifacts {
    pub code: Value,
    pub storage: Value,
}

impl Artifacts {
    /// Read and validate both artifact files.
    pub fn load(code_path: impl AsRef<Path>, storage_path: impl AsRef<Path>) -> Result<Self> {
        let code = read_json(code_path.as_ref())?;
        let storage = read_json(storage_path.as_ref())?;
        Self::from_values(code, storage)
            .map_err(|e| relabel(e, code_path.as_ref(), storage_path.as_ref()))
    }

    /// Validate in-memory artifacts.
    pub fn from_values(code: Value, storage: Value) -> Result<Self> {
        let artifacts = Self { code, storage };
        artifacts.validate()?;
        Ok(artifacts)
    }

    fn validate(&self) -> Result<()> {
        let sections = self
            .code
            .as_array()
            .ok_or_else(|| DeployError::artifact("code", "expected a Micheline sequence"))?;

        for wanted in SECTIONS {
            let found = sections
                .iter()
                .any(|s| s.get("prim").and_then(Value::as_str) == Some(wanted));
            if !found {
                return Err(DeployError::artifact(
                    "code",
                    format!("missing `{wanted}` section"),
                ));
            }
        }

        if !(self.storage.is_object() || self.storage.is_array()) {
            return Err(DeployError::artifact(
                "storage",
                "expected a Micheline expression",
            ));
        }
        Ok(())
    }

    /// Entrypoint names declared by `%annotations` in the parameter type.
    pub fn entrypoints(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if let Some(parameter) = self.section("parameter") {
            collect_field_annots(parameter, &mut out);
        }
        out
    }

    fn section(&self, prim: &str) -> Option<&Value> {
        self.code
            .as_array()?
            .iter()
            .find(|s| s.get("prim").and_then(Value::as_str) == Some(prim))
            .and_then(|s| s.get("args"))
            .and_then(|args| args.get(0))
    }
}

// Only `or` branches name entrypoints; record fields below them are skipped.
fn collect_field_annots(node: &Value, out: &mut BTreeSet<String>) {
    if let Some(annots) = node.get("annots").and_then(Value::as_array) {
        for a in annots.iter().filter_map(Value::as_str) {
            if let Some(name) = a.strip_prefix('%') {
                out.insert(name.to_string());
                return;
            }
        }
    }
    if node.get("prim").and_then(Value::as_str) == Some("or") {
        if let Some(args) = node.get("args").and_then(Value::as_array) {
            for arg in args {
                collect_field_annots(arg, out);
            }
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DeployError::artifact(path, format!("read failed: {e}")))?;
    serde_json::from_str(&raw).map_err(|e| DeployError::artifact(path, format!("invalid json: {e}")))
}

fn relabel(err: DeployError, code_path: &Path, storage_path: &Path) -> DeployError {
    match err {
        DeployError::Artifact { path, reason } => {
            let path: PathBuf = if path == Path::new("code") {
                code_path.into()
            } else if path == Path::new("storage") {
                storage_path.into()
            } else {
                path
            };
            DeployError::Artifact { path, reason }
        }
        other => other,
    }
}
