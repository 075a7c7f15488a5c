//! Error types

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors produced while decoding a packed Michelson string.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum PackError {
    /// Input is not valid lowercase/uppercase hex
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Input does not start with the `0501` tag
    #[error("missing 0501 tag")]
    InvalidTag,
    /// Input ends before the 8-character length prefix
    #[error("truncated length prefix")]
    TruncatedLength,
    /// Length prefix does not match the payload
    #[error("length prefix {declared} does not match payload of {actual} bytes")]
    LengthMismatch {
        /// Length declared by the prefix
        declared: u32,
        /// Actual payload byte length
        actual: usize,
    },
    /// Payload is not UTF-8
    #[error("payload is not valid utf-8")]
    InvalidUtf8,
}

/// Errors that abort a deployment run.
///
/// Every variant is fatal: the orchestrator never retries and never rolls back.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Invalid seed phrase, CLI input, or environment
    #[error("configuration error: {0}")]
    Config(String),
    /// Contract code, initial storage, or mint plan could not be loaded
    #[error("artifact {}: {reason}", path.display())]
    Artifact {
        /// Artifact path (or a symbolic name for in-memory artifacts)
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },
    /// Not a recognised base58check account or contract address
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Malformed packed value
    #[error("packed value: {0}")]
    Pack(#[from] PackError),
    /// Endpoint unreachable or response malformed
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The network or the contract refused the operation
    #[error("operation {operation} rejected: {reason}")]
    Rejected {
        /// Operation hash, or the operation kind when no hash was assigned
        operation: String,
        /// Rejection reason reported by the chain
        reason: String,
    },
    /// Confirmation did not arrive in time
    #[error("operation {operation} not confirmed after {after:?}")]
    ConfirmationTimeout {
        /// Operation hash
        operation: String,
        /// Configured timeout
        after: Duration,
    },
    /// Contract storage did not have the expected shape
    #[error("unexpected storage: {0}")]
    Storage(String),
    /// TZIP-16 metadata could not be resolved or decoded
    #[error("metadata error: {0}")]
    Metadata(String),
    /// A workflow stage was entered without the result of its predecessor
    #[error("workflow stage {0} entered out of order")]
    OutOfOrder(String),
}

impl DeployError {
    /// Shorthand for an artifact error.
    pub fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DeployError::Artifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a rejected operation.
    pub fn rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::Rejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised before any chain call could have happened.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DeployError::Config(_)
                | DeployError::Artifact { .. }
                | DeployError::InvalidAddress(_)
                | DeployError::Pack(_)
        )
    }
}

/// Result alias used throughout the SDK.
pub type Result<T, E = DeployError> = std::result::Result<T, E>;
