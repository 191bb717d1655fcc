//! Defines the custom error type for the `trust-kit` crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::kms::EncryptError;
use crate::pki::Role;

/// The main error type for the `trust-kit` crate.
///
/// Every variant carries the role, file or operation it failed on. Nothing in
/// the crate retries or substitutes a fallback value after one of these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to generate {role} material: {reason}")]
    Generation { role: Role, reason: String },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("encrypting the {role} key with {key_arn} failed")]
    Encryption {
        role: Role,
        key_arn: String,
        #[source]
        source: EncryptError,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("secure random source unavailable: {0}")]
    RandomSource(String),

    #[error("{} is missing and asset creation is disabled", path.display())]
    MissingAsset { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("configuration (de)serialization failed")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn generation(role: Role, reason: impl std::fmt::Display) -> Self {
        Error::Generation {
            role,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
