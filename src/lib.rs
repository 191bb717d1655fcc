//! # Trust-Kit: Cluster Identity Provisioning
//!
//! `trust-kit` generates, caches, envelope-encrypts and bundles the TLS identity
//! material a cluster's nodes need at bootstrap: a certificate authority, one
//! CA-signed certificate per role, and bearer tokens.
//!
//! Repeated runs against an unchanged directory return byte-identical bundles,
//! even though the injected encryption service is nondeterministic. Stability
//! comes from two on-disk caches: plaintext PEM files hold identity, and
//! `.pem.enc` files hold the ciphertext of each key.
//!
//! ## Core Concepts
//!
//! - **`CertificateFactory`**: RSA key generation and X.509 signing. Leaves are
//!   only issued through a resolved `CertificateAuthority`.
//! - **`PlaintextAssetStore`** / **`EncryptedAssetStore`**: the two caches.
//! - **`EncryptService`**: the pluggable envelope-encryption capability.
//! - **`CompactAssets`**: the bundle handed to the templating layer.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trust_kit::kms::{KmsConfig, LocalEnvelopeService};
//!
//! fn main() -> trust_kit::Result<()> {
//!     let kms = KmsConfig::new(
//!         "arn:aws:kms:us-west-1:000000000000:key/example",
//!         "us-west-1",
//!         LocalEnvelopeService::generate(),
//!     );
//!
//!     let first = trust_kit::load_or_create_encrypted_bundle("./credentials", true, &kms)?;
//!     let again = trust_kit::load_or_create_encrypted_bundle("./credentials", true, &kms)?;
//!     assert_eq!(first, again);
//!     Ok(())
//! }
//! ```

pub mod compact;
pub mod config;
pub mod error;
pub mod kms;
pub mod pipeline;
pub mod pki;
pub mod storage;
pub mod token;

pub use compact::{CompactAssets, compact};
pub use config::AssetConfig;
pub use error::{Error, Result};
pub use kms::{EncryptError, EncryptService, KmsConfig};
pub use pipeline::{
    AssetPipeline, load_or_create_encrypted_bundle, load_or_create_unencrypted_bundle,
};
pub use pki::{CertificateAuthority, CertificateFactory, KeyCertPair, PerRole, Role};
pub use storage::{EncryptedAssets, RawAssets};
pub use token::{TokenGenerator, random_bootstrap_token};

/// The version of the `trust-kit` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
