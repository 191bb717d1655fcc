//! The envelope-encryption capability injected by the infrastructure layer.
//!
//! Implementations are expected to be nondeterministic: two calls with the
//! same input may return different ciphertext. Nothing in this crate compares
//! ciphertexts; stable output comes from the ciphertext cache alone.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "local-kms")]
pub mod local;

#[cfg(feature = "local-kms")]
pub use local::LocalEnvelopeService;

/// Error returned by an [`EncryptService`].
pub type EncryptError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Encrypts key material under a remote master key.
///
/// Retries, timeouts and cancellation belong to the implementation; callers
/// surface any error as is.
pub trait EncryptService: Send + Sync {
    fn encrypt(&self, key_arn: &str, region: &str, plaintext: &[u8])
    -> Result<Vec<u8>, EncryptError>;
}

impl<F> EncryptService for F
where
    F: Fn(&str, &str, &[u8]) -> Result<Vec<u8>, EncryptError> + Send + Sync,
{
    fn encrypt(
        &self,
        key_arn: &str,
        region: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, EncryptError> {
        self(key_arn, region, plaintext)
    }
}

/// Target master key, its region and the service that talks to it.
#[derive(Clone)]
pub struct KmsConfig {
    pub key_arn: String,
    pub region: String,
    pub encrypt_service: Arc<dyn EncryptService>,
}

impl KmsConfig {
    pub fn new(
        key_arn: impl Into<String>,
        region: impl Into<String>,
        encrypt_service: impl EncryptService + 'static,
    ) -> Self {
        Self {
            key_arn: key_arn.into(),
            region: region.into(),
            encrypt_service: Arc::new(encrypt_service),
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptError> {
        self.encrypt_service
            .encrypt(&self.key_arn, &self.region, plaintext)
    }
}

impl fmt::Debug for KmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsConfig")
            .field("key_arn", &self.key_arn)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
