//! AES-256-GCM 本地信封加密后端
//!
//! Stands in for a cloud KMS where none is reachable. A fresh random nonce is
//! drawn per call, so repeated encryptions of the same key differ, as they do
//! with a real KMS. The `region/key_arn` pair is bound as associated data.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use super::{EncryptError, EncryptService};

const KEY_SIZE: usize = 32; // AES-256 需要 32 字节的密钥
const NONCE_SIZE: usize = 12; // GCM 标准的 Nonce 大小是 12 字节

pub struct LocalEnvelopeService {
    cipher: Aes256Gcm,
}

impl LocalEnvelopeService {
    pub fn new(master_key: &[u8; KEY_SIZE]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(master_key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// 使用随机主密钥
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Reverses [`EncryptService::encrypt`] for the same `key_arn` and `region`.
    pub fn decrypt(
        &self,
        key_arn: &str,
        region: &str,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, EncryptError> {
        if ciphertext.len() < NONCE_SIZE {
            return Err("ciphertext is too short to contain a nonce".into());
        }
        let (nonce, body) = ciphertext.split_at(NONCE_SIZE);
        let aad = associated_data(key_arn, region);

        self.cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: body, aad: &aad })
            .map_err(|e| format!("decryption failed: {e}").into())
    }
}

impl EncryptService for LocalEnvelopeService {
    fn encrypt(
        &self,
        key_arn: &str,
        region: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, EncryptError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let aad = associated_data(key_arn, region);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad: &aad })
            .map_err(|e| format!("encryption failed: {e}"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

impl fmt::Debug for LocalEnvelopeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEnvelopeService").finish_non_exhaustive()
    }
}

fn associated_data(key_arn: &str, region: &str) -> Vec<u8> {
    format!("{region}/{key_arn}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_is_nondeterministic() {
        let service = LocalEnvelopeService::generate();
        let a = service.encrypt("arn", "us-west-1", b"key material").unwrap();
        let b = service.encrypt("arn", "us-west-1", b"key material").unwrap();
        assert_ne!(a, b);

        assert_eq!(service.decrypt("arn", "us-west-1", &a).unwrap(), b"key material");
        assert_eq!(service.decrypt("arn", "us-west-1", &b).unwrap(), b"key material");
    }

    #[test]
    fn ciphertext_is_bound_to_key_and_region() {
        let service = LocalEnvelopeService::new(&[7u8; KEY_SIZE]);
        let ct = service.encrypt("arn", "us-west-1", b"secret").unwrap();

        assert!(service.decrypt("arn", "eu-central-1", &ct).is_err());
        assert!(service.decrypt("other-arn", "us-west-1", &ct).is_err());
        assert!(service.decrypt("arn", "us-west-1", &ct[..4]).is_err());
    }

    #[test]
    fn other_master_key_cannot_decrypt() {
        let ct = LocalEnvelopeService::new(&[1u8; KEY_SIZE])
            .encrypt("arn", "r", b"secret")
            .unwrap();
        assert!(
            LocalEnvelopeService::new(&[2u8; KEY_SIZE])
                .decrypt("arn", "r", &ct)
                .is_err()
        );
    }
}
