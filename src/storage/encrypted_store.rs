//! Ciphertext cache of the private keys.
// 中文: 私钥密文缓存。

use tracing::{debug, info};

use super::cache_dir::{CacheDir, FileKind};
use super::plaintext_store::RawAssets;
use crate::error::{Error, Result};
use crate::kms::KmsConfig;
use crate::pki::{PerRole, Role};

/// Ciphertext of every role's private key.
pub type EncryptedAssets = PerRole<Vec<u8>>;

/// Caches the output of the encryption capability, one `<role>-key.pem.enc`
/// file per role.
///
/// A present file is returned verbatim, without decryption or comparison
/// against the plaintext key. An absent one is produced by encrypting the
/// plaintext key and written before the bundle is returned. Since the
/// capability is nondeterministic, this cache is the only thing that keeps
/// repeated runs byte-identical.
///
/// 中文: 存在的密文文件原样返回；缺失的则用明文私钥加密后写入。
pub struct EncryptedAssetStore<'a> {
    cache: &'a CacheDir,
}

impl<'a> EncryptedAssetStore<'a> {
    pub fn new(cache: &'a CacheDir) -> Self {
        Self { cache }
    }

    /// Loads or creates the ciphertext of every role.
    ///
    /// # Errors
    /// `Encryption` when the capability fails; nothing is written for that
    /// role and no further role is attempted.
    pub fn load_or_create(&self, raw: &RawAssets, kms: &KmsConfig) -> Result<EncryptedAssets> {
        PerRole::try_from_fn(|role| self.load_or_encrypt(raw, kms, role))
    }

    fn load_or_encrypt(&self, raw: &RawAssets, kms: &KmsConfig, role: Role) -> Result<Vec<u8>> {
        let file = role.encrypted_key_file();
        if let Some(ciphertext) = self.cache.read(&file)? {
            debug!(role = %role, "loaded cached ciphertext");
            return Ok(ciphertext);
        }

        let ciphertext = kms
            .encrypt(raw.get(role).key_pem().as_bytes())
            .map_err(|source| Error::Encryption {
                role,
                key_arn: kms.key_arn.clone(),
                source,
            })?;
        self.cache.write(&file, &ciphertext, FileKind::Secret)?;
        info!(role = %role, key_arn = %kms.key_arn, "encrypted private key");
        Ok(ciphertext)
    }
}
