//! Plaintext storage of PEM keys and certificates.
// 中文: PEM 私钥与证书的明文存储。

use rsa::rand_core::CryptoRngCore;
use tracing::{debug, info, warn};

use super::cache_dir::{CacheDir, FileKind};
use crate::error::{Error, Result};
use crate::pki::{
    CertificateAuthority, CertificateFactory, KeyCertPair, PerRole, Role, fingerprint_sha256,
    key_matches_certificate, verify_chain,
};

/// PEM key and certificate of every role.
pub type RawAssets = PerRole<KeyCertPair>;

/// The source of identity stability: once a directory holds a complete set of
/// PEM files, every later load returns exactly those bytes.
///
/// Resolution order is CA first. A missing `ca-key.pem` means a new CA, and a
/// new CA means every leaf is issued again, whatever leaf files exist. A cached
/// leaf that does not chain to the cached CA is an error, never reused.
///
/// Writing a fresh key for a role first deletes that role's `.pem.enc` entry,
/// so the ciphertext cache never outlives the key it was made from.
pub struct PlaintextAssetStore<'a> {
    cache: &'a CacheDir,
}

impl<'a> PlaintextAssetStore<'a> {
    pub fn new(cache: &'a CacheDir) -> Self {
        Self { cache }
    }

    /// Loads every role from the cache, generating what is missing when
    /// `allow_create` is set.
    pub fn load_or_create<R: CryptoRngCore>(
        &self,
        factory: &mut CertificateFactory<R>,
        allow_create: bool,
    ) -> Result<RawAssets> {
        match self.load_ca()? {
            Some(ca) => PerRole::try_from_fn(|role| {
                if role.is_ca() {
                    Ok(ca.pair().clone())
                } else {
                    self.load_or_issue_leaf(factory, &ca, role, allow_create)
                }
            }),
            None if allow_create => self.create_all(factory),
            None => Err(Error::MissingAsset {
                path: self.cache.path(&Role::Ca.key_file()),
            }),
        }
    }

    /// `None` when no CA key is cached. A CA key without a usable certificate
    /// is fatal: issuing a new CA would orphan the cached leaves.
    fn load_ca(&self) -> Result<Option<CertificateAuthority>> {
        let key_file = Role::Ca.key_file();
        let cert_file = Role::Ca.cert_file();

        let Some(key_pem) = self.cache.read_to_string(&key_file)? else {
            return Ok(None);
        };
        let Some(cert_pem) = self.cache.read_to_string(&cert_file)? else {
            return Err(Error::parse(
                self.cache.path(&cert_file),
                "the CA key is cached but its certificate is missing",
            ));
        };

        let ca = CertificateAuthority::from_pem(&key_pem, &cert_pem)
            .map_err(|e| Error::parse(self.cache.path(&cert_file), e))?;
        debug!(dir = %self.cache.root().display(), "loaded cached CA");
        Ok(Some(ca))
    }

    fn create_all<R: CryptoRngCore>(
        &self,
        factory: &mut CertificateFactory<R>,
    ) -> Result<RawAssets> {
        info!(dir = %self.cache.root().display(), "generating a new CA and all role certificates");
        let ca = factory.generate_ca()?;
        self.invalidate_ciphertext(Role::Ca)?;

        let assets = PerRole::try_from_fn(|role| -> Result<KeyCertPair> {
            if role.is_ca() {
                return Ok(ca.pair().clone());
            }
            let pair = factory.issue(&ca, role)?;
            self.save_leaf(role, &pair)?;
            Ok(pair)
        })?;

        // CA last, key after certificate: an interrupted run leaves no CA key
        // behind, and the next run starts over.
        self.cache.write(
            &Role::Ca.cert_file(),
            ca.cert_pem().as_bytes(),
            FileKind::Public,
        )?;
        self.cache.write(
            &Role::Ca.key_file(),
            ca.pair().key_pem().as_bytes(),
            FileKind::Secret,
        )?;

        Ok(assets)
    }

    fn load_or_issue_leaf<R: CryptoRngCore>(
        &self,
        factory: &mut CertificateFactory<R>,
        ca: &CertificateAuthority,
        role: Role,
        allow_create: bool,
    ) -> Result<KeyCertPair> {
        let key_file = role.key_file();
        let cert_file = role.cert_file();

        match (
            self.cache.read_to_string(&key_file)?,
            self.cache.read_to_string(&cert_file)?,
        ) {
            (Some(key_pem), Some(cert_pem)) => {
                key_matches_certificate(&key_pem, &cert_pem)
                    .map_err(|e| Error::parse(self.cache.path(&key_file), e))?;
                verify_chain(ca.cert_pem(), &cert_pem)
                    .map_err(|e| Error::parse(self.cache.path(&cert_file), e))?;
                let fingerprint = fingerprint_sha256(&cert_pem)
                    .map_err(|e| Error::parse(self.cache.path(&cert_file), e))?;
                debug!(role = %role, %fingerprint, "loaded cached key pair");
                Ok(KeyCertPair::new(key_pem, cert_pem))
            }
            (key, cert) => {
                if !allow_create {
                    let missing = if key.is_none() { key_file } else { cert_file };
                    return Err(Error::MissingAsset {
                        path: self.cache.path(&missing),
                    });
                }
                if key.is_some() || cert.is_some() {
                    warn!(role = %role, "discarding incomplete cached key pair");
                }
                let pair = factory.issue(ca, role)?;
                self.save_leaf(role, &pair)?;
                Ok(pair)
            }
        }
    }

    fn save_leaf(&self, role: Role, pair: &KeyCertPair) -> Result<()> {
        let fingerprint =
            fingerprint_sha256(pair.cert_pem()).map_err(|e| Error::generation(role, e))?;
        self.invalidate_ciphertext(role)?;
        self.cache
            .write(&role.key_file(), pair.key_pem().as_bytes(), FileKind::Secret)?;
        self.cache
            .write(&role.cert_file(), pair.cert_pem().as_bytes(), FileKind::Public)?;
        info!(role = %role, %fingerprint, "issued certificate");
        Ok(())
    }

    // before the new key lands on disk: a crash in between then costs one
    // extra encryption, never a ciphertext of the previous key
    fn invalidate_ciphertext(&self, role: Role) -> Result<()> {
        let file = role.encrypted_key_file();
        if self.cache.contains(&file) {
            debug!(role = %role, "dropping ciphertext of the replaced key");
        }
        self.cache.remove(&file)
    }
}
