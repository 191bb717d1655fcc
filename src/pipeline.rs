//! # 资产流水线
//!
//! Ties the stores together: plaintext identity first, then (in encrypted
//! mode) the ciphertext cache, then the token files, then compaction. Every
//! step runs sequentially on the calling thread; a failure at any step aborts
//! the run and no partial bundle is returned.

use std::path::{Path, PathBuf};

use rand_core::TryCryptoRng;
use rsa::rand_core::{CryptoRngCore, OsRng};
use tracing::{debug, info};

use crate::compact::{CompactAssets, compact};
use crate::config::AssetConfig;
use crate::error::{Error, Result};
use crate::kms::KmsConfig;
use crate::pki::CertificateFactory;
use crate::storage::{
    CacheDir, EncryptedAssetStore, FileKind, PlaintextAssetStore, RawAssets,
};
use crate::token::{AuthTokens, TokenGenerator, is_bootstrap_token};

/// Optional token file, copied into the bundle when present.
pub const AUTH_TOKENS_FILE: &str = "tokens.csv";
/// Persisted kubelet TLS bootstrap token.
pub const TLS_BOOTSTRAP_TOKEN_FILE: &str = "kubelet-tls-bootstrap-token";

/// Builds bundles for one provisioning directory.
///
/// `allow_create` defaults to `true`. When disabled, any missing identity
/// file is an error instead of being generated. Ciphertext entries are still
/// created from the cached plaintext keys, since they carry no identity.
///
/// Both random sources are owned values: `K` feeds RSA key and serial
/// generation, `T` the bootstrap token. They default to the operating
/// system's generator and are replaced with [`with_key_rng`](Self::with_key_rng)
/// and [`with_token_generator`](Self::with_token_generator).
///
/// 中文: 为单个缓存目录构建资产包。
#[derive(Debug)]
pub struct AssetPipeline<K = OsRng, T = rand_core::OsRng> {
    dir: PathBuf,
    allow_create: bool,
    config: AssetConfig,
    key_rng: K,
    tokens: TokenGenerator<T>,
}

impl AssetPipeline {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            allow_create: true,
            config: AssetConfig::default(),
            key_rng: OsRng,
            tokens: TokenGenerator::new(),
        }
    }
}

impl<K: CryptoRngCore, T: TryCryptoRng> AssetPipeline<K, T> {
    /// Replaces the source of key and serial-number randomness.
    pub fn with_key_rng<K2: CryptoRngCore>(self, key_rng: K2) -> AssetPipeline<K2, T> {
        AssetPipeline {
            dir: self.dir,
            allow_create: self.allow_create,
            config: self.config,
            key_rng,
            tokens: self.tokens,
        }
    }

    /// Replaces the generator used for a missing bootstrap token.
    pub fn with_token_generator<T2: TryCryptoRng>(
        self,
        tokens: TokenGenerator<T2>,
    ) -> AssetPipeline<K, T2> {
        AssetPipeline {
            dir: self.dir,
            allow_create: self.allow_create,
            config: self.config,
            key_rng: self.key_rng,
            tokens,
        }
    }

    pub fn allow_create(mut self, allow_create: bool) -> Self {
        self.allow_create = allow_create;
        self
    }

    pub fn with_config(mut self, config: AssetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// Loads or creates the plaintext keys and certificates only.
    pub fn load_or_create_raw(&mut self) -> Result<RawAssets> {
        let cache = self.open_cache()?;
        self.raw_assets(&cache)
    }

    /// Bundle whose keys are encrypted through `kms`.
    pub fn load_or_create_encrypted(&mut self, kms: &KmsConfig) -> Result<CompactAssets> {
        let cache = self.open_cache()?;
        let raw = self.raw_assets(&cache)?;
        let encrypted = EncryptedAssetStore::new(&cache).load_or_create(&raw, kms)?;
        let (auth_tokens, bootstrap_token) = self.load_or_create_tokens(&cache)?;

        info!(dir = %self.dir.display(), "assembled encrypted asset bundle");
        Ok(compact(&raw, Some(&encrypted), &auth_tokens, &bootstrap_token))
    }

    /// Bundle carrying the plaintext keys.
    pub fn load_or_create_unencrypted(&mut self) -> Result<CompactAssets> {
        let cache = self.open_cache()?;
        let raw = self.raw_assets(&cache)?;
        let (auth_tokens, bootstrap_token) = self.load_or_create_tokens(&cache)?;

        info!(dir = %self.dir.display(), "assembled unencrypted asset bundle");
        Ok(compact(&raw, None, &auth_tokens, &bootstrap_token))
    }

    fn open_cache(&self) -> Result<CacheDir> {
        self.config.validate()?;
        CacheDir::open(&self.dir, self.allow_create, &self.config)
    }

    fn raw_assets(&mut self, cache: &CacheDir) -> Result<RawAssets> {
        let mut factory = CertificateFactory::with_rng(&self.config, &mut self.key_rng);
        PlaintextAssetStore::new(cache).load_or_create(&mut factory, self.allow_create)
    }

    /// Returns the auth token file content and the bootstrap token, each
    /// empty when not in use.
    fn load_or_create_tokens(&mut self, cache: &CacheDir) -> Result<(String, String)> {
        let mut auth_tokens = match cache.read_to_string(AUTH_TOKENS_FILE)? {
            Some(content) => AuthTokens::parse(&cache.path(AUTH_TOKENS_FILE), content)?,
            None => AuthTokens::default(),
        };

        if !self.config.tls_bootstrap {
            return Ok((auth_tokens.into_string(), String::new()));
        }

        let token = self.load_or_create_bootstrap_token(cache)?;
        auth_tokens.ensure_bootstrap_entry(&token);
        Ok((auth_tokens.into_string(), token))
    }

    fn load_or_create_bootstrap_token(&mut self, cache: &CacheDir) -> Result<String> {
        if let Some(content) = cache.read_to_string(TLS_BOOTSTRAP_TOKEN_FILE)? {
            // a trailing newline from hand editing is tolerated, nothing else
            let token = content.trim_end_matches(['\r', '\n']);
            if !is_bootstrap_token(token) {
                return Err(Error::parse(
                    cache.path(TLS_BOOTSTRAP_TOKEN_FILE),
                    "not a valid bootstrap token",
                ));
            }
            debug!("loaded cached TLS bootstrap token");
            return Ok(token.to_string());
        }

        if !self.allow_create {
            return Err(Error::MissingAsset {
                path: cache.path(TLS_BOOTSTRAP_TOKEN_FILE),
            });
        }

        let token = self.tokens.bootstrap_token()?;
        cache.write(TLS_BOOTSTRAP_TOKEN_FILE, token.as_bytes(), FileKind::Secret)?;
        info!("generated TLS bootstrap token");
        Ok(token)
    }
}

/// Loads or creates every asset under `dir` and returns the bundle with
/// encrypted keys.
pub fn load_or_create_encrypted_bundle(
    dir: impl Into<PathBuf>,
    allow_create: bool,
    kms: &KmsConfig,
) -> Result<CompactAssets> {
    AssetPipeline::new(dir)
        .allow_create(allow_create)
        .load_or_create_encrypted(kms)
}

/// Loads or creates every asset under `dir` and returns the bundle with
/// plaintext keys.
pub fn load_or_create_unencrypted_bundle(
    dir: impl Into<PathBuf>,
    allow_create: bool,
) -> Result<CompactAssets> {
    AssetPipeline::new(dir)
        .allow_create(allow_create)
        .load_or_create_unencrypted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::key_matches_certificate;
    use rand_core::TryRngCore;
    use rsa::rand_core::{CryptoRng, RngCore};
    use std::fs;
    use tempfile::tempdir;

    /// splitmix64, seeded: the same seed yields the same keys.
    struct SeededRng(u64);

    impl RngCore for SeededRng {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = self.0;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^ (z >> 31)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for chunk in dest.chunks_mut(8) {
                let bytes = self.next_u64().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }

        fn try_fill_bytes(
            &mut self,
            dest: &mut [u8],
        ) -> std::result::Result<(), rsa::rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for SeededRng {}

    #[derive(Debug)]
    struct NoEntropy;

    impl std::fmt::Display for NoEntropy {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("no entropy")
        }
    }

    struct DeadRng;

    impl TryRngCore for DeadRng {
        type Error = NoEntropy;

        fn try_next_u32(&mut self) -> std::result::Result<u32, NoEntropy> {
            Err(NoEntropy)
        }

        fn try_next_u64(&mut self) -> std::result::Result<u64, NoEntropy> {
            Err(NoEntropy)
        }

        fn try_fill_bytes(&mut self, _dst: &mut [u8]) -> std::result::Result<(), NoEntropy> {
            Err(NoEntropy)
        }
    }

    impl TryCryptoRng for DeadRng {}

    fn bootstrap_config() -> AssetConfig {
        AssetConfig {
            tls_bootstrap: true,
            ..AssetConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_touching_disk() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("assets");
        let config = AssetConfig {
            rsa_key_bits: 1024,
            ..AssetConfig::default()
        };

        let result = AssetPipeline::new(&root).with_config(config).load_or_create_raw();
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(!root.exists());
    }

    #[test]
    fn tokens_are_empty_without_files_or_bootstrap() -> Result<()> {
        let dir = tempdir().unwrap();
        let assets = load_or_create_unencrypted_bundle(dir.path(), true)?;
        assert!(!assets.has_auth_tokens());
        assert!(!assets.has_tls_bootstrap_token());
        assert!(!dir.path().join(TLS_BOOTSTRAP_TOKEN_FILE).exists());
        Ok(())
    }

    #[test]
    fn bootstrap_token_is_persisted_and_listed() -> Result<()> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(AUTH_TOKENS_FILE), "admintoken,admin,1000\n").unwrap();
        let mut pipeline = AssetPipeline::new(dir.path()).with_config(bootstrap_config());

        let first = pipeline.load_or_create_unencrypted()?;
        let token = fs::read_to_string(dir.path().join(TLS_BOOTSTRAP_TOKEN_FILE)).unwrap();

        let cache = CacheDir::open(dir.path(), false, pipeline.config())?;
        let (auth, bootstrap) = pipeline.load_or_create_tokens(&cache)?;
        assert_eq!(bootstrap, token);
        assert!(auth.starts_with("admintoken,admin,1000\n"));
        assert!(auth.contains(&format!("{token},kubelet-bootstrap,10001,")));

        assert!(first.has_auth_tokens());
        assert!(first.has_tls_bootstrap_token());
        assert_eq!(pipeline.load_or_create_unencrypted()?, first);
        Ok(())
    }

    #[test]
    fn missing_bootstrap_token_without_create() -> Result<()> {
        let dir = tempdir().unwrap();
        AssetPipeline::new(dir.path()).load_or_create_raw()?;

        let result = AssetPipeline::new(dir.path())
            .with_config(bootstrap_config())
            .allow_create(false)
            .load_or_create_unencrypted();
        match result {
            Err(Error::MissingAsset { path }) => assert!(path.ends_with(TLS_BOOTSTRAP_TOKEN_FILE)),
            other => panic!("expected MissingAsset, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn key_rng_is_taken_from_the_builder() -> Result<()> {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();

        let a = AssetPipeline::new(first.path())
            .with_key_rng(SeededRng(7))
            .load_or_create_raw()?;
        let b = AssetPipeline::new(second.path())
            .with_key_rng(SeededRng(7))
            .load_or_create_raw()?;

        assert_eq!(a.ca.key_pem(), b.ca.key_pem());
        assert_eq!(a.worker.key_pem(), b.worker.key_pem());
        assert_ne!(a.worker.key_pem(), a.admin.key_pem());
        key_matches_certificate(a.etcd.key_pem(), a.etcd.cert_pem()).unwrap();
        Ok(())
    }

    #[test]
    fn token_source_failure_aborts_the_bundle() -> Result<()> {
        let dir = tempdir().unwrap();
        let result = AssetPipeline::new(dir.path())
            .with_config(bootstrap_config())
            .with_token_generator(TokenGenerator::with_rng(DeadRng))
            .load_or_create_unencrypted();

        match result {
            Err(Error::RandomSource(reason)) => assert_eq!(reason, "no entropy"),
            other => panic!("expected RandomSource, got {other:?}"),
        }
        assert!(!dir.path().join(TLS_BOOTSTRAP_TOKEN_FILE).exists());
        Ok(())
    }

    #[test]
    fn cached_bootstrap_token_must_be_url_safe() -> Result<()> {
        let dir = tempdir().unwrap();
        AssetPipeline::new(dir.path()).load_or_create_raw()?;
        let token_file = dir.path().join(TLS_BOOTSTRAP_TOKEN_FILE);

        for bad in ["", "abc def", "abc,def", "a+b/c", " abc", "abc\tdef"] {
            fs::write(&token_file, bad).unwrap();
            let result = AssetPipeline::new(dir.path())
                .with_config(bootstrap_config())
                .load_or_create_unencrypted();
            assert!(
                matches!(result, Err(Error::Parse { .. })),
                "{bad:?} was accepted"
            );
        }

        fs::write(&token_file, "abc-DEF_123=\n").unwrap();
        let assets = AssetPipeline::new(dir.path())
            .with_config(bootstrap_config())
            .load_or_create_unencrypted()?;
        assert!(assets.has_tls_bootstrap_token());
        Ok(())
    }

    #[test]
    fn malformed_token_file_aborts_the_bundle() -> Result<()> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(AUTH_TOKENS_FILE), "only-a-token\n").unwrap();
        assert!(matches!(
            load_or_create_unencrypted_bundle(dir.path(), true),
            Err(Error::Parse { .. })
        ));
        Ok(())
    }
}
