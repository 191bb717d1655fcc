//!
//! # 资产配置模块
//!
//! Parameters for key generation, certificate lifetimes, cache file modes and
//! the TLS bootstrap switch. Loaded from a JSON file, from `TRUST_KIT_*`
//! environment variables, or both.
//!
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pki::SanPolicy;

/// Smallest RSA modulus the signing backend accepts.
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// 资产生成与缓存配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    /// RSA密钥位数
    pub rsa_key_bits: usize,
    /// CA 证书有效天数
    pub ca_validity_days: i64,
    /// 叶子证书有效天数
    pub leaf_validity_days: i64,
    /// 私钥、密文与令牌文件权限（Unix文件模式）
    pub key_file_mode: u32,
    /// 证书文件权限
    pub cert_file_mode: u32,
    /// 是否生成 kubelet TLS 引导令牌
    pub tls_bootstrap: bool,
    /// 各角色的 SAN
    pub subject_alt_names: SanPolicy,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            rsa_key_bits: 2048,
            ca_validity_days: 3650,
            leaf_validity_days: 365,
            key_file_mode: 0o600, // 等同于 -rw-------
            cert_file_mode: 0o644,
            tls_bootstrap: false,
            subject_alt_names: SanPolicy::default(),
        }
    }
}

impl AssetConfig {
    /// 从 JSON 文件加载配置，缺失字段取默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: AssetConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// 默认值叠加环境变量
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Overrides fields from `TRUST_KIT_*` variables that are set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_value("TRUST_KIT_RSA_KEY_BITS")? {
            self.rsa_key_bits = value;
        }
        if let Some(value) = env_value("TRUST_KIT_CA_VALIDITY_DAYS")? {
            self.ca_validity_days = value;
        }
        if let Some(value) = env_value("TRUST_KIT_LEAF_VALIDITY_DAYS")? {
            self.leaf_validity_days = value;
        }
        if let Some(value) = env_mode("TRUST_KIT_KEY_FILE_MODE")? {
            self.key_file_mode = value;
        }
        if let Some(value) = env_mode("TRUST_KIT_CERT_FILE_MODE")? {
            self.cert_file_mode = value;
        }
        if let Some(value) = env_value("TRUST_KIT_TLS_BOOTSTRAP")? {
            self.tls_bootstrap = value;
        }
        self.validate()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.rsa_key_bits < MIN_RSA_KEY_BITS {
            return Err(Error::Config(format!(
                "rsa_key_bits must be at least {MIN_RSA_KEY_BITS}, got {}",
                self.rsa_key_bits
            )));
        }
        if self.ca_validity_days <= 0 || self.leaf_validity_days <= 0 {
            return Err(Error::Config(
                "certificate validity must be a positive number of days".to_string(),
            ));
        }
        if self.leaf_validity_days > self.ca_validity_days {
            return Err(Error::Config(format!(
                "leaf validity ({} days) outlives the CA ({} days)",
                self.leaf_validity_days, self.ca_validity_days
            )));
        }
        Ok(())
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {value}"))),
        Err(_) => Ok(None),
    }
}

/// 文件权限按八进制解析，如 `600` 或 `0o600`
fn env_mode(name: &str) -> Result<Option<u32>> {
    match std::env::var(name) {
        Ok(value) => {
            let digits = value.trim().trim_start_matches("0o");
            u32::from_str_radix(digits, 8)
                .map(Some)
                .map_err(|_| Error::Config(format!("{name} is not an octal file mode: {value}")))
        }
        Err(_) => Ok(None),
    }
}
