//! The bundle handed to the bootstrap templating layer.
// 中文: 交给引导模板层的资产包。

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;

use crate::storage::{EncryptedAssets, RawAssets};

/// Base64 forms of every certificate and key, plus the two token fields.
///
/// Certificates are always plaintext. Keys are ciphertext when the bundle
/// was built in encrypted mode and plaintext PEM otherwise.
///
/// 中文: 证书始终为明文；私钥在加密模式下为密文，否则为明文 PEM。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactAssets {
    pub ca_cert: String,
    pub ca_key: String,
    pub api_server_cert: String,
    pub api_server_key: String,
    pub admin_cert: String,
    pub admin_key: String,
    pub worker_cert: String,
    pub worker_key: String,
    pub etcd_cert: String,
    pub etcd_key: String,
    pub etcd_client_cert: String,
    pub etcd_client_key: String,

    /// Token file content, empty when the cluster has none.
    pub auth_tokens: String,
    /// Kubelet TLS bootstrap token, empty when bootstrapping is disabled.
    pub tls_bootstrap_token: String,
}

impl CompactAssets {
    pub fn has_auth_tokens(&self) -> bool {
        !self.auth_tokens.is_empty()
    }

    pub fn has_tls_bootstrap_token(&self) -> bool {
        !self.tls_bootstrap_token.is_empty()
    }
}

/// Assembles the bundle. Pure: no I/O, no failure.
///
/// Keys come from `encrypted` when it is given, from `raw` otherwise.
pub fn compact(
    raw: &RawAssets,
    encrypted: Option<&EncryptedAssets>,
    auth_tokens: &str,
    tls_bootstrap_token: &str,
) -> CompactAssets {
    let certs = raw.map(|_, pair| encode(pair.cert_pem().as_bytes()));
    let keys = match encrypted {
        Some(encrypted) => encrypted.map(|_, ciphertext| encode(ciphertext)),
        None => raw.map(|_, pair| encode(pair.key_pem().as_bytes())),
    };

    CompactAssets {
        ca_cert: certs.ca,
        ca_key: keys.ca,
        api_server_cert: certs.api_server,
        api_server_key: keys.api_server,
        admin_cert: certs.admin,
        admin_key: keys.admin,
        worker_cert: certs.worker,
        worker_key: keys.worker,
        etcd_cert: certs.etcd,
        etcd_key: keys.etcd,
        etcd_client_cert: certs.etcd_client,
        etcd_client_key: keys.etcd_client,
        auth_tokens: encode(auth_tokens.as_bytes()),
        tls_bootstrap_token: encode(tls_bootstrap_token.as_bytes()),
    }
}

// empty input stays empty, which keeps the presence predicates meaningful
fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
