//! Key/Cert factory: RSA key generation, the self-signed CA and CA-signed
//! role certificates.
//!
//! Randomness is an explicit value owned by the factory. [`CertificateFactory::new`]
//! uses the operating system RNG; tests and callers with their own source use
//! [`CertificateFactory::with_rng`].

use std::fmt;

use rcgen::string::Ia5String;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, PKCS_RSA_SHA256, SanType,
    SerialNumber,
};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::rand_core::{CryptoRngCore, OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use zeroize::Zeroizing;

use super::role::Usage;
use super::verify::{self, VerifyError};
use super::{Role, SanEntry, SanPolicy};
use crate::config::AssetConfig;
use crate::error::{Error, Result};

/// PEM-encoded private key (PKCS#1) and certificate of one role.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyCertPair {
    key_pem: Zeroizing<String>,
    cert_pem: String,
}

impl KeyCertPair {
    pub fn new(key_pem: impl Into<String>, cert_pem: impl Into<String>) -> Self {
        Self {
            key_pem: Zeroizing::new(key_pem.into()),
            cert_pem: cert_pem.into(),
        }
    }

    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }
}

impl fmt::Debug for KeyCertPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 不在调试输出中暴露私钥
        f.debug_struct("KeyCertPair")
            .field("cert_pem", &self.cert_pem)
            .finish_non_exhaustive()
    }
}

/// A resolved CA: its PEM material plus the signing key used to issue leaves.
///
/// Leaves are only issued through [`CertificateFactory::issue`], which takes
/// a `&CertificateAuthority`. Holding one means the CA has already been
/// generated or loaded.
pub struct CertificateAuthority {
    pair: KeyCertPair,
    signing_key: KeyPair,
}

impl CertificateAuthority {
    /// Loads a CA from cached PEM, rejecting a key that does not belong to the
    /// certificate.
    pub fn from_pem(key_pem: &str, cert_pem: &str) -> std::result::Result<Self, VerifyError> {
        let private = verify::parse_private_key(key_pem)?;
        verify::key_matches_certificate(key_pem, cert_pem)?;
        let signing_key = signing_key(&private).map_err(VerifyError::Key)?;

        Ok(Self {
            pair: KeyCertPair::new(key_pem, cert_pem),
            signing_key,
        })
    }

    pub fn pair(&self) -> &KeyCertPair {
        &self.pair
    }

    pub fn cert_pem(&self) -> &str {
        self.pair.cert_pem()
    }
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("pair", &self.pair)
            .finish_non_exhaustive()
    }
}

/// Generates RSA keys and certificates for every [`Role`].
pub struct CertificateFactory<R = OsRng> {
    rng: R,
    key_bits: usize,
    ca_validity: Duration,
    leaf_validity: Duration,
    sans: SanPolicy,
}

impl CertificateFactory<OsRng> {
    pub fn new(config: &AssetConfig) -> Self {
        Self::with_rng(config, OsRng)
    }
}

impl<R: CryptoRngCore> CertificateFactory<R> {
    pub fn with_rng(config: &AssetConfig, rng: R) -> Self {
        Self {
            rng,
            key_bits: config.rsa_key_bits,
            ca_validity: Duration::days(config.ca_validity_days),
            leaf_validity: Duration::days(config.leaf_validity_days),
            sans: config.subject_alt_names.clone(),
        }
    }

    /// Generates a fresh self-signed root.
    pub fn generate_ca(&mut self) -> Result<CertificateAuthority> {
        let role = Role::Ca;
        let (key_pem, signing_key) = self.generate_key(role)?;

        let mut params = self.base_params(role, self.ca_validity);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let cert = params
            .self_signed(&signing_key)
            .map_err(|e| Error::generation(role, format!("failed to self-sign: {e}")))?;

        Ok(CertificateAuthority {
            pair: KeyCertPair {
                key_pem,
                cert_pem: cert.pem(),
            },
            signing_key,
        })
    }

    /// Generates a key pair for `role` and a certificate for it signed by `ca`.
    pub fn issue(&mut self, ca: &CertificateAuthority, role: Role) -> Result<KeyCertPair> {
        if role.is_ca() {
            return Err(Error::generation(
                role,
                "the CA is self-signed, not issued by another CA",
            ));
        }

        let (key_pem, leaf_key) = self.generate_key(role)?;

        let mut params = self.base_params(role, self.leaf_validity);
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = role
            .usages()
            .iter()
            .map(|usage| match usage {
                Usage::ServerAuth => ExtendedKeyUsagePurpose::ServerAuth,
                Usage::ClientAuth => ExtendedKeyUsagePurpose::ClientAuth,
            })
            .collect();
        params.subject_alt_names = subject_alt_names(role, self.sans.for_role(role))?;

        let issuer = Issuer::from_ca_cert_pem(ca.cert_pem(), &ca.signing_key)
            .map_err(|e| Error::generation(role, format!("failed to load CA as issuer: {e}")))?;
        let cert = params
            .signed_by(&leaf_key, &issuer)
            .map_err(|e| Error::generation(role, format!("failed to sign certificate: {e}")))?;

        Ok(KeyCertPair {
            key_pem,
            cert_pem: cert.pem(),
        })
    }

    fn generate_key(&mut self, role: Role) -> Result<(Zeroizing<String>, KeyPair)> {
        debug!(role = %role, bits = self.key_bits, "generating RSA key");

        let private = RsaPrivateKey::new(&mut self.rng, self.key_bits)
            .map_err(|e| Error::generation(role, format!("RSA key generation failed: {e}")))?;
        let key_pem = private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| Error::generation(role, format!("PKCS#1 encoding failed: {e}")))?;
        let signing_key = signing_key(&private).map_err(|e| Error::generation(role, e))?;

        Ok((key_pem, signing_key))
    }

    fn base_params(&mut self, role: Role, validity: Duration) -> CertificateParams {
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(role.common_name().to_string()),
        );
        if let Some(org) = role.organization() {
            dn.push(DnType::OrganizationName, DnValue::Utf8String(org.to_string()));
        }
        params.distinguished_name = dn;

        // positive 127-bit serial
        let mut serial = [0u8; 16];
        self.rng.fill_bytes(&mut serial);
        serial[0] &= 0x7f;
        params.serial_number = Some(SerialNumber::from_slice(&serial));

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + validity;

        params
    }
}

/// Wraps an RSA key as an rcgen signing key (RSA PKCS#1 v1.5 with SHA-256).
fn signing_key(private: &RsaPrivateKey) -> std::result::Result<KeyPair, String> {
    let pkcs8 = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| format!("PKCS#8 encoding failed: {e}"))?;
    KeyPair::from_pem_and_sign_algo(&pkcs8, &PKCS_RSA_SHA256)
        .map_err(|e| format!("unusable RSA signing key: {e}"))
}

fn subject_alt_names(role: Role, entries: &[SanEntry]) -> Result<Vec<SanType>> {
    entries
        .iter()
        .map(|entry| match entry {
            SanEntry::Ip(ip) => Ok(SanType::IpAddress(*ip)),
            SanEntry::Dns(name) => Ia5String::try_from(name.clone())
                .map(SanType::DnsName)
                .map_err(|e| Error::generation(role, format!("invalid DNS name '{name}': {e}"))),
        })
        .collect()
}
