//! PEM parsing and chain checks for cached material.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

/// Reasons a key or certificate is rejected.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid PEM: {0}")]
    Pem(String),

    #[error("invalid certificate: {0}")]
    Certificate(String),

    #[error("invalid PKCS#1 RSA private key: {0}")]
    Key(String),

    #[error("private key does not match the certificate's public key")]
    KeyMismatch,

    #[error("certificate signature does not verify against the CA")]
    BadSignature,
}

/// Decodes a single `CERTIFICATE` PEM block into DER, checking that it parses
/// as X.509.
pub fn certificate_der(cert_pem: &str) -> Result<Vec<u8>, VerifyError> {
    let block = ::pem::parse(cert_pem.as_bytes()).map_err(|e| VerifyError::Pem(e.to_string()))?;
    if block.tag() != "CERTIFICATE" {
        return Err(VerifyError::Pem(format!(
            "expected a CERTIFICATE block, found {}",
            block.tag()
        )));
    }
    let der = block.into_contents();
    X509Certificate::from_der(&der).map_err(|e| VerifyError::Certificate(e.to_string()))?;
    Ok(der)
}

pub fn parse_private_key(key_pem: &str) -> Result<RsaPrivateKey, VerifyError> {
    RsaPrivateKey::from_pkcs1_pem(key_pem).map_err(|e| VerifyError::Key(e.to_string()))
}

/// Checks that the certificate's subject public key is the public half of
/// `key_pem`.
pub fn key_matches_certificate(key_pem: &str, cert_pem: &str) -> Result<(), VerifyError> {
    let key = parse_private_key(key_pem)?;
    let der = certificate_der(cert_pem)?;
    let (_, cert) =
        X509Certificate::from_der(&der).map_err(|e| VerifyError::Certificate(e.to_string()))?;

    let parsed = cert
        .public_key()
        .parsed()
        .map_err(|e| VerifyError::Certificate(e.to_string()))?;
    match parsed {
        PublicKey::RSA(public)
            if BigUint::from_bytes_be(public.modulus) == *key.n()
                && BigUint::from_bytes_be(public.exponent) == *key.e() =>
        {
            Ok(())
        }
        _ => Err(VerifyError::KeyMismatch),
    }
}

/// Verifies that `leaf_cert_pem` was signed by the key of `ca_cert_pem`.
pub fn verify_chain(ca_cert_pem: &str, leaf_cert_pem: &str) -> Result<(), VerifyError> {
    let ca_der = certificate_der(ca_cert_pem)?;
    let leaf_der = certificate_der(leaf_cert_pem)?;
    let (_, ca) =
        X509Certificate::from_der(&ca_der).map_err(|e| VerifyError::Certificate(e.to_string()))?;
    let (_, leaf) = X509Certificate::from_der(&leaf_der)
        .map_err(|e| VerifyError::Certificate(e.to_string()))?;

    leaf.verify_signature(Some(ca.public_key()))
        .map_err(|_| VerifyError::BadSignature)
}

/// Lowercase hex SHA-256 of the certificate's DER encoding.
pub fn fingerprint_sha256(cert_pem: &str) -> Result<String, VerifyError> {
    let der = certificate_der(cert_pem)?;
    Ok(Sha256::digest(&der)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_certificate_blocks() {
        let pem = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n";
        assert!(matches!(certificate_der(pem), Err(VerifyError::Pem(_))));
        assert!(matches!(certificate_der("garbage"), Err(VerifyError::Pem(_))));
    }

    #[test]
    fn rejects_truncated_certificate() {
        let pem = "-----BEGIN CERTIFICATE-----\nMIIBAAAA\n-----END CERTIFICATE-----\n";
        assert!(matches!(
            certificate_der(pem),
            Err(VerifyError::Certificate(_))
        ));
    }

    #[test]
    fn rejects_garbage_key() {
        assert!(matches!(
            parse_private_key("not a key"),
            Err(VerifyError::Key(_))
        ));
    }
}
