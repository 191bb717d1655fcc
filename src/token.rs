//! 令牌生成模块
//!
//! Bearer and bootstrap tokens drawn from a cryptographically secure source.

pub mod auth_file;

pub use auth_file::{AuthTokens, TokenRecord};

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use rand_core::{OsRng, TryCryptoRng};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Entropy of a bootstrap token: 256 bits.
pub const TOKEN_BYTES: usize = 32;

/// Generates tokens from an injected random source.
///
/// Tokens are rendered in the URL-safe base64 alphabet, which has no comma,
/// so they can be embedded in the comma-separated token file as they are.
///
/// 中文: 令牌使用 URL 安全的 base64 字母表，不含逗号。
#[derive(Debug, Clone, Default)]
pub struct TokenGenerator<R = OsRng> {
    rng: R,
}

impl TokenGenerator<OsRng> {
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl<R: TryCryptoRng> TokenGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Draws [`TOKEN_BYTES`] random bytes and encodes them.
    ///
    /// # Errors
    /// `RandomSource` when the generator fails. There is no fallback source.
    pub fn bootstrap_token(&mut self) -> Result<String> {
        let mut bytes = Zeroizing::new([0u8; TOKEN_BYTES]);
        self.rng
            .try_fill_bytes(&mut bytes[..])
            .map_err(|e| Error::RandomSource(e.to_string()))?;
        Ok(URL_SAFE.encode(&bytes[..]))
    }
}

/// Whether `token` is non-empty and uses only the URL-safe base64 alphabet.
/// Such a token can be written into the token file as it is.
pub fn is_bootstrap_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='))
}

/// A bootstrap token from the operating system's generator.
pub fn random_bootstrap_token() -> Result<String> {
    TokenGenerator::new().bootstrap_token()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::TryRngCore;
    use std::fmt;

    #[test]
    fn token_never_contains_a_comma() {
        for _ in 0..64 {
            assert!(!random_bootstrap_token().unwrap().contains(','));
        }
    }

    #[test]
    fn token_decodes_to_256_bits() {
        let token = random_bootstrap_token().unwrap();
        assert_eq!(URL_SAFE.decode(&token).unwrap().len(), TOKEN_BYTES);
    }

    #[test]
    fn token_alphabet_check() {
        assert!(is_bootstrap_token(&random_bootstrap_token().unwrap()));
        assert!(is_bootstrap_token("abc-DEF_123="));
        for bad in ["", "a,b", "a b", "abc\n", "a+b/", "tök"] {
            assert!(!is_bootstrap_token(bad), "{bad:?} accepted");
        }
    }

    #[test]
    fn successive_tokens_differ() {
        let mut generator = TokenGenerator::new();
        assert_ne!(
            generator.bootstrap_token().unwrap(),
            generator.bootstrap_token().unwrap()
        );
    }

    #[derive(Debug)]
    struct Exhausted;

    impl fmt::Display for Exhausted {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("entropy pool exhausted")
        }
    }

    struct BrokenRng;

    impl TryRngCore for BrokenRng {
        type Error = Exhausted;

        fn try_next_u32(&mut self) -> std::result::Result<u32, Exhausted> {
            Err(Exhausted)
        }

        fn try_next_u64(&mut self) -> std::result::Result<u64, Exhausted> {
            Err(Exhausted)
        }

        fn try_fill_bytes(&mut self, _dst: &mut [u8]) -> std::result::Result<(), Exhausted> {
            Err(Exhausted)
        }
    }

    impl TryCryptoRng for BrokenRng {}

    #[test]
    fn broken_source_is_fatal() {
        match TokenGenerator::with_rng(BrokenRng).bootstrap_token() {
            Err(Error::RandomSource(reason)) => assert_eq!(reason, "entropy pool exhausted"),
            other => panic!("expected RandomSource, got {other:?}"),
        }
    }
}
