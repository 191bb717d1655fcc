//!
//! 集成测试的通用辅助函数
//!

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use trust_kit::{EncryptError, EncryptService, KmsConfig};

pub const TEST_KEY_ARN: &str = "arn:aws:kms:us-west-1:xxxxxxxxx:key/xxxxxxxxxxxxxxxxxxx";
pub const TEST_REGION: &str = "us-west-1";

/// A nondeterministic stand-in for a KMS: each call prefixes the plaintext
/// with a fresh call number, so equal inputs never give equal ciphertext.
#[derive(Clone, Default)]
pub struct CountingEncryptService {
    calls: Arc<AtomicUsize>,
}

impl CountingEncryptService {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EncryptService for CountingEncryptService {
    fn encrypt(
        &self,
        key_arn: &str,
        region: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, EncryptError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = format!("{n}|{region}|{key_arn}|").into_bytes();
        out.extend_from_slice(plaintext);
        Ok(out)
    }
}

/// A `KmsConfig` over a fresh [`CountingEncryptService`], returned alongside a
/// handle for reading its call count.
pub fn counting_kms() -> (KmsConfig, CountingEncryptService) {
    let service = CountingEncryptService::default();
    let kms = KmsConfig::new(TEST_KEY_ARN, TEST_REGION, service.clone());
    (kms, service)
}
