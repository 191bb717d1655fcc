//! PKI 模块：角色定义、证书工厂与链校验。
//!
//! Every leaf certificate is issued through a [`CertificateAuthority`] value, so
//! leaf material cannot exist without a resolved CA in hand.

pub mod factory;
pub mod profile;
pub mod role;
pub mod verify;

pub use factory::{CertificateAuthority, CertificateFactory, KeyCertPair};
pub use profile::{SanEntry, SanPolicy};
pub use role::{PerRole, Role};
pub use verify::{fingerprint_sha256, key_matches_certificate, verify_chain};
