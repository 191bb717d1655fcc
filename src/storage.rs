//! The storage module, defining how assets are cached on disk.
// 中文: 存储模块，定义资产如何缓存在磁盘上。

pub mod cache_dir;
pub mod encrypted_store;
pub mod plaintext_store;

pub use cache_dir::{CacheDir, FileKind};
pub use encrypted_store::{EncryptedAssetStore, EncryptedAssets};
pub use plaintext_store::{PlaintextAssetStore, RawAssets};
