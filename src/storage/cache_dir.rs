//! The provisioning directory shared by both asset stores.
// 中文: 两个资产存储共享的缓存目录。

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::AssetConfig;
use crate::error::{Error, Result};

/// Whether a cache file holds public or secret material. Decides its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Certificates.
    Public,
    /// Private keys, ciphertext and tokens.
    Secret,
}

/// A directory of cache files, one per asset.
///
/// Caching decisions are made on file presence only. A single writer per
/// directory is assumed; concurrent runs must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
    public_mode: u32,
    secret_mode: u32,
}

impl CacheDir {
    /// Opens `root`, creating it when `allow_create` is set.
    ///
    /// # Errors
    /// `MissingAsset` if the directory does not exist and may not be created.
    pub fn open(root: impl AsRef<Path>, allow_create: bool, config: &AssetConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            if !allow_create {
                return Err(Error::MissingAsset { path: root });
            }
            fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
        }

        Ok(Self {
            root,
            public_mode: config.cert_file_mode,
            secret_mode: config.key_file_mode,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Reads a cache file, `None` if it does not exist.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Like [`read`](Self::read), for UTF-8 text files.
    pub fn read_to_string(&self, name: &str) -> Result<Option<String>> {
        match self.read(name)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| Error::parse(self.path(name), e)),
            None => Ok(None),
        }
    }

    /// Replaces `name` with `contents`.
    ///
    /// The data goes to a temporary file in the same directory which is then
    /// renamed over the target, so readers never observe a half-written file.
    pub fn write(&self, name: &str, contents: &[u8], kind: FileKind) -> Result<()> {
        let path = self.path(name);
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| Error::io(&path, e))?;
        tmp.write_all(contents).map_err(|e| Error::io(&path, e))?;
        tmp.as_file().sync_all().map_err(|e| Error::io(&path, e))?;
        self.set_mode(tmp.as_file(), kind).map_err(|e| Error::io(&path, e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;
        Ok(())
    }

    /// Deletes `name`. A file that is already absent is not an error.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    #[cfg(unix)]
    fn set_mode(&self, file: &fs::File, kind: FileKind) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mode = match kind {
            FileKind::Public => self.public_mode,
            FileKind::Secret => self.secret_mode,
        };
        file.set_permissions(fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_mode(&self, _file: &fs::File, _kind: FileKind) -> io::Result<()> {
        Ok(())
    }
}
