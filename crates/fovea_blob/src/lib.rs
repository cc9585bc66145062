//! Filesystem blob store.
//!
//! Blobs are addressed by *relative* keys. Writes accept and return the
//! relative key; reads resolve it to an absolute path. Nothing outside this
//! crate ever joins paths under the data root, and the job table only ever
//! stores relative keys.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    /// Absolute, traversing, or otherwise malformed key
    #[error("Bad blob key '{key}': {reason}")]
    BadKey { key: String, reason: &'static str },

    /// Underlying filesystem failure
    #[error("Storage error at '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Base directory missing or not creatable at startup
    #[error("Cannot initialize blob store at {path}: {source}")]
    BaseDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Keys
// ============================================================================

/// A validated relative blob key.
///
/// Never begins with a path separator, never contains `..` or a drive
/// prefix. This is the only path type the database is allowed to store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobKey(String);

impl BlobKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(BlobError::BadKey {
                key,
                reason: "empty key",
            });
        }
        let path = Path::new(&key);
        for component in path.components() {
            match component {
                Component::Normal(_) => {}
                Component::CurDir => {
                    return Err(BlobError::BadKey {
                        key,
                        reason: "key contains a '.' segment",
                    })
                }
                Component::ParentDir => {
                    return Err(BlobError::BadKey {
                        key,
                        reason: "key contains a '..' segment",
                    })
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(BlobError::BadKey {
                        key,
                        reason: "key must be relative",
                    })
                }
            }
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Store
// ============================================================================

/// Blob container rooted at an absolute base directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    base_dir: PathBuf,
}

impl BlobStore {
    /// Open a store rooted at `base_dir`, creating and canonicalizing it.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|source| BlobError::BaseDir {
            path: base_dir.clone(),
            source,
        })?;
        let base_dir = base_dir.canonicalize().map_err(|source| BlobError::BaseDir {
            path: base_dir.clone(),
            source,
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write `bytes` under `key`, creating parent directories. Returns the
    /// key it was given, never an absolute path; the return value is what
    /// callers persist.
    pub async fn put(&self, bytes: &[u8], key: &BlobKey) -> Result<BlobKey> {
        let path = self.base_dir.join(key.as_str());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| BlobError::Storage {
                    key: key.to_string(),
                    source,
                })?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| BlobError::Storage {
                key: key.to_string(),
                source,
            })?;
        debug!("Wrote {} byte(s) to blob {}", bytes.len(), key);
        Ok(key.clone())
    }

    /// Absolute path for readers. Does not check existence; readers handle
    /// not-found themselves.
    pub fn open_path(&self, key: &BlobKey) -> PathBuf {
        self.base_dir.join(key.as_str())
    }

    /// Read a blob fully into memory.
    pub async fn read(&self, key: &BlobKey) -> Result<Vec<u8>> {
        tokio::fs::read(self.open_path(key))
            .await
            .map_err(|source| BlobError::Storage {
                key: key.to_string(),
                source,
            })
    }

    /// Best-effort delete; a missing key is not an error.
    pub async fn delete(&self, key: &BlobKey) {
        let path = self.open_path(key);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to delete blob {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, BlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn keys_reject_absolute_paths() {
        assert!(BlobKey::new("/etc/passwd").is_err());
    }

    #[test]
    fn keys_reject_traversal() {
        assert!(BlobKey::new("../escape.json").is_err());
        assert!(BlobKey::new("output/../../escape.json").is_err());
    }

    #[test]
    fn keys_reject_empty_and_dot() {
        assert!(BlobKey::new("").is_err());
        assert!(BlobKey::new("./x.json").is_err());
    }

    #[test]
    fn keys_accept_nested_relative() {
        assert!(BlobKey::new("output/abc.json").is_ok());
        assert!(BlobKey::new("abc.mp4").is_ok());
    }

    #[tokio::test]
    async fn put_returns_the_key_it_was_given() {
        let (_dir, store) = store();
        let key = BlobKey::new("output/result.json").unwrap();
        let returned = store.put(b"{}", &key).await.unwrap();
        assert_eq!(returned, key);
    }

    #[tokio::test]
    async fn put_then_read_round_trips() {
        let (_dir, store) = store();
        let key = BlobKey::new("input.png").unwrap();
        store.put(b"bytes", &key).await.unwrap();
        assert_eq!(store.read(&key).await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn open_path_is_absolute_and_inside_base() {
        let (_dir, store) = store();
        let key = BlobKey::new("output/x.json").unwrap();
        let path = store.open_path(&key);
        assert!(path.is_absolute());
        assert!(path.starts_with(store.base_dir()));
    }

    #[tokio::test]
    async fn delete_missing_key_is_quiet() {
        let (_dir, store) = store();
        let key = BlobKey::new("never-written.bin").unwrap();
        store.delete(&key).await;
    }
}
