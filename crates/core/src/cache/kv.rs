//! Embedded key/value backend on sled.
//!
//! The three-level `root/bucket/key` hierarchy maps onto sled as one tree
//! per root (`page`, `jobs`) with `bucket/key` composite keys inside.
//! Multi-entry removals go through a single `sled::Batch`, so readers never
//! observe a partially-cleared bucket.

use async_trait::async_trait;
use std::path::Path;

use super::entry::ExpiryProbe;
use super::{CacheBackend, CachePath, CacheRecord};
use crate::Error;

/// Sled-backed cache for the long-running deployment.
#[derive(Debug, Clone)]
pub struct KvCache {
    db: sled::Db,
}

impl KvCache {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// An in-memory store for tests.
    pub fn temporary() -> Result<Self, Error> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn tree(&self, root: &str) -> Result<sled::Tree, Error> {
        Ok(self.db.open_tree(root.as_bytes())?)
    }

    /// Composite key inside a root tree: `bucket/key`.
    fn entry_key(path: &CachePath) -> Result<Vec<u8>, Error> {
        if path.bucket_name().is_empty() || path.key().is_empty() {
            return Err(Error::InvalidInput(format!("incomplete cache path: {path}")));
        }
        Ok(format!("{}/{}", path.bucket_name(), path.key()).into_bytes())
    }

    /// Scan prefix for every entry under `path[/suffix]`.
    fn scan_prefix(path: &CachePath, suffix: &str) -> Result<Vec<u8>, Error> {
        if path.bucket_name().is_empty() {
            return Err(Error::InvalidInput(format!("empty bucket in prefix: {path}")));
        }
        let mut prefix = path.bucket_name().to_string();
        if !path.key().is_empty() {
            prefix.push('/');
            prefix.push_str(path.key());
        }
        if !suffix.is_empty() {
            prefix.push('/');
            prefix.push_str(suffix);
        }
        prefix.push('/');
        Ok(prefix.into_bytes())
    }
}

#[async_trait]
impl CacheBackend for KvCache {
    async fn update(&self, path: &CachePath, data: &[u8]) -> Result<(), Error> {
        let tree = self.tree(path.root())?;
        tree.insert(Self::entry_key(path)?, data)?;
        tree.flush_async().await?;
        Ok(())
    }

    async fn update_at(&self, path: &CachePath, suffix: &str, data: &[u8]) -> Result<(), Error> {
        self.update(&path.join(suffix), data).await
    }

    async fn read(&self, path: &CachePath) -> Result<Vec<u8>, Error> {
        let tree = self.tree(path.root())?;
        match tree.get(Self::entry_key(path)?)? {
            Some(value) if !value.is_empty() => Ok(value.to_vec()),
            _ => Err(Error::CacheNotFound(path.as_str())),
        }
    }

    async fn exists(&self, path: &CachePath) -> Result<bool, Error> {
        let tree = self.tree(path.root())?;
        Ok(matches!(tree.get(Self::entry_key(path)?)?, Some(value) if !value.is_empty()))
    }

    async fn delete(&self, path: &CachePath) -> Result<(), Error> {
        let tree = self.tree(path.root())?;
        tree.remove(Self::entry_key(path)?)?;
        tree.flush_async().await?;
        Ok(())
    }

    async fn delete_prefix(&self, path: &CachePath) -> Result<(), Error> {
        let tree = self.tree(path.root())?;
        let prefix = Self::scan_prefix(path, "")?;

        let mut batch = sled::Batch::default();
        for item in tree.scan_prefix(&prefix) {
            let (key, _) = item?;
            batch.remove(key);
        }
        // A keyed prefix also names an exact entry (`bucket/key`), which the
        // trailing-slash scan does not cover.
        if !path.key().is_empty() {
            batch.remove(Self::entry_key(path)?);
        }
        tree.apply_batch(batch)?;
        tree.flush_async().await?;
        Ok(())
    }

    async fn is_empty_prefix(&self, path: &CachePath, suffix: &str) -> Result<bool, Error> {
        let tree = self.tree(path.root())?;
        let prefix = Self::scan_prefix(path, suffix)?;
        Ok(tree.scan_prefix(&prefix).next().is_none())
    }

    async fn list(&self, path: &CachePath, suffix: &str) -> Result<Vec<CacheRecord>, Error> {
        let tree = self.tree(path.root())?;

        let iter = if path.bucket_name().is_empty() {
            tree.iter()
        } else {
            tree.scan_prefix(Self::scan_prefix(path, suffix)?)
        };

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item?;
            let key = String::from_utf8_lossy(&key).into_owned();
            records.push(CacheRecord {
                path: format!("{}/{}", path.root(), key),
                data: value.to_vec(),
            });
        }
        Ok(records)
    }

    async fn cleanup(&self, root: &str) -> Result<(), Error> {
        let tree = self.tree(root)?;

        let mut batch = sled::Batch::default();
        let mut removed = 0usize;
        for item in tree.iter() {
            let (key, value) = item?;
            let Ok(probe) = serde_json::from_slice::<ExpiryProbe>(&value) else {
                continue;
            };
            if probe.is_expired() {
                batch.remove(key);
                removed += 1;
            }
        }
        if removed > 0 {
            tree.apply_batch(batch)?;
            tree.flush_async().await?;
            tracing::debug!(root, removed, "dropped expired cache entries");
        }
        Ok(())
    }
}
