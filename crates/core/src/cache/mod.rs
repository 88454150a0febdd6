//! Two-backend page and job cache.
//!
//! Storage is addressed through [`CachePath`], a plain value of
//! `root/bucket/key` parts, and operated on through the [`CacheBackend`]
//! trait. The orchestration layer depends on nothing but this trait; the
//! sled and object-store backends each map the hierarchy onto their own
//! key space.
//!
//! Layout:
//! - `page/<host[_port]>/<sha256-hex>` — rendered page entries
//! - `jobs/sitemap/<jobKey>` — sitemap job envelope (embedded store)
//! - `jobs/sitemap/<jobKey>/timestamp` and
//!   `jobs/sitemap/<jobKey>/{queued,processing,failed}/<messageId>` —
//!   job markers (object store)

pub mod compress;
pub mod entry;
pub mod key;
pub mod kv;
pub mod object;
pub mod sweeper;

use crate::Error;
use async_trait::async_trait;

pub use entry::{JobEntry, JobEntryInfo, PageEntry, PageEntryInfo};
pub use key::PageKey;
pub use kv::KvCache;
pub use object::ObjectStore;

/// Root prefix for rendered page entries.
pub const PAGE_PREFIX: &str = "page";

/// Root prefix for job state.
pub const JOB_PREFIX: &str = "jobs";

/// Storage address of a cache entry: `root/bucket/key`.
///
/// The key may be empty to address a whole bucket (prefix operations), and
/// may itself contain `/` separators for nested job markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePath {
    root: String,
    bucket: String,
    key: String,
}

impl CachePath {
    pub fn new(root: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { root: root.into(), bucket: bucket.into(), key: key.into() }
    }

    /// Address of every entry under a bucket.
    pub fn bucket(root: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self::new(root, bucket, "")
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The same path with `suffix` appended below the key.
    pub fn join(&self, suffix: &str) -> Self {
        let key = if self.key.is_empty() {
            suffix.to_string()
        } else {
            format!("{}/{}", self.key, suffix)
        };
        Self { root: self.root.clone(), bucket: self.bucket.clone(), key }
    }

    /// Canonical `root/bucket/key` string, omitting empty parts.
    pub fn as_str(&self) -> String {
        [self.root.as_str(), self.bucket.as_str(), self.key.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl std::fmt::Display for CachePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// One listed cache entry: its full path and raw bytes.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub path: String,
    pub data: Vec<u8>,
}

/// The capability set every cache backend provides.
///
/// Semantics shared by both implementations:
/// - `read` reports [`Error::CacheNotFound`] for absent *and* zero-length
///   entries.
/// - `delete` is idempotent.
/// - `delete_prefix` refuses an empty bucket name.
/// - `cleanup` removes only entries whose decoded `expires` is past;
///   records that do not parse as envelopes are skipped.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Write `data` at the entry's canonical path, overwriting. Durable on
    /// return.
    async fn update(&self, path: &CachePath, data: &[u8]) -> Result<(), Error>;

    /// Write `data` at `path/suffix`. Used for job markers and the
    /// timestamp object.
    async fn update_at(&self, path: &CachePath, suffix: &str, data: &[u8]) -> Result<(), Error>;

    /// Read the entry bytes.
    async fn read(&self, path: &CachePath) -> Result<Vec<u8>, Error>;

    /// True iff the entry is present and non-empty.
    async fn exists(&self, path: &CachePath) -> Result<bool, Error>;

    /// Remove a single entry.
    async fn delete(&self, path: &CachePath) -> Result<(), Error>;

    /// Remove every entry under `path`. With an empty key this clears the
    /// whole bucket.
    async fn delete_prefix(&self, path: &CachePath) -> Result<(), Error>;

    /// True iff nothing is stored under `path[/suffix]`.
    async fn is_empty_prefix(&self, path: &CachePath, suffix: &str) -> Result<bool, Error>;

    /// List entries under `path[/suffix]`. With an empty bucket name the
    /// whole root is listed. Order is unspecified.
    async fn list(&self, path: &CachePath, suffix: &str) -> Result<Vec<CacheRecord>, Error>;

    /// Drop every expired envelope under `root`.
    async fn cleanup(&self, root: &str) -> Result<(), Error>;
}
