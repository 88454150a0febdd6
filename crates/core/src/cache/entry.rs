//! Typed cache envelopes.
//!
//! Envelopes are self-describing JSON records. A page entry carries the
//! rendered body (gzip-compressed in the embedded store); a job entry
//! carries the sitemap job status and its failed URLs. The sweeper only
//! ever decodes the `{created, expires}` subset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::CacheRecord;
use crate::Error;
use crate::jobs::JobStatus;

/// A cached rendered page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    pub url: String,
    #[serde(with = "content_base64")]
    pub content: Vec<u8>,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl PageEntry {
    /// Build a fresh entry expiring `ttl` from now.
    pub fn new(url: impl Into<String>, content: Vec<u8>, ttl: Duration) -> Self {
        let created = Utc::now();
        Self {
            url: url.into(),
            content,
            created,
            expires: created + ttl,
        }
    }

    /// Substitute the body without touching the timestamps.
    pub fn replace_content(&mut self, content: Vec<u8>) {
        self.content = content;
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// A sitemap job envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    pub status: JobStatus,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    #[serde(default)]
    pub failed: Vec<String>,
}

impl JobEntry {
    pub fn new(status: JobStatus, ttl: Duration) -> Self {
        let created = Utc::now();
        Self {
            status,
            created,
            expires: created + ttl,
            failed: Vec::new(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Page metadata for the admin listing: everything but the body.
#[derive(Debug, Clone, Serialize)]
pub struct PageEntryInfo {
    pub path: String,
    pub url: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl PageEntryInfo {
    /// Decode listed records into page metadata.
    pub fn from_records(records: &[CacheRecord]) -> Result<Vec<Self>, Error> {
        records
            .iter()
            .map(|record| {
                let entry = PageEntry::from_bytes(&record.data)?;
                Ok(Self {
                    path: record.path.clone(),
                    url: entry.url,
                    created: entry.created,
                    expires: entry.expires,
                })
            })
            .collect()
    }
}

/// Job metadata for the admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct JobEntryInfo {
    pub path: String,
    pub status: JobStatus,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl JobEntryInfo {
    pub fn from_records(records: &[CacheRecord]) -> Result<Vec<Self>, Error> {
        records
            .iter()
            .map(|record| {
                let entry = JobEntry::from_bytes(&record.data)?;
                Ok(Self {
                    path: record.path.clone(),
                    status: entry.status,
                    created: entry.created,
                    expires: entry.expires,
                })
            })
            .collect()
    }
}

/// The minimal envelope subset the sweeper decodes.
#[derive(Debug, Deserialize)]
pub(crate) struct ExpiryProbe {
    #[allow(dead_code)]
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl ExpiryProbe {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }
}

/// Bodies are stored base64-encoded inside the JSON envelope so the
/// compressed bytes survive the text format untouched.
mod content_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
