//! Sitemap job state machine data.
//!
//! In the embedded deployment a job is a single envelope under
//! `jobs/sitemap/<jobKey>`. In the serverless deployment job state lives in
//! marker objects: a `timestamp` object plus one marker per queue message
//! under `queued/`, `processing/`, or `failed/`. At most one status folder
//! holds each message id; transitions write the new marker before deleting
//! the old one, so status evaluation must treat a message found in either
//! `queued` or `processing` as in flight.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cache::{CachePath, JOB_PREFIX};

/// Job category for sitemap fan-out.
pub const SITEMAP_CATEGORY: &str = "sitemap";

/// Name of the job creation-time object in the object store.
pub const TIMESTAMP_OBJECT: &str = "timestamp";

const JOB_KEY_PART_LEN: usize = 6;
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Lifecycle state of a sitemap job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Timeout,
    Unknown,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
            JobStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Mint a random job key, `rand6-rand6` drawn from `[A-Za-z]`.
pub fn random_job_key() -> String {
    format!("{}-{}", random_letters(JOB_KEY_PART_LEN), random_letters(JOB_KEY_PART_LEN))
}

fn random_letters(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// True iff `key` has the `[A-Za-z]{6}-[A-Za-z]{6}` shape of a job key.
pub fn is_job_key(key: &str) -> bool {
    let mut parts = key.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => {
            a.len() == JOB_KEY_PART_LEN
                && b.len() == JOB_KEY_PART_LEN
                && a.chars().all(|c| c.is_ascii_alphabetic())
                && b.chars().all(|c| c.is_ascii_alphabetic())
        }
        _ => false,
    }
}

/// Message sent to the worker queue for each sitemap entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePayload {
    pub target_url: String,
    pub random_key: String,
}

/// Path helpers for one sitemap job.
#[derive(Debug, Clone)]
pub struct JobPaths {
    key: String,
}

impl JobPaths {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Envelope path, `jobs/sitemap/<jobKey>`.
    pub fn envelope(&self) -> CachePath {
        CachePath::new(JOB_PREFIX, SITEMAP_CATEGORY, &self.key)
    }

    /// Marker suffix below the envelope path, e.g. `queued/<messageId>`.
    pub fn marker_suffix(status: JobStatus, message_id: &str) -> String {
        format!("{status}/{message_id}")
    }

    /// Full marker path, `jobs/sitemap/<jobKey>/<status>/<messageId>`.
    pub fn marker(&self, status: JobStatus, message_id: &str) -> CachePath {
        self.envelope().join(&Self::marker_suffix(status, message_id))
    }

    /// Path of the creation-time object.
    pub fn timestamp(&self) -> CachePath {
        self.envelope().join(TIMESTAMP_OBJECT)
    }
}

/// Resolve a fan-out job's status from its marker folders.
///
/// A crash between the write-new and delete-old halves of a marker move can
/// leave a message id in two folders at once; any presence in `queued` or
/// `processing` therefore means the job is still in flight. Timeout is
/// decided by the caller from the timestamp object, before consulting
/// markers.
pub fn resolve_marker_status(queued_empty: bool, processing_empty: bool, failed_empty: bool) -> JobStatus {
    if !queued_empty || !processing_empty {
        JobStatus::Processing
    } else if !failed_empty {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    }
}
