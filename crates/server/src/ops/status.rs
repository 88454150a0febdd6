//! Job status evaluation for both deployments.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use mirage_core::jobs::{JobPaths, JobStatus, QueuePayload, resolve_marker_status};
use mirage_core::{CacheBackend, Error, JobEntry};

/// Body of the status endpoint: `{status, details?}`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// Status from the embedded store's job envelope.
///
/// A missing envelope surfaces as `CacheNotFound` (404 at the boundary).
/// An expired envelope that never reached `completed` reports `timeout`.
pub async fn check_status_kv(cache: &dyn CacheBackend, job_key: &str) -> Result<StatusResponse, Error> {
    let envelope = JobPaths::new(job_key).envelope();
    let job = JobEntry::from_bytes(&cache.read(&envelope).await?)?;

    if job.status != JobStatus::Completed && job.is_expired() {
        return Ok(StatusResponse { status: JobStatus::Timeout, details: None });
    }

    let details = (!job.failed.is_empty()).then(|| job.failed.clone());
    Ok(StatusResponse { status: job.status, details })
}

/// Status from the object store's marker objects.
///
/// The `timestamp` object decides existence and timeout; the marker
/// folders decide the rest. Failure details are the `targetUrl`s of the
/// payloads parked under `failed/`.
pub async fn check_status_store(
    store: &dyn CacheBackend,
    job_key: &str,
    job_ttl: Duration,
) -> Result<StatusResponse, Error> {
    let paths = JobPaths::new(job_key);

    let raw = store.read(&paths.timestamp()).await?;
    let text = String::from_utf8_lossy(&raw);
    let created = DateTime::parse_from_rfc3339(text.trim())
        .map_err(|e| Error::Internal(format!("job {job_key} timestamp: {e}")))?
        .with_timezone(&Utc);

    let age = Utc::now().signed_duration_since(created);
    let ttl = chrono::Duration::from_std(job_ttl).map_err(|e| Error::Internal(e.to_string()))?;
    if age > ttl {
        return Ok(StatusResponse { status: JobStatus::Timeout, details: None });
    }

    let envelope = paths.envelope();
    let queued_empty = store
        .is_empty_prefix(&envelope, &JobStatus::Queued.to_string())
        .await?;
    let processing_empty = store
        .is_empty_prefix(&envelope, &JobStatus::Processing.to_string())
        .await?;
    let failed_empty = store
        .is_empty_prefix(&envelope, &JobStatus::Failed.to_string())
        .await?;

    let status = resolve_marker_status(queued_empty, processing_empty, failed_empty);
    let details = if status == JobStatus::Failed {
        let records = store.list(&envelope, &JobStatus::Failed.to_string()).await?;
        let mut targets = Vec::with_capacity(records.len());
        for record in records {
            let payload: QueuePayload = serde_json::from_slice(&record.data)?;
            targets.push(payload.target_url);
        }
        Some(targets)
    } else {
        None
    };

    Ok(StatusResponse { status, details })
}
