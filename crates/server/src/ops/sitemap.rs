//! Sitemap job orchestration.
//!
//! In-process mode renders every entry through the worker pool and keeps
//! the job envelope in the embedded store. Fan-out mode publishes one
//! queue message per entry and leaves the per-message state to marker
//! objects; the worker picks the messages up asynchronously.

use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;

use mirage_client::queue::JobQueue;
use mirage_core::cache::compress;
use mirage_core::jobs::{JobPaths, JobStatus, QueuePayload, random_job_key};
use mirage_core::{CacheBackend, Error, JobEntry, PageEntry, PageKey};

use crate::pool::RenderPool;

/// Run one admitted in-process sitemap job to completion.
///
/// Persists a `processing` envelope first, renders every entry through the
/// pool, collects per-entry failures, then persists the final
/// `completed`/`failed` status. Per-entry failures never abort the job.
pub async fn process_job(
    cache: &Arc<dyn CacheBackend>,
    pool: &RenderPool,
    entries: &[String],
    job_key: &str,
    page_ttl: Duration,
    job_ttl: Duration,
) -> Result<JobStatus, Error> {
    let envelope = JobPaths::new(job_key).envelope();
    let mut job = JobEntry::new(JobStatus::Processing, job_ttl);
    cache.update(&envelope, &job.to_bytes()?).await?;
    tracing::info!(job_key, entries = entries.len(), "sitemap job started");

    for url in entries {
        tracing::debug!(job_key, url = %url, "sitemap entry render start");
        if let Err(err) = render_and_cache(cache, pool, url, page_ttl).await {
            tracing::warn!(job_key, url = %url, error = %err, "sitemap entry failed");
            job.failed.push(url.clone());
            continue;
        }
        tracing::debug!(job_key, url = %url, "sitemap entry render done");
    }

    job.status = if job.failed.is_empty() { JobStatus::Completed } else { JobStatus::Failed };
    cache.update(&envelope, &job.to_bytes()?).await?;
    tracing::info!(job_key, status = %job.status, failed = job.failed.len(), "sitemap job finished");

    Ok(job.status)
}

async fn render_and_cache(
    cache: &Arc<dyn CacheBackend>,
    pool: &RenderPool,
    url: &str,
    page_ttl: Duration,
) -> Result<(), Error> {
    let key = PageKey::derive(url)?;

    let content = pool.render_queued(url).await?;
    if content.is_empty() {
        return Err(Error::EmptyRender(url.to_string()));
    }

    let compressed = compress::compress(&content)?;
    let entry = PageEntry::new(url, compressed, page_ttl);
    cache.update(&key.path(), &entry.to_bytes()?).await
}

/// Fan a sitemap out to the worker queue and return the job key.
///
/// Uploads the job timestamp, then records a `queued` marker per accepted
/// message. Rendering happens asynchronously in the worker; the key is
/// valid for status polling immediately.
pub async fn fan_out(
    store: &dyn CacheBackend,
    queue: &dyn JobQueue,
    entries: &[String],
) -> Result<String, Error> {
    let job_key = random_job_key();
    let paths = JobPaths::new(&job_key);

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    store
        .update_at(&paths.envelope(), mirage_core::jobs::TIMESTAMP_OBJECT, now.as_bytes())
        .await?;

    for url in entries {
        let payload = QueuePayload { target_url: url.clone(), random_key: job_key.clone() };
        let bytes = serde_json::to_vec(&payload)?;

        let message_id = queue
            .publish(&bytes)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        tracing::debug!(job_key = %job_key, url = %url, message_id = %message_id, "sitemap entry queued");

        store
            .update_at(
                &paths.envelope(),
                &JobPaths::marker_suffix(JobStatus::Queued, &message_id),
                &bytes,
            )
            .await?;
    }

    Ok(job_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingQueue, SelectiveRenderer, StaticRenderer};
    use mirage_client::RenderOptions;
    use mirage_core::KvCache;

    fn test_pool(renderer: Arc<dyn mirage_client::Renderer>) -> RenderPool {
        RenderPool::start(renderer, RenderOptions::default(), 3, 3)
    }

    fn temp_cache() -> Arc<dyn CacheBackend> {
        Arc::new(KvCache::temporary().unwrap())
    }

    #[tokio::test]
    async fn test_happy_path_completes() {
        let cache = temp_cache();
        let pool = test_pool(Arc::new(StaticRenderer::new("<html>page</html>")));
        let entries = vec!["http://example.test/a".to_string(), "http://example.test/b".to_string()];

        let status = process_job(
            &cache,
            &pool,
            &entries,
            "AbCdEf-GhIjKl",
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

        assert_eq!(status, JobStatus::Completed);
        for url in &entries {
            let path = PageKey::derive(url).unwrap().path();
            let entry = PageEntry::from_bytes(&cache.read(&path).await.unwrap()).unwrap();
            assert_eq!(compress::decompress(&entry.content).unwrap(), b"<html>page</html>");
        }

        let envelope = JobPaths::new("AbCdEf-GhIjKl").envelope();
        let job = JobEntry::from_bytes(&cache.read(&envelope).await.unwrap()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.failed.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_collects_urls() {
        let cache = temp_cache();
        let pool = test_pool(Arc::new(SelectiveRenderer::new("<html>ok</html>", "/broken")));
        let entries = vec![
            "http://example.test/fine".to_string(),
            "http://example.test/broken".to_string(),
        ];

        let status = process_job(
            &cache,
            &pool,
            &entries,
            "AbCdEf-GhIjKl",
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

        assert_eq!(status, JobStatus::Failed);

        let fine = PageKey::derive("http://example.test/fine").unwrap().path();
        assert!(cache.exists(&fine).await.unwrap());
        let broken = PageKey::derive("http://example.test/broken").unwrap().path();
        assert!(!cache.exists(&broken).await.unwrap());

        let envelope = JobPaths::new("AbCdEf-GhIjKl").envelope();
        let job = JobEntry::from_bytes(&cache.read(&envelope).await.unwrap()).unwrap();
        assert_eq!(job.failed, vec!["http://example.test/broken".to_string()]);
    }

    #[tokio::test]
    async fn test_fan_out_records_markers() {
        let store = KvCache::temporary().unwrap();
        let queue = RecordingQueue::default();
        let entries = vec!["http://example.test/a".to_string(), "http://example.test/b".to_string()];

        let job_key = fan_out(&store, &queue, &entries).await.unwrap();
        assert!(mirage_core::jobs::is_job_key(&job_key));

        let paths = JobPaths::new(&job_key);
        let stamp = store.read(&paths.timestamp()).await.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(std::str::from_utf8(&stamp).unwrap()).is_ok());

        let published = queue.published.lock().await;
        assert_eq!(published.len(), 2);
        for (message_id, bytes) in published.iter() {
            let marker = paths.marker(JobStatus::Queued, message_id);
            assert_eq!(store.read(&marker).await.unwrap(), *bytes);

            let payload: QueuePayload = serde_json::from_slice(bytes).unwrap();
            assert_eq!(payload.random_key, job_key);
            assert!(entries.contains(&payload.target_url));
        }
    }
}
