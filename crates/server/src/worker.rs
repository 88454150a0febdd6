//! Queue-consumer worker for the serverless split.
//!
//! Each message names one sitemap entry. The worker advances the marker
//! state machine around the render: `queued -> processing` before,
//! `processing` deleted on success, `processing -> failed` on error.
//! Marker moves write the new object before deleting the old one, so a
//! crash in between leaves a duplicate the status logic tolerates and the
//! sweeper eventually reconciles.

use futures_util::StreamExt;
use std::sync::Arc;

use mirage_client::queue::{NatsQueue, QueueMessage};
use mirage_client::{RenderOptions, Renderer};
use mirage_core::jobs::{JobPaths, JobStatus, QueuePayload};
use mirage_core::{CacheBackend, Error};

use crate::ops;

pub struct WorkerContext {
    pub store: Arc<dyn CacheBackend>,
    pub renderer: Arc<dyn Renderer>,
    pub options: RenderOptions,
}

/// Consume the worker queue until the subscription ends.
pub async fn run(ctx: &WorkerContext, queue: &NatsQueue) -> Result<(), Error> {
    let mut messages = queue.subscribe().await.map_err(|e| Error::Backend(e.to_string()))?;
    tracing::info!("worker consuming render queue");

    while let Some(message) = messages.next().await {
        if let Err(err) = handle_message(ctx, &message).await {
            // The failure marker is already in place; the queue's own
            // retry or dead-letter policy owns what happens to the
            // message next.
            tracing::error!(message_id = %message.id, error = %err, "render job failed");
        }
    }
    Ok(())
}

/// Process one queue message end to end.
pub async fn handle_message(ctx: &WorkerContext, message: &QueueMessage) -> Result<(), Error> {
    let payload: QueuePayload = serde_json::from_slice(&message.payload)
        .map_err(|e| Error::InvalidInput(format!("queue message {}: {e}", message.id)))?;
    tracing::debug!(
        message_id = %message.id,
        url = %payload.target_url,
        job_key = %payload.random_key,
        "processing render job"
    );

    let paths = JobPaths::new(&payload.random_key);
    move_marker(
        ctx.store.as_ref(),
        &paths,
        JobStatus::Queued,
        JobStatus::Processing,
        &message.id,
        &message.payload,
    )
    .await?;

    match ops::render::render_url(
        ctx.store.as_ref(),
        ctx.renderer.as_ref(),
        &ctx.options,
        &payload.target_url,
        false,
    )
    .await
    {
        Ok(path) => {
            ctx.store
                .delete(&paths.marker(JobStatus::Processing, &message.id))
                .await?;
            tracing::debug!(message_id = %message.id, path = %path, "render job done");
            Ok(())
        }
        Err(err) => {
            move_marker(
                ctx.store.as_ref(),
                &paths,
                JobStatus::Processing,
                JobStatus::Failed,
                &message.id,
                &message.payload,
            )
            .await?;
            Err(err)
        }
    }
}

/// Move a job marker between status folders, write-new then delete-old.
async fn move_marker(
    store: &dyn CacheBackend,
    paths: &JobPaths,
    from: JobStatus,
    to: JobStatus,
    message_id: &str,
    body: &[u8],
) -> Result<(), Error> {
    store
        .update_at(&paths.envelope(), &JobPaths::marker_suffix(to, message_id), body)
        .await?;

    if let Err(err) = store.delete(&paths.marker(from, message_id)).await {
        // The new marker is durable; a stale twin only widens "in flight".
        tracing::warn!(
            message_id,
            from = %from,
            to = %to,
            error = %err,
            "stale job marker left behind"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingRenderer, StaticRenderer};
    use mirage_core::{KvCache, PageKey};

    const JOB_KEY: &str = "AbCdEf-GhIjKl";

    fn message_for(url: &str) -> QueueMessage {
        let payload = QueuePayload { target_url: url.into(), random_key: JOB_KEY.into() };
        QueueMessage { id: "msg-1".into(), payload: serde_json::to_vec(&payload).unwrap() }
    }

    async fn seed_queued_marker(store: &Arc<dyn CacheBackend>, message: &QueueMessage) {
        let paths = JobPaths::new(JOB_KEY);
        store
            .update_at(
                &paths.envelope(),
                &JobPaths::marker_suffix(JobStatus::Queued, &message.id),
                &message.payload,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_success_clears_markers_and_caches_page() {
        let store: Arc<dyn CacheBackend> = Arc::new(KvCache::temporary().unwrap());
        let message = message_for("http://example.test/a");
        seed_queued_marker(&store, &message).await;

        let ctx = WorkerContext {
            store: store.clone(),
            renderer: Arc::new(StaticRenderer::new("<html>worker</html>")),
            options: RenderOptions::default(),
        };
        handle_message(&ctx, &message).await.unwrap();

        let paths = JobPaths::new(JOB_KEY);
        assert!(!store.exists(&paths.marker(JobStatus::Queued, "msg-1")).await.unwrap());
        assert!(!store.exists(&paths.marker(JobStatus::Processing, "msg-1")).await.unwrap());
        assert!(!store.exists(&paths.marker(JobStatus::Failed, "msg-1")).await.unwrap());

        let page = PageKey::derive("http://example.test/a").unwrap().path();
        assert_eq!(store.read(&page).await.unwrap(), b"<html>worker</html>");
    }

    #[tokio::test]
    async fn test_failure_parks_marker_in_failed() {
        let store: Arc<dyn CacheBackend> = Arc::new(KvCache::temporary().unwrap());
        let message = message_for("http://example.test/a");
        seed_queued_marker(&store, &message).await;

        let ctx = WorkerContext {
            store: store.clone(),
            renderer: Arc::new(FailingRenderer),
            options: RenderOptions::default(),
        };
        let err = handle_message(&ctx, &message).await.unwrap_err();
        assert!(matches!(err, Error::Render(_)));

        let paths = JobPaths::new(JOB_KEY);
        assert!(!store.exists(&paths.marker(JobStatus::Queued, "msg-1")).await.unwrap());
        assert!(!store.exists(&paths.marker(JobStatus::Processing, "msg-1")).await.unwrap());

        let failed = store.read(&paths.marker(JobStatus::Failed, "msg-1")).await.unwrap();
        assert_eq!(failed, message.payload);

        let page = PageKey::derive("http://example.test/a").unwrap().path();
        assert!(!store.exists(&page).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_invalid_input() {
        let store: Arc<dyn CacheBackend> = Arc::new(KvCache::temporary().unwrap());
        let ctx = WorkerContext {
            store,
            renderer: Arc::new(StaticRenderer::new("unused")),
            options: RenderOptions::default(),
        };
        let message = QueueMessage { id: "msg-1".into(), payload: b"not json".to_vec() };
        let err = handle_message(&ctx, &message).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
