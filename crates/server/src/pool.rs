//! Bounded render worker pool.
//!
//! A fixed set of worker tasks consumes one bounded channel of render
//! jobs. Each job carries a oneshot reply; workers never retry, driver
//! errors propagate to the producer as-is.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot};

use mirage_client::{RenderOptions, Renderer};
use mirage_core::Error;

struct RenderJob {
    url: String,
    reply: oneshot::Sender<Result<Vec<u8>, Error>>,
}

/// Handle to the worker pool. Cloning shares the same queue.
#[derive(Clone)]
pub struct RenderPool {
    tx: mpsc::Sender<RenderJob>,
}

impl RenderPool {
    /// Start `workers` tasks consuming a queue of `capacity` slots.
    pub fn start(renderer: Arc<dyn Renderer>, options: RenderOptions, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));

        for id in 0..workers {
            let rx = Arc::clone(&rx);
            let renderer = Arc::clone(&renderer);
            let options = options.clone();
            tokio::spawn(worker_loop(id, rx, renderer, options));
        }

        Self { tx }
    }

    /// Render `url`, failing fast with [`Error::Busy`] when the queue is
    /// full. This is the interactive request path.
    pub async fn render(&self, url: &str) -> Result<Vec<u8>, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = RenderJob { url: url.to_string(), reply: reply_tx };

        self.tx.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => Error::Busy("render queue full".into()),
            mpsc::error::TrySendError::Closed(_) => Error::Internal("render queue closed".into()),
        })?;

        await_reply(reply_rx).await
    }

    /// Render `url`, waiting for a queue slot instead of failing fast.
    /// Sitemap jobs use this so a burst of entries drains through the same
    /// bounded queue rather than being rejected.
    pub async fn render_queued(&self, url: &str) -> Result<Vec<u8>, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = RenderJob { url: url.to_string(), reply: reply_tx };

        self.tx
            .send(job)
            .await
            .map_err(|_| Error::Internal("render queue closed".into()))?;

        await_reply(reply_rx).await
    }
}

async fn await_reply(reply_rx: oneshot::Receiver<Result<Vec<u8>, Error>>) -> Result<Vec<u8>, Error> {
    reply_rx
        .await
        .map_err(|_| Error::Internal("render worker dropped the job".into()))?
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<RenderJob>>>,
    renderer: Arc<dyn Renderer>,
    options: RenderOptions,
) {
    tracing::debug!(id, "render worker started");
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        tracing::debug!(id, url = %job.url, "worker rendering");
        let result = renderer
            .render(&job.url, &options)
            .await
            .map_err(|e| Error::Render(e.to_string()));

        // The producer may have disconnected; the render result still
        // reached this point and the caller-side cache write is theirs.
        let _ = job.reply.send(result);
    }
    tracing::debug!(id, "render worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingRenderer, StaticRenderer};
    use std::time::Duration;

    #[tokio::test]
    async fn test_render_through_pool() {
        let pool = RenderPool::start(
            Arc::new(StaticRenderer::new("<html>ok</html>")),
            RenderOptions::default(),
            3,
            3,
        );
        let content = pool.render("http://example.test/").await.unwrap();
        assert_eq!(content, b"<html>ok</html>");
    }

    #[tokio::test]
    async fn test_driver_errors_propagate() {
        let pool = RenderPool::start(Arc::new(FailingRenderer), RenderOptions::default(), 3, 1);
        let err = pool.render("http://example.test/").await.unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    #[tokio::test]
    async fn test_full_queue_fails_fast() {
        // No workers: the first job occupies the single queue slot forever,
        // the second is rejected immediately.
        let pool = RenderPool::start(
            Arc::new(StaticRenderer::new("unused")),
            RenderOptions::default(),
            1,
            0,
        );

        let first = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.render("http://example.test/a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = pool.render("http://example.test/b").await.unwrap_err();
        assert!(matches!(err, Error::Busy(_)));

        // The queued job never completes without workers.
        let blocked = tokio::time::timeout(Duration::from_millis(50), first).await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn test_render_queued_waits_for_slot() {
        let pool = RenderPool::start(
            Arc::new(StaticRenderer::new("<html>ok</html>")),
            RenderOptions::default(),
            1,
            1,
        );

        let mut handles = Vec::new();
        for i in 0..5 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.render_queued(&format!("http://example.test/{i}")).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }
}
