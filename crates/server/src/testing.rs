//! Test doubles shared by the server unit tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use mirage_client::queue::{JobQueue, QueueError};
use mirage_client::{RenderError, RenderOptions, Renderer};
use mirage_core::{AppConfig, CacheBackend, KvCache};

use crate::state::AppState;

/// Renderer that returns the same body for every URL.
pub struct StaticRenderer {
    body: &'static str,
    pub calls: AtomicUsize,
}

impl StaticRenderer {
    pub fn new(body: &'static str) -> Self {
        Self { body, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn render(&self, _url: &str, _opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.as_bytes().to_vec())
    }
}

/// Renderer that always fails, standing in for a dropped browser.
pub struct FailingRenderer;

#[async_trait]
impl Renderer for FailingRenderer {
    async fn render(&self, url: &str, _opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Navigation(format!("{url}: no browser")))
    }
}

/// Renderer that fails only for URLs containing a marker substring.
pub struct SelectiveRenderer {
    body: &'static str,
    fail_on: &'static str,
}

impl SelectiveRenderer {
    pub fn new(body: &'static str, fail_on: &'static str) -> Self {
        Self { body, fail_on }
    }
}

#[async_trait]
impl Renderer for SelectiveRenderer {
    async fn render(&self, url: &str, _opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        if url.contains(self.fail_on) {
            Err(RenderError::Navigation(format!("{url}: refused")))
        } else {
            Ok(self.body.as_bytes().to_vec())
        }
    }
}

/// Renderer that produces zero bytes.
pub struct EmptyRenderer;

#[async_trait]
impl Renderer for EmptyRenderer {
    async fn render(&self, _url: &str, _opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        Ok(Vec::new())
    }
}

/// In-memory queue capturing published payloads with sequential ids.
#[derive(Default)]
pub struct RecordingQueue {
    pub published: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn publish(&self, payload: &[u8]) -> Result<String, QueueError> {
        let mut published = self.published.lock().await;
        let id = format!("msg-{}", published.len() + 1);
        published.push((id.clone(), payload.to_vec()));
        Ok(id)
    }
}

/// Build an [`AppState`] over a temporary sled store and the given
/// renderer.
pub fn test_state(renderer: Arc<dyn Renderer>) -> AppState {
    let mut config = AppConfig::default();
    config.cache.duration_minutes = 60;
    test_state_with_config(renderer, config)
}

pub fn test_state_with_config(renderer: Arc<dyn Renderer>, config: AppConfig) -> AppState {
    let cache: Arc<dyn CacheBackend> = Arc::new(KvCache::temporary().unwrap());
    AppState::new(config, cache, renderer)
}

/// Same as [`test_state`] but over an existing cache, for warm-cache
/// scenarios.
pub fn test_state_with_cache(renderer: Arc<dyn Renderer>, cache: Arc<dyn CacheBackend>) -> AppState {
    AppState::new(AppConfig::default(), cache, renderer)
}
