//! Shared application state.
//!
//! One explicit record wired at startup; no global configuration
//! singleton. Handlers receive it through the axum state extractor.

use std::sync::Arc;
use tokio::sync::Semaphore;

use mirage_client::{RenderOptions, Renderer};
use mirage_core::{AppConfig, CacheBackend};

use crate::pool::RenderPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<dyn CacheBackend>,
    pub pool: RenderPool,
    /// Gate on concurrent sitemap jobs. Admission is try-acquire; a full
    /// semaphore maps to 429.
    pub sitemap_jobs: Arc<Semaphore>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, cache: Arc<dyn CacheBackend>, renderer: Arc<dyn Renderer>) -> Self {
        let options = RenderOptions::from(&config.renderer);
        let pool = RenderPool::start(renderer, options, config.queue.capacity, config.queue.workers);
        let sitemap_jobs = Arc::new(Semaphore::new(config.semaphore.capacity));
        let http = mirage_client::http::build_client(&config.renderer.user_agent, config.render_timeout());

        Self {
            config: Arc::new(config),
            cache,
            pool,
            sitemap_jobs,
            http,
        }
    }
}
