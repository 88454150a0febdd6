//! mirage worker entry point.
//!
//! Serverless deployment: consumes the render queue, keeps job state in
//! object-store markers, and writes raw rendered pages to the store.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mirage_client::queue::NatsQueue;
use mirage_client::{ChromiumRenderer, RenderOptions};
use mirage_core::{AppConfig, ObjectStore, StoreEnv};
use mirage_server::worker::{self, WorkerContext};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let env = StoreEnv::from_env()?;
    let config = AppConfig::load()?;

    tracing::info!(
        bucket = %env.bucket,
        region = %env.region,
        subject = %env.queue_subject,
        "worker configuration loaded"
    );

    // Workers always run containerized; the sandbox flags are not optional
    // there.
    let mut options = RenderOptions::from(&config.renderer);
    options.container = true;

    let ctx = WorkerContext {
        store: Arc::new(ObjectStore::new(&env)),
        renderer: Arc::new(ChromiumRenderer::new()),
        options,
    };

    let queue = NatsQueue::connect(&env.queue_servers, &env.queue_subject)
        .await
        .context("connecting to worker queue")?;

    worker::run(&ctx, &queue).await?;
    Ok(())
}
