//! mirage gateway entry point.
//!
//! Serverless deployment's HTTP side: renders into the object store and
//! fans sitemaps out to the worker queue. Pairs with `mirage-worker`.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mirage_client::queue::NatsQueue;
use mirage_client::{ChromiumRenderer, RenderOptions};
use mirage_core::{AppConfig, ObjectStore, StoreEnv};
use mirage_server::gateway::{self, GatewayState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let env = StoreEnv::from_env()?;
    let config = AppConfig::load()?;

    tracing::info!(
        addr = %config.app.addr,
        bucket = %env.bucket,
        region = %env.region,
        subject = %env.queue_subject,
        "gateway configuration loaded"
    );

    let mut options = RenderOptions::from(&config.renderer);
    options.container = true;

    let queue = NatsQueue::connect(&env.queue_servers, &env.queue_subject)
        .await
        .context("connecting to worker queue")?;

    let state = GatewayState {
        store: Arc::new(ObjectStore::new(&env)),
        renderer: Arc::new(ChromiumRenderer::new()),
        options,
        queue: Arc::new(queue),
        http: mirage_client::http::build_client(&config.renderer.user_agent, config.render_timeout()),
        job_ttl: env.job_ttl(),
    };

    let addr = config.app.addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, "starting gateway");
    axum::serve(listener, gateway::router(state)).await?;

    Ok(())
}
