//! mirage server entry point.
//!
//! Long-running deployment: sled-backed cache, in-process render worker
//! pool, sitemap semaphore, and the expiry sweeper behind an axum router.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mirage_client::ChromiumRenderer;
use mirage_core::cache::sweeper;
use mirage_core::{AppConfig, CacheBackend, KvCache};
use mirage_server::cli::Cli;
use mirage_server::{AppState, routes};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_with_file(cli.config.as_deref())?;
    cli.apply(&mut config);

    let default_filter = cli.default_log_filter(&config);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .json()
        .init();

    tracing::info!(
        addr = %config.app.addr,
        cache_path = %config.cache.path.display(),
        cache_minutes = config.cache.duration_minutes,
        queue_capacity = config.queue.capacity,
        queue_workers = config.queue.workers,
        semaphore_capacity = config.semaphore.capacity,
        "configuration loaded"
    );

    let cache: Arc<dyn CacheBackend> =
        Arc::new(KvCache::open(&config.cache.path).context("opening cache store")?);
    let renderer = Arc::new(ChromiumRenderer::new());

    if config.cache.enabled {
        tokio::spawn(sweeper::run(cache.clone(), config.sweep_interval()));
    }

    let addr = config.app.addr.clone();
    let tls = config.app.tls;
    let tls_cert = config.app.tls_cert.clone();
    let tls_key = config.app.tls_key.clone();

    let state = AppState::new(config, cache, renderer);
    let app = routes::router(state);

    tracing::info!(addr = %addr, tls, "starting server");
    if tls {
        let (cert, key) = (
            tls_cert.context("app.tls_cert is required with tls")?,
            tls_key.context("app.tls_key is required with tls")?,
        );
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
            .await
            .context("loading TLS material")?;

        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown_signal().await;
                handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
            }
        });

        axum_server::bind_rustls(addr.parse().context("parsing app.addr")?, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("installing Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
