//! Render-URL composite and cache deletion operations.
//!
//! These are the object-store deployment's building blocks: the page cache
//! is a direct surface to its consumers, so bodies are stored raw and
//! there is no envelope.

use mirage_client::{RenderOptions, Renderer};
use mirage_core::{CacheBackend, Error, PageKey};

/// Render `url` into the store and return the cache path.
///
/// With `existence_check` set, a non-empty object at the cache path short-
/// circuits the render; the worker passes `false` because its call is an
/// explicit refresh.
pub async fn render_url(
    store: &dyn CacheBackend,
    renderer: &dyn Renderer,
    options: &RenderOptions,
    url: &str,
    existence_check: bool,
) -> Result<String, Error> {
    let key = PageKey::derive(url)?;
    let path = key.path();

    if existence_check && store.exists(&path).await? {
        tracing::debug!(url, path = %path, "cache hit, skipping render");
        return Ok(path.as_str());
    }

    let content = renderer
        .render(url, options)
        .await
        .map_err(|e| Error::Render(e.to_string()))?;
    if content.is_empty() {
        return Err(Error::EmptyRender(url.to_string()));
    }

    store.update(&path, &content).await?;
    Ok(path.as_str())
}

/// Drop a single URL from the store, clearing the host prefix once its
/// last entry is gone.
pub async fn delete_url_cache(store: &dyn CacheBackend, url: &str) -> Result<(), Error> {
    let key = PageKey::derive(url)?;
    store.delete(&key.path()).await?;

    if store.is_empty_prefix(&key.host_path(), "").await? {
        store.delete_prefix(&key.host_path()).await?;
    }
    Ok(())
}

/// Drop every cached page of a domain.
pub async fn delete_domain_cache(store: &dyn CacheBackend, domain: &str) -> Result<(), Error> {
    let key = PageKey::derive(domain)?;
    store.delete_prefix(&key.host_path()).await
}
