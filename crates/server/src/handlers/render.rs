//! `/render` handlers: cached page rendering and cache deletion.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use mirage_core::cache::compress;
use mirage_core::{Error, PageEntry, PageKey};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RenderParams {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// GET /render?url= — serve from cache or render and memoize.
pub async fn render_page(State(state): State<AppState>, Query(params): Query<RenderParams>) -> Result<Response, ApiError> {
    let url = params
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing url parameter"))?;
    tracing::info!(url = %url, "render request");

    let key = PageKey::derive(&url)?;
    let path = key.path();
    let caching = state.config.cache.enabled;

    if caching {
        match state.cache.read(&path).await {
            Ok(data) => {
                let entry = PageEntry::from_bytes(&data)?;
                if !entry.is_expired() {
                    tracing::debug!(path = %path, "cache hit");
                    let body = compress::decompress(&entry.content)?;
                    return Ok(Html(body).into_response());
                }
                tracing::debug!(path = %path, "cache entry expired");
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(path = %path, "cache miss");
            }
            Err(err) => return Err(err.into()),
        }
    }

    // Render and cache on a detached task: a client disconnect drops this
    // handler future, but the render still completes and populates the
    // cache.
    let render = tokio::spawn({
        let state = state.clone();
        let path = path.clone();
        let url = url.clone();
        async move {
            let content = state.pool.render(&url).await?;
            if content.is_empty() {
                return Err(Error::EmptyRender(url));
            }

            if caching {
                let compressed = compress::compress(&content)?;
                let entry = PageEntry::new(url.as_str(), compressed, state.config.page_ttl());
                state.cache.update(&path, &entry.to_bytes()?).await?;
                tracing::debug!(path = %path, "cache entry written");
            }
            Ok(content)
        }
    });

    let content = render
        .await
        .map_err(|e| Error::Internal(format!("render task failed: {e}")))??;

    Ok(Html(content).into_response())
}

/// DELETE /render?url= or ?domain= — drop a single entry or a whole host
/// bucket.
pub async fn delete_cache(State(state): State<AppState>, Query(params): Query<RenderParams>) -> Result<Response, ApiError> {
    let domain = params.domain.filter(|d| !d.is_empty());
    let url = params.url.filter(|u| !u.is_empty());

    match (domain, url) {
        (Some(domain), _) => {
            tracing::info!(domain = %domain, "delete cached domain");
            let key = PageKey::derive(&domain)?;
            state.cache.delete_prefix(&key.host_path()).await?;
        }
        (None, Some(url)) => {
            tracing::info!(url = %url, "delete cached url");
            let key = PageKey::derive(&url)?;
            state.cache.delete(&key.path()).await?;
        }
        (None, None) => {
            return Err(ApiError::bad_request("one of url or domain parameter is required"));
        }
    }

    Ok(Json(json!({ "message": "cache cleared" })).into_response())
}
