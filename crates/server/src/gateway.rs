//! HTTP adapters for the serverless deployment.
//!
//! Same route shapes as the long-running server, but backed by the object
//! store: rendered pages land in the store as raw HTML and the response
//! carries the cache path instead of the body (the store is the direct
//! surface for consumers). Sitemaps fan out to the worker queue instead of
//! the in-process pool. API keys are checked by the fronting edge, not
//! here.

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{StatusCode, header};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use mirage_client::queue::JobQueue;
use mirage_client::{RenderOptions, Renderer, sitemap};
use mirage_core::jobs::is_job_key;
use mirage_core::{CacheBackend, PageKey};

use crate::error::ApiError;
use crate::handlers::render::RenderParams;
use crate::handlers::sitemap::SitemapRequest;
use crate::middleware::log_errors;
use crate::ops;
use crate::ops::status::StatusResponse;

#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<dyn CacheBackend>,
    pub renderer: Arc<dyn Renderer>,
    pub options: RenderOptions,
    pub queue: Arc<dyn JobQueue>,
    pub http: reqwest::Client,
    pub job_ttl: Duration,
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/render", get(render_url).delete(delete_cache))
        .route("/render/sitemap", put(submit_sitemap))
        .route("/render/sitemap/{job_id}/status", get(job_status))
        .layer(from_fn(log_errors))
        .with_state(state)
}

/// Response of a gateway render: where the page landed in the store.
#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub host: String,
    pub path: String,
}

/// GET /render?url= — ensure the page is rendered into the store and
/// return its cache path.
async fn render_url(State(state): State<GatewayState>, Query(params): Query<RenderParams>) -> Result<Response, ApiError> {
    let url = params
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing url parameter"))?;
    tracing::info!(url = %url, "gateway render request");

    let key = PageKey::derive(&url)?;
    let path = ops::render::render_url(
        state.store.as_ref(),
        state.renderer.as_ref(),
        &state.options,
        &url,
        true,
    )
    .await?;

    Ok(Json(RenderResponse { host: key.host_key().to_string(), path }).into_response())
}

/// DELETE /render?url= or ?domain=
async fn delete_cache(State(state): State<GatewayState>, Query(params): Query<RenderParams>) -> Result<Response, ApiError> {
    let domain = params.domain.filter(|d| !d.is_empty());
    let url = params.url.filter(|u| !u.is_empty());

    match (domain, url) {
        (Some(domain), _) => {
            tracing::info!(domain = %domain, "gateway delete cached domain");
            ops::render::delete_domain_cache(state.store.as_ref(), &domain).await?;
        }
        (None, Some(url)) => {
            tracing::info!(url = %url, "gateway delete cached url");
            ops::render::delete_url_cache(state.store.as_ref(), &url).await?;
        }
        (None, None) => {
            return Err(ApiError::bad_request("one of url or domain parameter is required"));
        }
    }

    Ok(Json(json!({ "message": "cache cleared" })).into_response())
}

/// PUT /render/sitemap — fan the entries out to the worker queue.
async fn submit_sitemap(
    State(state): State<GatewayState>,
    Json(request): Json<SitemapRequest>,
) -> Result<Response, ApiError> {
    sitemap::validate_sitemap_url(&request.sitemap_url)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let entries = sitemap::fetch_entries(&state.http, &request.sitemap_url)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let job_key = ops::sitemap::fan_out(state.store.as_ref(), state.queue.as_ref(), &entries).await?;
    tracing::info!(job_key = %job_key, sitemap = %request.sitemap_url, entries = entries.len(), "sitemap fanned out");

    let location = format!("/render/sitemap/{job_key}/status");
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, location.clone())],
        Json(json!({ "message": "sitemap rendering accepted", "location": location })),
    )
        .into_response())
}

/// GET /render/sitemap/{jobId}/status — marker-based status.
async fn job_status(
    State(state): State<GatewayState>,
    AxumPath(job_id): AxumPath<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    if !is_job_key(&job_id) {
        return Err(ApiError::not_found("job not found"));
    }

    let response = ops::status::check_status_store(state.store.as_ref(), &job_id, state.job_ttl).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingRenderer, RecordingQueue, SelectiveRenderer, StaticRenderer};
    use crate::worker::{self, WorkerContext};

    use axum::body::Body;
    use axum::http::Request;
    use mirage_client::queue::QueueMessage;
    use mirage_core::KvCache;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn gateway_state(renderer: Arc<dyn Renderer>) -> GatewayState {
        gateway_state_with_queue(renderer).0
    }

    fn gateway_state_with_queue(renderer: Arc<dyn Renderer>) -> (GatewayState, Arc<RecordingQueue>) {
        let queue = Arc::new(RecordingQueue::default());
        let state = GatewayState {
            store: Arc::new(KvCache::temporary().unwrap()),
            renderer,
            options: RenderOptions::default(),
            queue: queue.clone(),
            http: reqwest::Client::new(),
            job_ttl: Duration::from_secs(3600),
        };
        (state, queue)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_render_returns_cache_path() {
        let state = gateway_state(Arc::new(StaticRenderer::new("<html>gw</html>")));
        let app = router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/render?url=http://example.test/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let key = PageKey::derive("http://example.test/").unwrap();
        assert_eq!(body["host"], "example.test");
        assert_eq!(body["path"], key.path().as_str());

        // The store carries the raw body, no envelope.
        assert_eq!(state.store.read(&key.path()).await.unwrap(), b"<html>gw</html>");
    }

    #[tokio::test]
    async fn test_render_is_memoized() {
        let state = gateway_state(Arc::new(StaticRenderer::new("<html>gw</html>")));
        let app = router(state.clone());

        let request = || {
            Request::builder()
                .uri("/render?url=http://example.test/")
                .body(Body::empty())
                .unwrap()
        };
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);

        // Second hit must not render again.
        let broken = GatewayState { renderer: Arc::new(FailingRenderer), ..state };
        let response = router(broken).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_requires_parameter() {
        let app = router(gateway_state(Arc::new(StaticRenderer::new("x"))));
        let response = app
            .oneshot(Request::builder().method("DELETE").uri("/render").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    async fn serve_sitemap(xml: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/sitemap.xml", get(move || async move { xml }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/sitemap.xml")
    }

    const SITEMAP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>http://pages.test/u1</loc></url>
            <url><loc>http://pages.test/u2</loc></url>
        </urlset>"#;

    async fn submit(app: &Router, sitemap_url: &str) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/render/sitemap")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"sitemapUrl": sitemap_url}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        location
            .strip_prefix("/render/sitemap/")
            .and_then(|rest| rest.strip_suffix("/status"))
            .unwrap()
            .to_string()
    }

    async fn status_of(app: &Router, job_key: &str) -> Value {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/render/sitemap/{job_key}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    /// Drain the recorded queue through the worker, as the queue consumer
    /// would.
    async fn drain_queue(state: &GatewayState, queue: &RecordingQueue, renderer: Arc<dyn Renderer>) {
        let ctx = WorkerContext {
            store: state.store.clone(),
            renderer,
            options: RenderOptions::default(),
        };

        let published: Vec<QueueMessage> = queue
            .published
            .lock()
            .await
            .iter()
            .map(|(id, payload)| QueueMessage { id: id.clone(), payload: payload.clone() })
            .collect();
        for message in published {
            let _ = worker::handle_message(&ctx, &message).await;
        }
    }

    #[tokio::test]
    async fn test_fan_out_then_worker_completes_job() {
        let sitemap_url = serve_sitemap(SITEMAP_XML).await;
        let (state, queue) = gateway_state_with_queue(Arc::new(StaticRenderer::new("<html>entry</html>")));
        let app = router(state.clone());

        let job_key = submit(&app, &sitemap_url).await;

        // Before any worker runs the job reports processing.
        let status = status_of(&app, &job_key).await;
        assert_eq!(status["status"], "processing");

        drain_queue(&state, &queue, Arc::new(StaticRenderer::new("<html>entry</html>"))).await;

        let status = status_of(&app, &job_key).await;
        assert_eq!(status["status"], "completed");

        for url in ["http://pages.test/u1", "http://pages.test/u2"] {
            let path = PageKey::derive(url).unwrap().path();
            assert_eq!(state.store.read(&path).await.unwrap(), b"<html>entry</html>");
        }
    }

    #[tokio::test]
    async fn test_fan_out_partial_failure_reports_details() {
        let sitemap_url = serve_sitemap(SITEMAP_XML).await;
        let (state, queue) = gateway_state_with_queue(Arc::new(StaticRenderer::new("x")));
        let app = router(state.clone());

        let job_key = submit(&app, &sitemap_url).await;
        drain_queue(&state, &queue, Arc::new(SelectiveRenderer::new("<html>entry</html>", "/u2"))).await;

        let status = status_of(&app, &job_key).await;
        assert_eq!(status["status"], "failed");
        assert_eq!(status["details"], json!(["http://pages.test/u2"]));

        let u1 = PageKey::derive("http://pages.test/u1").unwrap().path();
        assert!(state.store.exists(&u1).await.unwrap());
        let u2 = PageKey::derive("http://pages.test/u2").unwrap().path();
        assert!(!state.store.exists(&u2).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_unknown_job_is_404() {
        let app = router(gateway_state(Arc::new(StaticRenderer::new("x"))));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/render/sitemap/AbCdEf-GhIjKl/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
