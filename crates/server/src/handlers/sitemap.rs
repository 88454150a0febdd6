//! `/render/sitemap` handlers: job submission and status polling.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use mirage_client::sitemap;
use mirage_core::Error;
use mirage_core::jobs::{is_job_key, random_job_key};

use crate::error::ApiError;
use crate::ops;
use crate::ops::status::StatusResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapRequest {
    pub sitemap_url: String,
}

/// PUT /render/sitemap — admit a job under the semaphore and run it in the
/// background.
///
/// Returns 202 with the status location immediately; the job itself cannot
/// be cancelled and ends only in a terminal status or TTL timeout.
pub async fn submit_sitemap(
    State(state): State<AppState>,
    Json(request): Json<SitemapRequest>,
) -> Result<Response, ApiError> {
    sitemap::validate_sitemap_url(&request.sitemap_url)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let permit = state
        .sitemap_jobs
        .clone()
        .try_acquire_owned()
        .map_err(|_| Error::Busy("sitemap jobs at capacity".into()))?;

    let job_key = random_job_key();
    tracing::info!(job_key = %job_key, sitemap = %request.sitemap_url, "sitemap job accepted");

    {
        let state = state.clone();
        let job_key = job_key.clone();
        let sitemap_url = request.sitemap_url.clone();
        tokio::spawn(async move {
            // Held for the whole job; dropping it releases the slot.
            let _permit = permit;

            let entries = match sitemap::fetch_entries(&state.http, &sitemap_url).await {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::error!(job_key = %job_key, sitemap = %sitemap_url, error = %err, "sitemap parse failed");
                    return;
                }
            };

            let result = ops::sitemap::process_job(
                &state.cache,
                &state.pool,
                &entries,
                &job_key,
                state.config.page_ttl(),
                state.config.job_ttl(),
            )
            .await;
            if let Err(err) = result {
                tracing::error!(job_key = %job_key, error = %err, "sitemap job aborted");
            }
        });
    }

    let location = format!("/render/sitemap/{job_key}/status");
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, location.clone())],
        Json(json!({ "message": "sitemap rendering accepted", "location": location })),
    )
        .into_response())
}

/// GET /render/sitemap/{jobId}/status
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    if !is_job_key(&job_id) {
        return Err(ApiError::not_found("job not found"));
    }

    let response = ops::status::check_status_kv(state.cache.as_ref(), &job_id).await?;
    Ok(Json(response))
}
