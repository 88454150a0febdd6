//! `/admin` handlers: cache metadata listings.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use mirage_core::cache::{CachePath, JOB_PREFIX, PAGE_PREFIX};
use mirage_core::{JobEntryInfo, PageEntryInfo, PageKey};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// GET /admin/renders?domain= — page-cache metadata, optionally for one
/// host.
pub async fn list_renders(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Json<Value>, ApiError> {
    let path = match params.domain.filter(|d| !d.is_empty()) {
        Some(domain) => PageKey::derive(&domain)?.host_path(),
        None => CachePath::bucket(PAGE_PREFIX, ""),
    };

    let records = state.cache.list(&path, "").await?;
    let caches = PageEntryInfo::from_records(&records)?;
    Ok(Json(json!({ "caches": caches })))
}

/// GET /admin/jobs?category= — job envelope metadata.
pub async fn list_jobs(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Json<Value>, ApiError> {
    let path = match params.category.filter(|c| !c.is_empty()) {
        Some(category) => CachePath::bucket(JOB_PREFIX, &category),
        None => CachePath::bucket(JOB_PREFIX, ""),
    };

    let records = state.cache.list(&path, "").await?;
    let jobs = JobEntryInfo::from_records(&records)?;
    Ok(Json(json!({ "jobs": jobs })))
}
