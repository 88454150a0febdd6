//! Route table and middleware wiring.

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, put};
use axum::Router;

use crate::handlers;
use crate::middleware::{log_errors, require_admin_key, require_api_key};
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/render",
            get(handlers::render::render_page).delete(handlers::render::delete_cache),
        )
        .route("/render/sitemap", put(handlers::sitemap::submit_sitemap))
        .route("/render/sitemap/{job_id}/status", get(handlers::sitemap::job_status))
        .layer(from_fn_with_state(state.clone(), require_api_key));

    let admin = Router::new()
        .route("/admin/renders", get(handlers::admin::list_renders))
        .route("/admin/jobs", get(handlers::admin::list_jobs))
        .layer(from_fn_with_state(state.clone(), require_admin_key));

    Router::new()
        .merge(api)
        .merge(admin)
        .layer(from_fn(log_errors))
        .with_state(state)
}
