//! HTTP surface and render orchestration for mirage.
//!
//! The long-running server wires the sled cache, the render worker pool,
//! the sitemap semaphore, and the sweeper behind an axum router. The
//! serverless split reuses the same composite operations from the
//! `mirage-worker` binary against the object store.

pub mod cli;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ops;
pub mod pool;
pub mod routes;
pub mod state;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ApiError;
pub use pool::RenderPool;
pub use state::AppState;
