//! Client code for mirage.
//!
//! This crate provides the headless browser driver, sitemap fetching and
//! parsing, and the worker-queue client shared by the server and the
//! serverless worker.

pub mod http;
pub mod queue;
pub mod render;
pub mod sitemap;

pub use queue::{JobQueue, NatsQueue, QueueError, QueueMessage};
pub use render::{ChromiumRenderer, IdleSignal, RenderError, RenderOptions, Renderer};
pub use sitemap::{SitemapError, fetch_entries, parse_entries};
