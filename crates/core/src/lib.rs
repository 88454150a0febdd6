//! Core types and shared functionality for mirage.
//!
//! This crate provides:
//! - Cache key derivation and envelope types
//! - The cache backend abstraction with sled and object-store implementations
//! - Sitemap job state machine data
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod jobs;

pub use cache::{
    CacheBackend, CachePath, CacheRecord, JobEntry, JobEntryInfo, KvCache, ObjectStore, PageEntry, PageEntryInfo,
    PageKey,
};
pub use config::{AppConfig, ConfigError, StoreEnv};
pub use error::Error;
pub use jobs::{JobStatus, QueuePayload};
