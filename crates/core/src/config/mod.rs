//! Application configuration with layered loading.
//!
//! Configuration is assembled with figment from three sources:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if `MIRAGE_CONFIG_FILE` is set)
//! 3. Environment variables (`MIRAGE_*`, `__` as the section separator)
//!
//! The serverless deployment reads its object-store and queue settings
//! straight from the environment instead; see [`StoreEnv`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration for the long-running server.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (`MIRAGE_*`)
/// 2. TOML config file (if `MIRAGE_CONFIG_FILE` set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub renderer: RendererSection,

    #[serde(default)]
    pub queue: QueueSection,

    #[serde(default)]
    pub semaphore: SemaphoreSection,
}

/// Listener address, API keys, and TLS material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    /// Socket address the server binds to.
    #[serde(default = "default_addr")]
    pub addr: String,

    /// General API key accepted on every route.
    #[serde(default = "default_key")]
    pub key: String,

    /// Admin API key, additionally required for `/admin` routes.
    #[serde(default = "default_admin_key")]
    pub admin_key: String,

    /// Serve TLS using `tls_cert`/`tls_key`.
    #[serde(default)]
    pub tls: bool,

    #[serde(default)]
    pub tls_cert: Option<PathBuf>,

    #[serde(default)]
    pub tls_key: Option<PathBuf>,
}

/// Embedded cache store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Store kind. Only the embedded sled store is recognized here; the
    /// object-store backend is configured through the environment.
    #[serde(default = "default_cache_kind")]
    pub kind: String,

    /// Filesystem path of the embedded store.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Page cache TTL in minutes.
    #[serde(default = "default_sixty")]
    pub duration_minutes: u64,

    /// Interval between expiry sweeps in minutes.
    #[serde(default = "default_sixty")]
    pub cleanup_interval_minutes: u64,
}

/// The lifecycle signal that ends the render wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdleType {
    /// Resolves to `network-idle` at option-build time.
    Auto,
    #[serde(alias = "networkIdle")]
    NetworkIdle,
    #[serde(alias = "InteractiveTime")]
    InteractiveTime,
}

/// Browser driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererSection {
    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// User-Agent override. Empty means the browser default.
    #[serde(default)]
    pub user_agent: String,

    /// Per-render timeout in seconds.
    #[serde(default = "default_render_timeout")]
    pub timeout: u64,

    #[serde(default = "default_idle_type")]
    pub idle_type: IdleType,

    /// Load images while rendering. Off by default; the DOM is the
    /// deliverable, not the pixels.
    #[serde(default)]
    pub image_load: bool,

    /// Running inside a container: forces the sandbox-off flag set.
    #[serde(default)]
    pub container: bool,

    /// Number of extra network-idle cycles to wait through. Site-specific;
    /// pages that lazy-load can emit several idle signals before settling.
    #[serde(default)]
    pub skip_frames: usize,

    /// Log CDP traffic from the browser.
    #[serde(default)]
    pub chromium_debug: bool,
}

/// Render worker pool bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    /// Render queue capacity; a full queue rejects with 429.
    #[serde(default = "default_three")]
    pub capacity: usize,

    /// Number of render worker tasks.
    #[serde(default = "default_three")]
    pub workers: usize,
}

/// Sitemap job admission bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemaphoreSection {
    /// Maximum concurrent sitemap jobs.
    #[serde(default = "default_semaphore_capacity")]
    pub capacity: usize,

    /// Job TTL in minutes; an envelope older than this reports `timeout`.
    #[serde(default = "default_sixty")]
    pub job_timeout_minutes: u64,
}

fn default_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_key() -> String {
    "defaultKey".into()
}

fn default_admin_key() -> String {
    "adminKey".into()
}

fn default_true() -> bool {
    true
}

fn default_cache_kind() -> String {
    "sled".into()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache.db")
}

fn default_sixty() -> u64 {
    60
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_render_timeout() -> u64 {
    30
}

fn default_idle_type() -> IdleType {
    IdleType::Auto
}

fn default_three() -> usize {
    3
}

fn default_semaphore_capacity() -> usize {
    5
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            key: default_key(),
            admin_key: default_admin_key(),
            tls: false,
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: default_cache_kind(),
            path: default_cache_path(),
            duration_minutes: 60,
            cleanup_interval_minutes: 60,
        }
    }
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            headless: true,
            user_agent: String::new(),
            timeout: default_render_timeout(),
            idle_type: IdleType::Auto,
            image_load: false,
            container: false,
            skip_frames: 0,
            chromium_debug: false,
        }
    }
}

impl Default for QueueSection {
    fn default() -> Self {
        Self { capacity: 3, workers: 3 }
    }
}

impl Default for SemaphoreSection {
    fn default() -> Self {
        Self { capacity: default_semaphore_capacity(), job_timeout_minutes: 60 }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, a value cannot be
    /// parsed, or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_file(None)
    }

    /// Like [`AppConfig::load`], with an explicit config file taking
    /// precedence over `MIRAGE_CONFIG_FILE`.
    pub fn load_with_file(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Ok(config_path) = std::env::var("MIRAGE_CONFIG_FILE") {
                    figment = figment.merge(Toml::file(&config_path));
                }
            }
        }

        figment = figment.merge(
            Env::prefixed("MIRAGE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Page cache TTL as a Duration.
    pub fn page_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.duration_minutes * 60)
    }

    /// Sitemap job TTL as a Duration.
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.semaphore.job_timeout_minutes * 60)
    }

    /// Sweep interval as a Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.cleanup_interval_minutes * 60)
    }

    /// Per-render timeout as a Duration.
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.renderer.timeout)
    }
}

/// Object-store and queue settings for the serverless deployment,
/// read directly from the environment.
#[derive(Debug, Clone)]
pub struct StoreEnv {
    pub bucket: String,
    pub region: String,
    /// Endpoint override for S3-compatible stores; empty means AWS.
    pub endpoint: Option<String>,
    pub job_expiration_hours: u64,
    pub queue_servers: String,
    pub queue_subject: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl StoreEnv {
    /// Read the serverless configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for each absent required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bucket: require_env("S3_BUCKET_NAME")?,
            region: require_env("S3_BUCKET_REGION")?,
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            job_expiration_hours: std::env::var("JOB_EXPIRATION_IN_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            queue_servers: require_env("NATS_SERVERS")?,
            queue_subject: std::env::var("WORKER_QUEUE_SUBJECT")
                .unwrap_or_else(|_| "mirage.render".into()),
            access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }

    /// Job TTL as a Duration.
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_expiration_hours * 3600)
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing {
        field: name.into(),
        hint: format!("set the {name} environment variable"),
    })
}
