//! Headless browser rendering.
//!
//! The [`Renderer`] trait is the seam the worker pool and the serverless
//! worker render through; [`ChromiumRenderer`] is the chromiumoxide
//! implementation. Every render gets a fresh browser so no state leaks
//! between pages.

mod chromium;

use std::time::Duration;
use thiserror::Error;

use mirage_core::config::{IdleType, RendererSection};

pub use chromium::ChromiumRenderer;

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to the browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to navigate to the URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Failed to read the rendered document.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// The quiescence signal never arrived within the timeout.
    #[error("render timeout after {0}s")]
    Timeout(u64),

    /// Browser closed unexpectedly.
    #[error("browser closed unexpectedly")]
    BrowserClosed,
}

/// The concrete lifecycle signal a render waits for.
///
/// The `auto` configuration value resolves to [`IdleSignal::NetworkIdle`]
/// here, so the driver only ever deals with the two real signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleSignal {
    NetworkIdle,
    InteractiveTime,
}

impl From<IdleType> for IdleSignal {
    fn from(idle: IdleType) -> Self {
        match idle {
            IdleType::Auto | IdleType::NetworkIdle => IdleSignal::NetworkIdle,
            IdleType::InteractiveTime => IdleSignal::InteractiveTime,
        }
    }
}

/// Options for rendering a page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub window_width: u32,
    pub window_height: u32,
    pub headless: bool,
    /// User-Agent override; empty keeps the browser default.
    pub user_agent: String,
    /// Per-render timeout.
    pub timeout: Duration,
    pub idle_type: IdleSignal,
    /// Load images while rendering.
    pub image_load: bool,
    /// Forces the sandbox-off flag set for containerized environments.
    pub container: bool,
    /// Extra network-idle cycles to wait through before completing.
    pub skip_frames: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            window_width: 1920,
            window_height: 1080,
            headless: true,
            user_agent: String::new(),
            timeout: Duration::from_secs(30),
            idle_type: IdleSignal::NetworkIdle,
            image_load: false,
            container: false,
            skip_frames: 0,
        }
    }
}

impl From<&RendererSection> for RenderOptions {
    fn from(section: &RendererSection) -> Self {
        Self {
            window_width: section.window_width,
            window_height: section.window_height,
            headless: section.headless,
            user_agent: section.user_agent.clone(),
            timeout: Duration::from_secs(section.timeout),
            idle_type: section.idle_type.into(),
            image_load: section.image_load,
            container: section.container,
            skip_frames: section.skip_frames,
        }
    }
}

/// Renderer seam for headless browser page rendering.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Render `url` and return the serialized DOM.
    async fn render(&self, url: &str, opts: &RenderOptions) -> Result<Vec<u8>, RenderError>;
}
