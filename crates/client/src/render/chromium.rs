//! chromiumoxide-backed renderer.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventFrameNavigated, EventLifecycleEvent, FrameId, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventExceptionThrown;
use chromiumoxide::page::Page;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{IdleSignal, RenderError, RenderOptions, Renderer};

const NETWORK_IDLE_EVENT: &str = "networkIdle";
const INTERACTIVE_TIME_EVENT: &str = "InteractiveTime";

/// Headless Chrome/Chromium renderer.
///
/// Launches a fresh browser per render and tears it down afterwards; the
/// CDP event handler runs on a background task that is aborted with the
/// browser.
#[derive(Debug, Default)]
pub struct ChromiumRenderer;

impl ChromiumRenderer {
    pub fn new() -> Self {
        Self
    }

    async fn launch(opts: &RenderOptions) -> Result<(Browser, JoinHandle<()>), RenderError> {
        let mut config = BrowserConfig::builder()
            .window_size(opts.window_width, opts.window_height)
            .arg("--disable-dev-shm-usage")
            .arg(format!("--blink-settings=imagesEnabled={}", opts.image_load));

        if !opts.headless {
            config = config.with_head();
        }
        if opts.container {
            config = config
                .no_sandbox()
                .arg("--disable-setuid-sandbox")
                .arg("--single-process")
                .arg("--no-zygote");
        }

        let config = config.build().map_err(RenderError::BrowserLaunch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        Ok((browser, handle))
    }

    async fn render_on_page(page: &Page, url: &str, opts: &RenderOptions) -> Result<String, RenderError> {
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        if !opts.user_agent.is_empty() {
            page.execute(SetUserAgentOverrideParams::new(opts.user_agent.clone()))
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
        }

        let frames = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;
        let lifecycles = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;
        let exceptions = page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        let wait = async {
            let response = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            if let Some(error_text) = &response.error_text {
                return Err(RenderError::Navigation(format!("{url}: {error_text}")));
            }

            wait_for_idle(frames, lifecycles, exceptions, opts.idle_type, opts.skip_frames).await
        };

        tokio::time::timeout(opts.timeout, wait)
            .await
            .map_err(|_| RenderError::Timeout(opts.timeout.as_secs()))??;

        page.content()
            .await
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &str, opts: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let start = std::time::Instant::now();
        let (mut browser, handle) = Self::launch(opts).await?;

        let result = async {
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            let html = Self::render_on_page(&page, url, opts).await?;
            page.close().await.ok();
            Ok(html)
        }
        .await;

        browser.close().await.ok();
        browser.wait().await.ok();
        handle.abort();

        tracing::debug!(url, elapsed_ms = start.elapsed().as_millis() as u64, "render finished");

        result.map(String::into_bytes)
    }
}

/// Wait until the configured quiescence signal fires.
///
/// The navigation frame id is the one carried by the first frame-navigated
/// event. `network-idle` completes once a matching lifecycle event for that
/// frame has been seen `skip_frames + 1` times; `interactive-time`
/// completes on the first such event regardless of frame. Page JS
/// exceptions are logged and never abort the wait.
async fn wait_for_idle(
    mut frames: impl Stream<Item = Arc<EventFrameNavigated>> + Unpin,
    mut lifecycles: impl Stream<Item = Arc<EventLifecycleEvent>> + Unpin,
    mut exceptions: impl Stream<Item = Arc<EventExceptionThrown>> + Unpin,
    idle: IdleSignal,
    skip_frames: usize,
) -> Result<(), RenderError> {
    let mut navigation_frame: Option<FrameId> = None;
    let mut idle_count = 0usize;

    loop {
        tokio::select! {
            event = frames.next() => {
                let Some(event) = event else {
                    return Err(RenderError::BrowserClosed);
                };
                if navigation_frame.is_none() {
                    tracing::debug!(frame = ?event.frame.id, "navigation frame recorded");
                    navigation_frame = Some(event.frame.id.clone());
                }
            }
            event = lifecycles.next() => {
                let Some(event) = event else {
                    return Err(RenderError::BrowserClosed);
                };
                match idle {
                    IdleSignal::NetworkIdle => {
                        if event.name == NETWORK_IDLE_EVENT
                            && navigation_frame.as_ref() == Some(&event.frame_id)
                        {
                            if idle_count < skip_frames {
                                idle_count += 1;
                            } else {
                                return Ok(());
                            }
                        }
                    }
                    IdleSignal::InteractiveTime => {
                        if event.name == INTERACTIVE_TIME_EVENT {
                            return Ok(());
                        }
                    }
                }
            }
            event = exceptions.next() => {
                let Some(event) = event else {
                    return Err(RenderError::BrowserClosed);
                };
                tracing::warn!(
                    error = %event.exception_details.text,
                    "page runtime exception"
                );
            }
        }
    }
}
