//! Chrome DevTools Protocol driver
//!
//! headless_chrome is a blocking client, so every call runs on the blocking
//! pool with a cloned tab handle and the async side just awaits the join.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use quill_core::config::SessionConfig;
use quill_core::{QuillError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::driver::{ElementQuery, ElementRef, ElementSnapshot, PageDriver};
use crate::scripts;
use crate::session::SessionLauncher;

/// Largest edge Chrome will rasterise in one capture
const MAX_CAPTURE_EDGE: f64 = 16_384.0;

/// Scrollable extent of the document
#[derive(Debug, Clone, Copy, Deserialize)]
struct PageSize {
    width: f64,
    height: f64,
}

/// Clip covering the whole document, from the top-left corner
fn full_page_clip(size: PageSize) -> Page::Viewport {
    Page::Viewport {
        x: 0.0,
        y: 0.0,
        width: size.width.clamp(1.0, MAX_CAPTURE_EDGE),
        height: size.height.clamp(1.0, MAX_CAPTURE_EDGE),
        scale: 1.0,
    }
}

fn browser_err(context: &str, e: impl std::fmt::Display) -> QuillError {
    QuillError::Browser(format!("{}: {}", context, e))
}

async fn blocking<T, F>(context: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| browser_err(context, e))?
        .map_err(|e| browser_err(context, e))
}

/// Launches a local Chrome/Chromium per session
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Page = ChromePage;

    async fn launch(&self, config: &SessionConfig) -> Result<ChromePage> {
        ChromePage::launch(config.clone()).await
    }
}

/// One browser process and its single tab
pub struct ChromePage {
    /// Kept alive for the tab's lifetime; dropping it kills the process
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
    config: SessionConfig,
}

impl ChromePage {
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, window: {:?})",
            config.headless,
            config.window_size()
        );

        let launch_config = config.clone();
        let (browser, tab) = blocking("Failed to launch browser", move || {
            let args: Vec<&OsStr> = launch_config.launch_args.iter().map(OsStr::new).collect();
            let options = LaunchOptions::default_builder()
                .headless(launch_config.headless)
                .window_size(launch_config.window_size())
                .args(args)
                .build()?;
            let browser = Browser::new(options)?;
            let tab = browser.new_tab()?;
            Ok((browser, tab))
        })
        .await?;

        info!("Browser launched successfully");
        Ok(Self {
            browser,
            tab,
            config,
        })
    }

    /// Evaluate one of the [`scripts`] and decode its `value`
    async fn run_script<T>(&self, context: &'static str, script: String) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        let raw = blocking(context, move || {
            let remote = tab.evaluate(&script, false)?;
            Ok(remote.value)
        })
        .await?;

        let text = raw
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| browser_err(context, "script returned no value"))?;
        let mut reply: serde_json::Value = serde_json::from_str(text)?;

        if let Some(error) = reply.get("error").and_then(|e| e.as_str()) {
            return Err(QuillError::not_found(format!("{} ({})", context, error)));
        }
        let value = reply
            .get_mut("value")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn prepare(&self) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let config = self.config.clone();
        blocking("Failed to prepare page", move || {
            tab.set_default_timeout(config.default_timeout());
            if let Some(ua) = config.user_agent.as_deref() {
                let language = config.extra_headers.get("Accept-Language").map(String::as_str);
                tab.set_user_agent(ua, language, None)?;
            }
            if !config.extra_headers.is_empty() {
                let headers: HashMap<&str, &str> = config
                    .extra_headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                tab.set_extra_http_headers(headers)?;
            }
            Ok(())
        })
        .await?;
        debug!("Page prepared");
        Ok(())
    }

    async fn navigate(&self, url: &str, timeout: Option<Duration>) -> Result<()> {
        debug!("Navigating to {}", url);
        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        let navigation_timeout = timeout.unwrap_or_else(|| self.config.navigation_timeout());
        let default_timeout = self.config.default_timeout();

        tokio::task::spawn_blocking(move || {
            tab.set_default_timeout(navigation_timeout);
            let outcome = tab
                .navigate_to(&target)
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ());
            tab.set_default_timeout(default_timeout);
            outcome
        })
        .await
        .map_err(|e| browser_err("Navigation task failed", e))?
        .map_err(|e| QuillError::NavigationFailure(format!("{}: {}", url, e)))?;

        info!("Navigated to {}", url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        blocking("Failed to read URL", move || Ok(tab.get_url())).await
    }

    async fn ready_state(&self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        let value = blocking("Failed to read ready state", move || {
            Ok(tab.evaluate(scripts::READY_STATE, false)?.value)
        })
        .await?;
        Ok(value
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn inspect(&self, query: &ElementQuery) -> Result<Vec<ElementSnapshot>> {
        self.run_script("Element query failed", scripts::inspect(query))
            .await
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        let _: bool = self
            .run_script("Click failed", scripts::click(element))
            .await?;
        Ok(())
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<()> {
        let _: bool = self
            .run_script("Focus failed", scripts::focus(element))
            .await?;
        let tab = Arc::clone(&self.tab);
        let text = text.to_string();
        blocking("Typing failed", move || {
            tab.type_str(&text)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        let _: bool = self
            .run_script("Clear failed", scripts::clear(element))
            .await?;
        Ok(())
    }

    async fn insert_text(&self, element: &ElementRef, text: &str) -> Result<()> {
        let native: bool = self
            .run_script("Insert failed", scripts::insert(element, text))
            .await?;
        if !native {
            debug!("insertText unavailable, value was set directly");
        }
        Ok(())
    }

    async fn read_text(&self, element: &ElementRef) -> Result<String> {
        self.run_script("Read failed", scripts::read(element)).await
    }

    async fn scroll_to(&self, x: i64, y: i64) -> Result<()> {
        let _: bool = self
            .run_script("Scroll failed", scripts::scroll(x, y))
            .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let size: PageSize = self
            .run_script("Failed to measure page", scripts::page_size())
            .await?;
        debug!("Capturing {}x{} page", size.width, size.height);

        let tab = Arc::clone(&self.tab);
        let data = blocking("CDP capture failed", move || {
            let capture = tab.call_method(Page::CaptureScreenshot {
                format: Some(CaptureScreenshotFormatOption::Png),
                quality: None,
                clip: Some(full_page_clip(size)),
                from_surface: Some(true),
                capture_beyond_viewport: Some(true),
                optimize_for_speed: None,
            })?;
            Ok(capture.data)
        })
        .await?;

        STANDARD
            .decode(data)
            .map_err(|e| browser_err("Screenshot data was not base64", e))
    }

    async fn close(&self) -> Result<()> {
        info!("Closing browser session");
        let tab = Arc::clone(&self.tab);
        blocking("Failed to close tab", move || {
            tab.close(true)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_covers_the_whole_document() {
        let clip = full_page_clip(PageSize {
            width: 1280.0,
            height: 5400.0,
        });
        assert_eq!((clip.x, clip.y), (0.0, 0.0));
        assert_eq!((clip.width, clip.height), (1280.0, 5400.0));
        assert_eq!(clip.scale, 1.0);
    }

    #[test]
    fn test_clip_is_bounded() {
        let clip = full_page_clip(PageSize {
            width: 0.0,
            height: 90_000.0,
        });
        assert_eq!(clip.width, 1.0);
        assert_eq!(clip.height, MAX_CAPTURE_EDGE);
    }

    #[test]
    fn test_page_size_reply_shape() {
        let size: PageSize = serde_json::from_value(serde_json::json!({ "width": 800, "height": 2400 })).unwrap();
        assert_eq!(size.height, 2400.0);
    }
}
