// src/services/chrome.rs

//! Headless Chromium page renderer.
//!
//! Every call launches its own browser process with a throwaway profile
//! directory and tears it down afterwards, so concurrent renders never share
//! cookies, cache or a profile lock.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;

use crate::models::{Config, RendererConfig};
use crate::services::renderer::{PageRenderer, RenderFailure};

/// Delay between checks for the readiness landmark.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound for each teardown step (close, kill, exit wait).
const TEARDOWN_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// How a browser process was shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Teardown {
    /// Closed on request and exited
    Closed,
    /// Killed after a close or exit wait failed
    Killed,
    /// Still unresponsive after a kill; left to the OS
    Abandoned,
}

/// Shutdown operations of a launched browser.
#[async_trait]
pub(crate) trait BrowserProcess: Send {
    async fn request_close(&mut self) -> std::result::Result<(), String>;
    async fn force_kill(&mut self) -> std::result::Result<(), String>;
    async fn wait_exit(&mut self) -> std::result::Result<(), String>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> std::result::Result<(), String> {
        self.close().await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn force_kill(&mut self) -> std::result::Result<(), String> {
        match self.kill().await {
            Some(result) => result.map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }

    async fn wait_exit(&mut self) -> std::result::Result<(), String> {
        self.wait().await.map(|_| ()).map_err(|e| e.to_string())
    }
}

async fn kill_bounded<P: BrowserProcess + ?Sized>(process: &mut P, url: &str, limit: Duration) -> Teardown {
    match tokio::time::timeout(limit, process.force_kill()).await {
        Ok(Ok(())) => Teardown::Killed,
        Ok(Err(e)) => {
            log::warn!("Browser kill failed for {url}: {e}");
            Teardown::Abandoned
        }
        Err(_) => {
            log::warn!("Browser kill for {url} timed out after {}s", limit.as_secs());
            Teardown::Abandoned
        }
    }
}

/// Shut a browser down with every step bounded by `limit`.
///
/// A failed or stalled close falls back to a kill; a stalled exit wait after
/// a clean close also gets killed.
pub(crate) async fn teardown<P: BrowserProcess + ?Sized>(
    process: &mut P,
    url: &str,
    limit: Duration,
) -> Teardown {
    let outcome = match tokio::time::timeout(limit, process.request_close()).await {
        Ok(Ok(())) => Teardown::Closed,
        Ok(Err(e)) => {
            log::debug!("Browser close failed for {url}: {e}");
            kill_bounded(process, url, limit).await
        }
        Err(_) => {
            log::debug!("Browser close for {url} timed out after {}s", limit.as_secs());
            kill_bounded(process, url, limit).await
        }
    };
    if outcome == Teardown::Abandoned {
        return outcome;
    }

    match tokio::time::timeout(limit, process.wait_exit()).await {
        Ok(Ok(())) => outcome,
        Ok(Err(e)) => {
            log::debug!("Browser exit wait failed for {url}: {e}");
            outcome
        }
        Err(_) if outcome == Teardown::Closed => {
            log::debug!("Browser for {url} did not exit after close");
            kill_bounded(process, url, limit).await
        }
        Err(_) => {
            log::warn!("Browser for {url} did not exit after kill");
            Teardown::Abandoned
        }
    }
}

/// Renders pages in a fresh headless Chromium per call.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    browser: RendererConfig,
    ready_selector: String,
    timeout: Duration,
}

impl ChromeRenderer {
    /// Create a renderer from the browser, selector and timeout settings.
    pub fn new(config: &Config) -> Self {
        Self {
            browser: config.browser.clone(),
            ready_selector: config.selectors.ready.clone(),
            timeout: Duration::from_secs(config.harvest.render_timeout_secs),
        }
    }

    fn launch_config(&self, profile_dir: &Path) -> std::result::Result<BrowserConfig, String> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .window_size(self.browser.window_width, self.browser.window_height)
            .args(self.browser.args.iter().map(String::as_str));

        if self.browser.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !self.browser.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.browser.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build()
    }

    /// Navigate, wait for the landmark, then read the markup.
    async fn load(browser: &Browser, url: &str, ready: &str) -> std::result::Result<String, CdpError> {
        let page = browser.new_page(url).await?;
        while page.find_element(ready).await.is_err() {
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        page.content().await
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> std::result::Result<String, RenderFailure> {
        log::debug!("Rendering {url}");

        let profile = tempfile::Builder::new()
            .prefix("harvester-profile-")
            .tempdir()
            .map_err(|e| RenderFailure::browser(url, e))?;
        let launch = self
            .launch_config(profile.path())
            .map_err(|e| RenderFailure::browser(url, e))?;

        let (mut browser, mut handler) = Browser::launch(launch)
            .await
            .map_err(|e| RenderFailure::browser(url, e))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let outcome =
            tokio::time::timeout(self.timeout, Self::load(&browser, url, &self.ready_selector))
                .await;

        let shutdown = teardown(&mut browser, url, TEARDOWN_STEP_TIMEOUT).await;
        log::debug!("Browser for {url} shut down: {shutdown:?}");
        handler_task.abort();

        match outcome {
            Ok(Ok(html)) => {
                log::debug!("Rendered {url} ({} bytes)", html.len());
                Ok(html)
            }
            Ok(Err(e)) => Err(RenderFailure::browser(url, e)),
            Err(_) => Err(RenderFailure::timeout(url, self.timeout)),
        }
    }
}
