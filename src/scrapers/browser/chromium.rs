//! Chromium implementation of [`BrowserSession`] over CDP.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::capture::CaptureListener;
use super::config::BrowserEngineConfig;
use super::stealth::STEALTH_SCRIPTS;
use super::types::{CaptureHandle, CapturedResponse};
use super::{BrowserSession, PageControl};

/// Interval between element polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SCROLL_TO_BOTTOM_SCRIPT: &str =
    "window.scrollTo(0, Math.max(document.body.scrollHeight, document.documentElement.scrollHeight))";

/// `this` is disabled by attribute, ARIA state, or a `disabled`/`*-disabled` class.
const IS_DISABLED_FN: &str = r#"
    function() {
        if (this.disabled === true) return true;
        if (this.getAttribute('aria-disabled') === 'true') return true;
        const classes = (this.getAttribute('class') || '').split(/\s+/);
        return classes.some(c => c === 'disabled' || c.endsWith('-disabled'));
    }
"#;

const CLICK_FN: &str = "function() { this.click(); }";

/// Chromium browser session. Launches a local browser or attaches to a
/// remote DevTools endpoint, and drives a single page.
pub struct ChromiumSession {
    config: BrowserEngineConfig,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    page: Option<Page>,
    capture: Option<CaptureListener>,
    remote: bool,
}

impl ChromiumSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Start a browser (or attach to `remote_url`) and open a blank page.
    pub async fn launch(config: BrowserEngineConfig) -> Result<Self> {
        let mut session = Self {
            config,
            browser: None,
            handler: None,
            page: None,
            capture: None,
            remote: false,
        };

        match session.config.remote_url.clone() {
            Some(remote_url) => session.connect_remote(&remote_url).await?,
            None => session.launch_local().await?,
        }
        session.open_page().await?;
        Ok(session)
    }

    fn find_chrome(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.config.chrome_path {
            if path.exists() {
                return Ok(path.clone());
            }
            anyhow::bail!("Configured chrome_path does not exist: {}", path.display());
        }

        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or set browser.chrome_path:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium"
        ))
    }

    async fn launch_local(&mut self) -> Result<()> {
        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = self.find_chrome()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(self.config.launch_timeout_secs));

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--lang=zh-CN")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let launch_timeout = Duration::from_secs(self.config.launch_timeout_secs);
        let (browser, mut handler) = tokio::time::timeout(launch_timeout, Browser::launch(browser_config))
            .await
            .map_err(|_| anyhow::anyhow!("Browser launch timed out after {:?}", launch_timeout))?
            .context("Failed to launch browser")?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);
        Ok(())
    }

    async fn connect_remote(&mut self, url: &str) -> Result<()> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.launch_timeout_secs
        );

        // Resolve the WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(Duration::from_secs(self.config.launch_timeout_secs))
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        debug!("Connecting to WebSocket: {}", ws_url);
        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.launch_timeout_secs),
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);
        self.remote = true;
        Ok(())
    }

    async fn open_page(&mut self) -> Result<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("browser not initialized"))?;
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        page.execute(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
            .await
            .context("Failed to set user agent")?;

        if self.config.stealth {
            debug!("Registering {} stealth scripts", STEALTH_SCRIPTS.len());
            for script in STEALTH_SCRIPTS {
                page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                    script.to_string(),
                ))
                .await
                .context("Failed to register stealth script")?;
            }
        }

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("browser session is closed"))
    }

    /// Whether `selector` matches anything right now. Evaluation faults
    /// propagate; only a definite "no match" reads as absent.
    async fn is_present(page: &Page, selector: &str) -> Result<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector)?
        );
        let probe = page
            .evaluate(script)
            .await
            .map(|result| result.value().cloned())
            .map_err(anyhow::Error::from);
        control_presence(probe).with_context(|| format!("Failed to look up {}", selector))
    }

    async fn is_visible(page: &Page, selector: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                return rect.width > 0 && rect.height > 0
                    && style.visibility !== 'hidden' && style.display !== 'none';
            }})()"#,
            serde_json::to_string(selector)?
        );
        let result = page.evaluate(script).await?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    type Control = ChromiumControl;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        let page = self.page()?;
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid URL: {}", e))?;

        let nav_timeout = Duration::from_secs(self.config.launch_timeout_secs);
        tokio::time::timeout(nav_timeout, page.execute(nav_params))
            .await
            .map_err(|_| anyhow::anyhow!("Navigation timed out after {:?} for {}", nav_timeout, url))?
            .with_context(|| format!("Navigation failed for {}", url))?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.page()?
            .evaluate(SCROLL_TO_BOTTOM_SCRIPT)
            .await
            .context("Failed to scroll to bottom")?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<bool> {
        let page = self.page()?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if Self::is_visible(page, selector).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("Timeout waiting for {} to render", selector);
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn arm_interception(&mut self, url_pattern: &str) -> Result<CaptureHandle> {
        let handle = CaptureHandle::new(url_pattern);
        let listener = CaptureListener::spawn(self.page()?, handle.clone()).await?;
        info!("Listening for responses matching {}", listener.handle().pattern());
        // Re-arming replaces the previous listener, which aborts on drop
        self.capture = Some(listener);
        Ok(handle)
    }

    async fn await_next_response(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<CapturedResponse>> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("network interception is not armed"))?;
        capture.next(timeout).await
    }

    async fn find_control(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<ChromiumControl>> {
        let page = self.page()?;
        let deadline = tokio::time::Instant::now() + timeout;
        let element = loop {
            if Self::is_present(page, selector).await? {
                break page
                    .find_element(selector)
                    .await
                    .with_context(|| format!("Failed to resolve control {}", selector))?;
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        let disabled = element
            .call_js_fn(IS_DISABLED_FN, false)
            .await
            .context("Failed to inspect control state")?
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if disabled {
            debug!("Control {} is disabled", selector);
            return Ok(None);
        }

        Ok(Some(ChromiumControl {
            selector: selector.to_string(),
            element,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.capture = None;

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page close failed: {}", e);
            }
        }

        let mut result = Ok(());
        if let Some(mut browser) = self.browser.take() {
            if self.remote {
                debug!("Detaching from remote browser");
            } else {
                match browser.close().await {
                    Ok(_) => {
                        if let Err(e) = browser.wait().await {
                            warn!("Browser process did not exit cleanly: {}", e);
                        }
                    }
                    Err(e) => {
                        warn!("Browser close command failed: {}", e);
                        result = Err(anyhow::Error::from(e).context("Failed to close browser"));
                    }
                }
            }
        }

        release_handler(self.handler.take(), result)
    }
}

/// Stop the CDP handler task, whatever the browser close returned.
fn release_handler(handler: Option<JoinHandle<()>>, closed: Result<()>) -> Result<()> {
    if let Some(handler) = handler {
        handler.abort();
    }
    closed
}

/// Interpret a DOM presence check. Anything other than a boolean answer is
/// a lookup fault, never an absent control.
fn control_presence(probe: Result<Option<serde_json::Value>>) -> Result<bool> {
    match probe? {
        Some(serde_json::Value::Bool(present)) => Ok(present),
        other => anyhow::bail!("unexpected presence check result: {:?}", other),
    }
}

/// A located page element, activated by a page-context click.
pub struct ChromiumControl {
    selector: String,
    element: Element,
}

#[async_trait]
impl PageControl for ChromiumControl {
    async fn activate(&self) -> Result<()> {
        self.element
            .call_js_fn(CLICK_FN, false)
            .await
            .with_context(|| format!("Failed to click {}", self.selector))?;
        Ok(())
    }
}
