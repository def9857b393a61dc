//! Browser session capability used by the pagination controller.
//!
//! The controller only needs a handful of primitives: navigate, scroll,
//! wait for rendered elements, capture API responses matching a URL pattern,
//! and find/activate the next-page control. [`BrowserSession`] is that
//! surface; [`ChromiumSession`] implements it over CDP with chromiumoxide.

mod config;
mod types;

#[cfg(feature = "browser")]
mod capture;
#[cfg(feature = "browser")]
mod chromium;
#[cfg(feature = "browser")]
mod stealth;

pub use config::{BrowserEngineConfig, DEFAULT_USER_AGENT};
pub use types::{CaptureHandle, CapturedResponse};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumControl, ChromiumSession};

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// A clickable element on the page, such as the next-page button.
#[async_trait]
pub trait PageControl: Send + Sync {
    async fn activate(&self) -> Result<()>;
}

/// Browser primitives needed to walk a paginated comment view.
#[async_trait]
pub trait BrowserSession: Send {
    type Control: PageControl;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Scroll to the bottom of the page, triggering lazy-loaded content.
    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Wait until an element matching `selector` is visibly rendered.
    /// Returns `false` if the timeout elapses first.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Start surfacing responses whose URL contains `url_pattern`.
    /// Everything else the page loads is ignored.
    async fn arm_interception(&mut self, url_pattern: &str) -> Result<CaptureHandle>;

    /// Next captured response in arrival order, or `None` on timeout.
    async fn await_next_response(&mut self, timeout: Duration)
        -> Result<Option<CapturedResponse>>;

    /// Look up an enabled control. Absent or disabled controls yield `None`.
    async fn find_control(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<Self::Control>>;

    /// Release the browser. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}
