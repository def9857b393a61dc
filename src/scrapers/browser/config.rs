//! Browser engine configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default user agent presented to the target site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch the run or if headless detection is an issue.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable. Auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, attaches to an existing browser instead of launching one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Inject automation-masking scripts into every document.
    #[serde(default = "default_stealth")]
    pub stealth: bool,

    /// Launch / connect / navigation timeout in seconds.
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            remote_url: None,
            chrome_args: Vec::new(),
            user_agent: default_user_agent(),
            stealth: default_stealth(),
            launch_timeout_secs: default_launch_timeout(),
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_stealth() -> bool {
    true
}

fn default_launch_timeout() -> u64 {
    30
}
