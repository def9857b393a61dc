//! Configuration for reviewtap runs.
//!
//! Settings come from an optional TOML file layered under CLI flags. Every
//! value has a default matching the JD.com product comment view, so an empty
//! (or missing) file is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::HeaderStyle;
use crate::scrapers::pacing::{JitterPolicy, Pacing};
use crate::scrapers::BrowserEngineConfig;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "reviewtap.toml";

/// Placeholder substituted with the target id in `page_url_template`.
pub const TARGET_ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
}

/// Where to go and what to listen for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Comment view URL; `{id}` is replaced with the target id.
    #[serde(default = "default_page_url_template")]
    pub page_url_template: String,

    /// Substring identifying the paginated comments API in network traffic.
    #[serde(default = "default_api_pattern")]
    pub api_pattern: String,

    /// CSS selector of the "next page" control.
    #[serde(default = "default_next_page_selector")]
    pub next_page_selector: String,

    /// CSS selector of one rendered comment, awaited after each page turn.
    #[serde(default = "default_item_selector")]
    pub item_selector: String,

    /// Maximum number of pages fetched per run.
    #[serde(default = "default_page_budget")]
    pub page_budget: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            page_url_template: default_page_url_template(),
            api_pattern: default_api_pattern(),
            next_page_selector: default_next_page_selector(),
            item_selector: default_item_selector(),
            page_budget: default_page_budget(),
        }
    }
}

impl TargetConfig {
    /// Build the comment view URL for a target.
    pub fn page_url(&self, target_id: &str) -> anyhow::Result<url::Url> {
        let raw = self
            .page_url_template
            .replace(TARGET_ID_PLACEHOLDER, target_id);
        url::Url::parse(&raw).with_context(|| format!("Invalid target URL: {}", raw))
    }
}

fn default_page_url_template() -> String {
    "https://item.jd.com/{id}.html#comment".to_string()
}

fn default_api_pattern() -> String {
    "api.m.jd.com/?appid=item-v3&functionId=pc_club_productPageComments".to_string()
}

fn default_next_page_selector() -> String {
    ".ui-pager-next".to_string()
}

fn default_item_selector() -> String {
    ".comment-item".to_string()
}

pub fn default_page_budget() -> u32 {
    100
}

/// Timing knobs, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// One-time pause before the first scroll; the comment view is slow to boot.
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    /// Pause after scrolling, before waiting on the capture.
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    /// How long to look for the next-page control.
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,

    /// How long to wait for the next batch of comments to render.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,

    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,

    /// Extra attempts for a failed page turn (0 = fail on first error).
    #[serde(default)]
    pub pagination_retries: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            warmup_ms: default_warmup_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            capture_timeout_ms: default_capture_timeout_ms(),
            control_timeout_ms: default_control_timeout_ms(),
            render_timeout_ms: default_render_timeout_ms(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            pagination_retries: 0,
        }
    }
}

impl PacingConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            warmup: Duration::from_millis(self.warmup_ms),
            scroll_settle: Duration::from_millis(self.scroll_settle_ms),
            capture_timeout: Duration::from_millis(self.capture_timeout_ms),
            control_timeout: Duration::from_millis(self.control_timeout_ms),
            render_timeout: Duration::from_millis(self.render_timeout_ms),
            jitter: JitterPolicy::new(
                Duration::from_millis(self.jitter_min_ms),
                Duration::from_millis(self.jitter_max_ms),
            ),
            pagination_retries: self.pagination_retries,
        }
    }
}

fn default_warmup_ms() -> u64 {
    15_000
}

fn default_scroll_settle_ms() -> u64 {
    1_500
}

fn default_capture_timeout_ms() -> u64 {
    15_000
}

fn default_control_timeout_ms() -> u64 {
    10_000
}

fn default_render_timeout_ms() -> u64 {
    15_000
}

fn default_jitter_min_ms() -> u64 {
    1_000
}

fn default_jitter_max_ms() -> u64 {
    3_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub header: HeaderStyle,

    /// Directory for `<target_id>.csv` when no output path is given.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            header: HeaderStyle::default(),
            dir: default_output_dir(),
        }
    }
}

impl OutputConfig {
    pub fn path_for(&self, target_id: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", target_id))
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/comments")
}

impl Settings {
    /// Load settings from an explicit file, `./reviewtap.toml`, or defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::load_from_path(path)?
            }
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load_from_path(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.target.page_budget == 0 {
            anyhow::bail!("target.page_budget must be at least 1");
        }
        if !self
            .target
            .page_url_template
            .contains(TARGET_ID_PLACEHOLDER)
        {
            anyhow::bail!(
                "target.page_url_template must contain {}",
                TARGET_ID_PLACEHOLDER
            );
        }
        if self.target.api_pattern.trim().is_empty() {
            anyhow::bail!("target.api_pattern must not be empty");
        }
        if self.pacing.jitter_min_ms > self.pacing.jitter_max_ms {
            anyhow::bail!(
                "pacing.jitter_min_ms ({}) exceeds pacing.jitter_max_ms ({})",
                self.pacing.jitter_min_ms,
                self.pacing.jitter_max_ms
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.target.page_budget, 100);
        assert_eq!(settings.target.next_page_selector, ".ui-pager-next");
        assert_eq!(settings.pacing.warmup_ms, 15_000);
        assert_eq!(settings.pacing.pagination_retries, 0);
        assert_eq!(settings.output.header, HeaderStyle::English);
        assert!(settings.browser.headless);
        settings.validate().unwrap();
    }

    #[test]
    fn test_partial_overrides() {
        let settings = Settings::from_toml(
            r#"
            [target]
            page_budget = 5

            [pacing]
            jitter_min_ms = 0
            jitter_max_ms = 0

            [output]
            header = "source"

            [browser]
            headless = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.target.page_budget, 5);
        assert_eq!(settings.target.item_selector, ".comment-item");
        assert_eq!(settings.pacing.pacing().jitter, JitterPolicy::none());
        assert_eq!(settings.output.header, HeaderStyle::Source);
        assert!(!settings.browser.headless);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.target.page_budget = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.pacing.jitter_min_ms = 5_000;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.target.page_url_template = "https://item.jd.com/".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_page_url() {
        let url = TargetConfig::default().page_url("100007961027").unwrap();
        assert_eq!(url.as_str(), "https://item.jd.com/100007961027.html#comment");
        assert_eq!(url.fragment(), Some("comment"));
    }

    #[test]
    fn test_output_path_for_target() {
        let path = OutputConfig::default().path_for("42");
        assert_eq!(path, PathBuf::from("data/comments/42.csv"));
    }

    #[test]
    fn test_toml_round_trip_keeps_defaults() {
        let text = Settings::default().to_toml().unwrap();
        let parsed = Settings::from_toml(&text).unwrap();
        assert_eq!(parsed.target.api_pattern, TargetConfig::default().api_pattern);
        assert_eq!(parsed.pacing.capture_timeout_ms, 15_000);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviewtap.toml");
        fs::write(&path, "[target]\npage_budget = 3\n").unwrap();
        assert_eq!(Settings::load(Some(&path)).unwrap().target.page_budget, 3);
    }
}
