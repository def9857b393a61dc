//! Interception types shared by browser session implementations.

use chrono::{DateTime, Utc};

/// An armed network capture filter. Lives for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandle {
    pattern: String,
    armed_at: DateTime<Utc>,
}

impl CaptureHandle {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            armed_at: Utc::now(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn armed_at(&self) -> DateTime<Utc> {
        self.armed_at
    }

    /// Substring match against a response URL.
    pub fn matches(&self, url: &str) -> bool {
        url.contains(&self.pattern)
    }
}

/// Response captured from the page's network traffic.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub url: String,
    pub status: u16,
    /// Body text, already base64-decoded where the protocol required it.
    pub body: String,
}
