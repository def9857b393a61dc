//! Scripted browser session for driving the orchestrator without Chromium.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;
use reviewtap::scrapers::{BrowserSession, CaptureHandle, CapturedResponse, PageControl};

/// What the next capture wait yields.
pub enum Capture {
    Body(String),
    Timeout,
    Error(String),
    /// Never resolves; only cancellation gets past it.
    Hang,
    Panic,
}

/// Shared call log, readable after the session has been consumed.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub events: Vec<String>,
    /// Time of each scroll, measured from session creation.
    pub scroll_times: Vec<Duration>,
    /// CSV data rows on disk when a capture or page turn was requested.
    pub rows_on_disk: Vec<(&'static str, usize)>,
}

impl SessionLog {
    pub fn count(&self, prefix: &str) -> usize {
        self.events.iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub struct ScriptedSession {
    pub log: Arc<Mutex<SessionLog>>,
    captures: VecDeque<Capture>,
    /// How many lookups find an enabled next-page control.
    controls_available: u32,
    /// Activations that fail before one succeeds.
    failing_activations: u32,
    render_ok: bool,
    render_delay: Duration,
    fail_close: bool,
    armed: Option<CaptureHandle>,
    output: Option<PathBuf>,
    started: Instant,
}

impl ScriptedSession {
    pub fn new(captures: Vec<Capture>) -> Self {
        Self {
            log: Arc::new(Mutex::new(SessionLog::default())),
            captures: captures.into(),
            controls_available: u32::MAX,
            failing_activations: 0,
            render_ok: true,
            render_delay: Duration::ZERO,
            fail_close: false,
            armed: None,
            output: None,
            started: Instant::now(),
        }
    }

    pub fn with_controls(mut self, available: u32) -> Self {
        self.controls_available = available;
        self
    }

    pub fn with_failing_activations(mut self, count: u32) -> Self {
        self.failing_activations = count;
        self
    }

    pub fn with_render_failure(mut self) -> Self {
        self.render_ok = false;
        self
    }

    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    /// Record how many rows `path` holds at each capture and page turn.
    pub fn watching_output(mut self, path: &Path) -> Self {
        self.output = Some(path.to_path_buf());
        self
    }

    pub fn with_close_failure(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<SessionLog>> {
        self.log.clone()
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().events.push(event);
    }
}

fn record_rows(log: &Mutex<SessionLog>, output: Option<&Path>, at: &'static str) {
    if let Some(path) = output {
        let rows = read_rows(path).len().saturating_sub(1);
        log.lock().unwrap().rows_on_disk.push((at, rows));
    }
}

pub struct ScriptedControl {
    log: Arc<Mutex<SessionLog>>,
    fail: bool,
    output: Option<PathBuf>,
}

#[async_trait]
impl PageControl for ScriptedControl {
    async fn activate(&self) -> Result<()> {
        self.log.lock().unwrap().events.push("activate".to_string());
        record_rows(&self.log, self.output.as_deref(), "activate");
        if self.fail {
            anyhow::bail!("element is detached from the DOM");
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    type Control = ScriptedControl;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.record(format!("navigate:{}", url));
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.record("scroll".to_string());
        let elapsed = self.started.elapsed();
        self.log.lock().unwrap().scroll_times.push(elapsed);
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> Result<bool> {
        self.record(format!("wait:{}", selector));
        if !self.render_delay.is_zero() {
            tokio::time::sleep(self.render_delay).await;
        }
        Ok(self.render_ok)
    }

    async fn arm_interception(&mut self, url_pattern: &str) -> Result<CaptureHandle> {
        self.record(format!("arm:{}", url_pattern));
        let handle = CaptureHandle::new(url_pattern);
        self.armed = Some(handle.clone());
        Ok(handle)
    }

    async fn await_next_response(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<CapturedResponse>> {
        self.record("capture".to_string());
        record_rows(&self.log, self.output.as_deref(), "capture");
        let handle = self
            .armed
            .clone()
            .ok_or_else(|| anyhow::anyhow!("interception not armed"))?;
        match self.captures.pop_front() {
            Some(Capture::Body(body)) => Ok(Some(CapturedResponse {
                url: format!("https://api.m.jd.com/?{}", handle.pattern()),
                status: 200,
                body,
            })),
            Some(Capture::Timeout) | None => Ok(None),
            Some(Capture::Error(message)) => Err(anyhow::anyhow!(message)),
            Some(Capture::Hang) => {
                std::future::pending::<Result<Option<CapturedResponse>>>().await
            }
            Some(Capture::Panic) => panic!("capture backend crashed"),
        }
    }

    async fn find_control(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<Option<ScriptedControl>> {
        self.record(format!("find:{}", selector));
        if self.controls_available == 0 {
            return Ok(None);
        }
        self.controls_available -= 1;
        let fail = self.failing_activations > 0;
        if fail {
            self.failing_activations -= 1;
        }
        Ok(Some(ScriptedControl {
            log: self.log.clone(),
            fail,
            output: self.output.clone(),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.record("close".to_string());
        if self.fail_close {
            anyhow::bail!("browser process did not exit");
        }
        Ok(())
    }
}

/// API body with `count` comments, authors tagged with the page number.
pub fn page_body(page: u32, count: usize) -> String {
    let comments: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "nickname": format!("user-{}-{}", page, i),
                "location": "北京",
                "creationTime": "2024-05-01 10:00:00",
                "productColor": "blue",
                "content": format!("  comment {} on page {}  ", i, page),
                "score": 4
            })
        })
        .collect();
    serde_json::json!({ "comments": comments, "maxPage": 100 }).to_string()
}

/// CSV rows (header included), with the BOM stripped.
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let bytes = std::fs::read(path).unwrap();
    let content = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(content)
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect()
}
