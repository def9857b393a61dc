//! Run orchestration: sink setup, interception, navigation, the pagination
//! loop, and unconditional browser release.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::browser::{BrowserSession, CaptureHandle};
use super::controller::{PageCursor, PaginationController, Termination};
use super::pacing::Pacing;
use crate::config::TargetConfig;
use crate::error::ScrapeError;
use crate::models::HeaderStyle;
use crate::storage::CsvSink;

/// Summary of one run.
#[derive(Debug)]
pub struct RunReport {
    pub target_id: String,
    pub output_path: PathBuf,
    pub pages_processed: u32,
    pub records_written: u64,
    pub termination: Termination,
    /// Whether the browser session closed cleanly.
    pub browser_released: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.termination.is_exhausted()
    }
}

#[derive(Debug, Default)]
struct Progress {
    pages_processed: u32,
    records_written: u64,
}

/// Owns a browser session for exactly one run.
///
/// A run is a single pass: it re-initializes the output file and is never
/// retried internally.
pub struct Orchestrator<S: BrowserSession> {
    session: S,
    target: TargetConfig,
    pacing: Pacing,
    header: HeaderStyle,
    cancel: CancellationToken,
}

impl<S: BrowserSession> Orchestrator<S> {
    pub fn new(session: S, target: TargetConfig, pacing: Pacing) -> Self {
        Self {
            session,
            target,
            pacing,
            header: HeaderStyle::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_header(mut self, header: HeaderStyle) -> Self {
        self.header = header;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run at its next suspension point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Scrape `target_id` into `output_path`, fetching at most `page_budget`
    /// pages. The browser session is closed on every exit path, including
    /// panics, which are resumed after cleanup.
    pub async fn run(
        mut self,
        target_id: &str,
        output_path: impl AsRef<Path>,
        page_budget: u32,
    ) -> RunReport {
        let output_path = output_path.as_ref().to_path_buf();
        let started_at = Utc::now();
        let mut progress = Progress::default();

        let outcome = AssertUnwindSafe(self.run_body(
            target_id,
            &output_path,
            page_budget,
            &mut progress,
        ))
        .catch_unwind()
        .await;

        let browser_released = match self.session.close().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to close browser: {:#}", e);
                false
            }
        };
        if browser_released {
            info!("Scrape finished, browser closed");
        } else {
            warn!("Scrape finished, browser may still be running");
        }

        let termination = match outcome {
            Ok(termination) => termination,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        match &termination {
            Termination::Exhausted(reason) => info!("Run for {} ended: {}", target_id, reason),
            Termination::Failed(err) => warn!("Run for {} failed: {}", target_id, err),
        }

        RunReport {
            target_id: target_id.to_string(),
            output_path,
            pages_processed: progress.pages_processed,
            records_written: progress.records_written,
            termination,
            browser_released,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn run_body(
        &mut self,
        target_id: &str,
        output_path: &Path,
        page_budget: u32,
        progress: &mut Progress,
    ) -> Termination {
        let (mut sink, capture) = match self.prepare(target_id, output_path).await {
            Ok(prepared) => prepared,
            Err(err) => return Termination::Failed(err),
        };

        let mut controller = PaginationController::new(
            &mut self.session,
            &mut sink,
            &self.target,
            &self.pacing,
            self.cancel.clone(),
            PageCursor::new(page_budget),
        );
        let termination = controller.run().await;
        progress.pages_processed = controller.pages_processed();
        progress.records_written = sink.rows_written();

        debug!("Releasing capture for {}", capture.pattern());
        termination
    }

    /// Create the sink, arm interception, and open the comment view.
    async fn prepare(
        &mut self,
        target_id: &str,
        output_path: &Path,
    ) -> Result<(CsvSink, CaptureHandle), ScrapeError> {
        let page_url = self
            .target
            .page_url(target_id)
            .map_err(ScrapeError::browser)?;
        let sink = CsvSink::initialize(output_path, self.header)?;

        let capture = self
            .session
            .arm_interception(&self.target.api_pattern)
            .await
            .map_err(ScrapeError::browser)?;

        self.session
            .navigate(page_url.as_str())
            .await
            .map_err(ScrapeError::browser)?;
        info!("Started scraping comments for {}", target_id);

        Ok((sink, capture))
    }
}
