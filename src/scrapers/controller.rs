//! Pagination state machine.
//!
//! One page cycle is `Loading → AwaitingCapture → Parsing → Persisting →
//! AdvancingPage`, repeated until a terminal state. Records for page N are
//! synced to the sink before page N+1 is requested, so whatever the run ends
//! on, the output holds exactly the pages that completed.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::browser::{BrowserSession, CapturedResponse, PageControl};
use super::pacing::Pacing;
use super::parse::{decode_body, parse};
use crate::config::TargetConfig;
use crate::error::ScrapeError;
use crate::models::CommentRecord;
use crate::storage::CsvSink;

/// Run position. Only the controller mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// 1-based.
    pub current_page: u32,
    pub max_pages: u32,
    /// Cleared after the one-time warm-up pause.
    pub is_first_page: bool,
}

impl PageCursor {
    pub fn new(max_pages: u32) -> Self {
        Self {
            current_page: 1,
            max_pages,
            is_first_page: true,
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.current_page >= self.max_pages
    }
}

/// Why a run ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// A captured page held no comments.
    EmptyPage,
    /// No enabled next-page control.
    LastPage,
    /// The page budget was used up.
    BudgetReached,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustReason::EmptyPage => write!(f, "no comments parsed from page"),
            ExhaustReason::LastPage => write!(f, "last page reached"),
            ExhaustReason::BudgetReached => write!(f, "page budget reached"),
        }
    }
}

/// Outcome of one page-turn attempt.
#[derive(Debug)]
pub enum PageTurn {
    Advance,
    Exhausted(ExhaustReason),
    Failed(ScrapeError),
}

/// Terminal state of a run.
#[derive(Debug)]
pub enum Termination {
    Exhausted(ExhaustReason),
    Failed(ScrapeError),
}

impl Termination {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Termination::Exhausted(_))
    }

    pub fn error(&self) -> Option<&ScrapeError> {
        match self {
            Termination::Failed(err) => Some(err),
            Termination::Exhausted(_) => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exhausted(reason) => write!(f, "exhausted ({})", reason),
            Termination::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

#[derive(Debug)]
pub enum PageState {
    Idle,
    Loading,
    AwaitingCapture,
    Parsing(CapturedResponse),
    Persisting(Vec<CommentRecord>),
    AdvancingPage,
    Exhausted(ExhaustReason),
    Failed(ScrapeError),
}

impl PageState {
    fn name(&self) -> &'static str {
        match self {
            PageState::Idle => "idle",
            PageState::Loading => "loading",
            PageState::AwaitingCapture => "awaiting-capture",
            PageState::Parsing(_) => "parsing",
            PageState::Persisting(_) => "persisting",
            PageState::AdvancingPage => "advancing",
            PageState::Exhausted(_) => "exhausted",
            PageState::Failed(_) => "failed",
        }
    }
}

/// Drives the per-page cycle against a browser session and a sink.
pub struct PaginationController<'a, S: BrowserSession> {
    session: &'a mut S,
    sink: &'a mut CsvSink,
    target: &'a TargetConfig,
    pacing: &'a Pacing,
    cancel: CancellationToken,
    cursor: PageCursor,
    pages_processed: u32,
}

impl<'a, S: BrowserSession> PaginationController<'a, S> {
    pub fn new(
        session: &'a mut S,
        sink: &'a mut CsvSink,
        target: &'a TargetConfig,
        pacing: &'a Pacing,
        cancel: CancellationToken,
        cursor: PageCursor,
    ) -> Self {
        Self {
            session,
            sink,
            target,
            pacing,
            cancel,
            cursor,
            pages_processed: 0,
        }
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Pages whose records reached the sink.
    pub fn pages_processed(&self) -> u32 {
        self.pages_processed
    }

    /// Step from `Idle` until `Exhausted` or `Failed`.
    pub async fn run(&mut self) -> Termination {
        let mut state = PageState::Idle;
        loop {
            state = match state {
                PageState::Exhausted(reason) => return Termination::Exhausted(reason),
                PageState::Failed(err) => return Termination::Failed(err),
                state if self.cancel.is_cancelled() => {
                    debug!("Cancelled while {}", state.name());
                    PageState::Failed(ScrapeError::Cancelled)
                }
                state => {
                    let from = state.name();
                    let next = self.step(state).await;
                    debug!("Page {}: {} -> {}", self.cursor.current_page, from, next.name());
                    next
                }
            };
        }
    }

    async fn step(&mut self, state: PageState) -> PageState {
        match state {
            PageState::Idle => {
                if self.cursor.current_page > self.cursor.max_pages {
                    PageState::Exhausted(ExhaustReason::BudgetReached)
                } else {
                    PageState::Loading
                }
            }
            PageState::Loading => self.load().await,
            PageState::AwaitingCapture => self.await_capture().await,
            PageState::Parsing(response) => self.parse_response(response),
            PageState::Persisting(records) => self.persist(records),
            PageState::AdvancingPage => match self.advance().await {
                PageTurn::Advance => PageState::Loading,
                PageTurn::Exhausted(reason) => PageState::Exhausted(reason),
                PageTurn::Failed(err) => PageState::Failed(err),
            },
            terminal => terminal,
        }
    }

    async fn load(&mut self) -> PageState {
        info!(
            "Fetching page {}/{}...",
            self.cursor.current_page, self.cursor.max_pages
        );

        if self.cursor.is_first_page {
            debug!("Warm-up pause of {:?} before first scroll", self.pacing.warmup);
            if let Err(err) = self.pause(self.pacing.warmup).await {
                return PageState::Failed(err);
            }
            self.cursor.is_first_page = false;
        }

        if let Err(err) = self.session.scroll_to_bottom().await {
            return PageState::Failed(ScrapeError::browser(err));
        }
        match self.pause(self.pacing.scroll_settle).await {
            Ok(()) => PageState::AwaitingCapture,
            Err(err) => PageState::Failed(err),
        }
    }

    async fn await_capture(&mut self) -> PageState {
        let timeout = self.pacing.capture_timeout;
        let cancel = self.cancel.clone();
        let captured = tokio::select! {
            _ = cancel.cancelled() => return PageState::Failed(ScrapeError::Cancelled),
            captured = self.session.await_next_response(timeout) => captured,
        };

        match captured {
            Ok(Some(response)) => {
                if response.status >= 400 {
                    warn!("API responded with status {} ({})", response.status, response.url);
                }
                PageState::Parsing(response)
            }
            Ok(None) => {
                warn!("No API response captured; the interface may have changed");
                PageState::Failed(ScrapeError::CaptureTimeout { waited: timeout })
            }
            Err(err) => PageState::Failed(ScrapeError::browser(err)),
        }
    }

    fn parse_response(&self, response: CapturedResponse) -> PageState {
        match decode_body(&response.body).and_then(|document| parse(&document)) {
            Ok(records) => PageState::Persisting(records),
            Err(err) => {
                warn!("Received a non-JSON or malformed response; page structure may have changed");
                PageState::Failed(err)
            }
        }
    }

    fn persist(&mut self, records: Vec<CommentRecord>) -> PageState {
        if records.is_empty() {
            info!("No comments parsed from page {}", self.cursor.current_page);
            return PageState::Exhausted(ExhaustReason::EmptyPage);
        }

        match self.sink.append(&records) {
            Ok(count) => {
                self.pages_processed += 1;
                info!("Saved {} comments from page {}", count, self.cursor.current_page);
                PageState::AdvancingPage
            }
            Err(err) => PageState::Failed(err),
        }
    }

    /// Turn to the next page, retrying failed clicks up to the configured limit.
    async fn advance(&mut self) -> PageTurn {
        if self.cursor.budget_exhausted() {
            info!("Page budget of {} reached", self.cursor.max_pages);
            return PageTurn::Exhausted(ExhaustReason::BudgetReached);
        }

        let attempts = self.pacing.pagination_retries + 1;
        let mut attempt = 1;
        let cancel = self.cancel.clone();
        loop {
            let turned = tokio::select! {
                _ = cancel.cancelled() => return PageTurn::Failed(ScrapeError::Cancelled),
                turned = self.turn_page() => turned,
            };
            match turned {
                Ok(true) => break,
                Ok(false) => {
                    info!("Reached the last page");
                    return PageTurn::Exhausted(ExhaustReason::LastPage);
                }
                Err(err) if attempt < attempts => {
                    warn!(
                        "Page turn failed (attempt {}/{}): {:#}",
                        attempt, attempts, err
                    );
                    attempt += 1;
                    if let Err(err) = self.pause(self.pacing.jitter.sample()).await {
                        return PageTurn::Failed(err);
                    }
                }
                Err(err) => {
                    warn!("Page turn failed: {:#}", err);
                    return PageTurn::Failed(ScrapeError::pagination(err));
                }
            }
        }

        if let Err(err) = self.pause(self.pacing.jitter.sample()).await {
            return PageTurn::Failed(err);
        }
        self.cursor.current_page += 1;
        info!("Moved to page {}", self.cursor.current_page);
        PageTurn::Advance
    }

    /// Click "next" and wait for comments to render. `Ok(false)` when there
    /// is no enabled control.
    async fn turn_page(&mut self) -> anyhow::Result<bool> {
        let selector = &self.target.next_page_selector;
        let control = match self
            .session
            .find_control(selector, self.pacing.control_timeout)
            .await?
        {
            Some(control) => control,
            None => return Ok(false),
        };

        control.activate().await?;

        let rendered = self
            .session
            .wait_for_selector(&self.target.item_selector, self.pacing.render_timeout)
            .await?;
        if !rendered {
            anyhow::bail!(
                "comments ({}) did not render within {:?}",
                self.target.item_selector,
                self.pacing.render_timeout
            );
        }
        Ok(true)
    }

    /// Sleep unless the run is cancelled first.
    async fn pause(&self, duration: Duration) -> Result<(), ScrapeError> {
        if duration.is_zero() {
            return if self.cancel.is_cancelled() {
                Err(ScrapeError::Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ScrapeError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
