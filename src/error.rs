//! Scrape error types.

use std::time::Duration;

use thiserror::Error;

/// Flat classification of run-ending faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedShape,
    CaptureTimeout,
    PaginationFailure,
    IOError,
    Browser,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
    #[error(
        "No matching response captured within {waited:?} (target interface may have changed or page produced no new traffic)"
    )]
    CaptureTimeout { waited: Duration },
    #[error("Pagination failed: {0}")]
    PaginationFailure(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Run cancelled")]
    Cancelled,
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::UnexpectedShape(_) => ErrorKind::UnexpectedShape,
            ScrapeError::CaptureTimeout { .. } => ErrorKind::CaptureTimeout,
            ScrapeError::PaginationFailure(_) => ErrorKind::PaginationFailure,
            ScrapeError::Io(_) | ScrapeError::Csv(_) => ErrorKind::IOError,
            ScrapeError::Browser(_) => ErrorKind::Browser,
            ScrapeError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Wrap a browser adapter error, keeping the full context chain.
    pub(crate) fn browser(err: anyhow::Error) -> Self {
        ScrapeError::Browser(format!("{:#}", err))
    }

    pub(crate) fn pagination(err: anyhow::Error) -> Self {
        ScrapeError::PaginationFailure(format!("{:#}", err))
    }
}
