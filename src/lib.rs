//! reviewtap - browser-driven product review harvester.
//!
//! Drives a Chromium session through a product's paginated comment view,
//! captures the internal comments API responses, and appends the parsed
//! comments to a CSV file page by page.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod storage;

pub use config::Settings;
pub use error::{ErrorKind, ScrapeError};
pub use models::CommentRecord;
pub use scrapers::{ExhaustReason, Orchestrator, RunReport, Termination};
pub use storage::CsvSink;
