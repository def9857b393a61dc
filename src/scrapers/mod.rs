//! Comment harvesting: browser sessions, response parsing, pacing,
//! the pagination state machine, and run orchestration.

pub mod browser;
pub mod controller;
pub mod orchestrator;
pub mod pacing;
pub mod parse;

#[cfg(feature = "browser")]
pub use browser::ChromiumSession;
pub use browser::{
    BrowserEngineConfig, BrowserSession, CaptureHandle, CapturedResponse, PageControl,
};
pub use controller::{ExhaustReason, PageCursor, PageState, PageTurn, PaginationController, Termination};
pub use orchestrator::{Orchestrator, RunReport};
pub use pacing::{JitterPolicy, Pacing};
