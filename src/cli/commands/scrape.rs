//! `reviewtap scrape` command.

use std::path::PathBuf;

use clap::Args;
use console::style;

use crate::cli::icons::{dim_arrow, error, info, success, warn};
use crate::config::Settings;
use crate::models::HeaderStyle;
use crate::scrapers::{RunReport, Termination};

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Product id whose comments are scraped
    pub target_id: String,

    /// Output CSV path (default: <output.dir>/<TARGET_ID>.csv)
    #[arg(short, long, env = "REVIEWTAP_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Maximum number of comment pages to fetch
    #[arg(short, long, env = "REVIEWTAP_PAGES", value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: Option<u32>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Attach to a running browser's DevTools endpoint (e.g. ws://localhost:9222)
    #[arg(long, env = "REVIEWTAP_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Write origin-locale column labels instead of English ones
    #[arg(long)]
    pub source_header: bool,

    /// Extra attempts for a failed page turn
    #[arg(long)]
    pub retries: Option<u32>,
}

impl ScrapeArgs {
    /// Layer command-line overrides onto loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(pages) = self.pages {
            settings.target.page_budget = pages;
        }
        if self.headed {
            settings.browser.headless = false;
        }
        if let Some(ref remote_url) = self.remote_url {
            settings.browser.remote_url = Some(remote_url.clone());
        }
        if self.source_header {
            settings.output.header = HeaderStyle::Source;
        }
        if let Some(retries) = self.retries {
            settings.pacing.pagination_retries = retries;
        }
    }

    pub fn output_path(&self, settings: &Settings) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| settings.output.path_for(&self.target_id))
    }
}

#[cfg(feature = "browser")]
pub async fn cmd_scrape(mut settings: Settings, args: ScrapeArgs) -> anyhow::Result<()> {
    use tokio_util::sync::CancellationToken;

    use crate::scrapers::{ChromiumSession, Orchestrator};

    args.apply(&mut settings);
    settings.validate()?;
    let output = args.output_path(&settings);

    println!(
        "{} Scraping comments for {} (up to {} pages)",
        info(),
        style(&args.target_id).cyan(),
        settings.target.page_budget
    );
    println!("  {} Output: {}", dim_arrow(), output.display());

    let session = ChromiumSession::launch(settings.browser.clone()).await?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping run and closing browser");
                cancel.cancel();
            }
        })
    };

    let report = Orchestrator::new(session, settings.target.clone(), settings.pacing.pacing())
        .with_header(settings.output.header)
        .with_cancellation(cancel)
        .run(&args.target_id, &output, settings.target.page_budget)
        .await;
    interrupt.abort();

    print_report(&report);

    if let Termination::Failed(ref err) = report.termination {
        anyhow::bail!("Scrape of {} failed ({:?}): {}", report.target_id, err.kind(), err);
    }
    Ok(())
}

#[cfg(not(feature = "browser"))]
pub async fn cmd_scrape(_settings: Settings, _args: ScrapeArgs) -> anyhow::Result<()> {
    Err(anyhow::anyhow!(
        "Browser support not compiled. Rebuild with: cargo build --features browser"
    ))
}

fn print_report(report: &RunReport) {
    let elapsed = report.finished_at - report.started_at;
    match &report.termination {
        Termination::Exhausted(reason) => println!(
            "{} Finished {}: {}",
            success(),
            style(&report.target_id).cyan(),
            reason
        ),
        Termination::Failed(err) => println!(
            "{} Stopped {}: {}",
            error(),
            style(&report.target_id).cyan(),
            err
        ),
    }
    println!(
        "  {} {} comments from {} pages in {}s",
        dim_arrow(),
        report.records_written,
        report.pages_processed,
        elapsed.num_seconds()
    );
    println!("  {} Saved to {}", dim_arrow(), report.output_path.display());
    if report.browser_released {
        println!("  {} Browser closed", dim_arrow());
    } else {
        println!("{} Browser may still be running", warn());
    }
}
