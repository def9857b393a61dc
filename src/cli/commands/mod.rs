//! CLI parser and command dispatch.

mod config_cmd;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

pub use scrape::ScrapeArgs;

#[derive(Parser)]
#[command(name = "reviewtap")]
#[command(about = "Harvest product review comments through a real browser session")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./reviewtap.toml when present)
    #[arg(short, long, global = true, env = "REVIEWTAP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every comment page of a product into a CSV file
    Scrape(ScrapeArgs),

    /// Print the effective configuration as TOML
    Config,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scrape(args) => scrape::cmd_scrape(settings, args).await,
        Commands::Config => config_cmd::cmd_config_show(&settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scrape_args() {
        let cli = Cli::try_parse_from([
            "reviewtap",
            "-v",
            "scrape",
            "100007961027",
            "--pages",
            "5",
            "--headed",
            "--source-header",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Scrape(args) => {
                let mut settings = Settings::default();
                args.apply(&mut settings);
                assert_eq!(settings.target.page_budget, 5);
                assert!(!settings.browser.headless);
                assert_eq!(settings.output.header, crate::models::HeaderStyle::Source);
                assert_eq!(
                    args.output_path(&settings),
                    PathBuf::from("data/comments/100007961027.csv")
                );
            }
            Commands::Config => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_zero_pages_rejected() {
        assert!(Cli::try_parse_from(["reviewtap", "scrape", "1", "--pages", "0"]).is_err());
    }
}
