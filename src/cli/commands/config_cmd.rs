//! `reviewtap config` command.

use crate::config::Settings;

/// Print the effective settings (file values layered over defaults).
pub fn cmd_config_show(settings: &Settings) -> anyhow::Result<()> {
    print!("{}", settings.to_toml()?);
    Ok(())
}
