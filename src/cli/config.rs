//! Config command handler.

use std::path::Path;

use anyhow::{Context, Result};

use storyloom::config::Config;

use super::ConfigAction;

/// Show the effective configuration or where it is read from.
pub(crate) fn cmd_config(config: &Config, path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let rendered = serde_json::to_string_pretty(&config.redacted())
                .context("Failed to render configuration")?;
            println!("{}", rendered);
            if !path.exists() {
                println!();
                println!("(no config file at {}; showing defaults and environment)", path.display());
            }
        }
    }
    Ok(())
}
