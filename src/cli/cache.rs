//! Cache command handler.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use storyloom::cache::ResponseCache;
use storyloom::config::Config;

use super::CacheAction;

/// Inspect or reset the response cache.
pub(crate) fn cmd_cache(config: &Config, action: CacheAction) -> Result<()> {
    let path = config.cache.resolved_path();

    match action {
        CacheAction::Path => {
            println!("{}", path.display());
        }
        CacheAction::Stats => {
            let cache = ResponseCache::try_load(&path)
                .with_context(|| format!("Failed to read cache at {}", path.display()))?;
            let stats = cache.stats();

            println!("Cache file: {}", path.display());
            println!("Enabled: {}", config.cache.enabled);
            println!("Entries: {}", stats.total_entries);
            match stats.file_bytes {
                Some(bytes) => println!("Size: {} bytes", bytes),
                None => println!("Size: (no file yet)"),
            }
            let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
            if let Some(modified) = modified {
                let local: DateTime<Local> = modified.into();
                println!("Last written: {}", local.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        CacheAction::Clear => {
            let mut cache = ResponseCache::load(&path);
            let removed = cache.len();
            cache
                .clear()
                .with_context(|| format!("Failed to clear cache at {}", path.display()))?;
            println!("Removed {} cached response(s).", removed);
        }
    }

    Ok(())
}
