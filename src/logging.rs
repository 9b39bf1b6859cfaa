//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the configured level; `verbose` raises the crate's own
/// level to `debug`. Calling this twice is harmless.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let directive = if verbose {
        format!("{},storyloom=debug", config.level)
    } else {
        config.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
