//! Command-line interface: argument definitions and dispatch.

mod cache;
mod catalog;
mod config;
mod story;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use storyloom::config::Config;

#[derive(Parser)]
#[command(name = "storyloom", version, about = "Language-learning stories from an LLM")]
struct Cli {
    /// Enable debug logging for storyloom
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.storyloom/config.json
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a story for the chosen level and topic
    Story(StoryArgs),
    /// List levels, vocabulary, grammar structures, and topics
    Catalog {
        /// Only show this level
        #[arg(long)]
        level: Option<String>,
    },
    /// Inspect or reset the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
pub(crate) struct StoryArgs {
    /// Your own language (translation target)
    #[arg(long, default_value = "Turkish")]
    pub native: String,
    /// Language to learn (story language)
    #[arg(long, default_value = "English")]
    pub target: String,
    /// CEFR level: A1, A2, B1, B2, C1, C2
    #[arg(long)]
    pub level: String,
    /// Story topic, e.g. "travel" or "daily-life"
    #[arg(long)]
    pub topic: String,
    /// short, medium, or long
    #[arg(long, default_value = "short")]
    pub length: String,
    /// Grammar structure for the level (defaults to the first one listed)
    #[arg(long)]
    pub grammar: Option<String>,
    /// Characters to feature, comma separated (e.g. "Ana,Luis")
    #[arg(long, value_delimiter = ',')]
    pub characters: Vec<String>,
    /// Skip the response cache for this run
    #[arg(long)]
    pub no_cache: bool,
    /// Also synthesize narration audio
    #[arg(long)]
    pub narrate: bool,
    /// Also generate an illustration
    #[arg(long)]
    pub illustrate: bool,
}

#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show entry count and file size
    Stats,
    /// Print the cache file location
    Path,
    /// Remove every cached response
    Clear,
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Print the config file location
    Path,
}

/// Parse arguments, load configuration, and run the chosen command.
pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::path);
    let config = Config::load_with_env(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    storyloom::logging::init(&config.logging, cli.verbose);

    match cli.command {
        Commands::Story(args) => story::cmd_story(config, args).await,
        Commands::Catalog { level } => catalog::cmd_catalog(level.as_deref()),
        Commands::Cache { action } => cache::cmd_cache(&config, action),
        Commands::Config { action } => config::cmd_config(&config, &config_path, action),
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
    fn test_story_args_parse() {
        let cli = Cli::try_parse_from([
            "storyloom", "story", "--level", "B1", "--topic", "travel", "--target", "Spanish",
            "--no-cache", "--characters", "Ana,Luis",
        ])
        .unwrap();
        match cli.command {
            Commands::Story(args) => {
                assert_eq!(args.level, "B1");
                assert_eq!(args.native, "Turkish");
                assert_eq!(args.length, "short");
                assert!(args.no_cache);
                assert!(!args.narrate);
                assert_eq!(args.characters, vec!["Ana", "Luis"]);
            }
            _ => panic!("expected story command"),
        }
    }

    #[test]
    fn test_story_requires_level_and_topic() {
        assert!(Cli::try_parse_from(["storyloom", "story", "--topic", "travel"]).is_err());
    }
}
