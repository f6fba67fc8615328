/// Command-line interface of the `tokenfeed` binary
///
/// Logging flags are global so they work after any subcommand:
/// `tokenfeed search bonk --debug aggregator --debug cache`
use crate::logger::LoggerConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tokenfeed")]
#[command(version, about = "Solana token discovery across DexScreener, Birdeye, Jupiter, GeckoTerminal and RPC", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); defaults to data/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logs for a subsystem (system, config, cache, health, api, provider,
    /// aggregator, stream, or all). Repeatable.
    #[arg(long = "debug", global = true, value_name = "TAG")]
    pub debug: Vec<String>,

    /// Verbose logging everywhere
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Minimum level shown (error, warn, info, debug, verbose)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Print results as JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// One-shot search across every provider
    Search {
        query: String,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Collection deadline in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },

    /// Stream keyword batches as they arrive
    Stream {
        /// Terms dispatched in total
        #[arg(long)]
        budget: Option<usize>,

        /// Term searches running at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Start the keyword window at this index
        #[arg(long)]
        offset: Option<usize>,

        /// Skip the trending/new seed batch
        #[arg(long)]
        no_seeds: bool,
    },

    /// Walk the keywords once and print the merged, ranked bag
    Feeds {
        #[arg(long)]
        budget: Option<usize>,

        /// Include trending/new seeds in the bag
        #[arg(long)]
        seeds: bool,
    },

    /// Token details with provider fallback
    Info { mint: String },

    /// Quote pools and boosted tokens, ranked by liquidity
    Instant {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Provider health, cache and API statistics
    Health,
}

impl Cli {
    /// Logger settings for the global flags, parsed the same way as `--debug-<tag>`
    pub fn logger_config(&self) -> LoggerConfig {
        let mut flags: Vec<String> = self
            .debug
            .iter()
            .map(|tag| format!("--debug-{}", tag.trim().to_lowercase()))
            .collect();
        if let Some(level) = &self.log_level {
            flags.push(format!("--log-level={}", level));
        }
        if self.verbose {
            flags.push("--verbose".to_string());
        }
        LoggerConfig::from_args(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::LogLevel;

    #[test]
    fn test_parse_search_with_global_flags() {
        let cli = Cli::try_parse_from([
            "tokenfeed", "search", "bonk", "--limit", "5", "--debug", "cache", "--debug", "Stream",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Search {
                query: "bonk".to_string(),
                limit: Some(5),
                deadline_ms: None
            }
        );
        let logger = cli.logger_config();
        assert!(logger.debug_tags.contains("cache"));
        assert!(logger.debug_tags.contains("stream"));
        assert_eq!(logger.min_level, LogLevel::Debug);
    }

    #[test]
    fn test_parse_stream_flags() {
        let cli = Cli::try_parse_from([
            "tokenfeed",
            "--config",
            "custom.toml",
            "stream",
            "--budget",
            "3",
            "--concurrency",
            "1",
            "--no-seeds",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Command::Stream {
                budget,
                concurrency,
                no_seeds,
                offset,
            } => {
                assert_eq!(budget, Some(3));
                assert_eq!(concurrency, Some(1));
                assert!(no_seeds);
                assert_eq!(offset, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_log_level_flag() {
        let cli = Cli::try_parse_from(["tokenfeed", "health", "--log-level", "warn"]).unwrap();
        assert_eq!(cli.command, Command::Health);
        assert_eq!(cli.logger_config().min_level, LogLevel::Warning);
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(Cli::try_parse_from(["tokenfeed"]).is_err());
    }
}
