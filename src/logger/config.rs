/// Logger configuration and command-line flag parsing
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages above this level are dropped
    pub min_level: LogLevel,
    /// Tags with debug output enabled (debug keys, lowercase)
    pub debug_tags: HashSet<String>,
    /// Tags with verbose output enabled
    pub verbose_tags: HashSet<String>,
    /// Colorize console output
    pub colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            colors: true,
        }
    }
}

impl LoggerConfig {
    /// Build a config from raw arguments: `--debug-<tag>`, `--debug-all`,
    /// `--verbose`, `--verbose-<tag>`, `--quiet`, `--no-color`, `--log-level=<level>`
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = LoggerConfig::default();

        for arg in args {
            let arg = arg.as_ref();
            match arg {
                "--verbose" => config.min_level = LogLevel::Verbose,
                "--quiet" => config.min_level = LogLevel::Warning,
                "--no-color" => config.colors = false,
                "--debug-all" => {
                    for tag in LogTag::all() {
                        config.debug_tags.insert(tag.to_debug_key());
                    }
                    if config.min_level < LogLevel::Debug {
                        config.min_level = LogLevel::Debug;
                    }
                }
                _ => {
                    if let Some(level) = arg.strip_prefix("--log-level=") {
                        if let Ok(level) = level.parse() {
                            config.min_level = level;
                        }
                    } else if let Some(key) = arg.strip_prefix("--debug-") {
                        if let Some(tag) = LogTag::from_debug_key(key) {
                            config.enable_debug(tag);
                        }
                    } else if let Some(key) = arg.strip_prefix("--verbose-") {
                        if let Some(tag) = LogTag::from_debug_key(key) {
                            config.verbose_tags.insert(tag.to_debug_key());
                            config.enable_debug(tag);
                        }
                    }
                }
            }
        }

        config
    }

    pub fn enable_debug(&mut self, tag: LogTag) {
        self.debug_tags.insert(tag.to_debug_key());
        if self.min_level < LogLevel::Debug {
            self.min_level = LogLevel::Debug;
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

pub fn init_from_args() {
    set_logger_config(LoggerConfig::from_args(std::env::args().skip(1)));
}

pub(super) fn is_debug_enabled_for_tag(config: &LoggerConfig, tag: &LogTag) -> bool {
    config.debug_tags.contains(&tag.to_debug_key())
}

pub(super) fn is_verbose_enabled_for_tag(config: &LoggerConfig, tag: &LogTag) -> bool {
    config.verbose_tags.contains(&tag.to_debug_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flags_enable_tags() {
        let config = LoggerConfig::from_args(["--debug-cache", "--debug-nonsense", "--no-color"]);
        assert!(config.debug_tags.contains("cache"));
        assert_eq!(config.debug_tags.len(), 1);
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(!config.colors);
    }

    #[test]
    fn test_verbose_tag_implies_debug() {
        let config = LoggerConfig::from_args(["--verbose-stream"]);
        assert!(config.verbose_tags.contains("stream"));
        assert!(config.debug_tags.contains("stream"));
    }

    #[test]
    fn test_explicit_log_level() {
        let config = LoggerConfig::from_args(["--log-level=warn"]);
        assert_eq!(config.min_level, LogLevel::Warning);
        let config = LoggerConfig::from_args(["--log-level=shouty"]);
        assert_eq!(config.min_level, LogLevel::Info);
    }
}
