/// Core logging implementation with automatic filtering
use super::config::{get_logger_config, is_debug_enabled_for_tag, is_verbose_enabled_for_tag};
use super::config::LoggerConfig;
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Check against minimum log level threshold
/// 3. Debug level requires --debug-<tag> for that tag
/// 4. Verbose level requires --verbose OR --verbose-<tag>
pub fn should_log(config: &LoggerConfig, tag: &LogTag, level: LogLevel) -> bool {
    match level {
        LogLevel::Error => true,
        LogLevel::Verbose => {
            config.min_level == LogLevel::Verbose || is_verbose_enabled_for_tag(config, tag)
        }
        LogLevel::Debug => level <= config.min_level && is_debug_enabled_for_tag(config, tag),
        _ => level <= config.min_level,
    }
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    let config = get_logger_config();
    if !should_log(&config, &tag, level) {
        return;
    }

    super::format::format_and_log(&config, tag, level, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_always_pass() {
        let config = LoggerConfig {
            min_level: LogLevel::Warning,
            ..Default::default()
        };
        assert!(should_log(&config, &LogTag::Cache, LogLevel::Error));
        assert!(should_log(&config, &LogTag::Cache, LogLevel::Warning));
        assert!(!should_log(&config, &LogTag::Cache, LogLevel::Info));
    }

    #[test]
    fn test_debug_gated_per_tag() {
        let config = LoggerConfig::from_args(["--debug-health"]);
        assert!(should_log(&config, &LogTag::Health, LogLevel::Debug));
        assert!(!should_log(&config, &LogTag::Cache, LogLevel::Debug));
        assert!(!should_log(&config, &LogTag::Health, LogLevel::Verbose));
    }

    #[test]
    fn test_verbose_tag_passes_below_global_verbose() {
        let config = LoggerConfig::from_args(["--verbose-stream"]);
        assert!(should_log(&config, &LogTag::Stream, LogLevel::Verbose));
        assert!(!should_log(&config, &LogTag::Cache, LogLevel::Verbose));
    }
}
