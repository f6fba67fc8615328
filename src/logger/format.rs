//! Log formatting and console output
//!
//! Handles colorized tag/level prefixes and broken pipe handling for piped commands.

use super::config::LoggerConfig;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stderr, stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;

pub fn format_and_log(config: &LoggerConfig, tag: LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let line = if config.colors {
        format!(
            "{} [{}] [{}] {}",
            time.dimmed(),
            format_tag(&tag),
            format_level(level),
            message
        )
    } else {
        format_plain(&time, &tag, level, message)
    };

    // Errors and warnings go to stderr so piped output stays clean
    if level <= LogLevel::Warning {
        write_safe(&mut stderr(), &line);
    } else {
        write_safe(&mut stdout(), &line);
    }
}

pub fn format_plain(time: &str, tag: &LogTag, level: LogLevel, message: &str) -> String {
    format!(
        "{} [{:<tag_w$}] [{:<level_w$}] {}",
        time,
        tag.to_plain_string(),
        level.as_str(),
        message,
        tag_w = TAG_WIDTH,
        level_w = LEVEL_WIDTH
    )
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.white().bold(),
        LogTag::Cache => label.bright_blue().bold(),
        LogTag::Health => label.bright_red().bold(),
        LogTag::Api => label.bright_magenta().bold(),
        LogTag::Provider => label.bright_cyan().bold(),
        LogTag::Aggregator => label.bright_green().bold(),
        LogTag::Stream => label.green().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow(),
        LogLevel::Info => label.normal(),
        LogLevel::Debug => label.bright_black(),
        LogLevel::Verbose => label.dimmed(),
    }
}

/// Write a line, silently ignoring broken pipes (e.g. `tokenfeed stream | head`)
fn write_safe<W: Write>(out: &mut W, line: &str) {
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() != ErrorKind::BrokenPipe {
            eprintln!("logger write failed: {}", e);
        }
    }
}
