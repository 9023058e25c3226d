//! Console reporter with server-style formatting.
//!
//! Used by the CLI for human-readable progress and run summaries; library
//! code logs through the `log` facade instead.

use std::sync::OnceLock;

use chrono::Local;

use crate::models::RunResult;

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" | "trace" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Current log level
static LOG_LEVEL: OnceLock<LogLevel> = OnceLock::new();

/// Initialize the console reporter with a level name.
pub fn init(level: &str) {
    let _ = LOG_LEVEL.set(LogLevel::parse(level));
}

fn should_log(level: LogLevel) -> bool {
    let current = LOG_LEVEL.get().copied().unwrap_or(LogLevel::Info);
    level >= current
}

fn format_log(level: LogLevel, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] [{}] {}", timestamp, level.as_str(), message)
}

pub fn info(message: &str) {
    if should_log(LogLevel::Info) {
        println!("{}", format_log(LogLevel::Info, message));
    }
}

pub fn warn(message: &str) {
    if should_log(LogLevel::Warn) {
        eprintln!("{}", format_log(LogLevel::Warn, message));
    }
}

pub fn error(message: &str) {
    if should_log(LogLevel::Error) {
        eprintln!("{}", format_log(LogLevel::Error, message));
    }
}

/// Log a success message (always shown as INFO)
pub fn success(message: &str) {
    println!("{}", format_log(LogLevel::Info, message));
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    if should_log(LogLevel::Info) {
        let msg = format!("[STEP {}/{}] {}", step_num, total, message);
        println!("{}", format_log(LogLevel::Info, &msg));
    }
}

/// Log a header
pub fn header(title: &str) {
    if should_log(LogLevel::Info) {
        let border = "═".repeat(60);
        println!("{}", format_log(LogLevel::Info, &border));
        println!("{}", format_log(LogLevel::Info, &format!("  {}", title)));
        println!("{}", format_log(LogLevel::Info, &border));
    }
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    if should_log(LogLevel::Info) {
        let msg = format!("    {}", message);
        println!("{}", format_log(LogLevel::Info, &msg));
    }
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    if should_log(LogLevel::Info) {
        println!();

        let title_msg = format!("[SUMMARY] {}", title);
        println!("{}", format_log(LogLevel::Info, &title_msg));

        for (key, value) in items {
            let item_msg = format!("    {}: {}", key, value);
            println!("{}", format_log(LogLevel::Info, &item_msg));
        }
    }
}

/// Summary rows for a finished run.
pub fn run_summary_items(result: &RunResult) -> Vec<(&'static str, String)> {
    let mut items = vec![
        ("State", format!("{:?}", result.state).to_lowercase()),
        ("Elapsed", format!("{}ms", result.elapsed)),
        ("Published", result.status.published.to_string()),
        ("Unpublished", result.status.unpublished.to_string()),
        ("Ignored", result.status.ignored.to_string()),
        ("Failed", result.status.failed.to_string()),
    ];
    if let Some(preview) = result.timings.get("previewDuration").filter(|a| a.n > 0) {
        items.push((
            "Preview avg",
            format!("{:.0}ms over {} pages", preview.avg, preview.n),
        ));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunCounters, RunState, aggregate};

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::parse("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_run_summary_items() {
        let mut result = RunResult {
            state: RunState::Completed,
            elapsed: 1200,
            status: RunCounters {
                published: 3,
                failed: 1,
                ..RunCounters::default()
            },
            timings: Default::default(),
        };
        result
            .timings
            .insert("previewDuration".into(), aggregate(&[100.0, 300.0]));

        let items = run_summary_items(&result);
        assert_eq!(items[0], ("State", "completed".to_string()));
        assert_eq!(items[2], ("Published", "3".to_string()));
        assert_eq!(items[6], ("Preview avg", "200ms over 2 pages".to_string()));
    }
}
