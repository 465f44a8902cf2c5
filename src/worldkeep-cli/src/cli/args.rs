//! CLI argument structures and parsing.

use clap::Parser;
use std::path::PathBuf;

use worldkeep_retention::DEFAULT_CONFIG_FILE;

/// Log verbosity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<LogLevel> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// worldkeep - daily world snapshots with size-bounded retention.
///
/// Runs one maintenance cycle over every configured world: snapshot,
/// optional render and compression, then pruning down to the world's budget.
#[derive(Debug, Parser)]
#[command(name = "worldkeep", version, about)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}
