//! Logging setup for the binary.

use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Environment variable holding a plain level name (`warn`, `debug`, ...).
pub const LOG_LEVEL_ENV: &str = "WORLDKEEP_LOG_LEVEL";

/// Filter directive: `RUST_LOG` wins, then the level variable, then `info`.
pub fn filter_directive(rust_log: Option<&str>, level: Option<&str>) -> String {
    if let Some(directive) = rust_log.filter(|d| !d.trim().is_empty()) {
        return directive.to_string();
    }

    level
        .and_then(LogLevel::from_str_loose)
        .unwrap_or_default()
        .as_filter_str()
        .to_string()
}

/// Install the global fmt subscriber. Logs go to stderr.
pub fn init_logging() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let level = std::env::var(LOG_LEVEL_ENV).ok();
    let filter = filter_directive(rust_log.as_deref(), level.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        assert_eq!(
            filter_directive(Some("worldkeep_retention=debug"), Some("error")),
            "worldkeep_retention=debug"
        );
    }

    #[test]
    fn test_level_variable_used_without_rust_log() {
        assert_eq!(filter_directive(None, Some("Warning")), "warn");
        assert_eq!(filter_directive(Some("  "), Some("trace")), "trace");
    }

    #[test]
    fn test_default_is_info() {
        assert_eq!(filter_directive(None, None), "info");
        assert_eq!(filter_directive(None, Some("chatty")), "info");
    }
}
