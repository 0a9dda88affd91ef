//! Diagnostic logging
//!
//! Logs go to stderr so JSON on stdout stays parseable. The filter comes from
//! `TASKPILOT_LOG` if set, then the global config's `log_filter`, then the
//! verbosity flag.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive
pub const LOG_ENV: &str = "TASKPILOT_LOG";

/// Picks the filter directive to use
pub fn filter_directive(env: Option<String>, configured: Option<&str>, verbose: bool) -> String {
    if let Some(directive) = env.filter(|d| !d.trim().is_empty()) {
        return directive;
    }
    if let Some(directive) = configured.filter(|d| !d.trim().is_empty()) {
        return directive.to_string();
    }
    if verbose {
        "taskpilot=debug".to_string()
    } else {
        "warn".to_string()
    }
}

/// Installs the global subscriber
///
/// Calling it twice is harmless; the second call keeps the first subscriber.
pub fn init(configured: Option<&str>, verbose: bool) {
    let directive = filter_directive(std::env::var(LOG_ENV).ok(), configured, verbose);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_wins_over_config_and_flag() {
        assert_eq!(
            filter_directive(Some("trace".into()), Some("info"), true),
            "trace"
        );
    }

    #[test]
    fn config_wins_over_flag() {
        assert_eq!(filter_directive(None, Some("info"), true), "info");
    }

    #[test]
    fn blank_values_are_ignored() {
        assert_eq!(filter_directive(Some("  ".into()), Some(""), false), "warn");
    }

    #[test]
    fn verbose_enables_debug() {
        assert_eq!(filter_directive(None, None, true), "taskpilot=debug");
        assert_eq!(filter_directive(None, None, false), "warn");
    }
}
