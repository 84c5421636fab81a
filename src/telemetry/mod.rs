//! Logging setup
//!
//! Installs a `tracing-subscriber` fmt layer on stderr. `RUST_LOG` wins
//! when set; otherwise the filter follows the CLI verbosity.

use crate::cli::Verbosity;
use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity level
pub fn filter_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal => "info",
        Verbosity::Verbose => "debug",
        Verbosity::VeryVerbose => "trace",
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity == Verbosity::VeryVerbose)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(Verbosity::Quiet), "warn");
        assert_eq!(filter_directive(Verbosity::Normal), "info");
        assert_eq!(filter_directive(Verbosity::Verbose), "debug");
        assert_eq!(filter_directive(Verbosity::VeryVerbose), "trace");
    }

    #[test]
    fn test_init_twice() {
        init_tracing(Verbosity::Quiet);
        init_tracing(Verbosity::Verbose);
    }
}
