//! Tracing subscriber setup.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

static INIT: Once = Once::new();

/// Install the global subscriber, writing to stderr so command output on
/// stdout stays clean.
///
/// `RUST_LOG` wins when set. Otherwise `log_level` is used, then `-v`
/// (debug), then `warn`.
pub fn init_logging(verbose: bool, log_level: Option<&str>) {
    INIT.call_once(|| {
        let filter = if env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            let level = resolve_level(verbose, log_level);
            let directives = format!(
                "{},hyper=warn,reqwest=warn",
                level.as_str().to_lowercase()
            );
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("warn"))
        };

        // Another subscriber may already be installed by an embedding binary
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init();
    });
}

fn resolve_level(verbose: bool, log_level: Option<&str>) -> Level {
    match log_level {
        Some(level) => level.parse().unwrap_or(Level::WARN),
        None if verbose => Level::DEBUG,
        None => Level::WARN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(false, None), Level::WARN);
        assert_eq!(resolve_level(true, None), Level::DEBUG);
        assert_eq!(resolve_level(true, Some("error")), Level::ERROR);
        assert_eq!(resolve_level(false, Some("info")), Level::INFO);
    }
}
