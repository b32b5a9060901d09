//! Logging setup

use tracing_subscriber::filter::EnvFilter;

/// Install a stderr fmt subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("loadstate=debug");
        assert!(!init_logging("loadstate=debug"));
    }
}
