//! Logging setup for the provider binary.
//!
//! All logs go to **stderr**: stdout carries the handshake line the host
//! reads to find the gRPC address.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (e.g. `info`, `bigip_provider=debug`). REST
//!   calls to BIG-IP are logged at `debug`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::registry().with(filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the stderr subscriber, defaulting to `info` when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`] with a different default level.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to install the subscriber; returns `false` if one is already set.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("bigip_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,bigip_provider::client=debug").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
