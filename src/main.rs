use std::net::SocketAddr;
use std::num::ParseIntError;
use std::time::Duration;

use bigip_provider::{
    init_logging, serve_on_with_options, serve_with_options, BigIpProvider, ServeOptions,
};
use tracing::{error, info};

/// Fixed listen address, e.g. `127.0.0.1:50051`. An ephemeral port otherwise.
const LISTEN_ENV: &str = "BIGIP_PROVIDER_LISTEN";

/// Seconds to drain in-flight requests after SIGTERM/SIGINT.
const SHUTDOWN_TIMEOUT_ENV: &str = "BIGIP_PROVIDER_SHUTDOWN_TIMEOUT";

fn serve_options(shutdown_timeout: Option<String>) -> Result<ServeOptions, ParseIntError> {
    let options = ServeOptions::new();
    match shutdown_timeout {
        Some(raw) if !raw.trim().is_empty() => {
            let secs: u64 = raw.trim().parse().inspect_err(|e| {
                error!(error = %e, value = %raw, "Invalid {}", SHUTDOWN_TIMEOUT_ENV);
            })?;
            Ok(options.with_shutdown_timeout(Duration::from_secs(secs)))
        },
        _ => Ok(options),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting BIG-IP provider");

    let provider = BigIpProvider::new();
    let options = serve_options(std::env::var(SHUTDOWN_TIMEOUT_ENV).ok())?;
    match std::env::var(LISTEN_ENV) {
        Ok(raw) if !raw.trim().is_empty() => {
            let addr: SocketAddr = raw.trim().parse().inspect_err(|e| {
                error!(error = %e, value = %raw, "Invalid {}", LISTEN_ENV);
            })?;
            serve_on_with_options(provider, addr, options).await
        },
        _ => serve_with_options(provider, options).await,
    }
}
