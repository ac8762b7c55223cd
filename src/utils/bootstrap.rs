//! Bootstrap utilities for sortable binaries.

use std::future::Future;
use std::time::Duration;

use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing from the SORTABLE_LOG environment variable.
///
/// Defaults to "info" level if SORTABLE_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open a storage connection with exponential backoff retry.
///
/// Databases started alongside the binary (compose, CI services) are often
/// not accepting connections yet on the first attempt.
pub async fn connect_with_retry<T, E, F, Fut>(
    backend: &str,
    max_retries: u32,
    connect: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    const INITIAL_DELAY: Duration = Duration::from_millis(100);
    const MAX_DELAY: Duration = Duration::from_secs(5);

    let mut delay = INITIAL_DELAY;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connect().await {
            Ok(store) => {
                tracing::info!(backend, attempt, "Connected to storage");
                return Ok(store);
            }
            Err(e) if attempt < max_retries => {
                warn!(
                    backend,
                    attempt,
                    max_retries,
                    error = %e,
                    retry_in = ?delay,
                    "Storage connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, MAX_DELAY);
            }
            Err(e) => {
                tracing::error!(backend, attempts = attempt, error = %e, "Giving up on storage");
                return Err(e);
            }
        }
    }
}
