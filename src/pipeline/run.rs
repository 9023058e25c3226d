//! Locked run entry points.

use std::time::{Duration, Instant};

use crate::error::{AppError, Result};
use crate::models::{Config, RunResult};
use crate::pipeline::Poller;
use crate::services::Services;
use crate::storage::{RunLock, StateStore};

const LOCK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Run one reconciliation pass unless another run holds the lease.
///
/// The lease is released on every path once the pass has started.
pub async fn run(config: &Config, services: Services) -> Result<RunResult> {
    config.check_params()?;

    let lock = RunLock::new(services.storage.clone(), &config.poller.state_prefix);
    let ttl = Duration::from_secs(config.poller.lock_ttl_secs);
    if !lock.try_acquire(ttl).await? {
        log::info!("Another run is in progress, skipping");
        return Ok(RunResult::skipped());
    }

    let result = Poller::new(config.clone(), services).poll().await;

    if let Err(e) = lock.release().await {
        log::error!("Failed to release run lease: {}", e);
    }
    result
}

/// Wait until no run holds the lease, then delete the state of `locales`.
///
/// Deleting a locale's state makes the next run re-render all of its
/// products.
pub async fn reset_locales(
    config: &Config,
    services: &Services,
    locales: &[Option<String>],
    timeout: Duration,
) -> Result<()> {
    let lock = RunLock::new(services.storage.clone(), &config.poller.state_prefix);
    let started = Instant::now();

    while lock.status().await?.is_held() {
        if started.elapsed() >= timeout {
            return Err(AppError::validation(format!(
                "a run is still in progress after {}s",
                timeout.as_secs()
            )));
        }
        log::info!("Waiting for the running poll to finish");
        tokio::time::sleep(LOCK_POLL_INTERVAL.min(timeout)).await;
    }

    let states = StateStore::new(services.storage.clone(), config.poller.state_prefix.clone());
    for locale in locales {
        states.delete(locale.as_deref()).await?;
    }
    Ok(())
}
