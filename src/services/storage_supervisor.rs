use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::storage::StorageError,
    state::{Backends, SharedState},
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend and keep the shared state in degraded mode
/// while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Backends, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(backends) => {
                state.install_backends(backends.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise_health(&state, &backends).await;

                // Health supervision gave up; drop the handles and reconnect
                // from scratch.
                state.clear_backends().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the backend health, attempting bounded reconnects on failure.
/// Returns once every reconnect attempt has failed.
async fn supervise_health(state: &SharedState, backends: &Backends) {
    loop {
        match backends.sessions.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect_with_backoff(state, backends).await {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    return;
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect_with_backoff(state: &SharedState, backends: &Backends) -> bool {
    let mut attempt = 0;
    let mut delay = INITIAL_DELAY;

    while attempt < MAX_RECONNECT_ATTEMPTS {
        match backends.sessions.try_reconnect().await {
            Ok(()) => {
                info!("storage reconnection succeeded after health check failure");
                state.update_degraded(false);
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                attempt += 1;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}
