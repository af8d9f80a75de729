// Bounded polling and single-retry primitives

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Polling bounds for a remote operation
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }
}

/// Poll `check` at a fixed interval until it yields a value or the budget runs
/// out. Returns `Ok(None)` on timeout; errors from `check` end the poll
/// immediately.
pub async fn poll_until<T, E, F, Fut>(config: &PollConfig, mut check: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + config.max_wait;

    loop {
        if let Some(value) = check().await? {
            return Ok(Some(value));
        }

        if Instant::now() + config.interval > deadline {
            return Ok(None);
        }

        sleep(config.interval).await;
    }
}

/// Run `op`, retrying exactly once after `delay` when `should_retry` matches
/// the error. Anything else fails immediately.
pub async fn retry_once<T, E, F, Fut, P>(delay: Duration, should_retry: P, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) if should_retry(&e) => {
            sleep(delay).await;
            op().await
        }
        Err(e) => Err(e),
    }
}
