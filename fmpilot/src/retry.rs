use crate::errors::AutomationError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Sleep for `ms` milliseconds; zero returns immediately.
pub async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Run `op` up to `attempts` times.
///
/// `Ok(Some(v))` ends the loop. `Ok(None)` means "not yet" and retries at
/// once, since the operation has already waited for its own side effects.
/// `Err` is logged and followed by `backoff_ms` of sleep. Returns `Ok(None)`
/// when every attempt came back empty, or the last error when the final
/// attempt failed.
pub async fn retry_bounded<T, F, Fut>(
    label: &str,
    attempts: u32,
    backoff_ms: u64,
    mut op: F,
) -> Result<Option<T>, AutomationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, AutomationError>>,
{
    let mut last_error = None;
    for attempt in 0..attempts {
        match op(attempt).await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {
                debug!("{} not ready (attempt {}/{})", label, attempt + 1, attempts);
                last_error = None;
            }
            Err(e) => {
                warn!("{} failed (attempt {}/{}): {}", label, attempt + 1, attempts, e);
                last_error = Some(e);
                pause(backoff_ms).await;
            }
        }
    }
    match last_error {
        Some(e) => Err(e),
        None => Ok(None),
    }
}
