use crate::foundation::BridgeError;
use log::warn;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded retry policy applied at every remote call site.
pub const RETRY_ATTEMPTS: usize = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Retry an async operation with a fixed delay between attempts.
/// Fatal errors short-circuit; there is nothing a retry can fix.
pub async fn retry<F, Fut, T>(operation: &str, attempts: usize, delay: Duration, mut op: F) -> Result<T, BridgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BridgeError>>,
{
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("{} attempt {}/{} failed: {}", operation, attempt, attempts, err);
                last_err = Some(err);
                if attempt < attempts {
                    sleep(delay).await;
                }
            }
        }
    }
    Err(BridgeError::RetryExhausted {
        operation: operation.to_string(),
        attempts,
        details: last_err.map(|err| err.to_string()).unwrap_or_else(|| "no attempts made".to_string()),
    })
}
