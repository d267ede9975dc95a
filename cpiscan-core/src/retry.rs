use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry an async RPC operation, backing off harder when the error looks
/// like rate limiting.
///
/// Non-rate-limit failures get exponential backoff starting at 100ms;
/// rate-limit responses (429 / "too many requests") wait in multiples of
/// 5s. Delays are capped at 60s. Returns the last error once `max_retries`
/// extra attempts are exhausted.
pub async fn retry_rate_limited<T, E, F, Fut>(operation: F, max_retries: u32) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_retries {
                    return Err(e);
                }

                let message = e.to_string().to_lowercase();
                let rate_limited = message.contains("rate limit")
                    || message.contains("429")
                    || message.contains("too many requests");

                let delay = if rate_limited {
                    Duration::from_secs(u64::from(attempt + 1) * 5)
                } else {
                    Duration::from_millis(100 * 2u64.pow(attempt))
                };
                let delay = delay.min(Duration::from_secs(60));

                if rate_limited {
                    warn!(
                        "rate limit hit (attempt {}/{}), waiting {:?}",
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                } else {
                    debug!(
                        "operation failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay
                    );
                }

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Run `processor` over `items` with at most `concurrency` operations in
/// flight. Results come back in completion order, not input order; callers
/// needing ledger order sort afterwards.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, concurrency: usize, processor: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = R>,
{
    use futures::stream::{self, StreamExt};

    stream::iter(items)
        .map(|item| {
            let processor = &processor;
            async move { processor(item).await }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}
