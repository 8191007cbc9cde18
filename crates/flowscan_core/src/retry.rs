//! Bounded retry with a fixed delay between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// How often and how patiently a fallible call is re-attempted.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            delay,
        }
    }

    /// The policy used when resolving a possibly just-broadcast
    /// transaction: 5 attempts, 800 ms apart.
    pub const fn lookup() -> Self {
        RetryPolicy::new(5, Duration::from_millis(800))
    }

    /// Runs `op`, re-attempting on error up to `max_attempts` times and
    /// returning the last error once exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    debug!(attempt, error = %e, "attempt failed; retrying");
                }
            }
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }

    /// Runs `op` until it yields a value, treating both errors and
    /// `Ok(None)` as "not yet available". After the final attempt an empty
    /// result stays `Ok(None)` and a hard error is surfaced as-is.
    pub async fn run_until_some<T, E, F, Fut>(&self, mut op: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: Display,
    {
        let mut attempt = 1u32;
        loop {
            let last = attempt >= self.max_attempts;
            match op().await {
                Ok(Some(v)) => return Ok(Some(v)),
                Ok(None) if last => return Ok(None),
                Err(e) if last => return Err(e),
                Ok(None) => {
                    debug!(attempt, "not yet available; retrying");
                }
                Err(e) => {
                    debug!(attempt, error = %e, "attempt failed; retrying");
                }
            }
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let out: Result<u32, String> = fast(3)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("down".to_string())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let out: Result<u32, String> = fast(3)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("still down".to_string()) }
            })
            .await;
        assert_eq!(out.unwrap_err(), "still down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn concludes_not_found_after_empty_attempts() {
        let out: Result<Option<u32>, String> =
            fast(4).run_until_some(|| async { Ok(None) }).await;
        assert_eq!(out.unwrap(), None);
    }

    #[tokio::test]
    async fn late_arrival_is_found() {
        let calls = AtomicU32::new(0);
        let out: Result<Option<u32>, String> = fast(5)
            .run_until_some(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 3 { Ok(None) } else { Ok(Some(9)) } }
            })
            .await;
        assert_eq!(out.unwrap(), Some(9));
    }
}
