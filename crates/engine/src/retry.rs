use std::future::Future;
use std::time::Duration;

use tracing::warn;

use common::{Error, Result};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempts are used up, returning the
    /// last error in the latter case.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max => return Err(e),
                Err(e) => {
                    warn!(what, attempt, max_attempts = max, error = %e, "Attempt failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

/// Wraps an exhausted fetch error so callers can tell it apart from other
/// store failures.
pub(crate) fn into_fetch_error(e: Error) -> Error {
    match e {
        Error::CandleFetch(_) => e,
        other => Error::CandleFetch(other.to_string()),
    }
}
