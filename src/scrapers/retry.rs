use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay,
        }
    }

    /// Run `op` until it succeeds, fails with an error `should_retry` rejects,
    /// or the attempt budget is spent. The last error is returned.
    pub async fn run<T, F, Fut>(
        &self,
        what: &str,
        should_retry: impl Fn(&ScoutError) -> bool,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && should_retry(&e) => {
                    let delay = self.delay * attempt;
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what, attempt, self.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Await `fut`, turning an expired run deadline into [`ScoutError::Timeout`].
pub async fn within_deadline<T>(
    deadline: Option<Instant>,
    url: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .unwrap_or_else(|_| {
                Err(ScoutError::Timeout {
                    url: url.to_string(),
                })
            }),
        None => fut.await,
    }
}
