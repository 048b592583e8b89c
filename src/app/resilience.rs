use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Fixed-delay retry configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::ZERO,
        }
    }
}

/// Execute an async closure until it succeeds or the attempts run out.
/// The last error is returned when every attempt fails.
pub async fn retry_with_policy<F, Fut, T>(policy: &RetryPolicy, mut f: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 0..attempts {
        match f(attempt).await {
            Ok(val) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "retry succeeded");
                }
                return Ok(val);
            }
            Err(e) => {
                if attempt + 1 < attempts {
                    debug!(
                        attempt = attempt,
                        max = attempts,
                        delay_ms = policy.delay.as_millis() as u64,
                        error = %e,
                        "retrying"
                    );
                    if !policy.delay.is_zero() {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("retry exhausted without attempts")))
}

/// 网页抓取限速：每累计 `batch` 次抓取后冷却 `cooldown`
pub struct ScrapeThrottle {
    batch: u32,
    cooldown: Duration,
    counter: Mutex<u32>,
}

impl Default for ScrapeThrottle {
    fn default() -> Self {
        Self::new(20, Duration::from_secs(60))
    }
}

impl ScrapeThrottle {
    pub fn new(batch: u32, cooldown: Duration) -> Self {
        Self {
            batch: batch.max(1),
            cooldown,
            counter: Mutex::new(0),
        }
    }

    /// 记录一次抓取。达到批次上限时在持锁状态下休眠，其他抓取者随之等待
    pub async fn record(&self) {
        let mut counter = self.counter.lock().await;
        *counter += 1;
        if *counter >= self.batch {
            info!(
                batch = self.batch,
                cooldown_secs = self.cooldown.as_secs(),
                "scrape batch limit reached, cooling down"
            );
            tokio::time::sleep(self.cooldown).await;
            *counter = 0;
        }
    }

    pub async fn pending(&self) -> u32 {
        *self.counter.lock().await
    }
}
