use crate::config;
use crate::error::{RetryError, TransportError};

use futures::future::BoxFuture;
use log::{debug, warn};
use std::io::Write;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Print a dot to stdout for every failed attempt.
    pub progress: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
            progress: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl From<&config::Retry> for RetryPolicy {
    fn from(config: &config::Retry) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.delay,
            progress: config.progress,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    pub total: u64,
    pub errors: u64,
}

impl CallStats {
    /// Percentage of attempts that failed, rounded down.
    pub fn error_rate(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.errors * 100 / self.total
        }
    }
}

/// Runs fallible reads under a [`RetryPolicy`] and keeps attempt counters
/// across all calls made through it.
#[derive(Debug)]
pub struct Retrier {
    policy: RetryPolicy,
    stats: CallStats,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            stats: CallStats::default(),
        }
    }

    pub fn stats(&self) -> CallStats {
        self.stats
    }

    pub fn error_rate(&self) -> u64 {
        self.stats.error_rate()
    }

    /// Attempt `op` against `target` until it succeeds or the policy's
    /// attempts are used up. Attempts are strictly sequential.
    pub async fn call<S, T, F>(&mut self, target: &mut S, mut op: F) -> Result<T, RetryError>
    where
        S: ?Sized + Send,
        F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<T, TransportError>>,
    {
        let mut attempts = 0;
        let mut dots = false;

        let last = loop {
            attempts += 1;
            self.stats.total += 1;

            let err = match op(&mut *target).await {
                Ok(value) => {
                    if dots {
                        println!();
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            self.stats.errors += 1;
            debug!("attempt {}/{} failed: {}", attempts, self.policy.max_attempts, err);

            if self.policy.progress {
                print!(".");
                let _ = std::io::stdout().flush();
                dots = true;
            }

            if attempts >= self.policy.max_attempts {
                break err;
            }

            if !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        };

        if dots {
            println!();
        }
        warn!("Last exception message: {}", last);
        warn!("Error rate: {}%", self.stats.error_rate());

        Err(RetryError::Exhausted { attempts, last })
    }
}
