//! Retrying operation executor.
//!
//! Every remote call made on behalf of a batch goes through
//! [`Executor::run`]. Each attempt is bounded by the policy deadline, failures
//! are classified and waited out, and the stop flag is checked before every
//! attempt so a batch can be aborted within one retry cycle.

use crate::control::BatchControl;
use crate::error::{ErrorKind, Result};
use crate::policy::{Failure, RetryPolicy};
use exn::ResultExt;
use shelfcast_transport::error::Result as TransportResult;
use shelfcast_transport::{ChatId, MessengerHandle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until, timeout};

pub struct Executor {
    policy: RetryPolicy,
    control: Arc<BatchControl>,
    messenger: MessengerHandle,
}

impl Executor {
    pub fn new(policy: RetryPolicy, control: Arc<BatchControl>, messenger: MessengerHandle) -> Self {
        Self {
            policy,
            control,
            messenger,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn control(&self) -> &Arc<BatchControl> {
        &self.control
    }

    /// Run `op` until it succeeds, fails in a way that can't be retried, or
    /// runs out of attempts.
    ///
    /// Returns `Ok(None)` if the stop flag was seen before an attempt. When
    /// `notify` is given, rate-limit waits are announced there with a live
    /// countdown.
    pub async fn run<T, F, Fut>(&self, label: &str, notify: Option<&ChatId>, mut op: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = TransportResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        let mut rate_limited = false;
        loop {
            if self.control.stop.is_set() {
                tracing::info!(%label, attempt, "Stop flag set; abandoning call");
                return Ok(None);
            }
            attempt += 1;

            let (failure, cause) = match timeout(self.policy.deadline, op()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        tracing::info!(%label, retries = attempt - 1, "Recovered after retrying");
                        self.control.retry.mark_recovered(attempt - 1);
                        if rate_limited {
                            self.control.retry.mark_rate_limited();
                        }
                    }
                    return Ok(Some(value));
                },
                Ok(Err(err)) => match Failure::classify(&err) {
                    Some(failure) => (failure, Some(err)),
                    None => {
                        tracing::error!(%label, attempt, error = %err, "Unclassified failure; not retrying");
                        return Err(err).or_raise(|| ErrorKind::Unclassified { attempts: attempt });
                    },
                },
                Err(_) => (Failure::Timeout, None),
            };

            if attempt >= self.policy.max_attempts {
                tracing::error!(%label, attempts = attempt, %failure, "Giving up");
                let exhausted = || ErrorKind::Exhausted {
                    failure,
                    attempts: attempt,
                };
                return match cause {
                    Some(err) => Err(err).or_raise(exhausted),
                    None => Err(exn::Exn::from(exhausted())),
                };
            }

            let delay = self.policy.delay_for(failure, attempt);
            tracing::warn!(
                %label,
                attempt,
                max_attempts = self.policy.max_attempts,
                %failure,
                delay_ms = delay.as_millis() as u64,
                "Call failed; retrying"
            );
            match (failure, notify) {
                (Failure::RateLimited(_), Some(chat)) => {
                    rate_limited = true;
                    self.countdown(chat, delay).await;
                },
                (Failure::RateLimited(_), None) => {
                    rate_limited = true;
                    sleep(delay).await;
                },
                _ => sleep(delay).await,
            }
        }
    }

    /// Wait out `wait`, keeping a message in `chat` updated with the time
    /// left. The first failed edit ends the updates, not the wait: editing
    /// harder while rate limited would only extend the limit.
    async fn countdown(&self, chat: &ChatId, wait: Duration) {
        let until = Instant::now() + wait;
        let message = match self.messenger.send_message(chat, &countdown_text(wait), None).await {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Couldn't announce rate limit");
                sleep_until(until).await;
                return;
            },
        };
        loop {
            let left = until.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            sleep(left.min(self.policy.countdown_interval)).await;
            let left = until.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            if let Err(e) = self.messenger.edit_message(chat, message, &countdown_text(left), None).await {
                tracing::debug!(error = %e, "Countdown edit failed; waiting silently");
                sleep_until(until).await;
                break;
            }
        }
    }
}

fn countdown_text(left: Duration) -> String {
    let seconds = left.as_secs() + u64::from(left.subsec_nanos() > 0);
    format!("Rate limited by the server. Retrying in {seconds}s...")
}
