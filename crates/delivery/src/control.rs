//! Batch control shared between the executor, the pipeline and whoever can
//! stop a batch.
//!
//! There is one [`BatchControl`] per process, passed around explicitly. Only
//! one batch is expected to run at a time: two concurrent batches would see
//! each other's retry bookkeeping and pace themselves wrongly.

use shelfcast_transport::UserId;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct BatchControl {
    pub retry: RetryState,
    pub stop: StopSignal,
}

/// Point-in-time copy of [`RetryState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySnapshot {
    pub after_retry: bool,
    pub retry_count: u32,
    pub just_retried: bool,
}

/// What the last remote call went through before it succeeded.
///
/// Written by the executor on recovery and consumed (read-and-clear) by the
/// pipeline to slow down the next item.
#[derive(Debug, Default)]
pub struct RetryState {
    after_retry: AtomicBool,
    retry_count: AtomicU32,
    just_retried: AtomicBool,
}

impl RetryState {
    /// Forget everything; called at the start of every batch.
    pub fn reset(&self) {
        self.after_retry.store(false, Ordering::SeqCst);
        self.retry_count.store(0, Ordering::SeqCst);
        self.just_retried.store(false, Ordering::SeqCst);
    }

    /// A call succeeded after `retries` failed attempts.
    pub fn mark_recovered(&self, retries: u32) {
        self.retry_count.store(retries, Ordering::SeqCst);
        self.after_retry.store(true, Ordering::SeqCst);
    }

    /// The recovery included waiting out a rate limit.
    pub fn mark_rate_limited(&self) {
        self.just_retried.store(true, Ordering::SeqCst);
    }

    pub fn take_just_retried(&self) -> bool {
        self.just_retried.swap(false, Ordering::SeqCst)
    }

    /// The retry count of the last recovery, if one hasn't been consumed yet.
    pub fn take_after_retry(&self) -> Option<u32> {
        self.after_retry
            .swap(false, Ordering::SeqCst)
            .then(|| self.retry_count.load(Ordering::SeqCst))
    }

    pub fn snapshot(&self) -> RetrySnapshot {
        RetrySnapshot {
            after_retry: self.after_retry.load(Ordering::SeqCst),
            retry_count: self.retry_count.load(Ordering::SeqCst),
            just_retried: self.just_retried.load(Ordering::SeqCst),
        }
    }
}

/// Result of [`StopSignal::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// The flag is now set. `newly` is false if it already was.
    Granted { newly: bool },
    /// Someone else holds the stop privilege.
    Refused { operator: UserId },
}

/// Terminal, process-wide stop flag.
///
/// The first user ever to ask for a stop becomes the only one allowed to.
/// Once set it is never cleared.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    operator: OnceLock<UserId>,
}

impl StopSignal {
    pub fn is_set(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn operator(&self) -> Option<UserId> {
        self.operator.get().copied()
    }

    pub fn request(&self, user: UserId) -> StopRequest {
        let operator = *self.operator.get_or_init(|| user);
        if operator != user {
            tracing::warn!(%user, %operator, "Stop refused");
            return StopRequest::Refused { operator };
        }
        let newly = !self.stopped.swap(true, Ordering::SeqCst);
        if newly {
            tracing::info!(%user, "Stop requested");
        }
        StopRequest::Granted { newly }
    }
}
