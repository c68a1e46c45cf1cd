//! Fixed-interval polling against eventually consistent workflow state.
//!
//! Every status loop in the client is a configuration of [`poll_until`]: a
//! fixed interval, an attempt ceiling and a closure that inspects one status
//! response. There is no backoff; the loop exists to wait for the backend, not
//! to recover from failures.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{GardenerError, Result};

/// Async sleep abstraction so poll loops can run without real delays in tests.
pub trait Sleeper {
    /// Sleep for the given duration.
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Tokio-backed sleeper used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Interval and attempt budget for one kind of status loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status requests.
    pub interval: Duration,
    /// Maximum number of status requests before timing out.
    pub max_attempts: u32,
    /// Wait one interval before the first request.
    pub sleep_first: bool,
}

impl PollPolicy {
    /// Batch analysis: query straight away, then every two seconds.
    pub const BATCH: Self = Self {
        interval: Duration::from_secs(2),
        max_attempts: 90,
        sleep_first: false,
    };
    /// Single repository analysis.
    pub const SINGLE_ANALYSIS: Self = Self {
        interval: Duration::from_secs(1),
        max_attempts: 30,
        sleep_first: true,
    };
    /// Waiting for a remediation pull request URL.
    pub const FIX_URL: Self = Self {
        interval: Duration::from_secs(1),
        max_attempts: 60,
        sleep_first: true,
    };
    /// Waiting for generated draft files.
    pub const DRAFT: Self = Self {
        interval: Duration::from_secs(1),
        max_attempts: 90,
        sleep_first: true,
    };
    /// Portfolio generation.
    pub const PORTFOLIO: Self = Self {
        interval: Duration::from_secs(2),
        max_attempts: 150,
        sleep_first: false,
    };
}

/// Handle that abandons a poll sequence.
///
/// Cloned handles share state; cancelling any clone stops every loop that
/// observes it before its next request.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a fresh, uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every poll loop observing this handle.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Drive `future` to completion unless cancellation is requested first.
    ///
    /// The in-flight future is dropped on cancellation, abandoning its request.
    pub async fn until_cancelled<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(GardenerError::Cancelled),
            result = future => result,
        }
    }
}

/// Poll until `attempt` yields a terminal value or the budget runs out.
///
/// `attempt` receives the 1-based attempt number and returns `Ok(Some(_))`
/// when done, `Ok(None)` to keep waiting. Errors that are fatal for polling
/// (see [`GardenerError::is_fatal_for_polling`]) abort immediately; anything
/// else is logged and counts as a spent attempt.
pub async fn poll_until<T, S, F, Fut>(
    operation: &'static str,
    policy: PollPolicy,
    sleeper: &S,
    cancel: &CancelHandle,
    mut attempt: F,
) -> Result<T>
where
    S: Sleeper + ?Sized,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for number in 1..=policy.max_attempts {
        if number > 1 || policy.sleep_first {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GardenerError::Cancelled),
                _ = sleeper.sleep(policy.interval) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(GardenerError::Cancelled);
        }

        log::debug!("{operation}: attempt {number}/{}", policy.max_attempts);
        match cancel.until_cancelled(attempt(number)).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) if err.is_fatal_for_polling() => return Err(err),
            Err(err) => log::warn!("{operation}: polling error on attempt {number}: {err}"),
        }
    }

    Err(GardenerError::Timeout {
        operation,
        attempts: policy.max_attempts,
    })
}
