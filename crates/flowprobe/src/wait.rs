//! Wait/poll engine
//!
//! The single polling primitive every flow step goes through. A condition is
//! evaluated at least once; while it is not satisfied the engine sleeps for
//! `min(poll_interval, remaining budget)` and tries again. Transient errors
//! ([`ProbeError::is_transient`]) count as "not yet", everything else
//! propagates at once. When the budget runs out the engine raises
//! [`ProbeError::Timeout`] carrying the last observation and URL.
//!
//! Time is measured with [`tokio::time::Instant`], so tests can run the
//! engine on a paused clock.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::condition::{Condition, Outcome};
use crate::error::{ProbeError, ProbeResult};
use crate::session::Session;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (15 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 15_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration (never zero)
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Poll `condition` until it holds or the budget in `options` runs out.
pub async fn wait_until<C>(
    session: &Session,
    condition: &C,
    options: &WaitOptions,
) -> ProbeResult<C::Output>
where
    C: Condition + ?Sized,
{
    let start = Instant::now();
    let deadline = start + options.timeout();
    let poll = options.poll_interval();
    let mut last_observed = String::from("never evaluated");
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match condition.check(session).await {
            Ok(Outcome::Satisfied(value)) => {
                debug!(
                    condition = %condition.description(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    attempts,
                    "condition satisfied"
                );
                return Ok(value);
            }
            Ok(Outcome::NotYetSatisfied(observed)) => last_observed = observed,
            Err(e) if e.is_transient() => {
                trace!(error = %e, "transient error while polling");
                last_observed = e.to_string();
            }
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
    }

    let last_url = session.current_url().await.ok();
    debug!(
        condition = %condition.description(),
        timeout_ms = options.timeout_ms,
        attempts,
        "condition timed out"
    );
    Err(ProbeError::Timeout {
        description: condition.description(),
        timeout_ms: options.timeout_ms,
        last_observed,
        last_url,
    })
}

/// Carries default wait options so call sites need not repeat them
#[derive(Debug, Clone, Copy, Default)]
pub struct Waiter {
    options: WaitOptions,
}

impl Waiter {
    /// Create a waiter with default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom options
    #[must_use]
    pub const fn with_options(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Default options
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Wait with the default budget
    pub async fn until<C>(&self, session: &Session, condition: &C) -> ProbeResult<C::Output>
    where
        C: Condition + ?Sized,
    {
        wait_until(session, condition, &self.options).await
    }

    /// Wait with a one-off budget, keeping the default poll interval
    pub async fn until_within<C>(
        &self,
        session: &Session,
        condition: &C,
        timeout_ms: u64,
    ) -> ProbeResult<C::Output>
    where
        C: Condition + ?Sized,
    {
        let options = self.options.with_timeout(timeout_ms);
        wait_until(session, condition, &options).await
    }
}
