//! Fixed-interval polling policy with jitter.
//!
//! Used for background staleness checks (e.g. waiting for an email link to
//! be confirmed out-of-band). The interval is fixed rather than backing
//! off: the caller is waiting for an external party, not retrying a
//! failure. Jitter spreads many idle tabs apart so they do not reload in
//! lock-step.
//!
//! # Example
//!
//! ```rust
//! use authflow_runtime::poll::PollPolicy;
//! use std::time::Duration;
//!
//! let policy = PollPolicy::builder()
//!     .interval(Duration::from_secs(300))
//!     .jitter(0.1)
//!     .build();
//!
//! let delay = policy.next_delay();
//! assert!(delay >= Duration::from_secs(270));
//! assert!(delay <= Duration::from_secs(330));
//! ```

use std::time::Duration;

/// Polling policy configuration.
///
/// # Default Values
///
/// - `interval`: 300 seconds (five minutes)
/// - `jitter`: 0.1 (±10 %)
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Base interval between polls.
    pub interval: Duration,
    /// Jitter fraction applied around the interval (0.0 disables jitter).
    pub jitter: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            jitter: 0.1,
        }
    }
}

impl PollPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> PollPolicyBuilder {
        PollPolicyBuilder {
            interval: None,
            jitter: None,
        }
    }

    /// Calculate the delay until the next poll.
    ///
    /// Returns `interval * (1 ± jitter)`, sampled uniformly.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.jitter <= 0.0 {
            return self.interval;
        }

        use rand::Rng;

        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        let secs = self.interval.as_secs_f64() * (1.0 + spread);

        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Builder for [`PollPolicy`].
#[derive(Debug, Clone)]
pub struct PollPolicyBuilder {
    interval: Option<Duration>,
    jitter: Option<f64>,
}

impl PollPolicyBuilder {
    /// Set the base interval between polls.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Set the jitter fraction (0.0 disables jitter).
    #[must_use]
    pub const fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Build the [`PollPolicy`].
    #[must_use]
    pub fn build(self) -> PollPolicy {
        let defaults = PollPolicy::default();
        PollPolicy {
            interval: self.interval.unwrap_or(defaults.interval),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}
