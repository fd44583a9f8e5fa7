//! # Authflow Testing
//!
//! Testing utilities and helpers for the Authflow architecture.
//!
//! This crate provides:
//! - The [`ReducerTest`] Given-When-Then harness for unit-testing
//!   reducers without a runtime
//! - Assertion helpers for effect vectors
//! - A deterministic test clock
//!
//! ## Example
//!
//! ```ignore
//! use authflow_testing::ReducerTest;
//!
//! ReducerTest::new(MyReducer)
//!     .with_env(test_environment())
//!     .given_state(MyState::default())
//!     .when_action(MyEvent::Submit)
//!     .then_state(|state| assert!(state.loading))
//!     .then_effects(assertions::assert_has_future_effect)
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use authflow_core::environment::Clock;

mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

/// Initialize compact logging for a test binary.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Honors `RUST_LOG`.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .compact()
        .try_init();
}

/// Clock that always reports the same instant.
///
/// Use when reducer logic compares against "now" and the test needs a
/// stable answer.
#[derive(Debug, Clone, Copy)]
pub struct TestClock {
    instant: DateTime<Utc>,
}

impl TestClock {
    /// Clock fixed at `instant`.
    #[must_use]
    pub const fn at(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_stable() {
        let instant = Utc::now();
        let clock = TestClock::at(instant);

        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), clock.now());
    }
}
