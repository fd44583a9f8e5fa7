//! Flow configuration.
//!
//! One value constructed at mount time and shared read-only through the
//! environment. Defaults match the hosted instance defaults; everything is
//! overridable with the `with_*` builders.

use crate::matcher::PreferredStrategy;
use std::time::Duration;

/// Configuration for one flow instance.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Interval between background reloads while waiting for an email link
    /// to be confirmed out-of-band.
    pub email_link_poll_interval: Duration,

    /// Jitter fraction applied to the poll interval.
    pub poll_jitter: f64,

    /// Minimum time between code resends for one factor.
    pub resend_cooldown: chrono::Duration,

    /// Base path of the sign-in flow.
    pub sign_in_path: String,

    /// Base path of the sign-up flow.
    pub sign_up_path: String,

    /// Destination after a completed sign-in.
    pub after_sign_in_path: String,

    /// Destination after a completed sign-up.
    pub after_sign_up_path: String,

    /// Which first-factor family to lead with.
    pub preferred_strategy: PreferredStrategy,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            email_link_poll_interval: Duration::from_secs(300),
            poll_jitter: 0.1,
            resend_cooldown: chrono::Duration::seconds(30),
            sign_in_path: "/sign-in".to_string(),
            sign_up_path: "/sign-up".to_string(),
            after_sign_in_path: "/".to_string(),
            after_sign_up_path: "/".to_string(),
            preferred_strategy: PreferredStrategy::Otp,
        }
    }
}

impl FlowConfig {
    /// Set the email-link poll interval.
    #[must_use]
    pub const fn with_email_link_poll_interval(mut self, interval: Duration) -> Self {
        self.email_link_poll_interval = interval;
        self
    }

    /// Set the poll jitter fraction.
    #[must_use]
    pub const fn with_poll_jitter(mut self, jitter: f64) -> Self {
        self.poll_jitter = jitter;
        self
    }

    /// Set the resend cool-down.
    #[must_use]
    pub const fn with_resend_cooldown(mut self, cooldown: chrono::Duration) -> Self {
        self.resend_cooldown = cooldown;
        self
    }

    /// Set the sign-in base path.
    #[must_use]
    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    /// Set the sign-up base path.
    #[must_use]
    pub fn with_sign_up_path(mut self, path: impl Into<String>) -> Self {
        self.sign_up_path = path.into();
        self
    }

    /// Set the after-sign-in destination.
    #[must_use]
    pub fn with_after_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.after_sign_in_path = path.into();
        self
    }

    /// Set the after-sign-up destination.
    #[must_use]
    pub fn with_after_sign_up_path(mut self, path: impl Into<String>) -> Self {
        self.after_sign_up_path = path.into();
        self
    }

    /// Set the preferred first-factor family.
    #[must_use]
    pub const fn with_preferred_strategy(mut self, preferred: PreferredStrategy) -> Self {
        self.preferred_strategy = preferred;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.email_link_poll_interval, Duration::from_secs(300));
        assert_eq!(config.sign_in_path, "/sign-in");
        assert_eq!(config.preferred_strategy, PreferredStrategy::Otp);
    }

    #[test]
    fn builders_override_fields() {
        let config = FlowConfig::default()
            .with_sign_in_path("/auth/login")
            .with_email_link_poll_interval(Duration::from_secs(60))
            .with_preferred_strategy(PreferredStrategy::Password);

        assert_eq!(config.sign_in_path, "/auth/login");
        assert_eq!(config.email_link_poll_interval, Duration::from_secs(60));
        assert_eq!(config.preferred_strategy, PreferredStrategy::Password);
    }
}
