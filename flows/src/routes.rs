//! Route tags and step-path resolution.
//!
//! Each logical step of a flow is a route tag. Declarative UI asks the
//! machine which tag is active and renders exactly that step; sub-paths
//! are resolved against the flow's inferred base path.

use serde::{Deserialize, Serialize};

/// Sign-in flow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignInRoute {
    /// Identifier collection.
    #[default]
    Start,
    /// Alternative-method picker.
    ChooseStrategy,
    /// First-factor verification.
    FirstFactor,
    /// Second-factor verification.
    SecondFactor,
    /// Password reset (request and set-new-password steps).
    ForgotPassword,
    /// Return leg of an `OAuth`/`SSO` redirect.
    Callback,
    /// Unrecoverable-error display.
    Error,
}

impl SignInRoute {
    /// Sub-path under the flow base; `None` renders in place.
    #[must_use]
    pub const fn sub_path(&self) -> Option<&'static str> {
        match self {
            Self::Start => Some(""),
            Self::ChooseStrategy => Some("choose-strategy"),
            Self::FirstFactor => Some("first-factor"),
            Self::SecondFactor => Some("second-factor"),
            Self::ForgotPassword => Some("forgot-password"),
            Self::Callback => Some("sso-callback"),
            Self::Error => None,
        }
    }

    /// Absolute path of the step under `base`, if it has one.
    #[must_use]
    pub fn path(&self, base: &str) -> Option<String> {
        self.sub_path().map(|sub| join(base, sub))
    }

    /// Resolve a pathname back into a step.
    #[must_use]
    pub fn for_path(base: &str, pathname: &str) -> Option<Self> {
        let routes = [
            Self::ChooseStrategy,
            Self::FirstFactor,
            Self::SecondFactor,
            Self::ForgotPassword,
            Self::Callback,
            Self::Start,
        ];
        routes
            .into_iter()
            .find(|route| route.path(base).as_deref() == Some(pathname))
    }
}

/// Sign-up flow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignUpRoute {
    /// Initial field collection.
    #[default]
    Start,
    /// Collection of remaining required fields.
    Continue,
    /// Field verification (email code, email link, phone code).
    Verification,
    /// Return leg of an `OAuth`/`SSO` redirect.
    Callback,
    /// Unrecoverable-error display.
    Error,
}

impl SignUpRoute {
    /// Sub-path under the flow base; `None` renders in place.
    #[must_use]
    pub const fn sub_path(&self) -> Option<&'static str> {
        match self {
            Self::Start => Some(""),
            Self::Continue => Some("continue"),
            Self::Verification => Some("verify"),
            Self::Callback => Some("sso-callback"),
            Self::Error => None,
        }
    }

    /// Absolute path of the step under `base`, if it has one.
    #[must_use]
    pub fn path(&self, base: &str) -> Option<String> {
        self.sub_path().map(|sub| join(base, sub))
    }

    /// Resolve a pathname back into a step.
    #[must_use]
    pub fn for_path(base: &str, pathname: &str) -> Option<Self> {
        let routes = [
            Self::Continue,
            Self::Verification,
            Self::Callback,
            Self::Start,
        ];
        routes
            .into_iter()
            .find(|route| route.path(base).as_deref() == Some(pathname))
    }
}

/// Join a sub-path onto a base path.
fn join(base: &str, sub: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if sub.is_empty() {
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        format!("{trimmed}/{sub}")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_paths_resolve_under_base() {
        assert_eq!(
            SignInRoute::Start.path("/sign-in"),
            Some("/sign-in".to_string())
        );
        assert_eq!(
            SignInRoute::FirstFactor.path("/sign-in"),
            Some("/sign-in/first-factor".to_string())
        );
        assert_eq!(SignInRoute::Error.path("/sign-in"), None);
    }

    #[test]
    fn paths_round_trip_to_routes() {
        for route in [
            SignInRoute::Start,
            SignInRoute::ChooseStrategy,
            SignInRoute::FirstFactor,
            SignInRoute::SecondFactor,
            SignInRoute::ForgotPassword,
            SignInRoute::Callback,
        ] {
            let path = route.path("/sign-in").expect("routable step");
            assert_eq!(SignInRoute::for_path("/sign-in", &path), Some(route));
        }
    }

    #[test]
    fn sign_up_paths_round_trip() {
        for route in [
            SignUpRoute::Start,
            SignUpRoute::Continue,
            SignUpRoute::Verification,
            SignUpRoute::Callback,
        ] {
            let path = route.path("/sign-up").expect("routable step");
            assert_eq!(SignUpRoute::for_path("/sign-up", &path), Some(route));
        }
    }

    #[test]
    fn unknown_path_resolves_to_none() {
        assert_eq!(SignInRoute::for_path("/sign-in", "/other"), None);
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        assert_eq!(
            SignInRoute::FirstFactor.path("/sign-in/"),
            Some("/sign-in/first-factor".to_string())
        );
    }
}
