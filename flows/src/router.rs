//! Router adapter - host-agnostic navigation capability.
//!
//! The flow core never touches host navigation directly: it raises
//! navigation through [`navigate`], which applies the no-op guard, against
//! a [`FlowRouter`] capability implemented by the host (file-based router,
//! hash router, server-driven router).
//!
//! The host feeds back-navigation (`popstate` or equivalent) into the
//! machine as a `RouterSync` event - the single external-to-internal event
//! source.

use crate::config::FlowConfig;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Ordered query-string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pairs: Vec<(String, String)>,
}

impl SearchParams {
    /// Parse from a query string, with or without the leading `?`.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let trimmed = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(trimmed.as_bytes())
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        }
    }

    /// First value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Iterate over `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Serialize back into a query string (no leading `?`).
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

/// Host navigation capability.
///
/// Shared by reference with the machine; only the machine's own
/// `push`/`replace` calls write navigation state.
pub trait FlowRouter: Send + Sync {
    /// Current pathname.
    fn pathname(&self) -> String;

    /// Current query parameters.
    fn search_params(&self) -> SearchParams;

    /// Navigate, adding a history entry.
    fn push(&self, path: &str);

    /// Navigate, replacing the current history entry.
    fn replace(&self, path: &str);

    /// Navigate without notifying the host framework's data layer.
    fn shallow_push(&self, path: &str);

    /// Base path of the flow, derived by stripping the dynamic catch-all
    /// segments from the current pathname.
    fn inferred_base_path(&self) -> String;
}

/// How a navigation should manipulate history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// `push` - adds a history entry.
    Push,
    /// `replace` - replaces the current entry.
    Replace,
    /// `shallow_push` - adds an entry without host data-layer work.
    ShallowPush,
}

/// Navigate with the no-op guard.
///
/// When the resolved target equals the current pathname and `force` is not
/// set, no host call is made: redundant history entries and the event
/// storms they cause are the failure mode this guards against.
///
/// Returns whether a host navigation was performed.
pub fn navigate(router: &dyn FlowRouter, mode: NavigationMode, path: &str, force: bool) -> bool {
    if !force && router.pathname() == path {
        tracing::debug!(path, "navigation skipped, already at target");
        return false;
    }

    match mode {
        NavigationMode::Push => router.push(path),
        NavigationMode::Replace => router.replace(path),
        NavigationMode::ShallowPush => router.shallow_push(path),
    }

    true
}

/// Strip `catch_all_segments` trailing segments from a pathname.
///
/// Hosts with catch-all flow routes (e.g. `/sign-in/[[...rest]]`) use this
/// to compute the flow root regardless of the current sub-step.
#[must_use]
pub fn infer_base_path(pathname: &str, catch_all_segments: usize) -> String {
    let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
    let keep = segments.len().saturating_sub(catch_all_segments);

    if keep == 0 {
        return "/".to_string();
    }

    let mut base = String::new();
    for segment in &segments[..keep] {
        base.push('/');
        base.push_str(segment);
    }
    base
}

/// Per-machine navigation context.
///
/// A snapshot of where the flow is mounted; refreshed by `RouterSync`
/// events when the host navigates underneath the machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouterContext {
    /// Current pathname.
    pub pathname: String,

    /// Current query parameters.
    pub search_params: SearchParams,

    /// Flow root; sub-step paths are joined onto it.
    pub base_path: String,

    /// Sign-in flow base path, for cross-flow linking.
    pub sign_in_path: String,

    /// Sign-up flow base path, for cross-flow linking.
    pub sign_up_path: String,
}

impl RouterContext {
    /// Seed the context from the router capability and configuration.
    #[must_use]
    pub fn seed(router: &dyn FlowRouter, config: &FlowConfig) -> Self {
        Self {
            pathname: router.pathname(),
            search_params: router.search_params(),
            base_path: router.inferred_base_path(),
            sign_in_path: config.sign_in_path.clone(),
            sign_up_path: config.sign_up_path.clone(),
        }
    }

    /// Refresh pathname and query after host navigation.
    pub fn sync(&mut self, pathname: String, search_params: SearchParams) {
        self.pathname = pathname;
        self.search_params = search_params;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingRouter {
        pathname: String,
        calls: Mutex<usize>,
    }

    impl FlowRouter for CountingRouter {
        fn pathname(&self) -> String {
            self.pathname.clone()
        }

        fn search_params(&self) -> SearchParams {
            SearchParams::default()
        }

        fn push(&self, _path: &str) {
            *self.calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        }

        fn replace(&self, _path: &str) {
            *self.calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        }

        fn shallow_push(&self, _path: &str) {
            *self.calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        }

        fn inferred_base_path(&self) -> String {
            self.pathname.clone()
        }
    }

    #[test]
    fn same_path_push_is_a_no_op() {
        let router = CountingRouter {
            pathname: "/sign-in".to_string(),
            calls: Mutex::new(0),
        };

        let navigated = navigate(&router, NavigationMode::Push, "/sign-in", false);

        assert!(!navigated);
        assert_eq!(*router.calls.lock().unwrap_or_else(|e| e.into_inner()), 0);
    }

    #[test]
    fn force_overrides_the_guard() {
        let router = CountingRouter {
            pathname: "/sign-in".to_string(),
            calls: Mutex::new(0),
        };

        let navigated = navigate(&router, NavigationMode::Push, "/sign-in", true);

        assert!(navigated);
        assert_eq!(*router.calls.lock().unwrap_or_else(|e| e.into_inner()), 1);
    }

    #[test]
    fn different_path_navigates() {
        let router = CountingRouter {
            pathname: "/sign-in".to_string(),
            calls: Mutex::new(0),
        };

        assert!(navigate(
            &router,
            NavigationMode::Replace,
            "/sign-in/first-factor",
            false,
        ));
        assert_eq!(*router.calls.lock().unwrap_or_else(|e| e.into_inner()), 1);
    }

    #[test]
    fn search_params_parse_and_lookup() {
        let params = SearchParams::parse("?transfer=true&nonce=abc%20def");

        assert_eq!(params.get("transfer"), Some("true"));
        assert_eq!(params.get("nonce"), Some("abc def"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn base_path_inference_strips_catch_all_segments() {
        assert_eq!(infer_base_path("/sign-in/first-factor", 1), "/sign-in");
        assert_eq!(infer_base_path("/sign-in", 0), "/sign-in");
        assert_eq!(infer_base_path("/a", 2), "/");
    }
}
