//! Recording mock router.

use crate::router::{FlowRouter, NavigationMode, SearchParams};
use std::sync::{Arc, Mutex, MutexGuard};

struct Inner {
    pathname: String,
    query: String,
    base: String,
    history: Vec<(NavigationMode, String)>,
}

/// Mock router.
///
/// Applies navigation to an in-memory pathname and records every host
/// call, so tests can assert both the final location and how many
/// navigations actually happened (the no-op guard).
#[derive(Clone)]
pub struct MockRouter {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for MockRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MockRouter")
            .field("pathname", &inner.pathname)
            .field("history", &inner.history.len())
            .finish()
    }
}

impl MockRouter {
    /// Router currently at `path`, with `path` as the inferred base.
    #[must_use]
    pub fn at(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pathname: path.clone(),
                query: String::new(),
                base: path,
                history: Vec::new(),
            })),
        }
    }

    /// Set the current query string.
    #[must_use]
    pub fn with_query(self, query: impl Into<String>) -> Self {
        self.lock().query = query.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record(&self, mode: NavigationMode, path: &str) {
        let mut inner = self.lock();
        inner.pathname = path.to_string();
        inner.history.push((mode, path.to_string()));
    }

    /// All host navigations performed, in order.
    #[must_use]
    pub fn history(&self) -> Vec<(NavigationMode, String)> {
        self.lock().history.clone()
    }

    /// Number of host navigations performed.
    #[must_use]
    pub fn navigation_count(&self) -> usize {
        self.lock().history.len()
    }

    /// Simulate host back-navigation to a path.
    pub fn set_location(&self, pathname: impl Into<String>, query: impl Into<String>) {
        let mut inner = self.lock();
        inner.pathname = pathname.into();
        inner.query = query.into();
    }
}

impl FlowRouter for MockRouter {
    fn pathname(&self) -> String {
        self.lock().pathname.clone()
    }

    fn search_params(&self) -> SearchParams {
        SearchParams::parse(&self.lock().query)
    }

    fn push(&self, path: &str) {
        self.record(NavigationMode::Push, path);
    }

    fn replace(&self, path: &str) {
        self.record(NavigationMode::Replace, path);
    }

    fn shallow_push(&self, path: &str) {
        self.record(NavigationMode::ShallowPush, path);
    }

    fn inferred_base_path(&self) -> String {
        self.lock().base.clone()
    }
}
