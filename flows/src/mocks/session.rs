//! Recording mock session activator.

use crate::error::{FlowError, Result};
use crate::providers::SessionActivator;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    activated: Vec<String>,
    failures: VecDeque<FlowError>,
}

/// Mock session activator.
#[derive(Clone, Default)]
pub struct MockSessions {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for MockSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSessions")
            .field("activated", &self.lock().activated)
            .finish()
    }
}

impl MockSessions {
    /// Create a session activator that accepts every hand-off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make the next activation fail with `error`.
    pub fn fail_next(&self, error: FlowError) {
        self.lock().failures.push_back(error);
    }

    /// Session ids handed off so far, in order.
    #[must_use]
    pub fn activated(&self) -> Vec<String> {
        self.lock().activated.clone()
    }
}

impl SessionActivator for MockSessions {
    fn set_active(&self, session_id: String) -> impl Future<Output = Result<()>> + Send {
        let result = {
            let mut inner = self.lock();
            match inner.failures.pop_front() {
                Some(error) => Err(error),
                None => {
                    inner.activated.push(session_id);
                    Ok(())
                },
            }
        };
        async move { result }
    }
}
