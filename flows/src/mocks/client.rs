//! Scriptable mock resource client.

use crate::error::{FlowError, Result};
use crate::params::Params;
use crate::providers::{
    AttemptFirstFactorParams, AttemptSecondFactorParams, PrepareFirstFactorParams,
    PrepareSecondFactorParams, ReloadParams, SignInApi, SignUpApi,
};
use crate::resource::{SignInResource, SignUpResource};
use crate::strategy::Strategy;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    create_sign_in: VecDeque<Result<SignInResource>>,
    prepare_first_factor: VecDeque<Result<SignInResource>>,
    attempt_first_factor: VecDeque<Result<SignInResource>>,
    prepare_second_factor: VecDeque<Result<SignInResource>>,
    attempt_second_factor: VecDeque<Result<SignInResource>>,
    reload_sign_in: VecDeque<Result<SignInResource>>,
    create_sign_up: VecDeque<Result<SignUpResource>>,
    update_sign_up: VecDeque<Result<SignUpResource>>,
    prepare_verification: VecDeque<Result<SignUpResource>>,
    attempt_verification: VecDeque<Result<SignUpResource>>,
    reload_sign_up: VecDeque<Result<SignUpResource>>,
    calls: Vec<String>,
}

/// Mock resource client.
///
/// Responses are scripted per endpoint with the `expect_*` methods and
/// consumed in order; an unscripted call resolves to an `Unexpected`
/// error, which keeps tests honest about the calls they trigger.
#[derive(Clone, Default)]
pub struct MockResourceClient {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for MockResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockResourceClient")
            .field("calls", &self.lock().calls)
            .finish()
    }
}

impl MockResourceClient {
    /// Create a client with no scripted responses.
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

    fn take<T>(
        &self,
        call: String,
        pick: impl FnOnce(&mut Inner) -> &mut VecDeque<Result<T>>,
    ) -> Result<T> {
        let mut inner = self.lock();
        inner.calls.push(call.clone());
        pick(&mut inner)
            .pop_front()
            .unwrap_or_else(|| Err(FlowError::unexpected(format!("no scripted response for {call}"))))
    }

    /// Calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Script a `sign_in.create` response.
    pub fn expect_create_sign_in(&self, result: Result<SignInResource>) {
        self.lock().create_sign_in.push_back(result);
    }

    /// Script a `sign_in.prepare_first_factor` response.
    pub fn expect_prepare_first_factor(&self, result: Result<SignInResource>) {
        self.lock().prepare_first_factor.push_back(result);
    }

    /// Script a `sign_in.attempt_first_factor` response.
    pub fn expect_attempt_first_factor(&self, result: Result<SignInResource>) {
        self.lock().attempt_first_factor.push_back(result);
    }

    /// Script a `sign_in.prepare_second_factor` response.
    pub fn expect_prepare_second_factor(&self, result: Result<SignInResource>) {
        self.lock().prepare_second_factor.push_back(result);
    }

    /// Script a `sign_in.attempt_second_factor` response.
    pub fn expect_attempt_second_factor(&self, result: Result<SignInResource>) {
        self.lock().attempt_second_factor.push_back(result);
    }

    /// Script a `sign_in.reload` response.
    pub fn expect_reload_sign_in(&self, result: Result<SignInResource>) {
        self.lock().reload_sign_in.push_back(result);
    }

    /// Script a `sign_up.create` response.
    pub fn expect_create_sign_up(&self, result: Result<SignUpResource>) {
        self.lock().create_sign_up.push_back(result);
    }

    /// Script a `sign_up.update` response.
    pub fn expect_update_sign_up(&self, result: Result<SignUpResource>) {
        self.lock().update_sign_up.push_back(result);
    }

    /// Script a `sign_up.prepare_verification` response.
    pub fn expect_prepare_verification(&self, result: Result<SignUpResource>) {
        self.lock().prepare_verification.push_back(result);
    }

    /// Script a `sign_up.attempt_verification` response.
    pub fn expect_attempt_verification(&self, result: Result<SignUpResource>) {
        self.lock().attempt_verification.push_back(result);
    }

    /// Script a `sign_up.reload` response.
    pub fn expect_reload_sign_up(&self, result: Result<SignUpResource>) {
        self.lock().reload_sign_up.push_back(result);
    }
}

impl SignInApi for MockResourceClient {
    fn create(&self, params: Params) -> impl Future<Output = Result<SignInResource>> + Send {
        let keys: Vec<&String> = params.keys().collect();
        let result = self.take(format!("sign_in.create({keys:?})"), |inner| {
            &mut inner.create_sign_in
        });
        async move { result }
    }

    fn prepare_first_factor(
        &self,
        params: PrepareFirstFactorParams,
    ) -> impl Future<Output = Result<SignInResource>> + Send {
        let result = self.take(
            format!("sign_in.prepare_first_factor({})", params.strategy()),
            |inner| &mut inner.prepare_first_factor,
        );
        async move { result }
    }

    fn attempt_first_factor(
        &self,
        params: AttemptFirstFactorParams,
    ) -> impl Future<Output = Result<SignInResource>> + Send {
        let result = self.take(
            format!("sign_in.attempt_first_factor({})", params.strategy()),
            |inner| &mut inner.attempt_first_factor,
        );
        async move { result }
    }

    fn prepare_second_factor(
        &self,
        params: PrepareSecondFactorParams,
    ) -> impl Future<Output = Result<SignInResource>> + Send {
        let result = self.take(
            format!("sign_in.prepare_second_factor({})", params.strategy()),
            |inner| &mut inner.prepare_second_factor,
        );
        async move { result }
    }

    fn attempt_second_factor(
        &self,
        params: AttemptSecondFactorParams,
    ) -> impl Future<Output = Result<SignInResource>> + Send {
        let result = self.take(
            format!("sign_in.attempt_second_factor({})", params.strategy()),
            |inner| &mut inner.attempt_second_factor,
        );
        async move { result }
    }

    fn reload(&self, params: ReloadParams) -> impl Future<Output = Result<SignInResource>> + Send {
        let nonce = params.rotating_token_nonce.unwrap_or_default();
        let result = self.take(format!("sign_in.reload({nonce})"), |inner| {
            &mut inner.reload_sign_in
        });
        async move { result }
    }
}

impl SignUpApi for MockResourceClient {
    fn create(&self, params: Params) -> impl Future<Output = Result<SignUpResource>> + Send {
        let keys: Vec<&String> = params.keys().collect();
        let result = self.take(format!("sign_up.create({keys:?})"), |inner| {
            &mut inner.create_sign_up
        });
        async move { result }
    }

    fn update(&self, params: Params) -> impl Future<Output = Result<SignUpResource>> + Send {
        let keys: Vec<&String> = params.keys().collect();
        let result = self.take(format!("sign_up.update({keys:?})"), |inner| {
            &mut inner.update_sign_up
        });
        async move { result }
    }

    fn prepare_verification(
        &self,
        strategy: Strategy,
    ) -> impl Future<Output = Result<SignUpResource>> + Send {
        let result = self.take(format!("sign_up.prepare_verification({strategy})"), |inner| {
            &mut inner.prepare_verification
        });
        async move { result }
    }

    fn attempt_verification(
        &self,
        strategy: Strategy,
        code: String,
    ) -> impl Future<Output = Result<SignUpResource>> + Send {
        let result = self.take(
            format!("sign_up.attempt_verification({strategy}, {code})"),
            |inner| &mut inner.attempt_verification,
        );
        async move { result }
    }

    fn reload(&self) -> impl Future<Output = Result<SignUpResource>> + Send {
        let result = self.take("sign_up.reload".to_string(), |inner| {
            &mut inner.reload_sign_up
        });
        async move { result }
    }
}
