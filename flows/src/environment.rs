//! Flow environments.
//!
//! [`FlowEnvironment`] is the dependency set injected into the router
//! machines. [`VerificationEnvironment`] is the narrowed capability set a
//! verification sub-machine runs against: prepare/attempt/reload closures
//! that already know which factor and which flow they serve, so the
//! sub-machine itself stays generic over sign-in and sign-up.

use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::form::FormStore;
use crate::providers::{
    AttemptFirstFactorParams, AttemptSecondFactorParams, Platform, PrepareFirstFactorParams,
    PrepareSecondFactorParams, ReloadParams, SessionActivator, SignInApi, SignUpApi,
};
use crate::resource::{Factor, ResourceEnvelope};
use crate::router::FlowRouter;
use crate::strategy::Strategy;
use authflow_core::environment::Clock;
use authflow_runtime::poll::PollPolicy;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Dependencies injected into the sign-in and sign-up router machines.
///
/// # Type Parameters
///
/// - `C`: resource client (bound to [`SignInApi`] or [`SignUpApi`] by the
///   reducer using it)
/// - `S`: session activator
/// - `R`: host router capability
/// - `P`: platform capability probe
#[derive(Clone)]
pub struct FlowEnvironment<C, S, R, P>
where
    C: Clone,
    S: SessionActivator + Clone,
    R: FlowRouter + Clone,
    P: Platform + Clone,
{
    /// Resource client for the identity backend.
    pub client: C,

    /// Session-activation collaborator.
    pub sessions: S,

    /// Host router capability (referenced, not owned).
    pub router: R,

    /// Platform capability probe.
    pub platform: P,

    /// Form store owned by this flow instance.
    pub form: FormStore,

    /// Clock, injectable for deterministic tests.
    pub clock: Arc<dyn Clock>,

    /// Flow configuration.
    pub config: FlowConfig,
}

impl<C, S, R, P> FlowEnvironment<C, S, R, P>
where
    C: Clone,
    S: SessionActivator + Clone,
    R: FlowRouter + Clone,
    P: Platform + Clone,
{
    /// Create a new flow environment.
    #[must_use]
    pub fn new(
        client: C,
        sessions: S,
        router: R,
        platform: P,
        form: FormStore,
        clock: Arc<dyn Clock>,
        config: FlowConfig,
    ) -> Self {
        Self {
            client,
            sessions,
            router,
            platform,
            form,
            clock,
            config,
        }
    }
}

/// A parameterless async capability returning a resource snapshot.
pub type VerificationCall =
    Arc<dyn Fn() -> BoxFuture<'static, Result<ResourceEnvelope>> + Send + Sync>;

/// An async capability verifying an entered secret.
pub type VerificationAttempt =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<ResourceEnvelope>> + Send + Sync>;

/// Dependencies of one verification sub-machine.
///
/// The closures close over the concrete client and factor, so the
/// sub-machine reducer never needs to know which flow spawned it.
#[derive(Clone)]
pub struct VerificationEnvironment {
    /// Prepare the factor (send code/link); `None` for factors without a
    /// prepare step (password, passkey, `TOTP`, backup code).
    pub prepare: Option<VerificationCall>,

    /// Attempt the factor with an entered secret.
    pub attempt: VerificationAttempt,

    /// Reload the resource (email-link staleness polling).
    pub reload: VerificationCall,

    /// Clock for resend cool-down bookkeeping.
    pub clock: Arc<dyn Clock>,

    /// Poll scheduling for out-of-band verification.
    pub poll: PollPolicy,

    /// Minimum time between resends.
    pub resend_cooldown: chrono::Duration,
}

impl VerificationEnvironment {
    fn poll_policy(config: &FlowConfig) -> PollPolicy {
        PollPolicy::builder()
            .interval(config.email_link_poll_interval)
            .jitter(config.poll_jitter)
            .build()
    }

    /// Capabilities for a sign-in first factor.
    #[must_use]
    pub fn for_sign_in_first_factor<C>(
        client: C,
        factor: &Factor,
        redirect_url: &str,
        clock: Arc<dyn Clock>,
        config: &FlowConfig,
    ) -> Self
    where
        C: SignInApi + Clone + 'static,
    {
        let prepare = PrepareFirstFactorParams::for_factor(factor, redirect_url).map(|params| {
            let client = client.clone();
            let call: VerificationCall = Arc::new(move || {
                let client = client.clone();
                let params = params.clone();
                Box::pin(async move {
                    client
                        .prepare_first_factor(params)
                        .await
                        .map(ResourceEnvelope::SignIn)
                })
            });
            call
        });

        let attempt_factor = factor.clone();
        let attempt_client = client.clone();
        let attempt: VerificationAttempt = Arc::new(move |secret| {
            let client = attempt_client.clone();
            let factor = attempt_factor.clone();
            Box::pin(async move {
                let Some(params) = AttemptFirstFactorParams::for_factor(&factor, &secret) else {
                    return Err(FlowError::unexpected(format!(
                        "strategy {} cannot be attempted locally",
                        factor.strategy
                    )));
                };
                client
                    .attempt_first_factor(params)
                    .await
                    .map(ResourceEnvelope::SignIn)
            })
        });

        let reload: VerificationCall = Arc::new(move || {
            let client = client.clone();
            Box::pin(async move {
                client
                    .reload(ReloadParams::default())
                    .await
                    .map(ResourceEnvelope::SignIn)
            })
        });

        Self {
            prepare,
            attempt,
            reload,
            clock,
            poll: Self::poll_policy(config),
            resend_cooldown: config.resend_cooldown,
        }
    }

    /// Capabilities for a sign-in second factor.
    #[must_use]
    pub fn for_sign_in_second_factor<C>(
        client: C,
        factor: &Factor,
        clock: Arc<dyn Clock>,
        config: &FlowConfig,
    ) -> Self
    where
        C: SignInApi + Clone + 'static,
    {
        let prepare = match factor.strategy {
            Strategy::PhoneCode => {
                let client = client.clone();
                let phone_number_id = factor.phone_number_id.clone();
                let call: VerificationCall = Arc::new(move || {
                    let client = client.clone();
                    let params = PrepareSecondFactorParams::PhoneCode {
                        phone_number_id: phone_number_id.clone(),
                    };
                    Box::pin(async move {
                        client
                            .prepare_second_factor(params)
                            .await
                            .map(ResourceEnvelope::SignIn)
                    })
                });
                Some(call)
            },
            _ => None,
        };

        let attempt_factor = factor.clone();
        let attempt_client = client.clone();
        let attempt: VerificationAttempt = Arc::new(move |secret| {
            let client = attempt_client.clone();
            let factor = attempt_factor.clone();
            Box::pin(async move {
                let Some(params) = AttemptSecondFactorParams::for_factor(&factor, &secret) else {
                    return Err(FlowError::unexpected(format!(
                        "strategy {} is not a second factor",
                        factor.strategy
                    )));
                };
                client
                    .attempt_second_factor(params)
                    .await
                    .map(ResourceEnvelope::SignIn)
            })
        });

        let reload: VerificationCall = Arc::new(move || {
            let client = client.clone();
            Box::pin(async move {
                client
                    .reload(ReloadParams::default())
                    .await
                    .map(ResourceEnvelope::SignIn)
            })
        });

        Self {
            prepare,
            attempt,
            reload,
            clock,
            poll: Self::poll_policy(config),
            resend_cooldown: config.resend_cooldown,
        }
    }

    /// Capabilities for a sign-up field verification.
    #[must_use]
    pub fn for_sign_up<C>(
        client: C,
        strategy: Strategy,
        clock: Arc<dyn Clock>,
        config: &FlowConfig,
    ) -> Self
    where
        C: SignUpApi + Clone + 'static,
    {
        let prepare_client = client.clone();
        let prepare: VerificationCall = Arc::new(move || {
            let client = prepare_client.clone();
            Box::pin(async move {
                client
                    .prepare_verification(strategy)
                    .await
                    .map(ResourceEnvelope::SignUp)
            })
        });

        let attempt_client = client.clone();
        let attempt: VerificationAttempt = Arc::new(move |secret| {
            let client = attempt_client.clone();
            Box::pin(async move {
                client
                    .attempt_verification(strategy, secret)
                    .await
                    .map(ResourceEnvelope::SignUp)
            })
        });

        let reload: VerificationCall = Arc::new(move || {
            let client = client.clone();
            Box::pin(async move { client.reload().await.map(ResourceEnvelope::SignUp) })
        });

        Self {
            prepare: Some(prepare),
            attempt,
            reload,
            clock,
            poll: Self::poll_policy(config),
            resend_cooldown: config.resend_cooldown,
        }
    }
}
