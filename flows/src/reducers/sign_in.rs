//! Sign-in router machine reducer.
//!
//! Orchestrates start → first factor → second factor → completion,
//! reacting to resource status transitions from the identity backend.
//! Factor verification runs in spawned child actors; this reducer routes,
//! spawns and stops them, and re-routes on their reports.
//!
//! # Flow
//!
//! 1. `Init` seeds the navigation context (and, on the callback route,
//!    reloads the resource returned from an `OAuth`/`SSO` round-trip)
//! 2. `Submit` on the start step creates the sign-in attempt
//! 3. `Next` inspects `resource.status` and routes: the starting factor is
//!    chosen by the matcher, a verification child is spawned, and the
//!    router adapter is pushed to the step's path
//! 4. `complete` hands `created_session_id` to the session activator and
//!    navigates to the after-sign-in destination
//!
//! Re-processing an identical `Next` snapshot is a no-op: transitions
//! never double-apply and navigation never stacks history entries.

use crate::environment::{FlowEnvironment, VerificationEnvironment};
use crate::error::FlowError;
use crate::events::{SignInEvent, SignInNavigationIntent, VerificationEvent};
use crate::form::FieldValue;
use crate::matcher;
use crate::params::SIGN_IN_PARAM_KEYS;
use crate::providers::{
    AttemptFirstFactorParams, Platform, PrepareFirstFactorParams, ReloadParams, SessionActivator,
    SignInApi,
};
use crate::reducers::verification::VerificationReducer;
use crate::resource::{Factor, ResourceEnvelope, SignInResource, SignInStatus, VerificationSlot};
use crate::router::{FlowRouter, NavigationMode, RouterContext, navigate};
use crate::routes::SignInRoute;
use crate::state::{ChildSlot, SignInState, VerificationState};
use crate::strategy::Strategy;
use authflow_core::effect::Effect;
use authflow_core::environment::Clock;
use authflow_core::reducer::Reducer;
use authflow_core::{SmallVec, smallvec};
use std::marker::PhantomData;
use std::sync::Arc;

/// Fields that inline API errors may be scoped to.
const ERROR_FIELDS: [&str; 8] = [
    "firstName",
    "lastName",
    "emailAddress",
    "username",
    "password",
    "phoneNumber",
    "identifier",
    "code",
];

type Effects = SmallVec<[Effect<SignInEvent>; 4]>;

/// Sign-in router machine reducer.
#[derive(Debug, Clone)]
pub struct SignInReducer<C, S, R, P> {
    /// Phantom data to hold type parameters.
    _phantom: PhantomData<(C, S, R, P)>,
}

impl<C, S, R, P> SignInReducer<C, S, R, P> {
    /// Create a new sign-in reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<C, S, R, P> Default for SignInReducer<C, S, R, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Select which child reports get forwarded into the parent machine.
fn verification_report(strategy: Strategy, event: VerificationEvent) -> Option<SignInEvent> {
    match event {
        VerificationEvent::Prepared { .. } => Some(SignInEvent::FactorPrepared { strategy }),
        VerificationEvent::Attempted { envelope } | VerificationEvent::PollResolved { envelope } => {
            Some(SignInEvent::VerificationOutcome { envelope })
        },
        VerificationEvent::PrepareFailed { error } | VerificationEvent::AttemptFailed { error }
            if matches!(error, FlowError::Unexpected { .. }) =>
        {
            Some(SignInEvent::VerificationFailed { error })
        },
        _ => None,
    }
}

impl<C, S, R, P> SignInReducer<C, S, R, P>
where
    C: SignInApi + Clone + Send + Sync + 'static,
    S: SessionActivator + Clone + Send + Sync + 'static,
    R: FlowRouter + Clone + Send + Sync + 'static,
    P: Platform + Clone + Send + Sync + 'static,
{
    /// Flow root: the inferred base path, or the configured one before the
    /// router context is seeded.
    fn base_path(state: &SignInState, env: &FlowEnvironment<C, S, R, P>) -> String {
        if state.router.base_path.is_empty() {
            env.config.sign_in_path.clone()
        } else {
            state.router.base_path.clone()
        }
    }

    /// Guarded navigation effect to an absolute path.
    fn nav(
        env: &FlowEnvironment<C, S, R, P>,
        mode: NavigationMode,
        path: String,
        force: bool,
    ) -> Effect<SignInEvent> {
        let router = env.router.clone();
        Effect::sync(move |_| {
            navigate(&router, mode, &path, force);
            None
        })
    }

    /// Guarded navigation effect to a step's path, if it has one.
    fn route_nav(
        state: &SignInState,
        env: &FlowEnvironment<C, S, R, P>,
        route: SignInRoute,
        mode: NavigationMode,
    ) -> Option<Effect<SignInEvent>> {
        let base = Self::base_path(state, env);
        route.path(&base).map(|path| Self::nav(env, mode, path, false))
    }

    /// Tear down the mounted verification child, if any.
    fn stop_child(state: &mut SignInState) -> Option<Effect<SignInEvent>> {
        state.verification.take().map(|child| {
            Effect::sync(move |_| {
                child.teardown();
                None
            })
        })
    }

    /// Spawn a verification child actor for a factor and wire its reports
    /// back into this machine.
    fn spawn_verification(
        state: &SignInState,
        env: &FlowEnvironment<C, S, R, P>,
        factor: Factor,
        slot: VerificationSlot,
    ) -> Effect<SignInEvent> {
        let already_prepared = state.prepared.contains(&factor.strategy);
        let base = Self::base_path(state, env);
        let redirect_url = SignInRoute::FirstFactor
            .path(&base)
            .unwrap_or_else(|| base.clone());

        let verification_env = match slot {
            VerificationSlot::SignInSecond => VerificationEnvironment::for_sign_in_second_factor(
                env.client.clone(),
                &factor,
                Arc::clone(&env.clock),
                &env.config,
            ),
            _ => VerificationEnvironment::for_sign_in_first_factor(
                env.client.clone(),
                &factor,
                &redirect_url,
                Arc::clone(&env.clock),
                &env.config,
            ),
        };

        let strategy = factor.strategy;
        let child_state = VerificationState::new(factor, slot, already_prepared);

        Effect::sync(move |mailbox| {
            let child = authflow_runtime::spawn(VerificationReducer, child_state, verification_env);
            let forwarding = child.forward(mailbox.clone(), move |event| {
                verification_report(strategy, event)
            });
            if child.send(VerificationEvent::Prepare).is_err() {
                tracing::warn!(strategy = %strategy, "verification machine rejected prepare");
            }
            Some(SignInEvent::VerificationMounted {
                child: ChildSlot {
                    handle: child,
                    forwarding,
                },
            })
        })
    }

    /// Prepare a redirect factor (`OAuth`/`SSO`); the follow-up `Next`
    /// carries the provider URL to leave for.
    fn begin_redirect(
        state: &mut SignInState,
        env: &FlowEnvironment<C, S, R, P>,
        factor: &Factor,
    ) -> Effects {
        let base = Self::base_path(state, env);
        let callback = SignInRoute::Callback
            .path(&base)
            .unwrap_or_else(|| base.clone());

        let Some(params) = PrepareFirstFactorParams::for_factor(factor, &callback) else {
            return Self::fail(
                state,
                FlowError::unexpected(format!(
                    "redirect strategy {} has no prepare parameters",
                    factor.strategy
                )),
            );
        };

        state.current_first_factor = Some(factor.clone());
        state.loading = true;

        let client = env.client.clone();
        smallvec![Effect::future(async move {
            Some(match client.prepare_first_factor(params).await {
                Ok(resource) => SignInEvent::Next { resource },
                Err(error) => SignInEvent::Failure { error },
            })
        })]
    }

    /// Classify and surface a failure.
    fn fail(state: &mut SignInState, error: FlowError) -> Effects {
        state.loading = false;

        match &error {
            FlowError::Api(api) => {
                state.errors.absorb(api, &ERROR_FIELDS);
            },
            FlowError::Network { .. } => {
                state.errors.set_global("network_error", error.to_string());
            },
            FlowError::Unexpected { .. } => {
                tracing::error!(error = %error, "unexpected failure, entering error route");
                if state.route != SignInRoute::Error {
                    state.prior_route = Some(state.route);
                }
                state.route = SignInRoute::Error;
                state.fatal = Some(error);
            },
        }

        smallvec![Effect::None]
    }

    /// Route on a fresh resource snapshot.
    #[allow(clippy::too_many_lines)]
    fn handle_next(
        state: &mut SignInState,
        env: &FlowEnvironment<C, S, R, P>,
        resource: SignInResource,
    ) -> Effects {
        state.loading = false;
        state.errors.clear();

        // Any productive snapshot recovers from the error route.
        if state.route == SignInRoute::Error {
            state.fatal = None;
            state.route = state.prior_route.take().unwrap_or(SignInRoute::Start);
        }

        match resource.status {
            SignInStatus::NeedsIdentifier => {
                state.resource = Some(resource);
                state.current_first_factor = None;
                state.current_second_factor = None;
                state.route = SignInRoute::Start;

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);
                if let Some(nav) =
                    Self::route_nav(state, env, SignInRoute::Start, NavigationMode::Replace)
                {
                    effects.push(nav);
                }
                effects
            },

            SignInStatus::NeedsFirstFactor => Self::enter_first_factor(state, env, resource),

            SignInStatus::NeedsSecondFactor => {
                let starting = matcher::starting_second_factor(&resource.second_factors);
                let pending_verification = resource
                    .second_factor_verification
                    .as_ref()
                    .filter(|v| v.status == crate::resource::VerificationStatus::Pending)
                    .and_then(|v| v.strategy);
                state.resource = Some(resource);

                let Some(factor) = starting else {
                    return Self::fail(
                        state,
                        FlowError::unexpected("second factor required but none is available"),
                    );
                };

                if state.route == SignInRoute::SecondFactor
                    && state.current_second_factor.as_ref() == Some(&factor)
                    && state.verification.is_some()
                {
                    return smallvec![Effect::None];
                }

                if pending_verification == Some(factor.strategy)
                    && !state.prepared.contains(&factor.strategy)
                {
                    state.prepared.push(factor.strategy);
                }

                state.current_second_factor = Some(factor.clone());
                state.route = SignInRoute::SecondFactor;

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);
                effects.push(Self::spawn_verification(
                    state,
                    env,
                    factor,
                    VerificationSlot::SignInSecond,
                ));
                if let Some(nav) =
                    Self::route_nav(state, env, SignInRoute::SecondFactor, NavigationMode::Push)
                {
                    effects.push(nav);
                }
                effects
            },

            SignInStatus::NeedsNewPassword => {
                state.resource = Some(resource);
                state.route = SignInRoute::ForgotPassword;

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);
                if let Some(nav) = Self::route_nav(
                    state,
                    env,
                    SignInRoute::ForgotPassword,
                    NavigationMode::Push,
                ) {
                    effects.push(nav);
                }
                effects
            },

            SignInStatus::Complete => {
                let session_id = resource.created_session_id.clone();
                state.resource = Some(resource);

                let Some(session_id) = session_id else {
                    return Self::fail(
                        state,
                        FlowError::unexpected("complete sign-in carries no session id"),
                    );
                };

                // Re-delivered snapshot: the hand-off already happened.
                if state.activated_session.as_deref() == Some(session_id.as_str()) {
                    return smallvec![Effect::None];
                }

                state.activated_session = Some(session_id.clone());
                state.loading = true;

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);

                let sessions = env.sessions.clone();
                let activating = session_id.clone();
                effects.push(Effect::future(async move {
                    Some(match sessions.set_active(activating).await {
                        Ok(()) => SignInEvent::SessionActivated { session_id },
                        Err(error) => SignInEvent::Failure { error },
                    })
                }));
                effects
            },

            SignInStatus::Transferable => {
                state.resource = Some(resource);
                smallvec![Effect::sync(|_| Some(SignInEvent::Transfer))]
            },
        }
    }

    /// Route into the first-factor step (including its reset-password and
    /// redirect variants).
    fn enter_first_factor(
        state: &mut SignInState,
        env: &FlowEnvironment<C, S, R, P>,
        resource: SignInResource,
    ) -> Effects {
        // Redirect leg: the backend minted a provider URL to leave for.
        if let Some(url) = resource
            .first_factor_verification
            .as_ref()
            .and_then(|v| v.external_verification_redirect_url.clone())
        {
            state.resource = Some(resource);
            state.loading = false;
            return smallvec![Effect::sync(move |_| Some(SignInEvent::Redirect { url }))];
        }

        // Reset-password code entry happens on the forgot-password step.
        let reset_strategy = resource
            .first_factor_verification
            .as_ref()
            .and_then(|v| v.strategy)
            .filter(Strategy::is_reset);

        if let Some(strategy) = reset_strategy {
            let factor = resource
                .first_factors
                .iter()
                .find(|f| f.strategy == strategy)
                .cloned()
                .unwrap_or_else(|| Factor::new(strategy));
            state.resource = Some(resource);

            if state.route == SignInRoute::ForgotPassword
                && state
                    .current_first_factor
                    .as_ref()
                    .is_some_and(|f| f.strategy == strategy)
                && state.verification.is_some()
            {
                return smallvec![Effect::None];
            }

            // The prepare call that produced this snapshot already sent
            // the code.
            if !state.prepared.contains(&strategy) {
                state.prepared.push(strategy);
            }
            state.current_first_factor = Some(factor.clone());
            state.route = SignInRoute::ForgotPassword;

            let mut effects: Effects = SmallVec::new();
            if let Some(stop) = Self::stop_child(state) {
                effects.push(stop);
            }
            effects.push(Effect::Invalidate);
            effects.push(Self::spawn_verification(
                state,
                env,
                factor,
                VerificationSlot::SignInFirst,
            ));
            if let Some(nav) =
                Self::route_nav(state, env, SignInRoute::ForgotPassword, NavigationMode::Push)
            {
                effects.push(nav);
            }
            return effects;
        }

        let identifier = resource.identifier.clone().or_else(|| {
            env.form
                .field_value("identifier")
                .and_then(|value| value.as_text().map(str::to_string))
        });

        let starting = matcher::starting_first_factor(
            &resource.first_factors,
            identifier.as_deref(),
            env.config.preferred_strategy,
            env.platform.passkey_supported(),
        );
        let pending_verification = resource
            .first_factor_verification
            .as_ref()
            .filter(|v| v.status == crate::resource::VerificationStatus::Pending)
            .and_then(|v| v.strategy);
        state.resource = Some(resource);

        match starting {
            Some(factor) if factor.strategy.is_redirect() => {
                Self::begin_redirect(state, env, &factor)
            },
            Some(factor) => {
                if state.route == SignInRoute::FirstFactor
                    && state.current_first_factor.as_ref() == Some(&factor)
                    && state.verification.is_some()
                {
                    return smallvec![Effect::None];
                }

                // A pending verification means the backend already sent
                // the code for this factor.
                if pending_verification == Some(factor.strategy)
                    && !state.prepared.contains(&factor.strategy)
                {
                    state.prepared.push(factor.strategy);
                }

                state.current_first_factor = Some(factor.clone());
                state.route = SignInRoute::FirstFactor;

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);
                effects.push(Self::spawn_verification(
                    state,
                    env,
                    factor,
                    VerificationSlot::SignInFirst,
                ));
                if let Some(nav) =
                    Self::route_nav(state, env, SignInRoute::FirstFactor, NavigationMode::Push)
                {
                    effects.push(nav);
                }
                effects
            },
            None => {
                state.route = SignInRoute::Start;
                state.errors.set_global(
                    "no_first_factor",
                    "No usable sign-in method is available for this account",
                );
                match Self::route_nav(state, env, SignInRoute::Start, NavigationMode::Replace) {
                    Some(nav) => smallvec![nav],
                    None => smallvec![Effect::None],
                }
            },
        }
    }

    /// Move into a factor step, respawning its verification child when the
    /// factor is already known (back-navigation, `Prev`).
    fn reenter_route(
        state: &mut SignInState,
        env: &FlowEnvironment<C, S, R, P>,
        target: SignInRoute,
    ) -> Effects {
        let leaving_verification = matches!(
            state.route,
            SignInRoute::FirstFactor | SignInRoute::SecondFactor | SignInRoute::ForgotPassword
        );

        let mut effects: Effects = SmallVec::new();
        if leaving_verification {
            if let Some(stop) = Self::stop_child(state) {
                effects.push(stop);
            }
            effects.push(Effect::Invalidate);
        }

        state.route = target;

        if state.verification.is_none() {
            match target {
                SignInRoute::FirstFactor => {
                    if let Some(factor) = state.current_first_factor.clone() {
                        effects.push(Self::spawn_verification(
                            state,
                            env,
                            factor,
                            VerificationSlot::SignInFirst,
                        ));
                    }
                },
                SignInRoute::SecondFactor => {
                    if let Some(factor) = state.current_second_factor.clone() {
                        effects.push(Self::spawn_verification(
                            state,
                            env,
                            factor,
                            VerificationSlot::SignInSecond,
                        ));
                    }
                },
                _ => {},
            }
        }

        if effects.is_empty() {
            effects.push(Effect::None);
        }
        effects
    }
}

impl<C, S, R, P> Reducer for SignInReducer<C, S, R, P>
where
    C: SignInApi + Clone + Send + Sync + 'static,
    S: SessionActivator + Clone + Send + Sync + 'static,
    R: FlowRouter + Clone + Send + Sync + 'static,
    P: Platform + Clone + Send + Sync + 'static,
{
    type State = SignInState;
    type Action = SignInEvent;
    type Environment = FlowEnvironment<C, S, R, P>;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        match action {
            // ═══════════════════════════════════════════════════════════
            // Mount
            // ═══════════════════════════════════════════════════════════
            SignInEvent::Init => {
                state.router = RouterContext::seed(&env.router, &env.config);
                state.errors.clear();
                state.fatal = None;

                let base = Self::base_path(state, env);

                // Returning from an OAuth/SSO round-trip: reload and
                // re-route on the fresh snapshot.
                if SignInRoute::for_path(&base, &state.router.pathname)
                    == Some(SignInRoute::Callback)
                {
                    state.route = SignInRoute::Callback;
                    state.loading = true;

                    let nonce = state
                        .router
                        .search_params
                        .get("rotating_token_nonce")
                        .map(str::to_string);
                    let client = env.client.clone();

                    return smallvec![Effect::future(async move {
                        Some(
                            match client
                                .reload(ReloadParams {
                                    rotating_token_nonce: nonce,
                                })
                                .await
                            {
                                Ok(resource) => SignInEvent::Next { resource },
                                Err(error) => SignInEvent::Failure { error },
                            },
                        )
                    })];
                }

                state.route = SignInRoute::Start;
                match Self::route_nav(state, env, SignInRoute::Start, NavigationMode::Replace) {
                    Some(nav) => smallvec![nav],
                    None => smallvec![Effect::None],
                }
            },

            // ═══════════════════════════════════════════════════════════
            // Form submission
            // ═══════════════════════════════════════════════════════════
            SignInEvent::Submit if state.loading => {
                tracing::debug!("submit ignored, request in flight");
                smallvec![Effect::None]
            },

            SignInEvent::Submit => match state.route {
                SignInRoute::Start => {
                    state.loading = true;
                    state.errors.clear();

                    let params = env.form.to_params(&SIGN_IN_PARAM_KEYS);
                    let client = env.client.clone();

                    smallvec![Effect::future(async move {
                        Some(match client.create(params).await {
                            Ok(resource) => SignInEvent::Next { resource },
                            Err(error) => SignInEvent::Failure { error },
                        })
                    })]
                },

                SignInRoute::ForgotPassword => {
                    let needs_new_password = state
                        .resource
                        .as_ref()
                        .is_some_and(|r| r.status == SignInStatus::NeedsNewPassword);

                    state.errors.clear();

                    if needs_new_password {
                        let password = env
                            .form
                            .field_value("password")
                            .and_then(|value| value.as_text().map(str::to_string))
                            .unwrap_or_default();
                        let sign_out_of_other_sessions = matches!(
                            env.form.field_value("signOutOfOtherSessions"),
                            Some(FieldValue::Checked(true))
                        );

                        state.loading = true;
                        let client = env.client.clone();

                        return smallvec![Effect::future(async move {
                            Some(
                                match client
                                    .attempt_first_factor(AttemptFirstFactorParams::ResetPassword {
                                        password,
                                        sign_out_of_other_sessions,
                                    })
                                    .await
                                {
                                    Ok(resource) => SignInEvent::Next { resource },
                                    Err(error) => SignInEvent::Failure { error },
                                },
                            )
                        })];
                    }

                    // Request a reset code for the account's email/phone.
                    let reset_factor = state.resource.as_ref().and_then(|resource| {
                        resource
                            .first_factors
                            .iter()
                            .find(|f| f.strategy == Strategy::ResetPasswordEmailCode)
                            .or_else(|| {
                                resource
                                    .first_factors
                                    .iter()
                                    .find(|f| f.strategy == Strategy::ResetPasswordPhoneCode)
                            })
                            .cloned()
                    });

                    let Some(factor) = reset_factor else {
                        state.errors.set_global(
                            "reset_unavailable",
                            "Password reset is not available for this account",
                        );
                        return smallvec![Effect::None];
                    };

                    let base = Self::base_path(state, env);
                    let redirect = SignInRoute::ForgotPassword
                        .path(&base)
                        .unwrap_or_else(|| base.clone());
                    let Some(params) = PrepareFirstFactorParams::for_factor(&factor, &redirect)
                    else {
                        return smallvec![Effect::None];
                    };

                    state.loading = true;
                    let client = env.client.clone();

                    smallvec![Effect::future(async move {
                        Some(match client.prepare_first_factor(params).await {
                            Ok(resource) => SignInEvent::Next { resource },
                            Err(error) => SignInEvent::Failure { error },
                        })
                    })]
                },

                SignInRoute::Error => {
                    // Recoverable: retry returns to the prior productive
                    // route and replays the submit there.
                    state.fatal = None;
                    state.route = state.prior_route.take().unwrap_or(SignInRoute::Start);
                    self.reduce(state, SignInEvent::Submit, env)
                },

                _ => {
                    tracing::debug!(route = ?state.route, "submit handled by the verification child");
                    smallvec![Effect::None]
                },
            },

            // ═══════════════════════════════════════════════════════════
            // Resource routing
            // ═══════════════════════════════════════════════════════════
            SignInEvent::Next { resource } => Self::handle_next(state, env, resource),

            SignInEvent::VerificationOutcome { envelope } => match envelope {
                ResourceEnvelope::SignIn(resource) => {
                    self.reduce(state, SignInEvent::Next { resource }, env)
                },
                ResourceEnvelope::SignUp(_) => {
                    tracing::warn!("sign-up snapshot reported to the sign-in machine");
                    smallvec![Effect::None]
                },
            },

            SignInEvent::Failure { error } | SignInEvent::VerificationFailed { error } => {
                Self::fail(state, error)
            },

            // ═══════════════════════════════════════════════════════════
            // Lateral navigation
            // ═══════════════════════════════════════════════════════════
            SignInEvent::Navigate { intent } => {
                if !matches!(
                    state.route,
                    SignInRoute::FirstFactor | SignInRoute::SecondFactor
                ) {
                    tracing::debug!(route = ?state.route, "lateral navigation ignored");
                    return smallvec![Effect::None];
                }

                state.prior_route = Some(state.route);

                let target = match intent {
                    SignInNavigationIntent::ChooseStrategy => SignInRoute::ChooseStrategy,
                    SignInNavigationIntent::ForgotPassword => SignInRoute::ForgotPassword,
                };

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);
                state.route = target;
                if let Some(nav) = Self::route_nav(state, env, target, NavigationMode::Push) {
                    effects.push(nav);
                }
                effects
            },

            SignInEvent::Prev => {
                let target = state.prior_route.take().unwrap_or(SignInRoute::Start);
                if target == state.route {
                    return smallvec![Effect::None];
                }

                let mut effects = Self::reenter_route(state, env, target);
                if let Some(nav) = Self::route_nav(state, env, target, NavigationMode::Push) {
                    effects.push(nav);
                }
                effects
            },

            SignInEvent::ChooseFactor { factor } => {
                if factor.strategy.is_redirect() {
                    return Self::begin_redirect(state, env, &factor);
                }

                let second = state
                    .resource
                    .as_ref()
                    .is_some_and(|r| r.status == SignInStatus::NeedsSecondFactor);
                let (slot, target) = if second {
                    state.current_second_factor = Some(factor.clone());
                    (VerificationSlot::SignInSecond, SignInRoute::SecondFactor)
                } else {
                    state.current_first_factor = Some(factor.clone());
                    (VerificationSlot::SignInFirst, SignInRoute::FirstFactor)
                };

                state.route = target;

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);
                effects.push(Self::spawn_verification(state, env, factor, slot));
                if let Some(nav) = Self::route_nav(state, env, target, NavigationMode::Push) {
                    effects.push(nav);
                }
                effects
            },

            // ═══════════════════════════════════════════════════════════
            // Child lifecycle and reports
            // ═══════════════════════════════════════════════════════════
            SignInEvent::VerificationMounted { child } => {
                let previous = state.verification.replace(child);
                match previous {
                    Some(old) => smallvec![Effect::sync(move |_| {
                        old.teardown();
                        None
                    })],
                    None => smallvec![Effect::None],
                }
            },

            SignInEvent::FactorPrepared { strategy } => {
                if !state.prepared.contains(&strategy) {
                    state.prepared.push(strategy);
                }
                state.last_prepared_at = Some(env.clock.now());
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Transfer, redirect, host sync
            // ═══════════════════════════════════════════════════════════
            SignInEvent::Transfer => {
                let target = state.router.sign_up_path.clone();
                let target = if target.is_empty() {
                    env.config.sign_up_path.clone()
                } else {
                    target
                };
                smallvec![Self::nav(env, NavigationMode::Push, target, false)]
            },

            SignInEvent::Redirect { url } => {
                smallvec![Self::nav(env, NavigationMode::Push, url, true)]
            },

            SignInEvent::RouterSync {
                pathname,
                search_params,
            } => {
                state.router.sync(pathname.clone(), search_params);

                let base = Self::base_path(state, env);
                let Some(route) = SignInRoute::for_path(&base, &pathname) else {
                    return smallvec![Effect::None];
                };
                if route == state.route {
                    return smallvec![Effect::None];
                }

                state.prior_route = Some(state.route);
                Self::reenter_route(state, env, route)
            },

            // ═══════════════════════════════════════════════════════════
            // Completion
            // ═══════════════════════════════════════════════════════════
            SignInEvent::SessionActivated { session_id } => {
                tracing::info!(session_id = %session_id, "sign-in complete, session handed off");
                state.loading = false;

                let form = env.form.clone();
                let router = env.router.clone();
                let after = env.config.after_sign_in_path.clone();

                smallvec![Effect::sync(move |_| {
                    form.reset();
                    navigate(&router, NavigationMode::Push, &after, false);
                    None
                })]
            },
        }
    }
}
