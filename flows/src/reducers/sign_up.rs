//! Sign-up router machine reducer.
//!
//! Orchestrates start → continue (collect missing fields) → verification →
//! completion. Field verification runs in spawned child actors exactly as
//! in the sign-in machine; transfer-in from sign-in initializes the
//! attempt with `transfer: true` so already-known fields are not
//! re-collected.

use crate::environment::{FlowEnvironment, VerificationEnvironment};
use crate::error::FlowError;
use crate::events::{SignUpEvent, VerificationEvent};
use crate::params::SIGN_UP_PARAM_KEYS;
use crate::providers::{Platform, SessionActivator, SignUpApi};
use crate::reducers::verification::VerificationReducer;
use crate::resource::{
    Factor, ResourceEnvelope, SignUpResource, SignUpStatus, VerificationSlot, VerificationStatus,
};
use crate::router::{FlowRouter, NavigationMode, RouterContext, navigate};
use crate::routes::SignUpRoute;
use crate::state::{ChildSlot, SignUpState, VerificationState};
use crate::strategy::Strategy;
use authflow_core::effect::Effect;
use authflow_core::environment::Clock;
use authflow_core::reducer::Reducer;
use authflow_core::{SmallVec, smallvec};
use std::marker::PhantomData;
use std::sync::Arc;

/// Fields that inline API errors may be scoped to.
const ERROR_FIELDS: [&str; 7] = [
    "firstName",
    "lastName",
    "emailAddress",
    "username",
    "password",
    "phoneNumber",
    "code",
];

/// Missing fields that force a full restart rather than a continuation:
/// without an identifier there is nothing to continue from.
const RESTART_FIELDS: [&str; 2] = ["emailAddress", "phoneNumber"];

type Effects = SmallVec<[Effect<SignUpEvent>; 4]>;

/// Sign-up router machine reducer.
#[derive(Debug, Clone)]
pub struct SignUpReducer<C, S, R, P> {
    /// Phantom data to hold type parameters.
    _phantom: PhantomData<(C, S, R, P)>,
}

impl<C, S, R, P> SignUpReducer<C, S, R, P> {
    /// Create a new sign-up reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<C, S, R, P> Default for SignUpReducer<C, S, R, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Select which child reports get forwarded into the parent machine.
fn verification_report(strategy: Strategy, event: VerificationEvent) -> Option<SignUpEvent> {
    match event {
        VerificationEvent::Prepared { .. } => Some(SignUpEvent::FactorPrepared { strategy }),
        VerificationEvent::Attempted { envelope } | VerificationEvent::PollResolved { envelope } => {
            Some(SignUpEvent::VerificationOutcome { envelope })
        },
        VerificationEvent::PrepareFailed { error } | VerificationEvent::AttemptFailed { error }
            if matches!(error, FlowError::Unexpected { .. }) =>
        {
            Some(SignUpEvent::VerificationFailed { error })
        },
        _ => None,
    }
}

/// The strategy to verify next for a snapshot, if any.
fn pending_verification_strategy(resource: &SignUpResource) -> Option<Strategy> {
    resource
        .verifications
        .iter()
        .find(|v| v.status == VerificationStatus::Pending)
        .and_then(|v| v.strategy)
        .or_else(|| {
            resource
                .unverified_fields
                .iter()
                .find_map(|field| match field.as_str() {
                    "emailAddress" => Some(Strategy::EmailCode),
                    "phoneNumber" => Some(Strategy::PhoneCode),
                    _ => None,
                })
        })
}

impl<C, S, R, P> SignUpReducer<C, S, R, P>
where
    C: SignUpApi + Clone + Send + Sync + 'static,
    S: SessionActivator + Clone + Send + Sync + 'static,
    R: FlowRouter + Clone + Send + Sync + 'static,
    P: Platform + Clone + Send + Sync + 'static,
{
    /// Flow root: the inferred base path, or the configured one before the
    /// router context is seeded.
    fn base_path(state: &SignUpState, env: &FlowEnvironment<C, S, R, P>) -> String {
        if state.router.base_path.is_empty() {
            env.config.sign_up_path.clone()
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
    ) -> Effect<SignUpEvent> {
        let router = env.router.clone();
        Effect::sync(move |_| {
            navigate(&router, mode, &path, force);
            None
        })
    }

    /// Guarded navigation effect to a step's path, if it has one.
    fn route_nav(
        state: &SignUpState,
        env: &FlowEnvironment<C, S, R, P>,
        route: SignUpRoute,
        mode: NavigationMode,
    ) -> Option<Effect<SignUpEvent>> {
        let base = Self::base_path(state, env);
        route.path(&base).map(|path| Self::nav(env, mode, path, false))
    }

    /// Tear down the mounted verification child, if any.
    fn stop_child(state: &mut SignUpState) -> Option<Effect<SignUpEvent>> {
        state.verification.take().map(|child| {
            Effect::sync(move |_| {
                child.teardown();
                None
            })
        })
    }

    /// Spawn a verification child actor for a strategy.
    fn spawn_verification(
        state: &SignUpState,
        env: &FlowEnvironment<C, S, R, P>,
        strategy: Strategy,
    ) -> Effect<SignUpEvent> {
        let already_prepared = state.prepared.contains(&strategy);
        let verification_env = VerificationEnvironment::for_sign_up(
            env.client.clone(),
            strategy,
            Arc::clone(&env.clock),
            &env.config,
        );
        let child_state = VerificationState::new(
            Factor::new(strategy),
            VerificationSlot::SignUp,
            already_prepared,
        );

        Effect::sync(move |mailbox| {
            let child = authflow_runtime::spawn(VerificationReducer, child_state, verification_env);
            let forwarding = child.forward(mailbox.clone(), move |event| {
                verification_report(strategy, event)
            });
            if child.send(VerificationEvent::Prepare).is_err() {
                tracing::warn!(strategy = %strategy, "verification machine rejected prepare");
            }
            Some(SignUpEvent::VerificationMounted {
                child: ChildSlot {
                    handle: child,
                    forwarding,
                },
            })
        })
    }

    /// Classify and surface a failure.
    fn fail(state: &mut SignUpState, error: FlowError) -> Effects {
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
                if state.route != SignUpRoute::Error {
                    state.prior_route = Some(state.route);
                }
                state.route = SignUpRoute::Error;
                state.fatal = Some(error);
            },
        }

        smallvec![Effect::None]
    }

    /// Route on a fresh resource snapshot.
    #[allow(clippy::too_many_lines)]
    fn handle_next(
        state: &mut SignUpState,
        env: &FlowEnvironment<C, S, R, P>,
        resource: SignUpResource,
    ) -> Effects {
        state.loading = false;
        state.errors.clear();

        if state.route == SignUpRoute::Error {
            state.fatal = None;
            state.route = state.prior_route.take().unwrap_or(SignUpRoute::Start);
        }

        match resource.status {
            SignUpStatus::MissingRequirements => {
                // Redirect leg of a social sign-up.
                if let Some(url) = resource
                    .verifications
                    .iter()
                    .find_map(|v| v.external_verification_redirect_url.clone())
                {
                    state.resource = Some(resource);
                    return smallvec![Effect::sync(move |_| Some(SignUpEvent::Redirect { url }))];
                }

                if let Some(strategy) = pending_verification_strategy(&resource) {
                    let already_sent = resource
                        .verification_for(strategy)
                        .is_some_and(|v| v.status == VerificationStatus::Pending);
                    state.resource = Some(resource);

                    if state.route == SignUpRoute::Verification
                        && state.pending_strategy == Some(strategy)
                        && state.verification.is_some()
                    {
                        return smallvec![Effect::None];
                    }

                    if already_sent && !state.prepared.contains(&strategy) {
                        state.prepared.push(strategy);
                    }

                    state.pending_strategy = Some(strategy);
                    state.route = SignUpRoute::Verification;

                    let mut effects: Effects = SmallVec::new();
                    if let Some(stop) = Self::stop_child(state) {
                        effects.push(stop);
                    }
                    effects.push(Effect::Invalidate);
                    effects.push(Self::spawn_verification(state, env, strategy));
                    if let Some(nav) = Self::route_nav(
                        state,
                        env,
                        SignUpRoute::Verification,
                        NavigationMode::Push,
                    ) {
                        effects.push(nav);
                    }
                    return effects;
                }

                // Fields still to collect: an absent identifier restarts,
                // anything else (password after a social sign-up) continues.
                let needs_restart = resource
                    .missing_fields
                    .iter()
                    .any(|field| RESTART_FIELDS.contains(&field.as_str()));
                let target = if needs_restart || resource.missing_fields.is_empty() {
                    SignUpRoute::Start
                } else {
                    SignUpRoute::Continue
                };

                state.resource = Some(resource);
                state.pending_strategy = None;

                if state.route == target {
                    return smallvec![Effect::None];
                }
                state.route = target;

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);
                let mode = if target == SignUpRoute::Start {
                    NavigationMode::Replace
                } else {
                    NavigationMode::Push
                };
                if let Some(nav) = Self::route_nav(state, env, target, mode) {
                    effects.push(nav);
                }
                effects
            },

            SignUpStatus::Complete => {
                let session_id = resource.created_session_id.clone();
                state.resource = Some(resource);

                let Some(session_id) = session_id else {
                    return Self::fail(
                        state,
                        FlowError::unexpected("complete sign-up carries no session id"),
                    );
                };

                if state.activated_session.as_deref() == Some(session_id.as_str()) {
                    return smallvec![Effect::None];
                }

                state.activated_session = Some(session_id.clone());
                state.loading = true;
                state.pending_strategy = None;

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);

                let sessions = env.sessions.clone();
                let activating = session_id.clone();
                effects.push(Effect::future(async move {
                    Some(match sessions.set_active(activating).await {
                        Ok(()) => SignUpEvent::SessionActivated { session_id },
                        Err(error) => SignUpEvent::Failure { error },
                    })
                }));
                effects
            },

            SignUpStatus::Abandoned => {
                state.resource = Some(resource);
                state.route = SignUpRoute::Start;
                state
                    .errors
                    .set_global("abandoned", "This sign-up attempt has expired, start over");

                let mut effects: Effects = SmallVec::new();
                if let Some(stop) = Self::stop_child(state) {
                    effects.push(stop);
                }
                effects.push(Effect::Invalidate);
                if let Some(nav) =
                    Self::route_nav(state, env, SignUpRoute::Start, NavigationMode::Replace)
                {
                    effects.push(nav);
                }
                effects
            },

            SignUpStatus::Transferable => {
                state.resource = Some(resource);
                smallvec![Effect::sync(|_| Some(SignUpEvent::Transfer))]
            },
        }
    }
}

impl<C, S, R, P> Reducer for SignUpReducer<C, S, R, P>
where
    C: SignUpApi + Clone + Send + Sync + 'static,
    S: SessionActivator + Clone + Send + Sync + 'static,
    R: FlowRouter + Clone + Send + Sync + 'static,
    P: Platform + Clone + Send + Sync + 'static,
{
    type State = SignUpState;
    type Action = SignUpEvent;
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
            SignUpEvent::Init { transfer } => {
                state.router = RouterContext::seed(&env.router, &env.config);
                state.errors.clear();
                state.fatal = None;
                state.transfer = transfer;

                let base = Self::base_path(state, env);

                if SignUpRoute::for_path(&base, &state.router.pathname)
                    == Some(SignUpRoute::Callback)
                {
                    state.route = SignUpRoute::Callback;
                    state.loading = true;

                    let client = env.client.clone();
                    return smallvec![Effect::future(async move {
                        Some(match client.reload().await {
                            Ok(resource) => SignUpEvent::Next { resource },
                            Err(error) => SignUpEvent::Failure { error },
                        })
                    })];
                }

                state.route = SignUpRoute::Start;

                if transfer {
                    // The backend completes the attempt from the sign-in's
                    // partial state; known fields are not re-collected.
                    state.loading = true;

                    let mut params = crate::params::Params::new();
                    params.insert("transfer".to_string(), serde_json::Value::Bool(true));

                    let client = env.client.clone();
                    return smallvec![Effect::future(async move {
                        Some(match client.create(params).await {
                            Ok(resource) => SignUpEvent::Next { resource },
                            Err(error) => SignUpEvent::Failure { error },
                        })
                    })];
                }

                match Self::route_nav(state, env, SignUpRoute::Start, NavigationMode::Replace) {
                    Some(nav) => smallvec![nav],
                    None => smallvec![Effect::None],
                }
            },

            // ═══════════════════════════════════════════════════════════
            // Form submission
            // ═══════════════════════════════════════════════════════════
            SignUpEvent::Submit if state.loading => {
                tracing::debug!("submit ignored, request in flight");
                smallvec![Effect::None]
            },

            SignUpEvent::Submit => match state.route {
                SignUpRoute::Start => {
                    state.loading = true;
                    state.errors.clear();

                    let params = env.form.to_params(&SIGN_UP_PARAM_KEYS);
                    let client = env.client.clone();

                    smallvec![Effect::future(async move {
                        Some(match client.create(params).await {
                            Ok(resource) => SignUpEvent::Next { resource },
                            Err(error) => SignUpEvent::Failure { error },
                        })
                    })]
                },

                SignUpRoute::Continue => {
                    state.loading = true;
                    state.errors.clear();

                    let params = env.form.to_params(&SIGN_UP_PARAM_KEYS);
                    let client = env.client.clone();

                    smallvec![Effect::future(async move {
                        Some(match client.update(params).await {
                            Ok(resource) => SignUpEvent::Next { resource },
                            Err(error) => SignUpEvent::Failure { error },
                        })
                    })]
                },

                SignUpRoute::Error => {
                    state.fatal = None;
                    state.route = state.prior_route.take().unwrap_or(SignUpRoute::Start);
                    self.reduce(state, SignUpEvent::Submit, env)
                },

                _ => {
                    tracing::debug!(route = ?state.route, "submit handled by the verification child");
                    smallvec![Effect::None]
                },
            },

            SignUpEvent::Prev => {
                let target = state.prior_route.take().unwrap_or(SignUpRoute::Start);
                if target == state.route {
                    return smallvec![Effect::None];
                }

                let mut effects: Effects = SmallVec::new();
                if state.route == SignUpRoute::Verification {
                    if let Some(stop) = Self::stop_child(state) {
                        effects.push(stop);
                    }
                    effects.push(Effect::Invalidate);
                }
                state.route = target;
                if let Some(nav) = Self::route_nav(state, env, target, NavigationMode::Push) {
                    effects.push(nav);
                }
                if effects.is_empty() {
                    effects.push(Effect::None);
                }
                effects
            },

            // ═══════════════════════════════════════════════════════════
            // Resource routing
            // ═══════════════════════════════════════════════════════════
            SignUpEvent::Next { resource } => Self::handle_next(state, env, resource),

            SignUpEvent::VerificationOutcome { envelope } => match envelope {
                ResourceEnvelope::SignUp(resource) => {
                    self.reduce(state, SignUpEvent::Next { resource }, env)
                },
                ResourceEnvelope::SignIn(_) => {
                    tracing::warn!("sign-in snapshot reported to the sign-up machine");
                    smallvec![Effect::None]
                },
            },

            SignUpEvent::Failure { error } | SignUpEvent::VerificationFailed { error } => {
                Self::fail(state, error)
            },

            // ═══════════════════════════════════════════════════════════
            // Child lifecycle and reports
            // ═══════════════════════════════════════════════════════════
            SignUpEvent::VerificationMounted { child } => {
                let previous = state.verification.replace(child);
                match previous {
                    Some(old) => smallvec![Effect::sync(move |_| {
                        old.teardown();
                        None
                    })],
                    None => smallvec![Effect::None],
                }
            },

            SignUpEvent::FactorPrepared { strategy } => {
                if !state.prepared.contains(&strategy) {
                    state.prepared.push(strategy);
                }
                state.last_prepared_at = Some(env.clock.now());
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Transfer, redirect, host sync
            // ═══════════════════════════════════════════════════════════
            SignUpEvent::Transfer => {
                let target = state.router.sign_in_path.clone();
                let target = if target.is_empty() {
                    env.config.sign_in_path.clone()
                } else {
                    target
                };
                smallvec![Self::nav(env, NavigationMode::Push, target, false)]
            },

            SignUpEvent::Redirect { url } => {
                smallvec![Self::nav(env, NavigationMode::Push, url, true)]
            },

            SignUpEvent::RouterSync {
                pathname,
                search_params,
            } => {
                state.router.sync(pathname.clone(), search_params);

                let base = Self::base_path(state, env);
                let Some(route) = SignUpRoute::for_path(&base, &pathname) else {
                    return smallvec![Effect::None];
                };
                if route == state.route {
                    return smallvec![Effect::None];
                }

                state.prior_route = Some(state.route);

                let mut effects: Effects = SmallVec::new();
                if state.route == SignUpRoute::Verification {
                    if let Some(stop) = Self::stop_child(state) {
                        effects.push(stop);
                    }
                    effects.push(Effect::Invalidate);
                }
                state.route = route;

                if route == SignUpRoute::Verification && state.verification.is_none() {
                    if let Some(strategy) = state.pending_strategy {
                        effects.push(Self::spawn_verification(state, env, strategy));
                    }
                }

                if effects.is_empty() {
                    effects.push(Effect::None);
                }
                effects
            },

            // ═══════════════════════════════════════════════════════════
            // Completion
            // ═══════════════════════════════════════════════════════════
            SignUpEvent::SessionActivated { session_id } => {
                tracing::info!(session_id = %session_id, "sign-up complete, session handed off");
                state.loading = false;

                let form = env.form.clone();
                let router = env.router.clone();
                let after = env.config.after_sign_up_path.clone();

                smallvec![Effect::sync(move |_| {
                    form.reset();
                    navigate(&router, NavigationMode::Push, &after, false);
                    None
                })]
            },
        }
    }
}
