//! Verification sub-machine reducer.
//!
//! One reducer serves first-factor, second-factor, and sign-up field
//! verification: the [`VerificationEnvironment`] closures already know
//! which factor and flow they act for.
//!
//! # Flow
//!
//! 1. On mount, `Prepare` fires the prepare call unless the factor was
//!    already prepared by a prior step (no duplicate code sends)
//! 2. Prepare success enters `Pending`; for email links a staleness poll
//!    is scheduled
//! 3. `Submit` attempts the entered code; the resulting resource decides
//!    the terminal stage
//! 4. Attempt failures stay re-enterable in `Pending` with an inline
//!    error; backend-reported expiry maps to the dedicated `Expired` stage
//! 5. `Resend` re-prepares, gated by the cool-down and never while an
//!    attempt is in flight
//!
//! Retry is always user-initiated. A failed background poll reschedules
//! itself; only backend-reported expiry or failure is terminal.

use crate::environment::VerificationEnvironment;
use crate::error::FlowError;
use crate::events::{EmailLinkSignal, VerificationEvent};
use crate::resource::VerificationStatus;
use crate::state::{VerificationStage, VerificationState};
use crate::strategy::Strategy;
use authflow_core::effect::Effect;
use authflow_core::reducer::Reducer;
use authflow_core::{SmallVec, smallvec};

/// Backend code reported when a one-time code has expired.
const EXPIRED_CODE: &str = "verification_expired";

/// Verification sub-machine reducer.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationReducer;

type Effects = SmallVec<[Effect<VerificationEvent>; 4]>;

impl VerificationReducer {
    /// Schedule the next staleness poll when this factor verifies
    /// out-of-band.
    fn schedule_poll(state: &mut VerificationState, env: &VerificationEnvironment) -> Effects {
        if state.factor.strategy != Strategy::EmailLink {
            return smallvec![Effect::None];
        }

        state.polling = true;
        smallvec![Effect::Delay {
            duration: env.poll.next_delay(),
            action: Box::new(VerificationEvent::Poll),
        }]
    }

    /// Fire the prepare capability.
    fn prepare_effect(env: &VerificationEnvironment) -> Option<Effect<VerificationEvent>> {
        let prepare = env.prepare.clone()?;
        Some(Effect::future(async move {
            Some(match prepare().await {
                Ok(envelope) => VerificationEvent::Prepared { envelope },
                Err(error) => VerificationEvent::PrepareFailed { error },
            })
        }))
    }

    /// Settle a terminal stage: stop polling and drop in-flight effects.
    fn settle(state: &mut VerificationState, stage: VerificationStage) -> Effects {
        state.stage = stage;
        state.polling = false;
        smallvec![Effect::Invalidate]
    }
}

impl Reducer for VerificationReducer {
    type State = VerificationState;
    type Action = VerificationEvent;
    type Environment = VerificationEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        match action {
            // ═══════════════════════════════════════════════════════════
            // Prepare
            // ═══════════════════════════════════════════════════════════
            VerificationEvent::Prepare => {
                if state.stage.is_busy() {
                    return smallvec![Effect::None];
                }

                if state.already_prepared || env.prepare.is_none() {
                    // Nothing to send: either a prior step prepared this
                    // factor, or the strategy has no prepare step.
                    state.stage = VerificationStage::Pending;
                    return Self::schedule_poll(state, env);
                }

                state.stage = VerificationStage::Preparing;
                state.error = None;

                match Self::prepare_effect(env) {
                    Some(effect) => smallvec![effect],
                    None => smallvec![Effect::None],
                }
            },

            VerificationEvent::Prepared { envelope: _ } => {
                state.stage = VerificationStage::Pending;
                state.already_prepared = true;
                state.error = None;
                state.resend_available_at = Some(env.clock.now() + env.resend_cooldown);

                Self::schedule_poll(state, env)
            },

            VerificationEvent::PrepareFailed { error } => {
                tracing::warn!(error = %error, strategy = %state.factor.strategy, "factor prepare failed");
                state.stage = VerificationStage::Idle;
                state.error = Some(error);
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Attempt
            // ═══════════════════════════════════════════════════════════
            VerificationEvent::Submit { code } => {
                if state.stage != VerificationStage::Pending {
                    tracing::debug!(stage = ?state.stage, "submit ignored");
                    return smallvec![Effect::None];
                }

                state.stage = VerificationStage::Attempting;
                state.error = None;

                let attempt = env.attempt.clone();
                smallvec![Effect::future(async move {
                    Some(match attempt(code).await {
                        Ok(envelope) => VerificationEvent::Attempted { envelope },
                        Err(error) => VerificationEvent::AttemptFailed { error },
                    })
                })]
            },

            VerificationEvent::Attempted { envelope } => {
                state.error = None;

                if envelope.created_session_id().is_some() {
                    return Self::settle(state, VerificationStage::Verified);
                }

                let status = envelope
                    .verification_for(state.slot, state.factor.strategy)
                    .map(|verification| verification.status);

                match status {
                    // No verification left on the snapshot means the flow
                    // moved past this step.
                    Some(VerificationStatus::Verified) | None => {
                        Self::settle(state, VerificationStage::Verified)
                    },
                    Some(VerificationStatus::Expired) => {
                        Self::settle(state, VerificationStage::Expired)
                    },
                    Some(VerificationStatus::Failed) => {
                        Self::settle(state, VerificationStage::Failed)
                    },
                    Some(VerificationStatus::Transferable) => {
                        Self::settle(state, VerificationStage::Transferable)
                    },
                    Some(VerificationStatus::Unverified) => {
                        Self::settle(state, VerificationStage::Unverified)
                    },
                    Some(VerificationStatus::Pending) => {
                        state.stage = VerificationStage::Pending;
                        smallvec![Effect::None]
                    },
                }
            },

            VerificationEvent::AttemptFailed { error } => {
                tracing::warn!(error = %error, strategy = %state.factor.strategy, "factor attempt failed");

                let expired = error
                    .api()
                    .is_some_and(|api| api.has_code(EXPIRED_CODE));

                if expired {
                    state.error = Some(error);
                    return Self::settle(state, VerificationStage::Expired);
                }

                // Wrong code and validation errors are re-enterable.
                state.stage = VerificationStage::Pending;
                state.error = Some(error);
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Resend
            // ═══════════════════════════════════════════════════════════
            VerificationEvent::Resend => {
                if !state.can_resend(env.clock.now()) {
                    tracing::debug!("resend ignored, busy or cooling down");
                    return smallvec![Effect::None];
                }

                let Some(effect) = Self::prepare_effect(env) else {
                    return smallvec![Effect::None];
                };

                state.stage = VerificationStage::Preparing;
                state.error = None;
                state.polling = false;

                smallvec![Effect::Invalidate, effect]
            },

            // ═══════════════════════════════════════════════════════════
            // Out-of-band polling (email link)
            // ═══════════════════════════════════════════════════════════
            VerificationEvent::Poll => {
                if !state.polling || state.stage != VerificationStage::Pending {
                    return smallvec![Effect::None];
                }

                let reload = env.reload.clone();
                smallvec![Effect::future(async move {
                    Some(match reload().await {
                        Ok(envelope) => VerificationEvent::PollResolved { envelope },
                        Err(error) => VerificationEvent::PollFailed { error },
                    })
                })]
            },

            VerificationEvent::PollResolved { envelope } => {
                if !state.polling {
                    return smallvec![Effect::None];
                }

                // A locally visible session means the link completed in
                // this tab's context; a verified status without one means
                // another tab finished the flow.
                if envelope.created_session_id().is_some() {
                    return Self::settle(state, VerificationStage::Verified);
                }

                let status = envelope
                    .verification_for(state.slot, state.factor.strategy)
                    .map(|verification| verification.status);

                match status {
                    Some(VerificationStatus::Verified) => {
                        Self::settle(state, VerificationStage::VerifiedSwitchTab)
                    },
                    Some(VerificationStatus::Expired) => {
                        Self::settle(state, VerificationStage::Expired)
                    },
                    Some(VerificationStatus::Failed) => {
                        Self::settle(state, VerificationStage::Failed)
                    },
                    Some(VerificationStatus::Transferable) => {
                        Self::settle(state, VerificationStage::Transferable)
                    },
                    _ => smallvec![Effect::Delay {
                        duration: env.poll.next_delay(),
                        action: Box::new(VerificationEvent::Poll),
                    }],
                }
            },

            VerificationEvent::PollFailed { error } => {
                if !state.polling {
                    return smallvec![Effect::None];
                }

                // A single failed reload is transient; keep polling.
                tracing::warn!(error = %error, "email link poll failed, retrying");
                smallvec![Effect::Delay {
                    duration: env.poll.next_delay(),
                    action: Box::new(VerificationEvent::Poll),
                }]
            },

            // ═══════════════════════════════════════════════════════════
            // Out-of-band signals
            // ═══════════════════════════════════════════════════════════
            VerificationEvent::EmailLink { signal } => match signal {
                // The signal originates from the completing tab, so this
                // tab shows the switch-tab variant.
                EmailLinkSignal::Verified => {
                    Self::settle(state, VerificationStage::VerifiedSwitchTab)
                },
                EmailLinkSignal::Unverified => Self::settle(state, VerificationStage::Unverified),
                EmailLinkSignal::Expired => Self::settle(state, VerificationStage::Expired),
                EmailLinkSignal::Transferable => {
                    Self::settle(state, VerificationStage::Transferable)
                },
                EmailLinkSignal::Failure => Self::settle(state, VerificationStage::Failed),
                EmailLinkSignal::Restart => {
                    let Some(effect) = Self::prepare_effect(env) else {
                        return smallvec![Effect::None];
                    };

                    state.stage = VerificationStage::Preparing;
                    state.error = None;
                    state.polling = false;

                    smallvec![Effect::Invalidate, effect]
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ApiErrorDetail};
    use crate::mocks::FixedClock;
    use crate::resource::{
        Factor, ResourceEnvelope, SignInResource, SignInStatus, Verification, VerificationSlot,
    };
    use authflow_core::environment::Clock;
    use authflow_runtime::poll::PollPolicy;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn envelope_with(verification: Verification) -> ResourceEnvelope {
        ResourceEnvelope::SignIn(SignInResource {
            status: SignInStatus::NeedsFirstFactor,
            first_factor_verification: Some(verification),
            ..SignInResource::default()
        })
    }

    fn test_env(with_prepare: bool) -> VerificationEnvironment {
        let pending = envelope_with(Verification::pending(Strategy::EmailCode));

        let prepare_result = pending.clone();
        let attempt_result = pending.clone();

        VerificationEnvironment {
            prepare: with_prepare.then(|| {
                let result = prepare_result;
                let call: crate::environment::VerificationCall = Arc::new(move || {
                    let result = result.clone();
                    Box::pin(async move { Ok(result) })
                });
                call
            }),
            attempt: Arc::new(move |_code| {
                let result = attempt_result.clone();
                Box::pin(async move { Ok(result) })
            }),
            reload: Arc::new(move || {
                let result = pending.clone();
                Box::pin(async move { Ok(result) })
            }),
            clock: Arc::new(FixedClock::at(Utc::now())),
            poll: PollPolicy::builder()
                .interval(Duration::from_secs(300))
                .jitter(0.0)
                .build(),
            resend_cooldown: chrono::Duration::seconds(30),
        }
    }

    fn state_for(strategy: Strategy) -> VerificationState {
        VerificationState::new(Factor::new(strategy), VerificationSlot::SignInFirst, false)
    }

    #[test]
    fn prepare_on_mount_enters_preparing() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailCode);

        let effects = reducer.reduce(&mut state, VerificationEvent::Prepare, &env);

        assert_eq!(state.stage, VerificationStage::Preparing);
        assert!(effects.iter().any(|e| matches!(e, Effect::Future(_))));
    }

    #[test]
    fn already_prepared_factor_skips_straight_to_pending() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailCode);
        state.already_prepared = true;

        let effects = reducer.reduce(&mut state, VerificationEvent::Prepare, &env);

        assert_eq!(state.stage, VerificationStage::Pending);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Future(_))));
    }

    #[test]
    fn prepared_sets_cooldown_and_pending() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailCode);
        state.stage = VerificationStage::Preparing;

        reducer.reduce(
            &mut state,
            VerificationEvent::Prepared {
                envelope: envelope_with(Verification::pending(Strategy::EmailCode)),
            },
            &env,
        );

        assert_eq!(state.stage, VerificationStage::Pending);
        assert!(state.already_prepared);
        assert!(state.resend_available_at.is_some());
    }

    #[test]
    fn email_link_prepare_schedules_poll() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailLink);
        state.stage = VerificationStage::Preparing;

        let effects = reducer.reduce(
            &mut state,
            VerificationEvent::Prepared {
                envelope: envelope_with(Verification::pending(Strategy::EmailLink)),
            },
            &env,
        );

        assert!(state.polling);
        assert!(effects.iter().any(|e| matches!(e, Effect::Delay { .. })));
    }

    #[test]
    fn submit_is_gated_while_attempting() {
        let mut state = state_for(Strategy::EmailCode);
        state.stage = VerificationStage::Attempting;

        authflow_testing::ReducerTest::new(VerificationReducer)
            .with_env(test_env(true))
            .given_state(state)
            .when_action(VerificationEvent::Submit {
                code: "424242".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.stage, VerificationStage::Attempting);
            })
            .then_effects(authflow_testing::assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn submit_from_pending_fires_the_attempt() {
        let mut state = state_for(Strategy::EmailCode);
        state.stage = VerificationStage::Pending;

        authflow_testing::ReducerTest::new(VerificationReducer)
            .with_env(test_env(true))
            .given_state(state)
            .when_action(VerificationEvent::Submit {
                code: "424242".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.stage, VerificationStage::Attempting);
            })
            .then_effects(authflow_testing::assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn attempt_with_session_settles_verified() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailCode);
        state.stage = VerificationStage::Attempting;

        let complete = ResourceEnvelope::SignIn(SignInResource {
            status: SignInStatus::Complete,
            created_session_id: Some("sess_1".to_string()),
            ..SignInResource::default()
        });

        reducer.reduce(
            &mut state,
            VerificationEvent::Attempted { envelope: complete },
            &env,
        );

        assert_eq!(state.stage, VerificationStage::Verified);
    }

    #[test]
    fn wrong_code_stays_reenterable() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailCode);
        state.stage = VerificationStage::Attempting;

        let error = FlowError::from(ApiError::single(
            ApiErrorDetail::new("form_code_incorrect", "Incorrect code").with_param("code"),
        ));

        reducer.reduce(&mut state, VerificationEvent::AttemptFailed { error }, &env);

        assert_eq!(state.stage, VerificationStage::Pending);
        assert!(state.error.is_some());
    }

    #[test]
    fn expired_code_maps_to_expired_stage() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailCode);
        state.stage = VerificationStage::Attempting;

        let error = FlowError::from(ApiError::single(ApiErrorDetail::new(
            EXPIRED_CODE,
            "Code expired",
        )));

        reducer.reduce(&mut state, VerificationEvent::AttemptFailed { error }, &env);

        assert_eq!(state.stage, VerificationStage::Expired);
    }

    #[test]
    fn resend_respects_cooldown() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let now = env.clock.now();

        let mut state = state_for(Strategy::EmailCode);
        state.stage = VerificationStage::Pending;
        state.resend_available_at = Some(now + chrono::Duration::seconds(10));

        let effects = reducer.reduce(&mut state, VerificationEvent::Resend, &env);

        // Still cooling down: no prepare fired.
        assert_eq!(state.stage, VerificationStage::Pending);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Future(_))));
    }

    #[test]
    fn resend_invalidates_and_reprepares() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailCode);
        state.stage = VerificationStage::Pending;

        let effects = reducer.reduce(&mut state, VerificationEvent::Resend, &env);

        assert_eq!(state.stage, VerificationStage::Preparing);
        assert!(effects.iter().any(|e| matches!(e, Effect::Invalidate)));
        assert!(effects.iter().any(|e| matches!(e, Effect::Future(_))));
    }

    #[test]
    fn poll_verified_without_session_is_switch_tab() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailLink);
        state.stage = VerificationStage::Pending;
        state.polling = true;

        let verified = envelope_with(Verification {
            status: VerificationStatus::Verified,
            strategy: Some(Strategy::EmailLink),
            external_verification_redirect_url: None,
        });

        reducer.reduce(
            &mut state,
            VerificationEvent::PollResolved { envelope: verified },
            &env,
        );

        assert_eq!(state.stage, VerificationStage::VerifiedSwitchTab);
        assert!(!state.polling);
    }

    #[test]
    fn pending_poll_reschedules() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailLink);
        state.stage = VerificationStage::Pending;
        state.polling = true;

        let effects = reducer.reduce(
            &mut state,
            VerificationEvent::PollResolved {
                envelope: envelope_with(Verification::pending(Strategy::EmailLink)),
            },
            &env,
        );

        assert!(state.polling);
        assert!(effects.iter().any(|e| matches!(e, Effect::Delay { .. })));
    }

    #[test]
    fn poll_failure_is_transient() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailLink);
        state.stage = VerificationStage::Pending;
        state.polling = true;

        let effects = reducer.reduce(
            &mut state,
            VerificationEvent::PollFailed {
                error: FlowError::network("connection reset"),
            },
            &env,
        );

        // Not terminal; the next poll is scheduled.
        assert_eq!(state.stage, VerificationStage::Pending);
        assert!(effects.iter().any(|e| matches!(e, Effect::Delay { .. })));
    }

    #[test]
    fn restart_signal_reenters_preparing() {
        let reducer = VerificationReducer;
        let env = test_env(true);
        let mut state = state_for(Strategy::EmailLink);
        state.stage = VerificationStage::Expired;

        let effects = reducer.reduce(
            &mut state,
            VerificationEvent::EmailLink {
                signal: EmailLinkSignal::Restart,
            },
            &env,
        );

        assert_eq!(state.stage, VerificationStage::Preparing);
        assert!(effects.iter().any(|e| matches!(e, Effect::Invalidate)));
    }
}
