//! Machine context types.
//!
//! Each machine owns a context struct: route tag, the latest resource
//! snapshot, error slots, and - for router machines - the handle of the
//! currently mounted verification sub-machine. Contexts are `Clone` so the
//! runtime can publish snapshots through its state watch channel.

use crate::error::{ErrorSlots, FlowError};
use crate::events::VerificationEvent;
use crate::resource::{Factor, SignInResource, SignUpResource, VerificationSlot};
use crate::router::RouterContext;
use crate::routes::{SignInRoute, SignUpRoute};
use crate::strategy::Strategy;
use authflow_runtime::MachineHandle;
use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;

/// Handle to a spawned verification sub-machine.
pub type VerificationHandle = MachineHandle<VerificationState, VerificationEvent>;

/// A mounted verification child: its actor handle plus the forwarding
/// subscription that reports its events to the parent.
#[derive(Debug, Clone)]
pub struct ChildSlot {
    /// The child machine.
    pub handle: VerificationHandle,

    /// Forwarding task piping child reports into the parent mailbox.
    pub forwarding: AbortHandle,
}

impl ChildSlot {
    /// Stop the child and tear down its forwarding subscription.
    ///
    /// Aborting the child also aborts its in-flight effects, so pending
    /// polls cannot re-enter a machine that has moved on.
    pub fn teardown(&self) {
        self.forwarding.abort();
        self.handle.stop();
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Verification Context
// ═══════════════════════════════════════════════════════════════════════

/// Stage of a verification sub-machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationStage {
    /// Mounted, nothing prepared yet.
    #[default]
    Idle,
    /// Prepare call in flight.
    Preparing,
    /// Awaiting the user's code entry or an out-of-band confirmation.
    Pending,
    /// Attempt call in flight.
    Attempting,
    /// Verified in this tab.
    Verified,
    /// Verified from another tab (email link).
    VerifiedSwitchTab,
    /// The code or link expired.
    Expired,
    /// Verification failed terminally.
    Failed,
    /// Verification resolved to the opposite flow.
    Transferable,
    /// The link was opened but could not be verified.
    Unverified,
}

impl VerificationStage {
    /// Whether the stage is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Verified
                | Self::VerifiedSwitchTab
                | Self::Expired
                | Self::Failed
                | Self::Transferable
                | Self::Unverified
        )
    }

    /// Whether an async call is in flight; gates resubmission and resend.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Preparing | Self::Attempting)
    }
}

/// Context of one verification sub-machine.
#[derive(Debug, Clone)]
pub struct VerificationState {
    /// The factor being verified.
    pub factor: Factor,

    /// Which slot of which flow this verification serves.
    pub slot: VerificationSlot,

    /// Current stage.
    pub stage: VerificationStage,

    /// Whether the factor was already prepared by a prior step; skips the
    /// prepare-on-mount (prevents duplicate code sends).
    pub already_prepared: bool,

    /// Inline error for the current attempt, if any.
    pub error: Option<FlowError>,

    /// Earliest time a resend is allowed.
    pub resend_available_at: Option<DateTime<Utc>>,

    /// Whether a staleness poll is scheduled.
    pub polling: bool,
}

impl VerificationState {
    /// Fresh context for a factor.
    #[must_use]
    pub const fn new(factor: Factor, slot: VerificationSlot, already_prepared: bool) -> Self {
        Self {
            factor,
            slot,
            stage: VerificationStage::Idle,
            already_prepared,
            error: None,
            resend_available_at: None,
            polling: false,
        }
    }

    /// Whether a resend is allowed at `now`.
    #[must_use]
    pub fn can_resend(&self, now: DateTime<Utc>) -> bool {
        !self.stage.is_busy()
            && self
                .resend_available_at
                .is_none_or(|available| now >= available)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Sign-In Context
// ═══════════════════════════════════════════════════════════════════════

/// Context of the sign-in router machine.
#[derive(Debug, Clone, Default)]
pub struct SignInState {
    /// Active route tag.
    pub route: SignInRoute,

    /// Route to return to after error recovery or `Prev`.
    pub prior_route: Option<SignInRoute>,

    /// Latest resource snapshot; replaced wholesale on every response.
    pub resource: Option<SignInResource>,

    /// The first factor currently being verified.
    pub current_first_factor: Option<Factor>,

    /// The second factor currently being verified.
    pub current_second_factor: Option<Factor>,

    /// Navigation context.
    pub router: RouterContext,

    /// Error display slots.
    pub errors: ErrorSlots,

    /// Unrecoverable error shown on the error route.
    pub fatal: Option<FlowError>,

    /// Whether a machine-level async call is in flight.
    pub loading: bool,

    /// The mounted verification sub-machine, if any.
    pub verification: Option<ChildSlot>,

    /// Strategies already prepared during this flow; re-mounting one of
    /// them skips the prepare (no duplicate sends).
    pub prepared: Vec<Strategy>,

    /// When the last prepare completed.
    pub last_prepared_at: Option<DateTime<Utc>>,

    /// Session already handed off, to keep re-delivered `complete`
    /// snapshots from double-activating.
    pub activated_session: Option<String>,
}

impl SignInState {
    /// The active route tag.
    #[must_use]
    pub const fn active_route(&self) -> SignInRoute {
        self.route
    }

    /// Whether a step is the operationally active one.
    #[must_use]
    pub fn is_step_active(&self, route: SignInRoute) -> bool {
        self.route == route
    }

    /// Whether a factor step is mounted.
    ///
    /// During the first-to-second-factor transition both factor steps may
    /// be mounted; only [`SignInState::is_step_active`] is exclusive.
    #[must_use]
    pub fn is_factor_step_mounted(&self, route: SignInRoute) -> bool {
        match route {
            SignInRoute::FirstFactor => {
                self.current_first_factor.is_some()
                    && matches!(
                        self.route,
                        SignInRoute::FirstFactor | SignInRoute::SecondFactor
                    )
            },
            SignInRoute::SecondFactor => {
                self.current_second_factor.is_some() && self.route == SignInRoute::SecondFactor
            },
            _ => self.is_step_active(route),
        }
    }

    /// Whether the machine or its mounted verification is busy.
    ///
    /// Gates resubmission, not input.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
            || self
                .verification
                .as_ref()
                .is_some_and(|child| child.handle.state().stage.is_busy())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Sign-Up Context
// ═══════════════════════════════════════════════════════════════════════

/// Context of the sign-up router machine.
#[derive(Debug, Clone, Default)]
pub struct SignUpState {
    /// Active route tag.
    pub route: SignUpRoute,

    /// Route to return to after error recovery or `Prev`.
    pub prior_route: Option<SignUpRoute>,

    /// Latest resource snapshot; replaced wholesale on every response.
    pub resource: Option<SignUpResource>,

    /// Navigation context.
    pub router: RouterContext,

    /// Error display slots.
    pub errors: ErrorSlots,

    /// Unrecoverable error shown on the error route.
    pub fatal: Option<FlowError>,

    /// Whether a machine-level async call is in flight.
    pub loading: bool,

    /// Whether this sign-up was transferred in from a sign-in.
    pub transfer: bool,

    /// The mounted verification sub-machine, if any.
    pub verification: Option<ChildSlot>,

    /// Strategy currently being verified.
    pub pending_strategy: Option<Strategy>,

    /// Strategies already prepared during this flow.
    pub prepared: Vec<Strategy>,

    /// When the last prepare completed.
    pub last_prepared_at: Option<DateTime<Utc>>,

    /// Session already handed off.
    pub activated_session: Option<String>,
}

impl SignUpState {
    /// The active route tag.
    #[must_use]
    pub const fn active_route(&self) -> SignUpRoute {
        self.route
    }

    /// Whether a step is the operationally active one.
    #[must_use]
    pub fn is_step_active(&self, route: SignUpRoute) -> bool {
        self.route == route
    }

    /// Whether the machine or its mounted verification is busy.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
            || self
                .verification
                .as_ref()
                .is_some_and(|child| child.handle.state().stage.is_busy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sign_in_state_starts_at_start() {
        let state = SignInState::default();
        assert_eq!(state.active_route(), SignInRoute::Start);
        assert!(state.is_step_active(SignInRoute::Start));
        assert!(!state.is_loading());
    }

    #[test]
    fn factor_step_overlap_is_limited_to_factor_routes() {
        let mut state = SignInState {
            route: SignInRoute::SecondFactor,
            current_first_factor: Some(Factor::new(Strategy::EmailCode)),
            current_second_factor: Some(Factor::new(Strategy::Totp)),
            ..SignInState::default()
        };

        // Both factor steps mounted, only second is active.
        assert!(state.is_factor_step_mounted(SignInRoute::FirstFactor));
        assert!(state.is_factor_step_mounted(SignInRoute::SecondFactor));
        assert!(state.is_step_active(SignInRoute::SecondFactor));
        assert!(!state.is_step_active(SignInRoute::FirstFactor));

        state.route = SignInRoute::Start;
        assert!(!state.is_factor_step_mounted(SignInRoute::FirstFactor));
    }

    #[test]
    fn resend_gating_honors_cooldown() {
        let now = Utc::now();
        let mut verification = VerificationState::new(
            Factor::new(Strategy::EmailCode),
            VerificationSlot::SignInFirst,
            false,
        );

        verification.stage = VerificationStage::Pending;
        assert!(verification.can_resend(now));

        verification.resend_available_at = Some(now + chrono::Duration::seconds(30));
        assert!(!verification.can_resend(now));
        assert!(verification.can_resend(now + chrono::Duration::seconds(31)));

        verification.stage = VerificationStage::Attempting;
        assert!(!verification.can_resend(now + chrono::Duration::seconds(31)));
    }
}
