//! Flow events.
//!
//! The complete input vocabularies of the three machines. Following the
//! architecture's command/event split: some variants are user intents
//! (`Submit`, `Navigate`), the rest are completions produced by effects or
//! reports forwarded from child machines.

use crate::error::FlowError;
use crate::resource::{Factor, ResourceEnvelope, SignInResource, SignUpResource};
use crate::router::SearchParams;
use crate::state::ChildSlot;
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Sign-In Events
// ═══════════════════════════════════════════════════════════════════════

/// Lateral navigation intents available from factor steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignInNavigationIntent {
    /// Show the alternative-method picker.
    ChooseStrategy,
    /// Start the password-reset path.
    ForgotPassword,
}

/// Input vocabulary of the sign-in router machine.
#[derive(Debug, Clone)]
pub enum SignInEvent {
    /// Seed the machine from the router adapter; dispatched on mount and
    /// on transfer-in from sign-up.
    Init,

    /// Submit the current step's form.
    Submit,

    /// A fresh resource snapshot to route on.
    ///
    /// This is the central transition driver: backend responses, child
    /// verification outcomes, and callback reloads all funnel into it.
    Next {
        /// The snapshot to inspect.
        resource: SignInResource,
    },

    /// An async operation failed.
    Failure {
        /// The classified failure.
        error: FlowError,
    },

    /// User-driven lateral navigation, always permitted from factor steps.
    Navigate {
        /// Where to go.
        intent: SignInNavigationIntent,
    },

    /// Return to the previous step.
    Prev,

    /// User picked an alternative method on the choose-strategy step.
    ChooseFactor {
        /// The chosen factor.
        factor: Factor,
    },

    /// Child report: a factor was prepared (code/link sent).
    ///
    /// Resets the resend window for that strategy.
    FactorPrepared {
        /// The prepared strategy.
        strategy: Strategy,
    },

    /// A verification sub-machine was spawned; carries its handle into
    /// the machine context.
    VerificationMounted {
        /// Handle and forwarding subscription of the child.
        child: ChildSlot,
    },

    /// Child report: an attempt or poll resolved with a fresh resource.
    VerificationOutcome {
        /// Snapshot reported by the child.
        envelope: ResourceEnvelope,
    },

    /// Child report: verification failed in an unrecoverable way.
    VerificationFailed {
        /// The failure.
        error: FlowError,
    },

    /// The backend determined a sign-up is required instead.
    Transfer,

    /// Leave the application for an `OAuth`/`SSO` provider.
    Redirect {
        /// Absolute provider URL.
        url: String,
    },

    /// Host navigation happened underneath the machine (`popstate`).
    RouterSync {
        /// New pathname.
        pathname: String,
        /// New query parameters.
        search_params: SearchParams,
    },

    /// The session hand-off completed.
    SessionActivated {
        /// The activated session.
        session_id: String,
    },
}

// ═══════════════════════════════════════════════════════════════════════
// Verification Events
// ═══════════════════════════════════════════════════════════════════════

/// Out-of-band email-link resolution signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailLinkSignal {
    /// The link was confirmed.
    Verified,
    /// The link was opened but could not be verified.
    Unverified,
    /// The link expired.
    Expired,
    /// The link resolved to the opposite flow.
    Transferable,
    /// Restart the link flow (new email).
    Restart,
    /// The out-of-band channel reported a failure.
    Failure,
}

/// Input vocabulary of a verification sub-machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationEvent {
    /// Prepare the factor unless already prepared.
    Prepare,

    /// Prepare completed.
    Prepared {
        /// Snapshot returned by the prepare call.
        envelope: ResourceEnvelope,
    },

    /// Prepare failed.
    PrepareFailed {
        /// The failure.
        error: FlowError,
    },

    /// User submitted a code (or secret) for this factor.
    Submit {
        /// The entered value.
        code: String,
    },

    /// Attempt completed; the enclosed resource decides the outcome.
    Attempted {
        /// Snapshot returned by the attempt call.
        envelope: ResourceEnvelope,
    },

    /// Attempt failed.
    AttemptFailed {
        /// The failure.
        error: FlowError,
    },

    /// User asked for the code/link to be sent again.
    Resend,

    /// Poll tick for out-of-band verification.
    Poll,

    /// Background reload completed.
    PollResolved {
        /// Snapshot returned by the reload.
        envelope: ResourceEnvelope,
    },

    /// Background reload failed; transient by policy.
    PollFailed {
        /// The failure.
        error: FlowError,
    },

    /// Out-of-band email-link signal from another tab.
    EmailLink {
        /// The signal.
        signal: EmailLinkSignal,
    },
}

// ═══════════════════════════════════════════════════════════════════════
// Sign-Up Events
// ═══════════════════════════════════════════════════════════════════════

/// Input vocabulary of the sign-up router machine.
#[derive(Debug, Clone)]
pub enum SignUpEvent {
    /// Seed the machine from the router adapter.
    Init {
        /// Whether this sign-up was transferred in from a sign-in
        /// (fields already known to the backend are not re-collected).
        transfer: bool,
    },

    /// Submit the current step's form.
    Submit,

    /// Return to the previous step.
    Prev,

    /// A fresh resource snapshot to route on.
    Next {
        /// The snapshot to inspect.
        resource: SignUpResource,
    },

    /// An async operation failed.
    Failure {
        /// The classified failure.
        error: FlowError,
    },

    /// Child report: a verification was prepared.
    FactorPrepared {
        /// The prepared strategy.
        strategy: Strategy,
    },

    /// A verification sub-machine was spawned.
    VerificationMounted {
        /// Handle and forwarding subscription of the child.
        child: ChildSlot,
    },

    /// Child report: an attempt or poll resolved with a fresh resource.
    VerificationOutcome {
        /// Snapshot reported by the child.
        envelope: ResourceEnvelope,
    },

    /// Child report: verification failed in an unrecoverable way.
    VerificationFailed {
        /// The failure.
        error: FlowError,
    },

    /// The backend determined a sign-in is required instead.
    Transfer,

    /// Leave the application for an `OAuth`/`SSO` provider.
    Redirect {
        /// Absolute provider URL.
        url: String,
    },

    /// Host navigation happened underneath the machine (`popstate`).
    RouterSync {
        /// New pathname.
        pathname: String,
        /// New query parameters.
        search_params: SearchParams,
    },

    /// The session hand-off completed.
    SessionActivated {
        /// The activated session.
        session_id: String,
    },
}
