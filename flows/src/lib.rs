//! # Authflow Flows
//!
//! The authentication-flow engine: finite-state-machine routers for
//! multi-step sign-in and sign-up, coordinating asynchronous verification
//! (password, email code, email link, phone code, `OAuth`/`SSO` transfer,
//! passkeys, `TOTP`, backup codes) against an opaque identity backend, and
//! exposing a declarative, render-agnostic routing/step API.
//!
//! ## Architecture
//!
//! Flows are reducers run by the `authflow-runtime` machine actor:
//!
//! ```text
//! Event → Reducer → (State, Effects) → Effect Execution → More Events
//! ```
//!
//! The sign-in and sign-up router machines spawn per-factor verification
//! sub-machines as child actors, hold their handles in context, and react
//! to their forwarded reports. Navigation goes through the host-agnostic
//! [`router::FlowRouter`] capability with a no-op guard against redundant
//! history entries.
//!
//! ## Example: driving a sign-in
//!
//! ```rust,ignore
//! use authflow_flows::prelude::*;
//!
//! let env = FlowEnvironment::new(client, sessions, router, platform,
//!     FormStore::new(), Arc::new(SystemClock), FlowConfig::default());
//!
//! let sign_in = authflow_runtime::spawn(
//!     SignInReducer::new(), SignInState::default(), env);
//!
//! sign_in.send(SignInEvent::Init)?;
//! form.set_field("identifier", "user@example.com")?;
//! sign_in.send(SignInEvent::Submit)?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod environment;
pub mod error;
pub mod events;
pub mod form;
pub mod handoff;
pub mod matcher;
pub mod params;
pub mod providers;
pub mod reducers;
pub mod resource;
pub mod router;
pub mod routes;
pub mod state;
pub mod strategy;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::FlowConfig;
pub use environment::{FlowEnvironment, VerificationEnvironment};
pub use error::{ApiError, ApiErrorDetail, ErrorSlots, FlowError, Result};
pub use events::{EmailLinkSignal, SignInEvent, SignInNavigationIntent, SignUpEvent,
    VerificationEvent};
pub use form::{FieldType, FieldValue, FormStore};
pub use matcher::PreferredStrategy;
pub use reducers::{SignInReducer, SignUpReducer, VerificationReducer};
pub use resource::{
    Factor, ResourceEnvelope, SignInResource, SignInStatus, SignUpResource, SignUpStatus,
    Verification, VerificationSlot, VerificationStatus,
};
pub use router::{FlowRouter, NavigationMode, RouterContext, SearchParams};
pub use routes::{SignInRoute, SignUpRoute};
pub use state::{ChildSlot, SignInState, SignUpState, VerificationStage, VerificationState};
pub use strategy::{OauthProvider, Strategy};

/// Convenience prelude for hosts embedding the flows.
pub mod prelude {
    pub use crate::config::FlowConfig;
    pub use crate::environment::FlowEnvironment;
    pub use crate::events::{SignInEvent, SignUpEvent, VerificationEvent};
    pub use crate::form::FormStore;
    pub use crate::handoff::link_transfer;
    pub use crate::providers::{Platform, SessionActivator, SignInApi, SignUpApi};
    pub use crate::reducers::{SignInReducer, SignUpReducer};
    pub use crate::router::FlowRouter;
    pub use crate::routes::{SignInRoute, SignUpRoute};
    pub use crate::state::{SignInState, SignUpState};
}
