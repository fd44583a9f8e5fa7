//! Cross-flow transfer wiring.
//!
//! When a backend reports `transferable`, the owning machine raises a
//! `Transfer` event; the opposite machine picks the flow up. The wiring is
//! actor-to-actor: each machine's broadcast output is forwarded into the
//! other's mailbox, never mutated directly.

use crate::events::{SignInEvent, SignUpEvent};
use crate::state::{SignInState, SignUpState};
use authflow_runtime::MachineHandle;
use tokio::task::AbortHandle;

/// Forwarding subscriptions created by [`link_transfer`].
#[derive(Debug)]
pub struct TransferLink {
    /// Sign-in → sign-up forwarding task.
    pub sign_in_to_sign_up: AbortHandle,

    /// Sign-up → sign-in forwarding task.
    pub sign_up_to_sign_in: AbortHandle,
}

impl TransferLink {
    /// Tear down both forwarding subscriptions.
    pub fn teardown(&self) {
        self.sign_in_to_sign_up.abort();
        self.sign_up_to_sign_in.abort();
    }
}

/// Wire transfer hand-off between a sign-in and a sign-up machine.
///
/// A sign-in `Transfer` initializes the sign-up machine with
/// `transfer: true`, so fields the backend already knows are not
/// re-collected. A sign-up `Transfer` re-initializes the sign-in machine.
pub fn link_transfer(
    sign_in: &MachineHandle<SignInState, SignInEvent>,
    sign_up: &MachineHandle<SignUpState, SignUpEvent>,
) -> TransferLink {
    let sign_in_to_sign_up = sign_in.forward(sign_up.mailbox(), |event| match event {
        SignInEvent::Transfer => Some(SignUpEvent::Init { transfer: true }),
        _ => None,
    });

    let sign_up_to_sign_in = sign_up.forward(sign_in.mailbox(), |event| match event {
        SignUpEvent::Transfer => Some(SignInEvent::Init),
        _ => None,
    });

    TransferLink {
        sign_in_to_sign_up,
        sign_up_to_sign_in,
    }
}
