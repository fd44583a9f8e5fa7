//! # Authflow Core
//!
//! Core traits and types for the Authflow state-machine architecture.
//!
//! This crate provides the fundamental abstractions for building
//! event-driven authentication flows using the Reducer pattern:
//!
//! - **State**: the context of one flow machine
//! - **Event**: all possible inputs to a reducer (user intents, async
//!   completions, child-machine reports)
//! - **Reducer**: pure transition function `(State, Event, Environment) →
//!   (State, Effects)`
//! - **Effect**: side-effect descriptions (not execution)
//! - **Environment**: injected dependencies via traits
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell: reducers decide, the runtime acts
//! - Unidirectional data flow: events in, effects out, completions back in
//! - Explicit effects: no hidden I/O inside a transition
//! - Run-to-completion: a transition finishes before the next event starts
//!
//! ## Example
//!
//! ```ignore
//! use authflow_core::{Effect, Reducer, SmallVec, smallvec};
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = i64;
//!     type Action = Tick;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut i64,
//!         _action: Tick,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<Tick>; 4]> {
//!         *state += 1;
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub use effect::Effect;
pub use mailbox::{Envelope, Mailbox, MailboxError};
pub use reducer::Reducer;

/// Reducer module - the core trait for transition logic
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for flow transition logic.
    ///
    /// # Type Parameters
    ///
    /// - `State`: the machine context this reducer operates on
    /// - `Action`: the event type this reducer processes
    /// - `Environment`: the injected dependencies this reducer needs
    ///
    /// A reducer is a pure function: it validates the event, updates state
    /// in place, and returns effect descriptions for the runtime to execute.
    /// It must not perform I/O itself.
    pub trait Reducer {
        /// The machine context this reducer operates on.
        type State;

        /// The event type this reducer processes.
        type Action;

        /// The environment type with injected dependencies.
        type Environment;

        /// Reduce an event into state changes and effects.
        ///
        /// # Arguments
        ///
        /// - `state`: mutable reference to the machine context
        /// - `action`: the event to process
        /// - `env`: reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime, in order.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side-effect descriptions
///
/// Effects describe side effects to be performed by the runtime. They are
/// values (not execution) and are composable and cancellable.
pub mod effect {
    use super::mailbox::Mailbox;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Boxed future produced by an async effect.
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Boxed synchronous effect body.
    ///
    /// Receives the machine's own mailbox so it can wire child machines or
    /// observers back into the feedback loop. Returning `Some(action)`
    /// dispatches that action before the next external event is processed.
    pub type SyncEffect<Action> = Box<dyn FnOnce(&Mailbox<Action>) -> Option<Action> + Send>;

    /// Effect type - describes a side effect to be executed.
    ///
    /// Effects are NOT executed immediately. They are descriptions of what
    /// should happen, returned from reducers and executed by the machine
    /// runtime.
    ///
    /// # Ordering
    ///
    /// `Sync` effects (and the follow-up actions they return) complete
    /// before the machine processes its next mailbox event. `Future` and
    /// `Delay` completions re-enter through the mailbox, tagged with the
    /// epoch current at spawn time, and are dropped if an `Invalidate`
    /// has advanced the epoch since.
    pub enum Effect<Action> {
        /// No-op effect.
        None,

        /// Synchronous side effect, run in order within the transition.
        ///
        /// Used for navigation and child-machine lifecycle, where ordering
        /// relative to state updates is part of the contract.
        Sync(SyncEffect<Action>),

        /// Arbitrary async computation.
        ///
        /// Returns `Option<Action>` - if `Some`, the action is fed back
        /// into the reducer through the mailbox.
        Future(EffectFuture<Action>),

        /// Delayed action (for polling intervals and cool-downs).
        Delay {
            /// How long to wait.
            duration: Duration,
            /// Action to dispatch after the delay.
            action: Box<Action>,
        },

        /// Run effects sequentially.
        Sequential(Vec<Effect<Action>>),

        /// Run effects in parallel.
        Parallel(Vec<Effect<Action>>),

        /// Advance the machine's epoch, discarding the results of every
        /// async effect still in flight.
        ///
        /// The guard for navigating away from a step: late responses must
        /// not re-enter a machine that has moved on.
        Invalidate,
    }

    // Manual Debug implementation since Future and FnOnce don't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Sync(_) => write!(f, "Effect::Sync(<closure>)"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Invalidate => write!(f, "Effect::Invalidate"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap an async computation into an effect.
        pub fn future<F>(fut: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Wrap a synchronous side effect into an effect.
        pub fn sync<F>(f: F) -> Effect<Action>
        where
            F: FnOnce(&Mailbox<Action>) -> Option<Action> + Send + 'static,
        {
            Effect::Sync(Box::new(f))
        }

        /// Combine effects to run in parallel.
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially.
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }
    }
}

/// Mailbox module - the feedback channel into a machine
///
/// Every machine owns exactly one mailbox. External callers, effect
/// completions, and forwarded child reports all enter through it, and the
/// runtime drains it strictly in delivery order.
pub mod mailbox {
    use thiserror::Error;
    use tokio::sync::mpsc;

    /// A mailbox delivery: the event plus the epoch it was produced under.
    ///
    /// `epoch: None` marks an external event, which is always valid.
    /// `epoch: Some(n)` marks an async-effect completion; the runtime drops
    /// it if the machine's epoch has advanced past `n`.
    #[derive(Debug)]
    pub struct Envelope<A> {
        /// The event itself.
        pub event: A,

        /// Epoch stamp for async completions, `None` for external sends.
        pub epoch: Option<u64>,
    }

    /// Errors that can occur when sending into a mailbox.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum MailboxError {
        /// The machine has stopped and its mailbox is closed.
        #[error("machine mailbox is closed")]
        Closed,
    }

    /// Sending half of a machine's mailbox.
    ///
    /// Cheap to clone; a clone is a non-owning reference to the machine.
    /// Dropping every `Mailbox` clone does not stop the machine - stopping
    /// is an explicit operation on its handle.
    #[derive(Debug)]
    pub struct Mailbox<A> {
        sender: mpsc::UnboundedSender<Envelope<A>>,
    }

    impl<A> Clone for Mailbox<A> {
        fn clone(&self) -> Self {
            Self {
                sender: self.sender.clone(),
            }
        }
    }

    impl<A> Mailbox<A> {
        /// Create a mailbox and the receiving half the runtime drains.
        #[must_use]
        pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope<A>>) {
            let (sender, receiver) = mpsc::unbounded_channel();
            (Self { sender }, receiver)
        }

        /// Send an external event into the machine.
        ///
        /// # Errors
        ///
        /// Returns [`MailboxError::Closed`] if the machine has stopped.
        pub fn send(&self, event: A) -> Result<(), MailboxError> {
            self.sender
                .send(Envelope { event, epoch: None })
                .map_err(|_| MailboxError::Closed)
        }

        /// Send an epoch-stamped event.
        ///
        /// Used by the runtime's effect feedback path; the event is dropped
        /// at delivery if the machine's epoch no longer matches.
        ///
        /// # Errors
        ///
        /// Returns [`MailboxError::Closed`] if the machine has stopped.
        pub fn send_stamped(&self, event: A, epoch: u64) -> Result<(), MailboxError> {
            self.sender
                .send(Envelope {
                    event,
                    epoch: Some(epoch),
                })
                .map_err(|_| MailboxError::Closed)
        }

        /// Whether the receiving machine is still draining this mailbox.
        #[must_use]
        pub fn is_open(&self) -> bool {
            !self.sender.is_closed()
        }
    }
}

/// Environment module - dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected via
/// the Environment parameter of a reducer.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability.
    ///
    /// Production uses [`SystemClock`]; tests inject a fixed clock so
    /// cool-downs and poll scheduling are deterministic.
    pub trait Clock: Send + Sync {
        /// Get the current time.
        fn now(&self) -> DateTime<Utc>;
    }

    /// System clock - the production [`Clock`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::mailbox::{Mailbox, MailboxError};

    #[derive(Debug, Clone, PartialEq)]
    enum TestAction {
        Ping,
    }

    #[test]
    fn effect_debug_labels() {
        let sync: Effect<TestAction> = Effect::sync(|_| None);
        assert_eq!(format!("{sync:?}"), "Effect::Sync(<closure>)");

        let none: Effect<TestAction> = Effect::None;
        assert_eq!(format!("{none:?}"), "Effect::None");

        let invalidate: Effect<TestAction> = Effect::Invalidate;
        assert_eq!(format!("{invalidate:?}"), "Effect::Invalidate");
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn mailbox_delivers_in_order() {
        let (mailbox, mut rx) = Mailbox::channel();

        mailbox.send(TestAction::Ping).unwrap();
        mailbox.send_stamped(TestAction::Ping, 3).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.epoch, None);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.epoch, Some(3));
    }

    #[tokio::test]
    async fn mailbox_reports_closed_receiver() {
        let (mailbox, rx) = Mailbox::<TestAction>::channel();
        drop(rx);

        assert!(!mailbox.is_open());
        assert_eq!(mailbox.send(TestAction::Ping), Err(MailboxError::Closed));
    }
}
