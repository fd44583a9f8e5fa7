//! # Authflow Runtime
//!
//! Runtime implementation for the Authflow state-machine architecture.
//!
//! This crate turns a [`Reducer`] into a running machine: an independently
//! addressable actor with its own mailbox, state snapshot channel, and
//! output broadcast. Parents hold [`MachineHandle`]s to spawned children
//! and communicate only via typed events.
//!
//! ## Core Components
//!
//! - **[`spawn`]**: start a reducer as a machine actor
//! - **[`MachineHandle`]**: send events, watch state, observe outputs,
//!   forward child reports to a parent, stop the machine
//! - **Effect executor**: runs effect descriptions and feeds resulting
//!   events back into the same mailbox
//! - **Epoch guard**: async completions are stamped with the epoch current
//!   when their effect was spawned; `Effect::Invalidate` advances the epoch
//!   and aborts in-flight effect tasks, so a late response can never
//!   re-enter a machine that has moved on
//!
//! ## Ordering
//!
//! Events are processed strictly in delivery order, run-to-completion.
//! Follow-up actions raised by `Effect::Sync` drain before the next
//! mailbox event is considered.
//!
//! ## Example
//!
//! ```ignore
//! use authflow_runtime::spawn;
//!
//! let handle = spawn(MyReducer, MyState::default(), environment);
//! handle.send(MyEvent::Init)?;
//!
//! // Read a state snapshot
//! let route = handle.state().route;
//!
//! // Wire a child's reports into a parent
//! child.forward(parent.mailbox(), |event| match event {
//!     ChildEvent::Done { outcome } => Some(ParentEvent::ChildDone { outcome }),
//!     _ => None,
//! });
//! ```

use authflow_core::effect::Effect;
use authflow_core::mailbox::{Envelope, Mailbox};
use authflow_core::reducer::Reducer;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::Instrument;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::AbortHandle;

/// Fixed-interval polling policy with jitter
pub mod poll;

pub use error::MachineError;

/// Error types for the machine runtime
pub mod error {
    use authflow_core::mailbox::MailboxError;
    use thiserror::Error;

    /// Errors that can occur when interacting with a running machine.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum MachineError {
        /// The machine has stopped and no longer accepts events.
        #[error("machine has stopped")]
        Stopped,
    }

    impl From<MailboxError> for MachineError {
        fn from(_: MailboxError) -> Self {
            Self::Stopped
        }
    }
}

/// Capacity of the per-machine output broadcast channel.
///
/// Observers that lag more than this many events behind skip ahead with a
/// warning rather than blocking the machine.
const OUTPUT_CHANNEL_CAPACITY: usize = 32;

/// Unique identifier for a spawned machine.
///
/// Carried in the machine's tracing span so child/parent activity can be
/// correlated in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MachineId(pub uuid::Uuid);

impl MachineId {
    /// Generate a new random `MachineId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for MachineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a spawned machine.
///
/// Cheap to clone; every clone refers to the same machine. The handle is
/// non-owning: dropping all handles leaves the machine running, stopping
/// is explicit via [`MachineHandle::stop`].
#[derive(Debug)]
pub struct MachineHandle<S, A> {
    id: MachineId,
    mailbox: Mailbox<A>,
    state: watch::Receiver<S>,
    outputs: broadcast::Sender<A>,
    stop: Arc<Notify>,
}

impl<S, A> Clone for MachineHandle<S, A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            mailbox: self.mailbox.clone(),
            state: self.state.clone(),
            outputs: self.outputs.clone(),
            stop: Arc::clone(&self.stop),
        }
    }
}

impl<S, A> MachineHandle<S, A>
where
    S: Clone,
    A: Clone + Send + 'static,
{
    /// The machine's identifier.
    #[must_use]
    pub const fn id(&self) -> MachineId {
        self.id
    }

    /// Send an external event to the machine.
    ///
    /// Events are processed strictly in delivery order.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Stopped`] if the machine has stopped.
    pub fn send(&self, event: A) -> Result<(), MachineError> {
        self.mailbox.send(event)?;
        Ok(())
    }

    /// A clone of the machine's mailbox, for wiring other machines or
    /// observers into its feedback loop.
    #[must_use]
    pub fn mailbox(&self) -> Mailbox<A> {
        self.mailbox.clone()
    }

    /// Snapshot of the machine's current state.
    #[must_use]
    pub fn state(&self) -> S {
        self.state.borrow().clone()
    }

    /// Watch channel receiver for state updates.
    ///
    /// The machine publishes its state after every transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<S> {
        self.state.clone()
    }

    /// Subscribe to the machine's processed events.
    ///
    /// Every event the machine processes is broadcast after its transition
    /// completes, so an observer reading state on receipt sees the
    /// post-transition state.
    #[must_use]
    pub fn observe(&self) -> broadcast::Receiver<A> {
        self.outputs.subscribe()
    }

    /// Forward this machine's processed events into another mailbox.
    ///
    /// `map` selects and translates the events worth reporting; returning
    /// `None` drops the event. This is how a parent receives a child's
    /// reports: the forwarding task ends when either side goes away.
    ///
    /// Returns an abort handle for tearing the subscription down early.
    pub fn forward<B, F>(&self, target: Mailbox<B>, map: F) -> AbortHandle
    where
        B: Send + 'static,
        F: Fn(A) -> Option<B> + Send + 'static,
    {
        let mut events = self.outputs.subscribe();
        let id = self.id;

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(mapped) = map(event) {
                            if target.send(mapped).is_err() {
                                break;
                            }
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            machine = %id,
                            skipped,
                            "observer lagged behind machine output"
                        );
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        task.abort_handle()
    }

    /// Stop the machine.
    ///
    /// The event loop exits and every in-flight effect task is aborted, so
    /// pending polls and network completions are dropped rather than
    /// applied to a dead machine.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Whether the machine is still processing events.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.mailbox.is_open()
    }
}

/// Spawn a reducer as a running machine actor.
///
/// The machine owns its state and mailbox; all interaction goes through
/// the returned [`MachineHandle`].
pub fn spawn<R>(
    reducer: R,
    initial_state: R::State,
    environment: R::Environment,
) -> MachineHandle<R::State, R::Action>
where
    R: Reducer + Send + 'static,
    R::State: Clone + Send + Sync + 'static,
    R::Action: Clone + Send + 'static,
    R::Environment: Send + 'static,
{
    let id = MachineId::new();
    let (mailbox, inbox) = Mailbox::channel();
    let (state_tx, state_rx) = watch::channel(initial_state.clone());
    let (outputs, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);
    let stop = Arc::new(Notify::new());

    let machine = Machine {
        reducer,
        environment,
        state: initial_state,
        mailbox: mailbox.clone(),
        state_tx,
        outputs: outputs.clone(),
        epoch: 0,
        in_flight: Vec::new(),
    };

    let stop_signal = Arc::clone(&stop);
    tokio::spawn(
        machine
            .run(inbox, stop_signal)
            .instrument(tracing::info_span!("machine", id = %id)),
    );

    MachineHandle {
        id,
        mailbox,
        state: state_rx,
        outputs,
        stop,
    }
}

/// The machine event loop: state + reducer + environment + effect tasks.
struct Machine<R: Reducer> {
    reducer: R,
    environment: R::Environment,
    state: R::State,
    mailbox: Mailbox<R::Action>,
    state_tx: watch::Sender<R::State>,
    outputs: broadcast::Sender<R::Action>,
    epoch: u64,
    in_flight: Vec<AbortHandle>,
}

impl<R> Machine<R>
where
    R: Reducer,
    R::State: Clone,
    R::Action: Clone + Send + 'static,
{
    async fn run(mut self, mut inbox: UnboundedReceiver<Envelope<R::Action>>, stop: Arc<Notify>) {
        loop {
            tokio::select! {
                () = stop.notified() => {
                    tracing::debug!("machine stopped");
                    break;
                }
                envelope = inbox.recv() => {
                    let Some(envelope) = envelope else { break };
                    self.process(envelope);
                }
            }
        }

        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
    }

    /// Process one mailbox delivery, run-to-completion.
    ///
    /// Follow-up actions raised by `Effect::Sync` drain here, before the
    /// next mailbox event is considered.
    fn process(&mut self, envelope: Envelope<R::Action>) {
        if let Some(stamp) = envelope.epoch {
            if stamp != self.epoch {
                tracing::debug!(
                    stamp,
                    current = self.epoch,
                    "discarding stale effect completion"
                );
                return;
            }
        }

        self.in_flight.retain(|handle| !handle.is_finished());

        let mut queue = VecDeque::new();
        queue.push_back(envelope.event);

        while let Some(event) = queue.pop_front() {
            let effects = self
                .reducer
                .reduce(&mut self.state, event.clone(), &self.environment);

            // State first, broadcast second: observers reading state on
            // receipt see the post-transition state.
            let _ = self.state_tx.send(self.state.clone());
            let _ = self.outputs.send(event);

            for effect in effects {
                self.execute(effect, &mut queue);
            }
        }
    }

    fn execute(&mut self, effect: Effect<R::Action>, queue: &mut VecDeque<R::Action>) {
        match effect {
            Effect::None => {},
            Effect::Sync(f) => {
                if let Some(follow_up) = f(&self.mailbox) {
                    queue.push_back(follow_up);
                }
            },
            Effect::Invalidate => {
                self.epoch += 1;
                tracing::debug!(
                    epoch = self.epoch,
                    aborted = self.in_flight.len(),
                    "epoch advanced, aborting in-flight effects"
                );
                for handle in self.in_flight.drain(..) {
                    handle.abort();
                }
            },
            deferred @ (Effect::Future(_)
            | Effect::Delay { .. }
            | Effect::Sequential(_)
            | Effect::Parallel(_)) => {
                let task = tokio::spawn(run_deferred(deferred, self.mailbox.clone(), self.epoch));
                self.in_flight.push(task.abort_handle());
            },
        }
    }
}

/// Execute a deferred effect, feeding any produced events back into the
/// mailbox stamped with the epoch the effect was spawned under.
///
/// `Invalidate` is only meaningful at the top level of a transition and is
/// a no-op inside a deferred chain.
fn run_deferred<A>(effect: Effect<A>, mailbox: Mailbox<A>, epoch: u64) -> BoxFuture<'static, ()>
where
    A: Send + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None | Effect::Invalidate => {},
            Effect::Sync(f) => {
                if let Some(event) = f(&mailbox) {
                    let _ = mailbox.send_stamped(event, epoch);
                }
            },
            Effect::Future(fut) => {
                if let Some(event) = fut.await {
                    let _ = mailbox.send_stamped(event, epoch);
                }
            },
            Effect::Delay { duration, action } => {
                tokio::time::sleep(duration).await;
                let _ = mailbox.send_stamped(*action, epoch);
            },
            Effect::Sequential(effects) => {
                for effect in effects {
                    run_deferred(effect, mailbox.clone(), epoch).await;
                }
            },
            Effect::Parallel(effects) => {
                futures::future::join_all(
                    effects
                        .into_iter()
                        .map(|effect| run_deferred(effect, mailbox.clone(), epoch)),
                )
                .await;
            },
        }
    })
}
