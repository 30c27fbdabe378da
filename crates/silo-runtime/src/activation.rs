//! Actor activation and lifecycle management
//!
//! TigerStyle: Explicit lifecycle states, single activation guarantee.
//!
//! Every activation runs as its own task. The task owns the actor instance
//! and its context, takes envelopes off its mailbox one at a time, and
//! awaits each turn to completion (including any nested calls) before
//! looking at the next envelope. That is the whole turn-based guarantee:
//! nothing else can reach the instance.
//!
//! ```text
//!   dispatcher ── try_send ──> [ mailbox ] ──> ActiveActor::run
//!       ^                                         │
//!       └──────── Activated / Stopped ────────────┘
//! ```

use crate::dispatcher::DispatcherHandle;
use crate::mailbox::Envelope;
use bytes::Bytes;
use silo_core::actor::{Actor, ActorContext, ActorId};
use silo_core::chain::CallChain;
use silo_core::error::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Actor lifecycle state
///
/// State transitions:
/// ```text
///   Unactivated ──> Activating ──> Active ──> Deactivating ──> Unactivated
///                       │                                          ^
///                       └──────────────── (failure) ───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationState {
    /// No instance is resident (initial state, or after deactivation)
    #[default]
    Unactivated,
    /// Instance created, running on_activate
    Activating,
    /// Running turns
    Active,
    /// Mailbox closed; finishing queued turns, then on_deactivate
    Deactivating,
}

impl ActivationState {
    /// Check if the actor can run a turn
    pub fn can_invoke(&self) -> bool {
        matches!(self, ActivationState::Active)
    }

    /// Check if a transition is allowed by the lifecycle
    pub fn can_transition_to(&self, next: ActivationState) -> bool {
        match (self, next) {
            (ActivationState::Unactivated, ActivationState::Activating) => true,
            (ActivationState::Activating, ActivationState::Active) => true,
            (ActivationState::Activating, ActivationState::Unactivated) => true,
            // Deactivation may be requested before activation finishes
            (ActivationState::Activating, ActivationState::Deactivating) => true,
            (ActivationState::Active, ActivationState::Deactivating) => true,
            (ActivationState::Deactivating, ActivationState::Unactivated) => true,
            _ if *self == next => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationState::Unactivated => write!(f, "unactivated"),
            ActivationState::Activating => write!(f, "activating"),
            ActivationState::Active => write!(f, "active"),
            ActivationState::Deactivating => write!(f, "deactivating"),
        }
    }
}

/// Statistics for an activation
///
/// Shared between the activation task, which records turns, and the
/// dispatcher, which reports snapshots.
#[derive(Debug, Clone)]
pub struct ActivationStats {
    /// When the activation was created
    pub activated_at: Instant,
    /// When the last turn finished
    pub last_activity_at: Option<Instant>,
    /// Total turns run
    pub invocation_count: u64,
    /// Turns that returned an error
    pub error_count: u64,
    /// Total time spent inside turns
    pub total_processing_time: Duration,
}

impl ActivationStats {
    /// Create stats stamped with the current time
    pub fn new() -> Self {
        Self {
            activated_at: Instant::now(),
            last_activity_at: None,
            invocation_count: 0,
            error_count: 0,
            total_processing_time: Duration::ZERO,
        }
    }

    /// Record a finished turn
    pub fn record_invocation(&mut self, duration: Duration, is_error: bool) {
        self.last_activity_at = Some(Instant::now());
        self.invocation_count = self.invocation_count.wrapping_add(1);
        self.total_processing_time = self.total_processing_time.saturating_add(duration);
        if is_error {
            self.error_count = self.error_count.wrapping_add(1);
        }
    }

    /// Get average processing time per invocation
    pub fn average_processing_time(&self) -> Duration {
        if self.invocation_count == 0 {
            Duration::ZERO
        } else {
            self.total_processing_time / self.invocation_count as u32
        }
    }
}

impl Default for ActivationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to an activation's stats
pub(crate) type SharedStats = Arc<Mutex<ActivationStats>>;

pub(crate) fn lock_stats(stats: &SharedStats) -> std::sync::MutexGuard<'_, ActivationStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why an activation task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// on_activate failed; queued calls were answered with the failure
    ActivationFailed,
    /// Mailbox closed and drained; on_deactivate ran
    Deactivated,
    /// The task panicked mid-turn
    Crashed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ActivationFailed => write!(f, "activation_failed"),
            StopReason::Deactivated => write!(f, "deactivated"),
            StopReason::Crashed => write!(f, "crashed"),
        }
    }
}

/// Everything the dispatcher hands a new activation task
pub(crate) struct ActivationSeed {
    pub generation: u64,
    pub mailbox_rx: mpsc::Receiver<Envelope>,
    pub dispatcher: DispatcherHandle,
    pub stats: SharedStats,
    pub call_depth_max: usize,
}

/// Reports a crash if the activation task unwinds or is cancelled
///
/// Disarmed on every orderly exit from [`ActiveActor::run`].
struct StopGuard {
    armed: Option<(ActorId, u64, DispatcherHandle)>,
}

impl StopGuard {
    fn disarm(&mut self) {
        self.armed = None;
    }
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        let Some((actor_id, generation, dispatcher)) = self.armed.take() else {
            return;
        };

        if std::thread::panicking() {
            error!(actor_id = %actor_id, generation, "Activation task crashed");
        } else {
            debug!(actor_id = %actor_id, generation, "Activation task cancelled");
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                dispatcher
                    .notify_stopped(actor_id, generation, StopReason::Crashed)
                    .await;
            });
        }
    }
}

/// A resident actor instance
///
/// TigerStyle: Single activation guarantee. The dispatcher creates at most
/// one ActiveActor per ActorId at any time.
pub(crate) struct ActiveActor<A: Actor> {
    /// The actor's unique identifier
    pub id: ActorId,
    /// The actor implementation
    actor: A,
    /// The actor's context (state + nested call route)
    context: ActorContext<A::State>,
    /// Incoming envelopes, in arrival order
    mailbox_rx: mpsc::Receiver<Envelope>,
    /// Current lifecycle state
    state: ActivationState,
    /// Distinguishes this activation from earlier ones of the same identity
    generation: u64,
    /// Statistics
    stats: SharedStats,
    /// Route back to the dispatcher
    dispatcher: DispatcherHandle,
}

impl<A: Actor> ActiveActor<A> {
    /// Build an activation around a freshly created instance
    pub fn new(id: ActorId, actor: A, seed: ActivationSeed) -> Self {
        let invoker = Arc::new(seed.dispatcher.clone());
        let context = ActorContext::with_default_state(id.clone(), invoker)
            .with_call_depth_max(seed.call_depth_max);

        Self {
            id,
            actor,
            context,
            mailbox_rx: seed.mailbox_rx,
            state: ActivationState::Unactivated,
            generation: seed.generation,
            stats: seed.stats,
            dispatcher: seed.dispatcher,
        }
    }

    /// Drive the activation from on_activate to on_deactivate
    pub async fn run(mut self) {
        let mut guard = StopGuard {
            armed: Some((self.id.clone(), self.generation, self.dispatcher.clone())),
        };

        if let Err(e) = self.activate().await {
            self.fail_queued(&e);
            guard.disarm();
            self.dispatcher
                .notify_stopped(self.id.clone(), self.generation, StopReason::ActivationFailed)
                .await;
            return;
        }

        self.dispatcher
            .notify_activated(self.id.clone(), self.generation)
            .await;

        while let Some(envelope) = self.mailbox_rx.recv().await {
            self.process_envelope(envelope).await;
        }

        self.deactivate().await;
        guard.disarm();
        self.dispatcher
            .notify_stopped(self.id.clone(), self.generation, StopReason::Deactivated)
            .await;
    }

    /// Run on_activate
    ///
    /// Returns the hook's own error on failure.
    #[instrument(skip(self), fields(actor_id = %self.id, generation = self.generation), level = "debug")]
    async fn activate(&mut self) -> Result<()> {
        self.transition(ActivationState::Activating);

        if let Err(e) = self.actor.on_activate(&mut self.context).await {
            error!(actor_id = %self.id, error = %e, "on_activate failed");
            self.transition(ActivationState::Unactivated);
            return Err(e);
        }

        self.transition(ActivationState::Active);
        info!(actor_id = %self.id, "Actor activated");
        Ok(())
    }

    /// Answer every queued call with the activation failure
    ///
    /// Closes the mailbox first so the dispatcher sees it as gone and starts
    /// a fresh activation for later calls.
    fn fail_queued(&mut self, cause: &Error) {
        self.mailbox_rx.close();

        let reason = cause.to_string();
        let mut failed = 0usize;
        while let Ok(envelope) = self.mailbox_rx.try_recv() {
            envelope.reply(Err(Error::ActorActivationFailed {
                id: self.id.qualified_name(),
                reason: reason.clone(),
            }));
            failed += 1;
        }

        debug!(actor_id = %self.id, failed, "Answered queued calls after failed activation");
    }

    /// Run one turn and fill its result slot
    async fn process_envelope(&mut self, mut envelope: Envelope) {
        let wait_time = envelope.wait_time();
        self.context
            .begin_turn(std::mem::take(&mut envelope.call_chain));

        let result = self
            .process_invocation(&envelope.operation, envelope.payload.clone())
            .await;

        self.context.begin_turn(CallChain::new());

        let operation = envelope.operation.clone();
        if !envelope.reply(result) {
            debug!(
                actor_id = %self.id,
                operation = %operation,
                wait_ms = wait_time.as_millis() as u64,
                "Caller stopped waiting; result discarded"
            );
        }
    }

    /// Run a single turn
    ///
    /// State mutations made before an error are kept.
    #[instrument(skip(self, payload), fields(actor_id = %self.id), level = "debug")]
    pub async fn process_invocation(&mut self, operation: &str, payload: Bytes) -> Result<Bytes> {
        assert!(
            self.state.can_invoke(),
            "cannot invoke when state = {}",
            self.state
        );
        assert!(!operation.is_empty(), "operation cannot be empty");

        let start = Instant::now();
        let result = self
            .actor
            .invoke(&mut self.context, operation, payload)
            .await;
        let duration = start.elapsed();

        if let Err(e) = &result {
            debug!(actor_id = %self.id, operation, error = %e, "Invocation failed");
        }

        lock_stats(&self.stats).record_invocation(duration, result.is_err());
        result
    }

    /// Run on_deactivate
    ///
    /// A failing hook is logged; the instance is dropped regardless.
    #[instrument(skip(self), fields(actor_id = %self.id, generation = self.generation), level = "debug")]
    async fn deactivate(&mut self) {
        self.transition(ActivationState::Deactivating);

        if let Err(e) = self.actor.on_deactivate(&mut self.context).await {
            warn!(actor_id = %self.id, error = %e, "on_deactivate failed");
        }

        self.transition(ActivationState::Unactivated);
        info!(actor_id = %self.id, "Actor deactivated");
    }

    fn transition(&mut self, next: ActivationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }
}
