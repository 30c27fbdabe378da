//! Message dispatcher for actor runtime
//!
//! TigerStyle: Single-threaded per-actor execution, explicit message routing.
//!
//! The dispatcher loop is the only owner of the activation table. It never
//! awaits an actor: every command is handled synchronously, and delivery to
//! an activation is a non-blocking `try_send`. First-time resolution of an
//! identity therefore happens exactly once no matter how many callers race
//! on it, and a turn that awaits a nested call never holds up anyone else.

use crate::activation::{
    lock_stats, ActivationSeed, ActivationState, ActivationStats, SharedStats, StopReason,
};
use crate::mailbox::{Envelope, Mailbox};
use crate::registry::ActorRegistry;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use silo_core::actor::{ActorId, ActorInvoker, InvocationRequest};
use silo_core::config::SiloConfig;
use silo_core::constants::{
    ACTOR_CONCURRENT_COUNT_DEFAULT, CALL_CHAIN_DEPTH_DEFAULT, CALL_CHAIN_DEPTH_MAX,
    DISPATCHER_COMMAND_BUFFER_COUNT_DEFAULT, MAILBOX_DEPTH_DEFAULT, MAILBOX_DEPTH_MAX,
};
use silo_core::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Dispatcher Config
// ============================================================================

/// Configuration for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of concurrent activations
    pub max_actors: usize,
    /// Maximum queued calls per activation
    pub mailbox_depth_max: usize,
    /// Maximum length of a nested call chain
    pub call_depth_max: usize,
    /// Channel buffer size for dispatcher commands
    pub command_buffer_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_actors: ACTOR_CONCURRENT_COUNT_DEFAULT,
            mailbox_depth_max: MAILBOX_DEPTH_DEFAULT,
            call_depth_max: CALL_CHAIN_DEPTH_DEFAULT,
            command_buffer_size: DISPATCHER_COMMAND_BUFFER_COUNT_DEFAULT,
        }
    }
}

impl From<&SiloConfig> for DispatcherConfig {
    fn from(config: &SiloConfig) -> Self {
        Self {
            max_actors: config.actor.max_actors_count,
            mailbox_depth_max: config.actor.mailbox_depth_max,
            call_depth_max: config.actor.call_depth_max,
            command_buffer_size: config.dispatcher.command_buffer_size,
        }
    }
}

/// Commands sent to the dispatcher
#[derive(Debug)]
pub(crate) enum DispatcherCommand {
    /// Route a call to its target
    Invoke {
        request: InvocationRequest,
        reply_tx: oneshot::Sender<Result<Bytes>>,
    },
    /// An activation finished on_activate
    Activated { actor_id: ActorId, generation: u64 },
    /// An activation task ended
    Stopped {
        actor_id: ActorId,
        generation: u64,
        reason: StopReason,
    },
    /// Close an actor's mailbox so it drains and deactivates
    Deactivate { actor_id: ActorId },
    /// Snapshot one activation
    ActorInfo {
        actor_id: ActorId,
        reply_tx: oneshot::Sender<Option<ActivationInfo>>,
    },
    /// Snapshot dispatcher counters
    Stats {
        reply_tx: oneshot::Sender<DispatcherStats>,
    },
    /// Stop accepting external calls and drain every activation
    Shutdown,
}

/// Snapshot of one activation
#[derive(Debug, Clone)]
pub struct ActivationInfo {
    /// Lifecycle state as seen by the dispatcher
    pub state: ActivationState,
    /// Activation generation (increases with every fresh activation)
    pub generation: u64,
    /// Turn statistics
    pub stats: ActivationStats,
    /// Calls parked while the activation drains
    pub parked_count: usize,
}

/// Dispatcher counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Activations currently in the table
    pub active_actors: usize,
    /// Activations ever started
    pub activations_total: u64,
    /// Activations that drained and ran on_deactivate
    pub deactivations_total: u64,
    /// Activations whose on_activate failed
    pub activation_failures_total: u64,
    /// Activation tasks that died mid-turn
    pub crashes_total: u64,
    /// Calls rejected before reaching an instance
    pub rejected_total: u64,
}

// ============================================================================
// Dispatcher Handle
// ============================================================================

/// Handle to send commands to the dispatcher
#[derive(Clone)]
pub struct DispatcherHandle {
    command_tx: mpsc::Sender<DispatcherCommand>,
}

impl DispatcherHandle {
    /// Invoke an actor
    pub async fn invoke(
        &self,
        actor_id: ActorId,
        operation: String,
        payload: Bytes,
    ) -> Result<Bytes> {
        self.invoke_request(InvocationRequest::new(actor_id, operation, payload))
            .await
    }

    /// Invoke an actor with a fully formed request
    pub async fn invoke_request(&self, request: InvocationRequest) -> Result<Bytes> {
        let target = request.target.qualified_name();
        let operation = request.operation.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.send(DispatcherCommand::Invoke { request, reply_tx })
            .await?;

        reply_rx
            .await
            .map_err(|_| Error::invocation_failed(target, operation, "reply dropped"))?
    }

    /// Invoke an actor with a typed request and response
    pub async fn request<Req, Resp>(
        &self,
        actor_id: ActorId,
        operation: &str,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).map_err(|e| Error::SerializationFailed {
            reason: format!("request for {}: {}", operation, e),
        })?;

        let target = actor_id.qualified_name();
        let response = self
            .invoke(actor_id, operation.to_string(), Bytes::from(payload))
            .await?;

        serde_json::from_slice(&response).map_err(|e| Error::DeserializationFailed {
            reason: format!("response from {}: {}", target, e),
        })
    }

    /// Deactivate an actor
    ///
    /// Returns once the request is queued. Calls already in the actor's
    /// mailbox still run; later calls start a fresh activation.
    pub async fn deactivate(&self, actor_id: ActorId) -> Result<()> {
        self.send(DispatcherCommand::Deactivate { actor_id }).await
    }

    /// Snapshot an activation, or None if the identity is not resident
    pub async fn actor_info(&self, actor_id: ActorId) -> Result<Option<ActivationInfo>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(DispatcherCommand::ActorInfo { actor_id, reply_tx })
            .await?;
        reply_rx
            .await
            .map_err(|_| Error::unavailable("dispatcher dropped info request"))
    }

    /// Snapshot dispatcher counters
    pub async fn stats(&self) -> Result<DispatcherStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(DispatcherCommand::Stats { reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| Error::unavailable("dispatcher dropped stats request"))
    }

    /// Shutdown the dispatcher
    pub async fn shutdown(&self) -> Result<()> {
        self.send(DispatcherCommand::Shutdown).await
    }

    pub(crate) async fn notify_activated(&self, actor_id: ActorId, generation: u64) {
        // The dispatcher may already be gone during teardown
        let _ = self
            .send(DispatcherCommand::Activated {
                actor_id,
                generation,
            })
            .await;
    }

    pub(crate) async fn notify_stopped(&self, actor_id: ActorId, generation: u64, reason: StopReason) {
        let _ = self
            .send(DispatcherCommand::Stopped {
                actor_id,
                generation,
                reason,
            })
            .await;
    }

    async fn send(&self, command: DispatcherCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| Error::unavailable("dispatcher channel closed"))
    }
}

#[async_trait]
impl ActorInvoker for DispatcherHandle {
    async fn invoke(&self, request: InvocationRequest) -> Result<Bytes> {
        self.invoke_request(request).await
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("closed", &self.command_tx.is_closed())
            .finish()
    }
}

// ============================================================================
// Activation Table
// ============================================================================

/// Dispatcher-side view of one activation
struct ActivationRecord {
    /// Matches Activated/Stopped reports to this activation
    generation: u64,
    state: ActivationState,
    /// None once the mailbox is closed
    mailbox_tx: Option<mpsc::Sender<Envelope>>,
    /// Calls that arrived after the mailbox closed, delivered to the next activation
    pending: Mailbox,
    stats: SharedStats,
}

/// Outcome of offering an envelope to an activation
enum Offer {
    Accepted,
    Rejected(Envelope, Error),
    /// The activation task is gone but has not reported yet
    Closed(Envelope),
}

impl ActivationRecord {
    fn offer(&mut self, actor_id: &ActorId, envelope: Envelope, depth_max: usize) -> Offer {
        match &self.mailbox_tx {
            Some(mailbox_tx) => match mailbox_tx.try_send(envelope) {
                Ok(()) => Offer::Accepted,
                Err(TrySendError::Full(envelope)) => Offer::Rejected(
                    envelope,
                    Error::ActorMailboxFull {
                        id: actor_id.qualified_name(),
                        depth: depth_max,
                        max: depth_max,
                    },
                ),
                Err(TrySendError::Closed(envelope)) => Offer::Closed(envelope),
            },
            None => match self.pending.push(envelope) {
                Ok(()) => Offer::Accepted,
                Err(full) => Offer::Rejected(
                    full.envelope,
                    Error::ActorMailboxFull {
                        id: actor_id.qualified_name(),
                        depth: full.mailbox_depth,
                        max: full.limit,
                    },
                ),
            },
        }
    }

    /// Close the mailbox; the activation drains what it holds and stops
    fn close(&mut self) {
        if self.mailbox_tx.take().is_some() {
            self.state = ActivationState::Deactivating;
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Dispatcher for routing messages to actors
///
/// Manages actor lifecycle and message routing for every registered actor type.
pub struct Dispatcher {
    /// Actor types this host can activate
    registry: Arc<ActorRegistry>,
    /// Configuration
    config: DispatcherConfig,
    /// Activation table
    actors: HashMap<ActorId, ActivationRecord>,
    /// Command receiver
    command_rx: mpsc::Receiver<DispatcherCommand>,
    /// Command sender (for creating handles)
    command_tx: mpsc::Sender<DispatcherCommand>,
    /// Last generation handed out
    generation_last: u64,
    /// Set once Shutdown is received
    shutting_down: bool,
    /// Counters
    stats: DispatcherStats,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(registry: Arc<ActorRegistry>, config: DispatcherConfig) -> Self {
        assert!(config.max_actors > 0, "max_actors must be positive");
        assert!(
            config.mailbox_depth_max > 0 && config.mailbox_depth_max <= MAILBOX_DEPTH_MAX,
            "mailbox_depth_max outside 1..={}",
            MAILBOX_DEPTH_MAX
        );
        assert!(
            config.call_depth_max > 0 && config.call_depth_max <= CALL_CHAIN_DEPTH_MAX,
            "call_depth_max outside 1..={}",
            CALL_CHAIN_DEPTH_MAX
        );
        assert!(config.command_buffer_size > 0, "command_buffer_size must be positive");

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size);

        Self {
            registry,
            config,
            actors: HashMap::new(),
            command_rx,
            command_tx,
            generation_last: 0,
            shutting_down: false,
            stats: DispatcherStats::default(),
        }
    }

    /// Get a handle to the dispatcher
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Run the dispatcher loop
    ///
    /// Returns after Shutdown once every activation has drained.
    #[instrument(skip(self), level = "info")]
    pub async fn run(&mut self) {
        info!(types = ?self.registry.type_tags(), "Dispatcher starting");

        while let Some(command) = self.command_rx.recv().await {
            match command {
                DispatcherCommand::Invoke { request, reply_tx } => {
                    self.handle_invoke(request, reply_tx);
                }
                DispatcherCommand::Activated {
                    actor_id,
                    generation,
                } => {
                    self.handle_activated(&actor_id, generation);
                }
                DispatcherCommand::Stopped {
                    actor_id,
                    generation,
                    reason,
                } => {
                    self.handle_stopped(actor_id, generation, reason);
                }
                DispatcherCommand::Deactivate { actor_id } => {
                    self.handle_deactivate(&actor_id);
                }
                DispatcherCommand::ActorInfo { actor_id, reply_tx } => {
                    let _ = reply_tx.send(self.actor_info(&actor_id));
                }
                DispatcherCommand::Stats { reply_tx } => {
                    let _ = reply_tx.send(self.snapshot_stats());
                }
                DispatcherCommand::Shutdown => {
                    self.begin_shutdown();
                }
            }

            if self.shutting_down && self.actors.is_empty() {
                break;
            }
        }

        info!(
            activations = self.stats.activations_total,
            deactivations = self.stats.deactivations_total,
            "Dispatcher stopped"
        );
    }

    /// Handle an invoke command
    ///
    /// Malformed calls are answered here without touching the table.
    fn handle_invoke(
        &mut self,
        request: InvocationRequest,
        reply_tx: oneshot::Sender<Result<Bytes>>,
    ) {
        let InvocationRequest {
            target,
            operation,
            payload,
            call_chain,
        } = request;

        if let Err(e) = self.registry.validate_call(&target, &operation, &payload) {
            debug!(actor_id = %target, operation = %operation, error = %e, "Rejected call");
            self.stats.rejected_total = self.stats.rejected_total.wrapping_add(1);
            let _ = reply_tx.send(Err(e));
            return;
        }

        // Nested calls keep flowing so in-flight turns can finish
        if self.shutting_down && call_chain.is_empty() {
            self.stats.rejected_total = self.stats.rejected_total.wrapping_add(1);
            let _ = reply_tx.send(Err(Error::RuntimeShuttingDown {
                id: target.qualified_name(),
            }));
            return;
        }

        let envelope = Envelope::new(operation, payload, reply_tx).with_call_chain(call_chain);
        self.deliver(target, envelope);
    }

    /// Hand an envelope to the target's activation, activating it if needed
    fn deliver(&mut self, actor_id: ActorId, envelope: Envelope) {
        let mut envelope = envelope;

        // Second attempt only after finding a dead activation
        for attempt in 0..2 {
            if !self.actors.contains_key(&actor_id) {
                if let Err(e) = self.activate(&actor_id) {
                    warn!(actor_id = %actor_id, error = %e, "Activation refused");
                    envelope.reply(Err(e));
                    return;
                }
            }

            let Some(record) = self.actors.get_mut(&actor_id) else {
                envelope.reply(Err(Error::internal("actor not found after activation")));
                return;
            };

            match record.offer(&actor_id, envelope, self.config.mailbox_depth_max) {
                Offer::Accepted => {
                    if self.shutting_down {
                        self.close_mailbox(&actor_id);
                    }
                    return;
                }
                Offer::Rejected(rejected, e) => {
                    debug!(actor_id = %actor_id, error = %e, "Delivery rejected");
                    rejected.reply(Err(e));
                    return;
                }
                Offer::Closed(returned) => {
                    debug!(actor_id = %actor_id, attempt, "Mailbox closed, replacing activation");
                    self.actors.remove(&actor_id);
                    envelope = returned;
                }
            }
        }

        envelope.reply(Err(Error::ActorActivationFailed {
            id: actor_id.qualified_name(),
            reason: "activation closed its mailbox before delivery".into(),
        }));
    }

    /// Start a fresh activation task for an identity
    fn activate(&mut self, actor_id: &ActorId) -> Result<()> {
        debug_assert!(!self.actors.contains_key(actor_id));

        if self.actors.len() >= self.config.max_actors {
            return Err(Error::ActorCountExceeded {
                count: self.actors.len(),
                max: self.config.max_actors,
            });
        }

        let factory = self.registry.lookup(actor_id.type_tag())?.clone();

        self.generation_last = self.generation_last.wrapping_add(1);
        let generation = self.generation_last;
        let (mailbox_tx, mailbox_rx) = mpsc::channel(self.config.mailbox_depth_max);
        let stats = Arc::new(Mutex::new(ActivationStats::new()));

        factory.spawn(
            actor_id.clone(),
            ActivationSeed {
                generation,
                mailbox_rx,
                dispatcher: self.handle(),
                stats: stats.clone(),
                call_depth_max: self.config.call_depth_max,
            },
        );

        self.actors.insert(
            actor_id.clone(),
            ActivationRecord {
                generation,
                state: ActivationState::Activating,
                mailbox_tx: Some(mailbox_tx),
                pending: Mailbox::with_capacity(self.config.mailbox_depth_max),
                stats,
            },
        );
        self.stats.activations_total = self.stats.activations_total.wrapping_add(1);

        debug!(actor_id = %actor_id, generation, "Activation started");
        Ok(())
    }

    fn handle_activated(&mut self, actor_id: &ActorId, generation: u64) {
        match self.actors.get_mut(actor_id) {
            Some(record) if record.generation == generation => {
                if record.state == ActivationState::Activating {
                    record.state = ActivationState::Active;
                }
            }
            _ => debug!(actor_id = %actor_id, generation, "Ignoring stale activation report"),
        }
    }

    /// Remove a finished activation and re-deliver anything parked on it
    fn handle_stopped(&mut self, actor_id: ActorId, generation: u64, reason: StopReason) {
        let is_current = self
            .actors
            .get(&actor_id)
            .is_some_and(|record| record.generation == generation);
        if !is_current {
            debug!(actor_id = %actor_id, generation, %reason, "Ignoring stale stop report");
            return;
        }

        let Some(mut record) = self.actors.remove(&actor_id) else {
            return;
        };

        match reason {
            StopReason::Deactivated => {
                self.stats.deactivations_total = self.stats.deactivations_total.wrapping_add(1);
                debug!(actor_id = %actor_id, generation, "Activation removed");
            }
            StopReason::ActivationFailed => {
                self.stats.activation_failures_total =
                    self.stats.activation_failures_total.wrapping_add(1);
                warn!(actor_id = %actor_id, generation, "Activation failed");
            }
            StopReason::Crashed => {
                self.stats.crashes_total = self.stats.crashes_total.wrapping_add(1);
                error!(actor_id = %actor_id, generation, "Activation crashed");
            }
        }

        let parked = record.pending.drain();
        if !parked.is_empty() {
            debug!(actor_id = %actor_id, parked = parked.len(), "Reactivating for parked calls");
            for envelope in parked {
                self.deliver(actor_id.clone(), envelope);
            }
        }
    }

    /// Handle a deactivate command
    fn handle_deactivate(&mut self, actor_id: &ActorId) {
        match self.actors.get_mut(actor_id) {
            Some(record) if record.mailbox_tx.is_some() => {
                record.close();
                info!(actor_id = %actor_id, "Deactivating actor");
            }
            Some(_) => debug!(actor_id = %actor_id, "Actor already deactivating"),
            None => debug!(actor_id = %actor_id, "Actor not active, nothing to deactivate"),
        }
    }

    /// Close every mailbox and refuse new external calls
    fn begin_shutdown(&mut self) {
        if self.shutting_down {
            return;
        }

        info!(active = self.actors.len(), "Dispatcher shutting down");
        self.shutting_down = true;
        for record in self.actors.values_mut() {
            record.close();
        }
    }

    fn close_mailbox(&mut self, actor_id: &ActorId) {
        if let Some(record) = self.actors.get_mut(actor_id) {
            record.close();
        }
    }

    fn actor_info(&self, actor_id: &ActorId) -> Option<ActivationInfo> {
        self.actors.get(actor_id).map(|record| ActivationInfo {
            state: record.state,
            generation: record.generation,
            stats: lock_stats(&record.stats).clone(),
            parked_count: record.pending.len(),
        })
    }

    fn snapshot_stats(&self) -> DispatcherStats {
        DispatcherStats {
            active_actors: self.actors.len(),
            ..self.stats.clone()
        }
    }
}
