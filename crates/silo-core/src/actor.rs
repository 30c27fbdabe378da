//! Actor abstractions for silo
//!
//! TigerStyle: Explicit types, assertions, bounded operations.

use crate::chain::CallChain;
use crate::constants::*;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// ActorId
// =============================================================================

/// Unique identifier for an actor
///
/// An actor is named by its type tag and an integer key. The identity exists
/// independently of whether an instance is currently resident in memory.
///
/// # TigerStyle
/// - Explicit validation on construction
/// - Immutable after creation
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ActorId {
    type_tag: String,
    key: i64,
}

impl ActorId {
    /// Create a new ActorId with validation
    ///
    /// # Errors
    /// Returns error if the type tag is empty, too long, or contains invalid characters.
    pub fn new(type_tag: impl Into<String>, key: i64) -> Result<Self> {
        let type_tag = type_tag.into();

        if type_tag.is_empty() {
            return Err(Error::InvalidActorId {
                id: format!("/{}", key),
                reason: "type tag must not be empty".into(),
            });
        }

        if type_tag.len() > ACTOR_TYPE_TAG_LENGTH_BYTES_MAX {
            return Err(Error::ActorTypeTagTooLong {
                length: type_tag.len(),
                limit: ACTOR_TYPE_TAG_LENGTH_BYTES_MAX,
            });
        }

        // Alphanumeric, dash, underscore, dot
        let valid = type_tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if !valid {
            return Err(Error::InvalidActorId {
                id: format!("{}/{}", type_tag, key),
                reason: "type tag contains invalid characters".into(),
            });
        }

        Ok(Self { type_tag, key })
    }

    /// Get the type tag
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Get the integer key
    pub fn key(&self) -> i64 {
        self.key
    }

    /// Identity of the same actor type under another key
    pub fn with_key(&self, key: i64) -> Self {
        debug_assert!(!self.type_tag.is_empty());
        Self {
            type_tag: self.type_tag.clone(),
            key,
        }
    }

    /// Get the full qualified name (type_tag/key)
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.type_tag, self.key)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_tag, self.key)
    }
}

// =============================================================================
// ActorRef
// =============================================================================

/// Reference to an actor (location-transparent)
///
/// Callers only need the actor's ID to communicate with it. Whether the
/// instance is resident, and where, is decided by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    /// The actor's unique identifier
    pub id: ActorId,
}

impl ActorRef {
    /// Create a new ActorRef from an ActorId
    pub fn new(id: ActorId) -> Self {
        Self { id }
    }

    /// Create a new ActorRef with the given type tag and key
    pub fn from_parts(type_tag: impl Into<String>, key: i64) -> Result<Self> {
        Ok(Self {
            id: ActorId::new(type_tag, key)?,
        })
    }
}

impl From<ActorId> for ActorRef {
    fn from(id: ActorId) -> Self {
        Self::new(id)
    }
}

// =============================================================================
// Invocation
// =============================================================================

/// A single call addressed to an actor
///
/// This is the request half of the call protocol. `call_chain` lists the
/// identities whose turns are suspended waiting on this call, outermost
/// first; it is empty for calls entering from outside the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Target actor
    pub target: ActorId,
    /// Operation (method) name
    pub operation: String,
    /// Argument payload
    pub payload: Bytes,
    /// Callers currently awaiting this call
    pub call_chain: CallChain,
}

impl InvocationRequest {
    /// Create a request entering from outside the host
    pub fn new(target: ActorId, operation: impl Into<String>, payload: Bytes) -> Self {
        let operation = operation.into();
        debug_assert!(!operation.is_empty(), "operation must not be empty");
        Self {
            target,
            operation,
            payload,
            call_chain: CallChain::new(),
        }
    }

    /// Attach the chain of suspended callers
    pub fn with_call_chain(mut self, call_chain: CallChain) -> Self {
        self.call_chain = call_chain;
        self
    }

    /// Whether the request was issued from inside another actor's turn
    pub fn is_nested(&self) -> bool {
        !self.call_chain.is_empty()
    }
}

/// Delivers invocations to actors
///
/// Implemented by the runtime's dispatcher handle. Actors reach it through
/// [`ActorContext::call`].
#[async_trait]
pub trait ActorInvoker: Send + Sync {
    /// Deliver a request and wait for its result
    async fn invoke(&self, request: InvocationRequest) -> Result<Bytes>;
}

// =============================================================================
// Actor Trait
// =============================================================================

/// Actor trait - implement to create actors
///
/// # TigerStyle
/// - Single-threaded execution guarantee (no concurrent invocations)
/// - Explicit lifecycle hooks (on_activate, on_deactivate)
/// - Explicit operation list, checked before delivery
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// The actor's in-memory state
    ///
    /// Default-constructible for fresh activations. Owned by the activation
    /// and only touched from inside its turns.
    type State: Default + Send + Sync + 'static;

    /// Operation names this actor type accepts
    ///
    /// Calls naming any other operation are rejected by the dispatcher
    /// without activating or touching the target.
    const OPERATIONS: &'static [&'static str];

    /// Check the argument shape of a call before it is delivered
    ///
    /// Runs at the dispatcher, before resolution, for operations listed in
    /// `OPERATIONS`. A rejected call never activates or queues on the target.
    fn validate_arguments(_operation: &str, _payload: &Bytes) -> Result<()> {
        Ok(())
    }

    /// Handle an invocation
    ///
    /// Called for each message sent to the actor. Execution is
    /// guaranteed to be single-threaded - no concurrent invocations, even
    /// while this turn awaits a nested call.
    async fn invoke(
        &self,
        ctx: &mut ActorContext<Self::State>,
        operation: &str,
        payload: Bytes,
    ) -> Result<Bytes>;

    /// Called when the actor is activated, before any invocation is delivered
    async fn on_activate(&self, _ctx: &mut ActorContext<Self::State>) -> Result<()> {
        Ok(())
    }

    /// Called after the last invocation, before the instance is dropped
    async fn on_deactivate(&self, _ctx: &mut ActorContext<Self::State>) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// ActorContext
// =============================================================================

/// Context provided to an actor during activation and invocation
///
/// Provides access to:
/// - Actor's in-memory state
/// - Ability to invoke other actors
pub struct ActorContext<S> {
    /// The actor's unique identifier
    pub id: ActorId,

    /// The actor's in-memory state
    pub state: S,

    /// Route for nested calls
    invoker: Arc<dyn ActorInvoker>,

    /// Callers suspended on the current turn, outermost first
    call_chain: CallChain,

    /// Longest chain a nested call may extend
    call_depth_max: usize,
}

impl<S> ActorContext<S> {
    /// Create a new ActorContext
    pub fn new(id: ActorId, state: S, invoker: Arc<dyn ActorInvoker>) -> Self {
        Self {
            id,
            state,
            invoker,
            call_chain: CallChain::new(),
            call_depth_max: CALL_CHAIN_DEPTH_DEFAULT,
        }
    }

    /// Create a new ActorContext with default state
    pub fn with_default_state(id: ActorId, invoker: Arc<dyn ActorInvoker>) -> Self
    where
        S: Default,
    {
        Self::new(id, S::default(), invoker)
    }

    /// Set the maximum call chain depth
    pub fn with_call_depth_max(mut self, call_depth_max: usize) -> Self {
        assert!(call_depth_max > 0, "call_depth_max must be positive");
        assert!(call_depth_max <= CALL_CHAIN_DEPTH_MAX);
        self.call_depth_max = call_depth_max;
        self
    }

    /// Callers suspended on the current turn, outermost first
    pub fn call_chain(&self) -> &CallChain {
        &self.call_chain
    }

    /// Install the chain of the envelope about to run
    #[doc(hidden)]
    pub fn begin_turn(&mut self, call_chain: CallChain) {
        self.call_chain = call_chain;
    }

    /// Invoke another actor and await its result
    ///
    /// This turn stays suspended, holding the instance, until the callee
    /// replies. Calling back into any identity on the current chain
    /// (including this one) would wait on itself forever, so such calls fail
    /// with [`Error::ReentrantCall`] instead of hanging. Recursive workloads
    /// must call strictly "downward" in a well-founded order.
    pub async fn call(&self, target: &ActorId, operation: &str, payload: Bytes) -> Result<Bytes> {
        let chain = self.call_chain.extend(self.id.clone());

        // Bounds the cycle scan below as well as the chain itself
        if chain.len() > self.call_depth_max {
            return Err(Error::CallDepthExceeded {
                depth: chain.len(),
                limit: self.call_depth_max,
            });
        }

        if chain.contains(target) {
            return Err(Error::ReentrantCall {
                target: target.qualified_name(),
                chain: chain.to_string(),
            });
        }

        let request =
            InvocationRequest::new(target.clone(), operation, payload).with_call_chain(chain);
        self.invoker.invoke(request).await
    }

    /// Invoke another actor with a typed request and response
    ///
    /// Serializes the request to JSON, invokes the actor, and deserializes the response.
    pub async fn request<Req, Resp>(
        &self,
        target: &ActorId,
        operation: &str,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).map_err(|e| Error::SerializationFailed {
            reason: format!("request for {}: {}", operation, e),
        })?;

        let response = self.call(target, operation, Bytes::from(payload)).await?;

        serde_json::from_slice(&response).map_err(|e| Error::DeserializationFailed {
            reason: format!("response from {}: {}", target, e),
        })
    }
}
