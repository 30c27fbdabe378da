//! Error types for silo
//!
//! TigerStyle: Explicit error types with context, using thiserror.

use thiserror::Error;

/// Result type alias for silo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Silo error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors (rejected at the dispatcher boundary)
    // =========================================================================
    #[error("Invalid actor ID: {id}, reason: {reason}")]
    InvalidActorId { id: String, reason: String },

    #[error("Actor type tag too long: {length} bytes exceeds limit of {limit} bytes")]
    ActorTypeTagTooLong { length: usize, limit: usize },

    #[error("Unknown actor type: {type_tag}")]
    UnknownActorType { type_tag: String },

    #[error("Invalid operation: {operation} on actor type {type_tag}")]
    InvalidOperation { type_tag: String, operation: String },

    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("Message too large: {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    // =========================================================================
    // Actor Errors
    // =========================================================================
    #[error("Actor activation failed: {id}, reason: {reason}")]
    ActorActivationFailed { id: String, reason: String },

    #[error("Actor invocation failed: {id}, operation: {operation}, reason: {reason}")]
    ActorInvocationFailed {
        id: String,
        operation: String,
        reason: String,
    },

    #[error("Actor mailbox full: {id}, depth: {depth}, max: {max}")]
    ActorMailboxFull {
        id: String,
        depth: usize,
        max: usize,
    },

    #[error("Actor count exceeded: {count} activations, max: {max}")]
    ActorCountExceeded { count: usize, max: usize },

    #[error("Arithmetic overflow in {id}: {reason}")]
    ArithmeticOverflow { id: String, reason: String },

    // =========================================================================
    // Call Chain Errors
    // =========================================================================
    #[error("Reentrant call: {target} is already executing a turn in chain [{chain}]")]
    ReentrantCall { target: String, chain: String },

    #[error("Call chain depth {depth} exceeds limit of {limit}")]
    CallDepthExceeded { depth: usize, limit: usize },

    #[error("Operation timed out: {operation} after {timeout_ms}ms")]
    OperationTimedOut { operation: String, timeout_ms: u64 },

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    #[error("Runtime is shutting down, rejected call to {id}")]
    RuntimeShuttingDown { id: String },

    #[error("Runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    #[error("Actor type already registered: {type_tag}")]
    DuplicateActorType { type_tag: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an invalid operation error
    pub fn invalid_operation(type_tag: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::InvalidOperation {
            type_tag: type_tag.into(),
            operation: operation.into(),
        }
    }

    /// Create an invalid arguments error
    pub fn invalid_arguments(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an actor invocation failed error
    pub fn invocation_failed(
        id: impl Into<String>,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ActorInvocationFailed {
            id: id.into(),
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a runtime unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is retriable
    ///
    /// Retry policy belongs to the caller; the runtime never retries.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ActorMailboxFull { .. }
                | Self::OperationTimedOut { .. }
                | Self::RuntimeUnavailable { .. }
        )
    }

    /// Check if this error was raised before the call reached an instance
    pub fn is_malformed_request(&self) -> bool {
        matches!(
            self,
            Self::InvalidActorId { .. }
                | Self::ActorTypeTagTooLong { .. }
                | Self::UnknownActorType { .. }
                | Self::InvalidOperation { .. }
                | Self::InvalidArguments { .. }
                | Self::MessageTooLarge { .. }
        )
    }
}
