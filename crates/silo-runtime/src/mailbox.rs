//! Actor mailbox implementation
//!
//! TigerStyle: Bounded queues with explicit limits, no silent drops.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::oneshot;

use silo_core::chain::CallChain;
use silo_core::constants::MAILBOX_DEPTH_MAX;
use silo_core::error::Result;

/// Error when mailbox is full
///
/// Hands the rejected envelope back so its caller can still be answered.
#[derive(Debug)]
pub struct MailboxFullError {
    pub mailbox_depth: usize,
    pub limit: usize,
    pub envelope: Envelope,
}

impl std::fmt::Display for MailboxFullError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mailbox full: {} messages (limit: {})",
            self.mailbox_depth, self.limit
        )
    }
}

impl std::error::Error for MailboxFullError {}

/// A call waiting for its turn
///
/// Pairs the request with its single-assignment result slot.
#[derive(Debug)]
pub struct Envelope {
    /// The operation name
    pub operation: String,
    /// The message payload
    pub payload: Bytes,
    /// Callers suspended on this call, outermost first
    pub call_chain: CallChain,
    /// Channel to send the response
    pub reply_tx: oneshot::Sender<Result<Bytes>>,
    /// When the message was enqueued
    pub enqueued_at: Instant,
}

impl Envelope {
    /// Create a new envelope for an external call
    pub fn new(
        operation: String,
        payload: Bytes,
        reply_tx: oneshot::Sender<Result<Bytes>>,
    ) -> Self {
        debug_assert!(!operation.is_empty(), "operation must not be empty");

        Self {
            operation,
            payload,
            call_chain: CallChain::new(),
            reply_tx,
            enqueued_at: Instant::now(),
        }
    }

    /// Attach the chain of suspended callers
    pub fn with_call_chain(mut self, call_chain: CallChain) -> Self {
        self.call_chain = call_chain;
        self
    }

    /// Get the time this message has been waiting
    pub fn wait_time(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    /// Fill the result slot
    ///
    /// Returns false if the caller stopped waiting.
    pub fn reply(self, result: Result<Bytes>) -> bool {
        self.reply_tx.send(result).is_ok()
    }
}

/// Bounded queue of calls parked on an activation record
///
/// # TigerStyle
/// - Explicit capacity limit
/// - FIFO ordering
/// - No silent drops (returns the envelope when full)
#[derive(Debug)]
pub struct Mailbox {
    /// Pending messages
    queue: VecDeque<Envelope>,
    /// Maximum number of messages
    capacity: usize,
}

impl Mailbox {
    /// Create a new mailbox with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        debug_assert!(
            capacity <= MAILBOX_DEPTH_MAX,
            "capacity exceeds MAILBOX_DEPTH_MAX"
        );

        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Try to enqueue a message
    ///
    /// Returns the envelope inside the error if the mailbox is full.
    pub fn push(&mut self, envelope: Envelope) -> std::result::Result<(), MailboxFullError> {
        if self.queue.len() >= self.capacity {
            return Err(MailboxFullError {
                mailbox_depth: self.queue.len(),
                limit: self.capacity,
                envelope,
            });
        }

        self.queue.push_back(envelope);
        debug_assert!(self.queue.len() <= self.capacity);
        Ok(())
    }

    /// Check if the mailbox is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the number of pending messages
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Take all pending messages in FIFO order
    pub fn drain(&mut self) -> Vec<Envelope> {
        self.queue.drain(..).collect()
    }
}
