//! Silo Runtime
//!
//! Actor host and dispatcher for silo virtual actors.
//!
//! # Overview
//!
//! The runtime provides:
//! - On-demand activation, at most one instance per identity
//! - Turn-based execution: one call at a time per instance, in arrival order
//! - Nested calls between actors without blocking unrelated identities
//! - Lifecycle management (activate/deactivate) and graceful drain on stop
//!
//! # Example
//!
//! ```rust,ignore
//! let mut runtime = RuntimeBuilder::new()
//!     .with_actor("counter", CounterActor)
//!     .build()?;
//! runtime.start()?;
//!
//! let counter = runtime.get_actor("counter", 1)?;
//! counter.invoke("increment", Bytes::new()).await?;
//!
//! runtime.stop().await?;
//! ```
//!
//! # TigerStyle
//! - Single activation guarantee (one actor instance per ID)
//! - Explicit lifecycle states
//! - Bounded mailboxes (no silent message drops)

pub mod activation;
pub mod dispatcher;
pub mod handle;
pub mod mailbox;
pub mod registry;
pub mod runtime;

pub use activation::{ActivationState, ActivationStats, StopReason};
pub use dispatcher::{
    ActivationInfo, Dispatcher, DispatcherConfig, DispatcherHandle, DispatcherStats,
};
pub use handle::{ActorHandle, ActorHandleBuilder};
pub use mailbox::{Envelope, Mailbox, MailboxFullError};
pub use registry::{ActorFactory, ActorRegistry, CloneFactory, FnFactory};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
