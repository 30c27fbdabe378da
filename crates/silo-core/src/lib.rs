//! Silo Core
//!
//! Core types, errors, and constants for the silo virtual actor host.
//!
//! # Overview
//!
//! Silo hosts addressable, stateful actors ("grains") inside a single process.
//! An actor is named by an [`ActorId`] (a type tag plus an integer key) and is
//! activated on first use. Each activation runs one call at a time, and may
//! await calls to other actors through its [`ActorContext`].
//!
//! # TigerStyle
//!
//! - Explicit limits with big-endian naming (e.g., `CALL_CHAIN_DEPTH_MAX`)
//! - Assertions on preconditions
//! - No silent drops: every call resolves to a value or an error

pub mod actor;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod telemetry;

pub use actor::{Actor, ActorContext, ActorId, ActorInvoker, ActorRef, InvocationRequest};
pub use chain::CallChain;
pub use config::{ActorConfig, ClientConfig, DispatcherSection, SiloConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard};
