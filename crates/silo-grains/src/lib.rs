//! Silo Grains
//!
//! Memoizing recurrence grains built on the silo runtime.
//!
//! # Overview
//!
//! A [`MemoGrain`] computes `f(key)` for a [`Recurrence`] by asking the grain
//! for the predecessor key and combining the answer with its own key. Every
//! grain caches its result, so each key is computed at most once per
//! activation.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut runtime = MemoGrain::<Factorial>::register(RuntimeBuilder::new()).build()?;
//! runtime.start()?;
//!
//! let fac = runtime.get_actor(Factorial::TYPE_TAG, 10)?;
//! assert_eq!(calculate(&fac).await?, 3_628_800);
//! ```

pub mod grain;
pub mod recurrence;

pub use grain::{calculate, decode_value, encode_value, MemoGrain, MemoState, OPERATION_CALCULATE};
pub use recurrence::{Factorial, Recurrence};
