//! Memoizing recurrence grain
//!
//! TigerStyle: Explicit presence flag, checked arithmetic, state untouched on error.

use crate::recurrence::Recurrence;
use async_trait::async_trait;
use bytes::Bytes;
use silo_core::actor::{Actor, ActorContext};
use silo_core::error::{Error, Result};
use silo_runtime::{ActorHandle, RuntimeBuilder};
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, info};

/// The only operation a memoizing grain accepts
pub const OPERATION_CALCULATE: &str = "calculate";

/// Per-activation cache
///
/// `None` means not computed yet. Any `i64`, zero and negatives included, is
/// a valid cached result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoState {
    pub cached: Option<i64>,
}

/// Grain computing `R` for its own key
///
/// Stateless itself; the cache lives in the activation's [`MemoState`].
pub struct MemoGrain<R> {
    _recurrence: PhantomData<fn() -> R>,
}

impl<R: Recurrence> MemoGrain<R> {
    pub fn new() -> Self {
        Self {
            _recurrence: PhantomData,
        }
    }

    /// Register this grain under `R::TYPE_TAG`
    pub fn register(builder: RuntimeBuilder) -> RuntimeBuilder {
        builder.with_actor(R::TYPE_TAG, Self::new())
    }

    async fn compute(&self, ctx: &mut ActorContext<MemoState>) -> Result<i64> {
        let key = ctx.id.key();

        if let Some(value) = R::base_case(key) {
            return Ok(value);
        }

        if let Some(value) = ctx.state.cached {
            debug!(actor_id = %ctx.id, value, "cache hit");
            return Ok(value);
        }

        let predecessor = ctx.id.with_key(R::predecessor(key));
        debug_assert!(predecessor != ctx.id);

        let response = ctx
            .call(&predecessor, OPERATION_CALCULATE, Bytes::new())
            .await?;
        let previous = decode_value(&response)?;

        let value = R::combine(key, previous).ok_or_else(|| Error::ArithmeticOverflow {
            id: ctx.id.qualified_name(),
            reason: format!("combining key {} with {}", key, previous),
        })?;

        ctx.state.cached = Some(value);
        Ok(value)
    }
}

impl<R: Recurrence> Default for MemoGrain<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Recurrence> Clone for MemoGrain<R> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<R: Recurrence> fmt::Debug for MemoGrain<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoGrain")
            .field("type_tag", &R::TYPE_TAG)
            .finish()
    }
}

#[async_trait]
impl<R: Recurrence> Actor for MemoGrain<R> {
    type State = MemoState;
    const OPERATIONS: &'static [&'static str] = &[OPERATION_CALCULATE];

    async fn invoke(
        &self,
        ctx: &mut ActorContext<Self::State>,
        operation: &str,
        payload: Bytes,
    ) -> Result<Bytes> {
        if operation != OPERATION_CALCULATE {
            return Err(Error::invalid_operation(R::TYPE_TAG, operation));
        }

        Self::validate_arguments(operation, &payload)?;

        let value = self.compute(ctx).await?;
        encode_value(value)
    }

    fn validate_arguments(operation: &str, payload: &Bytes) -> Result<()> {
        if !payload.is_empty() {
            return Err(Error::invalid_arguments(
                operation,
                format!("expected no arguments, got {} bytes", payload.len()),
            ));
        }
        Ok(())
    }

    async fn on_activate(&self, ctx: &mut ActorContext<Self::State>) -> Result<()> {
        info!(actor_id = %ctx.id, "activating {}", ctx.id.key());
        Ok(())
    }
}

/// Encode a computed value as a response payload (JSON number)
pub fn encode_value(value: i64) -> Result<Bytes> {
    serde_json::to_vec(&value)
        .map(Bytes::from)
        .map_err(|e| Error::SerializationFailed {
            reason: format!("value {}: {}", value, e),
        })
}

/// Decode a response payload produced by [`encode_value`]
pub fn decode_value(payload: &[u8]) -> Result<i64> {
    serde_json::from_slice(payload).map_err(|e| Error::DeserializationFailed {
        reason: format!("calculate response: {}", e),
    })
}

/// Ask a memoizing grain for its value
pub async fn calculate(handle: &ActorHandle) -> Result<i64> {
    let response = handle.invoke(OPERATION_CALCULATE, Bytes::new()).await?;
    decode_value(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::Factorial;
    use silo_core::actor::{ActorId, ActorInvoker, InvocationRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Answers every nested call with a fixed value and counts them
    struct FixedInvoker {
        value: i64,
        calls: AtomicUsize,
    }

    impl FixedInvoker {
        fn new(value: i64) -> Arc<Self> {
            Arc::new(Self {
                value,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ActorInvoker for FixedInvoker {
        async fn invoke(&self, request: InvocationRequest) -> Result<Bytes> {
            assert_eq!(request.operation, OPERATION_CALCULATE);
            self.calls.fetch_add(1, Ordering::SeqCst);
            encode_value(self.value)
        }
    }

    fn context(key: i64, invoker: Arc<FixedInvoker>) -> ActorContext<MemoState> {
        ActorContext::with_default_state(ActorId::new("fac", key).unwrap(), invoker)
    }

    async fn run(ctx: &mut ActorContext<MemoState>, payload: Bytes) -> Result<i64> {
        let grain = MemoGrain::<Factorial>::new();
        let response = grain.invoke(ctx, OPERATION_CALCULATE, payload).await?;
        decode_value(&response)
    }

    #[tokio::test]
    async fn test_base_case_skips_recursion_and_cache() {
        let invoker = FixedInvoker::new(99);
        let mut ctx = context(1, invoker.clone());

        assert_eq!(run(&mut ctx, Bytes::new()).await.unwrap(), 1);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.state.cached, None);
    }

    #[tokio::test]
    async fn test_computes_then_serves_from_cache() {
        let invoker = FixedInvoker::new(24);
        let mut ctx = context(5, invoker.clone());

        assert_eq!(run(&mut ctx, Bytes::new()).await.unwrap(), 120);
        assert_eq!(ctx.state.cached, Some(120));
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);

        assert_eq!(run(&mut ctx, Bytes::new()).await.unwrap(), 120);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_is_a_cached_value() {
        let invoker = FixedInvoker::new(0);
        let mut ctx = context(5, invoker.clone());

        assert_eq!(run(&mut ctx, Bytes::new()).await.unwrap(), 0);
        assert_eq!(ctx.state.cached, Some(0));

        assert_eq!(run(&mut ctx, Bytes::new()).await.unwrap(), 0);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_arguments_rejected_without_touching_state() {
        let invoker = FixedInvoker::new(24);
        let mut ctx = context(5, invoker.clone());

        let result = run(&mut ctx, Bytes::from_static(b"7")).await;
        assert!(matches!(result, Err(Error::InvalidArguments { .. })));
        assert_eq!(ctx.state.cached, None);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overflow_leaves_cache_empty() {
        let invoker = FixedInvoker::new(i64::MAX);
        let mut ctx = context(3, invoker.clone());

        let result = run(&mut ctx, Bytes::new()).await;
        assert!(
            matches!(result, Err(Error::ArithmeticOverflow { ref id, .. }) if id == "fac/3"),
            "unexpected: {:?}",
            result
        );
        assert_eq!(ctx.state.cached, None);
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let mut ctx = context(5, FixedInvoker::new(1));
        let grain = MemoGrain::<Factorial>::new();

        let result = grain.invoke(&mut ctx, "explode", Bytes::new()).await;
        assert!(matches!(result, Err(Error::InvalidOperation { .. })));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_value(b"-42").unwrap(), -42);
        assert!(matches!(
            decode_value(b"forty"),
            Err(Error::DeserializationFailed { .. })
        ));
    }
}
