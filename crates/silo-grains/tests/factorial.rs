//! Memoizing grain tests against a live runtime
//!
//! TigerStyle: Every computed value is checked, and cache hits are proven
//! through the predecessor's invocation count.

use bytes::Bytes;
use futures::future::join_all;
use silo_core::constants::CALL_CHAIN_DEPTH_DEFAULT;
use silo_core::error::Error;
use silo_grains::{calculate, Factorial, MemoGrain, Recurrence};
use silo_runtime::{Runtime, RuntimeBuilder};
use std::time::Duration;

/// `f(k) = 1` for `k <= 0`, `f(n) = (n - 3) * f(n - 1)`
///
/// f(1) = -2, f(2) = 2, f(3) = 0, f(4) = 0. Zero and negative results exercise
/// the cache presence flag.
struct Shifted;

impl Recurrence for Shifted {
    const TYPE_TAG: &'static str = "shifted";

    fn base_case(key: i64) -> Option<i64> {
        (key <= 0).then_some(1)
    }

    fn predecessor(key: i64) -> i64 {
        key - 1
    }

    fn combine(key: i64, previous: i64) -> Option<i64> {
        (key - 3).checked_mul(previous)
    }
}

fn start_runtime() -> Runtime {
    let builder = MemoGrain::<Factorial>::register(RuntimeBuilder::new());
    let mut runtime = MemoGrain::<Shifted>::register(builder).build().unwrap();
    runtime.start().unwrap();
    runtime
}

async fn invocation_count(runtime: &Runtime, type_tag: &str, key: i64) -> u64 {
    runtime
        .get_actor(type_tag, key)
        .unwrap()
        .info()
        .await
        .unwrap()
        .map(|info| info.stats.invocation_count)
        .unwrap_or(0)
}

#[tokio::test]
async fn test_factorial_values() {
    let mut runtime = start_runtime();

    for (key, expected) in [(0, 1), (1, 1), (5, 120), (10, 3_628_800)] {
        let handle = runtime.get_actor(Factorial::TYPE_TAG, key).unwrap();
        assert_eq!(calculate(&handle).await.unwrap(), expected, "f({})", key);
    }

    let handle = runtime
        .get_actor(Factorial::TYPE_TAG, Factorial::KEY_MAX)
        .unwrap();
    assert_eq!(
        calculate(&handle).await.unwrap(),
        2_432_902_008_176_640_000
    );

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_negative_key_is_a_base_case() {
    let mut runtime = start_runtime();

    let handle = runtime.get_actor(Factorial::TYPE_TAG, -5).unwrap();
    assert_eq!(calculate(&handle).await.unwrap(), 1);
    assert_eq!(invocation_count(&runtime, Factorial::TYPE_TAG, -6).await, 0);

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_second_call_served_from_cache() {
    let mut runtime = start_runtime();
    let handle = runtime.get_actor(Factorial::TYPE_TAG, 10).unwrap();

    let first = calculate(&handle).await.unwrap();
    assert_eq!(invocation_count(&runtime, Factorial::TYPE_TAG, 9).await, 1);

    let second = calculate(&handle).await.unwrap();
    assert_eq!(first, second);

    // The predecessor was not asked again
    assert_eq!(invocation_count(&runtime, Factorial::TYPE_TAG, 9).await, 1);
    assert_eq!(invocation_count(&runtime, Factorial::TYPE_TAG, 10).await, 2);

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_chain_reuses_cached_predecessors() {
    let mut runtime = start_runtime();

    let five = runtime.get_actor(Factorial::TYPE_TAG, 5).unwrap();
    assert_eq!(calculate(&five).await.unwrap(), 120);

    let six = runtime.get_actor(Factorial::TYPE_TAG, 6).unwrap();
    assert_eq!(calculate(&six).await.unwrap(), 720);

    // fac/5 answered fac/6 from its cache; fac/4 saw only the first chain
    assert_eq!(invocation_count(&runtime, Factorial::TYPE_TAG, 5).await, 2);
    assert_eq!(invocation_count(&runtime, Factorial::TYPE_TAG, 4).await, 1);

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_overflow_is_reported() {
    let mut runtime = start_runtime();

    let handle = runtime
        .get_actor(Factorial::TYPE_TAG, Factorial::KEY_MAX + 1)
        .unwrap();
    let result = calculate(&handle).await;
    assert!(
        matches!(result, Err(Error::ArithmeticOverflow { .. })),
        "unexpected: {:?}",
        result
    );

    // The fault stays with the overflowing key; the chain below it is cached
    let below = runtime
        .get_actor(Factorial::TYPE_TAG, Factorial::KEY_MAX)
        .unwrap();
    assert_eq!(
        calculate(&below).await.unwrap(),
        2_432_902_008_176_640_000
    );
    assert_eq!(
        invocation_count(&runtime, Factorial::TYPE_TAG, Factorial::KEY_MAX - 1).await,
        1
    );

    // Still no cached value, so it fails the same way again
    assert!(matches!(
        calculate(&handle).await,
        Err(Error::ArithmeticOverflow { .. })
    ));

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_zero_result_recognized_as_cached() {
    let mut runtime = start_runtime();
    let handle = runtime.get_actor(Shifted::TYPE_TAG, 3).unwrap();

    assert_eq!(calculate(&handle).await.unwrap(), 0);
    assert_eq!(invocation_count(&runtime, Shifted::TYPE_TAG, 2).await, 1);

    assert_eq!(calculate(&handle).await.unwrap(), 0);
    assert_eq!(invocation_count(&runtime, Shifted::TYPE_TAG, 2).await, 1);

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_negative_result_recognized_as_cached() {
    let mut runtime = start_runtime();
    let handle = runtime.get_actor(Shifted::TYPE_TAG, 1).unwrap();

    assert_eq!(calculate(&handle).await.unwrap(), -2);
    assert_eq!(calculate(&handle).await.unwrap(), -2);

    // Key 0 is a base case, but it was still only asked once
    assert_eq!(invocation_count(&runtime, Shifted::TYPE_TAG, 0).await, 1);

    runtime.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_agree() {
    let mut runtime = start_runtime();

    let calls: Vec<_> = (0..32)
        .map(|i| {
            let handle = runtime
                .get_actor(Factorial::TYPE_TAG, 12 + (i % 3))
                .unwrap();
            tokio::spawn(async move { calculate(&handle).await })
        })
        .collect();

    for (i, result) in join_all(calls).await.into_iter().enumerate() {
        let expected = match i % 3 {
            0 => 479_001_600,
            1 => 6_227_020_800,
            _ => 87_178_291_200,
        };
        assert_eq!(result.expect("task panicked").unwrap(), expected);
    }

    // Each predecessor computed once, whichever caller got there first
    let stats = runtime.dispatcher_handle().stats().await.unwrap();
    assert_eq!(stats.activations_total, 14);
    assert_eq!(invocation_count(&runtime, Factorial::TYPE_TAG, 2).await, 1);

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_arguments_rejected_before_activation() {
    let mut runtime = start_runtime();
    let handle = runtime.get_actor(Factorial::TYPE_TAG, 5).unwrap();

    let result = handle.invoke("calculate", Bytes::from_static(b"7")).await;
    assert!(
        matches!(result, Err(Error::InvalidArguments { .. })),
        "unexpected: {:?}",
        result
    );
    assert!(result.unwrap_err().is_malformed_request());

    // Never resident, never counted
    assert!(handle.info().await.unwrap().is_none());
    let stats = runtime.dispatcher_handle().stats().await.unwrap();
    assert_eq!(stats.activations_total, 0);
    assert_eq!(stats.rejected_total, 1);

    // The identity is still healthy
    assert_eq!(calculate(&handle).await.unwrap(), 120);

    runtime.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deepest_default_chain_is_fast() {
    let mut runtime = start_runtime();

    // fac/k reaches fac/1 through a chain of k - 1 suspended callers
    let key = CALL_CHAIN_DEPTH_DEFAULT as i64 + 1;
    let handle = runtime.get_actor(Factorial::TYPE_TAG, key).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), calculate(&handle))
        .await
        .expect("deep chain took too long");
    assert!(
        matches!(result, Err(Error::ArithmeticOverflow { ref id, .. }) if id == "fac/21"),
        "unexpected: {:?}",
        result
    );

    let stats = runtime.dispatcher_handle().stats().await.unwrap();
    assert_eq!(stats.activations_total, CALL_CHAIN_DEPTH_DEFAULT as u64 + 1);

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_chain_past_depth_limit_is_refused() {
    let mut runtime = start_runtime();

    let key = CALL_CHAIN_DEPTH_DEFAULT as i64 + 2;
    let handle = runtime.get_actor(Factorial::TYPE_TAG, key).unwrap();

    let result = calculate(&handle).await;
    assert!(
        matches!(
            result,
            Err(Error::CallDepthExceeded { limit, .. }) if limit == CALL_CHAIN_DEPTH_DEFAULT
        ),
        "unexpected: {:?}",
        result
    );

    runtime.stop().await.unwrap();
}
