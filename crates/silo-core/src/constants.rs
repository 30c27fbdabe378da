//! TigerStyle constants for silo
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Actor Limits
// =============================================================================

/// Maximum length of an actor type tag in bytes
pub const ACTOR_TYPE_TAG_LENGTH_BYTES_MAX: usize = 128;

/// Maximum number of concurrent activations per host
pub const ACTOR_CONCURRENT_COUNT_MAX: usize = 1_000_000;

/// Default number of concurrent activations per host
pub const ACTOR_CONCURRENT_COUNT_DEFAULT: usize = 100_000;

/// Maximum length of a nested call chain (caller -> callee -> ...)
///
/// Each hop is a separate activation holding one chain link. Every hop also
/// scans the chain for cycles, so a full chain costs depth² comparisons.
pub const CALL_CHAIN_DEPTH_MAX: usize = 16_384;

/// Default length of a nested call chain
pub const CALL_CHAIN_DEPTH_DEFAULT: usize = 1_024;

// =============================================================================
// Message Limits
// =============================================================================

/// Maximum size of a message payload in bytes (1 MB)
pub const MESSAGE_SIZE_BYTES_MAX: usize = 1024 * 1024;

/// Maximum length of an operation name in bytes
pub const OPERATION_NAME_LENGTH_BYTES_MAX: usize = 256;

/// Maximum depth of an actor mailbox
pub const MAILBOX_DEPTH_MAX: usize = 10_000;

/// Default depth of an actor mailbox
pub const MAILBOX_DEPTH_DEFAULT: usize = 1_000;

/// Default buffer size of the dispatcher command channel
pub const DISPATCHER_COMMAND_BUFFER_COUNT_DEFAULT: usize = 1024;

/// Maximum buffer size of the dispatcher command channel
pub const DISPATCHER_COMMAND_BUFFER_COUNT_MAX: usize = 1024 * 1024;

// =============================================================================
// Client Limits
// =============================================================================

/// Maximum client-side invocation timeout in milliseconds (10 min)
pub const CLIENT_INVOCATION_TIMEOUT_MS_MAX: u64 = 10 * 60 * 1000;

// Compile-time assertions for constant validity
const _: () = {
    assert!(ACTOR_TYPE_TAG_LENGTH_BYTES_MAX >= 16);
    assert!(ACTOR_CONCURRENT_COUNT_DEFAULT <= ACTOR_CONCURRENT_COUNT_MAX);
    assert!(CALL_CHAIN_DEPTH_DEFAULT <= CALL_CHAIN_DEPTH_MAX);
    assert!(MAILBOX_DEPTH_DEFAULT <= MAILBOX_DEPTH_MAX);
    assert!(DISPATCHER_COMMAND_BUFFER_COUNT_DEFAULT <= DISPATCHER_COMMAND_BUFFER_COUNT_MAX);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_have_units_in_names() {
        // Byte limits end in _BYTES_, time limits in _MS_, counts in _COUNT_
        let _: usize = ACTOR_TYPE_TAG_LENGTH_BYTES_MAX;
        let _: u64 = CLIENT_INVOCATION_TIMEOUT_MS_MAX;
        let _: usize = ACTOR_CONCURRENT_COUNT_MAX;
    }

    #[test]
    fn test_defaults_within_limits() {
        assert!(MAILBOX_DEPTH_DEFAULT > 0);
        assert!(CALL_CHAIN_DEPTH_DEFAULT > 0);
    }
}
