//! Configuration for silo
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for a silo host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiloConfig {
    /// Actor runtime configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherSection,

    /// Client-side configuration
    #[serde(default)]
    pub client: ClientConfig,
}

impl SiloConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.actor.validate()?;
        self.dispatcher.validate()?;
        self.client.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfiguration {
                field: "<document>".into(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfiguration {
            field: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }
}

/// Actor runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Maximum concurrent activations on this host
    #[serde(default = "default_max_actors")]
    pub max_actors_count: usize,

    /// Maximum queued calls per activation
    #[serde(default = "default_mailbox_depth")]
    pub mailbox_depth_max: usize,

    /// Maximum length of a nested call chain
    #[serde(default = "default_call_depth")]
    pub call_depth_max: usize,
}

fn default_max_actors() -> usize {
    ACTOR_CONCURRENT_COUNT_DEFAULT
}

fn default_mailbox_depth() -> usize {
    MAILBOX_DEPTH_DEFAULT
}

fn default_call_depth() -> usize {
    CALL_CHAIN_DEPTH_DEFAULT
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            max_actors_count: default_max_actors(),
            mailbox_depth_max: default_mailbox_depth(),
            call_depth_max: default_call_depth(),
        }
    }
}

impl ActorConfig {
    fn validate(&self) -> Result<()> {
        if self.max_actors_count == 0 || self.max_actors_count > ACTOR_CONCURRENT_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "actor.max_actors_count".into(),
                reason: format!(
                    "{} outside 1..={}",
                    self.max_actors_count, ACTOR_CONCURRENT_COUNT_MAX
                ),
            });
        }

        if self.mailbox_depth_max == 0 || self.mailbox_depth_max > MAILBOX_DEPTH_MAX {
            return Err(Error::InvalidConfiguration {
                field: "actor.mailbox_depth_max".into(),
                reason: format!("{} outside 1..={}", self.mailbox_depth_max, MAILBOX_DEPTH_MAX),
            });
        }

        if self.call_depth_max == 0 || self.call_depth_max > CALL_CHAIN_DEPTH_MAX {
            return Err(Error::InvalidConfiguration {
                field: "actor.call_depth_max".into(),
                reason: format!("{} outside 1..={}", self.call_depth_max, CALL_CHAIN_DEPTH_MAX),
            });
        }

        Ok(())
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSection {
    /// Buffer size of the dispatcher command channel
    #[serde(default = "default_command_buffer")]
    pub command_buffer_size: usize,
}

fn default_command_buffer() -> usize {
    DISPATCHER_COMMAND_BUFFER_COUNT_DEFAULT
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            command_buffer_size: default_command_buffer(),
        }
    }
}

impl DispatcherSection {
    fn validate(&self) -> Result<()> {
        if self.command_buffer_size == 0
            || self.command_buffer_size > DISPATCHER_COMMAND_BUFFER_COUNT_MAX
        {
            return Err(Error::InvalidConfiguration {
                field: "dispatcher.command_buffer_size".into(),
                reason: format!(
                    "{} outside 1..={}",
                    self.command_buffer_size, DISPATCHER_COMMAND_BUFFER_COUNT_MAX
                ),
            });
        }
        Ok(())
    }
}

/// Client-side configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-call timeout for external callers (milliseconds, none if unset)
    ///
    /// A timeout abandons the reply only; the callee's turn still completes.
    #[serde(default)]
    pub invocation_timeout_ms: Option<u64>,
}

impl ClientConfig {
    fn validate(&self) -> Result<()> {
        if let Some(timeout_ms) = self.invocation_timeout_ms {
            if timeout_ms == 0 || timeout_ms > CLIENT_INVOCATION_TIMEOUT_MS_MAX {
                return Err(Error::InvalidConfiguration {
                    field: "client.invocation_timeout_ms".into(),
                    reason: format!(
                        "{} outside 1..={}",
                        timeout_ms, CLIENT_INVOCATION_TIMEOUT_MS_MAX
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SiloConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_mailbox_depth() {
        let mut config = SiloConfig::default();
        config.actor.mailbox_depth_max = MAILBOX_DEPTH_MAX + 1;
        assert!(config.validate().is_err());

        config.actor.mailbox_depth_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_client_timeout() {
        let mut config = SiloConfig::default();
        config.client.invocation_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SiloConfig::from_json_str(r#"{"actor": {"mailbox_depth_max": 16}}"#).unwrap();
        assert_eq!(config.actor.mailbox_depth_max, 16);
        assert_eq!(config.actor.call_depth_max, CALL_CHAIN_DEPTH_DEFAULT);
        assert_eq!(
            config.dispatcher.command_buffer_size,
            DISPATCHER_COMMAND_BUFFER_COUNT_DEFAULT
        );
        assert!(config.client.invocation_timeout_ms.is_none());
    }

    #[test]
    fn test_json_rejects_out_of_range() {
        let result = SiloConfig::from_json_str(r#"{"dispatcher": {"command_buffer_size": 0}}"#);
        assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("silo-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"client": {"invocation_timeout_ms": 2500}}"#).unwrap();

        let config = SiloConfig::from_json_file(&path).unwrap();
        assert_eq!(config.client.invocation_timeout_ms, Some(2500));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = SiloConfig::from_json_file("/nonexistent/silo.json");
        assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));
    }
}
