//! Main runtime coordinator
//!
//! TigerStyle: Single entry point, explicit configuration, clean shutdown.

use crate::dispatcher::{Dispatcher, DispatcherConfig, DispatcherHandle};
use crate::handle::{ActorHandle, ActorHandleBuilder};
use crate::registry::{ActorFactory, ActorRegistry};
use silo_core::actor::{Actor, ActorId};
use silo_core::config::SiloConfig;
use silo_core::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Configuration for the runtime
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Dispatcher configuration
    pub dispatcher: DispatcherConfig,
    /// Default timeout for handles handed out by the runtime
    pub invocation_timeout: Option<Duration>,
}

impl From<&SiloConfig> for RuntimeConfig {
    fn from(config: &SiloConfig) -> Self {
        Self {
            dispatcher: DispatcherConfig::from(config),
            invocation_timeout: config
                .client
                .invocation_timeout_ms
                .map(Duration::from_millis),
        }
    }
}

/// Builder for creating a runtime
///
/// Registration errors are collected and reported by [`RuntimeBuilder::build`].
#[derive(Default)]
pub struct RuntimeBuilder {
    registry: ActorRegistry,
    config: RuntimeConfig,
    errors: Vec<Error>,
}

impl RuntimeBuilder {
    /// Create a new runtime builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the configuration from a validated host configuration
    pub fn with_silo_config(self, config: &SiloConfig) -> Self {
        self.with_config(RuntimeConfig::from(config))
    }

    /// Register an actor type with a factory
    pub fn with_factory<A, F>(mut self, type_tag: impl Into<String>, factory: F) -> Self
    where
        A: Actor,
        F: ActorFactory<A>,
    {
        if let Err(e) = self.registry.register(type_tag, factory) {
            self.errors.push(e);
        }
        self
    }

    /// Register an actor type by prototype (cloned for each activation)
    pub fn with_actor<A>(mut self, type_tag: impl Into<String>, actor: A) -> Self
    where
        A: Actor + Clone,
    {
        if let Err(e) = self.registry.register_clone(type_tag, actor) {
            self.errors.push(e);
        }
        self
    }

    /// Build the runtime
    pub fn build(mut self) -> Result<Runtime> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        if self.registry.is_empty() {
            return Err(Error::InvalidConfiguration {
                field: "registry".into(),
                reason: "at least one actor type is required".into(),
            });
        }

        Ok(Runtime::new(self.registry, self.config))
    }
}

/// The silo runtime host
///
/// Owns the dispatcher task and hands out actor handles.
pub struct Runtime {
    /// The dispatcher (until started)
    dispatcher: Option<Dispatcher>,
    /// Handle for sending commands
    handle: DispatcherHandle,
    /// Background task handle
    task: Option<JoinHandle<()>>,
    /// Configuration
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a new runtime
    pub fn new(registry: ActorRegistry, config: RuntimeConfig) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(registry), config.dispatcher.clone());
        let handle = dispatcher.handle();

        Self {
            dispatcher: Some(dispatcher),
            handle,
            task: None,
            config,
        }
    }

    /// Start the runtime
    ///
    /// Spawns the dispatcher loop in a background task.
    pub fn start(&mut self) -> Result<()> {
        let mut dispatcher = self.dispatcher.take().ok_or_else(|| Error::Internal {
            message: "runtime already started".into(),
        })?;

        info!("Starting silo runtime");

        self.task = Some(tokio::spawn(async move {
            dispatcher.run().await;
        }));

        Ok(())
    }

    /// Stop the runtime
    ///
    /// Refuses new external calls, lets every queued and in-flight turn
    /// finish (including the nested calls they make), runs on_deactivate for
    /// each activation, then returns.
    #[instrument(skip(self), level = "info")]
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            info!("Stopping silo runtime");
            if let Err(e) = self.handle.shutdown().await {
                debug!(error = %e, "Dispatcher already stopped");
            }
            task.await.map_err(|e| Error::Internal {
                message: format!("dispatcher task failed: {}", e),
            })?;
            info!("Silo runtime stopped");
        }
        Ok(())
    }

    /// Get a handle to the dispatcher
    pub fn dispatcher_handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Get an actor handle builder
    pub fn actor_handles(&self) -> ActorHandleBuilder {
        ActorHandleBuilder::new(self.handle.clone()).with_timeout(self.config.invocation_timeout)
    }

    /// Get a handle to a specific actor
    pub fn actor(&self, actor_id: ActorId) -> ActorHandle {
        self.actor_handles().for_actor(actor_id)
    }

    /// Get a handle to the actor with the given type tag and key
    ///
    /// Never activates anything; activation happens on the first call.
    pub fn get_actor(&self, type_tag: impl Into<String>, key: i64) -> Result<ActorHandle> {
        self.actor_handles().for_parts(type_tag, key)
    }

    /// Check if the runtime is running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Get the runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Can't await in drop, so we just abort the task
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
