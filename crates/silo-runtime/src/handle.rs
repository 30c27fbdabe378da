//! Actor handles for external invocations
//!
//! TigerStyle: Location-transparent references with explicit error handling.

use crate::dispatcher::{ActivationInfo, DispatcherHandle};
use bytes::Bytes;
use silo_core::actor::{ActorId, ActorRef};
use silo_core::error::{Error, Result};
use std::time::Duration;

/// Handle to invoke an actor
///
/// Callers hold a handle without knowing whether the actor is resident.
/// Cheap to clone and share across tasks.
#[derive(Clone, Debug)]
pub struct ActorHandle {
    /// The actor's reference
    actor_ref: ActorRef,
    /// Dispatcher handle for routing
    dispatcher: DispatcherHandle,
    /// Default timeout for invocations
    default_timeout: Option<Duration>,
}

impl ActorHandle {
    /// Create a new actor handle
    pub fn new(actor_ref: ActorRef, dispatcher: DispatcherHandle) -> Self {
        Self {
            actor_ref,
            dispatcher,
            default_timeout: None,
        }
    }

    /// Create a handle with a default timeout
    ///
    /// A timeout only stops this caller from waiting. The callee's turn still
    /// runs to completion and its state changes stand.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        debug_assert!(!timeout.is_zero(), "timeout must be positive");
        self.default_timeout = Some(timeout);
        self
    }

    /// Get the actor's reference
    pub fn actor_ref(&self) -> &ActorRef {
        &self.actor_ref
    }

    /// Get the actor's ID
    pub fn id(&self) -> &ActorId {
        &self.actor_ref.id
    }

    /// Invoke the actor with an operation and payload
    pub async fn invoke(&self, operation: impl Into<String>, payload: Bytes) -> Result<Bytes> {
        let operation = operation.into();

        match self.default_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.invoke_inner(&operation, payload))
                .await
                .map_err(|_| Error::OperationTimedOut {
                    operation: operation.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })?,
            None => self.invoke_inner(&operation, payload).await,
        }
    }

    async fn invoke_inner(&self, operation: &str, payload: Bytes) -> Result<Bytes> {
        self.dispatcher
            .invoke(self.actor_ref.id.clone(), operation.to_string(), payload)
            .await
    }

    /// Invoke with a typed request and response
    ///
    /// Serializes the request to JSON, invokes the actor, and deserializes the response.
    pub async fn request<Req, Resp>(
        &self,
        operation: impl Into<String>,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let operation = operation.into();
        let payload = serde_json::to_vec(request).map_err(|e| Error::SerializationFailed {
            reason: format!("request for {}: {}", operation, e),
        })?;

        let response = self.invoke(operation, Bytes::from(payload)).await?;

        serde_json::from_slice(&response).map_err(|e| Error::DeserializationFailed {
            reason: format!("response from {}: {}", self.actor_ref.id, e),
        })
    }

    /// Invoke and discard the result value
    ///
    /// Still waits for the turn, so errors are reported.
    pub async fn send(&self, operation: impl Into<String>, payload: Bytes) -> Result<()> {
        self.invoke(operation, payload).await?;
        Ok(())
    }

    /// Deactivate the actor
    ///
    /// The actor will be reactivated with default state on the next invocation.
    pub async fn deactivate(&self) -> Result<()> {
        self.dispatcher.deactivate(self.actor_ref.id.clone()).await
    }

    /// Snapshot the current activation, if resident
    pub async fn info(&self) -> Result<Option<ActivationInfo>> {
        self.dispatcher.actor_info(self.actor_ref.id.clone()).await
    }
}

/// Builder for creating actor handles
#[derive(Clone, Debug)]
pub struct ActorHandleBuilder {
    dispatcher: DispatcherHandle,
    default_timeout: Option<Duration>,
}

impl ActorHandleBuilder {
    /// Create a new builder
    pub fn new(dispatcher: DispatcherHandle) -> Self {
        Self {
            dispatcher,
            default_timeout: None,
        }
    }

    /// Apply a default timeout to every handle built
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Create a handle for the given actor ID
    pub fn for_actor(&self, actor_id: ActorId) -> ActorHandle {
        let handle = ActorHandle::new(ActorRef::new(actor_id), self.dispatcher.clone());
        match self.default_timeout {
            Some(timeout) => handle.with_timeout(timeout),
            None => handle,
        }
    }

    /// Create a handle for the given type tag and key
    pub fn for_parts(&self, type_tag: impl Into<String>, key: i64) -> Result<ActorHandle> {
        let actor_id = ActorId::new(type_tag, key)?;
        Ok(self.for_actor(actor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, DispatcherConfig};
    use crate::registry::ActorRegistry;
    use async_trait::async_trait;
    use silo_core::actor::{Actor, ActorContext};
    use std::sync::Arc;

    #[derive(Clone)]
    struct EchoActor;

    #[async_trait]
    impl Actor for EchoActor {
        type State = ();
        const OPERATIONS: &'static [&'static str] = &["echo", "upper", "slow"];

        async fn invoke(
            &self,
            _ctx: &mut ActorContext<Self::State>,
            operation: &str,
            payload: Bytes,
        ) -> Result<Bytes> {
            match operation {
                "echo" => Ok(payload),
                "upper" => {
                    let text = String::from_utf8_lossy(&payload);
                    Ok(Bytes::from(text.to_uppercase()))
                }
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(payload)
                }
                _ => Err(Error::invalid_operation("echo", operation)),
            }
        }
    }

    fn start() -> (DispatcherHandle, tokio::task::JoinHandle<()>) {
        let mut registry = ActorRegistry::new();
        registry.register_clone("echo", EchoActor).unwrap();

        let mut dispatcher = Dispatcher::new(Arc::new(registry), DispatcherConfig::default());
        let handle = dispatcher.handle();
        let task = tokio::spawn(async move {
            dispatcher.run().await;
        });
        (handle, task)
    }

    #[tokio::test]
    async fn test_actor_handle_basic() {
        let (dispatcher, task) = start();

        let actor_id = ActorId::new("echo", 1).unwrap();
        let actor_handle = ActorHandle::new(ActorRef::new(actor_id), dispatcher.clone());

        let result = actor_handle
            .invoke("echo", Bytes::from("hello"))
            .await
            .unwrap();
        assert_eq!(result, Bytes::from("hello"));

        let result = actor_handle
            .invoke("upper", Bytes::from("hello"))
            .await
            .unwrap();
        assert_eq!(result, Bytes::from("HELLO"));

        dispatcher.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_handle_builder() {
        let (dispatcher, task) = start();
        let builder = ActorHandleBuilder::new(dispatcher.clone());

        let handle = builder.for_parts("echo", 2).unwrap();
        assert_eq!(handle.id().qualified_name(), "echo/2");
        handle.send("echo", Bytes::from("x")).await.unwrap();

        assert!(builder.for_parts("bad tag", 2).is_err());

        dispatcher.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_handle_timeout_abandons_reply() {
        let (dispatcher, task) = start();

        let handle = ActorHandleBuilder::new(dispatcher.clone())
            .with_timeout(Some(Duration::from_millis(20)))
            .for_parts("echo", 3)
            .unwrap();

        let result = handle.invoke("slow", Bytes::from("late")).await;
        assert!(matches!(result, Err(Error::OperationTimedOut { .. })));
        assert!(result.unwrap_err().is_retriable());

        // The abandoned turn still completes before the next one runs
        let patient = ActorHandleBuilder::new(dispatcher.clone())
            .for_parts("echo", 3)
            .unwrap();
        let result = patient.invoke("echo", Bytes::from("next")).await.unwrap();
        assert_eq!(result, Bytes::from("next"));

        let info = patient.info().await.unwrap().unwrap();
        assert_eq!(info.stats.invocation_count, 2);

        dispatcher.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_handle_typed_request() {
        let (dispatcher, task) = start();

        let handle = ActorHandleBuilder::new(dispatcher.clone())
            .for_parts("echo", 4)
            .unwrap();
        let value: Vec<i64> = handle.request("echo", &vec![1i64, 2, 3]).await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        dispatcher.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
