//! Typed registry of actor factories
//!
//! Maps a type tag to the factory that builds instances of that actor type.
//! Populated before the runtime starts and read-only afterwards.

use crate::activation::{ActivationSeed, ActiveActor};
use bytes::Bytes;
use silo_core::actor::{Actor, ActorId};
use silo_core::constants::{MESSAGE_SIZE_BYTES_MAX, OPERATION_NAME_LENGTH_BYTES_MAX};
use silo_core::error::{Error, Result};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Factory for creating actors
pub trait ActorFactory<A>: Send + Sync + 'static
where
    A: Actor,
{
    /// Create a new actor instance
    fn create(&self, id: &ActorId) -> A;
}

/// Simple factory that clones a prototype actor
pub struct CloneFactory<A: Clone + Send + Sync + 'static> {
    prototype: A,
}

impl<A: Clone + Send + Sync + 'static> CloneFactory<A> {
    /// Create a new clone factory
    pub fn new(prototype: A) -> Self {
        Self { prototype }
    }
}

impl<A> ActorFactory<A> for CloneFactory<A>
where
    A: Actor + Clone,
{
    fn create(&self, _id: &ActorId) -> A {
        self.prototype.clone()
    }
}

/// Factory backed by a closure over the actor's identity
pub struct FnFactory<F> {
    create_fn: F,
}

impl<F> FnFactory<F> {
    /// Wrap a closure
    pub fn new(create_fn: F) -> Self {
        Self { create_fn }
    }
}

impl<A, F> ActorFactory<A> for FnFactory<F>
where
    A: Actor,
    F: Fn(&ActorId) -> A + Send + Sync + 'static,
{
    fn create(&self, id: &ActorId) -> A {
        (self.create_fn)(id)
    }
}

/// Type-erased factory entry
///
/// Lets the dispatcher activate actors of any registered type without
/// knowing the concrete type.
pub(crate) trait ErasedFactory: Send + Sync {
    /// Operation names accepted by this actor type
    fn operations(&self) -> &'static [&'static str];

    /// Argument shape check for an accepted operation
    fn validate_arguments(&self, operation: &str, payload: &Bytes) -> Result<()>;

    /// Create an instance and start its activation task
    fn spawn(&self, id: ActorId, seed: ActivationSeed);
}

struct TypedFactory<A: Actor> {
    factory: Box<dyn ActorFactory<A>>,
    _actor: PhantomData<fn() -> A>,
}

impl<A: Actor> ErasedFactory for TypedFactory<A> {
    fn operations(&self) -> &'static [&'static str] {
        A::OPERATIONS
    }

    fn validate_arguments(&self, operation: &str, payload: &Bytes) -> Result<()> {
        A::validate_arguments(operation, payload)
    }

    fn spawn(&self, id: ActorId, seed: ActivationSeed) {
        let actor = self.factory.create(&id);
        let active = ActiveActor::new(id, actor, seed);
        tokio::spawn(active.run());
    }
}

/// Registry of actor types available to a runtime
#[derive(Default)]
pub struct ActorRegistry {
    factories: HashMap<String, Arc<dyn ErasedFactory>>,
}

impl ActorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor type under a type tag
    ///
    /// # Errors
    /// Returns error if the tag is invalid or already registered.
    pub fn register<A, F>(&mut self, type_tag: impl Into<String>, factory: F) -> Result<()>
    where
        A: Actor,
        F: ActorFactory<A>,
    {
        let type_tag = type_tag.into();

        // Same validation an ActorId gets
        ActorId::new(type_tag.clone(), 0)?;
        debug_assert!(!A::OPERATIONS.is_empty(), "actor type accepts no operations");

        if self.factories.contains_key(&type_tag) {
            return Err(Error::DuplicateActorType { type_tag });
        }

        self.factories.insert(
            type_tag,
            Arc::new(TypedFactory {
                factory: Box::new(factory),
                _actor: PhantomData,
            }),
        );
        Ok(())
    }

    /// Register an actor type whose instances are clones of a prototype
    pub fn register_clone<A>(&mut self, type_tag: impl Into<String>, prototype: A) -> Result<()>
    where
        A: Actor + Clone,
    {
        self.register(type_tag, CloneFactory::new(prototype))
    }

    /// Check whether a type tag is registered
    pub fn contains(&self, type_tag: &str) -> bool {
        self.factories.contains_key(type_tag)
    }

    /// Registered type tags, sorted
    pub fn type_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Number of registered actor types
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no actor type is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Reject a call that no instance could accept
    ///
    /// Runs before resolution, so a malformed request never activates or
    /// touches its target.
    pub fn validate_call(&self, target: &ActorId, operation: &str, payload: &Bytes) -> Result<()> {
        let factory = self.lookup(target.type_tag())?;

        if operation.is_empty()
            || operation.len() > OPERATION_NAME_LENGTH_BYTES_MAX
            || !factory.operations().contains(&operation)
        {
            return Err(Error::invalid_operation(target.type_tag(), operation));
        }

        if payload.len() > MESSAGE_SIZE_BYTES_MAX {
            return Err(Error::MessageTooLarge {
                size: payload.len(),
                limit: MESSAGE_SIZE_BYTES_MAX,
            });
        }

        factory.validate_arguments(operation, payload)
    }

    pub(crate) fn lookup(&self, type_tag: &str) -> Result<&Arc<dyn ErasedFactory>> {
        self.factories
            .get(type_tag)
            .ok_or_else(|| Error::UnknownActorType {
                type_tag: type_tag.to_string(),
            })
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("type_tags", &self.type_tags())
            .finish()
    }
}
