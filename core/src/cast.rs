//! Registry of actor types
//!
//! The workload file names actor types (`Type: HelloWorld`); the [`Cast`]
//! maps each name to a producer that builds one actor instance per thread.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::actor::Actor;
use crate::actors;
use crate::error::{BenchError, BenchResult};
use crate::workload::ActorContext;

/// Builds one actor instance from its context
pub type ActorProducer = Arc<dyn Fn(&ActorContext) -> BenchResult<Box<dyn Actor>> + Send + Sync>;

/// Actor type name to producer
#[derive(Clone, Default)]
pub struct Cast {
    producers: BTreeMap<String, ActorProducer>,
}

impl Cast {
    /// Create an empty cast
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cast with every built-in actor type registered
    pub fn with_builtin_actors() -> Self {
        let mut cast = Self::new();
        for (name, producer) in actors::builtin() {
            cast.producers.insert(name.to_string(), producer);
        }
        cast
    }

    /// Register `producer` under `name`
    ///
    /// # Errors
    /// If `name` is already registered.
    pub fn add<F>(&mut self, name: impl Into<String>, producer: F) -> BenchResult<()>
    where
        F: Fn(&ActorContext) -> BenchResult<Box<dyn Actor>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.producers.contains_key(&name) {
            return Err(BenchError::DuplicateActorType(name));
        }
        tracing::debug!(actor_type = %name, "Registered actor type");
        self.producers.insert(name, Arc::new(producer));
        Ok(())
    }

    /// Producer for `name`, `None` if unknown
    pub fn producer(&self, name: &str) -> Option<&ActorProducer> {
        self.producers.get(name)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.producers.contains_key(name)
    }

    /// Registered type names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

impl std::fmt::Debug for Cast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cast")
            .field("actor_types", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
