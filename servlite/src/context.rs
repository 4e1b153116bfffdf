//! Run-scoped registry of shared collaborators.
//!
//! The controller builds one `RunContext` per run and hands it to the embedded
//! runtime. Request handlers and runtime internals resolve what they need
//! (port hand-off, logging pipeline, options) by type instead of reaching for
//! process statics. The context is dropped when the run stops.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Entry = Arc<dyn Any + Send + Sync>;

/// Immutable, cheaply cloneable type-keyed registry.
#[derive(Clone, Default)]
pub struct RunContext {
    entries: Arc<HashMap<TypeId, Entry>>,
}

impl RunContext {
    pub fn builder() -> RunContextBuilder {
        RunContextBuilder::default()
    }

    /// Resolve the entry registered for `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(entry).downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Builder for [`RunContext`]. Registering a type twice keeps the last value.
#[derive(Default)]
pub struct RunContextBuilder {
    entries: HashMap<TypeId, Entry>,
}

impl RunContextBuilder {
    /// Register a shared value under its own type.
    pub fn with<T: Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        self.entries.insert(TypeId::of::<T>(), value);
        self
    }

    pub fn build(self) -> RunContext {
        RunContext {
            entries: Arc::new(self.entries),
        }
    }
}
