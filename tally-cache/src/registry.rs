//! Operation identities and the registry of instrumented operations.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable identity of an instrumented operation.
///
/// The identity doubles as the counter key; the call history lives in the
/// lists `<id>:inputs` and `<id>:outputs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(String);

impl OperationId {
    /// Create an identity from a name such as `Cache.store`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the call counter.
    pub fn counter_key(&self) -> &str {
        &self.0
    }

    /// Key of the list of serialized inputs.
    pub fn inputs_key(&self) -> String {
        format!("{}:inputs", self.0)
    }

    /// Key of the list of serialized outputs.
    pub fn outputs_key(&self) -> String {
        format!("{}:outputs", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OperationId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Which instrumentation layers wrap an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instrumentation {
    /// Calls are counted
    pub counted: bool,
    /// Inputs and outputs are recorded
    pub recorded: bool,
}

/// Registry mapping operation identities to their instrumentation.
///
/// Layers register themselves on construction. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: Arc<RwLock<HashMap<OperationId, Instrumentation>>>,
}

impl OperationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that calls to `id` are counted.
    pub fn register_counting(&self, id: &OperationId) {
        self.operations.write().entry(id.clone()).or_default().counted = true;
    }

    /// Note that calls to `id` have their history recorded.
    pub fn register_history(&self, id: &OperationId) {
        self.operations.write().entry(id.clone()).or_default().recorded = true;
    }

    /// Instrumentation of `id`, if it was ever registered.
    pub fn get(&self, id: &OperationId) -> Option<Instrumentation> {
        self.operations.read().get(id).copied()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &OperationId) -> bool {
        self.operations.read().contains_key(id)
    }

    /// All registered identities, sorted.
    pub fn operations(&self) -> Vec<OperationId> {
        let mut ids: Vec<_> = self.operations.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
