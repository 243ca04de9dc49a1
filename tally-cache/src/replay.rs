//! Reading back the recorded history of instrumented operations.

use crate::error::CacheResult;
use crate::registry::{OperationId, OperationRegistry};
use crate::service::CacheService;
use crate::traits::KeyValueStore;
use crate::value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One recorded call: its serialized arguments and result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEntry {
    /// Arguments as JSON text
    pub input: String,
    /// Result as bare text for strings, JSON otherwise
    pub output: String,
}

/// Call history of one operation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    /// The operation replayed
    pub operation: OperationId,
    /// Total number of calls, including failed ones when calls are counted
    pub calls: i64,
    /// Successful calls, oldest first
    pub entries: Vec<ReplayEntry>,
}

impl Replay {
    fn empty(operation: OperationId) -> Self {
        Self {
            operation,
            calls: 0,
            entries: Vec::new(),
        }
    }

    /// Arguments of each call, oldest first.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.input.as_str())
    }

    /// Results of each call, oldest first.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.output.as_str())
    }
}

impl fmt::Display for Replay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} was called {} times:", self.operation, self.calls)?;
        for entry in &self.entries {
            write!(f, "\n{}({}) -> {}", self.operation, entry.input, entry.output)?;
        }
        Ok(())
    }
}

/// Reconstructs call histories written by the instrumentation layers.
///
/// Only operations present in the registry are read; anything else replays
/// as zero calls.
#[derive(Clone)]
pub struct ReplayEngine {
    store: Arc<dyn KeyValueStore>,
    registry: OperationRegistry,
}

impl ReplayEngine {
    /// Create an engine over a store and the registry its layers write to.
    pub fn new(store: Arc<dyn KeyValueStore>, registry: OperationRegistry) -> Self {
        Self { store, registry }
    }

    /// Create an engine reading what `cache`'s operations recorded.
    pub fn for_service(cache: &CacheService) -> Self {
        Self::new(cache.store_handle().clone(), cache.registry().clone())
    }

    /// Replay the history of `operation`.
    pub async fn replay(&self, operation: &OperationId) -> CacheResult<Replay> {
        let Some(instrumentation) = self.registry.get(operation) else {
            debug!(operation = %operation, "Replay of unregistered operation");
            return Ok(Replay::empty(operation.clone()));
        };

        let entries = if instrumentation.recorded {
            self.read_history(operation).await?
        } else {
            Vec::new()
        };

        let calls = if instrumentation.counted {
            match self.store.get(operation.counter_key()).await? {
                Some(bytes) => value::integer(bytes)?,
                None => 0,
            }
        } else {
            entries.len() as i64
        };

        Ok(Replay {
            operation: operation.clone(),
            calls,
            entries,
        })
    }

    async fn read_history(&self, operation: &OperationId) -> CacheResult<Vec<ReplayEntry>> {
        let inputs = self.store.lrange(&operation.inputs_key(), 0, -1).await?;
        let outputs = self.store.lrange(&operation.outputs_key(), 0, -1).await?;

        inputs
            .into_iter()
            .zip(outputs)
            .map(|(input, output)| -> CacheResult<ReplayEntry> {
                Ok(ReplayEntry {
                    input: value::utf8(input)?,
                    output: value::utf8(output)?,
                })
            })
            .collect()
    }
}
