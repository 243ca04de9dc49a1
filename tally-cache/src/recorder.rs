//! Call counting and call history as composable operation layers.
//!
//! An [`Operation`] is a unit of work invoked against a [`CacheService`].
//! [`CountCalls`] and [`CallHistory`] wrap an operation and implement
//! [`Operation`] themselves, so they stack in either order:
//!
//! ```rust,ignore
//! let op = CountCalls::new(CallHistory::new(op, store.clone(), &registry), store, &registry);
//! ```
//!
//! [`CacheService::instrument`] applies both layers in the order the
//! service uses for its own `store`: counting outermost, so a call is
//! counted before any history work can go wrong.

use crate::error::CacheResult;
use crate::registry::{OperationId, OperationRegistry};
use crate::service::CacheService;
use crate::traits::KeyValueStore;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{trace, warn};

/// An operation that can be instrumented.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Arguments of one call.
    type Input: Send + 'static;

    /// Result of one call.
    type Output: Send + 'static;

    /// Stable identity used for counter and history keys.
    fn id(&self) -> OperationId;

    /// Run the operation.
    async fn call(&self, cache: &CacheService, input: Self::Input) -> CacheResult<Self::Output>;
}

/// Hooks shared by the instrumentation layers of one operation.
#[derive(Clone)]
pub struct InvocationRecorder {
    operation: OperationId,
    store: Arc<dyn KeyValueStore>,
}

/// Serialized arguments of a call that has not returned yet.
#[derive(Debug)]
pub struct PendingCall {
    input: Vec<u8>,
}

impl PendingCall {
    /// Attach the serialized result of the call.
    ///
    /// A result that serializes to a JSON string is recorded as the bare
    /// text, so a returned key reads back as the key itself. Any other
    /// result is recorded as JSON.
    pub fn complete<O: Serialize>(self, output: &O) -> CacheResult<CompletedCall> {
        let output = match serde_json::to_value(output)? {
            serde_json::Value::String(text) => text.into_bytes(),
            other => serde_json::to_vec(&other)?,
        };
        Ok(CompletedCall {
            input: self.input,
            output,
        })
    }
}

/// Serialized input and output of a call, ready to append to the history.
#[derive(Debug)]
pub struct CompletedCall {
    input: Vec<u8>,
    output: Vec<u8>,
}

impl InvocationRecorder {
    /// Create a recorder writing to `store` under `operation`'s keys.
    pub fn new(operation: OperationId, store: Arc<dyn KeyValueStore>) -> Self {
        Self { operation, store }
    }

    /// Identity this recorder writes under.
    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    /// Count one call. Returns the new total.
    pub async fn count_call(&self) -> CacheResult<i64> {
        let calls = self.store.incr(self.operation.counter_key()).await?;
        trace!(operation = %self.operation, calls, "Counted call");
        Ok(calls)
    }

    /// Serialize the arguments of a call about to run.
    pub fn begin<I: Serialize>(&self, input: &I) -> CacheResult<PendingCall> {
        Ok(PendingCall {
            input: serde_json::to_vec(input)?,
        })
    }

    /// Append a finished call's input and output to the history.
    ///
    /// Both lists grow in one atomic store operation, so position `i` of the
    /// inputs always belongs with position `i` of the outputs.
    pub async fn finish(&self, call: CompletedCall) -> CacheResult<()> {
        let inputs_key = self.operation.inputs_key();
        let outputs_key = self.operation.outputs_key();

        self.store
            .append_pair((inputs_key.as_str(), call.input), (outputs_key.as_str(), call.output))
            .await?;
        trace!(operation = %self.operation, "Recorded call");
        Ok(())
    }
}

/// Layer counting every call to the inner operation.
///
/// The counter is bumped before the inner operation runs, so failed calls
/// are counted too.
pub struct CountCalls<O> {
    inner: O,
    recorder: InvocationRecorder,
}

impl<O: Operation> CountCalls<O> {
    /// Wrap `inner`, registering it as counted.
    pub fn new(inner: O, store: Arc<dyn KeyValueStore>, registry: &OperationRegistry) -> Self {
        let id = inner.id();
        registry.register_counting(&id);
        Self {
            inner,
            recorder: InvocationRecorder::new(id, store),
        }
    }

    /// The wrapped operation.
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O: Operation> Operation for CountCalls<O> {
    type Input = O::Input;
    type Output = O::Output;

    fn id(&self) -> OperationId {
        self.inner.id()
    }

    async fn call(&self, cache: &CacheService, input: Self::Input) -> CacheResult<Self::Output> {
        self.recorder.count_call().await?;
        self.inner.call(cache, input).await
    }
}

/// Layer recording the input and output of every successful call.
///
/// A call that fails leaves no history entry. Neither does a call whose
/// arguments or result cannot be serialized; such a call still runs and its
/// result is returned unchanged.
pub struct CallHistory<O> {
    inner: O,
    recorder: InvocationRecorder,
}

impl<O: Operation> CallHistory<O> {
    /// Wrap `inner`, registering it as recorded.
    pub fn new(inner: O, store: Arc<dyn KeyValueStore>, registry: &OperationRegistry) -> Self {
        let id = inner.id();
        registry.register_history(&id);
        Self {
            inner,
            recorder: InvocationRecorder::new(id, store),
        }
    }

    /// The wrapped operation.
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O> Operation for CallHistory<O>
where
    O: Operation,
    O::Input: Serialize,
    O::Output: Serialize,
{
    type Input = O::Input;
    type Output = O::Output;

    fn id(&self) -> OperationId {
        self.inner.id()
    }

    async fn call(&self, cache: &CacheService, input: Self::Input) -> CacheResult<Self::Output> {
        let pending = match self.recorder.begin(&input) {
            Ok(pending) => Some(pending),
            Err(e) => {
                warn!(operation = %self.recorder.operation(), error = %e, "Arguments not recordable");
                None
            }
        };

        let output = self.inner.call(cache, input).await?;

        if let Some(pending) = pending {
            match pending.complete(&output) {
                Ok(completed) => self.recorder.finish(completed).await?,
                Err(e) => {
                    warn!(operation = %self.recorder.operation(), error = %e, "Result not recordable");
                }
            }
        }
        Ok(output)
    }
}
