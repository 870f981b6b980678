use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::definition::{ActionDescriptor, WorkflowDefinition};
use crate::error::Result;

/// Result of a side-effecting action call.
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    /// Optional replacement for the step's templated reply.
    pub message: Option<String>,
    /// Structured values merged into derived outputs.
    pub outputs: HashMap<String, serde_json::Value>,
}

/// Domain-service boundary for side-effecting calls. Timeouts and retries
/// are the implementation's concern; the engine only degrades on error.
pub trait ActionInvoker: Send + Sync + 'static {
    /// Invoke an action with template-resolved parameters.
    fn invoke(
        &self,
        descriptor: &ActionDescriptor,
        params: HashMap<String, String>,
    ) -> BoxFuture<'_, Result<ActionOutcome>>;
}

/// Transport boundary for side-channel notifications (graph `send` nodes).
/// The guest-facing reply path belongs to the caller, not the engine.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, recipient: &str, content: &str) -> BoxFuture<'_, Result<()>>;
}

/// Natural-language classification boundary used by flat evaluation steps.
pub trait Classifier: Send + Sync + 'static {
    /// Classify `latest_input` given a prompt and the serialized
    /// conversation context, returning an outcome label.
    fn classify(
        &self,
        prompt: &str,
        context: &str,
        latest_input: &str,
    ) -> BoxFuture<'_, Result<String>>;
}

/// Operational alerting boundary for defects that must never reach guests.
pub trait AlertSink: Send + Sync + 'static {
    fn raise(&self, code: &str, detail: &str) -> BoxFuture<'_, ()>;
}

/// Lookup boundary for workflow definitions.
pub trait DefinitionStore: Send + Sync + 'static {
    fn fetch(&self, workflow_id: &str) -> BoxFuture<'_, Result<WorkflowDefinition>>;
}
