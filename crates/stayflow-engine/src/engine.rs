use std::sync::Arc;

use tracing::error;

use stayflow_core::config::EngineConfig;
use stayflow_core::definition::WorkflowDefinition;
use stayflow_core::error::{FlowError, Result};
use stayflow_core::state::{GuestIdentity, WorkflowState};
use stayflow_core::traits::{ActionInvoker, AlertSink, Classifier, DefinitionStore, Transport};

use crate::flat::FlatRun;
use crate::graph::GraphRun;
use crate::outcome::{FaultCode, FaultInfo, StepOutcome};
use crate::registry;

/// Reply used when a definition cannot be executed. Structural defects are
/// alerted operationally, never shown raw to the guest.
const FALLBACK_MESSAGE: &str = "Sorry, we are unable to continue this conversation right now. A member of our team will follow up with you shortly.";

/// The workflow execution engine.
///
/// Stateless between invocations: all progress lives in the caller-persisted
/// `WorkflowState`, and all collaborators are injected. A single engine may
/// serve any number of conversations concurrently as long as the caller
/// keeps at most one in-flight call per conversation.
pub struct FlowEngine {
    definitions: Arc<dyn DefinitionStore>,
    actions: Arc<dyn ActionInvoker>,
    transport: Arc<dyn Transport>,
    classifier: Arc<dyn Classifier>,
    alerts: Option<Arc<dyn AlertSink>>,
    config: EngineConfig,
}

impl FlowEngine {
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        actions: Arc<dyn ActionInvoker>,
        transport: Arc<dyn Transport>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            definitions,
            actions,
            transport,
            classifier,
            alerts: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the initial state for a newly triggered conversation,
    /// positioned at the first step or the start node.
    pub async fn begin(&self, workflow_id: &str) -> Result<WorkflowState> {
        let def = self.definitions.fetch(workflow_id).await?;
        registry::validate(&def)?;
        Ok(match &def {
            WorkflowDefinition::Flat { id, .. } => WorkflowState::flat(id.clone()),
            WorkflowDefinition::Graph { id, start, .. } => {
                WorkflowState::graph(id.clone(), start.clone())
            }
        })
    }

    /// Advance a conversation by exactly one logical step.
    ///
    /// Never fails outward: structural problems produce a fixed fallback
    /// reply plus an operational alert, and external-call failures degrade
    /// inside the executors. The caller persists `next_state` (or treats
    /// `None` as terminal) and delivers `reply` over its channel.
    pub async fn execute_step(
        &self,
        state: WorkflowState,
        incoming: Option<&str>,
        language: &str,
        guest: &GuestIdentity,
    ) -> StepOutcome {
        let language = if language.is_empty() {
            self.config.default_language.as_str()
        } else {
            language
        };

        let def = match self.definitions.fetch(&state.workflow_id).await {
            Ok(def) => def,
            Err(e) => return self.unusable(&state, e).await,
        };
        if let Err(e) = registry::validate(&def) {
            return self.unusable(&state, e).await;
        }

        match &def {
            WorkflowDefinition::Flat { id, steps } => {
                FlatRun {
                    workflow_id: id,
                    steps,
                    actions: &self.actions,
                    classifier: &self.classifier,
                    language,
                    guest,
                    max_eval_jumps: self.config.max_eval_jumps,
                }
                .execute(state, incoming)
                .await
            }
            WorkflowDefinition::Graph { id, start, nodes } => {
                GraphRun {
                    workflow_id: id,
                    start,
                    nodes,
                    actions: &self.actions,
                    transport: &self.transport,
                    language,
                    guest,
                    max_visits: self.config.max_node_visits,
                }
                .execute(state, incoming)
                .await
            }
        }
    }

    async fn unusable(&self, state: &WorkflowState, err: FlowError) -> StepOutcome {
        error!(workflow = %state.workflow_id, error = %err, "Workflow definition unusable");
        if let Some(alerts) = &self.alerts {
            alerts
                .raise(
                    "workflow_unusable",
                    &format!("{}: {}", state.workflow_id, err),
                )
                .await;
        }
        let reply = self
            .config
            .fallback_message
            .clone()
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        StepOutcome {
            reply,
            next_state: None,
            hand_off: true,
            summary: None,
            fault: Some(FaultInfo::new(
                FaultCode::DefinitionUnusable,
                state.workflow_id.clone(),
                err.to_string(),
            )),
        }
    }
}
