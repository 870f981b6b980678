use serde::{Deserialize, Serialize};

use stayflow_core::state::WorkflowState;

/// What the engine decided for one invocation.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Text to deliver to the guest over the channel.
    pub reply: String,
    /// Updated state to persist, or `None` when the conversation ended.
    pub next_state: Option<WorkflowState>,
    /// Whether the conversation should be handed to a human operator.
    pub hand_off: bool,
    /// Transcript for the hand-off channel, present on completion.
    pub summary: Option<String>,
    /// First degradation absorbed while producing this reply, if any.
    pub fault: Option<FaultInfo>,
}

/// A degradation the engine absorbed instead of failing the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultInfo {
    pub code: FaultCode,
    /// Step or node where the fault occurred.
    pub at: String,
    pub detail: String,
}

impl FaultInfo {
    pub fn new(code: FaultCode, at: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code,
            at: at.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultCode {
    ActionFailed,
    SendFailed,
    ClassificationFailed,
    LoopBoundExceeded,
    DefinitionUnusable,
}
