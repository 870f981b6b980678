use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::definition::ExecutionModel;

/// Identity of the guest on the other side of the conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestIdentity {
    pub guest_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl GuestIdentity {
    pub fn new(guest_id: impl Into<String>) -> Self {
        Self {
            guest_id: guest_id.into(),
            name: None,
            phone: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Human-readable form for hand-off summaries.
    pub fn display(&self) -> String {
        match (&self.name, &self.phone) {
            (Some(name), Some(phone)) => format!("{} ({})", name, phone),
            (Some(name), None) => name.clone(),
            (None, Some(phone)) => phone.clone(),
            (None, None) => self.guest_id.clone(),
        }
    }
}

/// Where a conversation currently sits inside its definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    /// Index into a flat step list. Stored as i64 so positions corrupted by
    /// mid-conversation definition edits heal instead of failing to parse.
    Step { index: i64 },
    /// Node id inside a graph.
    Node { id: String },
}

/// Caller-persisted progress of one conversation. The sole carrier of
/// progress across invocations; the engine holds nothing between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Conversation instance id.
    pub conversation_id: String,
    /// Definition this state runs against.
    pub workflow_id: String,
    pub model: ExecutionModel,
    pub position: Position,
    /// Guest-supplied answers, keyed by step id or wait-reply storage key.
    #[serde(default)]
    pub collected: HashMap<String, String>,
    /// Values produced by actions and sends, distinct from guest answers.
    #[serde(default)]
    pub derived: HashMap<String, serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub last_update_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Fresh state for a flat workflow, positioned at the first step.
    pub fn flat(workflow_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            model: ExecutionModel::Flat,
            position: Position::Step { index: 0 },
            collected: HashMap::new(),
            derived: HashMap::new(),
            started_at: now,
            last_update_at: now,
        }
    }

    /// Fresh state for a graph workflow, positioned at the start node.
    pub fn graph(workflow_id: impl Into<String>, start: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            model: ExecutionModel::Graph,
            position: Position::Node { id: start.into() },
            collected: HashMap::new(),
            derived: HashMap::new(),
            started_at: now,
            last_update_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_update_at = Utc::now();
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_states() {
        let flat = WorkflowState::flat("survey");
        assert_eq!(flat.model, ExecutionModel::Flat);
        assert_eq!(flat.position, Position::Step { index: 0 });
        assert!(flat.collected.is_empty());

        let graph = WorkflowState::graph("booking", "welcome");
        assert_eq!(graph.model, ExecutionModel::Graph);
        assert_eq!(
            graph.position,
            Position::Node {
                id: "welcome".into()
            }
        );
    }

    #[test]
    fn test_state_roundtrip() {
        let mut state = WorkflowState::flat("survey");
        state.collected.insert("ask_name".into(), "Aiman".into());
        state
            .derived
            .insert("booking_id".into(), serde_json::json!("B-1042"));

        let json = serde_json::to_string(&state).unwrap();
        let parsed: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.workflow_id, "survey");
        assert_eq!(parsed.collected.get("ask_name").unwrap(), "Aiman");
        assert_eq!(
            parsed.derived.get("booking_id").unwrap(),
            &serde_json::json!("B-1042")
        );
    }

    #[test]
    fn test_negative_position_still_parses() {
        let json = r#"{
            "conversation_id": "c1",
            "workflow_id": "survey",
            "model": "flat",
            "position": {"kind": "step", "index": -4},
            "started_at": "2026-07-01T10:00:00Z",
            "last_update_at": "2026-07-01T10:05:00Z"
        }"#;
        let state: WorkflowState = serde_json::from_str(json).unwrap();
        assert_eq!(state.position, Position::Step { index: -4 });
    }

    #[test]
    fn test_identity_display() {
        let guest = GuestIdentity::new("g-77")
            .with_name("Aiman")
            .with_phone("+60123456789");
        assert_eq!(guest.display(), "Aiman (+60123456789)");
        assert_eq!(GuestIdentity::new("g-77").display(), "g-77");
    }
}
