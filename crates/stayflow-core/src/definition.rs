use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Multilingual text: language code to text, resolved with an English
/// fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedText(pub HashMap<String, String>);

impl LocalizedText {
    /// Text carrying only an English value.
    pub fn en(text: impl Into<String>) -> Self {
        let mut map = HashMap::new();
        map.insert("en".to_string(), text.into());
        Self(map)
    }

    /// Add a translation.
    pub fn with(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(language.into(), text.into());
        self
    }

    /// Resolve for a language, falling back to English, then to any value.
    pub fn resolve(&self, language: &str) -> &str {
        self.0
            .get(language)
            .or_else(|| self.0.get("en"))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A declarative side-effecting call, resolved against the conversation
/// context at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action kind understood by the domain service (e.g. "create_booking").
    pub kind: String,
    /// Parameters; values may contain `{{path}}` references.
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ActionDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Silent classify-and-jump: maps a classifier outcome label to a step id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationDescriptor {
    /// Prompt handed to the classifier collaborator.
    pub prompt: String,
    /// Outcome label to target step id.
    #[serde(default)]
    pub outcomes: HashMap<String, String>,
    /// Step id used when no outcome matches or classification fails.
    pub default_step: String,
}

/// One step of a flat workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    /// Message rendered when this step executes.
    #[serde(default)]
    pub message: LocalizedText,
    /// Whether the caller should wait for a guest reply before re-invoking.
    #[serde(default = "default_true")]
    pub wait_for_reply: bool,
    /// Optional side-effecting enhancement of this step's reply.
    #[serde(default)]
    pub action: Option<ActionDescriptor>,
    /// Silent classify-and-jump. A step with an evaluation never collects
    /// guest input.
    #[serde(default)]
    pub evaluation: Option<EvaluationDescriptor>,
}

fn default_true() -> bool {
    true
}

impl Step {
    pub fn new(id: impl Into<String>, message: LocalizedText) -> Self {
        Self {
            id: id.into(),
            message,
            wait_for_reply: true,
            action: None,
            evaluation: None,
        }
    }

    /// A silent evaluation step.
    pub fn evaluation(id: impl Into<String>, evaluation: EvaluationDescriptor) -> Self {
        Self {
            id: id.into(),
            message: LocalizedText::default(),
            wait_for_reply: false,
            action: None,
            evaluation: Some(evaluation),
        }
    }

    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.action = Some(action);
        self
    }

    /// The caller should re-invoke immediately instead of waiting for a reply.
    pub fn auto_advance(mut self) -> Self {
        self.wait_for_reply = false;
        self
    }
}

/// Operator applied by a `condition` node. Numeric operators parse the
/// resolved value as a number; non-numeric values compare as false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Gt,
    Lt,
    Eq,
    Neq,
    Exists,
    Empty,
}

/// Type-specific configuration of a graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Emit templated text and continue.
    Message { text: LocalizedText },
    /// Optionally prompt, then suspend until the next guest message, which
    /// is stored under `store_as`.
    WaitReply {
        #[serde(default)]
        prompt: Option<LocalizedText>,
        store_as: String,
    },
    /// Side-channel notification through the transport collaborator.
    Send {
        recipient: String,
        content: LocalizedText,
        /// Derived-outputs key for send metadata.
        #[serde(default)]
        record_as: Option<String>,
    },
    /// Invoke the action collaborator and merge outputs into derived data.
    ApiCall {
        action: ActionDescriptor,
        /// Rename returned outputs: returned name to stored name.
        #[serde(default)]
        rename_outputs: HashMap<String, String>,
    },
    /// Branch on a templated field.
    Condition {
        field: String,
        op: ConditionOp,
        #[serde(default)]
        value: String,
        #[serde(default)]
        true_next: Option<String>,
        #[serde(default)]
        false_next: Option<String>,
    },
    /// Unrecognized node kinds pass through to their default edge.
    #[serde(other)]
    Unknown,
}

/// A node in a graph workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    /// Default outgoing edge. A node without one is terminal.
    #[serde(default)]
    pub next: Option<String>,
    /// Edge taken when a `send` or `api_call` fails.
    #[serde(default)]
    pub on_error: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn message(id: impl Into<String>, text: LocalizedText) -> Self {
        Self {
            id: id.into(),
            next: None,
            on_error: None,
            kind: NodeKind::Message { text },
        }
    }

    pub fn wait_reply(
        id: impl Into<String>,
        prompt: Option<LocalizedText>,
        store_as: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            next: None,
            on_error: None,
            kind: NodeKind::WaitReply {
                prompt,
                store_as: store_as.into(),
            },
        }
    }

    pub fn send(
        id: impl Into<String>,
        recipient: impl Into<String>,
        content: LocalizedText,
    ) -> Self {
        Self {
            id: id.into(),
            next: None,
            on_error: None,
            kind: NodeKind::Send {
                recipient: recipient.into(),
                content,
                record_as: None,
            },
        }
    }

    pub fn api_call(id: impl Into<String>, action: ActionDescriptor) -> Self {
        Self {
            id: id.into(),
            next: None,
            on_error: None,
            kind: NodeKind::ApiCall {
                action,
                rename_outputs: HashMap::new(),
            },
        }
    }

    pub fn condition(
        id: impl Into<String>,
        field: impl Into<String>,
        op: ConditionOp,
        value: impl Into<String>,
        true_next: Option<String>,
        false_next: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            next: None,
            on_error: None,
            kind: NodeKind::Condition {
                field: field.into(),
                op,
                value: value.into(),
                true_next,
                false_next,
            },
        }
    }

    /// Set the default outgoing edge.
    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    /// Set the error edge.
    pub fn or_else(mut self, target: impl Into<String>) -> Self {
        self.on_error = Some(target.into());
        self
    }

    /// Record send metadata under `key` in derived outputs (send nodes only).
    pub fn record_as(mut self, key: impl Into<String>) -> Self {
        if let NodeKind::Send { record_as, .. } = &mut self.kind {
            *record_as = Some(key.into());
        }
        self
    }

    /// Store an output under a different name (api_call nodes only).
    pub fn rename_output(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        if let NodeKind::ApiCall { rename_outputs, .. } = &mut self.kind {
            rename_outputs.insert(from.into(), to.into());
        }
        self
    }
}

/// Which interpreter a definition or state runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModel {
    Flat,
    Graph,
}

impl std::fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Graph => write!(f, "graph"),
        }
    }
}

/// A named conversation script. Exactly one execution model per definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum WorkflowDefinition {
    /// Linear step list.
    Flat { id: String, steps: Vec<Step> },
    /// Directed node graph walked from `start`.
    Graph {
        id: String,
        start: String,
        nodes: Vec<Node>,
    },
}

impl WorkflowDefinition {
    pub fn id(&self) -> &str {
        match self {
            Self::Flat { id, .. } => id,
            Self::Graph { id, .. } => id,
        }
    }

    pub fn model(&self) -> ExecutionModel {
        match self {
            Self::Flat { .. } => ExecutionModel::Flat,
            Self::Graph { .. } => ExecutionModel::Graph,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_resolve_fallback() {
        let text = LocalizedText::en("Hello").with("es", "Hola");
        assert_eq!(text.resolve("es"), "Hola");
        assert_eq!(text.resolve("fr"), "Hello");
        assert_eq!(LocalizedText::default().resolve("en"), "");
    }

    #[test]
    fn test_step_defaults_wait_for_reply() {
        let json = r#"{"id": "ask_name", "message": {"en": "Your name?"}}"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert!(step.wait_for_reply);
        assert!(step.action.is_none());
        assert!(step.evaluation.is_none());
    }

    #[test]
    fn test_node_kind_tagged_parse() {
        let json = r#"{
            "id": "check",
            "type": "condition",
            "field": "{{collected.age}}",
            "op": "gt",
            "value": "18",
            "true_next": "adult",
            "false_next": "minor"
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        match node.kind {
            NodeKind::Condition { op, true_next, .. } => {
                assert_eq!(op, ConditionOp::Gt);
                assert_eq!(true_next.as_deref(), Some("adult"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_node_kind_parses() {
        let json = r#"{"id": "x", "type": "hologram", "next": "end"}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert!(matches!(node.kind, NodeKind::Unknown));
        assert_eq!(node.next.as_deref(), Some("end"));
    }

    #[test]
    fn test_definition_model_tag() {
        let json = r#"{
            "model": "graph",
            "id": "welcome",
            "start": "hello",
            "nodes": [
                {"id": "hello", "type": "message", "text": {"en": "Hi"}}
            ]
        }"#;
        let def: WorkflowDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.id(), "welcome");
        assert_eq!(def.model(), ExecutionModel::Graph);
    }

    #[test]
    fn test_definition_roundtrip() {
        let def = WorkflowDefinition::Flat {
            id: "survey".into(),
            steps: vec![Step::new("ask", LocalizedText::en("How was your stay?"))],
        };
        let json = serde_json::to_string(&def).unwrap();
        let parsed: WorkflowDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id(), "survey");
        assert_eq!(parsed.model(), ExecutionModel::Flat);
    }
}
