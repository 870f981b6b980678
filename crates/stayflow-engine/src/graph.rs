use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use stayflow_core::definition::{ConditionOp, Node, NodeKind};
use stayflow_core::state::{GuestIdentity, Position, WorkflowState};
use stayflow_core::traits::{ActionInvoker, Transport};

use crate::outcome::{FaultCode, FaultInfo, StepOutcome};
use crate::summary;
use crate::template::{render, resolve_params, TemplateContext};

/// One invocation of the graph interpreter: an iterative walk that ends by
/// suspension at a wait node, by running off the graph, or at the visit
/// bound.
pub(crate) struct GraphRun<'a> {
    pub workflow_id: &'a str,
    pub start: &'a str,
    pub nodes: &'a [Node],
    pub actions: &'a Arc<dyn ActionInvoker>,
    pub transport: &'a Arc<dyn Transport>,
    pub language: &'a str,
    pub guest: &'a GuestIdentity,
    pub max_visits: usize,
}

impl GraphRun<'_> {
    pub(crate) async fn execute(
        &self,
        mut state: WorkflowState,
        incoming: Option<&str>,
    ) -> StepOutcome {
        let index: HashMap<&str, &Node> = self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut current = match &state.position {
            Position::Node { id } => id.clone(),
            Position::Step { index } => {
                warn!(workflow = %self.workflow_id, position = index, "Step position on a graph workflow; restarting at the start node");
                self.start.to_string()
            }
        };
        if !index.contains_key(current.as_str()) {
            warn!(workflow = %self.workflow_id, node = %current, "Position points at a node that no longer exists; restarting at the start node");
            current = self.start.to_string();
        }

        let mut parts: Vec<String> = Vec::new();
        let mut fault: Option<FaultInfo> = None;

        // Resume arrival: a reply delivered to a waiting node is stored
        // under its key, then the walk continues along the default edge.
        if let Some(text) = incoming {
            if let Some(node) = index.get(current.as_str()) {
                if let NodeKind::WaitReply { store_as, .. } = &node.kind {
                    debug!(node = %node.id, key = %store_as, "Storing guest reply");
                    state.collected.insert(store_as.clone(), text.to_string());
                    state.touch();
                    match &node.next {
                        Some(next) => current = next.clone(),
                        None => return self.complete(state, parts, fault),
                    }
                }
            }
        }

        let mut visits = 0usize;
        loop {
            visits += 1;
            if visits > self.max_visits {
                warn!(workflow = %self.workflow_id, node = %current, limit = self.max_visits, "Node visit limit exceeded; truncating walk");
                fault = fault.or(Some(FaultInfo::new(
                    FaultCode::LoopBoundExceeded,
                    current.clone(),
                    format!("stopped after {} node visits", self.max_visits),
                )));
                return self.complete(state, parts, fault);
            }
            let Some(node) = index.get(current.as_str()) else {
                warn!(workflow = %self.workflow_id, node = %current, "Edge points at a node that no longer exists; ending walk");
                return self.complete(state, parts, fault);
            };
            debug!(node = %node.id, "Executing node");

            let next: Option<String> = match &node.kind {
                NodeKind::Message { text } => {
                    let ctx = TemplateContext::new(&state.collected, &state.derived, self.guest);
                    parts.push(render(text.resolve(self.language), &ctx));
                    node.next.clone()
                }
                NodeKind::WaitReply { prompt, .. } => {
                    if let Some(prompt) = prompt {
                        let ctx =
                            TemplateContext::new(&state.collected, &state.derived, self.guest);
                        parts.push(render(prompt.resolve(self.language), &ctx));
                    }
                    // Suspend: return control and stay on this node until
                    // the guest's next message arrives.
                    state.position = Position::Node {
                        id: node.id.clone(),
                    };
                    state.touch();
                    return StepOutcome {
                        reply: parts.join("\n"),
                        next_state: Some(state),
                        hand_off: false,
                        summary: None,
                        fault,
                    };
                }
                NodeKind::Send {
                    recipient,
                    content,
                    record_as,
                } => {
                    let ctx = TemplateContext::new(&state.collected, &state.derived, self.guest);
                    let to = render(recipient, &ctx);
                    let body = render(content.resolve(self.language), &ctx);
                    match self.transport.send(&to, &body).await {
                        Ok(()) => {
                            info!(node = %node.id, recipient = %to, "Notification sent");
                            if let Some(key) = record_as {
                                state
                                    .derived
                                    .insert(key.clone(), json!({"recipient": to, "status": "sent"}));
                            }
                            node.next.clone()
                        }
                        Err(e) => {
                            warn!(node = %node.id, recipient = %to, error = %e, "Send failed");
                            fault = fault.or(Some(FaultInfo::new(
                                FaultCode::SendFailed,
                                node.id.clone(),
                                e.to_string(),
                            )));
                            node.on_error.clone().or_else(|| node.next.clone())
                        }
                    }
                }
                NodeKind::ApiCall {
                    action,
                    rename_outputs,
                } => {
                    let ctx = TemplateContext::new(&state.collected, &state.derived, self.guest);
                    let params = resolve_params(&action.params, &ctx);
                    match self.actions.invoke(action, params).await {
                        Ok(outcome) => {
                            // Outputs land under both their plain name and a
                            // scope named after the node, so later templates
                            // can disambiguate colliding keys.
                            let mut scoped = serde_json::Map::new();
                            for (key, value) in outcome.outputs {
                                scoped.insert(key.clone(), value.clone());
                                state.derived.insert(key, value);
                            }
                            state
                                .derived
                                .insert(node.id.clone(), serde_json::Value::Object(scoped));
                            for (from, to) in rename_outputs {
                                if let Some(value) = state.derived.get(from).cloned() {
                                    state.derived.insert(to.clone(), value);
                                }
                            }
                            state
                                .derived
                                .insert(format!("{}_status", node.id), json!("success"));
                            node.next.clone()
                        }
                        Err(e) => {
                            warn!(node = %node.id, kind = %action.kind, error = %e, "Action call failed");
                            state
                                .derived
                                .insert(format!("{}_status", node.id), json!("error"));
                            fault = fault.or(Some(FaultInfo::new(
                                FaultCode::ActionFailed,
                                node.id.clone(),
                                e.to_string(),
                            )));
                            node.on_error.clone().or_else(|| node.next.clone())
                        }
                    }
                }
                NodeKind::Condition {
                    field,
                    op,
                    value,
                    true_next,
                    false_next,
                } => {
                    let ctx = TemplateContext::new(&state.collected, &state.derived, self.guest);
                    let resolved = render(field, &ctx);
                    let result = evaluate(&resolved, *op, value);
                    debug!(node = %node.id, resolved = %resolved, op = ?op, literal = %value, result, "Condition evaluated");
                    if result {
                        true_next.clone()
                    } else {
                        false_next.clone()
                    }
                }
                NodeKind::Unknown => {
                    debug!(node = %node.id, "Unknown node kind; passing through");
                    node.next.clone()
                }
            };

            match next {
                Some(id) => current = id,
                None => return self.complete(state, parts, fault),
            }
        }
    }

    fn complete(
        &self,
        state: WorkflowState,
        parts: Vec<String>,
        fault: Option<FaultInfo>,
    ) -> StepOutcome {
        let summary = summary::graph(self.nodes, &state, self.guest);
        info!(workflow = %self.workflow_id, conversation = %state.conversation_id, "Graph workflow complete");
        StepOutcome {
            reply: parts.join("\n"),
            next_state: None,
            hand_off: true,
            summary: Some(summary),
            fault,
        }
    }
}

/// Apply a condition operator to a resolved field value. Numeric operators
/// compare as false when either side fails to parse.
pub(crate) fn evaluate(resolved: &str, op: ConditionOp, literal: &str) -> bool {
    match op {
        ConditionOp::Exists => !resolved.is_empty(),
        ConditionOp::Empty => resolved.is_empty(),
        ConditionOp::Eq => resolved == literal,
        ConditionOp::Neq => resolved != literal,
        ConditionOp::Gt | ConditionOp::Lt => {
            let (Ok(lhs), Ok(rhs)) = (
                resolved.trim().parse::<f64>(),
                literal.trim().parse::<f64>(),
            ) else {
                return false;
            };
            if op == ConditionOp::Gt {
                lhs > rhs
            } else {
                lhs < rhs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_operators() {
        assert!(evaluate("15", ConditionOp::Gt, "10"));
        assert!(!evaluate("15", ConditionOp::Lt, "10"));
        assert!(evaluate("9.5", ConditionOp::Lt, "10"));
        assert!(evaluate(" 15 ", ConditionOp::Gt, "10"));
    }

    #[test]
    fn test_non_numeric_compares_false() {
        assert!(!evaluate("abc", ConditionOp::Gt, "5"));
        assert!(!evaluate("abc", ConditionOp::Lt, "5"));
        assert!(!evaluate("15", ConditionOp::Gt, "many"));
    }

    #[test]
    fn test_equality_operators() {
        assert!(evaluate("yes", ConditionOp::Eq, "yes"));
        assert!(!evaluate("yes", ConditionOp::Eq, "no"));
        assert!(evaluate("yes", ConditionOp::Neq, "no"));
    }

    #[test]
    fn test_presence_operators() {
        assert!(evaluate("", ConditionOp::Empty, ""));
        assert!(!evaluate("x", ConditionOp::Empty, ""));
        assert!(evaluate("x", ConditionOp::Exists, ""));
        assert!(!evaluate("", ConditionOp::Exists, ""));
    }
}
