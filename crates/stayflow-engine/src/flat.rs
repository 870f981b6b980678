use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use stayflow_core::definition::Step;
use stayflow_core::state::{GuestIdentity, Position, WorkflowState};
use stayflow_core::traits::{ActionInvoker, Classifier};

use crate::outcome::{FaultCode, FaultInfo, StepOutcome};
use crate::summary;
use crate::template::{render, resolve_params, TemplateContext};

/// One invocation of the flat-step interpreter.
pub(crate) struct FlatRun<'a> {
    pub workflow_id: &'a str,
    pub steps: &'a [Step],
    pub actions: &'a Arc<dyn ActionInvoker>,
    pub classifier: &'a Arc<dyn Classifier>,
    pub language: &'a str,
    pub guest: &'a GuestIdentity,
    pub max_eval_jumps: usize,
}

impl FlatRun<'_> {
    pub(crate) async fn execute(
        &self,
        mut state: WorkflowState,
        incoming: Option<&str>,
    ) -> StepOutcome {
        let len = self.steps.len() as i64;
        let raw = match &state.position {
            Position::Step { index } => *index,
            Position::Node { id } => {
                warn!(workflow = %self.workflow_id, node = %id, "Graph position on a flat workflow; restarting at step 0");
                0
            }
        };
        let index = raw.clamp(0, len) as usize;
        if raw != index as i64 {
            warn!(workflow = %self.workflow_id, position = raw, healed = index, "Healed out-of-range step position");
        }
        state.position = Position::Step {
            index: index as i64,
        };

        // Record the guest's reply against the step that asked for it.
        // Evaluation steps never collect: they are invisible to the guest.
        if let (Some(text), true) = (incoming, index > 0) {
            let previous = &self.steps[index - 1];
            if previous.evaluation.is_none() {
                state.collected.insert(previous.id.clone(), text.to_string());
            } else {
                debug!(step = %previous.id, "Previous step was an evaluation; reply not collected");
            }
        }

        self.run_from(state, index, incoming, 0).await
    }

    /// Execute the step at `index`. Evaluation steps re-enter here at their
    /// jump target with `incoming` cleared, bounded by `max_eval_jumps`.
    fn run_from<'f>(
        &'f self,
        mut state: WorkflowState,
        index: usize,
        incoming: Option<&'f str>,
        jumps: usize,
    ) -> BoxFuture<'f, StepOutcome> {
        Box::pin(async move {
            if index >= self.steps.len() {
                return self.complete(state);
            }
            let step = &self.steps[index];
            let mut fault = None;

            if let Some(evaluation) = &step.evaluation {
                if jumps >= self.max_eval_jumps {
                    warn!(workflow = %self.workflow_id, step = %step.id, jumps, "Evaluation jump limit reached; advancing past evaluation step");
                } else {
                    let context = serialize_collected(&state.collected);
                    let label = match self
                        .classifier
                        .classify(&evaluation.prompt, &context, incoming.unwrap_or_default())
                        .await
                    {
                        Ok(label) => label,
                        Err(e) => {
                            warn!(step = %step.id, error = %e, "Classification failed; using default branch");
                            fault = Some(FaultInfo::new(
                                FaultCode::ClassificationFailed,
                                step.id.clone(),
                                e.to_string(),
                            ));
                            String::new()
                        }
                    };
                    let target_id = evaluation
                        .outcomes
                        .get(label.trim())
                        .unwrap_or(&evaluation.default_step);
                    if let Some(target) = self.steps.iter().position(|s| s.id == *target_id) {
                        debug!(step = %step.id, outcome = %label, target = %target_id, "Evaluation jump");
                        // The jumped-to step produces the actual reply and
                        // must not consume the guest message a second time.
                        let mut outcome = self.run_from(state, target, None, jumps + 1).await;
                        outcome.fault = outcome.fault.or(fault);
                        return outcome;
                    }
                    warn!(step = %step.id, target = %target_id, "Evaluation target not found; advancing by one");
                }
                // Fall through: treat as a normal, non-collecting step.
            }

            let ctx = TemplateContext::new(&state.collected, &state.derived, self.guest);
            let mut reply = render(step.message.resolve(self.language), &ctx);

            if let Some(action) = &step.action {
                let params = resolve_params(&action.params, &ctx);
                match self.actions.invoke(action, params).await {
                    Ok(outcome) => {
                        if !outcome.outputs.is_empty() {
                            debug!(step = %step.id, outputs = outcome.outputs.len(), "Action returned structured outputs");
                        }
                        if let Some(message) = outcome.message {
                            reply = message;
                        }
                    }
                    Err(e) => {
                        warn!(step = %step.id, error = %e, "Action failed; keeping templated reply");
                        fault = fault.or(Some(FaultInfo::new(
                            FaultCode::ActionFailed,
                            step.id.clone(),
                            e.to_string(),
                        )));
                    }
                }
            }

            state.position = Position::Step {
                index: (index + 1) as i64,
            };
            state.touch();

            StepOutcome {
                reply,
                next_state: Some(state),
                hand_off: false,
                summary: None,
                fault,
            }
        })
    }

    fn complete(&self, state: WorkflowState) -> StepOutcome {
        let ctx = TemplateContext::new(&state.collected, &state.derived, self.guest);
        // Validation guarantees a non-empty step list.
        let last = &self.steps[self.steps.len() - 1];
        let reply = render(last.message.resolve(self.language), &ctx);
        let summary = summary::flat(self.steps, &state, self.guest);
        info!(workflow = %self.workflow_id, conversation = %state.conversation_id, "Flat workflow complete");
        StepOutcome {
            reply,
            next_state: None,
            hand_off: true,
            summary: Some(summary),
            fault: None,
        }
    }
}

/// Serialize collected answers as `key: value` lines for the classifier.
/// Sorted so identical states always produce identical context strings.
fn serialize_collected(collected: &HashMap<String, String>) -> String {
    let mut lines: Vec<String> = collected
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect();
    lines.sort();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_collected_sorted() {
        let mut collected = HashMap::new();
        collected.insert("b_room".to_string(), "204".to_string());
        collected.insert("a_name".to_string(), "Aiman".to_string());

        assert_eq!(
            serialize_collected(&collected),
            "a_name: Aiman\nb_room: 204"
        );
        assert_eq!(serialize_collected(&HashMap::new()), "");
    }
}
