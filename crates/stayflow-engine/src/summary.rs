use stayflow_core::definition::{Node, NodeKind, Step};
use stayflow_core::state::{GuestIdentity, WorkflowState};

/// Hand-off transcript for a completed flat conversation. Answers are
/// listed in step order, labelled with the question that produced them.
pub(crate) fn flat(steps: &[Step], state: &WorkflowState, guest: &GuestIdentity) -> String {
    let entries: Vec<(String, String)> = steps
        .iter()
        .filter_map(|step| {
            state.collected.get(&step.id).map(|answer| {
                let label = step.message.resolve("en");
                let label = if label.is_empty() {
                    step.id.as_str()
                } else {
                    label
                };
                (label.to_string(), answer.clone())
            })
        })
        .collect();
    build(state, guest, entries)
}

/// Hand-off transcript for a completed graph conversation. Answers are
/// listed in node order, labelled with the wait prompt that collected them.
pub(crate) fn graph(nodes: &[Node], state: &WorkflowState, guest: &GuestIdentity) -> String {
    let entries: Vec<(String, String)> = nodes
        .iter()
        .filter_map(|node| {
            let NodeKind::WaitReply { prompt, store_as } = &node.kind else {
                return None;
            };
            state.collected.get(store_as).map(|answer| {
                let label = prompt
                    .as_ref()
                    .map(|p| p.resolve("en"))
                    .filter(|label| !label.is_empty())
                    .unwrap_or(store_as.as_str());
                (label.to_string(), answer.clone())
            })
        })
        .collect();
    build(state, guest, entries)
}

fn build(state: &WorkflowState, guest: &GuestIdentity, entries: Vec<(String, String)>) -> String {
    let elapsed = state.elapsed();
    let minutes = elapsed.num_minutes();
    let seconds = elapsed.num_seconds().rem_euclid(60);

    let mut out = String::new();
    out.push_str("Conversation summary\n");
    out.push_str(&format!("Workflow: {}\n", state.workflow_id));
    out.push_str(&format!("Guest: {}\n", guest.display()));
    out.push_str(&format!("Duration: {}m {}s\n", minutes, seconds));
    out.push('\n');

    if entries.is_empty() {
        out.push_str("No answers were collected.\n");
    } else {
        out.push_str("Answers:\n");
        for (label, answer) in entries {
            out.push_str(&format!("- {}: {}\n", label, answer));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stayflow_core::definition::LocalizedText;

    #[test]
    fn test_flat_summary_labels_and_order() {
        let steps = vec![
            Step::new("ask_name", LocalizedText::en("What is your name?")),
            Step::new("ask_room", LocalizedText::en("Which room are you in?")),
        ];
        let mut state = WorkflowState::flat("survey");
        state.collected.insert("ask_room".into(), "204".into());
        state.collected.insert("ask_name".into(), "Aiman".into());

        let guest = GuestIdentity::new("g-1").with_name("Aiman");
        let text = flat(&steps, &state, &guest);

        assert!(text.contains("Workflow: survey"));
        assert!(text.contains("Guest: Aiman"));
        let name_at = text.find("What is your name?: Aiman").unwrap();
        let room_at = text.find("Which room are you in?: 204").unwrap();
        assert!(name_at < room_at);
    }

    #[test]
    fn test_empty_collection_marker() {
        let state = WorkflowState::flat("survey");
        let guest = GuestIdentity::new("g-1");
        let text = flat(&[], &state, &guest);
        assert!(text.contains("No answers were collected."));
    }

    #[test]
    fn test_graph_summary_uses_prompt_label() {
        let nodes = vec![Node::wait_reply(
            "ask",
            Some(LocalizedText::en("What is your name?")),
            "name",
        )];
        let mut state = WorkflowState::graph("welcome", "ask");
        state.collected.insert("name".into(), "Aiman".into());

        let text = graph(&nodes, &state, &GuestIdentity::new("g-1"));
        assert!(text.contains("- What is your name?: Aiman"));
    }

    #[test]
    fn test_graph_summary_falls_back_to_key() {
        let nodes = vec![Node::wait_reply("ask", None, "name")];
        let mut state = WorkflowState::graph("welcome", "ask");
        state.collected.insert("name".into(), "Aiman".into());

        let text = graph(&nodes, &state, &GuestIdentity::new("g-1"));
        assert!(text.contains("- name: Aiman"));
    }
}
