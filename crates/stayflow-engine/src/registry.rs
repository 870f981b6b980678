use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use stayflow_core::definition::{Node, NodeKind, WorkflowDefinition};
use stayflow_core::error::{FlowError, Result};
use stayflow_core::traits::DefinitionStore;

/// Check a definition for structural defects: empty bodies, duplicate ids,
/// edges into nowhere, unreachable graph nodes.
pub fn validate(def: &WorkflowDefinition) -> Result<()> {
    match def {
        WorkflowDefinition::Flat { id, steps } => {
            if steps.is_empty() {
                return malformed(id, "step list is empty");
            }
            let mut seen = HashSet::new();
            for step in steps {
                if !seen.insert(step.id.as_str()) {
                    return malformed(id, format!("duplicate step id '{}'", step.id));
                }
            }
        }
        WorkflowDefinition::Graph { id, start, nodes } => {
            if nodes.is_empty() {
                return malformed(id, "node list is empty");
            }
            let mut index: HashMap<&str, &Node> = HashMap::new();
            for node in nodes {
                if index.insert(node.id.as_str(), node).is_some() {
                    return malformed(id, format!("duplicate node id '{}'", node.id));
                }
            }
            if !index.contains_key(start.as_str()) {
                return malformed(id, format!("start node '{}' does not exist", start));
            }
            for node in nodes {
                for target in edge_targets(node) {
                    if !index.contains_key(target) {
                        return malformed(
                            id,
                            format!("node '{}' points at missing node '{}'", node.id, target),
                        );
                    }
                }
            }

            // Reachability from the start node
            let mut reached = HashSet::new();
            let mut queue = VecDeque::from([start.as_str()]);
            while let Some(current) = queue.pop_front() {
                if !reached.insert(current) {
                    continue;
                }
                if let Some(node) = index.get(current) {
                    queue.extend(edge_targets(node));
                }
            }
            let unreachable: Vec<&str> = nodes
                .iter()
                .map(|n| n.id.as_str())
                .filter(|id| !reached.contains(id))
                .collect();
            if !unreachable.is_empty() {
                return malformed(
                    id,
                    format!("unreachable nodes: {}", unreachable.join(", ")),
                );
            }
        }
    }
    Ok(())
}

fn malformed(id: &str, reason: impl Into<String>) -> Result<()> {
    Err(FlowError::DefinitionMalformed {
        id: id.to_string(),
        reason: reason.into(),
    })
}

/// All outgoing edge targets of a node.
fn edge_targets(node: &Node) -> Vec<&str> {
    let mut targets = Vec::new();
    if let Some(next) = &node.next {
        targets.push(next.as_str());
    }
    if let Some(on_error) = &node.on_error {
        targets.push(on_error.as_str());
    }
    if let NodeKind::Condition {
        true_next,
        false_next,
        ..
    } = &node.kind
    {
        targets.extend(true_next.as_deref());
        targets.extend(false_next.as_deref());
    }
    targets
}

/// Definitions held in memory, for embedding and tests.
#[derive(Default)]
pub struct InMemoryDefinitionStore {
    definitions: HashMap<String, WorkflowDefinition>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, def: WorkflowDefinition) {
        self.definitions.insert(def.id().to_string(), def);
    }
}

impl DefinitionStore for InMemoryDefinitionStore {
    fn fetch(&self, workflow_id: &str) -> BoxFuture<'_, Result<WorkflowDefinition>> {
        let found = self.definitions.get(workflow_id).cloned();
        let id = workflow_id.to_string();
        Box::pin(async move { found.ok_or(FlowError::DefinitionNotFound(id)) })
    }
}

/// Loads `*.json` definition files from a directory at startup.
pub struct DirectoryDefinitionStore {
    definitions: HashMap<String, WorkflowDefinition>,
}

impl DirectoryDefinitionStore {
    /// Read every `*.json` file in `dir`. Unparseable files are skipped with
    /// a warning so one bad file cannot take the rest down.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut definitions = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<WorkflowDefinition>(&content) {
                Ok(def) => {
                    debug!(workflow = %def.id(), file = %path.display(), "Loaded workflow definition");
                    definitions.insert(def.id().to_string(), def);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unparseable workflow definition");
                }
            }
        }
        Ok(Self { definitions })
    }

    pub fn get(&self, workflow_id: &str) -> Option<&WorkflowDefinition> {
        self.definitions.get(workflow_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkflowDefinition)> {
        self.definitions.iter().map(|(id, def)| (id.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionStore for DirectoryDefinitionStore {
    fn fetch(&self, workflow_id: &str) -> BoxFuture<'_, Result<WorkflowDefinition>> {
        let found = self.definitions.get(workflow_id).cloned();
        let id = workflow_id.to_string();
        Box::pin(async move { found.ok_or(FlowError::DefinitionNotFound(id)) })
    }
}
