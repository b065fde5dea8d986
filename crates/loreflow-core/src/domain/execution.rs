//! One run of a step tree: cursor, variables and terminal state

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::step_tree::{StepIndex, StepTree};
use crate::types::{EntityId, FlowValue, TriggerId};

/// What started an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOrigin {
    /// Started directly on behalf of an entity (a player command)
    Entity(EntityId),

    /// Spawned by a trigger firing
    Trigger(TriggerId),

    /// Spawned for an event without a trigger record
    Event(String),

    /// Started by the request dispatcher itself
    Dispatch,
}

/// Lifecycle of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Steps remain to execute
    Running,

    /// Halted early by a stop signal; `stop_reason` may carry a message
    Stop,

    /// Traversal exhausted the tree
    Complete,
}

/// One run of a [`StepTree`] with its own variable mapping.
///
/// Variables are flow-scoped and exclusively owned: nested executions get
/// fresh mappings, never views into the parent's.
pub struct FlowExecution {
    /// The tree being traversed
    pub tree: Arc<StepTree>,

    /// Cursor into the tree's arena; `None` once traversal is exhausted
    pub current: Option<StepIndex>,

    /// Flow-scoped variable bindings
    pub variables: HashMap<String, FlowValue>,

    /// Lifecycle state
    pub state: ExecutionState,

    /// Message attached by a stop signal, surfaced to callers
    pub stop_reason: Option<String>,

    /// What started this execution
    pub origin: ExecutionOrigin,
}

impl FlowExecution {
    /// Start an execution at the tree's entry step
    pub fn new(
        tree: Arc<StepTree>,
        origin: ExecutionOrigin,
        variables: HashMap<String, FlowValue>,
    ) -> Self {
        let current = Some(tree.entry());
        Self {
            tree,
            current,
            variables,
            state: ExecutionState::Running,
            stop_reason: None,
            origin,
        }
    }

    /// Whether the execution still has steps to run
    pub fn is_running(&self) -> bool {
        self.state == ExecutionState::Running && self.current.is_some()
    }

    /// Bind a variable, replacing any previous value
    pub fn set_variable(&mut self, name: impl Into<String>, value: FlowValue) {
        self.variables.insert(name.into(), value);
    }

    /// Halt with `state = Stop` and an optional user-facing reason
    pub fn stop(&mut self, reason: Option<String>) {
        self.state = ExecutionState::Stop;
        self.stop_reason = reason;
        self.current = None;
    }

    /// Advance the cursor in document order after the current step ran.
    ///
    /// `opened_branch` is true unless the step was a conditional whose
    /// comparison failed: descend to the first child when one exists,
    /// otherwise move to the next sibling, walking up until one is found.
    /// Exhausting the root marks the execution `Complete`.
    pub fn advance(&mut self, opened_branch: bool) {
        let Some(current) = self.current else {
            return;
        };
        if self.state != ExecutionState::Running {
            return;
        }

        if opened_branch {
            if let Some(child) = self.tree.first_child(current) {
                self.current = Some(child);
                return;
            }
        }

        let mut ix = current;
        loop {
            if let Some(sibling) = self.tree.next_sibling(ix) {
                self.current = Some(sibling);
                return;
            }
            match self.tree.parent(ix) {
                Some(parent) => ix = parent,
                None => {
                    self.current = None;
                    self.state = ExecutionState::Complete;
                    return;
                }
            }
        }
    }

    /// Abandon the innermost branch containing the cursor: jump to the next
    /// sibling of the nearest ancestor (or the cursor itself) that has one,
    /// completing the execution when none does.
    pub fn skip_branch(&mut self) {
        // Same walk as a no-descend advance
        self.advance(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::step_tree::{StepAction, StepDefinition};
    use crate::types::TreeId;
    use serde_json::json;

    fn noop(id: &str, parent: Option<&str>) -> StepDefinition {
        StepDefinition::new(id, parent, StepAction::SetVariable { value: json!(null) })
            .with_variable("_")
    }

    fn diamond_tree() -> Arc<StepTree> {
        // a(root) -> b, c; d under b
        Arc::new(
            StepTree::new(
                TreeId("t".to_string()),
                vec![
                    noop("a", None),
                    noop("b", Some("a")),
                    noop("d", Some("b")),
                    noop("c", Some("a")),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_document_order_traversal() {
        let mut execution =
            FlowExecution::new(diamond_tree(), ExecutionOrigin::Dispatch, HashMap::new());

        let mut visited = Vec::new();
        while let Some(ix) = execution.current {
            visited.push(execution.tree.step(ix).id.0.clone());
            execution.advance(true);
        }

        assert_eq!(visited, vec!["a", "b", "d", "c"]);
        assert_eq!(execution.state, ExecutionState::Complete);
    }

    #[test]
    fn test_failed_branch_skips_children() {
        let mut execution =
            FlowExecution::new(diamond_tree(), ExecutionOrigin::Dispatch, HashMap::new());

        // a descends to b; b's branch does not open, so d is skipped
        execution.advance(true);
        execution.advance(false);

        let ix = execution.current.unwrap();
        assert_eq!(execution.tree.step(ix).id.0, "c");
    }

    #[test]
    fn test_skip_branch_walks_to_ancestor_sibling() {
        let mut execution =
            FlowExecution::new(diamond_tree(), ExecutionOrigin::Dispatch, HashMap::new());

        // Move to d, then abandon the branch: next stop is c
        execution.advance(true);
        execution.advance(true);
        execution.skip_branch();

        let ix = execution.current.unwrap();
        assert_eq!(execution.tree.step(ix).id.0, "c");
    }

    #[test]
    fn test_stop_halts_traversal() {
        let mut execution =
            FlowExecution::new(diamond_tree(), ExecutionOrigin::Dispatch, HashMap::new());

        execution.stop(Some("Action not permitted.".to_string()));
        assert_eq!(execution.state, ExecutionState::Stop);
        assert_eq!(execution.current, None);
        assert!(!execution.is_running());

        // Advancement after a stop is inert
        execution.advance(true);
        assert_eq!(execution.state, ExecutionState::Stop);
    }

    #[test]
    fn test_variables_are_flow_scoped() {
        let mut execution =
            FlowExecution::new(diamond_tree(), ExecutionOrigin::Dispatch, HashMap::new());
        execution.set_variable("target", FlowValue::Entity(EntityId("bob".to_string())));

        let nested =
            FlowExecution::new(diamond_tree(), ExecutionOrigin::Dispatch, HashMap::new());
        assert!(nested.variables.is_empty());
        assert!(execution.variables.contains_key("target"));
    }
}
