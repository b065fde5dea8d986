//! Step trees: the stored, designer-authored action graphs
//!
//! A tree is an arena of steps indexed by [`StepIndex`], with parent and
//! child relationships held as explicit index lists rather than live
//! references. Malformed definitions (no root, two roots, dangling parents,
//! parent cycles) are rejected at construction time, never during traversal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{StepId, TreeId};
use crate::EngineError;

/// Index of a step inside its tree's arena
pub type StepIndex = usize;

/// The action a step performs, as a closed sum type.
///
/// Designers author these as tagged records; the interpreter dispatches on
/// them with an exhaustive match, so adding a variant is a compile-checked
/// change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Invoke a named service function with the step's resolved parameters
    CallServiceFunction {
        /// Registered name of the function
        function: String,
    },

    /// Emit an event built from the step's resolved parameters.
    ///
    /// The reserved parameter `usage_key` pins the event's usage key;
    /// otherwise every emission occurrence gets a fresh one.
    EmitEvent {
        /// Event type key that triggers listen for
        event_type: String,
    },

    /// Emit one event per element of `iterable`, with the element bound as
    /// `$item` while the data template resolves. Event names are
    /// auto-indexed (`name_0`, `name_1`, ...).
    EmitEventForEach {
        /// Event type key that triggers listen for
        event_type: String,
        /// Literal sequence or sigil reference resolving to one
        iterable: Value,
    },

    /// Compare two resolved values; equality opens the step's sub-branch
    EvaluateEquals {
        /// Left operand (literal or sigil reference)
        left: Value,
        /// Right operand (literal or sigil reference)
        right: Value,
    },

    /// Compare two resolved values; inequality opens the step's sub-branch
    EvaluateNotEquals {
        /// Left operand (literal or sigil reference)
        left: Value,
        /// Right operand (literal or sigil reference)
        right: Value,
    },

    /// Resolve `value` and bind it under the step's `variable_name`
    SetVariable {
        /// Literal or sigil reference
        value: Value,
    },

    /// End the current execution with `state = Stop` and the given message
    StopFlow {
        /// User-facing stop reason
        message: Option<String>,
    },
}

/// One node of a step tree, as authored and persisted externally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step identity, unique within its tree
    pub id: StepId,

    /// Parent step; `None` marks the tree's single entry step
    pub parent_id: Option<StepId>,

    /// The action this step performs
    pub action: StepAction,

    /// Optional binding name for the step's result
    pub variable_name: Option<String>,

    /// Ordered keyword parameters; values are literals or sigil references
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
}

impl StepDefinition {
    /// Create a step with no parameters and no result binding
    pub fn new(id: impl Into<String>, parent_id: Option<&str>, action: StepAction) -> Self {
        Self {
            id: StepId(id.into()),
            parent_id: parent_id.map(|p| StepId(p.to_string())),
            action,
            variable_name: None,
            parameters: IndexMap::new(),
        }
    }

    /// Builder: bind the step's result under the given variable name
    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variable_name = Some(name.into());
        self
    }

    /// Builder: add one keyword parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// A validated, immutable step tree ready for traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTree {
    /// Tree identity in the definition store
    pub id: TreeId,

    steps: Vec<StepDefinition>,
    parent: Vec<Option<StepIndex>>,
    children: Vec<Vec<StepIndex>>,
    root: StepIndex,
}

impl StepTree {
    /// Validate a list of authored steps into a traversable tree.
    ///
    /// Rejects empty trees, duplicate step ids, zero or multiple roots,
    /// dangling parent references and parent cycles.
    pub fn new(id: TreeId, steps: Vec<StepDefinition>) -> Result<Self, EngineError> {
        if steps.is_empty() {
            return Err(EngineError::ValidationError(format!(
                "Step tree {} has no steps",
                id.0
            )));
        }

        // Index steps by id, rejecting duplicates
        let mut index_of = std::collections::HashMap::with_capacity(steps.len());
        for (ix, step) in steps.iter().enumerate() {
            if index_of.insert(step.id.clone(), ix).is_some() {
                return Err(EngineError::ValidationError(format!(
                    "Step tree {} has duplicate step id: {}",
                    id.0, step.id.0
                )));
            }
        }

        // Resolve parent links; sibling order is insertion order
        let mut parent: Vec<Option<StepIndex>> = vec![None; steps.len()];
        let mut children: Vec<Vec<StepIndex>> = vec![Vec::new(); steps.len()];
        let mut root: Option<StepIndex> = None;

        for (ix, step) in steps.iter().enumerate() {
            match &step.parent_id {
                None => {
                    if let Some(existing) = root {
                        return Err(EngineError::ValidationError(format!(
                            "Step tree {} has multiple entry steps: {} and {}",
                            id.0, steps[existing].id.0, step.id.0
                        )));
                    }
                    root = Some(ix);
                }
                Some(parent_id) => {
                    let parent_ix = *index_of.get(parent_id).ok_or_else(|| {
                        EngineError::ValidationError(format!(
                            "Step {} in tree {} references missing parent: {}",
                            step.id.0, id.0, parent_id.0
                        ))
                    })?;
                    if parent_ix == ix {
                        return Err(EngineError::ValidationError(format!(
                            "Step {} in tree {} is its own parent",
                            step.id.0, id.0
                        )));
                    }
                    parent[ix] = Some(parent_ix);
                    children[parent_ix].push(ix);
                }
            }
        }

        let root = root.ok_or_else(|| {
            EngineError::ValidationError(format!("Step tree {} has no entry step", id.0))
        })?;

        // Every step must be reachable from the root; unreachable steps mean
        // a parent cycle or a detached subtree
        let mut visited = vec![false; steps.len()];
        let mut stack = vec![root];
        while let Some(ix) = stack.pop() {
            if visited[ix] {
                continue;
            }
            visited[ix] = true;
            stack.extend(children[ix].iter().copied());
        }
        if let Some(orphan) = visited.iter().position(|v| !v) {
            return Err(EngineError::ValidationError(format!(
                "Step {} in tree {} is unreachable from the entry step (cycle or detached subtree)",
                steps[orphan].id.0, id.0
            )));
        }

        Ok(Self {
            id,
            steps,
            parent,
            children,
            root,
        })
    }

    /// A minimal one-step tree that only emits the given event type, as
    /// used by prerequisite checks
    pub fn emit_only(event_type: &str) -> Self {
        let step = StepDefinition::new(
            format!("emit_{}", event_type),
            None,
            StepAction::EmitEvent {
                event_type: event_type.to_string(),
            },
        );
        // A single root step always validates
        Self::new(TreeId(format!("prerequisite_{}", event_type)), vec![step])
            .expect("one-step tree is always valid")
    }

    /// Index of the entry step
    pub fn entry(&self) -> StepIndex {
        self.root
    }

    /// The step at the given index
    pub fn step(&self, ix: StepIndex) -> &StepDefinition {
        &self.steps[ix]
    }

    /// Number of steps in the tree
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the tree is empty (never true for a validated tree)
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// First child of a step, by creation order
    pub fn first_child(&self, ix: StepIndex) -> Option<StepIndex> {
        self.children[ix].first().copied()
    }

    /// Next sibling of a step under the same parent
    pub fn next_sibling(&self, ix: StepIndex) -> Option<StepIndex> {
        let parent = self.parent[ix]?;
        let siblings = &self.children[parent];
        let pos = siblings.iter().position(|&s| s == ix)?;
        siblings.get(pos + 1).copied()
    }

    /// Parent of a step, `None` for the entry step
    pub fn parent(&self, ix: StepIndex) -> Option<StepIndex> {
        self.parent[ix]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(id: &str, parent: Option<&str>) -> StepDefinition {
        StepDefinition::new(
            id,
            parent,
            StepAction::SetVariable { value: json!(null) },
        )
        .with_variable("_")
    }

    #[test]
    fn test_tree_construction_and_navigation() {
        // A(root) -> B, C; D under B
        let tree = StepTree::new(
            TreeId("t".to_string()),
            vec![
                noop("a", None),
                noop("b", Some("a")),
                noop("d", Some("b")),
                noop("c", Some("a")),
            ],
        )
        .unwrap();

        let a = tree.entry();
        assert_eq!(tree.step(a).id.0, "a");

        let b = tree.first_child(a).unwrap();
        assert_eq!(tree.step(b).id.0, "b");

        let d = tree.first_child(b).unwrap();
        assert_eq!(tree.step(d).id.0, "d");
        assert_eq!(tree.next_sibling(d), None);

        let c = tree.next_sibling(b).unwrap();
        assert_eq!(tree.step(c).id.0, "c");
        assert_eq!(tree.next_sibling(c), None);

        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_sibling_order_is_insertion_order() {
        let tree = StepTree::new(
            TreeId("t".to_string()),
            vec![
                noop("root", None),
                noop("second", Some("root")),
                noop("third", Some("root")),
                noop("fourth", Some("root")),
            ],
        )
        .unwrap();

        let root = tree.entry();
        let mut order = Vec::new();
        let mut cursor = tree.first_child(root);
        while let Some(ix) = cursor {
            order.push(tree.step(ix).id.0.clone());
            cursor = tree.next_sibling(ix);
        }
        assert_eq!(order, vec!["second", "third", "fourth"]);
    }

    #[test]
    fn test_empty_tree_rejected() {
        let result = StepTree::new(TreeId("empty".to_string()), vec![]);
        match result {
            Err(EngineError::ValidationError(msg)) => assert!(msg.contains("has no steps")),
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_duplicate_step_ids_rejected() {
        let result = StepTree::new(
            TreeId("t".to_string()),
            vec![noop("a", None), noop("a", Some("a"))],
        );
        match result {
            Err(EngineError::ValidationError(msg)) => {
                assert!(msg.contains("duplicate step id"));
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let result = StepTree::new(
            TreeId("t".to_string()),
            vec![noop("a", None), noop("b", None)],
        );
        match result {
            Err(EngineError::ValidationError(msg)) => {
                assert!(msg.contains("multiple entry steps"));
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_missing_root_rejected() {
        // Two steps pointing at each other: no entry step, and a cycle
        let result = StepTree::new(
            TreeId("t".to_string()),
            vec![noop("a", Some("b")), noop("b", Some("a"))],
        );
        match result {
            Err(EngineError::ValidationError(msg)) => {
                assert!(msg.contains("no entry step"));
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_dangling_parent_rejected() {
        let result = StepTree::new(
            TreeId("t".to_string()),
            vec![noop("a", None), noop("b", Some("ghost"))],
        );
        match result {
            Err(EngineError::ValidationError(msg)) => {
                assert!(msg.contains("missing parent"));
                assert!(msg.contains("ghost"));
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_parent_cycle_rejected() {
        // Root exists, but b and c form a cycle detached from it
        let result = StepTree::new(
            TreeId("t".to_string()),
            vec![noop("a", None), noop("b", Some("c")), noop("c", Some("b"))],
        );
        match result {
            Err(EngineError::ValidationError(msg)) => {
                assert!(msg.contains("unreachable"));
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_self_parent_rejected() {
        let result = StepTree::new(
            TreeId("t".to_string()),
            vec![noop("a", None), noop("b", Some("b"))],
        );
        match result {
            Err(EngineError::ValidationError(msg)) => {
                assert!(msg.contains("its own parent"));
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_emit_only_tree() {
        let tree = StepTree::emit_only("can_move");
        assert_eq!(tree.len(), 1);
        match &tree.step(tree.entry()).action {
            StepAction::EmitEvent { event_type } => assert_eq!(event_type, "can_move"),
            other => panic!("Expected EmitEvent, got {:?}", other),
        }
    }

    #[test]
    fn test_step_action_serde_roundtrip() {
        let action = StepAction::EmitEvent {
            event_type: "glance".to_string(),
        };
        let serialized = serde_json::to_string(&action).unwrap();
        assert!(serialized.contains("\"type\":\"emit_event\""));
        let deserialized: StepAction = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, action);
    }

    #[test]
    fn test_step_definition_builders() {
        let step = StepDefinition::new(
            "check",
            Some("root"),
            StepAction::CallServiceFunction {
                function: "skill_check".to_string(),
            },
        )
        .with_variable("passed")
        .with_parameter("skill", json!("perception"))
        .with_parameter("difficulty", json!(12));

        assert_eq!(step.variable_name.as_deref(), Some("passed"));
        // Parameter order is preserved
        let keys: Vec<&String> = step.parameters.keys().collect();
        assert_eq!(keys, vec!["skill", "difficulty"]);
    }
}
