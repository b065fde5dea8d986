//! Builders for designer content used in tests

use serde_json::Value;
use std::sync::Arc;

use loreflow_core::domain::triggers::{Trigger, TriggerDefinition};
use loreflow_core::{EntityId, StepAction, StepDefinition, StepTree, TreeId};

/// Incremental builder for a [`StepTree`]; panics on invalid trees so test
/// fixtures fail fast
pub struct StepTreeBuilder {
    id: TreeId,
    steps: Vec<StepDefinition>,
}

impl StepTreeBuilder {
    /// Start a tree with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: TreeId(id.into()),
            steps: Vec::new(),
        }
    }

    /// Append a fully built step
    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a step from its parts
    pub fn action(mut self, id: &str, parent: Option<&str>, action: StepAction) -> Self {
        self.steps.push(StepDefinition::new(id, parent, action));
        self
    }

    /// Append a `set_variable` step
    pub fn set_variable(
        mut self,
        id: &str,
        parent: Option<&str>,
        variable: &str,
        value: Value,
    ) -> Self {
        self.steps.push(
            StepDefinition::new(id, parent, StepAction::SetVariable { value })
                .with_variable(variable),
        );
        self
    }

    /// Append an `emit_event` step with the given data parameters
    pub fn emit_event(
        mut self,
        id: &str,
        parent: Option<&str>,
        event_type: &str,
        data: &[(&str, Value)],
    ) -> Self {
        let mut step = StepDefinition::new(
            id,
            parent,
            StepAction::EmitEvent {
                event_type: event_type.to_string(),
            },
        );
        for (key, value) in data {
            step = step.with_parameter(*key, value.clone());
        }
        self.steps.push(step);
        self
    }

    /// Append a `stop_flow` step
    pub fn stop_flow(mut self, id: &str, parent: Option<&str>, message: Option<&str>) -> Self {
        self.steps.push(StepDefinition::new(
            id,
            parent,
            StepAction::StopFlow {
                message: message.map(str::to_string),
            },
        ));
        self
    }

    /// Validate and build the tree
    pub fn build(self) -> StepTree {
        let id = self.id.0.clone();
        StepTree::new(self.id, self.steps)
            .unwrap_or_else(|e| panic!("invalid test tree {}: {}", id, e))
    }

    /// Validate and build behind a shared handle
    pub fn build_arc(self) -> Arc<StepTree> {
        Arc::new(self.build())
    }
}

/// Builder producing a [`Trigger`] together with its definition
pub struct TriggerBuilder {
    id: String,
    event_key: String,
    target_tree: Arc<StepTree>,
    bound_entity: EntityId,
    base_filter: Vec<(String, Value)>,
    additional_filter: Vec<(String, Value)>,
    priority: i64,
    settings: Vec<(String, String)>,
}

impl TriggerBuilder {
    /// Start a trigger listening for `event_key` and running `target_tree`
    pub fn new(
        id: impl Into<String>,
        event_key: impl Into<String>,
        target_tree: Arc<StepTree>,
    ) -> Self {
        Self {
            id: id.into(),
            event_key: event_key.into(),
            target_tree,
            bound_entity: EntityId("unbound".to_string()),
            base_filter: Vec::new(),
            additional_filter: Vec::new(),
            priority: 0,
            settings: Vec::new(),
        }
    }

    /// Bind the trigger to an entity (`$self` in filters)
    pub fn bound_to(mut self, entity: &EntityId) -> Self {
        self.bound_entity = entity.clone();
        self
    }

    /// Add a base (definition-level) filter condition
    pub fn filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.base_filter.push((key.into(), value));
        self
    }

    /// Add an additional (binding-level) filter condition
    pub fn additional_filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_filter.push((key.into(), value));
        self
    }

    /// Set the firing priority
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Persist a usage limit for the trigger's event key (0 = unlimited)
    pub fn usage_limit(mut self, limit: u32) -> Self {
        self.settings.push((
            format!("usage_limit_{}", self.event_key),
            limit.to_string(),
        ));
        self
    }

    /// Build the trigger
    pub fn build(self) -> Trigger {
        let mut definition = TriggerDefinition::new(self.event_key, self.target_tree)
            .with_priority(self.priority);
        for (key, value) in self.base_filter {
            definition = definition.with_filter(key, value);
        }

        let mut trigger = Trigger::new(self.id, Arc::new(definition), self.bound_entity);
        for (key, value) in self.additional_filter {
            trigger = trigger.with_filter(key, value);
        }
        for (key, value) in self.settings {
            trigger = trigger.with_setting(key, value);
        }
        trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loreflow_core::domain::triggers::UsageLimit;
    use serde_json::json;

    #[test]
    fn test_tree_builder() {
        let tree = StepTreeBuilder::new("greeting")
            .set_variable("root", None, "mood", json!("friendly"))
            .emit_event(
                "wave",
                Some("root"),
                "wave",
                &[("mood", json!("@mood"))],
            )
            .build();

        assert_eq!(tree.id.0, "greeting");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    #[should_panic(expected = "invalid test tree")]
    fn test_tree_builder_panics_on_invalid_tree() {
        StepTreeBuilder::new("broken")
            .set_variable("a", None, "x", json!(1))
            .set_variable("b", None, "y", json!(2))
            .build();
    }

    #[test]
    fn test_trigger_builder() {
        let tree = StepTreeBuilder::new("reaction")
            .set_variable("root", None, "noticed", json!(true))
            .build_arc();
        let bob = EntityId("bob".to_string());

        let trigger = TriggerBuilder::new("glance_reaction", "glance", tree)
            .bound_to(&bob)
            .filter("target", json!("$self"))
            .priority(10)
            .usage_limit(0)
            .build();

        assert_eq!(trigger.bound_entity_id, bob);
        assert_eq!(trigger.definition.priority, 10);
        assert_eq!(trigger.usage_limit(), UsageLimit::Unlimited);
    }
}
