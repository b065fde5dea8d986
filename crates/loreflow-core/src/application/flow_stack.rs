//! The interpreter: one request-scoped stack of flow executions
//!
//! A [`FlowStack`] drives one external request to completion: it runs step
//! trees, emits their events, dispatches matching triggers depth-first and
//! synchronously, and enforces the nesting-depth guard. Everything a
//! request touches (scene store, trigger registry, nesting depth) lives
//! here and is discarded when the stack is dropped.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::application::service_registry::{ServiceContext, ServiceRegistry};
use crate::config::EngineConfig;
use crate::domain::events::FlowEvent;
use crate::domain::execution::{ExecutionOrigin, ExecutionState, FlowExecution};
use crate::domain::scene::SceneDataManager;
use crate::domain::step_tree::{StepAction, StepDefinition, StepIndex, StepTree};
use crate::domain::triggers::{Trigger, TriggerRegistry};
use crate::domain::variables::VariableResolver;
use crate::domain::world::{DefinitionStore, EntityGraph, Messenger};
use crate::types::{EntityId, FlowValue, TreeId};
use crate::EngineError;

/// Reserved emit parameter that pins the event's usage key
const USAGE_KEY_PARAM: &str = "usage_key";

/// Record of a nested execution halting with `Stop` during dispatch
struct NestedStop {
    reason: Option<String>,
}

/// The request-scoped interpreter over one scene
pub struct FlowStack {
    scene: SceneDataManager,
    triggers: TriggerRegistry,
    services: Arc<ServiceRegistry>,
    definitions: Arc<dyn DefinitionStore>,
    world: Arc<dyn EntityGraph>,
    messenger: Arc<dyn Messenger>,
    config: EngineConfig,
    depth: usize,
    last_trigger_stop: Option<NestedStop>,
    history: Vec<FlowExecution>,
}

impl FlowStack {
    /// Build a stack for one request with a fresh scene
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        world: Arc<dyn EntityGraph>,
        messenger: Arc<dyn Messenger>,
        services: Arc<ServiceRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            scene: SceneDataManager::new(),
            triggers: TriggerRegistry::new(),
            services,
            definitions,
            world,
            messenger,
            config,
            depth: 0,
            last_trigger_stop: None,
            history: Vec::new(),
        }
    }

    /// The request's scene store
    pub fn scene(&self) -> &SceneDataManager {
        &self.scene
    }

    /// Nested executions finished so far, in completion order
    pub fn history(&self) -> &[FlowExecution] {
        &self.history
    }

    /// Register one trigger binding for this request
    pub fn register_trigger(&mut self, trigger: Trigger) {
        self.triggers.register(trigger);
    }

    /// Load and register every trigger persisted on the given entity
    pub fn register_triggers_for(&mut self, entity: &EntityId) -> Result<usize, EngineError> {
        let triggers = self.definitions.triggers_for_entity(entity)?;
        let count = triggers.len();
        for trigger in triggers {
            self.triggers.register(trigger);
        }
        trace!(entity = %entity, count, "registered entity triggers");
        Ok(count)
    }

    /// Run a command: check its prerequisite events, then run the main tree.
    ///
    /// Each prerequisite becomes a one-step flow that emits the named event
    /// with the supplied variables as data. A prerequisite that stops, or
    /// whose triggers stop, refuses the command with a user-facing message
    /// before the main tree ever starts.
    pub fn run_command(
        &mut self,
        main_tree: &TreeId,
        prerequisites: &[String],
        variables: HashMap<String, FlowValue>,
    ) -> Result<FlowExecution, EngineError> {
        let tree = self
            .definitions
            .step_tree(main_tree)?
            .ok_or_else(|| EngineError::TreeNotFound(main_tree.0.clone()))?;

        for event_type in prerequisites {
            self.last_trigger_stop = None;
            let check = Arc::new(prerequisite_tree(event_type, &variables)?);
            let outcome = self.run_tree(check, ExecutionOrigin::Dispatch, variables.clone())?;

            let nested = self.last_trigger_stop.take();
            if outcome.state == ExecutionState::Stop || nested.is_some() {
                let message = outcome
                    .stop_reason
                    .or_else(|| nested.and_then(|stop| stop.reason))
                    .unwrap_or_else(|| self.config.fallback_stop_message.clone());
                info!(
                    command = %main_tree.0,
                    prerequisite = %event_type,
                    "command refused by prerequisite"
                );
                return Err(EngineError::CommandRefused(message));
            }
        }

        self.run_tree(tree, ExecutionOrigin::Dispatch, variables)
    }

    /// Run one tree to its terminal state.
    ///
    /// `CancelFlow` and `StopEvent` end here: they have no caller left to
    /// unwind, so the stopped execution is returned as a result.
    pub fn run_tree(
        &mut self,
        tree: Arc<StepTree>,
        origin: ExecutionOrigin,
        variables: HashMap<String, FlowValue>,
    ) -> Result<FlowExecution, EngineError> {
        let mut execution = FlowExecution::new(tree, origin, variables);
        match self.run_execution(&mut execution) {
            Ok(()) => Ok(execution),
            Err(EngineError::CancelFlow(_)) | Err(EngineError::StopEvent(_)) => Ok(execution),
            Err(err) => Err(err),
        }
    }

    /// Drive one execution until it completes, stops or fails
    fn run_execution(&mut self, execution: &mut FlowExecution) -> Result<(), EngineError> {
        loop {
            if execution.state != ExecutionState::Running {
                break;
            }
            let Some(ix) = execution.current else {
                break;
            };

            match self.execute_current_step(execution, ix) {
                Ok(opened_branch) => execution.advance(opened_branch),
                Err(EngineError::StopBranch) => execution.skip_branch(),
                Err(EngineError::StopFlow(message)) => {
                    execution.stop(non_empty(message));
                }
                Err(EngineError::CancelFlow(message)) => {
                    execution.stop(non_empty(message.clone()));
                    return Err(EngineError::CancelFlow(message));
                }
                Err(EngineError::StopEvent(message)) => {
                    execution.stop(non_empty(message.clone()));
                    return Err(EngineError::StopEvent(message));
                }
                Err(err) => {
                    error!(
                        tree = %execution.tree.id.0,
                        step = %execution.tree.step(ix).id.0,
                        origin = ?execution.origin,
                        error = %err,
                        "step failed, aborting stack"
                    );
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Perform the action at `ix`; returns whether the step's sub-branch
    /// opens (children execute next)
    fn execute_current_step(
        &mut self,
        execution: &mut FlowExecution,
        ix: StepIndex,
    ) -> Result<bool, EngineError> {
        let step = execution.tree.step(ix).clone();
        trace!(tree = %execution.tree.id.0, step = %step.id.0, "executing step");

        match &step.action {
            StepAction::CallServiceFunction { function } => {
                let parameters =
                    self.resolve_parameters(&execution.variables, &step.parameters)?;
                let service = self.services.get(function)?;
                let mut ctx = ServiceContext {
                    parameters,
                    variables: &mut execution.variables,
                    scene: &mut self.scene,
                    world: self.world.as_ref(),
                    messenger: self.messenger.as_ref(),
                };
                let result = service.call(&mut ctx)?;
                if let Some(name) = &step.variable_name {
                    execution.set_variable(name.clone(), result);
                }
                Ok(true)
            }

            StepAction::EmitEvent { event_type } => {
                let resolved =
                    self.resolve_parameters(&execution.variables, &step.parameters)?;
                self.emit(&execution.origin, event_type, resolved, None)?;
                Ok(true)
            }

            StepAction::EmitEventForEach {
                event_type,
                iterable,
            } => {
                let sequence = {
                    let mut resolver = VariableResolver::new(
                        &execution.variables,
                        &mut self.scene,
                        self.world.as_ref(),
                    );
                    resolver.resolve(iterable)?
                };
                let items = match sequence.to_comparable() {
                    Value::Array(items) => items,
                    other => {
                        return Err(EngineError::ParameterError(format!(
                            "iterable of step {} did not resolve to a sequence: {}",
                            step.id.0, other
                        )))
                    }
                };

                let previous_item = execution.variables.get("item").cloned();
                for (index, item) in items.into_iter().enumerate() {
                    execution
                        .variables
                        .insert("item".to_string(), FlowValue::Data(item));
                    let resolved =
                        self.resolve_parameters(&execution.variables, &step.parameters)?;
                    let name = format!("{}_{}", event_type, index);
                    self.emit(&execution.origin, event_type, resolved, Some(name))?;
                }
                match previous_item {
                    Some(value) => {
                        execution.variables.insert("item".to_string(), value);
                    }
                    None => {
                        execution.variables.remove("item");
                    }
                }
                Ok(true)
            }

            StepAction::EvaluateEquals { left, right } => {
                self.compare(execution, left, right)
            }

            StepAction::EvaluateNotEquals { left, right } => {
                Ok(!self.compare(execution, left, right)?)
            }

            StepAction::SetVariable { value } => {
                let name = step.variable_name.clone().ok_or_else(|| {
                    EngineError::ValidationError(format!(
                        "set_variable step {} has no variable_name",
                        step.id.0
                    ))
                })?;
                let resolved = {
                    let mut resolver = VariableResolver::new(
                        &execution.variables,
                        &mut self.scene,
                        self.world.as_ref(),
                    );
                    resolver.resolve(value)?
                };
                execution.set_variable(name, resolved);
                Ok(true)
            }

            StepAction::StopFlow { message } => {
                Err(EngineError::StopFlow(message.clone().unwrap_or_default()))
            }
        }
    }

    /// Resolve both operands and compare their collapsed forms
    fn compare(
        &mut self,
        execution: &FlowExecution,
        left: &Value,
        right: &Value,
    ) -> Result<bool, EngineError> {
        let mut resolver = VariableResolver::new(
            &execution.variables,
            &mut self.scene,
            self.world.as_ref(),
        );
        let left = resolver.resolve(left)?;
        let right = resolver.resolve(right)?;
        Ok(left.to_comparable() == right.to_comparable())
    }

    fn resolve_parameters(
        &mut self,
        variables: &HashMap<String, FlowValue>,
        parameters: &IndexMap<String, Value>,
    ) -> Result<IndexMap<String, FlowValue>, EngineError> {
        let mut resolver =
            VariableResolver::new(variables, &mut self.scene, self.world.as_ref());
        let mut resolved = IndexMap::with_capacity(parameters.len());
        for (key, raw) in parameters {
            resolved.insert(key.clone(), resolver.resolve(raw)?);
        }
        Ok(resolved)
    }

    /// Build, store and fully dispatch one event before returning
    fn emit(
        &mut self,
        origin: &ExecutionOrigin,
        event_type: &str,
        mut resolved: IndexMap<String, FlowValue>,
        name_override: Option<String>,
    ) -> Result<(), EngineError> {
        let usage_key = match resolved.shift_remove(USAGE_KEY_PARAM) {
            Some(value) => match value.to_comparable() {
                Value::String(key) => key,
                other => other.to_string(),
            },
            None => Uuid::new_v4().to_string(),
        };

        let mut data = IndexMap::with_capacity(resolved.len());
        for (key, value) in resolved {
            data.insert(key, value.to_comparable());
        }

        let mut event = FlowEvent::new(event_type, data, origin.clone(), usage_key);
        if let Some(name) = name_override {
            event.name = name;
        }
        let stored = self.scene.store_event(event);
        debug!(event = %stored.name, event_type = %stored.event_type, "event emitted");

        self.dispatch_event(&stored)
    }

    /// Fire every matching trigger for the event, depth-first, under the
    /// nesting guard
    fn dispatch_event(&mut self, event: &FlowEvent) -> Result<(), EngineError> {
        if self.depth >= self.config.max_trigger_depth {
            return Err(EngineError::TriggerDepthExceeded(self.depth));
        }
        self.depth += 1;
        let result = self.dispatch_matches(event);
        self.depth -= 1;
        result
    }

    fn dispatch_matches(&mut self, event: &FlowEvent) -> Result<(), EngineError> {
        let matches: Vec<Trigger> = self
            .triggers
            .find_matches(event)
            .into_iter()
            .cloned()
            .collect();

        for trigger in matches {
            let limit = trigger.usage_limit();
            let fired = self.scene.fire_count(&trigger.id, &event.usage_key);
            if !limit.allows(fired) {
                debug!(
                    trigger = %trigger.id.0,
                    usage_key = %event.usage_key,
                    fired,
                    "usage limit reached, skipping trigger"
                );
                continue;
            }
            self.scene.record_fire(&trigger.id, &event.usage_key);

            let mut variables = HashMap::new();
            variables.insert("event".to_string(), FlowValue::Event(event.clone()));
            variables.insert(
                "self".to_string(),
                FlowValue::Entity(trigger.bound_entity_id.clone()),
            );
            let mut execution = FlowExecution::new(
                trigger.definition.target_tree.clone(),
                ExecutionOrigin::Trigger(trigger.id.clone()),
                variables,
            );
            debug!(
                trigger = %trigger.id.0,
                event = %event.name,
                tree = %execution.tree.id.0,
                "trigger fired"
            );

            match self.run_execution(&mut execution) {
                Ok(()) => {
                    if execution.state == ExecutionState::Stop
                        && self.last_trigger_stop.is_none()
                    {
                        self.last_trigger_stop = Some(NestedStop {
                            reason: execution.stop_reason.clone(),
                        });
                    }
                    self.history.push(execution);
                }
                Err(EngineError::StopEvent(message)) => {
                    if self.last_trigger_stop.is_none() {
                        self.last_trigger_stop = Some(NestedStop {
                            reason: non_empty(message),
                        });
                    }
                    self.history.push(execution);
                    // Remaining triggers for this event are abandoned
                    break;
                }
                Err(err) => {
                    self.history.push(execution);
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

/// A one-step tree that emits the prerequisite event with the dispatcher's
/// variables as data
fn prerequisite_tree(
    event_type: &str,
    variables: &HashMap<String, FlowValue>,
) -> Result<StepTree, EngineError> {
    let mut step = StepDefinition::new(
        format!("emit_{}", event_type),
        None,
        StepAction::EmitEvent {
            event_type: event_type.to_string(),
        },
    );
    // HashMap iteration order is unstable; keep the emitted data deterministic
    let mut keys: Vec<&String> = variables.keys().collect();
    keys.sort();
    for key in keys {
        step = step.with_parameter(key.clone(), Value::String(format!("@{}", key)));
    }
    StepTree::new(TreeId(format!("prerequisite_{}", event_type)), vec![step])
}

fn non_empty(message: String) -> Option<String> {
    if message.is_empty() {
        None
    } else {
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::world::WorldEntity;
    use serde_json::json;

    struct EmptyWorld;

    impl EntityGraph for EmptyWorld {
        fn resolve(&self, _id: &EntityId) -> Option<Arc<dyn WorldEntity>> {
            None
        }
    }

    struct NullMessenger;

    impl Messenger for NullMessenger {
        fn deliver(&self, _target: &EntityId, _text: &str) -> Result<(), EngineError> {
            Ok(())
        }
    }

    struct LocalStore {
        trees: HashMap<TreeId, Arc<StepTree>>,
    }

    impl DefinitionStore for LocalStore {
        fn step_tree(&self, id: &TreeId) -> Result<Option<Arc<StepTree>>, EngineError> {
            Ok(self.trees.get(id).cloned())
        }

        fn trigger(&self, _id: &crate::types::TriggerId) -> Result<Option<Trigger>, EngineError> {
            Ok(None)
        }

        fn triggers_for_entity(&self, _entity: &EntityId) -> Result<Vec<Trigger>, EngineError> {
            Ok(vec![])
        }
    }

    fn stack_with(trees: Vec<Arc<StepTree>>) -> FlowStack {
        let mut map = HashMap::new();
        for tree in trees {
            map.insert(tree.id.clone(), tree);
        }
        FlowStack::new(
            Arc::new(LocalStore { trees: map }),
            Arc::new(EmptyWorld),
            Arc::new(NullMessenger),
            Arc::new(ServiceRegistry::new()),
            EngineConfig::default(),
        )
    }

    fn set(id: &str, parent: Option<&str>, variable: &str, value: Value) -> StepDefinition {
        StepDefinition::new(id, parent, StepAction::SetVariable { value })
            .with_variable(variable)
    }

    #[test]
    fn test_conditional_opens_and_skips_branches() {
        // root sets x=1; "then" branch runs only when x == 1, "else" branch
        // only when x == 2
        let tree = Arc::new(
            StepTree::new(
                TreeId("conditional".to_string()),
                vec![
                    set("root", None, "x", json!(1)),
                    StepDefinition::new(
                        "if_one",
                        Some("root"),
                        StepAction::EvaluateEquals {
                            left: json!("@x"),
                            right: json!(1),
                        },
                    ),
                    set("then", Some("if_one"), "took_then", json!(true)),
                    StepDefinition::new(
                        "if_two",
                        Some("root"),
                        StepAction::EvaluateEquals {
                            left: json!("@x"),
                            right: json!(2),
                        },
                    ),
                    set("else", Some("if_two"), "took_else", json!(true)),
                ],
            )
            .unwrap(),
        );

        let mut stack = stack_with(vec![]);
        let outcome = stack
            .run_tree(tree, ExecutionOrigin::Dispatch, HashMap::new())
            .unwrap();

        assert_eq!(outcome.state, ExecutionState::Complete);
        assert_eq!(
            outcome.variables.get("took_then"),
            Some(&FlowValue::Data(json!(true)))
        );
        assert!(!outcome.variables.contains_key("took_else"));
    }

    #[test]
    fn test_stop_flow_action_halts_with_reason() {
        let tree = Arc::new(
            StepTree::new(
                TreeId("stopping".to_string()),
                vec![
                    StepDefinition::new(
                        "root",
                        None,
                        StepAction::StopFlow {
                            message: Some("No further.".to_string()),
                        },
                    ),
                    set("after", Some("root"), "never", json!(true)),
                ],
            )
            .unwrap(),
        );

        let mut stack = stack_with(vec![]);
        let outcome = stack
            .run_tree(tree, ExecutionOrigin::Dispatch, HashMap::new())
            .unwrap();

        assert_eq!(outcome.state, ExecutionState::Stop);
        assert_eq!(outcome.stop_reason.as_deref(), Some("No further."));
        assert!(!outcome.variables.contains_key("never"));
    }

    #[test]
    fn test_unknown_service_function_aborts() {
        let tree = Arc::new(
            StepTree::new(
                TreeId("bad_call".to_string()),
                vec![StepDefinition::new(
                    "root",
                    None,
                    StepAction::CallServiceFunction {
                        function: "teleport".to_string(),
                    },
                )],
            )
            .unwrap(),
        );

        let mut stack = stack_with(vec![]);
        let result = stack.run_tree(tree, ExecutionOrigin::Dispatch, HashMap::new());
        match result {
            Err(EngineError::ServiceFunctionNotFound(name)) => assert_eq!(name, "teleport"),
            other => panic!("Expected ServiceFunctionNotFound, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_run_command_unknown_tree() {
        let mut stack = stack_with(vec![]);
        let result = stack.run_command(&TreeId("missing".to_string()), &[], HashMap::new());
        match result {
            Err(EngineError::TreeNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("Expected TreeNotFound, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_emit_event_is_stored_with_collapsed_data() {
        let tree = Arc::new(
            StepTree::new(
                TreeId("emitting".to_string()),
                vec![StepDefinition::new(
                    "root",
                    None,
                    StepAction::EmitEvent {
                        event_type: "glance".to_string(),
                    },
                )
                .with_parameter("caller", json!("@who"))],
            )
            .unwrap(),
        );

        let mut stack = stack_with(vec![]);
        let mut variables = HashMap::new();
        variables.insert(
            "who".to_string(),
            FlowValue::Entity(EntityId("alice".to_string())),
        );
        stack
            .run_tree(tree, ExecutionOrigin::Dispatch, variables)
            .unwrap();

        let event = stack.scene().event("glance").unwrap();
        // Entity values collapse to pk strings in event data
        assert_eq!(event.data.get("caller"), Some(&json!("alice")));
        assert!(!event.usage_key.is_empty());
    }

    #[test]
    fn test_pinned_usage_key_is_not_event_data() {
        let tree = Arc::new(
            StepTree::new(
                TreeId("pinned".to_string()),
                vec![StepDefinition::new(
                    "root",
                    None,
                    StepAction::EmitEvent {
                        event_type: "glance".to_string(),
                    },
                )
                .with_parameter("usage_key", json!("door-7"))
                .with_parameter("target", json!("bob"))],
            )
            .unwrap(),
        );

        let mut stack = stack_with(vec![]);
        stack
            .run_tree(tree, ExecutionOrigin::Dispatch, HashMap::new())
            .unwrap();

        let event = stack.scene().event("glance").unwrap();
        assert_eq!(event.usage_key, "door-7");
        assert!(!event.data.contains_key("usage_key"));
        assert_eq!(event.data.get("target"), Some(&json!("bob")));
    }
}
