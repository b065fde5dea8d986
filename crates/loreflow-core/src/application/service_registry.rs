//! Named side-effecting functions callable from `call_service_function` steps
//!
//! Functions are registered explicitly on a [`ServiceRegistry`] that the host
//! passes into the engine. The interpreter resolves the step's parameters
//! first, so a function only ever sees concrete [`FlowValue`]s.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::scene::SceneDataManager;
use crate::domain::world::{EntityGraph, Messenger};
use crate::types::{EntityId, FlowValue};
use crate::EngineError;

/// Everything a service function may touch during one invocation
pub struct ServiceContext<'a> {
    /// Resolved keyword parameters from the calling step, in authored order
    pub parameters: IndexMap<String, FlowValue>,

    /// The calling execution's variable mapping
    pub variables: &'a mut HashMap<String, FlowValue>,

    /// The request's scene store
    pub scene: &'a mut SceneDataManager,

    /// The live game-object graph
    pub world: &'a dyn EntityGraph,

    /// Session delivery
    pub messenger: &'a dyn Messenger,
}

impl ServiceContext<'_> {
    /// A required parameter, failing with `ParameterError` when absent
    pub fn param(&self, name: &str) -> Result<&FlowValue, EngineError> {
        self.parameters
            .get(name)
            .ok_or_else(|| EngineError::ParameterError(format!("missing parameter: {}", name)))
    }

    /// A required parameter interpreted as an entity identity
    pub fn entity_param(&self, name: &str) -> Result<EntityId, EngineError> {
        self.param(name)?.as_entity_id().ok_or_else(|| {
            EngineError::ParameterError(format!("parameter {} is not an entity", name))
        })
    }

    /// A required string parameter
    pub fn string_param(&self, name: &str) -> Result<String, EngineError> {
        match self.param(name)? {
            FlowValue::Data(serde_json::Value::String(s)) => Ok(s.clone()),
            other => Err(EngineError::ParameterError(format!(
                "parameter {} is not a string: {:?}",
                name, other
            ))),
        }
    }
}

/// A named, host- or stdlib-provided function callable from steps
pub trait ServiceFunction: Send + Sync {
    /// Run the function with resolved parameters; the returned value is
    /// bound under the step's `variable_name` when one is set.
    fn call(&self, ctx: &mut ServiceContext<'_>) -> Result<FlowValue, EngineError>;
}

/// Explicit name-to-function registry passed into the engine
#[derive(Default)]
pub struct ServiceRegistry {
    functions: HashMap<String, Arc<dyn ServiceFunction>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous one under the same name
    pub fn register(&mut self, name: impl Into<String>, function: Arc<dyn ServiceFunction>) {
        self.functions.insert(name.into(), function);
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn ServiceFunction>, EngineError> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::ServiceFunctionNotFound(name.to_string()))
    }

    /// Whether a function is registered under the name
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}
