//! Sigil-path resolution over an execution's variables
//!
//! Step parameters and filter values are raw JSON. Strings beginning with
//! `@` or `$` are references: the remainder is split on `.`, the first
//! segment names a flow variable, and each further segment resolves through
//! the [`KeyResolver`] seam of whatever value the previous segment produced.
//! Everything else passes through as a literal.

use serde_json::Value;
use std::collections::HashMap;

use crate::domain::scene::SceneDataManager;
use crate::domain::world::EntityGraph;
use crate::types::{FlowValue, KeyResolver};
use crate::EngineError;

/// Resolves raw parameter values against one execution's variables.
///
/// Holds the scene mutably because resolving a path through an entity
/// reference may initialize that entity's state on first touch.
pub struct VariableResolver<'a> {
    variables: &'a HashMap<String, FlowValue>,
    scene: &'a mut SceneDataManager,
    world: &'a dyn EntityGraph,
}

impl<'a> VariableResolver<'a> {
    /// Bind a resolver to one execution's variables and the request scene
    pub fn new(
        variables: &'a HashMap<String, FlowValue>,
        scene: &'a mut SceneDataManager,
        world: &'a dyn EntityGraph,
    ) -> Self {
        Self {
            variables,
            scene,
            world,
        }
    }

    /// Resolve one raw parameter value: sigil strings become path lookups,
    /// everything else is a literal.
    pub fn resolve(&mut self, raw: &Value) -> Result<FlowValue, EngineError> {
        match raw {
            Value::String(s) if s.starts_with('@') || s.starts_with('$') => {
                self.resolve_path(&s[1..], s)
            }
            other => Ok(FlowValue::Data(other.clone())),
        }
    }

    /// Resolve a dotted path (sigil already stripped). `display` is the
    /// original reference, kept for error messages.
    fn resolve_path(&mut self, path: &str, display: &str) -> Result<FlowValue, EngineError> {
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();

        let mut current = self
            .variables
            .get(head)
            .cloned()
            .ok_or_else(|| EngineError::UndefinedVariable(head.to_string()))?;

        for segment in segments {
            // Null propagates: a missing link resolves the whole path to null
            if current.is_null() {
                return Ok(FlowValue::null());
            }
            current = self
                .resolve_segment(&current, segment)?
                .ok_or_else(|| EngineError::UndefinedAttribute(display.to_string()))?;
        }
        Ok(current)
    }

    /// One path segment against one value, through its key-resolution seam
    fn resolve_segment(
        &mut self,
        value: &FlowValue,
        key: &str,
    ) -> Result<Option<FlowValue>, EngineError> {
        match value {
            FlowValue::Data(Value::Object(map)) => Ok(map.resolve_key(key)),
            FlowValue::Data(_) => Ok(None),
            FlowValue::Entity(id) => {
                let state = self.scene.state_for(id, self.world)?;
                Ok(state.resolve_key(key))
            }
            FlowValue::Event(event) => Ok(event.resolve_key(key)),
        }
    }
}
