use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::events::FlowEvent;

/// Value object: identity of a live game entity (its primary key in the
/// external entity graph)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value object: identity of a stored step tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeId(pub String);

/// Value object: identity of a step within a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

/// Value object: identity of a registered trigger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub String);

/// A runtime value held in a flow execution's variable mapping.
///
/// Step parameters and event data are plain JSON, but variables can also
/// hold references to live entities and stored events; path resolution
/// treats each kind through the [`KeyResolver`] seam.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowValue {
    /// A literal JSON value (object keys resolve as mapping lookups)
    Data(Value),

    /// A reference to a live entity; path segments resolve through its
    /// per-request [`EntityState`](crate::domain::entity_state::EntityState)
    Entity(EntityId),

    /// A snapshot of an emitted event, as bound into trigger executions
    Event(FlowEvent),
}

impl FlowValue {
    /// Null literal
    pub fn null() -> Self {
        FlowValue::Data(Value::Null)
    }

    /// Whether this value is the null literal
    pub fn is_null(&self) -> bool {
        matches!(self, FlowValue::Data(Value::Null))
    }

    /// Collapse to a plain JSON value for comparisons and event data:
    /// entities become their pk string, events their storage name.
    pub fn to_comparable(&self) -> Value {
        match self {
            FlowValue::Data(v) => v.clone(),
            FlowValue::Entity(id) => Value::String(id.0.clone()),
            FlowValue::Event(event) => Value::String(event.name.clone()),
        }
    }

    /// Interpret this value as an entity identity, accepting both entity
    /// references and bare pk strings (event data stores entities as pks).
    pub fn as_entity_id(&self) -> Option<EntityId> {
        match self {
            FlowValue::Entity(id) => Some(id.clone()),
            FlowValue::Data(Value::String(s)) => Some(EntityId(s.clone())),
            _ => None,
        }
    }
}

impl From<Value> for FlowValue {
    fn from(value: Value) -> Self {
        FlowValue::Data(value)
    }
}

/// Uniform key lookup over the value kinds a dotted path can traverse.
///
/// Implemented by JSON objects (mapping keys), entity states
/// (attribute/capability lookups) and events, so the variable resolver
/// never inspects concrete types.
pub trait KeyResolver {
    /// Resolve one path segment, or `None` when the key does not exist
    fn resolve_key(&self, key: &str) -> Option<FlowValue>;
}

impl KeyResolver for serde_json::Map<String, Value> {
    fn resolve_key(&self, key: &str) -> Option<FlowValue> {
        self.get(key).cloned().map(FlowValue::Data)
    }
}
