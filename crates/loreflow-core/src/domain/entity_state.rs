//! Per-request, polymorphic wrappers over live game entities
//!
//! An [`EntityState`] is created the first time a flow references an entity
//! and cached in the scene for the rest of the request. It exposes the
//! capability surface steps and service functions consult (`can_move`,
//! `can_traverse`, display names) and the attribute lookups the variable
//! resolver traverses. States are never persisted.

use serde_json::Value;
use std::sync::Arc;

use crate::domain::world::{EntityKind, WorldEntity};
use crate::types::{EntityId, FlowValue, KeyResolver};

/// Capability surface over one live entity for the current request
pub trait EntityState: KeyResolver + Send + Sync {
    /// Primary key of the wrapped entity
    fn pk(&self) -> EntityId;

    /// Human-readable name
    fn display_name(&self) -> String;

    /// Whether flows may relocate this entity
    fn can_move(&self) -> bool {
        false
    }

    /// Whether this entity can be traversed (portals, exits)
    fn can_traverse(&self) -> bool {
        false
    }
}

/// Select and build the state subtype for an entity, by its kind.
///
/// This is the `initialize_state_for_object` seam: the scene calls it on
/// first reference and caches the result.
pub fn initialize_state_for_object(entity: Arc<dyn WorldEntity>) -> Box<dyn EntityState> {
    match entity.kind() {
        EntityKind::Character => Box::new(CharacterState { entity }),
        EntityKind::Portal => Box::new(PortalState { entity }),
        EntityKind::Room | EntityKind::Object => Box::new(ObjectState { entity }),
    }
}

/// Factory signature for hosts that add their own state subtypes
pub type StateFactory = Box<dyn Fn(Arc<dyn WorldEntity>) -> Box<dyn EntityState> + Send + Sync>;

// Key lookups shared by every state subtype: fixed fields first, then the
// entity's persisted attributes.
fn resolve_entity_key(state: &dyn EntityState, entity: &dyn WorldEntity, key: &str) -> Option<FlowValue> {
    match key {
        "pk" => Some(FlowValue::Data(Value::String(state.pk().0))),
        "name" | "display_name" => Some(FlowValue::Data(Value::String(state.display_name()))),
        "location" => Some(match entity.location() {
            Some(id) => FlowValue::Entity(id),
            None => FlowValue::null(),
        }),
        "contents" => {
            let pks: Vec<Value> = entity
                .contents()
                .into_iter()
                .map(|id| Value::String(id.0))
                .collect();
            Some(FlowValue::Data(Value::Array(pks)))
        }
        "can_move" => Some(FlowValue::Data(Value::Bool(state.can_move()))),
        "can_traverse" => Some(FlowValue::Data(Value::Bool(state.can_traverse()))),
        _ => entity.attribute(key).map(FlowValue::Data),
    }
}

/// Base state for rooms and plain objects
pub struct ObjectState {
    entity: Arc<dyn WorldEntity>,
}

impl EntityState for ObjectState {
    fn pk(&self) -> EntityId {
        self.entity.pk()
    }

    fn display_name(&self) -> String {
        self.entity.display_name()
    }
}

impl KeyResolver for ObjectState {
    fn resolve_key(&self, key: &str) -> Option<FlowValue> {
        resolve_entity_key(self, self.entity.as_ref(), key)
    }
}

/// State for characters: movable
pub struct CharacterState {
    entity: Arc<dyn WorldEntity>,
}

impl EntityState for CharacterState {
    fn pk(&self) -> EntityId {
        self.entity.pk()
    }

    fn display_name(&self) -> String {
        self.entity.display_name()
    }

    fn can_move(&self) -> bool {
        true
    }
}

impl KeyResolver for CharacterState {
    fn resolve_key(&self, key: &str) -> Option<FlowValue> {
        resolve_entity_key(self, self.entity.as_ref(), key)
    }
}

/// State for portals and exits: traversable
pub struct PortalState {
    entity: Arc<dyn WorldEntity>,
}

impl EntityState for PortalState {
    fn pk(&self) -> EntityId {
        self.entity.pk()
    }

    fn display_name(&self) -> String {
        self.entity.display_name()
    }

    fn can_traverse(&self) -> bool {
        true
    }
}

impl KeyResolver for PortalState {
    fn resolve_key(&self, key: &str) -> Option<FlowValue> {
        resolve_entity_key(self, self.entity.as_ref(), key)
    }
}
