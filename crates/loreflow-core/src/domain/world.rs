//! Boundary traits toward the engine's external collaborators
//!
//! The engine is a library, not a service: the live game-object graph, the
//! definition store and the session layer are consumed only through the
//! narrow contracts defined here. Host applications (and the test utilities)
//! implement these traits.

use serde_json::Value;
use std::sync::Arc;

use crate::domain::step_tree::StepTree;
use crate::domain::triggers::Trigger;
use crate::types::{EntityId, TreeId, TriggerId};
use crate::EngineError;

/// Coarse classification of a live entity, used to pick its
/// [`EntityState`](crate::domain::entity_state::EntityState) subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A player or non-player character
    Character,

    /// A traversable connection between rooms
    Portal,

    /// A location that can contain other entities
    Room,

    /// Any other in-world object
    Object,
}

/// A live entity in the external game-object graph
pub trait WorldEntity: Send + Sync {
    /// Primary key of the entity
    fn pk(&self) -> EntityId;

    /// Coarse kind, used for state selection
    fn kind(&self) -> EntityKind;

    /// Human-readable name
    fn display_name(&self) -> String;

    /// The entity containing this one, if any
    fn location(&self) -> Option<EntityId>;

    /// Identities of the entities contained in this one
    fn contents(&self) -> Vec<EntityId>;

    /// Read a persisted attribute
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Write a persisted attribute
    fn set_attribute(&self, name: &str, value: Value) -> Result<(), EngineError>;

    /// Relocate the entity into a new container
    fn set_location(&self, destination: &EntityId) -> Result<(), EngineError>;
}

/// Read access to the live game-object graph
pub trait EntityGraph: Send + Sync {
    /// Resolve an identity to its live entity, or `None` if it does not
    /// exist in the world
    fn resolve(&self, id: &EntityId) -> Option<Arc<dyn WorldEntity>>;
}

/// Read-only access to persisted flow and trigger definitions
pub trait DefinitionStore: Send + Sync {
    /// Fetch a step tree by name
    fn step_tree(&self, id: &TreeId) -> Result<Option<Arc<StepTree>>, EngineError>;

    /// Fetch one trigger record by id
    fn trigger(&self, id: &TriggerId) -> Result<Option<Trigger>, EngineError>;

    /// All triggers registered on the given entity
    fn triggers_for_entity(&self, entity: &EntityId) -> Result<Vec<Trigger>, EngineError>;
}

/// Delivery of rendered text to an entity's sessions.
///
/// The engine never addresses sessions directly; the host decides what a
/// delivery means for entities without one.
pub trait Messenger: Send + Sync {
    /// Deliver a rendered message to the given entity
    fn deliver(&self, target: &EntityId, text: &str) -> Result<(), EngineError>;
}
