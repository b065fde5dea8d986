//! In-process fakes for the engine's boundary traits

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use loreflow_core::{
    EngineError, EntityGraph, EntityId, EntityKind, Messenger, WorldEntity,
};

#[derive(Clone)]
struct EntityRecord {
    kind: EntityKind,
    display_name: String,
    location: Option<EntityId>,
    attributes: HashMap<String, Value>,
}

#[derive(Default)]
struct WorldState {
    entities: HashMap<EntityId, EntityRecord>,
}

/// A fake entity graph holding its whole state in one shared table.
///
/// Entities handed out by [`EntityGraph::resolve`] write through to the same
/// table, so mutations made during a flow are visible to later lookups and
/// to test assertions.
#[derive(Clone, Default)]
pub struct MockWorld {
    state: Arc<Mutex<WorldState>>,
}

impl MockWorld {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity of the given kind
    pub fn add_entity(
        &self,
        id: impl Into<String>,
        kind: EntityKind,
        display_name: impl Into<String>,
    ) -> EntityId {
        let id = EntityId(id.into());
        self.state.lock().entities.insert(
            id.clone(),
            EntityRecord {
                kind,
                display_name: display_name.into(),
                location: None,
                attributes: HashMap::new(),
            },
        );
        id
    }

    /// Add a character
    pub fn add_character(
        &self,
        id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> EntityId {
        self.add_entity(id, EntityKind::Character, display_name)
    }

    /// Add a room
    pub fn add_room(&self, id: impl Into<String>, display_name: impl Into<String>) -> EntityId {
        self.add_entity(id, EntityKind::Room, display_name)
    }

    /// Add a portal
    pub fn add_portal(&self, id: impl Into<String>, display_name: impl Into<String>) -> EntityId {
        self.add_entity(id, EntityKind::Portal, display_name)
    }

    /// Add a plain object
    pub fn add_object(&self, id: impl Into<String>, display_name: impl Into<String>) -> EntityId {
        self.add_entity(id, EntityKind::Object, display_name)
    }

    /// Place an entity inside a container
    pub fn place(&self, entity: &EntityId, container: &EntityId) {
        if let Some(record) = self.state.lock().entities.get_mut(entity) {
            record.location = Some(container.clone());
        }
    }

    /// Set a persisted attribute directly
    pub fn set_attribute(&self, entity: &EntityId, name: impl Into<String>, value: Value) {
        if let Some(record) = self.state.lock().entities.get_mut(entity) {
            record.attributes.insert(name.into(), value);
        }
    }

    /// Current location of an entity, for assertions
    pub fn location_of(&self, entity: &EntityId) -> Option<EntityId> {
        self.state
            .lock()
            .entities
            .get(entity)
            .and_then(|record| record.location.clone())
    }

    /// Current attribute value of an entity, for assertions
    pub fn attribute_of(&self, entity: &EntityId, name: &str) -> Option<Value> {
        self.state
            .lock()
            .entities
            .get(entity)
            .and_then(|record| record.attributes.get(name).cloned())
    }
}

impl EntityGraph for MockWorld {
    fn resolve(&self, id: &EntityId) -> Option<Arc<dyn WorldEntity>> {
        let state = self.state.lock();
        state.entities.get(id)?;
        Some(Arc::new(MockEntity {
            id: id.clone(),
            state: self.state.clone(),
        }))
    }
}

/// A handle into one [`MockWorld`] entity
pub struct MockEntity {
    id: EntityId,
    state: Arc<Mutex<WorldState>>,
}

impl MockEntity {
    fn record<T>(&self, f: impl FnOnce(&EntityRecord) -> T) -> Result<T, EngineError> {
        let state = self.state.lock();
        let record = state
            .entities
            .get(&self.id)
            .ok_or_else(|| EngineError::WorldError(format!("entity vanished: {}", self.id)))?;
        Ok(f(record))
    }
}

impl WorldEntity for MockEntity {
    fn pk(&self) -> EntityId {
        self.id.clone()
    }

    fn kind(&self) -> EntityKind {
        self.record(|r| r.kind).unwrap_or(EntityKind::Object)
    }

    fn display_name(&self) -> String {
        self.record(|r| r.display_name.clone())
            .unwrap_or_else(|_| self.id.0.clone())
    }

    fn location(&self) -> Option<EntityId> {
        self.record(|r| r.location.clone()).ok().flatten()
    }

    fn contents(&self) -> Vec<EntityId> {
        let state = self.state.lock();
        let mut contents: Vec<EntityId> = state
            .entities
            .iter()
            .filter(|(_, record)| record.location.as_ref() == Some(&self.id))
            .map(|(id, _)| id.clone())
            .collect();
        // Deterministic order for assertions
        contents.sort_by(|a, b| a.0.cmp(&b.0));
        contents
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.record(|r| r.attributes.get(name).cloned())
            .ok()
            .flatten()
    }

    fn set_attribute(&self, name: &str, value: Value) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let record = state
            .entities
            .get_mut(&self.id)
            .ok_or_else(|| EngineError::WorldError(format!("entity vanished: {}", self.id)))?;
        record.attributes.insert(name.to_string(), value);
        Ok(())
    }

    fn set_location(&self, destination: &EntityId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if !state.entities.contains_key(destination) {
            return Err(EngineError::WorldError(format!(
                "unknown destination: {}",
                destination
            )));
        }
        let record = state
            .entities
            .get_mut(&self.id)
            .ok_or_else(|| EngineError::WorldError(format!("entity vanished: {}", self.id)))?;
        record.location = Some(destination.clone());
        Ok(())
    }
}

/// A messenger that records every delivery for assertions
#[derive(Clone, Default)]
pub struct RecordingMessenger {
    deliveries: Arc<Mutex<Vec<(EntityId, String)>>>,
}

impl RecordingMessenger {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery so far, in order
    pub fn deliveries(&self) -> Vec<(EntityId, String)> {
        self.deliveries.lock().clone()
    }

    /// Messages delivered to one entity, in order
    pub fn messages_for(&self, target: &EntityId) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .filter(|(to, _)| to == target)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Messenger for RecordingMessenger {
    fn deliver(&self, target: &EntityId, text: &str) -> Result<(), EngineError> {
        self.deliveries
            .lock()
            .push((target.clone(), text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_world_mutations_are_visible_across_handles() {
        let world = MockWorld::new();
        let hall = world.add_room("hall", "The Hall");
        let alice = world.add_character("alice", "Alice");
        world.place(&alice, &hall);

        let handle = world.resolve(&alice).unwrap();
        handle.set_attribute("strength", json!(14)).unwrap();

        let other_handle = world.resolve(&alice).unwrap();
        assert_eq!(other_handle.attribute("strength"), Some(json!(14)));
        assert_eq!(other_handle.location(), Some(hall.clone()));

        let room = world.resolve(&hall).unwrap();
        assert_eq!(room.contents(), vec![alice]);
    }

    #[test]
    fn test_set_location_rejects_unknown_destination() {
        let world = MockWorld::new();
        let alice = world.add_character("alice", "Alice");
        let handle = world.resolve(&alice).unwrap();

        let result = handle.set_location(&EntityId("nowhere".to_string()));
        assert!(matches!(result, Err(EngineError::WorldError(_))));
    }

    #[test]
    fn test_recording_messenger() {
        let messenger = RecordingMessenger::new();
        let alice = EntityId("alice".to_string());
        let bob = EntityId("bob".to_string());

        messenger.deliver(&alice, "hello").unwrap();
        messenger.deliver(&bob, "hi").unwrap();
        messenger.deliver(&alice, "again").unwrap();

        assert_eq!(messenger.deliveries().len(), 3);
        assert_eq!(messenger.messages_for(&alice), vec!["hello", "again"]);
    }
}
