//! The per-request ephemeral state container
//!
//! One [`SceneDataManager`] is created per external request (a player
//! command, a scheduled tick) and shared by every flow execution spawned
//! within that request's stack. It caches entity states, indexes emitted
//! events under deduplicated names, and keeps trigger fire counts for
//! usage-limit gating. It is intentionally not thread-safe: the engine is
//! single-threaded by contract.

use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::entity_state::{initialize_state_for_object, EntityState, StateFactory};
use crate::domain::events::FlowEvent;
use crate::domain::world::EntityGraph;
use crate::types::{EntityId, TriggerId};
use crate::EngineError;

/// Request-scoped store for entity states, emitted events and trigger fire
/// counts
pub struct SceneDataManager {
    states: HashMap<EntityId, Box<dyn EntityState>>,
    events: IndexMap<String, FlowEvent>,
    fire_counts: HashMap<(TriggerId, String), u32>,
    state_factory: StateFactory,
}

impl SceneDataManager {
    /// Create an empty scene with the default state factory
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            events: IndexMap::new(),
            fire_counts: HashMap::new(),
            state_factory: Box::new(initialize_state_for_object),
        }
    }

    /// Create an empty scene with a host-supplied state factory
    pub fn with_state_factory(state_factory: StateFactory) -> Self {
        Self {
            states: HashMap::new(),
            events: IndexMap::new(),
            fire_counts: HashMap::new(),
            state_factory,
        }
    }

    /// The cached state for an entity, created on first reference.
    ///
    /// Fails with `WorldError` when the identity does not resolve in the
    /// entity graph.
    pub fn state_for(
        &mut self,
        id: &EntityId,
        world: &dyn EntityGraph,
    ) -> Result<&dyn EntityState, EngineError> {
        if !self.states.contains_key(id) {
            let entity = world.resolve(id).ok_or_else(|| {
                EngineError::WorldError(format!("Unknown entity: {}", id))
            })?;
            debug!(entity = %id, "initializing entity state");
            self.states.insert(id.clone(), (self.state_factory)(entity));
        }
        Ok(self.states.get(id).expect("state inserted above").as_ref())
    }

    /// Whether a state has already been initialized for the entity
    pub fn has_state(&self, id: &EntityId) -> bool {
        self.states.contains_key(id)
    }

    /// Store an event under a deduplicated name and return the stored
    /// snapshot.
    ///
    /// The first `glance` keeps its name; later collisions become
    /// `glance_0`, `glance_1`, ...
    pub fn store_event(&mut self, mut event: FlowEvent) -> FlowEvent {
        let name = if self.events.contains_key(&event.name) {
            let mut n = 0usize;
            loop {
                let candidate = format!("{}_{}", event.name, n);
                if !self.events.contains_key(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            event.name.clone()
        };
        event.name = name;
        let stored = event.clone();
        self.events.insert(stored.name.clone(), event);
        stored
    }

    /// Look up a stored event by name
    pub fn event(&self, name: &str) -> Option<&FlowEvent> {
        self.events.get(name)
    }

    /// All stored events, in emission order
    pub fn events(&self) -> impl Iterator<Item = &FlowEvent> {
        self.events.values()
    }

    /// Current fire count for a trigger against one usage key
    pub fn fire_count(&self, trigger: &TriggerId, usage_key: &str) -> u32 {
        self.fire_counts
            .get(&(trigger.clone(), usage_key.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Record one firing of a trigger against one usage key
    pub fn record_fire(&mut self, trigger: &TriggerId, usage_key: &str) {
        *self
            .fire_counts
            .entry((trigger.clone(), usage_key.to_string()))
            .or_insert(0) += 1;
    }
}

impl Default for SceneDataManager {
    fn default() -> Self {
        Self::new()
    }
}
