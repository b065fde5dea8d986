//! In-memory definition store for Loreflow
//!
//! This crate provides an in-memory implementation of the
//! [`DefinitionStore`] interface defined in loreflow-core. It is primarily
//! useful for development, testing, and worlds small enough to load their
//! designer content up front.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use loreflow_core::domain::step_tree::StepTree;
use loreflow_core::domain::triggers::Trigger;
use loreflow_core::{DefinitionStore, EngineError, EntityId, TreeId, TriggerId};

/// Definition store backed by in-process hash maps
pub struct InMemoryDefinitionStore {
    trees: RwLock<HashMap<TreeId, Arc<StepTree>>>,
    triggers: RwLock<HashMap<TriggerId, Trigger>>,
    // Registration order per entity is preserved for dispatch tie-breaking
    by_entity: RwLock<HashMap<EntityId, Vec<TriggerId>>>,
}

impl InMemoryDefinitionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            trees: RwLock::new(HashMap::new()),
            triggers: RwLock::new(HashMap::new()),
            by_entity: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a step tree, returning the shared handle the store serves
    pub fn insert_tree(&self, tree: StepTree) -> Result<Arc<StepTree>, EngineError> {
        let tree = Arc::new(tree);
        let mut trees = self.trees.write().map_err(poisoned)?;
        debug!(tree = %tree.id.0, "storing step tree");
        trees.insert(tree.id.clone(), tree.clone());
        Ok(tree)
    }

    /// Insert a trigger binding, indexed under its bound entity
    pub fn insert_trigger(&self, trigger: Trigger) -> Result<(), EngineError> {
        let mut triggers = self.triggers.write().map_err(poisoned)?;
        let mut by_entity = self.by_entity.write().map_err(poisoned)?;
        debug!(trigger = %trigger.id.0, entity = %trigger.bound_entity_id, "storing trigger");
        by_entity
            .entry(trigger.bound_entity_id.clone())
            .or_default()
            .push(trigger.id.clone());
        triggers.insert(trigger.id.clone(), trigger);
        Ok(())
    }
}

impl Default for InMemoryDefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionStore for InMemoryDefinitionStore {
    fn step_tree(&self, id: &TreeId) -> Result<Option<Arc<StepTree>>, EngineError> {
        let trees = self.trees.read().map_err(poisoned)?;
        Ok(trees.get(id).cloned())
    }

    fn trigger(&self, id: &TriggerId) -> Result<Option<Trigger>, EngineError> {
        let triggers = self.triggers.read().map_err(poisoned)?;
        Ok(triggers.get(id).cloned())
    }

    fn triggers_for_entity(&self, entity: &EntityId) -> Result<Vec<Trigger>, EngineError> {
        let triggers = self.triggers.read().map_err(poisoned)?;
        let by_entity = self.by_entity.read().map_err(poisoned)?;
        Ok(by_entity
            .get(entity)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| triggers.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> EngineError {
    EngineError::Other("definition store lock poisoned".to_string())
}
