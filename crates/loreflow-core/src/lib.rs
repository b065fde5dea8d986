//!
//! Loreflow Core - reactive rule engine for persistent game worlds
//!
//! This crate defines the flow interpreter, the trigger layer and the
//! boundary traits toward a host world. Designers author step trees and
//! bind triggers to entities; the engine runs them synchronously, one
//! external request at a time, against whatever world the host exposes
//! through the [`domain::world`] traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - trees, executions, events, triggers, scene state
pub mod domain;

/// Application services - the interpreter and the service-function registry
pub mod application;

/// Core types and traits
pub mod types;

/// Error types
pub mod error;

/// Engine configuration
pub mod config;

// Re-export key types
pub use config::EngineConfig;
pub use error::EngineError;
pub use types::{EntityId, FlowValue, KeyResolver, StepId, TreeId, TriggerId};

// Application interfaces
pub use application::flow_stack::FlowStack;
pub use application::service_registry::{ServiceContext, ServiceFunction, ServiceRegistry};

// Re-export main API types for easy use
pub use domain::entity_state::{initialize_state_for_object, EntityState, StateFactory};
pub use domain::events::FlowEvent;
pub use domain::execution::{ExecutionOrigin, ExecutionState, FlowExecution};
pub use domain::scene::SceneDataManager;
pub use domain::step_tree::{StepAction, StepDefinition, StepIndex, StepTree};
pub use domain::triggers::{Trigger, TriggerDefinition, TriggerRegistry, UsageLimit};
pub use domain::world::{DefinitionStore, EntityGraph, EntityKind, Messenger, WorldEntity};
