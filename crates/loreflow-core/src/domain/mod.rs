/// Step trees and step actions
pub mod step_tree;

/// Flow executions and their lifecycle
pub mod execution;

/// Emitted events
pub mod events;

/// Trigger templates, bindings and matching
pub mod triggers;

/// Per-request entity state wrappers
pub mod entity_state;

/// The per-request scene store
pub mod scene;

/// Sigil-path variable resolution
pub mod variables;

/// Boundary traits toward the host world
pub mod world;
