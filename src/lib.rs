//!
//! Loreflow - reactive rule engine for persistent game worlds
//!
//! Facade crate tying the engine together for embedders: the core
//! interpreter and trigger layer, the standard service functions, and the
//! in-memory definition store. Hosts that need persistence or custom
//! service functions depend on `loreflow-core` directly and implement its
//! boundary traits.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use loreflow::core::{EngineConfig, FlowStack, ServiceRegistry};
//! use loreflow::stdlib::register_standard_functions;
//! use loreflow::store::InMemoryDefinitionStore;
//! # use loreflow::core::{EngineError, EntityGraph, EntityId, Messenger, WorldEntity};
//! # struct World; struct Sessions;
//! # impl EntityGraph for World {
//! #     fn resolve(&self, _id: &EntityId) -> Option<Arc<dyn WorldEntity>> { None }
//! # }
//! # impl Messenger for Sessions {
//! #     fn deliver(&self, _t: &EntityId, _x: &str) -> Result<(), EngineError> { Ok(()) }
//! # }
//!
//! # fn main() -> Result<(), EngineError> {
//! let store = Arc::new(InMemoryDefinitionStore::new());
//! let mut services = ServiceRegistry::new();
//! register_standard_functions(&mut services);
//!
//! let mut stack = FlowStack::new(
//!     store,
//!     Arc::new(World),
//!     Arc::new(Sessions),
//!     Arc::new(services),
//!     EngineConfig::default(),
//! );
//! let outcome = stack.run_command(
//!     &loreflow::core::TreeId("walk".to_string()),
//!     &["can_move".to_string()],
//!     HashMap::new(),
//! )?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The engine: interpreter, triggers, boundary traits
pub use loreflow_core as core;

/// Standard service functions
pub use loreflow_stdlib as stdlib;

/// In-memory definition store
pub use loreflow_store_inmemory as store;

pub use loreflow_core::{EngineConfig, EngineError, FlowStack, ServiceRegistry};
