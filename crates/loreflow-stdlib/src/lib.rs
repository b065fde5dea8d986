//!
//! Standard library of service functions for the Loreflow engine
//!
//! Hosts register these on a [`ServiceRegistry`] and designer-authored steps
//! invoke them by name through `call_service_function`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use loreflow_core::ServiceRegistry;

pub mod functions;

pub use functions::attributes::{GetAttribute, SetAttribute};
pub use functions::messaging::SendMessage;
pub use functions::movement::MoveObject;
pub use functions::skill::SkillCheck;

/// Register every standard function under its conventional name
pub fn register_standard_functions(registry: &mut ServiceRegistry) {
    registry.register("move_object", Arc::new(MoveObject));
    registry.register("send_message", Arc::new(SendMessage));
    registry.register("set_attribute", Arc::new(SetAttribute));
    registry.register("get_attribute", Arc::new(GetAttribute));
    registry.register("skill_check", Arc::new(SkillCheck::new()));
}
