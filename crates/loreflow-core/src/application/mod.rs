/// The request-scoped interpreter
pub mod flow_stack;

/// Named service functions callable from steps
pub mod service_registry;
