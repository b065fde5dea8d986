use thiserror::Error;

/// Core error type for the Loreflow engine.
///
/// The first four variants are flow-control signals, not bugs: step actions
/// and service functions raise them to unwind traversal in a controlled way,
/// and the engine catches them at the documented scopes. Everything else
/// aborts the whole flow stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Aborts the remaining trigger dispatch for the current event only;
    /// the emitting execution continues.
    #[error("{0}")]
    StopEvent(String),

    /// Abandons the remaining descendants of the current branch point;
    /// traversal continues at the branch point's next sibling.
    #[error("branch stopped")]
    StopBranch,

    /// Ends the current flow execution, recording the message as its stop
    /// reason. Never stops the execution that spawned it.
    #[error("{0}")]
    StopFlow(String),

    /// Ends the current flow execution and every ancestor execution in the
    /// chain that spawned it.
    #[error("{0}")]
    CancelFlow(String),

    /// A sigil reference named a variable absent from the execution's
    /// variable mapping. Authoring error, surfaced immediately.
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    /// A path segment could not be resolved on a non-null value.
    /// Authoring error, surfaced immediately.
    #[error("Undefined attribute: {0}")]
    UndefinedAttribute(String),

    /// A step tree or trigger definition failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Step tree not found in the definition store
    #[error("Step tree not found: {0}")]
    TreeNotFound(String),

    /// Service function not registered
    #[error("Service function not found: {0}")]
    ServiceFunctionNotFound(String),

    /// A step invoked a service function with a missing or ill-typed parameter
    #[error("Service function parameter error: {0}")]
    ParameterError(String),

    /// Trigger cascade exceeded the configured nesting depth
    #[error("Trigger nesting depth exceeded: {0}")]
    TriggerDepthExceeded(usize),

    /// Entity graph failure (unknown entity, rejected mutation)
    #[error("World error: {0}")]
    WorldError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A command was refused by a prerequisite check; the message is
    /// user-facing
    #[error("{0}")]
    CommandRefused(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Whether this error is one of the flow-control signals the engine
    /// catches during traversal and dispatch.
    pub fn is_control_signal(&self) -> bool {
        matches!(
            self,
            EngineError::StopEvent(_)
                | EngineError::StopBranch
                | EngineError::StopFlow(_)
                | EngineError::CancelFlow(_)
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}

impl From<String> for EngineError {
    fn from(err: String) -> Self {
        EngineError::Other(err)
    }
}

impl From<&str> for EngineError {
    fn from(err: &str) -> Self {
        EngineError::Other(err.to_string())
    }
}
