use serde::{Deserialize, Serialize};

/// Engine tuning knobs, deserializable from the host's configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum trigger nesting depth before the stack fails loudly.
    ///
    /// Usage limits are opt-in per trigger, so they are not a safety net
    /// against self-retriggering event chains; this bound is.
    #[serde(default = "default_max_trigger_depth")]
    pub max_trigger_depth: usize,

    /// User-facing message when a prerequisite stops a command without
    /// giving a reason of its own
    #[serde(default = "default_fallback_stop_message")]
    pub fallback_stop_message: String,
}

fn default_max_trigger_depth() -> usize {
    50
}

fn default_fallback_stop_message() -> String {
    "You cannot do that right now.".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_trigger_depth: default_max_trigger_depth(),
            fallback_stop_message: default_fallback_stop_message(),
        }
    }
}
