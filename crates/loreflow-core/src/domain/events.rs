//! Typed notification objects emitted by flow steps

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::execution::ExecutionOrigin;
use crate::types::{FlowValue, KeyResolver};

/// An event emitted by a step, stored in the scene for the lifetime of the
/// request and matched against registered triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    /// Event type key that triggers listen for (`glance`, `can_move`, ...)
    pub event_type: String,

    /// Deduplicated storage name in the scene (`glance`, `glance_0`, ...)
    pub name: String,

    /// Resolved event data; entity values are stored as pk strings
    pub data: IndexMap<String, Value>,

    /// What emitted the event
    pub source: ExecutionOrigin,

    /// Identity scoping usage-limit counters: fresh per emission occurrence
    /// unless the emitter pinned one
    pub usage_key: String,

    /// Emission timestamp
    pub emitted_at: DateTime<Utc>,
}

impl FlowEvent {
    /// Construct an event; the storage `name` is assigned when the scene
    /// stores it.
    pub fn new(
        event_type: impl Into<String>,
        data: IndexMap<String, Value>,
        source: ExecutionOrigin,
        usage_key: impl Into<String>,
    ) -> Self {
        let event_type = event_type.into();
        Self {
            name: event_type.clone(),
            event_type,
            data,
            source,
            usage_key: usage_key.into(),
            emitted_at: Utc::now(),
        }
    }
}

impl KeyResolver for FlowEvent {
    fn resolve_key(&self, key: &str) -> Option<FlowValue> {
        match key {
            "event_type" | "type" => Some(FlowValue::Data(Value::String(self.event_type.clone()))),
            "name" => Some(FlowValue::Data(Value::String(self.name.clone()))),
            "usage_key" => Some(FlowValue::Data(Value::String(self.usage_key.clone()))),
            "data" => {
                let map: serde_json::Map<String, Value> =
                    self.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                Some(FlowValue::Data(Value::Object(map)))
            }
            _ => None,
        }
    }
}
