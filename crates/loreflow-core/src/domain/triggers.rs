//! Trigger templates, bindings and the per-request matching registry
//!
//! A [`TriggerDefinition`] is a reusable template ("when `glance` targets
//! $self, run `glance_reaction`"). A [`Trigger`] binds one definition to one
//! entity with optional extra filtering and persisted settings. The
//! [`TriggerRegistry`] holds the bindings loaded for a request and answers
//! "which triggers match this event, in what order".

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::domain::events::FlowEvent;
use crate::domain::step_tree::StepTree;
use crate::types::{EntityId, TriggerId};

/// Placeholder in filter conditions that resolves to the bound entity's pk
pub const SELF_PLACEHOLDER: &str = "$self";

/// Effective usage limit of a trigger for one event key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLimit {
    /// Fire at most this many times per usage key
    Limited(u32),

    /// No cap (persisted as `0`)
    Unlimited,
}

impl UsageLimit {
    /// Whether a trigger with this limit may fire given its current count
    pub fn allows(&self, fired: u32) -> bool {
        match self {
            UsageLimit::Unlimited => true,
            UsageLimit::Limited(max) => fired < *max,
        }
    }
}

/// Reusable trigger template: which event to listen for, what to run, and
/// the base filter every binding inherits
#[derive(Debug, Clone)]
pub struct TriggerDefinition {
    /// Event type key this template listens for
    pub event_key: String,

    /// Tree spawned when the trigger fires
    pub target_tree: Arc<StepTree>,

    /// Conditions on event data; values may be [`SELF_PLACEHOLDER`]
    pub base_filter: IndexMap<String, Value>,

    /// Higher priority fires first
    pub priority: i64,

    /// Designer-facing description
    pub description: String,
}

impl TriggerDefinition {
    /// Create a template with no filter and priority 0
    pub fn new(event_key: impl Into<String>, target_tree: Arc<StepTree>) -> Self {
        Self {
            event_key: event_key.into(),
            target_tree,
            base_filter: IndexMap::new(),
            priority: 0,
            description: String::new(),
        }
    }

    /// Builder: add one base filter condition
    pub fn with_filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.base_filter.insert(key.into(), value);
        self
    }

    /// Builder: set the firing priority
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set the designer-facing description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One definition bound to one entity, with per-binding filtering and
/// persisted string settings
#[derive(Debug, Clone)]
pub struct Trigger {
    /// Binding identity
    pub id: TriggerId,

    /// The template this binding instantiates
    pub definition: Arc<TriggerDefinition>,

    /// Entity this binding listens on behalf of (`$self` in filters)
    pub bound_entity_id: EntityId,

    /// Extra conditions on top of the definition's base filter
    pub additional_filter: IndexMap<String, Value>,

    /// Persisted settings; the engine consumes `usage_limit_<event_key>`
    pub data: HashMap<String, String>,
}

impl Trigger {
    /// Bind a definition to an entity with no extra filter or settings
    pub fn new(
        id: impl Into<String>,
        definition: Arc<TriggerDefinition>,
        bound_entity_id: EntityId,
    ) -> Self {
        Self {
            id: TriggerId(id.into()),
            definition,
            bound_entity_id,
            additional_filter: IndexMap::new(),
            data: HashMap::new(),
        }
    }

    /// Builder: add one additional filter condition
    pub fn with_filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_filter.insert(key.into(), value);
        self
    }

    /// Builder: set one persisted settings entry
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Effective usage limit for this binding's event key.
    ///
    /// Absent entry means once; `0` means unlimited; a malformed value is
    /// logged and treated as once.
    pub fn usage_limit(&self) -> UsageLimit {
        let key = format!("usage_limit_{}", self.definition.event_key);
        match self.data.get(&key) {
            None => UsageLimit::Limited(1),
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) => UsageLimit::Unlimited,
                Ok(n) => UsageLimit::Limited(n),
                Err(_) => {
                    warn!(
                        trigger = %self.id.0,
                        setting = %key,
                        value = %raw,
                        "malformed usage limit, treating as 1"
                    );
                    UsageLimit::Limited(1)
                }
            },
        }
    }

    /// Whether both filters are satisfied by the event's data
    pub fn matches(&self, event: &FlowEvent) -> bool {
        if self.definition.event_key != event.event_type {
            return false;
        }
        condition_matches(&self.definition.base_filter, &self.bound_entity_id, event)
            && condition_matches(&self.additional_filter, &self.bound_entity_id, event)
    }
}

/// Every key present in the condition must equal the corresponding event
/// data entry; `$self` compares as the bound entity's pk. Empty conditions
/// always match.
fn condition_matches(
    condition: &IndexMap<String, Value>,
    bound_entity: &EntityId,
    event: &FlowEvent,
) -> bool {
    condition.iter().all(|(key, expected)| {
        let expected = match expected {
            Value::String(s) if s == SELF_PLACEHOLDER => Value::String(bound_entity.0.clone()),
            other => other.clone(),
        };
        event.data.get(key) == Some(&expected)
    })
}

/// The trigger bindings loaded for one request, in registration order
#[derive(Default)]
pub struct TriggerRegistry {
    triggers: Vec<Trigger>,
}

impl TriggerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one binding; registration order breaks priority ties
    pub fn register(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Whether the registry has no bindings
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Triggers matching the event, ordered by priority descending with
    /// registration order breaking ties
    pub fn find_matches(&self, event: &FlowEvent) -> Vec<&Trigger> {
        let mut matches: Vec<&Trigger> =
            self.triggers.iter().filter(|t| t.matches(event)).collect();
        // Stable sort keeps registration order within equal priorities
        matches.sort_by_key(|t| std::cmp::Reverse(t.definition.priority));
        matches
    }
}
