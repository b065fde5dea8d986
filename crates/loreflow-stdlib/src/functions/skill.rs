//! Dice-based skill checks

use rand::Rng;
use tracing::debug;

use loreflow_core::{EngineError, FlowValue, ServiceContext, ServiceFunction, WorldEntity};

type Roller = Box<dyn Fn() -> i64 + Send + Sync>;

/// `skill_check(actor, skill, difficulty)`: roll a d20, add the actor's
/// skill attribute as a modifier, and compare against the difficulty.
///
/// Returns a boolean: `roll + modifier >= difficulty`. A missing skill
/// attribute counts as modifier 0.
pub struct SkillCheck {
    roll: Roller,
}

impl SkillCheck {
    /// A check rolling a real d20
    pub fn new() -> Self {
        Self {
            roll: Box::new(|| rand::thread_rng().gen_range(1..=20)),
        }
    }

    /// A check with a fixed die, for deterministic tests
    pub fn with_roller(roll: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            roll: Box::new(roll),
        }
    }
}

impl Default for SkillCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceFunction for SkillCheck {
    fn call(&self, ctx: &mut ServiceContext<'_>) -> Result<FlowValue, EngineError> {
        let actor = ctx.entity_param("actor")?;
        let skill = ctx.string_param("skill")?;
        let difficulty = match ctx.param("difficulty")?.to_comparable() {
            serde_json::Value::Number(n) => n.as_i64().ok_or_else(|| {
                EngineError::ParameterError("difficulty is not an integer".to_string())
            })?,
            other => {
                return Err(EngineError::ParameterError(format!(
                    "difficulty is not a number: {}",
                    other
                )))
            }
        };

        let entity = ctx
            .world
            .resolve(&actor)
            .ok_or_else(|| EngineError::WorldError(format!("Unknown entity: {}", actor)))?;
        let modifier = entity
            .attribute(&skill)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let roll = (self.roll)();
        let passed = roll + modifier >= difficulty;
        debug!(actor = %actor, skill = %skill, roll, modifier, difficulty, passed, "skill check");
        Ok(FlowValue::Data(serde_json::Value::Bool(passed)))
    }
}
