//! Attribute read/write against the live entity graph

use tracing::debug;

use loreflow_core::{
    EngineError, FlowValue, KeyResolver, ServiceContext, ServiceFunction, WorldEntity,
};

/// `set_attribute(target, name, value)`: persist an attribute on an entity.
///
/// The value is collapsed before writing: entity references are stored as
/// their pk strings.
pub struct SetAttribute;

impl ServiceFunction for SetAttribute {
    fn call(&self, ctx: &mut ServiceContext<'_>) -> Result<FlowValue, EngineError> {
        let target = ctx.entity_param("target")?;
        let name = ctx.string_param("name")?;
        let value = ctx.param("value")?.to_comparable();

        let entity = ctx
            .world
            .resolve(&target)
            .ok_or_else(|| EngineError::WorldError(format!("Unknown entity: {}", target)))?;
        debug!(target = %target, attribute = %name, "setting attribute");
        entity.set_attribute(&name, value)?;
        Ok(FlowValue::null())
    }
}

/// `get_attribute(target, name)`: read an attribute or capability through
/// the entity's state; absent attributes resolve to null
pub struct GetAttribute;

impl ServiceFunction for GetAttribute {
    fn call(&self, ctx: &mut ServiceContext<'_>) -> Result<FlowValue, EngineError> {
        let target = ctx.entity_param("target")?;
        let name = ctx.string_param("name")?;

        let state = ctx.scene.state_for(&target, ctx.world)?;
        Ok(state.resolve_key(&name).unwrap_or_else(FlowValue::null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{params, Fixture};
    use loreflow_core::EntityId;
    use loreflow_test_utils::MockWorld;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let world = MockWorld::new();
        let alice = world.add_character("alice", "Alice");

        let mut fixture = Fixture::new(world.clone());
        let mut ctx = fixture.context(params(&[
            ("target", FlowValue::Entity(alice.clone())),
            ("name", FlowValue::Data(json!("strength"))),
            ("value", FlowValue::Data(json!(14))),
        ]));
        SetAttribute.call(&mut ctx).unwrap();
        assert_eq!(world.attribute_of(&alice, "strength"), Some(json!(14)));

        let mut ctx = fixture.context(params(&[
            ("target", FlowValue::Entity(alice)),
            ("name", FlowValue::Data(json!("strength"))),
        ]));
        assert_eq!(
            GetAttribute.call(&mut ctx).unwrap(),
            FlowValue::Data(json!(14))
        );
    }

    #[test]
    fn test_entity_values_collapse_to_pk() {
        let world = MockWorld::new();
        let alice = world.add_character("alice", "Alice");
        let bob = world.add_character("bob", "Bob");

        let mut fixture = Fixture::new(world.clone());
        let mut ctx = fixture.context(params(&[
            ("target", FlowValue::Entity(alice.clone())),
            ("name", FlowValue::Data(json!("rival"))),
            ("value", FlowValue::Entity(bob)),
        ]));
        SetAttribute.call(&mut ctx).unwrap();

        assert_eq!(world.attribute_of(&alice, "rival"), Some(json!("bob")));
    }

    #[test]
    fn test_get_absent_attribute_is_null() {
        let world = MockWorld::new();
        let alice = world.add_character("alice", "Alice");

        let mut fixture = Fixture::new(world);
        let mut ctx = fixture.context(params(&[
            ("target", FlowValue::Entity(alice)),
            ("name", FlowValue::Data(json!("charisma"))),
        ]));

        assert!(GetAttribute.call(&mut ctx).unwrap().is_null());
    }

    #[test]
    fn test_get_capability_key() {
        let world = MockWorld::new();
        let alice = world.add_character("alice", "Alice");

        let mut fixture = Fixture::new(world);
        let mut ctx = fixture.context(params(&[
            ("target", FlowValue::Entity(alice)),
            ("name", FlowValue::Data(json!("can_move"))),
        ]));

        assert_eq!(
            GetAttribute.call(&mut ctx).unwrap(),
            FlowValue::Data(json!(true))
        );
    }

    #[test]
    fn test_unknown_entity_is_world_error() {
        let world = MockWorld::new();

        let mut fixture = Fixture::new(world);
        let mut ctx = fixture.context(params(&[
            ("target", FlowValue::Entity(EntityId("ghost".to_string()))),
            ("name", FlowValue::Data(json!("strength"))),
            ("value", FlowValue::Data(json!(1))),
        ]));

        assert!(matches!(
            SetAttribute.call(&mut ctx),
            Err(EngineError::WorldError(_))
        ));
    }
}
