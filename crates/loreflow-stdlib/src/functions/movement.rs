//! Entity relocation

use tracing::debug;

use loreflow_core::{EngineError, FlowValue, ServiceContext, ServiceFunction, WorldEntity};

/// `move_object(object, destination)`: relocate an entity into a new
/// container.
///
/// Only entities whose state reports `can_move` may be relocated; portals
/// and plain objects refuse with a `WorldError`.
pub struct MoveObject;

impl ServiceFunction for MoveObject {
    fn call(&self, ctx: &mut ServiceContext<'_>) -> Result<FlowValue, EngineError> {
        let object = ctx.entity_param("object")?;
        let destination = ctx.entity_param("destination")?;

        let movable = ctx.scene.state_for(&object, ctx.world)?.can_move();
        if !movable {
            return Err(EngineError::WorldError(format!(
                "{} cannot be moved",
                object
            )));
        }

        let entity = ctx
            .world
            .resolve(&object)
            .ok_or_else(|| EngineError::WorldError(format!("Unknown entity: {}", object)))?;
        entity.set_location(&destination)?;
        debug!(object = %object, destination = %destination, "entity moved");
        Ok(FlowValue::null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{params, Fixture};
    use loreflow_test_utils::MockWorld;

    #[test]
    fn test_moves_a_character() {
        let world = MockWorld::new();
        let hall = world.add_room("hall", "The Hall");
        let cellar = world.add_room("cellar", "The Cellar");
        let alice = world.add_character("alice", "Alice");
        world.place(&alice, &hall);

        let mut fixture = Fixture::new(world.clone());
        let mut ctx = fixture.context(params(&[
            ("object", FlowValue::Entity(alice.clone())),
            ("destination", FlowValue::Entity(cellar.clone())),
        ]));

        MoveObject.call(&mut ctx).unwrap();
        assert_eq!(world.location_of(&alice), Some(cellar));
    }

    #[test]
    fn test_refuses_immovable_entity() {
        let world = MockWorld::new();
        let hall = world.add_room("hall", "The Hall");
        let door = world.add_portal("north_door", "North Door");

        let mut fixture = Fixture::new(world);
        let mut ctx = fixture.context(params(&[
            ("object", FlowValue::Entity(door)),
            ("destination", FlowValue::Entity(hall)),
        ]));

        match MoveObject.call(&mut ctx) {
            Err(EngineError::WorldError(msg)) => assert!(msg.contains("cannot be moved")),
            other => panic!("Expected WorldError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_parameter() {
        let world = MockWorld::new();
        let alice = world.add_character("alice", "Alice");

        let mut fixture = Fixture::new(world);
        let mut ctx = fixture.context(params(&[("object", FlowValue::Entity(alice))]));

        assert!(matches!(
            MoveObject.call(&mut ctx),
            Err(EngineError::ParameterError(_))
        ));
    }
}
