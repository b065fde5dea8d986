/// Attribute read/write functions
pub mod attributes;

/// Session message delivery
pub mod messaging;

/// Entity relocation
pub mod movement;

/// Dice-based skill checks
pub mod skill;
