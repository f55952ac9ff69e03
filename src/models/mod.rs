// Core data models for the lead board
// These structs represent the domain entities

pub mod segment;
pub mod entity;
pub mod intent;
pub mod lead;

pub use segment::*;
pub use entity::*;
pub use intent::*;
pub use lead::*;
