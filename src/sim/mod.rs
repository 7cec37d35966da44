//! Room simulation module
//!
//! All gameplay logic lives here. This module must stay free of I/O:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (spawn order, sorted contacts)
//! - No transport or clock dependencies

pub mod layout;
pub mod physics;
pub mod state;
pub mod tick;
pub mod variant;

pub use physics::{Aabb, Body, BodyHandle, Contact, Shape, World};
pub use state::{
    Ball, BodyKind, BodyTag, Brick, BrickKind, Direction, Player, RoomEvent, RoomPhase, RoomState,
    Side,
};
pub use tick::tick;
pub use variant::{BrickRule, EdgeRule, PaddleStyle, Variant, VariantPreset};
