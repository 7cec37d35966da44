//! Brick Rally - authoritative room server for a breakout/pong arcade game
//!
//! Core modules:
//! - `sim`: Fixed-timestep room simulation (physics world, entities, tick)
//! - `room`: Per-room state machine (seating, ready gate, input, snapshots)
//! - `lobby`: Room summaries and creator options exchanged with the lobby
//! - `protocol`: Wire messages and public game-state snapshot
//! - `registry`: Room id to simulation mapping and lifecycle
//! - `gateway`: Routes sessions and input into rooms, broadcasts snapshots
//! - `server`: Tick driver and background collaborator tasks
//! - `settings`: Server configuration

pub mod gateway;
pub mod lobby;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod settings;
pub mod sim;

pub use gateway::{Gateway, LobbyService, TokenVerifier, Transport};
pub use registry::RoomRegistry;
pub use room::Room;
pub use settings::Settings;

/// Identifier of an authenticated user
pub type UserId = String;
/// Identifier of a room
pub type RoomId = String;

/// Game configuration constants
pub mod consts {
    /// Fixed tick interval
    pub const TICK_INTERVAL_MS: u64 = 50;
    /// Tick delta in seconds
    pub const SIM_DT: f32 = TICK_INTERVAL_MS as f32 / 1000.0;
    /// Delay between the end of a game and room teardown
    pub const END_GRACE_MS: u64 = 10_000;
    /// How long a room may sit with no seated player before it is dropped
    pub const EMPTY_ROOM_TIMEOUT_MS: u64 = 60_000;

    /// Arena is centred on the origin
    pub const ARENA_HALF_WIDTH: f32 = 128.0;
    pub const ARENA_HALF_HEIGHT: f32 = 220.0;

    /// Paddle movement speed (units/s)
    pub const PLAYER_SPEED: f32 = 200.0;
    pub const PADDLE_WIDTH: f32 = 64.0;
    pub const PADDLE_HEIGHT: f32 = 8.0;
    /// Rail line of seat 0; seat 1 mirrors it
    pub const RAIL_Y: f32 = 200.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 8.0;
    pub const BALL_SPEED: f32 = 100.0;

    /// Unscaled brick size
    pub const BRICK_WIDTH: f32 = 32.0;
    pub const BRICK_HEIGHT: f32 = 8.0;
    pub const BRICK_TINTS: [u32; 4] = [0x602c2c, 0x884b2b, 0xbe772b, 0xde9e41];

    /// Hand-off placement search
    pub const NUDGE_STEP: f32 = 8.0;
    pub const MAX_PLACEMENT_NUDGES: u32 = 64;
}
