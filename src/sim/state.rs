//! Room state and entity types
//!
//! Entities own a [`BodyHandle`] into the room's physics world. Adding or
//! removing an entity always touches both the collection and the world in
//! the same call.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::layout;
use super::physics::{Body, BodyHandle, World};
use super::variant::Variant;
use crate::UserId;
use crate::consts::*;

/// Half of the arena a seat defends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Seat 0, rail at +y
    A,
    /// Seat 1, rail at -y
    B,
}

impl Side {
    pub fn from_seat(seat: usize) -> Self {
        if seat == 0 { Side::A } else { Side::B }
    }

    pub fn seat(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// y of the seat's rail line
    pub fn rail_y(self) -> f32 {
        match self {
            Side::A => RAIL_Y,
            Side::B => -RAIL_Y,
        }
    }

    /// Unit y direction pointing from the rail toward the arena centre
    pub fn inward(self) -> f32 {
        match self {
            Side::A => -1.0,
            Side::B => 1.0,
        }
    }

    /// Vertical band a seat's paddle may occupy
    pub fn band(self) -> (f32, f32) {
        match self {
            Side::A => (0.0, ARENA_HALF_HEIGHT),
            Side::B => (-ARENA_HALF_HEIGHT, 0.0),
        }
    }
}

/// Which collection owns a physics body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Paddle,
    Ball,
    Brick(Side),
}

/// Tag stored on every body in the room world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyTag {
    pub kind: BodyKind,
    /// Ball id, brick id or seat index depending on `kind`
    pub owner: u32,
}

impl BodyTag {
    pub fn new(kind: BodyKind, owner: u32) -> Self {
        Self { kind, owner }
    }
}

/// Brick types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrickKind {
    #[default]
    Normal,
    /// Spawns an extra ball when struck
    Ball,
}

/// Per-axis movement intent, each component in {-1, 0, 1}
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Direction {
    pub x: f32,
    pub y: f32,
}

impl Direction {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }.normalized()
    }

    /// Snap each component to -1, 0 or 1 (NaN becomes 0)
    pub fn normalized(self) -> Self {
        fn unit(v: f32) -> f32 {
            if v > 0.0 {
                1.0
            } else if v < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        Self {
            x: unit(self.x),
            y: unit(self.y),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A ball entity
#[derive(Debug, Clone)]
pub struct Ball {
    pub id: u32,
    pub body: BodyHandle,
    pub momentum: Vec2,
}

/// A brick entity
#[derive(Debug, Clone)]
pub struct Brick {
    pub id: u32,
    pub body: BodyHandle,
    pub kind: BrickKind,
    pub tint: u32,
}

/// One seat in a room
#[derive(Debug, Clone, Default)]
pub struct Player {
    /// `None` while the seat is free
    pub user_id: Option<UserId>,
    pub direction: Direction,
    pub ready: bool,
    pub score: u32,
    /// Bricks on this seat's side
    pub bricks: Vec<Brick>,
    pub paddle: Option<BodyHandle>,
}

impl Player {
    pub fn unseated() -> Self {
        Self::default()
    }

    pub fn is_seated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

/// Lifecycle phase of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomPhase {
    WaitingForPlayers,
    WaitingForReady,
    Running,
    Ended,
}

/// Notable transitions produced while ticking
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// `seat` gained one point
    Scored { seat: usize },
    /// Balls, bricks and paddles were rebuilt from the initial layout
    RoundReset,
    BallSpawned { id: u32 },
    BrickDestroyed { id: u32, side: Side },
    BrickHandedOff { id: u32, to: Side, forced: bool },
    GameEnded { winner: Option<usize> },
}

/// Complete simulation state of one room
#[derive(Debug, Clone)]
pub struct RoomState {
    pub variant: Variant,
    pub world: World<BodyTag>,
    pub players: Vec<Player>,
    /// Active balls (spawn order)
    pub balls: Vec<Ball>,
    pub phase: RoomPhase,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Tint RNG
    rng: Pcg32,
    events: Vec<RoomEvent>,
}

impl RoomState {
    /// Create a room with unseated players and the variant's initial layout
    pub fn new(variant: Variant, seed: u64) -> Self {
        let seats = variant.seat_count();
        let mut state = Self {
            variant,
            world: World::new(),
            players: (0..seats).map(|_| Player::unseated()).collect(),
            balls: Vec::new(),
            phase: RoomPhase::WaitingForPlayers,
            time_ticks: 0,
            rng: Pcg32::seed_from_u64(seed),
            events: Vec::new(),
        };
        layout::populate(&mut state);
        state
    }

    pub fn push_event(&mut self, event: RoomEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn seated_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_seated()).count()
    }

    pub fn all_seated(&self) -> bool {
        self.players.iter().all(Player::is_seated)
    }

    pub fn seat_of(&self, user_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.is(user_id))
    }

    pub fn random_tint(&mut self) -> u32 {
        BRICK_TINTS[self.rng.random_range(0..BRICK_TINTS.len())]
    }

    /// Next ball id: one past the highest live id
    pub fn next_ball_id(&self) -> u32 {
        self.balls.iter().map(|b| b.id + 1).max().unwrap_or(0)
    }

    /// Next brick id: one past the highest live id on either side
    pub fn next_brick_id(&self) -> u32 {
        self.players
            .iter()
            .flat_map(|p| p.bricks.iter())
            .map(|b| b.id + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn spawn_ball(&mut self, center: Vec2, momentum: Vec2) -> u32 {
        let id = self.next_ball_id();
        let body = self.world.insert(Body::circle(
            center,
            BALL_RADIUS,
            BodyTag::new(BodyKind::Ball, id),
        ));
        self.balls.push(Ball { id, body, momentum });
        id
    }

    pub fn despawn_ball(&mut self, index: usize) -> Option<Ball> {
        if index >= self.balls.len() {
            return None;
        }
        let ball = self.balls.remove(index);
        self.world.remove(ball.body);
        Some(ball)
    }

    /// Insert a brick owned by `side`. Does nothing if the side has no seat.
    pub fn add_brick(
        &mut self,
        side: Side,
        id: u32,
        position: Vec2,
        scale: Vec2,
        kind: BrickKind,
        tint: u32,
    ) -> Option<BodyHandle> {
        let seat = side.seat();
        if seat >= self.players.len() {
            return None;
        }
        let body = self.world.insert(
            Body::rect(
                position,
                BRICK_WIDTH,
                BRICK_HEIGHT,
                BodyTag::new(BodyKind::Brick(side), id),
            )
            .with_scale(scale),
        );
        self.players[seat].bricks.push(Brick {
            id,
            body,
            kind,
            tint,
        });
        Some(body)
    }

    /// Remove a brick from its side and from the world
    pub fn remove_brick(&mut self, side: Side, index: usize) -> Option<(Brick, Body<BodyTag>)> {
        let bricks = &mut self.players.get_mut(side.seat())?.bricks;
        if index >= bricks.len() {
            return None;
        }
        let brick = bricks.remove(index);
        let body = self.world.remove(brick.body)?;
        Some((brick, body))
    }

    pub fn set_paddle(&mut self, seat: usize, position: Vec2, width: f32, height: f32) {
        let Some(player) = self.players.get(seat) else {
            return;
        };
        if let Some(old) = player.paddle {
            self.world.remove(old);
        }
        let body = self.world.insert(Body::rect(
            position,
            width,
            height,
            BodyTag::new(BodyKind::Paddle, seat as u32),
        ));
        self.players[seat].paddle = Some(body);
    }

    pub fn find_ball(&self, body: BodyHandle) -> Option<usize> {
        self.balls.iter().position(|b| b.body == body)
    }

    pub fn find_brick(&self, side: Side, body: BodyHandle) -> Option<usize> {
        self.players
            .get(side.seat())?
            .bricks
            .iter()
            .position(|b| b.body == body)
    }

    /// Remove every ball, brick and paddle from the collections and the world
    pub fn clear_entities(&mut self) {
        for ball in self.balls.drain(..) {
            self.world.remove(ball.body);
        }
        for player in &mut self.players {
            for brick in player.bricks.drain(..) {
                self.world.remove(brick.body);
            }
            if let Some(paddle) = player.paddle.take() {
                self.world.remove(paddle);
            }
        }
    }

    /// Rebuild the initial layout, keeping seats and scores
    pub fn reset_round(&mut self) {
        self.clear_entities();
        layout::populate(self);
        if self.variant.ready_gate {
            for player in &mut self.players {
                player.ready = false;
            }
            if self.phase == RoomPhase::Running {
                self.phase = RoomPhase::WaitingForReady;
            }
        }
        self.push_event(RoomEvent::RoundReset);
    }
}
