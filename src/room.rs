//! A single game room
//!
//! Wraps [`RoomState`] with seating, input and snapshot handling. The
//! simulation itself lives in [`crate::sim`]; this layer owns the phase
//! transitions driven by players rather than by the tick.

use log::{debug, info};
use thiserror::Error;

use crate::lobby::LobbyState;
use crate::protocol::{
    BallView, BrickView, ClientMessage, GameStateView, PaddleView, PlayerView, ServerMessage, Xy,
    brick_type_code,
};
use crate::sim::{self, Direction, Player, RoomEvent, RoomPhase, RoomState, Variant, World};
use crate::sim::state::BodyTag;
use crate::{RoomId, UserId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeatError {
    #[error("User {0} is already seated")]
    AlreadySeated(UserId),

    #[error("Room is full")]
    RoomFull,

    #[error("Game has ended")]
    Ended,
}

#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    state: RoomState,
}

impl Room {
    pub fn new(id: impl Into<RoomId>, variant: Variant, seed: u64) -> Self {
        Self {
            id: id.into(),
            state: RoomState::new(variant, seed),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> RoomPhase {
        self.state.phase
    }

    pub fn variant(&self) -> &Variant {
        &self.state.variant
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// Mutable access for tests and tools that stage a position directly
    pub fn state_mut(&mut self) -> &mut RoomState {
        &mut self.state
    }

    pub fn seat_of(&self, user_id: &str) -> Option<usize> {
        self.state.seat_of(user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.state.seated_count() == 0
    }

    pub fn seated_users(&self) -> Vec<UserId> {
        self.state
            .players
            .iter()
            .filter_map(|p| p.user_id.clone())
            .collect()
    }

    /// Claim the lowest free seat for `user_id`
    pub fn join(&mut self, user_id: &str) -> Result<usize, SeatError> {
        if self.state.phase == RoomPhase::Ended {
            return Err(SeatError::Ended);
        }
        if self.state.seat_of(user_id).is_some() {
            return Err(SeatError::AlreadySeated(user_id.to_string()));
        }
        let seat = self
            .state
            .players
            .iter()
            .position(|p| !p.is_seated())
            .ok_or(SeatError::RoomFull)?;

        let player = &mut self.state.players[seat];
        player.user_id = Some(user_id.to_string());
        player.direction = Direction::ZERO;
        player.ready = false;
        info!("Room {}: {} took seat {}", self.id, user_id, seat);

        if self.state.all_seated() && self.state.phase == RoomPhase::WaitingForPlayers {
            self.state.phase = if self.state.variant.ready_gate {
                RoomPhase::WaitingForReady
            } else {
                RoomPhase::Running
            };
            debug!("Room {}: phase -> {:?}", self.id, self.state.phase);
        }
        Ok(seat)
    }

    /// Free the user's seat. Returns the seat index, or `None` if not seated.
    pub fn leave(&mut self, user_id: &str) -> Option<usize> {
        let seat = self.state.seat_of(user_id)?;
        let player = &mut self.state.players[seat];
        player.user_id = None;
        player.direction = Direction::ZERO;
        player.ready = false;
        info!("Room {}: {} left seat {}", self.id, user_id, seat);

        if self.state.phase != RoomPhase::Ended {
            self.state.phase = RoomPhase::WaitingForPlayers;
        }
        Some(seat)
    }

    /// Latest-wins input update. Returns false if the user is not seated.
    pub fn set_direction(&mut self, user_id: &str, direction: Direction) -> bool {
        let Some(seat) = self.state.seat_of(user_id) else {
            return false;
        };
        self.state.players[seat].direction = direction.normalized();
        true
    }

    /// Mark the user ready. Only meaningful in gated rooms waiting for ready.
    pub fn set_ready(&mut self, user_id: &str) -> bool {
        if !self.state.variant.ready_gate || self.state.phase != RoomPhase::WaitingForReady {
            return false;
        }
        let Some(seat) = self.state.seat_of(user_id) else {
            return false;
        };
        self.state.players[seat].ready = true;

        if self.state.players.iter().all(|p| p.is_seated() && p.ready) {
            self.state.phase = RoomPhase::Running;
            debug!("Room {}: all players ready", self.id);
        }
        true
    }

    /// Apply a decoded client message. Returns a reply for the sender only.
    pub fn handle_message(&mut self, user_id: &str, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::SetDirection { direction } => {
                if !self.set_direction(user_id, direction) {
                    debug!("Room {}: input from unseated user {}", self.id, user_id);
                }
                None
            }
            ClientMessage::SetReady => {
                if !self.set_ready(user_id) {
                    debug!("Room {}: ignored ready from {}", self.id, user_id);
                }
                None
            }
            ClientMessage::Ping { id } => Some(ServerMessage::PingResponse { id }),
        }
    }

    pub fn tick(&mut self, dt: f32) {
        sim::tick(&mut self.state, dt);
    }

    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        self.state.drain_events()
    }

    /// Public view of the room
    pub fn snapshot(&self) -> GameStateView {
        let gated = self.state.variant.ready_gate;
        let world = &self.state.world;
        let mut players = self
            .state
            .players
            .iter()
            .map(|p| player_view(world, p, gated));
        let player1 = players.next().unwrap_or_else(|| PlayerView {
            id: String::new(),
            score: 0,
            ready: None,
            paddle: None,
            bricks: Vec::new(),
        });
        let player2 = players.next();

        let balls = self
            .state
            .balls
            .iter()
            .filter_map(|ball| {
                let body = world.get(ball.body)?;
                Some(BallView {
                    id: ball.id,
                    position: body.position().into(),
                })
            })
            .collect();

        GameStateView {
            phase: self.state.phase,
            player1,
            player2,
            balls,
        }
    }

    pub fn lobby_state(&self) -> LobbyState {
        let winner = match self.state.phase {
            RoomPhase::Ended => self.winner(),
            _ => None,
        };
        LobbyState {
            variant: self.state.variant.preset,
            phase: self.state.phase,
            seats: self.state.players.iter().map(|p| p.user_id.clone()).collect(),
            scores: self.state.players.iter().map(|p| p.score).collect(),
            winner,
        }
    }

    /// Seated player holding the strictly highest score
    fn winner(&self) -> Option<UserId> {
        let best = self.state.players.iter().map(|p| p.score).max()?;
        let mut leaders = self.state.players.iter().filter(|p| p.score == best);
        let leader = leaders.next()?;
        if leaders.next().is_some() {
            return None;
        }
        leader.user_id.clone()
    }
}

fn player_view(world: &World<BodyTag>, player: &Player, gated: bool) -> PlayerView {
    let paddle = player.paddle.and_then(|handle| {
        let body = world.get(handle)?;
        let extent = body.extent();
        Some(PaddleView {
            position: body.position().into(),
            width: extent.x,
            height: extent.y,
        })
    });
    let bricks = player
        .bricks
        .iter()
        .filter_map(|brick| {
            let body = world.get(brick.body)?;
            Some(BrickView {
                id: brick.id,
                position: body.position().into(),
                scale: Xy::from(body.scale()),
                brick_type: brick_type_code(brick.kind),
                color: brick.tint,
            })
        })
        .collect();

    PlayerView {
        id: player.user_id.clone().unwrap_or_default(),
        score: player.score,
        ready: gated.then_some(player.ready),
        paddle,
        bricks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::VariantPreset;
    use glam::Vec2;

    fn room(preset: VariantPreset) -> Room {
        Room::new("room-1", preset.variant(), 11)
    }

    #[test]
    fn test_seating_order_and_rejections() {
        let mut room = room(VariantPreset::Handoff);
        assert_eq!(room.join("alice"), Ok(0));
        assert_eq!(
            room.join("alice"),
            Err(SeatError::AlreadySeated("alice".into()))
        );
        assert_eq!(room.phase(), RoomPhase::WaitingForPlayers);
        assert_eq!(room.join("bob"), Ok(1));
        assert_eq!(room.phase(), RoomPhase::Running);

        let before = room.seated_users();
        assert_eq!(room.join("carol"), Err(SeatError::RoomFull));
        assert_eq!(room.seated_users(), before);
    }

    #[test]
    fn test_ready_gate() {
        let mut room = room(VariantPreset::Duel);
        room.join("alice").unwrap();
        assert!(!room.set_ready("alice"));
        room.join("bob").unwrap();
        assert_eq!(room.phase(), RoomPhase::WaitingForReady);

        assert!(room.set_ready("alice"));
        assert_eq!(room.phase(), RoomPhase::WaitingForReady);
        assert!(!room.set_ready("mallory"));
        assert!(room.set_ready("bob"));
        assert_eq!(room.phase(), RoomPhase::Running);

        let snapshot = room.snapshot();
        assert_eq!(snapshot.player1.ready, Some(true));
    }

    #[test]
    fn test_ready_ignored_without_gate() {
        let mut room = room(VariantPreset::Handoff);
        room.join("alice").unwrap();
        room.join("bob").unwrap();
        assert!(!room.set_ready("alice"));
        assert!(room.snapshot().player1.ready.is_none());
    }

    #[test]
    fn test_leave_returns_to_waiting() {
        let mut room = room(VariantPreset::Handoff);
        room.join("alice").unwrap();
        room.join("bob").unwrap();
        room.set_direction("bob", Direction::new(1.0, 0.0));

        assert_eq!(room.leave("bob"), Some(1));
        assert_eq!(room.leave("bob"), None);
        assert_eq!(room.phase(), RoomPhase::WaitingForPlayers);
        assert!(room.state().players[1].direction.is_zero());

        // The freed seat is reused
        assert_eq!(room.join("carol"), Ok(1));
        assert_eq!(room.phase(), RoomPhase::Running);
    }

    #[test]
    fn test_solo_paddle_travel() {
        let mut room = room(VariantPreset::Solo);
        room.join("alice").unwrap();
        assert_eq!(room.phase(), RoomPhase::Running);
        room.state_mut().balls.clear();
        room.state_mut().world.clear();
        let paddle = {
            let state = room.state_mut();
            state.players[0].bricks.clear();
            state.set_paddle(0, Vec2::new(0.0, RAIL_Y), PADDLE_WIDTH, PADDLE_HEIGHT);
            state.players[0].paddle.unwrap()
        };

        room.set_direction("alice", Direction::new(1.0, 0.0));
        room.tick(SIM_DT);
        let x = room.state().world.get(paddle).unwrap().position().x;
        assert!((x - PLAYER_SPEED * SIM_DT).abs() < 1e-3);

        for _ in 0..200 {
            room.tick(SIM_DT);
        }
        let x = room.state().world.get(paddle).unwrap().position().x;
        assert!((x - (ARENA_HALF_WIDTH - PADDLE_WIDTH)).abs() < 1e-3);
    }

    #[test]
    fn test_ping_is_unicast_and_pure() {
        let mut room = room(VariantPreset::Handoff);
        room.join("alice").unwrap();
        let before = room.snapshot();
        let ticks = room.state().time_ticks;

        let reply = room.handle_message(
            "alice",
            ClientMessage::Ping {
                id: serde_json::Number::from(1000),
            },
        );
        assert_eq!(
            reply,
            Some(ServerMessage::PingResponse {
                id: serde_json::Number::from(1000)
            })
        );
        assert_eq!(room.snapshot(), before);
        assert_eq!(room.state().time_ticks, ticks);
    }

    #[test]
    fn test_snapshot_hides_internals() {
        let mut room = room(VariantPreset::Handoff);
        room.join("alice").unwrap();
        let snapshot = room.snapshot();
        assert_eq!(snapshot.player1.id, "alice");
        assert_eq!(snapshot.player2.as_ref().map(|p| p.id.as_str()), Some(""));
        assert_eq!(snapshot.balls.len(), room.state().balls.len());

        let value = serde_json::to_value(&snapshot).unwrap();
        let text = value.to_string();
        assert!(!text.contains("time_ticks"));
        assert!(!text.contains("body"));
    }

    #[test]
    fn test_lobby_state_reports_winner() {
        let mut room = room(VariantPreset::Duel);
        room.join("alice").unwrap();
        room.join("bob").unwrap();
        assert_eq!(
            room.lobby_state().seats,
            vec![Some("alice".to_string()), Some("bob".to_string())]
        );

        room.state_mut().players[1].score = 5;
        room.state_mut().phase = RoomPhase::Ended;
        let lobby = room.lobby_state();
        assert_eq!(lobby.scores, vec![0, 5]);
        assert_eq!(lobby.winner.as_deref(), Some("bob"));

        assert_eq!(room.join("carol"), Err(SeatError::Ended));
    }
}
