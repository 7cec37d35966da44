//! Wire messages and the public game-state snapshot
//!
//! Messages are JSON objects with a numeric `type` discriminant:
//!
//! | direction | type | message |
//! |-----------|------|---------|
//! | client    | 1    | `SetDirection { direction: { x, y } }` |
//! | client    | 2    | `Ping { id }` |
//! | client    | 3    | `SetReady {}` |
//! | server    | 0    | `StateUpdate { state, ts }` |
//! | server    | 1    | `PingResponse { id }` |

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use thiserror::Error;

use crate::sim::{BrickKind, Direction, RoomPhase};

/// Numeric message discriminants
pub mod message_types {
    pub const SET_DIRECTION: u8 = 1;
    pub const PING: u8 = 2;
    pub const SET_READY: u8 = 3;

    pub const STATE_UPDATE: u8 = 0;
    pub const PING_RESPONSE: u8 = 1;
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown message type: {0}")]
    UnknownType(u8),

    #[error("Message type {kind} is missing field `{field}`")]
    MissingField { kind: u8, field: &'static str },
}

/// Messages a client may send to its room
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    SetDirection { direction: Direction },
    SetReady,
    Ping { id: Number },
}

#[derive(Deserialize)]
struct RawClientMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    direction: Option<Direction>,
    #[serde(default)]
    id: Option<Number>,
}

impl ClientMessage {
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let raw: RawClientMessage = serde_json::from_slice(data)?;
        match raw.kind {
            message_types::SET_DIRECTION => {
                let direction = raw.direction.ok_or(ProtocolError::MissingField {
                    kind: raw.kind,
                    field: "direction",
                })?;
                Ok(ClientMessage::SetDirection {
                    direction: direction.normalized(),
                })
            }
            message_types::PING => {
                let id = raw.id.ok_or(ProtocolError::MissingField {
                    kind: raw.kind,
                    field: "id",
                })?;
                Ok(ClientMessage::Ping { id })
            }
            message_types::SET_READY => Ok(ClientMessage::SetReady),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let value = match self {
            ClientMessage::SetDirection { direction } => serde_json::json!({
                "type": message_types::SET_DIRECTION,
                "direction": direction,
            }),
            ClientMessage::Ping { id } => serde_json::json!({
                "type": message_types::PING,
                "id": id,
            }),
            ClientMessage::SetReady => serde_json::json!({ "type": message_types::SET_READY }),
        };
        Ok(serde_json::to_vec(&value)?)
    }
}

/// Messages the server sends to clients
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Broadcast once per tick
    StateUpdate { state: GameStateView, ts: u64 },
    /// Unicast reply to a ping
    PingResponse { id: Number },
}

#[derive(Serialize)]
struct StateUpdateWire<'a> {
    #[serde(rename = "type")]
    kind: u8,
    state: &'a GameStateView,
    ts: u64,
}

#[derive(Serialize)]
struct PingResponseWire<'a> {
    #[serde(rename = "type")]
    kind: u8,
    id: &'a Number,
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let bytes = match self {
            ServerMessage::StateUpdate { state, ts } => serde_json::to_vec(&StateUpdateWire {
                kind: message_types::STATE_UPDATE,
                state,
                ts: *ts,
            })?,
            ServerMessage::PingResponse { id } => serde_json::to_vec(&PingResponseWire {
                kind: message_types::PING_RESPONSE,
                id,
            })?,
        };
        Ok(bytes)
    }
}

/// Plain `{ x, y }` pair as the client expects it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Xy {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for Xy {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Wire code for a brick kind
pub fn brick_type_code(kind: BrickKind) -> u8 {
    match kind {
        BrickKind::Normal => 0,
        BrickKind::Ball => 1,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickView {
    pub id: u32,
    pub position: Xy,
    pub scale: Xy,
    pub brick_type: u8,
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaddleView {
    pub position: Xy,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallView {
    pub id: u32,
    pub position: Xy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Empty while the seat is free
    pub id: String,
    pub score: u32,
    /// Present only in ready-gated variants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paddle: Option<PaddleView>,
    pub bricks: Vec<BrickView>,
}

/// Public snapshot of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateView {
    pub phase: RoomPhase,
    pub player1: PlayerView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2: Option<PlayerView>,
    pub balls: Vec<BallView>,
}
