//! Session and transport gateway
//!
//! Authenticates connections, routes joins, leaves and input frames into
//! rooms, ticks every room and broadcasts snapshots. The network transport,
//! token issuer and lobby are external collaborators behind traits.

pub mod local;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::lobby::{InitialConfig, LobbyState};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{RegistryError, RoomRegistry};
use crate::room::{Room, SeatError};
use crate::sim::{RoomEvent, RoomPhase};
use crate::{RoomId, UserId};

/// Failure reported by an external collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Resolves a connection token to a user id
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<UserId>;
}

/// Outbound side of the network transport
pub trait Transport: Send + Sync {
    /// Unicast to one user in a room
    fn send(&self, room_id: &str, user_id: &str, data: &[u8]);
    /// Send to every connection subscribed to a room
    fn broadcast(&self, room_id: &str, data: &[u8]);
    /// Close a user's connection to a room
    fn close(&self, room_id: &str, user_id: &str);
}

/// Lobby/matchmaking backend
#[async_trait]
pub trait LobbyService: Send + Sync {
    async fn set_lobby_state(
        &self,
        room_id: &str,
        state: &LobbyState,
    ) -> Result<(), CollaboratorError>;

    async fn destroy_room(&self, room_id: &str) -> Result<(), CollaboratorError>;
}

/// Queued lobby write, delivered by the notifier task
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    LobbyState { room_id: RoomId, state: LobbyState },
    DestroyRoom { room_id: RoomId },
}

/// Deliver one notice. Failures are logged and dropped.
pub async fn deliver(lobby: &dyn LobbyService, notice: Notice) {
    let result = match &notice {
        Notice::LobbyState { room_id, state } => lobby.set_lobby_state(room_id, state).await,
        Notice::DestroyRoom { room_id } => lobby.destroy_room(room_id).await,
    };
    if let Err(e) = result {
        warn!("Lobby update failed ({:?}): {}", notice, e);
    }
}

/// Front door for every session. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<Mutex<RoomRegistry>>,
    verifier: Arc<dyn TokenVerifier>,
    transport: Arc<dyn Transport>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl Gateway {
    pub fn new(
        registry: RoomRegistry,
        verifier: Arc<dyn TokenVerifier>,
        transport: Arc<dyn Transport>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
            verifier,
            transport,
            notices,
        }
    }

    /// Lock the registry, recovering from a poisoned lock
    pub fn registry(&self) -> MutexGuard<'_, RoomRegistry> {
        self.registry.lock().unwrap_or_else(|poisoned| {
            warn!("Registry lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    pub fn authenticate(&self, token: &str) -> Option<UserId> {
        let user = self.verifier.verify(token);
        if user.is_none() {
            debug!("Rejected connection token");
        }
        user
    }

    /// Create a room with the creator's options before anyone joins
    pub fn configure_room(&self, room_id: &str, config: &InitialConfig) -> Result<(), RegistryError> {
        let mut registry = self.registry();
        let variant = config.resolve(registry.default_variant());
        let room = registry.create_with(room_id, variant, now())?;
        let state = room.lobby_state();
        drop(registry);
        self.notify(Notice::LobbyState {
            room_id: room_id.to_string(),
            state,
        });
        Ok(())
    }

    /// Seat a user, creating the room on first join
    pub fn subscribe_user(&self, room_id: &str, user_id: &str) -> Result<usize, SeatError> {
        let mut registry = self.registry();
        let room = registry.get_or_create(room_id, now());
        match room.join(user_id) {
            Ok(seat) => {
                let state = room.lobby_state();
                registry.mark_active(room_id);
                drop(registry);
                self.notify(Notice::LobbyState {
                    room_id: room_id.to_string(),
                    state,
                });
                Ok(seat)
            }
            Err(e) => {
                let empty = room.is_empty();
                if empty {
                    registry.mark_idle(room_id, now());
                }
                warn!("Room {}: {} could not join: {}", room_id, user_id, e);
                Err(e)
            }
        }
    }

    /// Free a user's seat. Unknown rooms or users are ignored.
    pub fn unsubscribe_user(&self, room_id: &str, user_id: &str) -> Option<usize> {
        let mut registry = self.registry();
        let Some(room) = registry.get_mut(room_id) else {
            debug!("Leave for unknown room {}", room_id);
            return None;
        };
        let seat = room.leave(user_id)?;
        let state = room.lobby_state();
        if room.is_empty() {
            registry.mark_idle(room_id, now());
        }
        drop(registry);
        self.notify(Notice::LobbyState {
            room_id: room_id.to_string(),
            state,
        });
        Some(seat)
    }

    /// Decode and apply one inbound frame. Malformed frames are dropped.
    pub fn on_message(&self, room_id: &str, user_id: &str, data: &[u8]) {
        let message = match ClientMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                debug!("Room {}: dropped frame from {}: {}", room_id, user_id, e);
                return;
            }
        };
        let reply = {
            let mut registry = self.registry();
            let Some(room) = registry.get_mut(room_id) else {
                debug!("Message for unknown room {}", room_id);
                return;
            };
            room.handle_message(user_id, message)
        };
        if let Some(reply) = reply {
            match reply.encode() {
                Ok(bytes) => self.transport.send(room_id, user_id, &bytes),
                Err(e) => warn!("Room {}: failed to encode reply: {}", room_id, e),
            }
        }
    }

    /// Tick every room once and broadcast its snapshot.
    /// Returns the rooms whose game ended during this tick.
    pub fn tick_all(&self, dt: f32, ts: u64) -> Vec<RoomId> {
        let mut ended = Vec::new();
        let mut lobby_updates = Vec::new();
        {
            let mut registry = self.registry();
            for room in registry.rooms_mut() {
                let was_ended = room.phase() == RoomPhase::Ended;
                room.tick(dt);
                let events = room.drain_events();
                log_events(room, &events);

                let message = ServerMessage::StateUpdate {
                    state: room.snapshot(),
                    ts,
                };
                match message.encode() {
                    Ok(bytes) => self.transport.broadcast(room.id(), &bytes),
                    Err(e) => warn!("Room {}: failed to encode snapshot: {}", room.id(), e),
                }

                let scored = events
                    .iter()
                    .any(|e| matches!(e, RoomEvent::Scored { .. } | RoomEvent::RoundReset));
                if !was_ended && room.phase() == RoomPhase::Ended {
                    ended.push(room.id().to_string());
                    lobby_updates.push((room.id().to_string(), room.lobby_state()));
                } else if scored {
                    lobby_updates.push((room.id().to_string(), room.lobby_state()));
                }
            }
        }
        for (room_id, state) in lobby_updates {
            self.notify(Notice::LobbyState { room_id, state });
        }
        ended
    }

    /// Close every seated connection, drop the room and tell the lobby.
    /// Returns false if the room was already gone.
    pub fn teardown(&self, room_id: &str) -> bool {
        let Some(room) = self.registry().remove(room_id) else {
            return false;
        };
        self.destroy(room_id, room);
        true
    }

    /// Like [`Gateway::teardown`], but only while the room is still `Ended`.
    /// A room that was replaced under the same id is left alone.
    pub fn teardown_ended(&self, room_id: &str) -> bool {
        let room = {
            let mut registry = self.registry();
            if registry.get(room_id).map(|r| r.phase()) != Some(RoomPhase::Ended) {
                return false;
            }
            registry.remove(room_id)
        };
        let Some(room) = room else {
            return false;
        };
        self.destroy(room_id, room);
        true
    }

    fn destroy(&self, room_id: &str, room: Room) {
        for user_id in room.seated_users() {
            self.transport.close(room_id, &user_id);
        }
        self.notify(Notice::DestroyRoom {
            room_id: room_id.to_string(),
        });
    }

    /// Tear down rooms that have had no seated player for `timeout`
    pub fn expire_idle(&self, now: Instant, timeout: Duration) -> Vec<RoomId> {
        let expired = self.registry().expired_idle(now, timeout);
        for room_id in &expired {
            info!("Room {} expired while empty", room_id);
            self.teardown(room_id);
        }
        expired
    }

    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("Lobby notifier is gone; dropping notice");
        }
    }
}

/// Current time on the tokio clock, the one idle expiry is measured against
pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

fn log_events(room: &Room, events: &[RoomEvent]) {
    for event in events {
        match event {
            RoomEvent::Scored { seat } => info!("Room {}: seat {} scored", room.id(), seat),
            RoomEvent::GameEnded { winner } => {
                info!("Room {}: game ended, winner {:?}", room.id(), winner)
            }
            RoomEvent::BrickHandedOff {
                id,
                to,
                forced: true,
            } => debug!("Room {}: brick {} forced onto {:?}", room.id(), id, to),
            other => debug!("Room {}: {:?}", room.id(), other),
        }
    }
}
