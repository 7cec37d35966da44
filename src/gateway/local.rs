//! In-process collaborators for local play and tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CollaboratorError, LobbyService, TokenVerifier, Transport};
use crate::UserId;
use crate::lobby::LobbyState;

/// Accepts any non-blank token as the user id
#[derive(Debug, Clone, Copy, Default)]
pub struct DevTokenVerifier;

impl TokenVerifier for DevTokenVerifier {
    fn verify(&self, token: &str) -> Option<UserId> {
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

/// One outbound transport operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send {
        room_id: String,
        user_id: String,
        data: Vec<u8>,
    },
    Broadcast {
        room_id: String,
        data: Vec<u8>,
    },
    Close {
        room_id: String,
        user_id: String,
    },
}

/// Forwards every operation onto a channel
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelTransport {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, op: Outbound) {
        if self.tx.send(op).is_err() {
            log::debug!("Transport receiver dropped");
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, room_id: &str, user_id: &str, data: &[u8]) {
        self.push(Outbound::Send {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            data: data.to_vec(),
        });
    }

    fn broadcast(&self, room_id: &str, data: &[u8]) {
        self.push(Outbound::Broadcast {
            room_id: room_id.to_string(),
            data: data.to_vec(),
        });
    }

    fn close(&self, room_id: &str, user_id: &str) {
        self.push(Outbound::Close {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        });
    }
}

/// Keeps every operation in memory
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Outbound>>,
}

impl RecordingTransport {
    /// Take everything recorded so far
    pub fn take(&self) -> Vec<Outbound> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn push(&self, op: Outbound) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(op),
            Err(poisoned) => poisoned.into_inner().push(op),
        }
    }
}

impl Transport for RecordingTransport {
    fn send(&self, room_id: &str, user_id: &str, data: &[u8]) {
        self.push(Outbound::Send {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            data: data.to_vec(),
        });
    }

    fn broadcast(&self, room_id: &str, data: &[u8]) {
        self.push(Outbound::Broadcast {
            room_id: room_id.to_string(),
            data: data.to_vec(),
        });
    }

    fn close(&self, room_id: &str, user_id: &str) {
        self.push(Outbound::Close {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        });
    }
}

/// Lobby that only logs. `failing()` rejects every call.
#[derive(Debug, Default)]
pub struct LoggingLobby {
    fail: bool,
    calls: AtomicUsize,
}

impl LoggingLobby {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn record(&self) -> Result<(), CollaboratorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            Err(CollaboratorError::Unavailable("lobby offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LobbyService for LoggingLobby {
    async fn set_lobby_state(
        &self,
        room_id: &str,
        state: &LobbyState,
    ) -> Result<(), CollaboratorError> {
        self.record()?;
        log::info!(
            "Lobby {}: {:?} seats={:?} scores={:?}",
            room_id,
            state.phase,
            state.seats,
            state.scores
        );
        Ok(())
    }

    async fn destroy_room(&self, room_id: &str) -> Result<(), CollaboratorError> {
        self.record()?;
        log::info!("Lobby {}: destroyed", room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_transport_forwards() {
        let (transport, mut rx) = ChannelTransport::channel();
        transport.broadcast("r1", b"hi");
        transport.close("r1", "alice");
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Broadcast {
                room_id: "r1".into(),
                data: b"hi".to_vec()
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Close { .. }));
    }

    #[tokio::test]
    async fn test_logging_lobby_counts_calls() {
        let lobby = LoggingLobby::default();
        lobby.destroy_room("r1").await.unwrap();
        assert_eq!(lobby.calls(), 1);
        assert!(LoggingLobby::failing().destroy_room("r1").await.is_err());
    }
}
