//! Lobby-facing room metadata
//!
//! The lobby service stores a small summary per room so matchmaking can show
//! seat occupancy and final results. Writes are best-effort.

use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::sim::{RoomPhase, Variant, VariantPreset};

/// Summary pushed to the lobby on seat changes and at the end of a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyState {
    pub variant: VariantPreset,
    pub phase: RoomPhase,
    /// One entry per seat, `None` while free
    pub seats: Vec<Option<UserId>>,
    pub scores: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<UserId>,
}

impl LobbyState {
    pub fn open_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_joinable(&self) -> bool {
        self.phase != RoomPhase::Ended && self.open_seats() > 0
    }
}

/// Options chosen by the room creator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialConfig {
    #[serde(default)]
    pub variant: Option<VariantPreset>,
    #[serde(default)]
    pub winning_score: Option<u32>,
}

impl InitialConfig {
    /// Resolve the room rules, falling back to `default` for unset fields
    pub fn resolve(&self, default: &Variant) -> Variant {
        let variant = match self.variant {
            Some(preset) if preset != default.preset => preset.variant(),
            _ => default.clone(),
        };
        match self.winning_score {
            Some(score) => variant.with_winning_score(Some(score)),
            None => variant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_config_resolution() {
        let default = VariantPreset::Handoff.variant();
        assert_eq!(InitialConfig::default().resolve(&default), default);

        let config: InitialConfig =
            serde_json::from_str(r#"{"variant":"duel","winningScore":3}"#).unwrap();
        let variant = config.resolve(&default);
        assert_eq!(variant.preset, VariantPreset::Duel);
        assert_eq!(variant.winning_score, Some(3));
    }

    #[test]
    fn test_joinable() {
        let mut state = LobbyState {
            variant: VariantPreset::Duel,
            phase: RoomPhase::WaitingForPlayers,
            seats: vec![Some("alice".into()), None],
            scores: vec![0, 0],
            winner: None,
        };
        assert!(state.is_joinable());
        state.seats[1] = Some("bob".into());
        assert!(!state.is_joinable());
    }
}
