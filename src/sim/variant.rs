//! Game variant rules
//!
//! One configurable simulation covers every arcade mode. A [`Variant`] is a
//! plain rules object; [`VariantPreset`] names the shipped combinations.

use serde::{Deserialize, Serialize};

/// How a player's movement input is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaddleStyle {
    /// A single paddle body per seat
    Body,
    /// The seat's bricks move together and act as the paddle surface
    BrickSwarm,
}

/// What happens to a brick struck by a ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrickRule {
    /// The brick is consumed
    Destroy,
    /// The brick is consumed and re-created on the opposing rail
    HandOff,
}

/// Behaviour of the top or bottom arena edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeRule {
    /// Reflect the ball back into the arena
    Bounce,
    /// The defending seat concedes a point and the round resets
    Score,
}

/// Named rule sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VariantPreset {
    /// Two seats whose brick swarms trade bricks on every hit
    #[default]
    Handoff,
    /// Two seats, ready gate, scoring edges, first to the winning score
    Duel,
    /// One seat breakout
    Solo,
}

impl VariantPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantPreset::Handoff => "handoff",
            VariantPreset::Duel => "duel",
            VariantPreset::Solo => "solo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "handoff" | "hand-off" => Some(VariantPreset::Handoff),
            "duel" | "pong" => Some(VariantPreset::Duel),
            "solo" | "breakout" => Some(VariantPreset::Solo),
            _ => None,
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            VariantPreset::Handoff => Variant {
                preset: *self,
                seats: 2,
                ready_gate: false,
                paddle: PaddleStyle::BrickSwarm,
                bricks: BrickRule::HandOff,
                vertical_travel: true,
                top_edge: EdgeRule::Bounce,
                bottom_edge: EdgeRule::Bounce,
                winning_score: None,
            },
            VariantPreset::Duel => Variant {
                preset: *self,
                seats: 2,
                ready_gate: true,
                paddle: PaddleStyle::Body,
                bricks: BrickRule::Destroy,
                vertical_travel: false,
                top_edge: EdgeRule::Score,
                bottom_edge: EdgeRule::Score,
                winning_score: Some(5),
            },
            VariantPreset::Solo => Variant {
                preset: *self,
                seats: 1,
                ready_gate: false,
                paddle: PaddleStyle::Body,
                bricks: BrickRule::Destroy,
                vertical_travel: false,
                top_edge: EdgeRule::Bounce,
                bottom_edge: EdgeRule::Score,
                winning_score: None,
            },
        }
    }
}

/// Rules for one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Layout family used by the canonical initializer
    pub preset: VariantPreset,
    /// Number of seats (1 or 2)
    pub seats: usize,
    /// Every seated player must signal ready before a round runs
    pub ready_gate: bool,
    pub paddle: PaddleStyle,
    pub bricks: BrickRule,
    /// Paddles may move along y inside their rail band
    pub vertical_travel: bool,
    /// Edge at min y, defended by seat 1
    pub top_edge: EdgeRule,
    /// Edge at max y, defended by seat 0
    pub bottom_edge: EdgeRule,
    /// Score that ends the game, if any
    pub winning_score: Option<u32>,
}

impl Default for Variant {
    fn default() -> Self {
        VariantPreset::default().variant()
    }
}

impl Variant {
    /// Override the winning score (`Some(0)` is treated as no limit)
    pub fn with_winning_score(mut self, score: Option<u32>) -> Self {
        self.winning_score = score.filter(|&s| s > 0);
        self
    }

    /// Seat count clamped to the supported range
    pub fn seat_count(&self) -> usize {
        self.seats.clamp(1, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parse_round_trip() {
        for preset in [VariantPreset::Handoff, VariantPreset::Duel, VariantPreset::Solo] {
            assert_eq!(VariantPreset::parse(preset.as_str()), Some(preset));
        }
        assert_eq!(VariantPreset::parse(" Breakout "), Some(VariantPreset::Solo));
        assert_eq!(VariantPreset::parse("chess"), None);
    }

    #[test]
    fn test_winning_score_zero_disables_limit() {
        let variant = VariantPreset::Duel.variant().with_winning_score(Some(0));
        assert_eq!(variant.winning_score, None);
        let variant = VariantPreset::Handoff.variant().with_winning_score(Some(3));
        assert_eq!(variant.winning_score, Some(3));
    }

    #[test]
    fn test_seat_count_is_clamped() {
        let mut variant = Variant::default();
        variant.seats = 7;
        assert_eq!(variant.seat_count(), 2);
        variant.seats = 0;
        assert_eq!(variant.seat_count(), 1);
    }
}
