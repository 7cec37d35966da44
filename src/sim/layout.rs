//! Canonical initial layouts
//!
//! Each preset seeds bricks, balls and paddles at fixed positions. Only the
//! brick tints come from the room RNG.

use glam::Vec2;

use super::state::{BrickKind, RoomState, Side};
use super::variant::{PaddleStyle, VariantPreset};
use crate::consts::*;

/// Populate an empty room with the layout for its variant
pub fn populate(state: &mut RoomState) {
    match state.variant.preset {
        VariantPreset::Handoff => handoff_layout(state),
        VariantPreset::Duel => duel_layout(state),
        VariantPreset::Solo => solo_layout(state),
    }

    if state.variant.paddle == PaddleStyle::Body {
        for seat in 0..state.players.len() {
            let side = Side::from_seat(seat);
            // Paddle sits on the rail, on the arena side of the line
            let y = match side {
                Side::A => side.rail_y(),
                Side::B => side.rail_y() - PADDLE_HEIGHT,
            };
            let x = match state.variant.preset {
                VariantPreset::Solo => 0.0,
                _ => -PADDLE_WIDTH / 2.0,
            };
            state.set_paddle(seat, Vec2::new(x, y), PADDLE_WIDTH, PADDLE_HEIGHT);
        }
    }
}

fn place(state: &mut RoomState, side: Side, id: u32, x: f32, y: f32, scale: Vec2, kind: BrickKind) {
    let tint = state.random_tint();
    state.add_brick(side, id, Vec2::new(x, y), scale, kind, tint);
}

/// Three-brick swarms on each rail, one serve toward side B
fn handoff_layout(state: &mut RoomState) {
    let a = Side::A.rail_y();
    let b = Side::B.rail_y();

    place(state, Side::A, 0, 0.0, a, Vec2::new(1.0, 4.0), BrickKind::Normal);
    place(state, Side::A, 1, -BRICK_WIDTH, a, Vec2::ONE, BrickKind::Normal);
    place(state, Side::A, 2, BRICK_WIDTH, a, Vec2::ONE, BrickKind::Normal);

    place(state, Side::B, 3, 0.0, b, Vec2::new(1.0, 4.0), BrickKind::Normal);
    place(state, Side::B, 4, BRICK_WIDTH / 2.0, b, Vec2::new(0.5, 1.0), BrickKind::Normal);
    place(state, Side::B, 5, -BRICK_WIDTH, b, Vec2::ONE, BrickKind::Normal);

    state.spawn_ball(Vec2::new(0.0, 100.0), Vec2::new(BALL_SPEED, -BALL_SPEED));
}

/// Two mirrored brick walls across the centre line, one serve toward side A
fn duel_layout(state: &mut RoomState) {
    const COLUMNS: u32 = 6;
    const ROWS: u32 = 2;
    let left = -BRICK_WIDTH * COLUMNS as f32 / 2.0;

    let mut id = 0;
    for side in [Side::A, Side::B] {
        for row in 0..ROWS {
            // Row 0 is closest to the centre line
            let offset = 24.0 + row as f32 * (BRICK_HEIGHT * 2.0);
            let y = match side {
                Side::A => offset,
                Side::B => -offset - BRICK_HEIGHT,
            };
            for col in 0..COLUMNS {
                let kind = if row == 0 && col == 2 {
                    BrickKind::Ball
                } else {
                    BrickKind::Normal
                };
                let x = left + col as f32 * BRICK_WIDTH;
                place(state, side, id, x, y, Vec2::ONE, kind);
                id += 1;
            }
        }
    }

    state.spawn_ball(Vec2::ZERO, Vec2::new(BALL_SPEED, BALL_SPEED));
}

/// Brick grid under the top edge, ball served upward
fn solo_layout(state: &mut RoomState) {
    const ROWS: u32 = 3;
    let columns = (ARENA_HALF_WIDTH * 2.0 / BRICK_WIDTH) as u32;

    let mut id = 0;
    for row in 0..ROWS {
        let y = -ARENA_HALF_HEIGHT + 20.0 + row as f32 * (BRICK_HEIGHT * 2.0);
        for col in 0..columns {
            let kind = if id % 7 == 3 {
                BrickKind::Ball
            } else {
                BrickKind::Normal
            };
            let x = -ARENA_HALF_WIDTH + col as f32 * BRICK_WIDTH;
            place(state, Side::A, id, x, y, Vec2::ONE, kind);
            id += 1;
        }
    }

    state.spawn_ball(Vec2::new(0.0, 100.0), Vec2::new(BALL_SPEED, -BALL_SPEED));
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::sim::state::BodyKind;

    fn brick_ids(state: &RoomState) -> Vec<u32> {
        state
            .players
            .iter()
            .flat_map(|p| p.bricks.iter().map(|b| b.id))
            .collect()
    }

    #[test]
    fn test_handoff_layout_matches_rails() {
        let state = RoomState::new(VariantPreset::Handoff.variant(), 1);
        assert_eq!(state.players[0].bricks.len(), 3);
        assert_eq!(state.players[1].bricks.len(), 3);
        assert_eq!(state.balls.len(), 1);
        assert!(state.players.iter().all(|p| p.paddle.is_none()));

        for brick in &state.players[1].bricks {
            let body = state.world.get(brick.body).unwrap();
            assert_eq!(body.tag().kind, BodyKind::Brick(Side::B));
            assert_eq!(body.position().y, -RAIL_Y);
        }
    }

    #[test]
    fn test_brick_ids_unique_in_every_layout() {
        for preset in [VariantPreset::Handoff, VariantPreset::Duel, VariantPreset::Solo] {
            let state = RoomState::new(preset.variant(), 3);
            let ids = brick_ids(&state);
            let unique: HashSet<_> = ids.iter().collect();
            assert_eq!(ids.len(), unique.len(), "{:?}", preset);
            assert_eq!(state.next_brick_id() as usize, ids.len());
        }
    }

    #[test]
    fn test_body_paddles_inside_arena() {
        for preset in [VariantPreset::Duel, VariantPreset::Solo] {
            let state = RoomState::new(preset.variant(), 3);
            for player in &state.players {
                let body = state.world.get(player.paddle.unwrap()).unwrap();
                let aabb = body.aabb();
                assert!(aabb.min.x >= -ARENA_HALF_WIDTH && aabb.max.x <= ARENA_HALF_WIDTH);
                assert!(aabb.min.y >= -ARENA_HALF_HEIGHT && aabb.max.y <= ARENA_HALF_HEIGHT);
            }
        }
    }

    #[test]
    fn test_layout_has_ball_bricks() {
        let state = RoomState::new(VariantPreset::Solo.variant(), 3);
        assert!(
            state.players[0]
                .bricks
                .iter()
                .any(|b| b.kind == BrickKind::Ball)
        );
    }

    #[test]
    fn test_tints_are_seeded() {
        let a = RoomState::new(VariantPreset::Duel.variant(), 42);
        let b = RoomState::new(VariantPreset::Duel.variant(), 42);
        let tints = |s: &RoomState| -> Vec<u32> {
            s.players.iter().flat_map(|p| p.bricks.iter().map(|b| b.tint)).collect()
        };
        assert_eq!(tints(&a), tints(&b));
        assert!(tints(&a).iter().all(|t| BRICK_TINTS.contains(t)));
    }
}
