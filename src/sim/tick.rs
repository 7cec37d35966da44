//! Fixed timestep room tick
//!
//! Order per tick: input integration, collision resolution, ball boundaries
//! and movement, win check. Every step is total: an entity that cannot be
//! resolved is skipped for this tick.

use glam::Vec2;

use super::physics::{Aabb, BodyHandle, World, overlap};
use super::state::{BodyKind, BodyTag, BrickKind, RoomEvent, RoomPhase, RoomState, Side};
use super::variant::{BrickRule, EdgeRule, PaddleStyle};
use crate::consts::*;

/// Advance the room by one fixed timestep
pub fn tick(state: &mut RoomState, dt: f32) {
    if state.phase != RoomPhase::Running {
        return;
    }

    state.time_ticks += 1;

    integrate_input(state, dt);
    resolve_collisions(state);
    if let Some(conceded) = move_balls(state, dt) {
        award_point(state, conceded);
    }
    check_win(state);
}

/// Move every seated player's paddle bodies by their held direction
fn integrate_input(state: &mut RoomState, dt: f32) {
    let vertical = state.variant.vertical_travel;

    for seat in 0..state.players.len() {
        let player = &state.players[seat];
        if !player.is_seated() || player.direction.is_zero() {
            continue;
        }

        let handles: Vec<BodyHandle> = match state.variant.paddle {
            PaddleStyle::Body => player.paddle.into_iter().collect(),
            PaddleStyle::BrickSwarm => player.bricks.iter().map(|b| b.body).collect(),
        };
        if handles.is_empty() {
            continue;
        }

        // Aggregate speed does not depend on how many bodies move
        let slowdown = 1.0 / handles.len() as f32;
        let mut direction = player.direction.as_vec2();
        if !vertical {
            direction.y = 0.0;
        }
        let desired = PLAYER_SPEED * direction * dt * slowdown;

        let bounds = movement_bounds(Side::from_seat(seat), vertical);
        let delta = clamp_group_delta(&state.world, &handles, desired, bounds);
        if delta == Vec2::ZERO {
            continue;
        }
        for handle in handles {
            state.world.translate(handle, delta);
        }
    }
}

/// Rectangle a seat's moving bodies must stay inside
fn movement_bounds(side: Side, vertical: bool) -> Aabb {
    let (lo, hi) = if vertical {
        side.band()
    } else {
        (-ARENA_HALF_HEIGHT, ARENA_HALF_HEIGHT)
    };
    Aabb::new(
        Vec2::new(-ARENA_HALF_WIDTH, lo),
        Vec2::new(ARENA_HALF_WIDTH, hi),
    )
}

/// Clamp one shared displacement so that no body leaves `bounds`.
///
/// A body already outside never blocks the group and is never pushed further
/// out, so the allowed range always contains zero.
pub fn clamp_group_delta<T: Copy>(
    world: &World<T>,
    handles: &[BodyHandle],
    desired: Vec2,
    bounds: Aabb,
) -> Vec2 {
    let mut lo = -desired.abs();
    let mut hi = desired.abs();

    for &handle in handles {
        let Some(body) = world.get(handle) else {
            continue;
        };
        let aabb = body.aabb();
        lo = lo.max((bounds.min - aabb.min).min(Vec2::ZERO));
        hi = hi.min((bounds.max - aabb.max).max(Vec2::ZERO));
    }

    desired.max(lo).min(hi)
}

/// One broad-phase pass and the pairwise game rules
fn resolve_collisions(state: &mut RoomState) {
    let contacts = state.world.check_all();

    for contact in contacts {
        let (ball, other, kind) = match (contact.a_tag.kind, contact.b_tag.kind) {
            (BodyKind::Ball, kind) => (contact.a, contact.b, kind),
            (kind, BodyKind::Ball) => (contact.b, contact.a, kind),
            _ => continue,
        };
        // Earlier contacts in this pass may have moved or removed either body
        let Some(push) = ball_push(&state.world, ball, other) else {
            continue;
        };

        match kind {
            BodyKind::Paddle => ball_hits_paddle(state, ball, push),
            BodyKind::Brick(side) => ball_hits_brick(state, ball, other, side, push),
            BodyKind::Ball => {}
        }
    }
}

/// Displacement that separates `ball` from `other` as they are now
fn ball_push(world: &World<BodyTag>, ball: BodyHandle, other: BodyHandle) -> Option<Vec2> {
    overlap(world.get(other)?, world.get(ball)?)
}

/// Point the momentum away from the obstacle on the axis of least penetration
pub fn reflect(momentum: Vec2, push: Vec2) -> Vec2 {
    fn away(component: f32, push: f32) -> f32 {
        if push == 0.0 {
            -component
        } else {
            component.abs() * push.signum()
        }
    }

    let mut reflected = momentum;
    if push.x.abs() > push.y.abs() {
        reflected.x = away(momentum.x, push.x);
    } else {
        reflected.y = away(momentum.y, push.y);
    }
    reflected
}

/// Separate and reflect a ball. Returns its index if it is still live.
fn bounce_ball(state: &mut RoomState, ball_body: BodyHandle, push: Vec2) -> Option<usize> {
    let index = state.find_ball(ball_body)?;
    let ball = &mut state.balls[index];
    ball.momentum = reflect(ball.momentum, push);
    state.world.translate(ball_body, push);
    Some(index)
}

fn ball_hits_paddle(state: &mut RoomState, ball_body: BodyHandle, push: Vec2) {
    bounce_ball(state, ball_body, push);
}

fn ball_hits_brick(
    state: &mut RoomState,
    ball_body: BodyHandle,
    brick_body: BodyHandle,
    side: Side,
    push: Vec2,
) {
    let Some(ball_index) = bounce_ball(state, ball_body, push) else {
        return;
    };
    let Some(brick_index) = state.find_brick(side, brick_body) else {
        return;
    };

    if state.players[side.seat()].bricks[brick_index].kind == BrickKind::Ball {
        let ball = &state.balls[ball_index];
        let momentum = -ball.momentum;
        if let Some(center) = state.world.get(ball.body).map(|b| b.position()) {
            let id = state.spawn_ball(center, momentum);
            state.push_event(RoomEvent::BallSpawned { id });
        }
    }

    let Some((brick, old_body)) = state.remove_brick(side, brick_index) else {
        return;
    };

    let target = side.opposite();
    if state.variant.bricks == BrickRule::HandOff && target.seat() < state.players.len() {
        let handle = state.add_brick(
            target,
            brick.id,
            Vec2::new(old_body.position().x, target.rail_y()),
            old_body.scale(),
            BrickKind::Normal,
            brick.tint,
        );
        let forced = handle.is_some_and(|h| !settle_placement(&mut state.world, h, target));
        if forced {
            log::debug!("Hand-off brick {} force-placed on side {:?}", brick.id, target);
        }
        state.push_event(RoomEvent::BrickHandedOff {
            id: brick.id,
            to: target,
            forced,
        });
    } else {
        state.push_event(RoomEvent::BrickDestroyed { id: brick.id, side });
    }
}

/// Nudge a freshly placed brick toward the arena centre until it overlaps
/// nothing. Gives up after a fixed number of steps and restores the rail
/// position. Returns whether a free spot was found.
fn settle_placement(world: &mut World<BodyTag>, handle: BodyHandle, side: Side) -> bool {
    let Some(start) = world.get(handle).map(|b| b.position()) else {
        return false;
    };
    let step = Vec2::new(0.0, NUDGE_STEP * side.inward());

    for _ in 0..MAX_PLACEMENT_NUDGES {
        if !world.overlaps_any(handle) {
            return true;
        }
        world.translate(handle, step);
    }
    if !world.overlaps_any(handle) {
        return true;
    }

    world.set_position(handle, start);
    false
}

/// Wall bounces, then ball integration.
///
/// Returns the side that conceded if a ball crossed a scoring edge; the
/// remaining balls are left in place since the round is about to reset.
fn move_balls(state: &mut RoomState, dt: f32) -> Option<Side> {
    let top = state.variant.top_edge;
    let bottom = state.variant.bottom_edge;

    for ball in &mut state.balls {
        let Some(mut pos) = state.world.get(ball.body).map(|b| b.position()) else {
            continue;
        };
        let mut momentum = ball.momentum;

        if pos.x > ARENA_HALF_WIDTH {
            pos.x = ARENA_HALF_WIDTH;
            momentum.x = -momentum.x.abs();
        }
        if pos.x < -ARENA_HALF_WIDTH {
            pos.x = -ARENA_HALF_WIDTH;
            momentum.x = momentum.x.abs();
        }
        if pos.y > ARENA_HALF_HEIGHT {
            match bottom {
                EdgeRule::Bounce => {
                    pos.y = ARENA_HALF_HEIGHT;
                    momentum.y = -momentum.y.abs();
                }
                EdgeRule::Score => return Some(Side::A),
            }
        }
        if pos.y < -ARENA_HALF_HEIGHT {
            match top {
                EdgeRule::Bounce => {
                    pos.y = -ARENA_HALF_HEIGHT;
                    momentum.y = momentum.y.abs();
                }
                EdgeRule::Score => return Some(Side::B),
            }
        }

        ball.momentum = momentum;
        state.world.set_position(ball.body, pos + momentum * dt);
    }

    None
}

/// Credit the seat opposing `conceded` and reset the round
fn award_point(state: &mut RoomState, conceded: Side) {
    let scorer = conceded.opposite().seat();
    match state.players.get_mut(scorer) {
        Some(player) => {
            player.score += 1;
            log::info!("Seat {} scores ({})", scorer, player.score);
            state.push_event(RoomEvent::Scored { seat: scorer });
        }
        None => log::debug!("Ball lost on side {:?}, no opposing seat", conceded),
    }
    state.reset_round();
}

fn check_win(state: &mut RoomState) {
    let Some(target) = state.variant.winning_score else {
        return;
    };
    if state.phase == RoomPhase::Ended {
        return;
    }
    if let Some(winner) = state.players.iter().position(|p| p.score >= target) {
        state.phase = RoomPhase::Ended;
        log::info!("Seat {} reached {} points, game over", winner, target);
        state.push_event(RoomEvent::GameEnded {
            winner: Some(winner),
        });
    }
}
