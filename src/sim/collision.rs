//! Physics response for units
//!
//! Knockback integration, pairwise unit separation and playfield clamping.
//! Every displacement is checked against the tile grid for the moving unit's
//! own team, so barriers stay passable for their owners only.

use glam::Vec2;

use super::state::Unit;
use super::tiles::TileMap;
use crate::consts::*;
use crate::direction_or_fallback;

/// Reflect a velocity about a surface normal
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Apply and decay a unit's knockback
///
/// A blocked destination cancels the knockback outright; otherwise the unit
/// moves and the vector decays, snapping to zero once negligible.
pub fn integrate_knockback(unit: &mut Unit, map: &TileMap, mult: f32) {
    let knockback = unit.status.knockback;
    if knockback == Vec2::ZERO {
        return;
    }
    let dest = unit.pos + knockback * mult;
    if map.is_blocked_for(dest, unit.team) {
        unit.status.knockback = Vec2::ZERO;
        return;
    }
    unit.pos = dest;
    let decayed = knockback * KNOCKBACK_DECAY.powf(mult);
    unit.status.knockback = if decayed.length() < KNOCKBACK_EPSILON {
        Vec2::ZERO
    } else {
        decayed
    };
}

/// Push overlapping living units apart (O(n²), stable order)
///
/// Each side takes half the overlap, and only if its own destination is
/// passable for its team.
pub fn separate_units(units: &mut [Unit], map: &TileMap) {
    let min_dist = UNIT_RADIUS * 2.0;
    for i in 0..units.len() {
        for j in (i + 1)..units.len() {
            if !units[i].is_alive() || !units[j].is_alive() {
                continue;
            }
            let delta = units[j].pos - units[i].pos;
            let dist = delta.length();
            if dist >= min_dist {
                continue;
            }
            let push = direction_or_fallback(delta) * ((min_dist - dist) * 0.5);
            let (left, right) = units.split_at_mut(j);
            let a = &mut left[i];
            let b = &mut right[0];
            let a_dest = a.pos - push;
            if !map.is_blocked_for(a_dest, a.team) {
                a.pos = a_dest;
            }
            let b_dest = b.pos + push;
            if !map.is_blocked_for(b_dest, b.team) {
                b.pos = b_dest;
            }
        }
    }
}

/// Keep a unit inside the playfield, turning excursions into inward knockback
pub fn clamp_to_bounds(unit: &mut Unit, bounds: Vec2) {
    let min = Vec2::splat(UNIT_RADIUS);
    let max = (bounds - Vec2::splat(UNIT_RADIUS)).max(min);
    if unit.pos.x < min.x {
        unit.pos.x = min.x;
        unit.status.knockback.x = BOUNDS_BOUNCE_IMPULSE;
    } else if unit.pos.x > max.x {
        unit.pos.x = max.x;
        unit.status.knockback.x = -BOUNDS_BOUNCE_IMPULSE;
    }
    if unit.pos.y < min.y {
        unit.pos.y = min.y;
        unit.status.knockback.y = BOUNDS_BOUNCE_IMPULSE;
    } else if unit.pos.y > max.y {
        unit.pos.y = max.y;
        unit.status.knockback.y = -BOUNDS_BOUNCE_IMPULSE;
    }
}
