//! Sight lines, safe-cell search and look-ahead steering

use glam::Vec2;

use super::hazards::hazard_at;
use super::state::{Team, World};
use super::tiles::TileMap;
use crate::consts::*;
use crate::rotate;

/// Sample spacing for line-of-sight checks
const SIGHT_STEP: f32 = TILE_SIZE / 4.0;

/// Whether no sight-blocking tile lies between two points
pub fn line_of_sight(map: &TileMap, from: Vec2, to: Vec2) -> bool {
    let delta = to - from;
    let samples = (delta.length() / SIGHT_STEP).ceil() as u32;
    (1..samples).all(|i| {
        let p = from + delta * (i as f32 / samples as f32);
        map.tile_at(p).is_some_and(|t| !t.blocks_sight())
    })
}

/// Centre of the nearest cell a unit of `team` can stand in that is outside
/// every active hazard region. Ties go to the first cell in row-major order.
pub fn nearest_safe_cell(world: &World, pos: Vec2, team: Team) -> Option<Vec2> {
    world
        .map
        .cells()
        .filter(|(_, tile)| !tile.blocks_unit(team))
        .map(|(cell, _)| cell.center())
        .filter(|center| !hazard_at(world, *center, team))
        .min_by(|a, b| {
            a.distance_squared(pos)
                .partial_cmp(&b.distance_squared(pos))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Deflect `desired` around hazardous tiles ahead
///
/// Tries ±60°, the side closer to `previous_heading` first (ties go to the
/// positive rotation). Returns `desired` unchanged when nothing is ahead or
/// neither side is clear.
pub fn steer(map: &TileMap, pos: Vec2, desired: Vec2, previous_heading: Vec2, team: Team) -> Vec2 {
    let clear = |dir: Vec2| {
        let probe = pos + dir * STEER_LOOKAHEAD;
        !map.is_hazard_at(probe) && !map.is_blocked_for(probe, team)
    };
    if !map.is_hazard_at(pos + desired * STEER_LOOKAHEAD) {
        return desired;
    }
    let left = rotate(desired, STEER_DEFLECTION);
    let right = rotate(desired, -STEER_DEFLECTION);
    let (first, second) = if right.dot(previous_heading) > left.dot(previous_heading) {
        (right, left)
    } else {
        (left, right)
    };
    if clear(first) {
        first
    } else if clear(second) {
        second
    } else {
        desired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::tiles::{Cell, Tile};

    #[test]
    fn test_wall_blocks_sight() {
        let mut map = TileMap::new(10, 3);
        let a = Cell::new(1, 1).center();
        let b = Cell::new(8, 1).center();
        assert!(line_of_sight(&map, a, b));
        map.set(Cell::new(5, 1), Tile::Wall);
        assert!(!line_of_sight(&map, a, b));
        map.set(Cell::new(5, 1), Tile::Barrier { team: Team(0) });
        assert!(line_of_sight(&map, a, b));
    }

    #[test]
    fn test_nearest_safe_cell_skips_lava_and_walls() {
        let mut world = World::new(TileMap::new(5, 1));
        world.map.set(Cell::new(0, 0), Tile::Lava);
        world.map.set(Cell::new(1, 0), Tile::Lava);
        world.map.set(Cell::new(2, 0), Tile::Wall);
        let safe = nearest_safe_cell(&world, Cell::new(0, 0).center(), Team(0));
        assert_eq!(safe, Some(Cell::new(3, 0).center()));
    }

    #[test]
    fn test_safe_cell_tie_goes_to_row_major_first() {
        let world = World::new(TileMap::new(3, 1));
        let between = Vec2::new(TILE_SIZE, TILE_SIZE / 2.0);
        assert_eq!(nearest_safe_cell(&world, between, Team(0)), Some(Cell::new(0, 0).center()));
    }

    #[test]
    fn test_steer_deflects_toward_previous_heading() {
        let mut map = TileMap::new(10, 10);
        map.set(Cell::new(6, 5), Tile::Lava);
        let pos = Cell::new(5, 5).center();
        let up = Vec2::new(0.0, -1.0);
        let steered = steer(&map, pos, Vec2::X, up, Team(0));
        assert!(steered.y < 0.0);
        let down = Vec2::new(0.0, 1.0);
        let steered = steer(&map, pos, Vec2::X, down, Team(0));
        assert!(steered.y > 0.0);
    }

    #[test]
    fn test_steer_passes_through_when_clear() {
        let map = TileMap::new(10, 10);
        let pos = Cell::new(5, 5).center();
        assert_eq!(steer(&map, pos, Vec2::X, Vec2::Y, Team(0)), Vec2::X);
    }
}
