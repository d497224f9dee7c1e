//! Demo arena generator
//!
//! Builds a playable map for the headless runner and the integration tests.
//! Layout "randomness" is a hash of the cell index and the layout seed, so
//! the same seed always yields the same arena without touching the match RNG.

use super::state::{Team, World};
use super::tiles::{Cell, Direction, Tile, TileMap};
use super::weapons::WeaponKind;
use crate::consts::*;
use crate::polar_to_cartesian;

pub const ARENA_COLUMNS: u32 = 30;
pub const ARENA_ROWS: u32 = 20;
pub const MAX_TEAMS: u8 = 4;

/// Cells around a base kept clear of generated features
const BASE_CLEARANCE: i32 = 3;
/// Distance from a nexus at which its units spawn
const SPAWN_RING: f32 = TILE_SIZE * 2.0;

/// Home cell of each team, in team order
const ANCHORS: [Cell; MAX_TEAMS as usize] = [
    Cell::new(3, 3),
    Cell::new(26, 16),
    Cell::new(26, 3),
    Cell::new(3, 16),
];

fn layout_hash(seed: u64, salt: u64) -> u32 {
    (salt.wrapping_mul(2654435761).wrapping_add(seed) as u32).wrapping_mul(2246822519) >> 7
}

fn near_base(cell: Cell, teams: u8) -> bool {
    ANCHORS[..teams as usize]
        .iter()
        .any(|a| (a.col - cell.col).abs() <= BASE_CLEARANCE && (a.row - cell.row).abs() <= BASE_CLEARANCE)
}

fn feature(h: u32) -> Tile {
    match h % 100 {
        0..=3 => Tile::Wall,
        4..=5 => Tile::DestructibleWall { structural_hp: 60.0 },
        6..=7 => Tile::Lava,
        8..=10 => Tile::Mud,
        11 => Tile::HealPack,
        12 => Tile::LevelUp,
        13 => Tile::Conveyor {
            direction: match (h / 100) % 4 {
                0 => Direction::North,
                1 => Direction::East,
                2 => Direction::South,
                _ => Direction::West,
            },
        },
        _ => Tile::Floor,
    }
}

/// Generate a `teams`-way arena (clamped to 1..=4) with one nexus per team
pub fn demo_arena(teams: u8, units_per_team: u32, layout_seed: u64) -> World {
    let teams = teams.clamp(1, MAX_TEAMS);
    let mut map = TileMap::new(ARENA_COLUMNS, ARENA_ROWS);

    for row in 0..ARENA_ROWS as i32 {
        for col in 0..ARENA_COLUMNS as i32 {
            let cell = Cell::new(col, row);
            if near_base(cell, teams) {
                continue;
            }
            let index = (row as u32 * ARENA_COLUMNS + col as u32) as u64;
            map.set(cell, feature(layout_hash(layout_seed, index)));
        }
    }
    let middle = Cell::new(ARENA_COLUMNS as i32 / 2, ARENA_ROWS as i32 / 2);
    if layout_hash(layout_seed, 9_999) % 2 == 0 {
        map.set(middle, Tile::Cloner { replication_count: 2 });
    }

    let mut world = World::new(map);
    for (t, anchor) in ANCHORS[..teams as usize].iter().enumerate() {
        let team = Team(t as u8);
        let home = anchor.center();
        world.place_nexus(team, home);
        for k in 0..units_per_team {
            let angle = std::f32::consts::TAU * k as f32 / units_per_team.max(1) as f32;
            world.spawn_unit(team, home + polar_to_cartesian(SPAWN_RING, angle));
        }
    }

    // A few weapons on open floor, one per team
    let mut placed = 0;
    let mut salt = 20_000u64;
    while placed < teams as usize && salt < 20_500 {
        let h = layout_hash(layout_seed, salt);
        salt += 1;
        let cell = Cell::new(
            (h % ARENA_COLUMNS) as i32,
            ((h / ARENA_COLUMNS) % ARENA_ROWS) as i32,
        );
        if near_base(cell, teams) || world.map.get(cell) != Some(Tile::Floor) {
            continue;
        }
        let kind = WeaponKind::DROPPABLE[(h as usize / 7) % WeaponKind::DROPPABLE.len()];
        world.place_weapon(kind, cell.center());
        placed += 1;
    }

    log::info!(
        "Arena {}x{}: {} teams, {} units, {} weapons (layout seed {})",
        ARENA_COLUMNS,
        ARENA_ROWS,
        teams,
        world.units.len(),
        world.weapons.len(),
        layout_seed
    );
    world
}
