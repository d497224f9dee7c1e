//! Tile grid accessor
//!
//! The map is supplied by the editor/persistence layer as a row-major grid of
//! tile descriptors. The simulation mostly reads it; the only writes are
//! destructible walls losing structural points and self-consuming tiles
//! reverting to floor.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::Team;
use crate::consts::TILE_SIZE;

/// Grid direction used by conveyor tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Unit vector in world space (rows grow downward)
    pub fn vector(self) -> Vec2 {
        match self {
            Direction::North => Vec2::new(0.0, -1.0),
            Direction::East => Vec2::new(1.0, 0.0),
            Direction::South => Vec2::new(0.0, 1.0),
            Direction::West => Vec2::new(-1.0, 0.0),
        }
    }
}

/// Tile descriptor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tile {
    #[default]
    Floor,
    Wall,
    DestructibleWall { structural_hp: f32 },
    Lava,
    Mud,
    Conveyor { direction: Direction },
    HealPack,
    LevelUp,
    Cloner { replication_count: u32 },
    /// Passable only for the owning team
    Barrier { team: Team },
}

impl Tile {
    /// Whether a unit of `team` collides with this tile
    pub fn blocks_unit(&self, team: Team) -> bool {
        match self {
            Tile::Wall | Tile::DestructibleWall { .. } => true,
            Tile::Barrier { team: owner } => *owner != team,
            _ => false,
        }
    }

    pub fn blocks_projectile(&self) -> bool {
        matches!(self, Tile::Wall | Tile::DestructibleWall { .. })
    }

    pub fn blocks_sight(&self) -> bool {
        self.blocks_projectile()
    }

    /// Tiles units flee from and steer around
    pub fn is_hazard(&self) -> bool {
        matches!(self, Tile::Lava)
    }

    /// Tiles that trigger once on entry and then change
    pub fn is_consumable(&self) -> bool {
        matches!(self, Tile::HealPack | Tile::LevelUp | Tile::Cloner { .. })
    }
}

/// Integer grid coordinate; may be out of bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// World-space centre of the cell
    pub fn center(self) -> Vec2 {
        Vec2::new(
            (self.col as f32 + 0.5) * TILE_SIZE,
            (self.row as f32 + 0.5) * TILE_SIZE,
        )
    }
}

/// Result of damaging a tile's structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallDamage {
    /// Tile has no structural points
    Indestructible,
    Damaged,
    /// Structural points ran out; the tile is now floor
    Destroyed,
}

/// Row-major tile grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMap {
    columns: u32,
    rows: u32,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// All-floor map
    pub fn new(columns: u32, rows: u32) -> Self {
        Self {
            columns,
            rows,
            tiles: vec![Tile::Floor; (columns * rows) as usize],
        }
    }

    /// Build from rows; short rows are padded with floor
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Self {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let row_count = rows.len();
        let mut tiles = Vec::with_capacity(columns * row_count);
        for mut row in rows {
            row.resize(columns, Tile::Floor);
            tiles.extend(row);
        }
        Self {
            columns: columns as u32,
            rows: row_count as u32,
            tiles,
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Playfield width in world units
    pub fn width(&self) -> f32 {
        self.columns as f32 * TILE_SIZE
    }

    /// Playfield height in world units
    pub fn height(&self) -> f32 {
        self.rows as f32 * TILE_SIZE
    }

    /// Cell containing a world position (floor division)
    pub fn cell_at(&self, pos: Vec2) -> Cell {
        Cell::new(
            (pos.x / TILE_SIZE).floor() as i32,
            (pos.y / TILE_SIZE).floor() as i32,
        )
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        if cell.col < 0 || cell.row < 0 {
            return None;
        }
        let (col, row) = (cell.col as u32, cell.row as u32);
        if col >= self.columns || row >= self.rows {
            return None;
        }
        Some((row * self.columns + col) as usize)
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.index(cell).is_some()
    }

    /// Tile at a cell, `None` outside the grid
    pub fn get(&self, cell: Cell) -> Option<Tile> {
        self.index(cell).map(|i| self.tiles[i])
    }

    /// Tile under a world position, `None` outside the grid
    pub fn tile_at(&self, pos: Vec2) -> Option<Tile> {
        self.get(self.cell_at(pos))
    }

    /// Replace a tile; returns false outside the grid
    pub fn set(&mut self, cell: Cell, tile: Tile) -> bool {
        match self.index(cell) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Whether a unit of `team` may stand at `pos` (outside the grid is blocked)
    pub fn is_blocked_for(&self, pos: Vec2, team: Team) -> bool {
        self.tile_at(pos).is_none_or(|t| t.blocks_unit(team))
    }

    /// Whether the tile under `pos` is hazardous
    pub fn is_hazard_at(&self, pos: Vec2) -> bool {
        self.tile_at(pos).is_some_and(|t| t.is_hazard())
    }

    /// Remove structural points from a destructible wall
    pub fn damage_wall(&mut self, cell: Cell, amount: f32) -> WallDamage {
        let Some(i) = self.index(cell) else {
            return WallDamage::Indestructible;
        };
        match &mut self.tiles[i] {
            Tile::DestructibleWall { structural_hp } => {
                *structural_hp -= amount.max(0.0);
                if *structural_hp <= 0.0 {
                    self.tiles[i] = Tile::Floor;
                    WallDamage::Destroyed
                } else {
                    WallDamage::Damaged
                }
            }
            _ => WallDamage::Indestructible,
        }
    }

    /// Consume a self-consuming tile, returning what was there.
    ///
    /// Heal packs and level-ups revert to floor; cloners lose one charge and
    /// revert once empty. Any other tile is left untouched and `None` is
    /// returned, so a second trigger on an already-consumed cell is a no-op.
    pub fn consume(&mut self, cell: Cell) -> Option<Tile> {
        let i = self.index(cell)?;
        let tile = self.tiles[i];
        match tile {
            Tile::HealPack | Tile::LevelUp => {
                self.tiles[i] = Tile::Floor;
                Some(tile)
            }
            Tile::Cloner { replication_count } => {
                self.tiles[i] = if replication_count > 1 {
                    Tile::Cloner {
                        replication_count: replication_count - 1,
                    }
                } else {
                    Tile::Floor
                };
                Some(tile)
            }
            _ => None,
        }
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (Cell, Tile)> + '_ {
        let columns = self.columns.max(1);
        self.tiles.iter().enumerate().map(move |(i, tile)| {
            let i = i as u32;
            (Cell::new((i % columns) as i32, (i / columns) as i32), *tile)
        })
    }
}
