//! Nexus Clash - deterministic tactical battle simulation
//!
//! Core modules:
//! - `sim`: Deterministic simulation (behavior, combat, physics, match control)
//! - `audio`: Fire-and-forget audio cue collaborator
//! - `effects`: Fire-and-forget visual effect collaborator
//! - `persistence`: Versioned snapshot save/load
//! - `settings`: Runner configuration

pub mod audio;
pub mod effects;
pub mod persistence;
pub mod settings;
pub mod sim;

pub use settings::{QualityPreset, Settings};

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Simulated ticks per second at speed multiplier 1.0
    pub const TICKS_PER_SECOND: f32 = 60.0;
    /// Milliseconds covered by one tick at speed multiplier 1.0
    pub const TICK_MS: f32 = 1000.0 / TICKS_PER_SECOND;

    /// Side length of a square tile in world units
    pub const TILE_SIZE: f32 = 32.0;

    /// Unit defaults
    pub const UNIT_RADIUS: f32 = 10.0;
    pub const UNIT_BASE_HP: f32 = 100.0;
    /// World units per tick
    pub const UNIT_BASE_SPEED: f32 = 1.4;
    pub const UNIT_MIN_SPEED: f32 = 0.25;
    pub const BASE_DETECTION_RANGE: f32 = 180.0;
    /// Melee reach measured from the unit's edge
    pub const BASE_ATTACK_RANGE: f32 = 24.0;
    pub const BASE_POWER: f32 = 10.0;
    pub const BASE_ATTACK_COOLDOWN_MS: f32 = 800.0;
    pub const MIN_ATTACK_COOLDOWN_MS: f32 = 150.0;
    pub const MAX_LEVEL: u8 = 5;

    /// Knockback decays by this factor every tick
    pub const KNOCKBACK_DECAY: f32 = 0.8;
    /// Knockback shorter than this is zeroed
    pub const KNOCKBACK_EPSILON: f32 = 0.05;
    /// Impulse applied when a step runs into a wall
    pub const WALL_BOUNCE_IMPULSE: f32 = 2.0;
    /// Impulse applied when a unit is pushed outside the playfield
    pub const BOUNDS_BOUNCE_IMPULSE: f32 = 1.5;

    /// Per-tick displacement under which a moving unit counts as stuck
    pub const STUCK_EPSILON: f32 = 0.15;
    pub const STUCK_TICKS: u32 = 45;
    pub const WANDER_RADIUS: f32 = 96.0;
    pub const ARRIVAL_RADIUS: f32 = 4.0;
    pub const PICKUP_RADIUS: f32 = 14.0;
    pub const FLEE_DISTANCE: f32 = 120.0;

    /// How long a unit remembers who last wounded it
    pub const ATTACKER_MEMORY_MS: f32 = 2500.0;
    /// Ranged units below this hp fraction run from their attacker
    pub const FLEE_HP_FRACTION: f32 = 0.35;
    /// Units below this hp fraction look for heal packs
    pub const HEAL_SEEK_FRACTION: f32 = 0.6;
    /// Unarmed units look for weapons within detection range times this
    pub const WEAPON_SEEK_FACTOR: f32 = 2.0;

    /// Look-ahead steering
    pub const STEER_LOOKAHEAD: f32 = TILE_SIZE;
    pub const STEER_DEFLECTION: f32 = std::f32::consts::FRAC_PI_3;
    /// Heading used when a direction vector degenerates to zero
    pub const FALLBACK_ANGLE: f32 = 0.0;

    /// Tile effects
    pub const LAVA_DAMAGE_PER_TICK: f32 = 0.6;
    pub const MUD_SPEED_FACTOR: f32 = 0.55;
    pub const SLOW_SPEED_FACTOR: f32 = 0.5;
    pub const CONVEYOR_SPEED: f32 = 0.9;
    /// Fraction of max hp restored by a heal pack
    pub const HEAL_PACK_FRACTION: f32 = 0.4;

    /// Projectile defaults
    pub const PROJECTILE_RADIUS: f32 = 4.0;

    /// Structure defaults
    pub const NEXUS_RADIUS: f32 = 22.0;
    pub const NEXUS_BASE_HP: f32 = 500.0;
    pub const NEXUS_EXPLOSION_MS: f32 = 1500.0;
    /// Spacing of the particle bursts emitted while a nexus explodes
    pub const NEXUS_BURST_MS: f32 = 300.0;
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Unit vector for `v`, or the fallback heading when `v` has no length
#[inline]
pub fn direction_or_fallback(v: Vec2) -> Vec2 {
    if v.length_squared() <= f32::EPSILON {
        polar_to_cartesian(1.0, consts::FALLBACK_ANGLE)
    } else {
        v.normalize()
    }
}

/// Unit vector pointing from `from` toward `to`
#[inline]
pub fn direction_to(from: Vec2, to: Vec2) -> Vec2 {
    direction_or_fallback(to - from)
}

/// Rotate a vector by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}
