//! Deterministic simulation module
//!
//! All match logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (`SimRng`)
//! - Stable iteration order (by entity ID)
//! - No rendering, audio or platform dependencies; notifications go through
//!   the tick outbox

pub mod arena;
pub mod behavior;
pub mod collision;
pub mod controller;
pub mod events;
pub mod hazards;
pub mod projectile;
pub mod rng;
pub mod snapshot;
pub mod state;
pub mod steering;
pub mod tick;
pub mod tiles;
pub mod weapons;

pub use arena::demo_arena;
pub use controller::{ControlError, MatchController, MatchPhase};
pub use events::Outbox;
pub use hazards::{AreaEffect, AreaKind, AreaSpec, FieldSpec, MagneticField};
pub use projectile::{Projectile, ProjectileKind, ReturnPhase};
pub use rng::SimRng;
pub use snapshot::MatchSnapshot;
pub use state::{
    Damageable, DamageOutcome, GroundWeapon, Hit, MatchRules, Nexus, NexusId, StatusEffects, TargetRef, Team, Unit,
    UnitId, UnitState, World,
};
pub use tick::{MatchOutcome, MatchStart, TickContext, evaluate_outcome, tick};
pub use tiles::{Cell, Direction, Tile, TileMap};
pub use weapons::{Weapon, WeaponKind};
