//! Fixed timestep simulation tick
//!
//! Core loop that advances the world deterministically, in a fixed order:
//! fields, units, structures, weapon drops, projectiles, areas, cleanup.

use std::collections::BTreeSet;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::behavior::update_units;
use super::events::Outbox;
use super::hazards::{spawn_area, update_areas, update_fields};
use super::projectile::advance_projectiles;
use super::rng::SimRng;
use super::state::{DestructionStep, Team, Unit, World};
use super::tiles::{Cell, Tile};
use super::weapons::WeaponKind;
use crate::audio::AudioCue;
use crate::consts::*;
use crate::effects::{EffectColor, VisualEffect};

/// Everything a subsystem needs besides the world itself
pub struct TickContext<'a> {
    /// Speed multiplier applied to every timer and movement
    pub mult: f32,
    /// Simulated milliseconds covered by this tick
    pub step_ms: f32,
    pub rng: &'a mut SimRng,
    pub outbox: &'a mut Outbox,
}

impl<'a> TickContext<'a> {
    pub fn new(mult: f32, rng: &'a mut SimRng, outbox: &'a mut Outbox) -> Self {
        Self {
            mult,
            step_ms: TICK_MS * mult,
            rng,
            outbox,
        }
    }
}

/// How a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Victory(Team),
    Draw,
}

/// Team census taken when the simulation starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStart {
    pub structures: usize,
    /// Teams present among units and structures
    pub teams: BTreeSet<Team>,
    /// Teams with at least one living unit
    pub unit_teams: BTreeSet<Team>,
}

impl MatchStart {
    pub fn census(world: &World) -> Self {
        Self {
            structures: world.nexuses.iter().filter(|n| n.is_standing()).count(),
            teams: world.teams(),
            unit_teams: world.teams_with_living_units(),
        }
    }
}

/// Advance the world by one fixed timestep
pub fn tick(world: &mut World, ctx: &mut TickContext) {
    update_fields(world, ctx);
    update_units(world, ctx);
    update_structures(world, ctx);
    drop_weapons(world, ctx);
    advance_projectiles(world, ctx);
    update_areas(world, ctx);
    cleanup(world, ctx);
}

/// Reduced pipeline once a winner is known: only explosions and in-flight
/// projectiles keep moving
pub fn tick_ending(world: &mut World, ctx: &mut TickContext) {
    update_structures(world, ctx);
    advance_projectiles(world, ctx);
    cleanup(world, ctx);
}

fn update_structures(world: &mut World, ctx: &mut TickContext) {
    for nexus in world.nexuses.iter_mut() {
        match nexus.tick_destruction(ctx.step_ms) {
            DestructionStep::Idle => {}
            DestructionStep::Burst => ctx.outbox.effect(VisualEffect::Particles {
                pos: nexus.pos,
                count: 16,
                color: EffectColor::Fire,
            }),
            DestructionStep::Finished => {
                log::debug!("{} nexus {} destroyed", nexus.team, nexus.id.0);
                ctx.outbox.effect(VisualEffect::Particles {
                    pos: nexus.pos,
                    count: 48,
                    color: EffectColor::Debris,
                });
                ctx.outbox.effect(VisualEffect::Shake {
                    intensity: 8.0,
                    duration_ms: 500.0,
                });
                ctx.outbox.play(AudioCue::NexusDestroyed);
            }
        }
    }
}

/// Periodic random weapon drop on a free floor cell
fn drop_weapons(world: &mut World, ctx: &mut TickContext) {
    let interval = world.rules.weapon_drop_interval_ms;
    if interval <= 0.0 {
        return;
    }
    world.drop_timer_ms += ctx.step_ms;
    if world.drop_timer_ms < interval {
        return;
    }
    world.drop_timer_ms -= interval;

    let on_ground = world.weapons.iter().filter(|w| !w.taken).count();
    if on_ground >= world.rules.max_ground_weapons {
        return;
    }
    let cells: Vec<Cell> = world
        .map
        .cells()
        .filter(|(cell, tile)| *tile == Tile::Floor && is_clear(world, *cell))
        .map(|(cell, _)| cell)
        .collect();
    let Some(&kind) = WeaponKind::DROPPABLE.choose(&mut *ctx.rng) else {
        return;
    };
    let Some(&cell) = cells.choose(&mut *ctx.rng) else {
        return;
    };
    let pos = cell.center();
    world.place_weapon(kind, pos);
    ctx.outbox.effect(VisualEffect::Ring {
        pos,
        radius: TILE_SIZE / 2.0,
        duration_ms: 400.0,
        color: EffectColor::Spark,
    });
    log::debug!("{} dropped at ({}, {})", kind.as_str(), cell.col, cell.row);
}

/// No field or area covers the cell centre
fn is_clear(world: &World, cell: Cell) -> bool {
    let center = cell.center();
    !world.fields.iter().any(|f| !f.expired && f.contains(center))
        && !world.areas.iter().any(|a| !a.is_expired() && a.contains(center))
}

/// Resolve deaths, then compact every collection
fn cleanup(world: &mut World, ctx: &mut TickContext) {
    let fallen: Vec<Unit> = world.units.iter().filter(|u| !u.is_alive()).cloned().collect();
    for unit in &fallen {
        resolve_death(world, ctx, unit);
    }

    world.units.retain(|u| u.is_alive());
    world.projectiles.retain(|p| !p.destroyed);
    world.weapons.retain(|w| !w.taken);
    world.nexuses.retain(|n| !n.destroyed);
    world.areas.retain(|a| !a.is_expired());
    world.fields.retain(|f| !f.expired);
    world.time_ticks += 1;
}

fn resolve_death(world: &mut World, ctx: &mut TickContext, unit: &Unit) {
    if let Some(weapon) = unit.weapon.filter(|w| w.kind != WeaponKind::Fists) {
        world.place_weapon(weapon.kind, unit.pos);
    }
    if let Some(area) = unit.armament().kind.profile().on_death {
        spawn_area(world, ctx, &area, unit.pos, Some(unit.team), Some(unit.id), unit.power());
    }

    let killer = unit
        .last_attacker
        .and_then(|id| world.unit_mut(id))
        .filter(|k| k.is_alive() && k.team != unit.team);
    if let Some(killer) = killer {
        killer.kills += 1;
        if killer.level_up() {
            ctx.outbox.play(AudioCue::LevelUp);
        }
        log::debug!("unit {} killed unit {} ({} kills)", killer.id.0, unit.id.0, killer.kills);
    } else {
        log::debug!("unit {} ({}) died", unit.id.0, unit.team);
    }

    ctx.outbox.play(AudioCue::UnitDeath);
    ctx.outbox.effect(VisualEffect::Particles {
        pos: unit.pos,
        count: 20,
        color: EffectColor::Team(unit.team),
    });
}

fn sole(teams: &BTreeSet<Team>) -> Option<Team> {
    if teams.len() == 1 {
        teams.first().copied()
    } else {
        None
    }
}

/// Check the win conditions; `None` while the match goes on
///
/// With two or more starting structures the structure clause decides, and
/// the unit clause only applies when at least two teams fielded units. With
/// fewer structures the match ends when at most one team remains, and never
/// if only one team took part.
pub fn evaluate_outcome(world: &World, start: &MatchStart) -> Option<MatchOutcome> {
    if start.structures >= 2 {
        let holders = world.teams_with_standing_nexus();
        let living = world.teams_with_living_units();
        let structure_end = holders.len() < 2;
        let unit_end = start.unit_teams.len() >= 2 && living.len() < 2;
        let winner = match (structure_end, unit_end) {
            (false, false) => return None,
            (true, false) => sole(&holders),
            (false, true) => sole(&living),
            (true, true) => match (sole(&holders), sole(&living)) {
                (Some(a), Some(b)) if a != b => None,
                (Some(a), _) => Some(a),
                (None, _) => None,
            },
        };
        return Some(winner.map_or(MatchOutcome::Draw, MatchOutcome::Victory));
    }

    if start.teams.len() < 2 {
        return None;
    }
    let remaining: BTreeSet<Team> = world
        .teams_with_living_units()
        .union(&world.teams_with_standing_nexus())
        .copied()
        .collect();
    if remaining.len() > 1 {
        return None;
    }
    Some(sole(&remaining).map_or(MatchOutcome::Draw, MatchOutcome::Victory))
}
