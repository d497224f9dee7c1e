//! Area effects and magnetic fields
//!
//! Areas are short-lived clouds (fire, ice, poison) spawned by weapons.
//! Magnetic fields are longer-lived, authored on the map or summoned, and
//! pull units toward their centre while hurting everyone but their owner.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{Hit, PoisonSpec, Team, UnitId, World, damageables};
use super::tick::TickContext;
use crate::effects::{EffectColor, VisualEffect};
use crate::{consts::*, direction_to};

/// Cloud flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaKind {
    Fire,
    Ice,
    Poison,
}

impl AreaKind {
    pub fn color(self) -> EffectColor {
        match self {
            AreaKind::Fire => EffectColor::Fire,
            AreaKind::Ice => EffectColor::Ice,
            AreaKind::Poison => EffectColor::Poison,
        }
    }
}

/// Template for an area, carried by weapon profiles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaSpec {
    pub kind: AreaKind,
    pub radius: f32,
    /// Radius gained per tick until `max_radius`
    pub growth_per_tick: f32,
    pub max_radius: f32,
    pub duration_ms: f32,
    /// Damage per tick at base power
    pub damage_per_tick: f32,
    pub slow_ms: f32,
    pub poison: Option<PoisonSpec>,
}

/// A live damage-over-time area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEffect {
    pub id: u32,
    pub kind: AreaKind,
    /// Unit credited with damage
    pub owner: Option<UnitId>,
    /// Immune team
    pub team: Option<Team>,
    pub pos: Vec2,
    pub radius: f32,
    pub growth_per_tick: f32,
    pub max_radius: f32,
    pub remaining_ms: f32,
    pub damage_per_tick: f32,
    pub slow_ms: f32,
    pub poison: Option<PoisonSpec>,
}

impl AreaEffect {
    /// Instantiate `spec`; damage scales with `power / BASE_POWER`
    pub fn spawn(
        id: u32,
        spec: &AreaSpec,
        pos: Vec2,
        team: Option<Team>,
        owner: Option<UnitId>,
        power: f32,
    ) -> Self {
        let scale = (power / BASE_POWER).max(0.0);
        Self {
            id,
            kind: spec.kind,
            owner,
            team,
            pos,
            radius: spec.radius,
            growth_per_tick: spec.growth_per_tick,
            max_radius: spec.max_radius.max(spec.radius),
            remaining_ms: spec.duration_ms,
            damage_per_tick: spec.damage_per_tick * scale,
            slow_ms: spec.slow_ms,
            poison: spec.poison,
        }
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        self.pos.distance(pos) <= self.radius
    }

    pub fn is_hostile_to(&self, team: Team) -> bool {
        self.team != Some(team)
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_ms <= 0.0
    }
}

/// Template for a summoned magnetic field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub radius: f32,
    /// Signed; negative fields shrink
    pub growth_per_tick: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub damage_per_tick: f32,
    pub pull_strength: f32,
    pub lifetime_ms: Option<f32>,
}

/// Magnetic hazard field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagneticField {
    pub id: u32,
    pub center: Vec2,
    pub radius: f32,
    pub growth_per_tick: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Owning team is immune; unowned fields hurt everyone
    pub team: Option<Team>,
    pub owner: Option<UnitId>,
    pub damage_per_tick: f32,
    pub pull_strength: f32,
    pub remaining_ms: Option<f32>,
    #[serde(default)]
    pub expired: bool,
}

impl MagneticField {
    pub fn from_spec(spec: &FieldSpec, center: Vec2, team: Option<Team>, owner: Option<UnitId>) -> Self {
        let min_radius = spec.min_radius.min(spec.max_radius);
        Self {
            id: 0,
            center,
            radius: spec.radius.clamp(min_radius, spec.max_radius),
            growth_per_tick: spec.growth_per_tick,
            min_radius,
            max_radius: spec.max_radius,
            team,
            owner,
            damage_per_tick: spec.damage_per_tick,
            pull_strength: spec.pull_strength,
            remaining_ms: spec.lifetime_ms,
            expired: false,
        }
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        self.center.distance(pos) <= self.radius
    }

    pub fn is_hostile_to(&self, team: Team) -> bool {
        self.team != Some(team)
    }

    /// Grow/shrink and age; marks the field expired when done
    pub fn advance(&mut self, mult: f32, step_ms: f32) {
        self.radius = (self.radius + self.growth_per_tick * mult).clamp(self.min_radius, self.max_radius);
        if self.growth_per_tick < 0.0 && self.radius <= self.min_radius {
            self.expired = true;
        }
        if let Some(remaining) = self.remaining_ms.as_mut() {
            *remaining -= step_ms;
            if *remaining <= 0.0 {
                self.expired = true;
            }
        }
    }
}

/// Update every magnetic field: resize, damage and pull
pub fn update_fields(world: &mut World, ctx: &mut TickContext) {
    let World {
        fields,
        units,
        nexuses,
        ..
    } = world;
    for field in fields.iter_mut().filter(|f| !f.expired) {
        field.advance(ctx.mult, ctx.step_ms);
        if field.expired {
            log::trace!("magnetic field {} expired", field.id);
            continue;
        }
        let hit = Hit::new(field.damage_per_tick * ctx.mult);
        let hit = match field.owner {
            Some(owner) => hit.from_unit(owner),
            None => hit,
        };
        for target in damageables(units, nexuses) {
            if !target.is_alive() || !field.is_hostile_to(target.team()) {
                continue;
            }
            if field.contains(target.position()) {
                target.apply_damage(&hit);
            }
        }
        for unit in units.iter_mut() {
            if !unit.is_alive() || !field.is_hostile_to(unit.team) || !field.contains(unit.pos) {
                continue;
            }
            if unit.pos.distance(field.center) > ARRIVAL_RADIUS {
                unit.status.knockback += direction_to(unit.pos, field.center) * field.pull_strength * ctx.mult;
            }
        }
    }
}

/// Update every area: grow, age and apply damage/status to hostiles inside
pub fn update_areas(world: &mut World, ctx: &mut TickContext) {
    let World {
        areas,
        units,
        nexuses,
        ..
    } = world;
    for area in areas.iter_mut().filter(|a| !a.is_expired()) {
        area.radius = (area.radius + area.growth_per_tick * ctx.mult).min(area.max_radius);
        let mut hit = Hit::new(area.damage_per_tick * ctx.mult)
            .with_slow(area.slow_ms)
            .with_poison(area.poison);
        if let Some(owner) = area.owner {
            hit = hit.from_unit(owner);
        }
        for target in damageables(units, nexuses) {
            if target.is_alive() && area.is_hostile_to(target.team()) && area.contains(target.position()) {
                target.apply_damage(&hit);
            }
        }
        area.remaining_ms -= ctx.step_ms;
        if area.is_expired() {
            log::trace!("{:?} area {} dissipated", area.kind, area.id);
        }
    }
}

/// Spawn an area on the world and announce it
pub fn spawn_area(
    world: &mut World,
    ctx: &mut TickContext,
    spec: &AreaSpec,
    pos: Vec2,
    team: Option<Team>,
    owner: Option<UnitId>,
    power: f32,
) -> u32 {
    let id = world.ids.next();
    world.areas.push(AreaEffect::spawn(id, spec, pos, team, owner, power));
    ctx.outbox.effect(VisualEffect::Ring {
        pos,
        radius: spec.max_radius.max(spec.radius),
        duration_ms: spec.duration_ms,
        color: spec.kind.color(),
    });
    id
}

/// Whether `pos` lies in a region a unit of `team` should leave
pub fn hazard_at(world: &World, pos: Vec2, team: Team) -> bool {
    world.map.is_hazard_at(pos)
        || world
            .fields
            .iter()
            .any(|f| !f.expired && f.is_hostile_to(team) && f.contains(pos))
        || world
            .areas
            .iter()
            .any(|a| !a.is_expired() && a.is_hostile_to(team) && a.contains(pos))
}
