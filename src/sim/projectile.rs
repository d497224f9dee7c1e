//! In-flight projectiles
//!
//! Projectiles advance along their heading, then test the tile under them,
//! then enemy units, then enemy structures. The hit-set only grows, so a
//! projectile never damages the same target twice on its outbound path.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::reflect_velocity;
use super::hazards::{AreaEffect, AreaSpec};
use super::state::{Hit, Nexus, PoisonSpec, Team, TargetRef, Unit, UnitId, World, damageables};
use super::tick::TickContext;
use super::tiles::{Cell, TileMap, WallDamage};
use crate::audio::AudioCue;
use crate::consts::*;
use crate::direction_or_fallback;
use crate::effects::{EffectColor, VisualEffect};

/// How long a returning projectile hovers at the end of its outbound leg
pub const LINGER_MS: f32 = 720.0;
/// Interval between damage pulses while lingering
pub const LINGER_PULSE_MS: f32 = 200.0;
pub const LINGER_RADIUS: f32 = 28.0;
/// Fraction of the projectile's damage dealt by each pulse
pub const LINGER_DAMAGE_FRACTION: f32 = 0.5;

/// Projectile flavour (drives visuals and audio only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileKind {
    Arrow,
    Pellet,
    Javelin,
    Ricochet,
    Boomerang,
    IceShard,
}

/// Status payload applied to units on contact
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OnHit {
    pub knockback: f32,
    pub stun_ms: f32,
    pub slow_ms: f32,
    pub poison: Option<PoisonSpec>,
}

/// Template carried by weapon profiles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    pub kind: ProjectileKind,
    /// World units per tick
    pub speed: f32,
    pub max_range: f32,
    /// Multiplier on the wielder's power
    pub damage_mult: f32,
    /// Additional targets the projectile may pass through
    pub pierce: u32,
    /// Wall reflections before the projectile is spent
    pub bounces: u32,
    pub on_hit: OnHit,
    /// Area spawned at the impact point on terminal collision
    pub detonate: Option<AreaSpec>,
    /// Out, linger, then return to the thrower
    pub returning: bool,
}

/// Phase of a returning projectile; only ever advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReturnPhase {
    MovingOut,
    Lingering,
    Returning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnState {
    pub phase: ReturnPhase,
    pub linger_ms: f32,
    pub pulse_ms: f32,
    /// Targets struck on the way back (each at most once)
    pub return_hits: Vec<TargetRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: u32,
    pub owner: UnitId,
    pub team: Team,
    pub kind: ProjectileKind,
    pub pos: Vec2,
    /// Unit vector
    pub heading: Vec2,
    pub speed: f32,
    pub damage: f32,
    /// Wielder power at launch (scales detonation areas)
    pub power: f32,
    pub pierce: u32,
    pub bounces: u32,
    pub traveled: f32,
    pub max_range: f32,
    pub hit_set: Vec<TargetRef>,
    pub on_hit: OnHit,
    pub detonate: Option<AreaSpec>,
    pub returning: Option<ReturnState>,
    pub destroyed: bool,
}

impl Projectile {
    pub fn launch(id: u32, owner: UnitId, team: Team, pos: Vec2, heading: Vec2, power: f32, spec: &ProjectileSpec) -> Self {
        Self {
            id,
            owner,
            team,
            kind: spec.kind,
            pos,
            heading: direction_or_fallback(heading),
            speed: spec.speed,
            damage: power * spec.damage_mult,
            power,
            pierce: spec.pierce,
            bounces: spec.bounces,
            traveled: 0.0,
            max_range: spec.max_range,
            hit_set: Vec::new(),
            on_hit: spec.on_hit,
            detonate: spec.detonate,
            returning: spec.returning.then(|| ReturnState {
                phase: ReturnPhase::MovingOut,
                linger_ms: LINGER_MS,
                pulse_ms: 0.0,
                return_hits: Vec::new(),
            }),
            destroyed: false,
        }
    }

    pub fn phase(&self) -> Option<ReturnPhase> {
        self.returning.as_ref().map(|r| r.phase)
    }

    fn hit_for(&self, heading: Vec2, damage: f32) -> Hit {
        Hit::new(damage)
            .from_unit(self.owner)
            .with_knockback(heading * self.on_hit.knockback)
            .with_stun(self.on_hit.stun_ms)
            .with_slow(self.on_hit.slow_ms)
            .with_poison(self.on_hit.poison)
    }
}

/// Spawn a projectile from a unit toward `heading`
pub fn spawn_projectile(world: &mut World, caster: usize, heading: Vec2, spec: &ProjectileSpec) -> u32 {
    let id = world.ids.next();
    let unit = &world.units[caster];
    let origin = unit.pos + direction_or_fallback(heading) * (UNIT_RADIUS + PROJECTILE_RADIUS);
    let projectile = Projectile::launch(id, unit.id, unit.team, origin, heading, unit.power(), spec);
    world.projectiles.push(projectile);
    id
}

/// Wall normal for a move from `from` into the blocking cell containing `to`
fn wall_normal(map: &TileMap, from: Vec2, to: Vec2, heading: Vec2) -> Vec2 {
    let a = map.cell_at(from);
    let b = map.cell_at(to);
    let (dc, dr) = (b.col - a.col, b.row - a.row);
    let blocks = |cell: Cell| map.get(cell).is_none_or(|t| t.blocks_projectile());
    let x_normal = Vec2::new(-(dc.signum() as f32), 0.0);
    let y_normal = Vec2::new(0.0, -(dr.signum() as f32));
    match (dc != 0, dr != 0) {
        (true, false) => x_normal,
        (false, true) => y_normal,
        (true, true) => {
            if blocks(Cell::new(a.col + dc, a.row)) && !blocks(Cell::new(a.col, a.row + dr)) {
                x_normal
            } else if blocks(Cell::new(a.col, a.row + dr)) && !blocks(Cell::new(a.col + dc, a.row)) {
                y_normal
            } else {
                (x_normal + y_normal).normalize()
            }
        }
        (false, false) => -heading,
    }
}

/// Advance every live projectile by one tick
pub fn advance_projectiles(world: &mut World, ctx: &mut TickContext) {
    let World {
        map,
        units,
        nexuses,
        projectiles,
        areas,
        ids,
        ..
    } = world;
    for projectile in projectiles.iter_mut().filter(|p| !p.destroyed) {
        let impact = if projectile.returning.is_some() {
            advance_returning(projectile, map, units, nexuses, ctx);
            None
        } else {
            advance_straight(projectile, map, units, nexuses, ctx)
        };
        if let (Some(point), Some(spec)) = (impact, projectile.detonate) {
            let id = ids.next();
            areas.push(AreaEffect::spawn(
                id,
                &spec,
                point,
                Some(projectile.team),
                Some(projectile.owner),
                projectile.power,
            ));
            ctx.outbox.effect(VisualEffect::Ring {
                pos: point,
                radius: spec.max_radius.max(spec.radius),
                duration_ms: spec.duration_ms,
                color: spec.kind.color(),
            });
        }
    }
}

/// Returns the impact point when the projectile ends in a terminal collision
fn advance_straight(
    projectile: &mut Projectile,
    map: &mut TileMap,
    units: &mut [Unit],
    nexuses: &mut [Nexus],
    ctx: &mut TickContext,
) -> Option<Vec2> {
    let previous = projectile.pos;
    let step = projectile.heading * projectile.speed * ctx.mult;
    projectile.pos += step;
    projectile.traveled += step.length();

    let cell = map.cell_at(projectile.pos);
    let Some(tile) = map.get(cell) else {
        projectile.destroyed = true;
        return None;
    };
    if tile.blocks_projectile() {
        match map.damage_wall(cell, projectile.damage) {
            WallDamage::Destroyed => {
                log::debug!("destructible wall at {:?} destroyed", cell);
                ctx.outbox.play(AudioCue::WallBreak);
                ctx.outbox.effect(VisualEffect::Particles {
                    pos: cell.center(),
                    count: 16,
                    color: EffectColor::Debris,
                });
            }
            WallDamage::Damaged | WallDamage::Indestructible => ctx.outbox.play(AudioCue::WallHit),
        }
        if projectile.bounces > 0 {
            let normal = wall_normal(map, previous, projectile.pos, projectile.heading);
            projectile.bounces -= 1;
            projectile.pos = previous;
            projectile.heading = direction_or_fallback(reflect_velocity(projectile.heading, normal));
            return None;
        }
        projectile.destroyed = true;
        return Some(previous);
    }

    for target in damageables(units, nexuses) {
        if !target.is_alive() || target.team() == projectile.team {
            continue;
        }
        let target_ref = target.target_ref();
        if projectile.hit_set.contains(&target_ref) {
            continue;
        }
        if projectile.pos.distance(target.position()) > target.hit_radius() + PROJECTILE_RADIUS {
            continue;
        }
        target.apply_damage(&projectile.hit_for(projectile.heading, projectile.damage));
        projectile.hit_set.push(target_ref);
        ctx.outbox.effect(VisualEffect::Particles {
            pos: projectile.pos,
            count: 6,
            color: EffectColor::Spark,
        });
        if projectile.pierce > 0 {
            projectile.pierce -= 1;
        } else {
            projectile.destroyed = true;
            return Some(projectile.pos);
        }
    }

    if projectile.traveled >= projectile.max_range {
        projectile.destroyed = true;
    }
    None
}

fn advance_returning(
    projectile: &mut Projectile,
    map: &TileMap,
    units: &mut [Unit],
    nexuses: &mut [Nexus],
    ctx: &mut TickContext,
) {
    let Some(phase) = projectile.phase() else {
        return;
    };
    match phase {
        ReturnPhase::MovingOut => {
            let remaining = (projectile.max_range - projectile.traveled).max(0.0);
            let step_len = (projectile.speed * ctx.mult).min(remaining);
            let next = projectile.pos + projectile.heading * step_len;
            let mut stop = false;
            if map.get(map.cell_at(next)).is_none_or(|t| t.blocks_projectile()) {
                stop = true;
            } else {
                projectile.pos = next;
                projectile.traveled += step_len;
                for target in damageables(units, nexuses) {
                    if !target.is_alive() || target.team() == projectile.team {
                        continue;
                    }
                    let target_ref = target.target_ref();
                    if projectile.hit_set.contains(&target_ref)
                        || projectile.pos.distance(target.position()) > target.hit_radius() + PROJECTILE_RADIUS
                    {
                        continue;
                    }
                    target.apply_damage(&projectile.hit_for(projectile.heading, projectile.damage));
                    projectile.hit_set.push(target_ref);
                    stop = true;
                    break;
                }
            }
            if stop || projectile.traveled >= projectile.max_range {
                set_phase(projectile, ReturnPhase::Lingering);
            }
        }
        ReturnPhase::Lingering => {
            let pulse_damage = projectile.damage * LINGER_DAMAGE_FRACTION;
            let pos = projectile.pos;
            let owner = projectile.owner;
            let team = projectile.team;
            let Some(state) = projectile.returning.as_mut() else {
                return;
            };
            state.linger_ms -= ctx.step_ms;
            state.pulse_ms -= ctx.step_ms;
            if state.pulse_ms <= 0.0 {
                state.pulse_ms += LINGER_PULSE_MS;
                let hit = Hit::new(pulse_damage).from_unit(owner);
                for target in damageables(units, nexuses) {
                    if target.is_alive() && target.team() != team && pos.distance(target.position()) <= LINGER_RADIUS {
                        target.apply_damage(&hit);
                    }
                }
                ctx.outbox.effect(VisualEffect::Ring {
                    pos,
                    radius: LINGER_RADIUS,
                    duration_ms: LINGER_PULSE_MS,
                    color: EffectColor::Spark,
                });
            }
            if state.linger_ms <= 0.0 {
                state.phase = ReturnPhase::Returning;
            }
        }
        ReturnPhase::Returning => {
            let owner = units
                .binary_search_by_key(&projectile.owner, |u| u.id)
                .ok()
                .map(|i| &units[i])
                .filter(|u| u.is_alive())
                .map(|u| u.pos);
            let Some(owner_pos) = owner else {
                projectile.destroyed = true;
                return;
            };
            let to_owner = owner_pos - projectile.pos;
            let step_len = projectile.speed * ctx.mult;
            if to_owner.length() <= step_len.max(UNIT_RADIUS) {
                projectile.destroyed = true;
                return;
            }
            let heading = to_owner.normalize();
            projectile.heading = heading;
            projectile.pos += heading * step_len;
            let hit = projectile.hit_for(heading, projectile.damage);
            let pos = projectile.pos;
            let team = projectile.team;
            let Some(state) = projectile.returning.as_mut() else {
                return;
            };
            for target in damageables(units, nexuses) {
                if !target.is_alive() || target.team() == team {
                    continue;
                }
                let target_ref = target.target_ref();
                if state.return_hits.contains(&target_ref)
                    || pos.distance(target.position()) > target.hit_radius() + PROJECTILE_RADIUS
                {
                    continue;
                }
                target.apply_damage(&hit);
                state.return_hits.push(target_ref);
            }
        }
    }
}

fn set_phase(projectile: &mut Projectile, phase: ReturnPhase) {
    if let Some(state) = projectile.returning.as_mut() {
        if phase > state.phase {
            log::trace!("projectile {} {:?} -> {:?}", projectile.id, state.phase, phase);
            state.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::Outbox;
    use crate::sim::rng::SimRng;
    use crate::sim::tiles::Tile;
    use proptest::prelude::*;

    fn spec(kind: ProjectileKind) -> ProjectileSpec {
        ProjectileSpec {
            kind,
            speed: 6.0,
            max_range: 400.0,
            damage_mult: 1.0,
            pierce: 0,
            bounces: 0,
            on_hit: OnHit::default(),
            detonate: None,
            returning: false,
        }
    }

    fn run(world: &mut World, ticks: usize) {
        let mut rng = SimRng::new(5);
        let mut outbox = Outbox::new();
        for _ in 0..ticks {
            let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
            advance_projectiles(world, &mut ctx);
        }
    }

    #[test]
    fn test_out_of_bounds_destroys() {
        let mut world = World::new(TileMap::new(4, 4));
        let shooter = world.spawn_unit(Team(0), Vec2::new(100.0, 64.0));
        let idx = world.unit_index(shooter).unwrap();
        spawn_projectile(&mut world, idx, Vec2::X, &spec(ProjectileKind::Arrow));
        run(&mut world, 10);
        assert!(world.projectiles[0].destroyed);
    }

    #[test]
    fn test_bounce_reflects_about_wall_normal() {
        let mut world = World::new(TileMap::new(10, 5));
        for row in 0..5 {
            world.map.set(Cell::new(6, row), Tile::Wall);
        }
        let shooter = world.spawn_unit(Team(0), Vec2::new(100.0, 80.0));
        let idx = world.unit_index(shooter).unwrap();
        let ricochet = ProjectileSpec {
            bounces: 1,
            ..spec(ProjectileKind::Ricochet)
        };
        spawn_projectile(&mut world, idx, Vec2::X, &ricochet);
        run(&mut world, 20);
        let p = &world.projectiles[0];
        assert!(!p.destroyed);
        assert_eq!(p.bounces, 0);
        assert!(p.heading.x < 0.0);
        assert!(p.pos.x < 6.0 * TILE_SIZE);
    }

    #[test]
    fn test_destructible_wall_takes_damage() {
        let mut world = World::new(TileMap::new(10, 5));
        world.map.set(Cell::new(5, 2), Tile::DestructibleWall { structural_hp: 5.0 });
        let shooter = world.spawn_unit(Team(0), Vec2::new(100.0, 80.0));
        let idx = world.unit_index(shooter).unwrap();
        spawn_projectile(&mut world, idx, Vec2::X, &spec(ProjectileKind::Arrow));
        run(&mut world, 20);
        assert!(world.projectiles[0].destroyed);
        assert_eq!(world.map.get(Cell::new(5, 2)), Some(Tile::Floor));
    }

    #[test]
    fn test_detonation_spawns_area_at_impact() {
        let mut world = World::new(TileMap::new(12, 5));
        let shooter = world.spawn_unit(Team(0), Vec2::new(60.0, 80.0));
        world.spawn_unit(Team(1), Vec2::new(200.0, 80.0));
        let idx = world.unit_index(shooter).unwrap();
        let shard = ProjectileSpec {
            detonate: Some(AreaSpec {
                kind: super::super::hazards::AreaKind::Ice,
                radius: 30.0,
                growth_per_tick: 0.0,
                max_radius: 30.0,
                duration_ms: 1000.0,
                damage_per_tick: 0.1,
                slow_ms: 500.0,
                poison: None,
            }),
            ..spec(ProjectileKind::IceShard)
        };
        spawn_projectile(&mut world, idx, Vec2::X, &shard);
        run(&mut world, 40);
        assert!(world.projectiles[0].destroyed);
        assert_eq!(world.areas.len(), 1);
        assert!((world.areas[0].pos.x - 200.0).abs() < UNIT_RADIUS + PROJECTILE_RADIUS + 6.0);
        assert_eq!(world.areas[0].team, Some(Team(0)));
    }

    #[test]
    fn test_returning_projectile_phases() {
        let mut world = World::new(TileMap::new(30, 10));
        let thrower = world.spawn_unit(Team(0), Vec2::new(64.0, 160.0));
        let idx = world.unit_index(thrower).unwrap();
        let boomerang = ProjectileSpec {
            max_range: 100.0,
            returning: true,
            ..spec(ProjectileKind::Boomerang)
        };
        spawn_projectile(&mut world, idx, Vec2::X, &boomerang);
        let start_x = world.projectiles[0].pos.x;

        let mut rng = SimRng::new(5);
        let mut outbox = Outbox::new();
        let mut phases = Vec::new();
        let mut lingering_ticks = 0;
        for _ in 0..200 {
            let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
            advance_projectiles(&mut world, &mut ctx);
            let p = &world.projectiles[0];
            if p.destroyed {
                break;
            }
            if p.phase() == Some(ReturnPhase::Lingering) {
                lingering_ticks += 1;
            }
            if phases.last() != p.phase().as_ref() {
                phases.push(p.phase().unwrap());
                if p.phase() == Some(ReturnPhase::Lingering) {
                    assert!((p.traveled - 100.0).abs() < 1e-3);
                    assert!((p.pos.x - (start_x + 100.0)).abs() < 1e-3);
                }
            }
        }
        assert_eq!(
            phases,
            vec![ReturnPhase::MovingOut, ReturnPhase::Lingering, ReturnPhase::Returning]
        );
        assert_eq!(lingering_ticks, (LINGER_MS / TICK_MS).ceil() as usize);
        assert!(world.projectiles[0].destroyed);
    }

    #[test]
    fn test_ten_single_hits_kill_on_tenth_tick() {
        let mut world = World::new(TileMap::new(10, 5));
        world.spawn_unit(Team(0), Vec2::new(100.0, 80.0));
        let victim = world.spawn_unit(Team(1), Vec2::new(130.0, 80.0));
        let mut rng = SimRng::new(5);
        let mut outbox = Outbox::new();
        for n in 1..=10 {
            spawn_projectile(&mut world, 0, Vec2::X, &spec(ProjectileKind::Arrow));
            let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
            advance_projectiles(&mut world, &mut ctx);
            let unit = world.unit(victim).unwrap();
            assert_eq!(unit.hp, UNIT_BASE_HP - 10.0 * n as f32);
            assert_eq!(unit.is_alive(), n < 10);
        }
        assert_eq!(world.projectiles.len(), 10);
        for p in &world.projectiles {
            assert!(p.destroyed);
            assert_eq!(p.hit_set, vec![TargetRef::Unit(victim)]);
        }
    }

    #[test]
    fn test_returning_projectile_dies_with_owner() {
        let mut world = World::new(TileMap::new(30, 10));
        let thrower = world.spawn_unit(Team(0), Vec2::new(64.0, 160.0));
        let idx = world.unit_index(thrower).unwrap();
        let boomerang = ProjectileSpec {
            max_range: 30.0,
            returning: true,
            ..spec(ProjectileKind::Boomerang)
        };
        spawn_projectile(&mut world, idx, Vec2::X, &boomerang);
        run(&mut world, 20);
        assert_eq!(world.projectiles[0].phase(), Some(ReturnPhase::Lingering));
        world.units[0].hp = 0.0;
        run(&mut world, 50);
        assert!(world.projectiles[0].destroyed);
    }

    proptest! {
        #[test]
        fn prop_pierce_bounds_targets_hit(pierce in 0u32..4, enemies in 1usize..8) {
            let mut world = World::new(TileMap::new(40, 5));
            let shooter = world.spawn_unit(Team(0), Vec2::new(40.0, 80.0));
            for i in 0..enemies {
                world.spawn_unit(Team(1), Vec2::new(120.0 + i as f32 * 40.0, 80.0));
            }
            let idx = world.unit_index(shooter).unwrap();
            let javelin = ProjectileSpec { pierce, ..spec(ProjectileKind::Javelin) };
            spawn_projectile(&mut world, idx, Vec2::X, &javelin);
            let mut previous = 0;
            let mut rng = SimRng::new(5);
            let mut outbox = Outbox::new();
            for _ in 0..120 {
                let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
                advance_projectiles(&mut world, &mut ctx);
                let hits = world.projectiles[0].hit_set.len();
                prop_assert!(hits >= previous);
                previous = hits;
            }
            prop_assert!(previous <= pierce as usize + 1);
            let wounded = world.units.iter().filter(|u| u.team == Team(1) && u.hp < UNIT_BASE_HP).count();
            prop_assert_eq!(wounded, previous);
        }
    }
}
