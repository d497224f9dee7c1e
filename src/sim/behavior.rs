//! Unit behaviour state machine
//!
//! Each tick every living unit re-evaluates its state in strict priority
//! order (only an active channel is sticky), then acts on it: moving,
//! attacking, picking things up. Physics runs after all units have acted.

use glam::Vec2;

use super::collision;
use super::hazards::hazard_at;
use super::rng::SimRng;
use super::state::{Damageable, Hit, ItemTarget, TargetRef, Unit, UnitState, World};
use super::steering::{line_of_sight, nearest_safe_cell, steer};
use super::tick::TickContext;
use super::tiles::{Cell, Tile};
use super::weapons::{self, Cast, RECAST_DRIFT, Weapon};
use crate::audio::AudioCue;
use crate::consts::*;
use crate::effects::{EffectColor, VisualEffect};
use crate::{direction_to, polar_to_cartesian, rotate};

/// Fraction of the original's hit points a clone starts with
const CLONE_HP_FRACTION: f32 = 0.5;

/// What a unit wants to do this tick
#[derive(Debug, Clone, Copy, PartialEq)]
struct Intent {
    state: UnitState,
    move_target: Option<Vec2>,
    attack_target: Option<TargetRef>,
    item_target: Option<ItemTarget>,
}

impl Intent {
    fn new(state: UnitState) -> Self {
        Self {
            state,
            move_target: None,
            attack_target: None,
            item_target: None,
        }
    }

    fn moving_to(mut self, target: Option<Vec2>) -> Self {
        self.move_target = target;
        self
    }

    fn attacking(mut self, target: TargetRef) -> Self {
        self.attack_target = Some(target);
        self
    }

    fn seeking(mut self, item: ItemTarget, pos: Vec2) -> Self {
        self.item_target = Some(item);
        self.move_target = Some(pos);
        self
    }
}

/// Unit stage of the tick pipeline
pub fn update_units(world: &mut World, ctx: &mut TickContext) {
    let mut clones = Vec::new();
    for i in 0..world.units.len() {
        if world.units[i].is_alive() {
            update_unit(world, ctx, i, &mut clones);
        }
    }
    collision::separate_units(&mut world.units, &world.map);
    let bounds = world.bounds();
    for unit in world.units.iter_mut().filter(|u| u.is_alive()) {
        collision::clamp_to_bounds(unit, bounds);
    }
    for clone in clones {
        let team = clone.team;
        let id = world.add_unit(clone);
        log::debug!("unit {} cloned ({})", id.0, team);
    }
}

fn update_unit(world: &mut World, ctx: &mut TickContext, i: usize, clones: &mut Vec<Unit>) {
    if !tick_status(world, ctx, i) {
        return;
    }
    if let Some(cast) = world.units[i].cast {
        match recast_target(world, &world.units[i], &cast) {
            Some(target) => {
                log::trace!("unit {} re-aiming channel", world.units[i].id.0);
                weapons::attack(world, ctx, i, target);
            }
            None => weapons::advance_cast(world, ctx, i),
        }
        collision::integrate_knockback(&mut world.units[i], &world.map, ctx.mult);
        return;
    }
    if world.units[i].status.is_stunned() {
        collision::integrate_knockback(&mut world.units[i], &world.map, ctx.mult);
        return;
    }

    let intent = decide(world, &world.units[i], ctx.rng);
    apply_intent(&mut world.units[i], intent);
    act(world, ctx, i);

    enter_cell(world, ctx, i, clones);
    apply_conveyor(world, ctx.mult, i);
    collision::integrate_knockback(&mut world.units[i], &world.map, ctx.mult);
}

/// Target to recast at when the weapon allows it, its cooldown is over and
/// the target has left the aimed point while still in reach
fn recast_target(world: &World, unit: &Unit, cast: &Cast) -> Option<TargetRef> {
    if !unit.armament().kind.profile().allow_recast || unit.attack_cooldown_ms > 0.0 || unit.status.is_stunned() {
        return None;
    }
    let target = unit.attack_target?;
    let info = world.resolve_target(target)?;
    let reach = unit.attack_range() + UNIT_RADIUS + info.radius;
    (info.pos.distance(cast.target_pos) > RECAST_DRIFT && unit.pos.distance(info.pos) <= reach).then_some(target)
}

/// Count down timers and apply poison/lava; returns whether the unit lives
fn tick_status(world: &mut World, ctx: &mut TickContext, i: usize) -> bool {
    let on_lava = world.map.is_hazard_at(world.units[i].pos);
    let unit = &mut world.units[i];
    let poison = unit.status.tick(ctx.step_ms, ctx.mult);
    unit.attack_cooldown_ms = (unit.attack_cooldown_ms - ctx.step_ms).max(0.0);
    unit.attacker_memory_ms = (unit.attacker_memory_ms - ctx.step_ms).max(0.0);
    if let Some(weapon) = unit.weapon.as_mut() {
        weapon.tick(ctx.step_ms);
    }
    if poison > 0.0 {
        unit.apply_damage(&Hit::new(poison));
    }
    if on_lava {
        unit.apply_damage(&Hit::new(LAVA_DAMAGE_PER_TICK * ctx.mult));
    }
    unit.is_alive()
}

fn nearest_by<T>(items: impl Iterator<Item = (T, Vec2)>, from: Vec2) -> Option<(T, Vec2)> {
    items.min_by(|a, b| {
        a.1.distance_squared(from)
            .partial_cmp(&b.1.distance_squared(from))
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Nearest wanted tile in range, ignoring the cell `from` already stands on
fn nearest_tile(world: &World, from: Vec2, range: f32, wanted: impl Fn(&Tile) -> bool) -> Option<(Cell, Vec2)> {
    let here = world.map.cell_at(from);
    let cells = world
        .map
        .cells()
        .filter(|(cell, tile)| *cell != here && wanted(tile))
        .map(|(cell, _)| (cell, cell.center()))
        .filter(|(_, center)| center.distance(from) <= range);
    nearest_by(cells, from)
}

/// Keep a point inside the playfield margin
fn clamp_inside(world: &World, p: Vec2) -> Vec2 {
    let min = Vec2::splat(UNIT_RADIUS);
    let max = (world.bounds() - Vec2::splat(UNIT_RADIUS)).max(min);
    p.clamp(min, max)
}

/// Pick this tick's state in priority order
fn decide(world: &World, unit: &Unit, rng: &mut SimRng) -> Intent {
    let (team, pos) = (unit.team, unit.pos);

    if hazard_at(world, pos, team) {
        return Intent::new(UnitState::FleeingHazard).moving_to(nearest_safe_cell(world, pos, team));
    }

    if unit.attacker_memory_ms > 0.0 {
        let attacker = unit
            .last_attacker
            .and_then(|id| world.resolve_target(TargetRef::Unit(id)).map(|info| (id, info)))
            .filter(|(_, info)| info.team != team);
        if let Some((id, info)) = attacker {
            if unit.armament().kind.is_ranged() && unit.hp_fraction() < FLEE_HP_FRACTION {
                let keep = unit.state == UnitState::FleeingAttacker
                    && unit.move_target.is_some_and(|t| t.distance(pos) > ARRIVAL_RADIUS);
                let target = if keep {
                    unit.move_target
                } else {
                    let away = rotate(direction_to(info.pos, pos), rng.jitter(std::f32::consts::FRAC_PI_2));
                    Some(clamp_inside(world, pos + away * FLEE_DISTANCE))
                };
                return Intent::new(UnitState::FleeingAttacker).moving_to(target);
            }
            return Intent::new(UnitState::Aggressive).attacking(TargetRef::Unit(id));
        }
    }

    let detection = unit.detection_range();
    if unit.hp_fraction() < HEAL_SEEK_FRACTION {
        if let Some((cell, center)) = nearest_tile(world, pos, detection, |t| matches!(t, Tile::HealPack)) {
            return Intent::new(UnitState::SeekingHeal).seeking(ItemTarget::Tile(cell), center);
        }
    }
    if unit.weapon.is_none() {
        let weapons = world
            .weapons
            .iter()
            .filter(|w| !w.taken && w.pos.distance(pos) <= detection * WEAPON_SEEK_FACTOR)
            .map(|w| (w.id, w.pos));
        if let Some((id, at)) = nearest_by(weapons, pos) {
            return Intent::new(UnitState::SeekingWeapon).seeking(ItemTarget::Weapon(id), at);
        }
    }
    let wants_level = unit.level < MAX_LEVEL;
    let item = nearest_tile(world, pos, detection, |t| match t {
        Tile::LevelUp => wants_level,
        Tile::Cloner { .. } => !unit.cloned,
        _ => false,
    });
    if let Some((cell, center)) = item {
        return Intent::new(UnitState::SeekingItem).seeking(ItemTarget::Tile(cell), center);
    }

    let enemies = world
        .units
        .iter()
        .filter(|u| u.is_alive() && u.team != team && u.pos.distance(pos) <= detection)
        .map(|u| (u.id, u.pos));
    if let Some((id, _)) = nearest_by(enemies, pos) {
        return Intent::new(UnitState::Aggressive).attacking(TargetRef::Unit(id));
    }

    let structures = world
        .nexuses
        .iter()
        .filter(|n| n.is_standing() && n.team != team)
        .map(|n| (n.id, n.pos));
    if let Some((id, _)) = nearest_by(structures, pos) {
        return Intent::new(UnitState::AssaultingStructure).attacking(TargetRef::Nexus(id));
    }

    // Keep the current wander target while idling
    let wander = (unit.state == UnitState::Idle).then_some(unit.move_target).flatten();
    Intent::new(UnitState::Idle).moving_to(wander)
}

fn apply_intent(unit: &mut Unit, intent: Intent) {
    if unit.state != intent.state {
        log::trace!("unit {} {:?} -> {:?}", unit.id.0, unit.state, intent.state);
        unit.detour = None;
        unit.stuck.reset();
    }
    unit.state = intent.state;
    unit.move_target = intent.move_target;
    unit.attack_target = intent.attack_target;
    unit.item_target = intent.item_target;
}

fn become_idle(unit: &mut Unit) {
    apply_intent(unit, Intent::new(UnitState::Idle));
}

/// Carry out the current state
fn act(world: &mut World, ctx: &mut TickContext, i: usize) {
    let unit = &world.units[i];
    let state = unit.state;
    match state {
        UnitState::Aggressive | UnitState::AssaultingStructure => {
            let Some(target) = unit.attack_target else {
                become_idle(&mut world.units[i]);
                return;
            };
            let Some(info) = world.resolve_target(target) else {
                become_idle(&mut world.units[i]);
                return;
            };
            let reach = unit.attack_range() + UNIT_RADIUS + info.radius;
            if unit.pos.distance(info.pos) <= reach && line_of_sight(&world.map, unit.pos, info.pos) {
                let unit = &mut world.units[i];
                unit.move_target = None;
                unit.heading = direction_to(unit.pos, info.pos);
                if !weapons::try_special(world, ctx, i) {
                    weapons::attack(world, ctx, i, target);
                }
            } else {
                move_toward(world, ctx, i, info.pos);
            }
        }
        UnitState::SeekingWeapon => {
            let Some(ItemTarget::Weapon(id)) = unit.item_target else {
                become_idle(&mut world.units[i]);
                return;
            };
            let Some(k) = world.weapons.iter().position(|w| w.id == id && !w.taken) else {
                become_idle(&mut world.units[i]);
                return;
            };
            let at = world.weapons[k].pos;
            if unit.pos.distance(at) <= PICKUP_RADIUS {
                let kind = world.weapons[k].kind;
                world.weapons[k].taken = true;
                let unit = &mut world.units[i];
                unit.weapon = Some(Weapon::new(kind));
                become_idle(unit);
                ctx.outbox.play(AudioCue::Equip);
                log::debug!("unit {} equipped {}", unit.id.0, kind.as_str());
            } else {
                move_toward(world, ctx, i, at);
            }
        }
        UnitState::SeekingHeal | UnitState::SeekingItem => {
            let Some(ItemTarget::Tile(cell)) = unit.item_target else {
                become_idle(&mut world.units[i]);
                return;
            };
            if !world.map.get(cell).is_some_and(|t| t.is_consumable()) {
                become_idle(&mut world.units[i]);
                return;
            }
            if move_toward(world, ctx, i, cell.center()) {
                become_idle(&mut world.units[i]);
            }
        }
        UnitState::FleeingHazard | UnitState::FleeingAttacker => {
            if let Some(target) = unit.move_target {
                move_toward(world, ctx, i, target);
            }
        }
        UnitState::Idle => {
            let pos = unit.pos;
            let target = match unit.move_target.filter(|t| t.distance(pos) > ARRIVAL_RADIUS) {
                Some(target) => target,
                None => {
                    let dist = ctx.rng.range(WANDER_RADIUS * 0.3, WANDER_RADIUS);
                    let target = clamp_inside(world, pos + polar_to_cartesian(dist, ctx.rng.angle()));
                    world.units[i].move_target = Some(target);
                    target
                }
            };
            move_toward(world, ctx, i, target);
        }
        UnitState::Casting => {}
    }
}

/// Step toward `target` (or the active detour); returns true on arrival
fn move_toward(world: &mut World, ctx: &mut TickContext, i: usize, target: Vec2) -> bool {
    let unit = &world.units[i];
    let pos = unit.pos;
    let goal = unit.detour.unwrap_or(target);
    let dist = goal.distance(pos);
    if dist <= ARRIVAL_RADIUS {
        if unit.detour.is_some() {
            let unit = &mut world.units[i];
            unit.detour = None;
            unit.stuck.reset();
            return false;
        }
        return true;
    }

    let mut speed = unit.base_speed();
    if unit.status.is_slowed() {
        speed *= SLOW_SPEED_FACTOR;
    }
    if world.map.tile_at(pos) == Some(Tile::Mud) {
        speed *= MUD_SPEED_FACTOR;
    }
    let speed = speed.max(UNIT_MIN_SPEED) * ctx.mult;

    let desired = (goal - pos) / dist;
    let dir = if unit.state.is_fleeing() {
        desired
    } else {
        steer(&world.map, pos, desired, unit.heading, unit.team)
    };
    let dest = pos + dir * speed.min(dist);
    let blocked = world.map.is_blocked_for(dest, unit.team);

    let unit = &mut world.units[i];
    if blocked {
        unit.move_target = None;
        unit.status.knockback -= dir * WALL_BOUNCE_IMPULSE;
    } else {
        unit.pos = dest;
        unit.heading = dir;
    }

    if unit.stuck.record(goal.distance(unit.pos), STUCK_EPSILON * ctx.mult, STUCK_TICKS) {
        unit.stuck.reset();
        let offset = polar_to_cartesian(ctx.rng.range(0.5, 1.0) * WANDER_RADIUS, ctx.rng.angle());
        let candidate = clamp_inside(world, pos + offset);
        if !world.map.is_blocked_for(candidate, world.units[i].team) {
            log::trace!("unit {} stuck, detouring", world.units[i].id.0);
            world.units[i].detour = Some(candidate);
        }
    }
    false
}

/// Fire single-use tiles when a unit enters a new cell
fn enter_cell(world: &mut World, ctx: &mut TickContext, i: usize, clones: &mut Vec<Unit>) {
    let cell = world.map.cell_at(world.units[i].pos);
    if world.units[i].last_cell == Some(cell) {
        return;
    }
    world.units[i].last_cell = Some(cell);
    let Some(tile) = world.map.consume(cell) else {
        return;
    };
    let unit = &mut world.units[i];
    match tile {
        Tile::HealPack => {
            unit.heal(unit.max_hp * HEAL_PACK_FRACTION);
            ctx.outbox.play(AudioCue::Heal);
            ctx.outbox.effect(VisualEffect::Particles {
                pos: unit.pos,
                count: 12,
                color: EffectColor::Heal,
            });
        }
        Tile::LevelUp => {
            if unit.level_up() {
                ctx.outbox.play(AudioCue::LevelUp);
                log::debug!("unit {} reached level {}", unit.id.0, unit.level);
            }
        }
        Tile::Cloner { .. } => {
            unit.cloned = true;
            let clone = make_clone(world, ctx.rng, i);
            ctx.outbox.play(AudioCue::Clone);
            ctx.outbox.effect(VisualEffect::Ring {
                pos: clone.pos,
                radius: UNIT_RADIUS * 2.0,
                duration_ms: 300.0,
                color: EffectColor::Team(clone.team),
            });
            clones.push(clone);
        }
        _ => {}
    }
}

fn make_clone(world: &World, rng: &mut SimRng, i: usize) -> Unit {
    let original = &world.units[i];
    let offset = polar_to_cartesian(UNIT_RADIUS * 2.0, rng.angle());
    let spot = clamp_inside(world, original.pos + offset);
    let pos = if world.map.is_blocked_for(spot, original.team) {
        original.pos
    } else {
        spot
    };
    let mut clone = Unit::new(original.id, original.team, pos).with_level(original.level);
    clone.weapon = original.weapon.map(|w| Weapon::new(w.kind));
    clone.max_hp = original.max_hp;
    clone.hp = (original.hp * CLONE_HP_FRACTION).max(1.0);
    clone.heading = original.heading;
    clone.last_cell = Some(world.map.cell_at(pos));
    clone.cloned = true;
    clone
}

fn apply_conveyor(world: &mut World, mult: f32, i: usize) {
    let unit = &mut world.units[i];
    if let Some(Tile::Conveyor { direction }) = world.map.tile_at(unit.pos) {
        let dest = unit.pos + direction.vector() * CONVEYOR_SPEED * mult;
        if !world.map.is_blocked_for(dest, unit.team) {
            unit.pos = dest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::Outbox;
    use crate::sim::state::{Team, UnitId};
    use crate::sim::tiles::{Direction, TileMap};
    use crate::sim::weapons::{Cast, CastPayload, WeaponKind};

    fn run(world: &mut World, ticks: usize) -> Outbox {
        let mut rng = SimRng::new(11);
        let mut outbox = Outbox::new();
        for _ in 0..ticks {
            let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
            update_units(world, &mut ctx);
        }
        outbox
    }

    #[test]
    fn test_hazard_outranks_enemies() {
        let mut world = World::new(TileMap::new(8, 8));
        world.map.set(Cell::new(1, 1), Tile::Lava);
        let a = world.spawn_unit(Team(0), Cell::new(1, 1).center());
        world.spawn_unit(Team(1), Cell::new(3, 1).center());
        run(&mut world, 1);
        let unit = world.unit(a).unwrap();
        assert_eq!(unit.state, UnitState::FleeingHazard);
        assert!(unit.hp < UNIT_BASE_HP);
        let target = unit.move_target.unwrap();
        assert!(!world.map.is_hazard_at(target));
    }

    #[test]
    fn test_wounded_ranged_unit_flees_attacker() {
        let mut world = World::new(TileMap::new(20, 20));
        let a = world.spawn_unit(Team(0), Vec2::new(300.0, 300.0));
        let b = world.spawn_unit(Team(1), Vec2::new(400.0, 300.0));
        world.units[0].weapon = Some(Weapon::new(WeaponKind::Bow));
        world.units[0].hp = 20.0;
        world.units[0].last_attacker = Some(b);
        world.units[0].attacker_memory_ms = ATTACKER_MEMORY_MS;
        world.units[1].status.stunned_ms = 10_000.0;
        let before = world.units[0].pos.distance(world.units[1].pos);
        run(&mut world, 5);
        let unit = world.unit(a).unwrap();
        assert_eq!(unit.state, UnitState::FleeingAttacker);
        assert!(unit.pos.distance(world.unit(b).unwrap().pos) > before);
    }

    #[test]
    fn test_melee_unit_pursues_attacker() {
        let mut world = World::new(TileMap::new(20, 20));
        let a = world.spawn_unit(Team(0), Vec2::new(300.0, 300.0));
        let b = world.spawn_unit(Team(1), Vec2::new(400.0, 300.0));
        world.units[0].hp = 20.0;
        world.units[0].last_attacker = Some(b);
        world.units[0].attacker_memory_ms = ATTACKER_MEMORY_MS;
        world.units[1].status.stunned_ms = 10_000.0;
        run(&mut world, 1);
        let unit = world.unit(a).unwrap();
        assert_eq!(unit.state, UnitState::Aggressive);
        assert_eq!(unit.attack_target, Some(TargetRef::Unit(b)));
    }

    #[test]
    fn test_unarmed_unit_equips_ground_weapon_once() {
        let mut world = World::new(TileMap::new(10, 10));
        let a = world.spawn_unit(Team(0), Vec2::new(48.0, 48.0));
        world.place_weapon(WeaponKind::Bow, Vec2::new(150.0, 48.0));
        let outbox = run(&mut world, 120);
        assert_eq!(world.unit(a).unwrap().weapon.map(|w| w.kind), Some(WeaponKind::Bow));
        assert!(world.weapons[0].taken);
        assert_eq!(outbox.cues.iter().filter(|c| **c == AudioCue::Equip).count(), 1);
    }

    #[test]
    fn test_heal_pack_consumed_once() {
        let mut world = World::new(TileMap::new(6, 6));
        let cell = Cell::new(2, 2);
        world.map.set(cell, Tile::HealPack);
        let a = world.spawn_unit(Team(0), cell.center());
        world.units[0].hp = 30.0;
        run(&mut world, 2);
        assert_eq!(world.unit(a).unwrap().hp, 70.0);
        assert_eq!(world.map.get(cell), Some(Tile::Floor));
    }

    #[test]
    fn test_cloner_spawns_half_hp_copy() {
        let mut world = World::new(TileMap::new(8, 8));
        let cell = Cell::new(3, 3);
        world.map.set(cell, Tile::Cloner { replication_count: 1 });
        let a = world.spawn_unit(Team(2), cell.center());
        run(&mut world, 1);
        assert_eq!(world.units.len(), 2);
        assert_eq!(world.map.get(cell), Some(Tile::Floor));
        let clone = &world.units[1];
        assert!(clone.id > a);
        assert_eq!(clone.team, Team(2));
        assert_eq!(clone.hp, UNIT_BASE_HP * CLONE_HP_FRACTION);
    }

    #[test]
    fn test_casting_unit_holds_position() {
        let mut world = World::new(TileMap::new(10, 10));
        let a = world.spawn_unit(Team(0), Vec2::new(100.0, 100.0));
        world.spawn_unit(Team(1), Vec2::new(200.0, 100.0));
        world.units[0].cast = Some(Cast {
            remaining_ms: 500.0,
            target_pos: Vec2::new(200.0, 100.0),
            payload: CastPayload::Area(crate::sim::hazards::AreaSpec {
                kind: crate::sim::hazards::AreaKind::Fire,
                radius: 10.0,
                growth_per_tick: 0.0,
                max_radius: 10.0,
                duration_ms: 100.0,
                damage_per_tick: 0.1,
                slow_ms: 0.0,
                poison: None,
            }),
            power: BASE_POWER,
        });
        world.units[0].state = UnitState::Casting;
        run(&mut world, 3);
        let unit = world.unit(a).unwrap();
        assert_eq!(unit.pos, Vec2::new(100.0, 100.0));
        assert_eq!(unit.state, UnitState::Casting);
        assert!(unit.cast.unwrap().remaining_ms < 500.0);
    }

    #[test]
    fn test_conveyor_pushes_unit() {
        let mut world = World::new(TileMap::new(8, 8));
        let cell = Cell::new(3, 3);
        world.map.set(cell, Tile::Conveyor { direction: Direction::South });
        let a = world.spawn_unit(Team(0), cell.center());
        let y = world.units[0].pos.y;
        run(&mut world, 1);
        // Wandering moves at most one step; the belt adds its push on top
        let pushed = world.unit(a).unwrap().pos.y - y;
        assert!(pushed >= CONVEYOR_SPEED - UNIT_BASE_SPEED - 1e-3);
    }

    #[test]
    fn test_blocked_unit_eventually_detours() {
        let mut world = World::new(TileMap::new(10, 5));
        for row in 0..5 {
            world.map.set(Cell::new(3, row), Tile::Wall);
        }
        let a = world.spawn_unit(Team(0), Cell::new(2, 2).center());
        world.place_nexus(Team(1), Cell::new(8, 2).center());
        let mut rng = SimRng::new(11);
        let mut outbox = Outbox::new();
        let mut detoured = false;
        for _ in 0..400 {
            let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
            update_units(&mut world, &mut ctx);
            detoured |= world.unit(a).unwrap().detour.is_some();
        }
        assert!(detoured);
        assert_eq!(world.unit(a).unwrap().state, UnitState::AssaultingStructure);
        assert!(world.map.cell_at(world.unit(a).unwrap().pos).col < 3);
    }

    #[test]
    fn test_ready_special_waits_while_fleeing_hazard() {
        let mut world = World::new(TileMap::new(8, 8));
        let lava = Cell::new(1, 1);
        world.map.set(lava, Tile::Lava);
        let a = world.spawn_unit(Team(0), lava.center());
        world.units[0].weapon = Some(Weapon::new(WeaponKind::Hammer));
        world.units[0].weapon.as_mut().unwrap().special_cooldown_ms = 0.0;
        world.spawn_unit(Team(1), lava.center() + Vec2::new(30.0, 0.0));
        world.units[1].status.stunned_ms = 10_000.0;
        let outbox = run(&mut world, 1);
        let unit = world.unit(a).unwrap();
        assert_eq!(unit.state, UnitState::FleeingHazard);
        assert_ne!(unit.pos, lava.center());
        assert!(unit.weapon.unwrap().special_ready());
        assert_eq!(world.units[1].hp, UNIT_BASE_HP);
        assert!(!outbox.cues.contains(&AudioCue::Special(WeaponKind::Hammer)));
    }

    #[test]
    fn test_unit_on_used_cloner_engages_enemy() {
        let mut world = World::new(TileMap::new(12, 8));
        let cell = Cell::new(3, 3);
        world.map.set(cell, Tile::Cloner { replication_count: 50 });
        let a = world.spawn_unit(Team(0), cell.center());
        let enemy = world.spawn_unit(Team(1), cell.center() + Vec2::new(100.0, 0.0));
        world.units[1].status.stunned_ms = 100_000.0;
        world.units[1].hp = 10_000.0;
        world.units[1].max_hp = 10_000.0;

        let mut rng = SimRng::new(11);
        let mut outbox = Outbox::new();
        let mut aggressive_ticks = 0;
        for _ in 0..300 {
            let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
            update_units(&mut world, &mut ctx);
            let unit = world.unit(a).unwrap();
            assert_ne!(unit.state, UnitState::SeekingItem);
            if unit.state == UnitState::Aggressive {
                aggressive_ticks += 1;
            }
        }
        assert!(world.unit(a).unwrap().cloned);
        assert!(aggressive_ticks > 0);
        assert!(world.unit(enemy).unwrap().hp < 10_000.0);
    }

    #[test]
    fn test_magnet_channel_reaims_at_moved_target() {
        let mut world = World::new(TileMap::new(20, 20));
        let a = world.spawn_unit(Team(0), Vec2::new(200.0, 200.0));
        world.spawn_unit(Team(1), Vec2::new(300.0, 200.0));
        world.units[0].weapon = Some(Weapon::new(WeaponKind::MagnetCore));
        world.units[1].status.stunned_ms = 100_000.0;

        let mut rng = SimRng::new(11);
        let mut outbox = Outbox::new();
        let mut step = |world: &mut World, ticks: usize| {
            for _ in 0..ticks {
                let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
                update_units(world, &mut ctx);
            }
        };

        step(&mut world, 1);
        assert_eq!(world.unit(a).unwrap().state, UnitState::Casting);
        let moved = Vec2::new(300.0, 280.0);
        world.units[1].pos = moved;

        // Still on cooldown: the channel keeps its original aim
        step(&mut world, 60);
        assert_eq!(world.unit(a).unwrap().cast.unwrap().target_pos, Vec2::new(300.0, 200.0));

        step(&mut world, 15);
        let cast = world.unit(a).unwrap().cast.unwrap();
        assert_eq!(cast.target_pos, moved);
        assert!(world.fields.is_empty());

        step(&mut world, 120);
        assert_eq!(world.fields.len(), 1);
        assert_eq!(world.fields[0].center, moved);
    }

    #[test]
    fn test_lost_target_returns_to_idle() {
        let mut world = World::new(TileMap::new(10, 10));
        world.spawn_unit(Team(0), Vec2::new(100.0, 100.0));
        world.units[0].state = UnitState::Aggressive;
        world.units[0].attack_target = Some(TargetRef::Unit(UnitId(999)));
        run(&mut world, 1);
        assert_eq!(world.units[0].state, UnitState::Idle);
        assert!(world.units[0].attack_target.is_none());
    }
}
