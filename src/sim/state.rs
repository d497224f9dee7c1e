//! Match world state and core entity types
//!
//! Everything the deterministic pipeline reads or writes lives in [`World`].
//! Entities refer to each other by id only; the world resolves ids so that a
//! removed entity reads as "gone" instead of dangling.

use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::hazards::{AreaEffect, MagneticField};
use super::projectile::Projectile;
use super::tiles::{Cell, TileMap};
use super::weapons::{Cast, Weapon, WeaponKind};
use crate::consts::*;

/// Team tag (0..=3 in practice)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Team(pub u8);

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.0)
    }
}

/// Unit identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Structure identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NexusId(pub u32);

/// Reference to anything that can be attacked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetRef {
    Unit(UnitId),
    Nexus(NexusId),
}

/// Behavioral state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitState {
    #[default]
    Idle,
    SeekingWeapon,
    SeekingHeal,
    SeekingItem,
    FleeingHazard,
    FleeingAttacker,
    Aggressive,
    AssaultingStructure,
    /// Channeling a cast; movement and re-evaluation are locked
    Casting,
}

impl UnitState {
    pub fn is_fleeing(self) -> bool {
        matches!(self, UnitState::FleeingHazard | UnitState::FleeingAttacker)
    }
}

/// Poison parameters carried by hits and clouds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoisonSpec {
    pub duration_ms: f32,
    pub damage_per_tick: f32,
}

/// Active poison on a unit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Poison {
    pub active: bool,
    pub duration_ms: f32,
    pub damage_per_tick: f32,
}

/// Status effects on a unit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusEffects {
    pub stunned_ms: f32,
    pub slowed_ms: f32,
    pub poison: Poison,
    /// Displacement applied per tick, decaying
    pub knockback: Vec2,
}

impl StatusEffects {
    pub fn is_stunned(&self) -> bool {
        self.stunned_ms > 0.0
    }

    pub fn is_slowed(&self) -> bool {
        self.slowed_ms > 0.0
    }

    /// Count down timers; returns poison damage owed this tick
    pub fn tick(&mut self, step_ms: f32, mult: f32) -> f32 {
        self.stunned_ms = (self.stunned_ms - step_ms).max(0.0);
        self.slowed_ms = (self.slowed_ms - step_ms).max(0.0);
        if !self.poison.active {
            return 0.0;
        }
        let damage = self.poison.damage_per_tick * mult;
        self.poison.duration_ms -= step_ms;
        if self.poison.duration_ms <= 0.0 {
            self.poison = Poison::default();
        }
        damage
    }
}

/// One application of damage plus its side effects
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hit {
    pub damage: f32,
    pub source: Option<UnitId>,
    pub knockback: Vec2,
    pub stun_ms: f32,
    pub slow_ms: f32,
    pub poison: Option<PoisonSpec>,
    /// Cancels an ongoing cast on the victim
    pub interrupt: bool,
}

impl Hit {
    pub fn new(damage: f32) -> Self {
        Self {
            damage,
            ..Default::default()
        }
    }

    pub fn from_unit(mut self, source: UnitId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_knockback(mut self, knockback: Vec2) -> Self {
        self.knockback = knockback;
        self
    }

    /// Stuns always interrupt
    pub fn with_stun(mut self, stun_ms: f32) -> Self {
        self.stun_ms = stun_ms;
        if stun_ms > 0.0 {
            self.interrupt = true;
        }
        self
    }

    pub fn with_slow(mut self, slow_ms: f32) -> Self {
        self.slow_ms = slow_ms;
        self
    }

    pub fn with_poison(mut self, poison: Option<PoisonSpec>) -> Self {
        self.poison = poison;
        self
    }

    pub fn interrupting(mut self) -> Self {
        self.interrupt = true;
        self
    }
}

/// What a damage application did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target was already dead/destroying
    Ignored,
    Damaged,
    /// This hit took the target to zero
    Killed,
}

/// Anything hazards, areas and projectiles can hurt
pub trait Damageable {
    fn target_ref(&self) -> TargetRef;
    fn team(&self) -> Team;
    fn position(&self) -> Vec2;
    fn is_alive(&self) -> bool;
    /// Radius used for hit tests
    fn hit_radius(&self) -> f32;
    /// Apply a hit; hp is clamped at zero
    fn apply_damage(&mut self, hit: &Hit) -> DamageOutcome;
}

/// Per-unit stuck detection bookkeeping
///
/// Tracks the closest approach to the current goal; ticks without real
/// progress accumulate until a detour is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StuckTracker {
    pub ticks: u32,
    pub best_distance: Option<f32>,
}

impl StuckTracker {
    /// Record the remaining distance after a step; returns true once stuck
    pub fn record(&mut self, remaining: f32, epsilon: f32, limit: u32) -> bool {
        match self.best_distance {
            Some(best) if remaining > best - epsilon => self.ticks += 1,
            _ => {
                self.best_distance = Some(remaining);
                self.ticks = 0;
            }
        }
        self.ticks > limit
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a seeking unit is heading for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemTarget {
    Weapon(u32),
    Tile(Cell),
}

/// An autonomous combat unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub team: Team,
    pub pos: Vec2,
    /// Last movement heading (unit vector)
    pub heading: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    /// 1..=MAX_LEVEL
    pub level: u8,
    pub weapon: Option<Weapon>,
    pub state: UnitState,
    pub move_target: Option<Vec2>,
    pub attack_target: Option<TargetRef>,
    pub item_target: Option<ItemTarget>,
    /// Temporary target assigned by stuck recovery
    pub detour: Option<Vec2>,
    pub attack_cooldown_ms: f32,
    pub status: StatusEffects,
    pub cast: Option<Cast>,
    pub last_attacker: Option<UnitId>,
    pub attacker_memory_ms: f32,
    pub stuck: StuckTracker,
    /// Cell occupied at the end of the previous tick (entry triggers)
    pub last_cell: Option<Cell>,
    /// Set once a cloner has copied this unit (and on the copy); such units
    /// no longer go looking for cloners
    #[serde(default)]
    pub cloned: bool,
    pub kills: u32,
}

impl Unit {
    pub fn new(id: UnitId, team: Team, pos: Vec2) -> Self {
        Self {
            id,
            team,
            pos,
            heading: Vec2::X,
            hp: UNIT_BASE_HP,
            max_hp: UNIT_BASE_HP,
            level: 1,
            weapon: None,
            state: UnitState::Idle,
            move_target: None,
            attack_target: None,
            item_target: None,
            detour: None,
            attack_cooldown_ms: 0.0,
            status: StatusEffects::default(),
            cast: None,
            last_attacker: None,
            attacker_memory_ms: 0.0,
            stuck: StuckTracker::default(),
            last_cell: None,
            cloned: false,
            kills: 0,
        }
    }

    pub fn with_weapon(mut self, kind: WeaponKind) -> Self {
        self.weapon = Some(Weapon::new(kind));
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level.clamp(1, MAX_LEVEL);
        self
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    pub fn hp_fraction(&self) -> f32 {
        if self.max_hp <= 0.0 {
            0.0
        } else {
            self.hp / self.max_hp
        }
    }

    /// Equipped weapon or bare hands
    pub fn armament(&self) -> Weapon {
        self.weapon.unwrap_or_else(Weapon::bare_hands)
    }

    fn level_steps(&self) -> f32 {
        (self.level.clamp(1, MAX_LEVEL) - 1) as f32
    }

    /// Damage dealt by a normal attack
    pub fn power(&self) -> f32 {
        (BASE_POWER + self.armament().bonuses.power) * (1.0 + 0.15 * self.level_steps())
    }

    /// Reach from this unit's edge
    pub fn attack_range(&self) -> f32 {
        BASE_ATTACK_RANGE + self.armament().bonuses.range
    }

    pub fn attack_cooldown_total_ms(&self) -> f32 {
        let base = (BASE_ATTACK_COOLDOWN_MS + self.armament().bonuses.cooldown_delta_ms)
            .max(MIN_ATTACK_COOLDOWN_MS);
        base * (1.0 - 0.08 * self.level_steps())
    }

    /// Movement speed before slow/terrain penalties, world units per tick
    pub fn base_speed(&self) -> f32 {
        (UNIT_BASE_SPEED + self.armament().bonuses.speed) * (1.0 + 0.05 * self.level_steps())
    }

    pub fn detection_range(&self) -> f32 {
        BASE_DETECTION_RANGE + self.armament().bonuses.detection
    }

    /// Raise the level by one; returns false at the cap
    pub fn level_up(&mut self) -> bool {
        if self.level >= MAX_LEVEL {
            return false;
        }
        self.level += 1;
        true
    }

    pub fn heal(&mut self, amount: f32) {
        self.hp = (self.hp + amount.max(0.0)).min(self.max_hp);
    }
}

impl Damageable for Unit {
    fn target_ref(&self) -> TargetRef {
        TargetRef::Unit(self.id)
    }

    fn team(&self) -> Team {
        self.team
    }

    fn position(&self) -> Vec2 {
        self.pos
    }

    fn is_alive(&self) -> bool {
        Unit::is_alive(self)
    }

    fn hit_radius(&self) -> f32 {
        UNIT_RADIUS
    }

    fn apply_damage(&mut self, hit: &Hit) -> DamageOutcome {
        if !Unit::is_alive(self) {
            return DamageOutcome::Ignored;
        }
        self.hp = (self.hp - hit.damage.max(0.0)).max(0.0);
        self.status.knockback += hit.knockback;
        self.status.stunned_ms = self.status.stunned_ms.max(hit.stun_ms);
        self.status.slowed_ms = self.status.slowed_ms.max(hit.slow_ms);
        if let Some(poison) = hit.poison {
            let current = self.status.poison;
            self.status.poison = Poison {
                active: true,
                duration_ms: current.duration_ms.max(poison.duration_ms),
                damage_per_tick: current.damage_per_tick.max(poison.damage_per_tick),
            };
        }
        if let Some(source) = hit.source {
            if source != self.id {
                self.last_attacker = Some(source);
                self.attacker_memory_ms = ATTACKER_MEMORY_MS;
            }
        }
        if hit.interrupt && self.cast.is_some() {
            log::trace!("unit {} cast interrupted", self.id.0);
            self.cast = None;
            self.state = UnitState::Idle;
        }
        if self.hp <= 0.0 {
            DamageOutcome::Killed
        } else {
            DamageOutcome::Damaged
        }
    }
}

/// Progress of a nexus explosion over one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestructionStep {
    Idle,
    Burst,
    Finished,
}

/// A team's destructible home structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nexus {
    pub id: NexusId,
    pub team: Team,
    pub pos: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    /// Remaining explosion time once hp reached zero
    pub destroying_ms: Option<f32>,
    /// Time until the next particle burst during the explosion
    pub burst_ms: f32,
    /// Explosion finished; removed at the next compaction
    pub destroyed: bool,
}

impl Nexus {
    pub fn new(id: NexusId, team: Team, pos: Vec2) -> Self {
        Self {
            id,
            team,
            pos,
            hp: NEXUS_BASE_HP,
            max_hp: NEXUS_BASE_HP,
            destroying_ms: None,
            burst_ms: 0.0,
            destroyed: false,
        }
    }

    /// Still intact and targetable
    pub fn is_standing(&self) -> bool {
        self.hp > 0.0 && self.destroying_ms.is_none() && !self.destroyed
    }

    /// Explosion countdown in progress
    pub fn is_exploding(&self) -> bool {
        self.destroying_ms.is_some() && !self.destroyed
    }

    /// Advance the explosion countdown
    pub fn tick_destruction(&mut self, step_ms: f32) -> DestructionStep {
        let Some(remaining) = self.destroying_ms.as_mut() else {
            return DestructionStep::Idle;
        };
        if self.destroyed {
            return DestructionStep::Idle;
        }
        *remaining -= step_ms;
        if *remaining <= 0.0 {
            self.destroyed = true;
            return DestructionStep::Finished;
        }
        self.burst_ms -= step_ms;
        if self.burst_ms <= 0.0 {
            self.burst_ms += NEXUS_BURST_MS;
            return DestructionStep::Burst;
        }
        DestructionStep::Idle
    }
}

impl Damageable for Nexus {
    fn target_ref(&self) -> TargetRef {
        TargetRef::Nexus(self.id)
    }

    fn team(&self) -> Team {
        self.team
    }

    fn position(&self) -> Vec2 {
        self.pos
    }

    fn is_alive(&self) -> bool {
        self.is_standing()
    }

    fn hit_radius(&self) -> f32 {
        NEXUS_RADIUS
    }

    /// Structures ignore status effects
    fn apply_damage(&mut self, hit: &Hit) -> DamageOutcome {
        if !self.is_standing() {
            return DamageOutcome::Ignored;
        }
        self.hp = (self.hp - hit.damage.max(0.0)).max(0.0);
        if self.hp <= 0.0 {
            self.destroying_ms = Some(NEXUS_EXPLOSION_MS);
            self.burst_ms = 0.0;
            DamageOutcome::Killed
        } else {
            DamageOutcome::Damaged
        }
    }
}

/// Every damageable entity in stable order: units first, then structures
pub fn damageables<'a>(
    units: &'a mut [Unit],
    nexuses: &'a mut [Nexus],
) -> impl Iterator<Item = &'a mut dyn Damageable> {
    units
        .iter_mut()
        .map(|u| u as &mut dyn Damageable)
        .chain(nexuses.iter_mut().map(|n| n as &mut dyn Damageable))
}

/// A weapon lying on the ground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundWeapon {
    pub id: u32,
    pub kind: WeaponKind,
    pub pos: Vec2,
    /// Picked up this tick; removed at the next compaction
    #[serde(default)]
    pub taken: bool,
}

/// Resolved position/team of a live target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInfo {
    pub pos: Vec2,
    pub team: Team,
    pub radius: f32,
}

/// Match rules that influence the simulation (part of the snapshot)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRules {
    /// Interval between random weapon drops; 0 disables drops
    pub weapon_drop_interval_ms: f32,
    /// Drops pause while this many weapons lie on the ground
    pub max_ground_weapons: usize,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            weapon_drop_interval_ms: 6000.0,
            max_ground_weapons: 4,
        }
    }
}

/// Monotonic entity id source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    /// Resume allocation after the given id
    pub fn starting_after(last: u32) -> Self {
        Self { next: last + 1 }
    }

    pub fn next(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u32 {
        self.next
    }
}

/// Complete simulation world (deterministic, serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub map: TileMap,
    /// Sorted by id (insertion order)
    pub units: Vec<Unit>,
    pub weapons: Vec<GroundWeapon>,
    pub nexuses: Vec<Nexus>,
    pub fields: Vec<MagneticField>,
    pub projectiles: Vec<Projectile>,
    pub areas: Vec<AreaEffect>,
    pub rules: MatchRules,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub drop_timer_ms: f32,
    pub ids: IdAllocator,
}

impl World {
    pub fn new(map: TileMap) -> Self {
        Self {
            map,
            units: Vec::new(),
            weapons: Vec::new(),
            nexuses: Vec::new(),
            fields: Vec::new(),
            projectiles: Vec::new(),
            areas: Vec::new(),
            rules: MatchRules::default(),
            time_ticks: 0,
            drop_timer_ms: 0.0,
            ids: IdAllocator::default(),
        }
    }

    pub fn with_rules(mut self, rules: MatchRules) -> Self {
        self.rules = rules;
        self
    }

    /// Playfield size in world units
    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.map.width(), self.map.height())
    }

    /// Place a fresh unit
    pub fn spawn_unit(&mut self, team: Team, pos: Vec2) -> UnitId {
        let id = UnitId(self.ids.next());
        self.units.push(Unit::new(id, team, pos));
        id
    }

    /// Place a unit built by the caller; its id is reassigned
    pub fn add_unit(&mut self, mut unit: Unit) -> UnitId {
        let id = UnitId(self.ids.next());
        unit.id = id;
        self.units.push(unit);
        id
    }

    pub fn place_nexus(&mut self, team: Team, pos: Vec2) -> NexusId {
        let id = NexusId(self.ids.next());
        self.nexuses.push(Nexus::new(id, team, pos));
        id
    }

    pub fn place_weapon(&mut self, kind: WeaponKind, pos: Vec2) -> u32 {
        let id = self.ids.next();
        self.weapons.push(GroundWeapon {
            id,
            kind,
            pos,
            taken: false,
        });
        id
    }

    pub fn add_field(&mut self, mut field: MagneticField) -> u32 {
        field.id = self.ids.next();
        let id = field.id;
        self.fields.push(field);
        id
    }

    pub fn unit_index(&self, id: UnitId) -> Option<usize> {
        self.units.binary_search_by_key(&id, |u| u.id).ok()
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.unit_index(id).map(|i| &self.units[i])
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.unit_index(id).map(move |i| &mut self.units[i])
    }

    pub fn nexus(&self, id: NexusId) -> Option<&Nexus> {
        self.nexuses.iter().find(|n| n.id == id)
    }

    pub fn nexus_mut(&mut self, id: NexusId) -> Option<&mut Nexus> {
        self.nexuses.iter_mut().find(|n| n.id == id)
    }

    /// Live target lookup; `None` means the target is lost
    pub fn resolve_target(&self, target: TargetRef) -> Option<TargetInfo> {
        match target {
            TargetRef::Unit(id) => self.unit(id).filter(|u| u.is_alive()).map(|u| TargetInfo {
                pos: u.pos,
                team: u.team,
                radius: UNIT_RADIUS,
            }),
            TargetRef::Nexus(id) => self.nexus(id).filter(|n| n.is_standing()).map(|n| TargetInfo {
                pos: n.pos,
                team: n.team,
                radius: NEXUS_RADIUS,
            }),
        }
    }

    /// Apply a hit to whatever `target` refers to
    pub fn damage(&mut self, target: TargetRef, hit: &Hit) -> DamageOutcome {
        match target {
            TargetRef::Unit(id) => self
                .unit_mut(id)
                .map_or(DamageOutcome::Ignored, |u| u.apply_damage(hit)),
            TargetRef::Nexus(id) => self
                .nexus_mut(id)
                .map_or(DamageOutcome::Ignored, |n| n.apply_damage(hit)),
        }
    }

    pub fn teams_with_living_units(&self) -> BTreeSet<Team> {
        self.units.iter().filter(|u| u.is_alive()).map(|u| u.team).collect()
    }

    pub fn teams_with_standing_nexus(&self) -> BTreeSet<Team> {
        self.nexuses.iter().filter(|n| n.is_standing()).map(|n| n.team).collect()
    }

    /// Every team present among units and structures
    pub fn teams(&self) -> BTreeSet<Team> {
        self.units
            .iter()
            .map(|u| u.team)
            .chain(self.nexuses.iter().map(|n| n.team))
            .collect()
    }

    /// Hash of positions and hit points, for determinism checks
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.time_ticks.hash(&mut hasher);
        for unit in &self.units {
            unit.id.hash(&mut hasher);
            unit.pos.x.to_bits().hash(&mut hasher);
            unit.pos.y.to_bits().hash(&mut hasher);
            unit.hp.to_bits().hash(&mut hasher);
        }
        for nexus in &self.nexuses {
            nexus.id.hash(&mut hasher);
            nexus.hp.to_bits().hash(&mut hasher);
        }
        for projectile in &self.projectiles {
            projectile.id.hash(&mut hasher);
            projectile.pos.x.to_bits().hash(&mut hasher);
            projectile.pos.y.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}
