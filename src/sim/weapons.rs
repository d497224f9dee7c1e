//! Weapon catalogue and attack resolution
//!
//! Every weapon kind maps to a static [`WeaponProfile`]: stat bonuses, a
//! tagged attack style, an optional special with its own cooldown and an
//! optional area left behind when the wielder dies.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::hazards::{AreaKind, AreaSpec, FieldSpec, MagneticField, spawn_area};
use super::projectile::{OnHit, ProjectileKind, ProjectileSpec, spawn_projectile};
use super::state::{DamageOutcome, Damageable, Hit, PoisonSpec, TargetRef, Team, UnitState, World};
use super::tick::TickContext;
use crate::audio::AudioCue;
use crate::consts::*;
use crate::effects::{EffectColor, VisualEffect};
use crate::{direction_to, rotate};

/// Combo counter value at which the next attack is the heavy finisher
pub const COMBO_FINISHER: u8 = 2;
pub const HEAVY_DAMAGE_MULT: f32 = 2.2;
pub const HEAVY_STUN_MS: f32 = 600.0;
pub const HEAVY_KNOCKBACK: f32 = 6.0;
/// Duration of the wind-up ring shown for a heavy finisher
pub const HEAVY_WINDUP_MS: f32 = 450.0;

/// Weapon kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WeaponKind {
    /// Bare hands; also what unknown names decode to
    Fists,
    Sword,
    Hammer,
    Bow,
    Scattergun,
    Javelin,
    Ricochet,
    Boomerang,
    IceWand,
    FireStaff,
    PoisonFlask,
    MagnetCore,
}

impl WeaponKind {
    /// Kinds that can appear as ground pickups
    pub const DROPPABLE: [WeaponKind; 11] = [
        WeaponKind::Sword,
        WeaponKind::Hammer,
        WeaponKind::Bow,
        WeaponKind::Scattergun,
        WeaponKind::Javelin,
        WeaponKind::Ricochet,
        WeaponKind::Boomerang,
        WeaponKind::IceWand,
        WeaponKind::FireStaff,
        WeaponKind::PoisonFlask,
        WeaponKind::MagnetCore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeaponKind::Fists => "fists",
            WeaponKind::Sword => "sword",
            WeaponKind::Hammer => "hammer",
            WeaponKind::Bow => "bow",
            WeaponKind::Scattergun => "scattergun",
            WeaponKind::Javelin => "javelin",
            WeaponKind::Ricochet => "ricochet",
            WeaponKind::Boomerang => "boomerang",
            WeaponKind::IceWand => "ice_wand",
            WeaponKind::FireStaff => "fire_staff",
            WeaponKind::PoisonFlask => "poison_flask",
            WeaponKind::MagnetCore => "magnet_core",
        }
    }

    /// Parse a weapon name; anything unrecognised is bare hands
    pub fn from_name(name: &str) -> Self {
        let kind = std::iter::once(WeaponKind::Fists)
            .chain(Self::DROPPABLE)
            .find(|k| k.as_str().eq_ignore_ascii_case(name.trim()));
        match kind {
            Some(kind) => kind,
            None => {
                log::warn!("Unknown weapon '{}', using fists", name);
                WeaponKind::Fists
            }
        }
    }

    /// Whether the default attack works at a distance
    pub fn is_ranged(self) -> bool {
        !matches!(self.profile().style, AttackStyle::Melee { .. })
    }

    pub fn profile(self) -> WeaponProfile {
        let melee = |power, range, cooldown_delta_ms, speed| WeaponBonuses {
            power,
            range,
            cooldown_delta_ms,
            speed,
            detection: 0.0,
        };
        match self {
            WeaponKind::Fists => WeaponProfile::new(
                WeaponBonuses::default(),
                AttackStyle::Melee {
                    knockback: 1.0,
                    combo: false,
                },
            ),
            WeaponKind::Sword => WeaponProfile::new(
                melee(6.0, 4.0, -150.0, 0.0),
                AttackStyle::Melee {
                    knockback: 1.5,
                    combo: true,
                },
            ),
            WeaponKind::Hammer => WeaponProfile::new(
                melee(10.0, 6.0, 350.0, -0.25),
                AttackStyle::Melee {
                    knockback: 3.5,
                    combo: false,
                },
            )
            .with_special(
                Special::GroundSlam {
                    radius: 60.0,
                    stun_ms: 700.0,
                    damage_mult: 0.8,
                },
                5000.0,
            ),
            WeaponKind::Bow => WeaponProfile::new(
                WeaponBonuses::ranged(2.0, 180.0, 100.0, 60.0),
                AttackStyle::Shot {
                    projectile: ProjectileSpec::simple(ProjectileKind::Arrow, 7.0, 320.0, 1.0),
                },
            )
            .with_inaccuracy(0.12),
            WeaponKind::Scattergun => WeaponProfile::new(
                WeaponBonuses::ranged(0.0, 110.0, 300.0, 0.0),
                AttackStyle::Volley {
                    projectile: ProjectileSpec::simple(ProjectileKind::Pellet, 6.5, 180.0, 0.45),
                    count: 5,
                    spread: 0.6,
                },
            )
            .with_inaccuracy(0.2),
            WeaponKind::Javelin => WeaponProfile::new(
                WeaponBonuses {
                    speed: -0.1,
                    ..WeaponBonuses::ranged(5.0, 150.0, 350.0, 20.0)
                },
                AttackStyle::Shot {
                    projectile: ProjectileSpec {
                        pierce: 2,
                        ..ProjectileSpec::simple(ProjectileKind::Javelin, 6.0, 300.0, 1.2)
                    },
                },
            )
            .with_inaccuracy(0.08),
            WeaponKind::Ricochet => WeaponProfile::new(
                WeaponBonuses::ranged(1.0, 160.0, 150.0, 20.0),
                AttackStyle::Shot {
                    projectile: ProjectileSpec {
                        bounces: 3,
                        ..ProjectileSpec::simple(ProjectileKind::Ricochet, 6.0, 480.0, 0.8)
                    },
                },
            )
            .with_inaccuracy(0.15),
            WeaponKind::Boomerang => WeaponProfile::new(
                WeaponBonuses::ranged(3.0, 130.0, 400.0, 0.0),
                AttackStyle::Shot {
                    projectile: ProjectileSpec {
                        returning: true,
                        ..ProjectileSpec::simple(ProjectileKind::Boomerang, 5.0, 150.0, 0.9)
                    },
                },
            )
            .with_inaccuracy(0.1),
            WeaponKind::IceWand => WeaponProfile::new(
                WeaponBonuses::ranged(1.0, 150.0, 200.0, 30.0),
                AttackStyle::Shot {
                    projectile: ProjectileSpec {
                        on_hit: OnHit {
                            slow_ms: 800.0,
                            ..OnHit::default()
                        },
                        detonate: Some(ICE_CLOUD),
                        ..ProjectileSpec::simple(ProjectileKind::IceShard, 5.5, 260.0, 0.7)
                    },
                },
            )
            .with_inaccuracy(0.1)
            .with_special(Special::Blizzard { area: BLIZZARD }, 7000.0),
            WeaponKind::FireStaff => WeaponProfile::new(
                WeaponBonuses {
                    speed: -0.1,
                    ..WeaponBonuses::ranged(4.0, 140.0, 900.0, 20.0)
                },
                AttackStyle::Cast {
                    channel_ms: 600.0,
                    payload: CastPayload::Area(FIRE_BURST),
                },
            ),
            WeaponKind::PoisonFlask => WeaponProfile {
                on_death: Some(POISON_CLOUD),
                ..WeaponProfile::new(
                    WeaponBonuses::ranged(0.0, 120.0, 1400.0, 20.0),
                    AttackStyle::Summon { area: POISON_CLOUD },
                )
                .with_special(Special::Detonate { damage_mult: 2.5 }, 4000.0)
            },
            WeaponKind::MagnetCore => WeaponProfile {
                allow_recast: true,
                ..WeaponProfile::new(
                    WeaponBonuses::ranged(2.0, 160.0, 400.0, 40.0),
                    AttackStyle::Cast {
                        channel_ms: 1800.0,
                        payload: CastPayload::Field(MAGNET_FIELD),
                    },
                )
            },
        }
    }
}

impl From<String> for WeaponKind {
    fn from(name: String) -> Self {
        WeaponKind::from_name(&name)
    }
}

impl From<WeaponKind> for String {
    fn from(kind: WeaponKind) -> Self {
        kind.as_str().to_string()
    }
}

const ICE_CLOUD: AreaSpec = AreaSpec {
    kind: AreaKind::Ice,
    radius: 26.0,
    growth_per_tick: 0.0,
    max_radius: 26.0,
    duration_ms: 1500.0,
    damage_per_tick: 0.05,
    slow_ms: 600.0,
    poison: None,
};

const BLIZZARD: AreaSpec = AreaSpec {
    kind: AreaKind::Ice,
    radius: 40.0,
    growth_per_tick: 0.5,
    max_radius: 70.0,
    duration_ms: 3000.0,
    damage_per_tick: 0.15,
    slow_ms: 900.0,
    poison: None,
};

const FIRE_BURST: AreaSpec = AreaSpec {
    kind: AreaKind::Fire,
    radius: 12.0,
    growth_per_tick: 1.5,
    max_radius: 56.0,
    duration_ms: 2000.0,
    damage_per_tick: 0.35,
    slow_ms: 0.0,
    poison: None,
};

const POISON_CLOUD: AreaSpec = AreaSpec {
    kind: AreaKind::Poison,
    radius: 34.0,
    growth_per_tick: 0.0,
    max_radius: 34.0,
    duration_ms: 4000.0,
    damage_per_tick: 0.05,
    slow_ms: 0.0,
    poison: Some(PoisonSpec {
        duration_ms: 2000.0,
        damage_per_tick: 0.08,
    }),
};

const MAGNET_FIELD: FieldSpec = FieldSpec {
    radius: 110.0,
    growth_per_tick: -0.4,
    min_radius: 24.0,
    max_radius: 110.0,
    damage_per_tick: 0.06,
    pull_strength: 0.35,
    lifetime_ms: Some(6000.0),
};

/// Stat bonuses an equipped weapon grants
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeaponBonuses {
    pub power: f32,
    pub range: f32,
    pub cooldown_delta_ms: f32,
    pub speed: f32,
    pub detection: f32,
}

impl WeaponBonuses {
    fn ranged(power: f32, range: f32, cooldown_delta_ms: f32, detection: f32) -> Self {
        Self {
            power,
            range,
            cooldown_delta_ms,
            speed: 0.0,
            detection,
        }
    }
}

/// How far a target may drift from the aimed point before a recastable
/// channel re-aims
pub const RECAST_DRIFT: f32 = TILE_SIZE;

/// What a channel produces when it completes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CastPayload {
    Area(AreaSpec),
    Field(FieldSpec),
}

/// Default attack behaviour
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackStyle {
    Melee { knockback: f32, combo: bool },
    Shot { projectile: ProjectileSpec },
    Volley { projectile: ProjectileSpec, count: u32, spread: f32 },
    Cast { channel_ms: f32, payload: CastPayload },
    Summon { area: AreaSpec },
}

/// Weapon special abilities
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Special {
    /// Radial stun around the wielder when an enemy is in reach
    GroundSlam { radius: f32, stun_ms: f32, damage_mult: f32 },
    /// Ice storm on the nearest enemy in detection range
    Blizzard { area: AreaSpec },
    /// Burst the wielder's own clouds while an enemy stands in one
    Detonate { damage_mult: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecialSpec {
    pub special: Special,
    pub cooldown_ms: f32,
}

/// Static description of a weapon kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponProfile {
    pub bonuses: WeaponBonuses,
    pub style: AttackStyle,
    pub special: Option<SpecialSpec>,
    /// Area left where the wielder dies
    pub on_death: Option<AreaSpec>,
    /// Attacking while channeling restarts the channel
    pub allow_recast: bool,
    /// Total heading jitter for ranged shots (radians)
    pub inaccuracy: f32,
}

impl WeaponProfile {
    fn new(bonuses: WeaponBonuses, style: AttackStyle) -> Self {
        Self {
            bonuses,
            style,
            special: None,
            on_death: None,
            allow_recast: false,
            inaccuracy: 0.0,
        }
    }

    fn with_special(mut self, special: Special, cooldown_ms: f32) -> Self {
        self.special = Some(SpecialSpec { special, cooldown_ms });
        self
    }

    fn with_inaccuracy(mut self, inaccuracy: f32) -> Self {
        self.inaccuracy = inaccuracy;
        self
    }
}

impl ProjectileSpec {
    fn simple(kind: ProjectileKind, speed: f32, max_range: f32, damage_mult: f32) -> Self {
        Self {
            kind,
            speed,
            max_range,
            damage_mult,
            pierce: 0,
            bounces: 0,
            on_hit: OnHit::default(),
            detonate: None,
            returning: false,
        }
    }
}

/// An equipped weapon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub bonuses: WeaponBonuses,
    /// Successful normal attacks toward the heavy finisher
    #[serde(default)]
    pub combo: u8,
    /// Time until the special is ready
    #[serde(default)]
    pub special_cooldown_ms: f32,
}

impl Weapon {
    pub fn new(kind: WeaponKind) -> Self {
        let profile = kind.profile();
        Self {
            kind,
            bonuses: profile.bonuses,
            combo: 0,
            special_cooldown_ms: profile.special.map_or(0.0, |s| s.cooldown_ms),
        }
    }

    pub fn bare_hands() -> Self {
        Self::new(WeaponKind::Fists)
    }

    pub fn special_ready(&self) -> bool {
        self.kind.profile().special.is_some() && self.special_cooldown_ms <= 0.0
    }

    pub fn tick(&mut self, step_ms: f32) {
        self.special_cooldown_ms = (self.special_cooldown_ms - step_ms).max(0.0);
    }
}

/// An in-progress channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub remaining_ms: f32,
    pub target_pos: Vec2,
    pub payload: CastPayload,
    /// Caster power when the channel began
    pub power: f32,
}

/// Resolve the caster's default attack against `target`
///
/// No-op (returns false) while the cooldown is pending, the caster is
/// stunned, already channeling without recast, or the target is gone.
pub fn attack(world: &mut World, ctx: &mut TickContext, caster: usize, target: TargetRef) -> bool {
    let Some(unit) = world.units.get(caster) else {
        return false;
    };
    if !unit.is_alive() || unit.attack_cooldown_ms > 0.0 || unit.status.is_stunned() {
        return false;
    }
    let weapon = unit.armament();
    let profile = weapon.kind.profile();
    if unit.cast.is_some() && !profile.allow_recast {
        return false;
    }
    let Some(info) = world.resolve_target(target) else {
        return false;
    };
    let (id, team, pos) = (unit.id, unit.team, unit.pos);
    let power = unit.power();
    let cooldown = unit.attack_cooldown_total_ms();
    let dir = direction_to(pos, info.pos);

    match profile.style {
        AttackStyle::Melee { knockback, combo } => {
            let heavy = combo && weapon.combo >= COMBO_FINISHER;
            let hit = if heavy {
                Hit::new(power * HEAVY_DAMAGE_MULT)
                    .from_unit(id)
                    .with_knockback(dir * HEAVY_KNOCKBACK)
                    .with_stun(HEAVY_STUN_MS)
            } else {
                Hit::new(power).from_unit(id).with_knockback(dir * knockback)
            };
            let landed = world.damage(target, &hit) != DamageOutcome::Ignored;
            if combo && landed {
                if let Some(equipped) = world.units[caster].weapon.as_mut() {
                    equipped.combo = if heavy { 0 } else { equipped.combo + 1 };
                }
            }
            ctx.outbox.effect(VisualEffect::Line {
                from: pos,
                to: info.pos,
                color: EffectColor::Team(team),
            });
            if heavy {
                ctx.outbox.play(AudioCue::HeavyStrike);
                ctx.outbox.effect(VisualEffect::Ring {
                    pos,
                    radius: UNIT_RADIUS * 3.0,
                    duration_ms: HEAVY_WINDUP_MS,
                    color: EffectColor::Team(team),
                });
            }
        }
        AttackStyle::Shot { projectile } => {
            let heading = rotate(dir, ctx.rng.jitter(profile.inaccuracy));
            spawn_projectile(world, caster, heading, &projectile);
        }
        AttackStyle::Volley {
            projectile,
            count,
            spread,
        } => {
            let base = rotate(dir, ctx.rng.jitter(profile.inaccuracy));
            for k in 0..count {
                let offset = if count > 1 {
                    -spread / 2.0 + spread * k as f32 / (count - 1) as f32
                } else {
                    0.0
                };
                spawn_projectile(world, caster, rotate(base, offset), &projectile);
            }
        }
        AttackStyle::Cast { channel_ms, payload } => {
            let unit = &mut world.units[caster];
            unit.cast = Some(Cast {
                remaining_ms: channel_ms,
                target_pos: info.pos,
                payload,
                power,
            });
            unit.state = UnitState::Casting;
            unit.move_target = None;
        }
        AttackStyle::Summon { area } => {
            spawn_area(world, ctx, &area, info.pos, Some(team), Some(id), power);
        }
    }

    world.units[caster].attack_cooldown_ms = cooldown;
    ctx.outbox.play(AudioCue::Attack(weapon.kind));
    log::trace!("unit {} {} -> {:?}", id.0, weapon.kind.as_str(), target);
    true
}

/// Advance a channel; on completion the payload lands at the cast target
pub fn advance_cast(world: &mut World, ctx: &mut TickContext, caster: usize) {
    let unit = &mut world.units[caster];
    let Some(cast) = unit.cast.as_mut() else {
        return;
    };
    cast.remaining_ms -= ctx.step_ms;
    if cast.remaining_ms > 0.0 {
        return;
    }
    let cast = *cast;
    unit.cast = None;
    unit.state = UnitState::Idle;
    let (id, team) = (unit.id, unit.team);
    match cast.payload {
        CastPayload::Area(spec) => {
            spawn_area(world, ctx, &spec, cast.target_pos, Some(team), Some(id), cast.power);
        }
        CastPayload::Field(spec) => {
            let field = MagneticField::from_spec(&spec, cast.target_pos, Some(team), Some(id));
            world.add_field(field);
            ctx.outbox.effect(VisualEffect::Ring {
                pos: cast.target_pos,
                radius: spec.radius,
                duration_ms: spec.lifetime_ms.unwrap_or(1000.0),
                color: EffectColor::Magnet,
            });
        }
    }
    ctx.outbox.play(AudioCue::CastComplete);
    log::trace!("unit {} cast complete", id.0);
}

/// Fire the caster's special if it is ready and its trigger holds
pub fn try_special(world: &mut World, ctx: &mut TickContext, caster: usize) -> bool {
    let unit = &world.units[caster];
    if !unit.is_alive() || unit.status.is_stunned() || unit.cast.is_some() {
        return false;
    }
    let Some(weapon) = unit.weapon.filter(|w| w.special_ready()) else {
        return false;
    };
    let Some(spec) = weapon.kind.profile().special else {
        return false;
    };
    let (id, team, pos, power) = (unit.id, unit.team, unit.pos, unit.power());
    let detection = unit.detection_range();

    let fired = match spec.special {
        Special::GroundSlam {
            radius,
            stun_ms,
            damage_mult,
        } => {
            let in_reach: Vec<usize> = enemy_indices(world, team)
                .filter(|&j| world.units[j].pos.distance(pos) <= radius + UNIT_RADIUS)
                .collect();
            for &j in &in_reach {
                let victim = &mut world.units[j];
                let outward = direction_to(pos, victim.pos);
                victim.apply_damage(
                    &Hit::new(power * damage_mult)
                        .from_unit(id)
                        .with_knockback(outward * HEAVY_KNOCKBACK)
                        .with_stun(stun_ms),
                );
            }
            if !in_reach.is_empty() {
                ctx.outbox.effect(VisualEffect::Ring {
                    pos,
                    radius,
                    duration_ms: 400.0,
                    color: EffectColor::Debris,
                });
                ctx.outbox.effect(VisualEffect::Shake {
                    intensity: 4.0,
                    duration_ms: 250.0,
                });
            }
            !in_reach.is_empty()
        }
        Special::Blizzard { area } => {
            let nearest = enemy_indices(world, team)
                .map(|j| world.units[j].pos)
                .filter(|p| p.distance(pos) <= detection)
                .min_by(|a, b| {
                    a.distance(pos)
                        .partial_cmp(&b.distance(pos))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            match nearest {
                Some(target) => {
                    spawn_area(world, ctx, &area, target, Some(team), Some(id), power);
                    true
                }
                None => false,
            }
        }
        Special::Detonate { damage_mult } => {
            let triggered: Vec<usize> = world
                .areas
                .iter()
                .enumerate()
                .filter(|(_, a)| a.owner == Some(id) && !a.is_expired())
                .filter(|(_, a)| {
                    world
                        .units
                        .iter()
                        .any(|u| u.is_alive() && u.team != team && a.contains(u.pos))
                })
                .map(|(k, _)| k)
                .collect();
            let hit = Hit::new(power * damage_mult).from_unit(id).interrupting();
            for &k in &triggered {
                let area = &mut world.areas[k];
                area.remaining_ms = 0.0;
                let (center, radius) = (area.pos, area.radius);
                for victim in world.units.iter_mut() {
                    if victim.is_alive() && victim.team != team && victim.pos.distance(center) <= radius {
                        victim.apply_damage(&hit);
                    }
                }
                ctx.outbox.effect(VisualEffect::Particles {
                    pos: center,
                    count: 24,
                    color: EffectColor::Poison,
                });
            }
            !triggered.is_empty()
        }
    };

    if fired {
        let unit = &mut world.units[caster];
        if let Some(equipped) = unit.weapon.as_mut() {
            equipped.special_cooldown_ms = spec.cooldown_ms;
        }
        unit.attack_cooldown_ms = unit.attack_cooldown_ms.max(unit.attack_cooldown_total_ms());
        ctx.outbox.play(AudioCue::Special(weapon.kind));
        log::debug!("unit {} fired {} special", id.0, weapon.kind.as_str());
    }
    fired
}

fn enemy_indices(world: &World, team: Team) -> impl Iterator<Item = usize> + '_ {
    world
        .units
        .iter()
        .enumerate()
        .filter(move |(_, u)| u.is_alive() && u.team != team)
        .map(|(j, _)| j)
}
