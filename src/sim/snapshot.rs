//! Replay snapshot: the initial placement plus the seed that drives it

use serde::{Deserialize, Serialize};

use super::hazards::MagneticField;
use super::state::{GroundWeapon, IdAllocator, MatchRules, Nexus, Unit, World};
use super::tiles::TileMap;

/// Serializable copy of everything needed to replay a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub seed: i64,
    pub map: TileMap,
    pub units: Vec<Unit>,
    pub weapons: Vec<GroundWeapon>,
    pub nexuses: Vec<Nexus>,
    pub fields: Vec<MagneticField>,
    #[serde(default)]
    pub rules: MatchRules,
    /// Next entity id to hand out
    pub next_id: u32,
}

impl MatchSnapshot {
    /// Capture the world as it stands (normally right before the first tick)
    pub fn capture(world: &World, seed: i64) -> Self {
        Self {
            seed,
            map: world.map.clone(),
            units: world.units.clone(),
            weapons: world.weapons.iter().filter(|w| !w.taken).cloned().collect(),
            nexuses: world.nexuses.clone(),
            fields: world.fields.clone(),
            rules: world.rules.clone(),
            next_id: world.ids.peek(),
        }
    }

    /// Rebuild a fresh world: clocks, timers and transient entities start empty
    pub fn restore(&self) -> World {
        let mut units = self.units.clone();
        units.sort_by_key(|u| u.id);
        let highest = units
            .iter()
            .map(|u| u.id.0)
            .chain(self.weapons.iter().map(|w| w.id))
            .chain(self.nexuses.iter().map(|n| n.id.0))
            .chain(self.fields.iter().map(|f| f.id))
            .max()
            .unwrap_or(0);
        let last = highest.max(self.next_id.saturating_sub(1));

        let mut world = World::new(self.map.clone()).with_rules(self.rules.clone());
        world.units = units;
        world.weapons = self.weapons.clone();
        world.nexuses = self.nexuses.clone();
        world.fields = self.fields.clone();
        world.ids = IdAllocator::starting_after(last);
        world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::arena::demo_arena;
    use crate::sim::events::Outbox;
    use crate::sim::rng::SimRng;
    use crate::sim::state::{Team, UnitId};
    use crate::sim::tick::{TickContext, tick};
    use glam::Vec2;

    fn run(world: &mut World, seed: i64, ticks: usize) -> u64 {
        let mut rng = SimRng::new(seed);
        let mut outbox = Outbox::new();
        for _ in 0..ticks {
            let mut ctx = TickContext::new(1.0, &mut rng, &mut outbox);
            tick(world, &mut ctx);
        }
        world.fingerprint()
    }

    #[test]
    fn test_restore_matches_capture() {
        let world = demo_arena(2, 3, 7);
        let snapshot = MatchSnapshot::capture(&world, 42);
        let restored = snapshot.restore();
        assert_eq!(restored, world);
    }

    #[test]
    fn test_restored_world_replays_identically() {
        let mut world = demo_arena(3, 3, 5);
        let snapshot = MatchSnapshot::capture(&world, 99);
        let original = run(&mut world, snapshot.seed, 120);
        let mut replay = snapshot.restore();
        assert_eq!(run(&mut replay, snapshot.seed, 120), original);
    }

    #[test]
    fn test_restore_never_reuses_ids() {
        let mut world = World::new(TileMap::new(8, 8));
        world.spawn_unit(Team(0), Vec2::new(40.0, 40.0));
        let mut snapshot = MatchSnapshot::capture(&world, 1);
        snapshot.units[0].id = UnitId(50);
        snapshot.next_id = 2;
        let mut restored = snapshot.restore();
        let fresh = restored.spawn_unit(Team(1), Vec2::new(100.0, 40.0));
        assert_eq!(fresh, UnitId(51));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let world = demo_arena(2, 1, 3);
        let snapshot = MatchSnapshot::capture(&world, 12);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["seed"], 12);
        assert!(json["units"].is_array());
        assert!(json["map"].is_object());
        let back: MatchSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
