//! Match controller
//!
//! Owns the world, the match RNG and the phase machine
//! `Editing -> Simulating <-> Paused`, `Simulating -> Ending -> Done`, with
//! resets back to `Editing` from the snapshot taken at start.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::events::Outbox;
use super::rng::{SimRng, fresh_seed, remap_seed};
use super::snapshot::MatchSnapshot;
use super::state::World;
use super::tick::{MatchOutcome, MatchStart, TickContext, evaluate_outcome, tick, tick_ending};
use crate::audio::{AudioCue, AudioSink, SilentAudio};
use crate::effects::{EffectSink, NullEffects};

pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Editing,
    Simulating,
    Paused,
    /// Winner known; explosions and projectiles finish
    Ending,
    Done,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("cannot {action} while {phase:?}")]
    InvalidTransition { action: &'static str, phase: MatchPhase },
    #[error("no snapshot has been captured")]
    NoSnapshot,
}

pub struct MatchController<A = SilentAudio, E = NullEffects> {
    world: World,
    phase: MatchPhase,
    rng: SimRng,
    seed: i64,
    /// Seed the next start will use instead of a fresh one
    pending_seed: Option<i64>,
    snapshot: Option<MatchSnapshot>,
    start: MatchStart,
    outcome: Option<MatchOutcome>,
    speed: f32,
    outbox: Outbox,
    audio: A,
    effects: E,
}

impl MatchController {
    /// Controller with silent collaborators
    pub fn new(world: World) -> Self {
        Self::with_sinks(world, SilentAudio, NullEffects)
    }
}

impl<A: AudioSink, E: EffectSink> MatchController<A, E> {
    pub fn with_sinks(world: World, audio: A, effects: E) -> Self {
        Self {
            world,
            phase: MatchPhase::Editing,
            rng: SimRng::new(1),
            seed: 1,
            pending_seed: None,
            snapshot: None,
            start: MatchStart::default(),
            outcome: None,
            speed: 1.0,
            outbox: Outbox::new(),
            audio,
            effects,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Placement edits are only allowed in the editor
    pub fn world_mut(&mut self) -> Result<&mut World, ControlError> {
        self.require(&[MatchPhase::Editing], "edit the world")?;
        Ok(&mut self.world)
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    fn require(&self, allowed: &[MatchPhase], action: &'static str) -> Result<(), ControlError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ControlError::InvalidTransition {
                action,
                phase: self.phase,
            })
        }
    }

    /// Capture the snapshot and begin ticking
    ///
    /// Seed precedence: explicit override, then the seed kept by a reset or
    /// load, then a fresh wall-clock seed.
    pub fn start_simulation(&mut self, seed_override: Option<i64>) -> Result<(), ControlError> {
        self.require(&[MatchPhase::Editing], "start")?;
        let seed = remap_seed(
            seed_override
                .or_else(|| self.pending_seed.take())
                .unwrap_or_else(fresh_seed),
        );
        self.pending_seed = None;
        self.seed = seed;
        self.rng = SimRng::new(seed);
        self.snapshot = Some(MatchSnapshot::capture(&self.world, seed));
        self.start = MatchStart::census(&self.world);
        self.outcome = None;
        self.outbox = Outbox::new();
        self.phase = MatchPhase::Simulating;
        log::info!(
            "Match started: seed {}, {} teams, {} units, {} structures",
            seed,
            self.start.teams.len(),
            self.world.units.len(),
            self.start.structures
        );
        Ok(())
    }

    pub fn pause_simulation(&mut self) -> Result<(), ControlError> {
        self.require(&[MatchPhase::Simulating], "pause")?;
        self.phase = MatchPhase::Paused;
        log::info!("Paused at tick {}", self.world.time_ticks);
        Ok(())
    }

    pub fn resume_simulation(&mut self) -> Result<(), ControlError> {
        self.require(&[MatchPhase::Paused], "resume")?;
        self.phase = MatchPhase::Simulating;
        log::info!("Resumed at tick {}", self.world.time_ticks);
        Ok(())
    }

    /// Advance one fixed step; a no-op outside Simulating/Ending
    pub fn tick(&mut self) -> MatchPhase {
        match self.phase {
            MatchPhase::Simulating => {
                let mut ctx = TickContext::new(self.speed, &mut self.rng, &mut self.outbox);
                tick(&mut self.world, &mut ctx);
                if let Some(outcome) = evaluate_outcome(&self.world, &self.start) {
                    self.outcome = Some(outcome);
                    self.phase = MatchPhase::Ending;
                    self.outbox.play(AudioCue::MatchOver);
                    log::info!("Match decided at tick {}: {:?}", self.world.time_ticks, outcome);
                }
            }
            MatchPhase::Ending => {
                let mut ctx = TickContext::new(self.speed, &mut self.rng, &mut self.outbox);
                tick_ending(&mut self.world, &mut ctx);
                if !self.world.nexuses.iter().any(|n| n.is_exploding()) {
                    self.phase = MatchPhase::Done;
                    log::info!("Match over after {} ticks", self.world.time_ticks);
                }
            }
            MatchPhase::Editing | MatchPhase::Paused | MatchPhase::Done => return self.phase,
        }
        self.outbox.drain_into(&mut self.audio, &mut self.effects);
        self.phase
    }

    fn restore_from_snapshot(&mut self) -> Result<i64, ControlError> {
        let snapshot = self.snapshot.as_ref().ok_or(ControlError::NoSnapshot)?;
        self.world = snapshot.restore();
        self.outcome = None;
        self.outbox = Outbox::new();
        self.phase = MatchPhase::Editing;
        Ok(snapshot.seed)
    }

    /// Back to the starting placement; the next start reuses the same seed
    pub fn reset_to_initial_placement(&mut self) -> Result<(), ControlError> {
        self.require(&[MatchPhase::Paused, MatchPhase::Done], "reset placement")?;
        let seed = self.restore_from_snapshot()?;
        self.pending_seed = Some(seed);
        log::info!("Reset to initial placement (seed {})", seed);
        Ok(())
    }

    /// Back to the editor; the next start draws a fresh seed
    pub fn reset_to_editing(&mut self) -> Result<(), ControlError> {
        self.require(&[MatchPhase::Paused, MatchPhase::Done], "reset")?;
        self.restore_from_snapshot()?;
        self.pending_seed = None;
        log::info!("Reset to editing");
        Ok(())
    }

    /// Replace the world with a stored snapshot, optionally starting at once
    /// with the stored seed
    pub fn load_snapshot(&mut self, snapshot: MatchSnapshot, start: bool) -> Result<(), ControlError> {
        self.require(
            &[MatchPhase::Editing, MatchPhase::Paused, MatchPhase::Done],
            "load a snapshot",
        )?;
        let seed = snapshot.seed;
        self.world = snapshot.restore();
        self.snapshot = Some(snapshot);
        self.outcome = None;
        self.outbox = Outbox::new();
        self.phase = MatchPhase::Editing;
        self.pending_seed = Some(seed);
        log::info!("Loaded snapshot (seed {}, {} units)", seed, self.world.units.len());
        if start {
            self.start_simulation(Some(seed))?;
        }
        Ok(())
    }

    /// The replay snapshot, available once the match is over
    pub fn replay_snapshot(&self) -> Option<&MatchSnapshot> {
        match self.phase {
            MatchPhase::Done => self.snapshot.as_ref(),
            _ => None,
        }
    }

    /// Change the speed multiplier; out-of-range values are clamped
    pub fn set_speed(&mut self, speed: f32) {
        if !speed.is_finite() {
            log::warn!("Ignoring non-finite speed {}", speed);
            return;
        }
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CueLog;
    use crate::effects::EffectLog;
    use crate::settings::QualityPreset;
    use crate::sim::arena::demo_arena;
    use crate::sim::state::Team;
    use crate::sim::tiles::TileMap;
    use glam::Vec2;

    fn duel() -> World {
        let mut world = World::new(TileMap::new(12, 6));
        world.spawn_unit(Team(0), Vec2::new(100.0, 96.0));
        world.spawn_unit(Team(1), Vec2::new(140.0, 96.0));
        world.rules.weapon_drop_interval_ms = 0.0;
        world
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut controller = MatchController::new(duel());
        assert_eq!(controller.phase(), MatchPhase::Editing);
        assert!(controller.pause_simulation().is_err());
        controller.start_simulation(Some(5)).unwrap();
        assert_eq!(controller.phase(), MatchPhase::Simulating);
        assert!(controller.world_mut().is_err());
        assert_eq!(
            controller.start_simulation(None),
            Err(ControlError::InvalidTransition {
                action: "start",
                phase: MatchPhase::Simulating
            })
        );
        controller.pause_simulation().unwrap();
        assert!(controller.reset_to_editing().is_ok());
        assert_eq!(controller.phase(), MatchPhase::Editing);
        assert!(controller.world_mut().is_ok());
    }

    #[test]
    fn test_pause_stops_the_clock() {
        let mut controller = MatchController::new(duel());
        controller.start_simulation(Some(8)).unwrap();
        controller.tick();
        controller.pause_simulation().unwrap();
        let frozen = controller.world().fingerprint();
        for _ in 0..10 {
            controller.tick();
        }
        assert_eq!(controller.world().fingerprint(), frozen);
        controller.resume_simulation().unwrap();
        controller.tick();
        assert_eq!(controller.world().time_ticks, 2);
    }

    #[test]
    fn test_pause_resume_keeps_determinism() {
        let mut straight = MatchController::new(demo_arena(2, 3, 4));
        let mut paused = MatchController::new(demo_arena(2, 3, 4));
        straight.start_simulation(Some(77)).unwrap();
        paused.start_simulation(Some(77)).unwrap();
        for i in 0..150 {
            if i == 60 {
                paused.pause_simulation().unwrap();
                paused.tick();
                paused.resume_simulation().unwrap();
            }
            straight.tick();
            paused.tick();
        }
        assert_eq!(straight.world().fingerprint(), paused.world().fingerprint());
    }

    #[test]
    fn test_reset_placement_reuses_seed() {
        let mut controller = MatchController::new(demo_arena(2, 2, 9));
        controller.start_simulation(None).unwrap();
        let seed = controller.seed();
        for _ in 0..30 {
            controller.tick();
        }
        controller.pause_simulation().unwrap();
        controller.reset_to_initial_placement().unwrap();
        assert_eq!(controller.world().time_ticks, 0);
        controller.start_simulation(None).unwrap();
        assert_eq!(controller.seed(), seed);
    }

    #[test]
    fn test_duel_reaches_done_with_replay() {
        let mut controller = MatchController::with_sinks(duel(), CueLog::new(), EffectLog::new(QualityPreset::Low, true));
        controller.start_simulation(Some(3)).unwrap();
        assert!(controller.replay_snapshot().is_none());
        let mut ticks = 0;
        while controller.tick() != MatchPhase::Done && ticks < 20_000 {
            ticks += 1;
        }
        assert_eq!(controller.phase(), MatchPhase::Done);
        assert!(matches!(controller.outcome(), Some(MatchOutcome::Victory(_))));
        assert_eq!(controller.audio().count(AudioCue::MatchOver), 1);
        assert_eq!(controller.replay_snapshot().map(|s| s.seed), Some(3));
        assert!(controller.reset_to_initial_placement().is_ok());
    }

    #[test]
    fn test_load_snapshot_can_autostart() {
        let mut source = MatchController::new(duel());
        source.start_simulation(Some(21)).unwrap();
        source.pause_simulation().unwrap();
        source.reset_to_initial_placement().unwrap();
        let snapshot = MatchSnapshot::capture(source.world(), 21);

        let mut controller = MatchController::new(World::new(TileMap::new(2, 2)));
        controller.load_snapshot(snapshot, true).unwrap();
        assert_eq!(controller.phase(), MatchPhase::Simulating);
        assert_eq!(controller.seed(), 21);
        assert_eq!(controller.world().units.len(), 2);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut controller = MatchController::new(duel());
        controller.set_speed(100.0);
        assert_eq!(controller.speed(), MAX_SPEED);
        controller.set_speed(f32::NAN);
        assert_eq!(controller.speed(), MAX_SPEED);
        controller.set_speed(0.0);
        assert_eq!(controller.speed(), MIN_SPEED);
    }

    #[test]
    fn test_reset_requires_a_started_match() {
        let mut controller = MatchController::new(duel());
        assert!(matches!(
            controller.reset_to_initial_placement(),
            Err(ControlError::InvalidTransition { .. })
        ));
    }
}
