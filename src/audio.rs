//! Audio cue collaborator
//!
//! The simulation never plays sound itself. It queues cues on the tick outbox
//! and the controller hands them to an [`AudioSink`] after each tick.

use serde::{Deserialize, Serialize};

use crate::sim::weapons::WeaponKind;

/// Sound cue types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCue {
    /// A weapon attack resolved
    Attack(WeaponKind),
    /// Heavy combo finisher landed
    HeavyStrike,
    /// A weapon special fired
    Special(WeaponKind),
    /// Channel finished
    CastComplete,
    /// Projectile struck a wall
    WallHit,
    /// Destructible wall crumbled
    WallBreak,
    /// Weapon picked up
    Equip,
    /// Heal pack consumed
    Heal,
    /// Level gained
    LevelUp,
    /// Cloner tile duplicated a unit
    Clone,
    /// A unit died
    UnitDeath,
    /// A nexus finished exploding
    NexusDestroyed,
    /// Match ended
    MatchOver,
}

/// Receiver for audio cues (fire-and-forget)
pub trait AudioSink {
    fn play(&mut self, cue: AudioCue);
}

/// Discards every cue
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play(&mut self, _cue: AudioCue) {}
}

/// Records cues in order; used by the headless runner and tests
#[derive(Debug, Default, Clone)]
pub struct CueLog {
    pub cues: Vec<AudioCue>,
    muted: bool,
}

impl CueLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Muted logs drop cues on arrival
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn count(&self, cue: AudioCue) -> usize {
        self.cues.iter().filter(|c| **c == cue).count()
    }
}

impl AudioSink for CueLog {
    fn play(&mut self, cue: AudioCue) {
        if self.muted {
            return;
        }
        log::trace!("audio cue {:?}", cue);
        self.cues.push(cue);
    }
}
