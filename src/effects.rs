//! Visual effect collaborator
//!
//! Fire-and-forget requests for particles, lines, screen shake and rings.
//! Nothing here feeds back into the simulation.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::settings::QualityPreset;
use crate::sim::state::Team;

/// Palette tag for an effect; the renderer maps these to colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectColor {
    Team(Team),
    Spark,
    Fire,
    Ice,
    Poison,
    Magnet,
    Heal,
    Debris,
}

/// A single effect request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VisualEffect {
    Particles {
        pos: Vec2,
        count: u32,
        color: EffectColor,
    },
    Line {
        from: Vec2,
        to: Vec2,
        color: EffectColor,
    },
    Shake {
        intensity: f32,
        duration_ms: f32,
    },
    Ring {
        pos: Vec2,
        radius: f32,
        duration_ms: f32,
        color: EffectColor,
    },
}

/// Receiver for effect requests
pub trait EffectSink {
    fn emit(&mut self, effect: VisualEffect);
}

/// Discards every request
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEffects;

impl EffectSink for NullEffects {
    fn emit(&mut self, _effect: VisualEffect) {}
}

/// Records requests, trimmed to what the quality preset allows
#[derive(Debug, Clone)]
pub struct EffectLog {
    pub effects: Vec<VisualEffect>,
    quality: QualityPreset,
    screen_shake: bool,
    particles_emitted: usize,
}

impl EffectLog {
    pub fn new(quality: QualityPreset, screen_shake: bool) -> Self {
        Self {
            effects: Vec::new(),
            quality,
            screen_shake,
            particles_emitted: 0,
        }
    }

    /// Total particles accepted so far
    pub fn particles_emitted(&self) -> usize {
        self.particles_emitted
    }
}

impl Default for EffectLog {
    fn default() -> Self {
        Self::new(QualityPreset::default(), true)
    }
}

impl EffectSink for EffectLog {
    fn emit(&mut self, effect: VisualEffect) {
        let effect = match effect {
            VisualEffect::Particles { pos, count, color } => {
                let count = count.min(self.quality.max_burst());
                if count == 0 {
                    return;
                }
                self.particles_emitted += count as usize;
                VisualEffect::Particles { pos, count, color }
            }
            VisualEffect::Shake { .. } if !self.screen_shake => return,
            other => other,
        };
        self.effects.push(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_bursts_capped_by_quality() {
        let mut log = EffectLog::new(QualityPreset::Low, true);
        log.emit(VisualEffect::Particles {
            pos: Vec2::ZERO,
            count: 500,
            color: EffectColor::Fire,
        });
        assert_eq!(log.particles_emitted(), QualityPreset::Low.max_burst() as usize);
    }

    #[test]
    fn test_shake_dropped_when_disabled() {
        let mut log = EffectLog::new(QualityPreset::High, false);
        log.emit(VisualEffect::Shake {
            intensity: 4.0,
            duration_ms: 200.0,
        });
        assert!(log.effects.is_empty());
    }
}
