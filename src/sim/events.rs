//! Per-tick notification outbox
//!
//! Subsystems push audio cues and effect requests here; the controller drains
//! the outbox into the collaborators once the tick is complete.

use crate::audio::{AudioCue, AudioSink};
use crate::effects::{EffectSink, VisualEffect};

#[derive(Debug, Default, Clone)]
pub struct Outbox {
    pub cues: Vec<AudioCue>,
    pub effects: Vec<VisualEffect>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self, cue: AudioCue) {
        self.cues.push(cue);
    }

    pub fn effect(&mut self, effect: VisualEffect) {
        self.effects.push(effect);
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty() && self.effects.is_empty()
    }

    /// Hand everything to the collaborators, in emission order
    pub fn drain_into(&mut self, audio: &mut dyn AudioSink, effects: &mut dyn EffectSink) {
        for cue in self.cues.drain(..) {
            audio.play(cue);
        }
        for effect in self.effects.drain(..) {
            effects.emit(effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CueLog;
    use crate::effects::EffectLog;

    #[test]
    fn test_drain_empties_outbox() {
        let mut outbox = Outbox::new();
        outbox.play(AudioCue::Heal);
        outbox.effect(VisualEffect::Shake {
            intensity: 1.0,
            duration_ms: 100.0,
        });
        let mut audio = CueLog::new();
        let mut effects = EffectLog::default();
        outbox.drain_into(&mut audio, &mut effects);
        assert!(outbox.is_empty());
        assert_eq!(audio.cues, vec![AudioCue::Heal]);
        assert_eq!(effects.effects.len(), 1);
    }
}
