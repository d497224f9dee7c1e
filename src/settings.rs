//! Runner settings
//!
//! Persisted as JSON next to the runner, separate from match snapshots.
//! Nothing here changes simulation outcomes except the speed multiplier and
//! the seed; the rules that matter for replay live in the snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::persistence::PersistenceError;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Largest particle burst a single request may produce
    pub fn max_burst(&self) -> u32 {
        match self {
            QualityPreset::Low => 8,
            QualityPreset::Medium => 24,
            QualityPreset::High => 64,
        }
    }
}

/// Headless runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Effect quality preset
    pub quality: QualityPreset,
    /// Screen shake requests
    pub screen_shake: bool,
    /// Reduced motion (suppresses shake)
    pub reduced_motion: bool,
    /// Drop audio cues
    pub muted: bool,

    // === Simulation ===
    /// Speed multiplier applied to every timer and movement
    pub speed: f32,
    /// Stop after this many ticks even if the match is undecided
    pub max_ticks: u64,
    /// Fixed seed; a fresh wall-clock seed when absent
    pub seed: Option<i64>,

    // === Demo arena ===
    pub teams: u8,
    pub units_per_team: u32,
    pub layout_seed: u64,

    // === Files ===
    /// Load this snapshot instead of generating an arena
    pub snapshot_path: Option<PathBuf>,
    /// Write the replay snapshot here when the match is done
    pub replay_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,
            screen_shake: true,
            reduced_motion: false,
            muted: false,

            speed: 1.0,
            max_ticks: 60 * 60 * 5,
            seed: None,

            teams: 2,
            units_per_team: 4,
            layout_seed: 1,

            snapshot_path: None,
            replay_path: None,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Effective screen shake (respects reduced_motion)
    pub fn effective_screen_shake(&self) -> bool {
        self.screen_shake && !self.reduced_motion
    }

    /// Load settings; missing or malformed files fall back to defaults
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(err) => {
                    log::warn!("Ignoring malformed settings {}: {}", path.display(), err);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Using default settings");
                Self::default()
            }
        }
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_names_round_trip() {
        for preset in [QualityPreset::Low, QualityPreset::Medium, QualityPreset::High] {
            assert_eq!(QualityPreset::from_str(preset.as_str()), Some(preset));
        }
        assert_eq!(QualityPreset::from_str("med"), Some(QualityPreset::Medium));
        assert_eq!(QualityPreset::from_str("ultra"), None);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"speed":2.0,"seed":77}"#).unwrap();
        assert_eq!(settings.speed, 2.0);
        assert_eq!(settings.seed, Some(77));
        assert_eq!(settings.teams, 2);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let settings = Settings::load(Path::new("/nonexistent/nexus-clash/settings.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("nexus-clash-settings-{}.json", std::process::id()));
        let mut settings = Settings::from_preset(QualityPreset::High);
        settings.units_per_team = 7;
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_reduced_motion_disables_shake() {
        let settings = Settings {
            reduced_motion: true,
            ..Settings::default()
        };
        assert!(!settings.effective_screen_shake());
    }
}
