//! Snapshot save/load
//!
//! Features:
//! - Versioned JSON envelope around a `MatchSnapshot`
//! - Backup rotation (tmp → save, old save → backup)
//! - Falls back to the backup when the primary file is unreadable

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::snapshot::MatchSnapshot;

/// Current envelope format
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {expected})", expected = SNAPSHOT_VERSION)]
    UnsupportedVersion { found: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<S> {
    version: u32,
    snapshot: S,
}

/// Only the version, so a newer format is reported instead of failing to parse
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

pub fn to_json(snapshot: &MatchSnapshot) -> Result<String, PersistenceError> {
    let envelope = Envelope {
        version: SNAPSHOT_VERSION,
        snapshot,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

pub fn from_json(json: &str) -> Result<MatchSnapshot, PersistenceError> {
    let probe: VersionProbe = serde_json::from_str(json)?;
    if probe.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::UnsupportedVersion { found: probe.version });
    }
    let envelope: Envelope<MatchSnapshot> = serde_json::from_str(json)?;
    Ok(envelope.snapshot)
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Write via a temp file; the previous save becomes `<path>.bak`
pub fn save(path: &Path, snapshot: &MatchSnapshot) -> Result<(), PersistenceError> {
    let json = to_json(snapshot)?;
    let tmp = sibling(path, "tmp");
    fs::write(&tmp, json)?;
    if path.exists() {
        fs::rename(path, sibling(path, "bak"))?;
    }
    fs::rename(&tmp, path)?;
    log::info!("Saved snapshot to {} (seed {})", path.display(), snapshot.seed);
    Ok(())
}

/// Load a snapshot, trying `<path>.bak` when the primary cannot be read
pub fn load(path: &Path) -> Result<MatchSnapshot, PersistenceError> {
    let primary = fs::read_to_string(path)
        .map_err(PersistenceError::from)
        .and_then(|json| from_json(&json));
    match primary {
        Ok(snapshot) => Ok(snapshot),
        Err(err) => {
            let backup = sibling(path, "bak");
            if !backup.exists() {
                return Err(err);
            }
            log::warn!("Failed to load {} ({}), trying backup", path.display(), err);
            from_json(&fs::read_to_string(&backup)?)
        }
    }
}
