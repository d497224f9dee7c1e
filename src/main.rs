//! Nexus Clash headless runner
//!
//! Loads settings (path from the first argument, default `settings.json`),
//! builds the demo arena or loads a snapshot, runs the match to completion
//! or the tick cap, and optionally writes the replay snapshot.

#[cfg(not(target_arch = "wasm32"))]
use std::path::Path;

#[cfg(not(target_arch = "wasm32"))]
use nexus_clash::{
    Settings,
    audio::{AudioCue, CueLog},
    effects::EffectLog,
    persistence,
    sim::{MatchController, MatchPhase, demo_arena},
};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Nexus Clash (headless) starting...");

    let settings_path = std::env::args().nth(1).unwrap_or_else(|| "settings.json".to_string());
    let settings = Settings::load(Path::new(&settings_path));

    let mut audio = CueLog::new();
    audio.set_muted(settings.muted);
    let effects = EffectLog::new(settings.quality, settings.effective_screen_shake());

    let arena = demo_arena(settings.teams, settings.units_per_team, settings.layout_seed);
    let mut controller = MatchController::with_sinks(arena, audio, effects);
    controller.set_speed(settings.speed);

    let started = match &settings.snapshot_path {
        Some(path) => match persistence::load(path) {
            Ok(snapshot) => {
                let seed = settings.seed.unwrap_or(snapshot.seed);
                controller
                    .load_snapshot(snapshot, false)
                    .and_then(|()| controller.start_simulation(Some(seed)))
            }
            Err(err) => {
                log::warn!("Could not load {}: {}; using the demo arena", path.display(), err);
                controller.start_simulation(settings.seed)
            }
        },
        None => controller.start_simulation(settings.seed),
    };
    if let Err(err) = started {
        log::error!("Failed to start: {}", err);
        std::process::exit(1);
    }

    let mut ticks = 0u64;
    while controller.phase() != MatchPhase::Done && ticks < settings.max_ticks {
        controller.tick();
        ticks += 1;
    }

    match controller.outcome() {
        Some(outcome) => log::info!("Outcome after {} ticks: {:?}", ticks, outcome),
        None => log::info!("Undecided after {} ticks (tick cap)", ticks),
    }
    let world = controller.world();
    for unit in &world.units {
        log::info!(
            "  unit {} ({}) level {} hp {:.0}/{:.0} kills {} weapon {}",
            unit.id.0,
            unit.team,
            unit.level,
            unit.hp,
            unit.max_hp,
            unit.kills,
            unit.armament().kind.as_str()
        );
    }
    log::info!(
        "Cues: {} deaths, {} structures destroyed; {} particles requested",
        controller.audio().count(AudioCue::UnitDeath),
        controller.audio().count(AudioCue::NexusDestroyed),
        controller.effects().particles_emitted()
    );

    if let (Some(path), Some(replay)) = (&settings.replay_path, controller.replay_snapshot()) {
        if let Err(err) = persistence::save(path, replay) {
            log::error!("Failed to write replay {}: {}", path.display(), err);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation core is driven by the embedding page on the web
}
