use beatline::config;
use beatline::core::clock::{SimulatedClock, TimeSource};
use beatline::core::logbuf;
use beatline::game::cpu::SkillTable;
use beatline::game::gameplay::{self, GameplayEvent};
use beatline::game::stage_stats::RoundSummary;
use log::{info, warn};
use std::sync::Arc;

const FRAME_MS: f64 = 1000.0 / 60.0;
// The simulated audio stream runs a little fast so resync has work to do.
const SIMULATED_AUDIO_DRIFT: f64 = 0.002;

fn load_skills(path: &str) -> SkillTable {
    match SkillTable::load(path) {
        Ok(table) if !table.is_empty() => table,
        Ok(_) => {
            warn!("'{path}' defines no CPU skill levels; using the built-in ones.");
            SkillTable::builtin()
        }
        Err(e) => {
            warn!("{e} ('{path}'); using the built-in CPU skill levels.");
            SkillTable::builtin()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _log_buffer = logbuf::init(logbuf::DEFAULT_CAPACITY).ok();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let cfg = config::load()?;
    log::set_max_level(cfg.log_level.as_level_filter());

    let skills = load_skills(&cfg.skill_file);
    let mut levels: Vec<&str> = skills.names().collect();
    levels.sort_unstable();
    info!("CPU skill levels: {}.", levels.join(", "));
    let skills = Arc::new(skills);
    let setup = cfg.round_setup()?;
    if setup.players.iter().any(|p| !p.is_cpu()) {
        warn!("Headless run: human players have no input and will miss every beatline.");
    }
    // One phrase past the last beatline covers its expiry grace.
    let end_ms = setup.schedule.time_at((cfg.phrases + 1) as f64) + setup.offset_s * 1000.0;

    let mut state = gameplay::init(setup, skills)?;
    let mut clock = SimulatedClock::new().with_audio_drift(SIMULATED_AUDIO_DRIFT);
    clock.start_audio();

    while !state.finished && clock.elapsed_ms() <= end_ms {
        clock.advance(FRAME_MS);
        let events = gameplay::update(&mut state, clock.elapsed_ms(), clock.audio_position_ms());
        for event in events {
            if let GameplayEvent::ConfigurationError { player, skill } = event {
                return Err(format!("P{}: unknown CPU skill level '{skill}'", player + 1).into());
            }
        }
    }
    info!(
        "Simulation stopped at {:.0}ms (phrase {:.2}), {} player(s) standing.",
        clock.elapsed_ms(),
        state.current_phrase,
        state.active_players()
    );

    let summary = RoundSummary::from_state(&state);
    println!("{}", summary.to_json()?);
    Ok(())
}
