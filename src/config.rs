use crate::game::gameplay::{MAX_PLAYERS, RoundSetup};
use crate::game::profile::{Controller, Difficulty, GameMode, PlayerOptions};
use crate::game::timing::{BpmSchedule, RESYNC_THRESHOLD_MS, ScheduleError};
use crate::game::timing_windows::JudgementWindows;
use ini::Ini;
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const CONFIG_PATH: &str = "beatline.ini";
pub const DEFAULT_SKILL_FILE: &str = "cpu_skills.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] ini::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),
    #[error("failed to write default config: {0}")]
    Write(#[from] std::io::Error),
    #[error("bad tempo map: {0}")]
    Schedule(#[from] ScheduleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("'{other}' is not a valid LogLevel setting")),
        }
    }
}

impl core::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Error => write!(f, "Error"),
            Self::Warn => write!(f, "Warn"),
            Self::Info => write!(f, "Info"),
            Self::Debug => write!(f, "Debug"),
            Self::Trace => write!(f, "Trace"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // [Options]
    pub log_level: LogLevel,
    pub global_offset_ms: f64,
    pub resync_threshold_ms: f64,
    pub skill_file: String,
    // [Judgement]
    pub windows: JudgementWindows,
    // [Round]
    pub game_mode: GameMode,
    pub bpms: String,
    pub phrases: i64,
    pub seed: u64,
    pub players: Vec<PlayerOptions>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            global_offset_ms: 0.0,
            resync_threshold_ms: RESYNC_THRESHOLD_MS,
            skill_file: DEFAULT_SKILL_FILE.to_string(),
            windows: JudgementWindows::default(),
            game_mode: GameMode::VsCpu,
            bpms: "0=120".to_string(),
            phrases: 32,
            seed: 0,
            players: vec![
                PlayerOptions::cpu("CPU 1", "Normal", Difficulty::Easy),
                PlayerOptions::cpu("CPU 2", "Hard", Difficulty::Medium),
            ],
        }
    }
}

impl Config {
    /// Turns the `[Round]` section into a ready-to-start round.
    pub fn round_setup(&self) -> Result<RoundSetup, ConfigError> {
        Ok(RoundSetup {
            mode: self.game_mode,
            players: self.players.clone(),
            schedule: BpmSchedule::parse(&self.bpms)?,
            offset_s: self.global_offset_ms / 1000.0,
            windows: self.windows,
            resync_threshold_ms: self.resync_threshold_ms,
            phrases: Some(self.phrases.max(1)),
            seed: self.seed,
        })
    }
}

#[inline(always)]
fn flag(v: bool) -> &'static str {
    if v { "1" } else { "0" }
}

fn to_ini(cfg: &Config) -> Ini {
    let mut conf = Ini::new();
    conf.with_section(Some("Options"))
        .set("GlobalOffsetMs", cfg.global_offset_ms.to_string())
        .set("LogLevel", cfg.log_level.to_string())
        .set("ResyncThresholdMs", cfg.resync_threshold_ms.to_string())
        .set("SkillFile", cfg.skill_file.as_str());
    conf.with_section(Some("Judgement"))
        .set("BadWindow", cfg.windows.windows[3].to_string())
        .set("CoolWindow", cfg.windows.windows[1].to_string())
        .set("ExpiryGrace", cfg.windows.expiry_grace.to_string())
        .set("IdealWindow", cfg.windows.windows[0].to_string())
        .set("OkWindow", cfg.windows.windows[2].to_string())
        .set("StreakCap", cfg.windows.streak_cap.to_string());
    {
        let mut round = conf.with_section(Some("Round"));
        round
            .set("Bpms", cfg.bpms.as_str())
            .set("GameMode", cfg.game_mode.to_string())
            .set("Phrases", cfg.phrases.to_string())
            .set("Players", cfg.players.len().to_string())
            .set("Seed", cfg.seed.to_string());
        for (i, p) in cfg.players.iter().enumerate() {
            let n = i + 1;
            round
                .set(format!("P{n}Cpu"), p.cpu_skill().unwrap_or_default())
                .set(format!("P{n}Difficulty"), p.difficulty.to_string())
                .set(format!("P{n}DisableKo"), flag(p.disable_ko))
                .set(format!("P{n}Name"), p.name.as_str());
        }
    }
    conf
}

fn create_default_config_file(path: &Path) -> Result<(), ConfigError> {
    info!("'{}' not found, creating with default values.", path.display());
    to_ini(&Config::default()).write_to_file(path)?;
    Ok(())
}

fn get_parsed<T: FromStr>(conf: &Ini, section: &str, key: &str) -> Option<T> {
    let raw = conf.get_from(Some(section), key)?;
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() {
        warn!("Ignoring invalid [{section}] {key}='{raw}'.");
    }
    parsed
}

fn parse_players(conf: &Ini, default: &Config) -> Vec<PlayerOptions> {
    let Some(count) = get_parsed::<usize>(conf, "Round", "Players") else {
        return default.players.clone();
    };
    let count = count.clamp(1, MAX_PLAYERS);
    (1..=count)
        .map(|n| {
            let fallback = PlayerOptions::default();
            let name = conf
                .get_from(Some("Round"), &format!("P{n}Name"))
                .map(|v| v.trim().to_string())
                .unwrap_or_default();
            let controller = conf
                .get_from(Some("Round"), &format!("P{n}Cpu"))
                .map(str::trim)
                .filter(|skill| !skill.is_empty())
                .map_or(Controller::Human, |skill| Controller::Cpu {
                    skill: skill.to_string(),
                });
            PlayerOptions {
                name,
                difficulty: get_parsed(conf, "Round", &format!("P{n}Difficulty"))
                    .unwrap_or(fallback.difficulty),
                disable_ko: get_parsed::<u8>(conf, "Round", &format!("P{n}DisableKo"))
                    .map_or(fallback.disable_ko, |v| v != 0),
                controller,
                ..fallback
            }
        })
        .collect()
}

/// Reads every known key, falling back to the default for anything missing
/// or malformed.
pub fn from_ini(conf: &Ini) -> Config {
    let default = Config::default();

    let windows = JudgementWindows {
        windows: [
            get_parsed(conf, "Judgement", "IdealWindow").unwrap_or(default.windows.windows[0]),
            get_parsed(conf, "Judgement", "CoolWindow").unwrap_or(default.windows.windows[1]),
            get_parsed(conf, "Judgement", "OkWindow").unwrap_or(default.windows.windows[2]),
            get_parsed(conf, "Judgement", "BadWindow").unwrap_or(default.windows.windows[3]),
        ],
        expiry_grace: get_parsed(conf, "Judgement", "ExpiryGrace")
            .unwrap_or(default.windows.expiry_grace),
        streak_cap: get_parsed(conf, "Judgement", "StreakCap")
            .unwrap_or(default.windows.streak_cap),
    };
    let windows = windows.validated().unwrap_or_else(|| {
        warn!("[Judgement] windows must be increasing; using defaults.");
        default.windows
    });

    Config {
        log_level: get_parsed(conf, "Options", "LogLevel").unwrap_or(default.log_level),
        global_offset_ms: get_parsed::<f64>(conf, "Options", "GlobalOffsetMs")
            .filter(|v| v.is_finite())
            .unwrap_or(default.global_offset_ms),
        resync_threshold_ms: get_parsed::<f64>(conf, "Options", "ResyncThresholdMs")
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(default.resync_threshold_ms),
        skill_file: conf
            .get_from(Some("Options"), "SkillFile")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.skill_file.clone()),
        windows,
        game_mode: get_parsed(conf, "Round", "GameMode").unwrap_or(default.game_mode),
        bpms: conf
            .get_from(Some("Round"), "Bpms")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.bpms.clone()),
        phrases: get_parsed::<i64>(conf, "Round", "Phrases")
            .filter(|v| *v > 0)
            .unwrap_or(default.phrases),
        seed: get_parsed(conf, "Round", "Seed").unwrap_or(default.seed),
        players: parse_players(conf, &default),
    }
}

/// Loads `path`, writing a default file first if there is none.
pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
        return Ok(Config::default());
    }
    let conf = Ini::load_from_file(path)?;
    let cfg = from_ini(&conf);
    info!(
        "Config loaded from '{}': mode {}, {} player(s), {} phrases.",
        path.display(),
        cfg.game_mode,
        cfg.players.len(),
        cfg.phrases
    );
    Ok(cfg)
}

pub fn load() -> Result<Config, ConfigError> {
    load_from(CONFIG_PATH)
}

pub fn parse_str(content: &str) -> Result<Config, ConfigError> {
    Ok(from_ini(&Ini::load_from_str(content)?))
}
