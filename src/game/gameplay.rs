use crate::core::input::{InputEvent, Lane, VirtualAction};
use crate::game::beatline::BeatlineSchedule;
use crate::game::cpu::{CpuModel, SkillError, SkillTable};
use crate::game::judgment::{self, Judgement, JudgementCounts};
use crate::game::life::{self, BLAZING_DRAIN_PER_PHRASE, NOMINAL_LIFE, STARTING_LIFE};
use crate::game::notes::{ArrowPress, NoteBar};
use crate::game::profile::{Difficulty, GameMode, PlayerOptions, Team};
use crate::game::scoring::{self, ScoringPolicy};
use crate::game::timing::{BpmSchedule, PhraseClock, RESYNC_THRESHOLD_MS};
use crate::game::timing_windows::JudgementWindows;
use log::{debug, error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use smallvec::SmallVec;
use std::sync::Arc;
use thiserror::Error;

pub const MAX_PLAYERS: usize = 4;

const FIRST_BEATLINE: i64 = 1;
const STATUS_LOG_INTERVAL_MS: f64 = 1000.0;
// Seeds for the CPU rolls and the note bars are split so one does not shift the other.
const CPU_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Error)]
pub enum RoundError {
    #[error("a round needs at least one player")]
    NoPlayers,
    #[error("{0} players requested, at most 4 are supported")]
    TooManyPlayers(usize),
    #[error("player {player}: {source}")]
    Skill {
        player: usize,
        #[source]
        source: SkillError,
    },
}

/// Everything that can change for one player during a round.
#[derive(Clone, Debug)]
pub struct PlayerRuntime {
    pub name: String,
    pub slot: usize,
    pub team: Team,
    pub difficulty: Difficulty,
    pub is_cpu: bool,
    pub cpu_skill: Option<String>,
    pub disable_ko: bool,

    pub score: i64,
    pub life: f64,
    pub max_life: f64,
    pub momentum: i64,
    pub level: i64,
    pub streak: i32,
    pub max_streak: i32,
    pub hits: i32,
    pub judgement_counts: JudgementCounts,

    pub is_ko: bool,
    pub ko_phrase: Option<f64>,
    pub blazing: bool,
    pub note_bar: NoteBar,
}

impl PlayerRuntime {
    pub fn new(options: &PlayerOptions, slot: usize) -> Self {
        let name = if options.name.is_empty() {
            format!("P{}", slot + 1)
        } else {
            options.name.clone()
        };
        Self {
            name,
            slot,
            team: Team::for_player(slot),
            difficulty: options.difficulty,
            is_cpu: options.is_cpu(),
            cpu_skill: options.cpu_skill().map(str::to_string),
            disable_ko: options.disable_ko,
            score: 0,
            life: STARTING_LIFE,
            max_life: life::max_life(options.difficulty),
            momentum: 0,
            level: scoring::level_for_momentum(0),
            streak: 0,
            max_streak: 0,
            hits: 0,
            judgement_counts: JudgementCounts::default(),
            is_ko: false,
            ko_phrase: None,
            blazing: false,
            note_bar: NoteBar::default(),
        }
    }

    /// Still accruing judgements this round.
    #[inline(always)]
    pub fn is_active(&self) -> bool {
        !self.is_ko
    }

    // A ceiling at the nominal line leaves no surplus to burn.
    #[inline(always)]
    fn can_blaze(&self) -> bool {
        self.max_life > NOMINAL_LIFE && self.life >= self.max_life
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameplayEvent {
    Arrow {
        player: usize,
        lane: Lane,
        result: ArrowPress,
    },
    Judged {
        player: usize,
        judgement: Judgement,
        completed: i32,
        score_delta: i64,
        life_delta: f64,
    },
    KnockedOut {
        player: usize,
        phrase: f64,
    },
    BlazingStarted {
        player: usize,
    },
    BlazingEnded {
        player: usize,
    },
    Resynced {
        correction_ms: f64,
    },
    /// A CPU player asked for a skill level nobody defined. The round stops.
    ConfigurationError {
        player: usize,
        skill: String,
    },
    RoundFinished,
}

pub type GameplayEvents = SmallVec<[GameplayEvent; 8]>;

/// How a round is set up; fixed once play starts.
#[derive(Clone, Debug)]
pub struct RoundSetup {
    pub mode: GameMode,
    pub players: Vec<PlayerOptions>,
    pub schedule: BpmSchedule,
    pub offset_s: f64,
    pub windows: JudgementWindows,
    pub resync_threshold_ms: f64,
    /// Last phrase that carries a beatline; `None` plays until stopped.
    pub phrases: Option<i64>,
    pub seed: u64,
}

impl Default for RoundSetup {
    fn default() -> Self {
        Self {
            mode: GameMode::default(),
            players: vec![PlayerOptions::default()],
            schedule: BpmSchedule::default(),
            offset_s: 0.0,
            windows: JudgementWindows::default(),
            resync_threshold_ms: RESYNC_THRESHOLD_MS,
            phrases: None,
            seed: 0,
        }
    }
}

pub struct State {
    pub mode: GameMode,
    pub players: Vec<PlayerRuntime>,
    pub windows: JudgementWindows,
    pub clock: PhraseClock,
    pub current_phrase: f64,
    pub finished: bool,
    beatlines: Vec<BeatlineSchedule>,
    policy: Box<dyn ScoringPolicy>,
    cpu: CpuModel,
    bar_rng: StdRng,
    log_timer_ms: f64,
    last_elapsed_ms: f64,
}

pub fn init(setup: RoundSetup, skills: Arc<SkillTable>) -> Result<State, RoundError> {
    if setup.players.is_empty() {
        return Err(RoundError::NoPlayers);
    }
    if setup.players.len() > MAX_PLAYERS {
        return Err(RoundError::TooManyPlayers(setup.players.len()));
    }
    for (slot, options) in setup.players.iter().enumerate() {
        if let Some(skill) = options.cpu_skill() {
            skills
                .require(skill)
                .map_err(|source| RoundError::Skill {
                    player: slot + 1,
                    source,
                })?;
        }
    }

    let mut players: Vec<PlayerRuntime> = setup
        .players
        .iter()
        .enumerate()
        .map(|(slot, options)| PlayerRuntime::new(options, slot))
        .collect();

    // One shared bar can only be as tall as its shortest member.
    if setup.mode.is_sync() {
        let shared_max = players
            .iter()
            .map(|p| p.max_life)
            .fold(f64::INFINITY, f64::min);
        for p in &mut players {
            p.max_life = shared_max;
        }
    }

    let mut bar_rng = StdRng::seed_from_u64(setup.seed);
    for p in &mut players {
        p.note_bar = NoteBar::generate(p.level as usize, &mut bar_rng);
    }

    let windows = setup.windows.validated().unwrap_or_else(|| {
        warn!("Judgement windows are not ordered; using defaults.");
        JudgementWindows::default()
    });

    let beatlines = players
        .iter()
        .map(|_| {
            let schedule = BeatlineSchedule::new(FIRST_BEATLINE, windows.expiry_grace);
            match setup.phrases {
                Some(last) => schedule.with_last_boundary(last),
                None => schedule,
            }
        })
        .collect();

    let clock = PhraseClock::new(setup.schedule, setup.offset_s)
        .with_resync_threshold(setup.resync_threshold_ms);
    debug!(
        "Judgement windows at {:.1} BPM: {:?}ms.",
        clock.bpm(),
        windows.windows_ms(clock.bpm())
    );
    let policy = scoring::policy_for(setup.mode, &players);
    debug!("Scoring rules: {}.", policy.mode());

    info!(
        "Round start: mode {}, {} player(s) ({} CPU), {} BPM segment(s), offset {:.3}s.",
        setup.mode,
        players.len(),
        players.iter().filter(|p| p.is_cpu).count(),
        clock.schedule().segment_count(),
        setup.offset_s
    );

    Ok(State {
        mode: setup.mode,
        current_phrase: clock.phrase(),
        players,
        windows,
        clock,
        finished: false,
        beatlines,
        policy,
        cpu: CpuModel::seeded(skills, setup.seed ^ CPU_SEED_SALT),
        bar_rng,
        log_timer_ms: 0.0,
        last_elapsed_ms: 0.0,
    })
}

fn deal_note_bar(state: &mut State, player: usize) {
    let length = state.players[player].level.max(1) as usize;
    state.players[player].note_bar = NoteBar::generate(length, &mut state.bar_rng);
}

/// Runs one judgement through the round's rules and reports everything that
/// changed because of it.
fn apply_judgement(
    state: &mut State,
    player: usize,
    judgement: Judgement,
    completed: i32,
    incomplete: i32,
    out: &mut GameplayEvents,
) {
    let delta = state.policy.apply_judgement(
        &mut state.players,
        player,
        judgement,
        completed,
        incomplete,
    );
    debug!(
        "P{} {judgement}: {completed} note(s), score {:+}, life {:+.2}.",
        player + 1,
        delta.score,
        delta.life
    );
    out.push(GameplayEvent::Judged {
        player,
        judgement,
        completed,
        score_delta: delta.score,
        life_delta: delta.life,
    });
    deal_note_bar(state, player);
    update_player_flags(state, out);
}

fn update_player_flags(state: &mut State, out: &mut GameplayEvents) {
    let phrase = state.current_phrase;
    for idx in state.policy.knocked_out(&state.players) {
        let p = &mut state.players[idx];
        if p.is_ko {
            continue;
        }
        p.is_ko = true;
        p.ko_phrase = Some(phrase);
        p.life = 0.0;
        p.blazing = false;
        info!("P{} knocked out at phrase {phrase:.2}.", idx + 1);
        out.push(GameplayEvent::KnockedOut { player: idx, phrase });
    }

    for (idx, p) in state.players.iter_mut().enumerate() {
        if p.is_active() && !p.blazing && p.can_blaze() {
            p.blazing = true;
            info!("P{} is blazing.", idx + 1);
            out.push(GameplayEvent::BlazingStarted { player: idx });
        }
    }
}

fn drain_blazing(state: &mut State, phrases_passed: f64, out: &mut GameplayEvents) {
    if phrases_passed <= 0.0 {
        return;
    }
    let drain = BLAZING_DRAIN_PER_PHRASE * phrases_passed;
    for (idx, p) in state.players.iter_mut().enumerate() {
        if !p.is_active() || !p.blazing {
            continue;
        }
        p.life -= drain;
        if p.life <= NOMINAL_LIFE {
            p.life = NOMINAL_LIFE;
            p.blazing = false;
            debug!("P{} blazing ended.", idx + 1);
            out.push(GameplayEvent::BlazingEnded { player: idx });
        }
    }
}

/// CPU players hit every beatline as soon as it is due. Returns false if the
/// round cannot continue.
fn play_cpu_beatlines(state: &mut State, player: usize, out: &mut GameplayEvents) -> bool {
    let Some(skill) = state.players[player].cpu_skill.clone() else {
        return true;
    };
    while state.players[player].is_active()
        && state.beatlines[player]
            .claim_earliest_due(state.current_phrase)
            .is_some()
    {
        let streak = state.players[player].streak;
        let Some(judgement) = state.cpu.next_judgement(&skill, streak) else {
            error!("Stopping round: P{} has no usable CPU skill.", player + 1);
            out.push(GameplayEvent::ConfigurationError { player, skill });
            return false;
        };
        let notes = state.players[player].note_bar.len() as i32;
        let (completed, incomplete) = if judgement == Judgement::Fail {
            (0, notes)
        } else {
            (notes, 0)
        };
        apply_judgement(state, player, judgement, completed, incomplete, out);
    }
    true
}

fn expire_beatlines(state: &mut State, player: usize, out: &mut GameplayEvents) {
    let expired = state.beatlines[player].expire(state.current_phrase);
    for marker in expired {
        if !state.players[player].is_active() {
            break;
        }
        debug!(
            "P{} missed the beatline at phrase {} by {:.3}.",
            player + 1,
            marker.position,
            marker.late_by
        );
        let incomplete = state.players[player].note_bar.incomplete();
        apply_judgement(state, player, Judgement::Miss, 0, incomplete, out);
    }
}

fn round_is_over(state: &State) -> bool {
    // Everybody is out, or everybody still standing has played every beatline.
    state
        .players
        .iter()
        .zip(&state.beatlines)
        .all(|(p, beatline)| !p.is_active() || beatline.is_finished())
}

/// Advances the round to `elapsed_ms`. `audio_position_ms` is the playback
/// position reported by the audio device, if playback has started.
pub fn update(
    state: &mut State,
    elapsed_ms: f64,
    audio_position_ms: Option<f64>,
) -> GameplayEvents {
    let mut out = GameplayEvents::new();
    if state.finished {
        return out;
    }

    state.clock.advance_to(elapsed_ms);
    if let Some(correction_ms) = state.clock.resync(audio_position_ms) {
        out.push(GameplayEvent::Resynced { correction_ms });
    }
    let phrase = state.clock.phrase();
    let phrases_passed = phrase - state.current_phrase;
    state.current_phrase = phrase;
    drain_blazing(state, phrases_passed, &mut out);

    for player in 0..state.players.len() {
        if !state.players[player].is_active() {
            continue;
        }
        state.beatlines[player].spawn(state.current_phrase);
        if state.players[player].is_cpu && !play_cpu_beatlines(state, player, &mut out) {
            state.finished = true;
            out.push(GameplayEvent::RoundFinished);
            return out;
        }
        expire_beatlines(state, player, &mut out);
    }

    if round_is_over(state) {
        state.finished = true;
        info!("Round finished at phrase {:.2}.", state.current_phrase);
        out.push(GameplayEvent::RoundFinished);
    }

    state.log_timer_ms += (elapsed_ms - state.last_elapsed_ms).max(0.0);
    state.last_elapsed_ms = elapsed_ms;
    if state.log_timer_ms >= STATUS_LOG_INTERVAL_MS {
        let lead = &state.players[0];
        info!(
            "Phrase: {:.2}, BPM: {:.1}, P1 score: {}, life: {:.1}, streak: {}",
            state.current_phrase,
            state.clock.bpm(),
            lead.score,
            lead.life,
            lead.streak
        );
        state.log_timer_ms -= STATUS_LOG_INTERVAL_MS;
    }
    out
}

/// Routes one pad event to its player's note bar or beatline.
pub fn handle_input(state: &mut State, ev: &InputEvent) -> GameplayEvents {
    let mut out = GameplayEvents::new();
    if !ev.pressed || state.finished {
        return out;
    }
    let Some(player) = ev.slot().filter(|&slot| slot < state.players.len()) else {
        warn!("Ignoring input for unknown player {}.", ev.player);
        return out;
    };
    let p = &state.players[player];
    if !p.is_active() || p.is_cpu {
        return out;
    }

    match ev.action {
        VirtualAction::Arrow(lane) => {
            let result = state.players[player].note_bar.press(lane);
            out.push(GameplayEvent::Arrow {
                player,
                lane,
                result,
            });
        }
        VirtualAction::Confirm => {
            let phrase = state.clock.phrase_at_elapsed(ev.timestamp_ms);
            let reach = state.windows.expiry_grace;
            let in_range = state.beatlines[player]
                .nearest_pending(phrase)
                .is_some_and(|m| (m.position - phrase).abs() <= reach);
            let Some(claimed) = in_range
                .then(|| state.beatlines[player].claim(phrase))
                .flatten()
            else {
                debug!("P{} confirmed with no beatline in range.", player + 1);
                return out;
            };
            let bar = &state.players[player].note_bar;
            let (judgement, completed, incomplete) = if bar.is_complete() {
                let streak = state.players[player].streak;
                let judgement = judgment::resolve(claimed.offset, streak, &state.windows);
                (judgement, bar.completed(), 0)
            } else {
                (Judgement::Fail, bar.completed(), bar.incomplete())
            };
            apply_judgement(state, player, judgement, completed, incomplete, &mut out);
        }
    }
    out
}

impl State {
    pub fn beatline(&self, player: usize) -> Option<&BeatlineSchedule> {
        self.beatlines.get(player)
    }

    pub fn active_players(&self) -> usize {
        self.players.iter().filter(|p| p.is_active()).count()
    }
}
