use crate::game::gameplay::PlayerRuntime;
use crate::game::judgment::Judgement;
use crate::game::life::{self, NOMINAL_LIFE, adjust_life};
use crate::game::profile::{Difficulty, GameMode};
use smallvec::SmallVec;

// Score per completed note.
pub const SCORE_IDEAL: i64 = 1000;
pub const SCORE_COOL: i64 = 750;
pub const SCORE_OK: i64 = 500;
pub const SCORE_BAD: i64 = 250;

pub const FAIL_MOMENTUM_DECAY: f64 = 0.7;
pub const MOMENTUM_PER_LEVEL: i64 = 40;
pub const MAX_LEVEL: i64 = 10;

// Co-op players share the burden of a missed beatline.
const COOP_MISS_SCALE: f64 = 0.5;
// Sync Pro doubles every life loss.
const SYNC_PRO_DAMAGE_SCALE: f64 = 2.0;

/// Score and life change caused by one judgement.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct JudgementDelta {
    pub score: i64,
    pub life: f64,
}

pub type KnockedOut = SmallVec<[usize; 4]>;

/// Penalty for a FAIL, and the default penalty for a MISS:
/// `-(1 + difficulty) * (incomplete + 1)`.
#[inline(always)]
pub fn fail_penalty(difficulty: Difficulty, incomplete: i32) -> f64 {
    -((1 + difficulty.level()) as f64) * (incomplete.max(0) + 1) as f64
}

/// Raw per-player delta before any mode rules. `streak` is the streak before
/// this judgement is counted.
pub fn base_delta(
    judgement: Judgement,
    streak: i32,
    completed: i32,
    incomplete: i32,
    difficulty: Difficulty,
) -> JudgementDelta {
    let notes = completed.max(0) as i64;
    let notes_f = notes as f64;
    match judgement {
        Judgement::Ideal => {
            let streak_mult = 9 + streak.max(1) as i64;
            JudgementDelta {
                score: SCORE_IDEAL * notes * streak_mult / 10,
                life: life::LIFE_IDEAL * notes_f,
            }
        }
        Judgement::Cool => JudgementDelta {
            score: SCORE_COOL * notes,
            life: life::LIFE_COOL * notes_f,
        },
        Judgement::Ok => JudgementDelta {
            score: SCORE_OK * notes,
            life: life::LIFE_OK * notes_f,
        },
        Judgement::Bad => JudgementDelta {
            score: SCORE_BAD * notes,
            life: life::LIFE_BAD * notes_f,
        },
        Judgement::Fail => JudgementDelta {
            score: 0,
            life: fail_penalty(difficulty, incomplete),
        },
        // Mode-specific; see ScoringPolicy::miss_penalty.
        Judgement::Miss => JudgementDelta::default(),
    }
}

#[inline(always)]
pub fn level_for_momentum(momentum: i64) -> i64 {
    (1 + momentum.max(0) / MOMENTUM_PER_LEVEL).clamp(1, MAX_LEVEL)
}

/// Counts, streak, momentum and level bookkeeping shared by every mode.
pub fn record_judgement(p: &mut PlayerRuntime, judgement: Judgement, completed: i32) {
    p.judgement_counts.record(judgement);
    let notes = completed.max(0) as i64;
    match judgement {
        Judgement::Ideal => {
            p.streak += 1;
            p.max_streak = p.max_streak.max(p.streak);
            p.hits += 1;
            p.momentum += 2 * notes;
        }
        Judgement::Cool => {
            p.streak = 0;
            p.hits += 1;
            p.momentum += notes;
        }
        Judgement::Ok | Judgement::Bad => {
            p.streak = 0;
            p.hits += 1;
        }
        Judgement::Fail => {
            p.streak = 0;
            p.momentum = (p.momentum as f64 * FAIL_MOMENTUM_DECAY) as i64;
        }
        Judgement::Miss => {}
    }
    p.level = level_for_momentum(p.momentum);
}

/// Co-op score multiplier for the number of blazing players.
#[inline(always)]
pub const fn team_bonus(blazing_players: usize) -> i64 {
    match blazing_players {
        0 | 1 => 1,
        2 => 2,
        3 => 4,
        _ => 8,
    }
}

/// One rule set per game mode, chosen once when the round starts.
pub trait ScoringPolicy {
    fn mode(&self) -> GameMode;

    /// Hands the raw delta to whoever should receive it under this mode and
    /// returns what the judged player actually gained.
    fn distribute(
        &mut self,
        players: &mut [PlayerRuntime],
        player: usize,
        delta: JudgementDelta,
    ) -> JudgementDelta;

    fn miss_penalty(&self, difficulty: Difficulty, incomplete: i32) -> f64 {
        fail_penalty(difficulty, incomplete)
    }

    /// Players whose KO triggers after the last judgement.
    fn knocked_out(&self, players: &[PlayerRuntime]) -> KnockedOut {
        players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active() && !p.disable_ko && p.life <= 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    fn apply_judgement(
        &mut self,
        players: &mut [PlayerRuntime],
        player: usize,
        judgement: Judgement,
        completed: i32,
        incomplete: i32,
    ) -> JudgementDelta {
        let p = &players[player];
        let mut delta = base_delta(judgement, p.streak, completed, incomplete, p.difficulty);
        if judgement == Judgement::Miss {
            delta.life = self.miss_penalty(p.difficulty, incomplete);
        }
        record_judgement(&mut players[player], judgement, completed);
        self.distribute(players, player, delta)
    }
}

/// NORMAL, TEAM and VS_CPU: each player keeps their own score and life.
#[derive(Debug, Clone)]
pub struct IndividualPolicy {
    mode: GameMode,
    human_players: i64,
}

impl IndividualPolicy {
    pub fn new(mode: GameMode, players: &[PlayerRuntime]) -> Self {
        let human_players = players.iter().filter(|p| !p.is_cpu).count() as i64;
        Self {
            mode,
            human_players: human_players.max(1),
        }
    }
}

impl ScoringPolicy for IndividualPolicy {
    fn mode(&self) -> GameMode {
        self.mode
    }

    fn distribute(
        &mut self,
        players: &mut [PlayerRuntime],
        player: usize,
        delta: JudgementDelta,
    ) -> JudgementDelta {
        let p = &mut players[player];
        let score = if self.mode == GameMode::VsCpu && p.is_cpu {
            delta.score * self.human_players
        } else {
            delta.score
        };
        p.score += score;
        let before = p.life;
        p.life = adjust_life(before, delta.life, NOMINAL_LIFE, p.max_life);
        JudgementDelta {
            score,
            life: p.life - before,
        }
    }
}

/// COOPERATIVE: the team bonus multiplies score, and life spills between
/// team mates so the whole team shares one capacity pool.
#[derive(Debug, Clone, Default)]
pub struct CooperativePolicy;

impl CooperativePolicy {
    fn neediest(players: &[PlayerRuntime], except: usize) -> Option<usize> {
        players
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != except && p.is_active() && p.life < p.max_life)
            .min_by(|a, b| a.1.life.total_cmp(&b.1.life))
            .map(|(i, _)| i)
    }

    fn healthiest(players: &[PlayerRuntime], except: usize) -> Option<usize> {
        players
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != except && p.is_active() && p.life > 0.0)
            .max_by(|a, b| a.1.life.total_cmp(&b.1.life))
            .map(|(i, _)| i)
    }

    pub fn pool_life(players: &[PlayerRuntime]) -> f64 {
        players.iter().filter(|p| p.is_active()).map(|p| p.life).sum()
    }

    pub fn pool_capacity(players: &[PlayerRuntime]) -> f64 {
        players.iter().filter(|p| p.is_active()).map(|p| p.max_life).sum()
    }
}

impl ScoringPolicy for CooperativePolicy {
    fn mode(&self) -> GameMode {
        GameMode::Cooperative
    }

    fn distribute(
        &mut self,
        players: &mut [PlayerRuntime],
        player: usize,
        delta: JudgementDelta,
    ) -> JudgementDelta {
        let blazing = players.iter().filter(|p| p.is_active() && p.blazing).count();
        let score = delta.score * team_bonus(blazing);
        players[player].score += score;

        let before = players[player].life;
        if delta.life >= 0.0 {
            let uncapped = adjust_life(before, delta.life, NOMINAL_LIFE, f64::INFINITY);
            let max = players[player].max_life;
            players[player].life = uncapped.min(max);
            let spill = uncapped - players[player].life;
            if spill > 0.0
                && let Some(mate) = Self::neediest(players, player)
            {
                let m = &mut players[mate];
                m.life = adjust_life(m.life, spill, NOMINAL_LIFE, m.max_life);
            }
        } else {
            let next = before + delta.life;
            if next < 0.0 {
                players[player].life = 0.0;
                if let Some(mate) = Self::healthiest(players, player) {
                    let m = &mut players[mate];
                    m.life = (m.life + next).max(0.0);
                }
            } else {
                players[player].life = next;
            }
        }

        JudgementDelta {
            score,
            life: players[player].life - before,
        }
    }

    fn miss_penalty(&self, difficulty: Difficulty, incomplete: i32) -> f64 {
        fail_penalty(difficulty, incomplete) * COOP_MISS_SCALE
    }

    /// The team only goes down once the pool is empty.
    fn knocked_out(&self, players: &[PlayerRuntime]) -> KnockedOut {
        if Self::pool_life(players) > 0.0 {
            return KnockedOut::new();
        }
        players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active() && !p.disable_ko)
            .map(|(i, _)| i)
            .collect()
    }
}

/// SYNC, SYNC_PLUS and SYNC_PRO: only the lead (first active) player's
/// judgement moves the shared values, which are then copied to every active
/// player. Other players keep their own counts and streak.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    mode: GameMode,
}

impl SyncPolicy {
    pub fn new(mode: GameMode) -> Self {
        Self { mode }
    }

    #[inline(always)]
    fn syncs_score(&self) -> bool {
        matches!(self.mode, GameMode::SyncPlus | GameMode::SyncPro)
    }
}

impl ScoringPolicy for SyncPolicy {
    fn mode(&self) -> GameMode {
        self.mode
    }

    fn distribute(
        &mut self,
        players: &mut [PlayerRuntime],
        player: usize,
        delta: JudgementDelta,
    ) -> JudgementDelta {
        let Some(leader) = players.iter().position(PlayerRuntime::is_active) else {
            return JudgementDelta::default();
        };
        if player != leader {
            // Plain SYNC still keeps individual scores.
            let score = if self.syncs_score() { 0 } else { delta.score };
            players[player].score += score;
            return JudgementDelta { score, life: 0.0 };
        }
        // The shared bar must fit inside every member's own ceiling.
        let shared_max = players
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.max_life)
            .fold(f64::INFINITY, f64::min);

        let life_delta = if self.mode == GameMode::SyncPro && delta.life < 0.0 {
            delta.life * SYNC_PRO_DAMAGE_SCALE
        } else {
            delta.life
        };
        let before = players[player].life;
        let shared_life = adjust_life(players[leader].life, life_delta, NOMINAL_LIFE, shared_max);
        let shared_score = players[leader].score + delta.score;

        if !self.syncs_score() {
            players[player].score += delta.score;
        }
        for p in players.iter_mut().filter(|p| p.is_active()) {
            p.life = shared_life;
            if self.syncs_score() {
                p.score = shared_score;
            }
        }

        JudgementDelta {
            score: delta.score,
            life: players[player].life - before,
        }
    }
}

/// Picks the rule set for `mode`.
pub fn policy_for(mode: GameMode, players: &[PlayerRuntime]) -> Box<dyn ScoringPolicy> {
    match mode {
        GameMode::Normal | GameMode::Team | GameMode::VsCpu => {
            Box::new(IndividualPolicy::new(mode, players))
        }
        GameMode::Cooperative => Box::new(CooperativePolicy),
        GameMode::Sync | GameMode::SyncPlus | GameMode::SyncPro => Box::new(SyncPolicy::new(mode)),
    }
}
