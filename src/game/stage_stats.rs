use crate::game::gameplay::{PlayerRuntime, State};
use crate::game::judgment::{Judgement, JudgementCounts};
use crate::game::profile::{Difficulty, GameMode, Team};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// Accuracy credit per tier; FAIL and MISS earn nothing.
const ACCURACY_WEIGHTS: [(Judgement, f64); 4] = [
    (Judgement::Ideal, 1.0),
    (Judgement::Cool, 0.75),
    (Judgement::Ok, 0.5),
    (Judgement::Bad, 0.25),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    E,
    /// Knocked out.
    F,
}

impl core::fmt::Display for Grade {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
        };
        f.write_str(s)
    }
}

pub fn grade_for(accuracy_percent: f64, knocked_out: bool) -> Grade {
    if knocked_out {
        return Grade::F;
    }
    match accuracy_percent {
        a if a >= 95.0 => Grade::S,
        a if a >= 90.0 => Grade::A,
        a if a >= 80.0 => Grade::B,
        a if a >= 70.0 => Grade::C,
        a if a >= 60.0 => Grade::D,
        _ => Grade::E,
    }
}

/// Weighted share of beatlines hit, 0-100. A round with no beatlines is 0.
pub fn accuracy_percent(counts: &JudgementCounts) -> f64 {
    let total = counts.total();
    if total <= 0 {
        return 0.0;
    }
    let earned: f64 = ACCURACY_WEIGHTS
        .iter()
        .map(|&(j, w)| counts.get(j) as f64 * w)
        .sum();
    earned / total as f64 * 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgementTally {
    pub ideal: i32,
    pub cool: i32,
    pub ok: i32,
    pub bad: i32,
    pub fail: i32,
    pub miss: i32,
}

impl From<&JudgementCounts> for JudgementTally {
    fn from(c: &JudgementCounts) -> Self {
        Self {
            ideal: c.get(Judgement::Ideal),
            cool: c.get(Judgement::Cool),
            ok: c.get(Judgement::Ok),
            bad: c.get(Judgement::Bad),
            fail: c.get(Judgement::Fail),
            miss: c.get(Judgement::Miss),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    /// 1-based pad number.
    pub player: usize,
    pub name: String,
    pub cpu: bool,
    pub difficulty: Difficulty,
    pub team: Team,
    pub score: i64,
    pub judgements: JudgementTally,
    pub max_streak: i32,
    pub hits: i32,
    pub accuracy: f64,
    pub grade: Grade,
    pub knocked_out: bool,
    pub final_life: f64,
}

impl PlayerSummary {
    pub fn from_player(p: &PlayerRuntime) -> Self {
        let accuracy = accuracy_percent(&p.judgement_counts);
        Self {
            player: p.slot + 1,
            name: p.name.clone(),
            cpu: p.is_cpu,
            difficulty: p.difficulty,
            team: p.team,
            score: p.score,
            judgements: JudgementTally::from(&p.judgement_counts),
            max_streak: p.max_streak,
            hits: p.hits,
            accuracy,
            grade: grade_for(accuracy, p.is_ko),
            knocked_out: p.is_ko,
            final_life: p.life,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamTotal {
    pub team: Team,
    pub score: i64,
    pub members: usize,
}

/// End-of-round record handed to whoever persists scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub mode: GameMode,
    /// RFC 3339, UTC.
    pub played_at: String,
    pub final_phrase: f64,
    pub players: Vec<PlayerSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub teams: Vec<TeamTotal>,
    /// `None` outside TEAM mode or on a tie.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub winning_team: Option<Team>,
}

impl RoundSummary {
    pub fn from_state(state: &State) -> Self {
        Self::from_state_at(state, Utc::now())
    }

    pub fn from_state_at(state: &State, at: DateTime<Utc>) -> Self {
        let players: Vec<PlayerSummary> =
            state.players.iter().map(PlayerSummary::from_player).collect();
        let teams = if state.mode == GameMode::Team {
            team_totals(&players)
        } else {
            Vec::new()
        };
        let winning_team = winner(&teams);
        Self {
            mode: state.mode,
            played_at: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            final_phrase: state.current_phrase,
            players,
            teams,
            winning_team,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn team_totals(players: &[PlayerSummary]) -> Vec<TeamTotal> {
    [Team::Blue, Team::Red]
        .into_iter()
        .filter_map(|team| {
            let members: Vec<&PlayerSummary> = players.iter().filter(|p| p.team == team).collect();
            (!members.is_empty()).then(|| TeamTotal {
                team,
                score: members.iter().map(|p| p.score).sum(),
                members: members.len(),
            })
        })
        .collect()
}

fn winner(teams: &[TeamTotal]) -> Option<Team> {
    let [a, b] = teams else {
        return None;
    };
    match a.score.cmp(&b.score) {
        std::cmp::Ordering::Greater => Some(a.team),
        std::cmp::Ordering::Less => Some(b.team),
        std::cmp::Ordering::Equal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Grade, RoundSummary, accuracy_percent, grade_for};
    use crate::game::cpu::SkillTable;
    use crate::game::gameplay::{self, RoundSetup};
    use crate::game::judgment::{Judgement, JudgementCounts};
    use crate::game::profile::{GameMode, PlayerOptions, Team};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[test]
    fn grades_follow_accuracy_bands() {
        assert_eq!(grade_for(100.0, false), Grade::S);
        assert_eq!(grade_for(95.0, false), Grade::S);
        assert_eq!(grade_for(94.9, false), Grade::A);
        assert_eq!(grade_for(80.0, false), Grade::B);
        assert_eq!(grade_for(70.0, false), Grade::C);
        assert_eq!(grade_for(60.0, false), Grade::D);
        assert_eq!(grade_for(12.0, false), Grade::E);
        assert_eq!(grade_for(100.0, true), Grade::F);
    }

    #[test]
    fn accuracy_weights_each_tier() {
        let mut counts = JudgementCounts::default();
        assert_eq!(accuracy_percent(&counts), 0.0);
        counts.record(Judgement::Ideal);
        counts.record(Judgement::Cool);
        counts.record(Judgement::Bad);
        counts.record(Judgement::Miss);
        // (1 + 0.75 + 0.25 + 0) / 4
        assert!((accuracy_percent(&counts) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn team_summary_names_the_leading_team() {
        let mut state = gameplay::init(
            RoundSetup {
                mode: GameMode::Team,
                players: vec![PlayerOptions::default(); 4],
                ..RoundSetup::default()
            },
            Arc::new(SkillTable::default()),
        )
        .expect("valid round");
        state.players[0].score = 1000;
        state.players[2].score = 400;
        state.players[3].score = 500;

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date");
        let summary = RoundSummary::from_state_at(&state, at);
        assert_eq!(summary.played_at, "2026-03-01T12:00:00Z");
        assert_eq!(summary.teams.len(), 2);
        assert_eq!(summary.teams[1].score, 900);
        assert_eq!(summary.winning_team, Some(Team::Blue));

        let json = summary.to_json().expect("serializable");
        let back: RoundSummary = serde_json::from_str(&json).expect("parses back");
        assert_eq!(back, summary);
    }

    #[test]
    fn solo_summary_has_no_teams() {
        let state = gameplay::init(RoundSetup::default(), Arc::new(SkillTable::default()))
            .expect("valid round");
        let summary = RoundSummary::from_state(&state);
        assert!(summary.teams.is_empty());
        assert_eq!(summary.winning_team, None);
        assert_eq!(summary.players[0].player, 1);
        assert!(!summary.to_json().expect("serializable").contains("winning_team"));
    }
}
