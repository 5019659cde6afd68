use crate::game::judgment::{Judgement, cap_streak};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("unknown CPU skill level '{0}'")]
    UnknownSkill(String),
    #[error("skill entry '{0}' is missing '='")]
    MissingSeparator(String),
    #[error("skill '{name}' needs {expected} values, found {found}")]
    WrongFieldCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("skill '{name}' has a non-numeric value '{value}'")]
    BadValue { name: String, value: String },
    #[error("skill '{0}' has no weight on any tier")]
    NoWeight(String),
    #[error("failed to read skill file: {0}")]
    Io(#[from] std::io::Error),
}

// Ideal, Cool, OK, Bad and Fail weights followed by the streak cap.
const SKILL_FIELDS: usize = 6;

const BUILTIN_SKILLS: &str = include_str!("../../cpu_skills.txt");

/// Relative odds of each hit tier for one CPU skill level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillProfile {
    pub name: String,
    /// Weights for Ideal, Cool, OK, Bad, Fail (in [`Judgement::HITS`] order).
    pub weights: [u32; 5],
    /// Consecutive Ideals after which the CPU is dropped to Cool.
    pub streak_cap: i32,
}

impl SkillProfile {
    /// The max-streak entry is not part of the roll.
    #[inline(always)]
    pub fn total_weight(&self) -> u32 {
        self.weights.iter().sum()
    }
}

impl FromStr for SkillProfile {
    type Err = SkillError;

    /// Parses `Name = ideal, cool, ok, bad, fail, streak_cap`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((name, values)) = s.split_once('=') else {
            return Err(SkillError::MissingSeparator(s.trim().to_string()));
        };
        let name = name.trim().to_string();
        let fields: Vec<&str> = values.split(',').map(str::trim).collect();
        if fields.len() != SKILL_FIELDS {
            return Err(SkillError::WrongFieldCount {
                name,
                expected: SKILL_FIELDS,
                found: fields.len(),
            });
        }

        let mut numbers = [0u32; SKILL_FIELDS];
        for (slot, field) in numbers.iter_mut().zip(&fields) {
            *slot = field.parse::<u32>().map_err(|_| SkillError::BadValue {
                name: name.clone(),
                value: (*field).to_string(),
            })?;
        }

        let profile = Self {
            weights: [numbers[0], numbers[1], numbers[2], numbers[3], numbers[4]],
            streak_cap: numbers[5].min(i32::MAX as u32) as i32,
            name,
        };
        if profile.total_weight() == 0 {
            return Err(SkillError::NoWeight(profile.name));
        }
        Ok(profile)
    }
}

/// Every skill level known to the CPU opponents, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct SkillTable {
    levels: FxHashMap<String, SkillProfile>,
}

impl SkillTable {
    /// Reads skill definitions, one per line. Blank lines and `#` comments are
    /// ignored; malformed lines are skipped with a warning.
    pub fn parse(content: &str) -> Self {
        let mut levels = FxHashMap::default();
        for (line_no, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            match line.parse::<SkillProfile>() {
                Ok(profile) => {
                    levels.insert(profile.name.to_ascii_lowercase(), profile);
                }
                Err(e) => warn!("Skipping CPU skill line {}: {e}", line_no + 1),
            }
        }
        Self { levels }
    }

    /// The levels shipped with the game, for when no skill file is around.
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_SKILLS)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SkillError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let table = Self::parse(&content);
        info!(
            "Loaded {} CPU skill levels from {}.",
            table.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    pub fn insert(&mut self, profile: SkillProfile) {
        self.levels.insert(profile.name.to_ascii_lowercase(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&SkillProfile> {
        self.levels.get(&name.trim().to_ascii_lowercase())
    }

    /// Like [`Self::get`], for callers that treat a missing level as fatal.
    pub fn require(&self, name: &str) -> Result<&SkillProfile, SkillError> {
        self.get(name)
            .ok_or_else(|| SkillError::UnknownSkill(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.levels.values().map(|p| p.name.as_str())
    }
}

/// Walks the tiers best to worst, subtracting weights from `roll` until it
/// goes negative, then applies the streak cap.
pub fn judgement_for_roll(profile: &SkillProfile, roll: u32, streak: i32) -> Judgement {
    let mut remainder = roll as i64;
    let mut rolled = Judgement::Fail;
    for (tier, weight) in Judgement::HITS.iter().zip(profile.weights) {
        remainder -= weight as i64;
        if remainder < 0 {
            rolled = *tier;
            break;
        }
    }
    cap_streak(rolled, streak, profile.streak_cap)
}

/// Simulated opponent input: a weighted roll per beatline.
#[derive(Debug, Clone)]
pub struct CpuModel<R: Rng = StdRng> {
    table: Arc<SkillTable>,
    rng: R,
}

impl CpuModel<StdRng> {
    pub fn seeded(table: Arc<SkillTable>, seed: u64) -> Self {
        Self::new(table, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> CpuModel<R> {
    pub fn new(table: Arc<SkillTable>, rng: R) -> Self {
        Self { table, rng }
    }

    pub fn table(&self) -> &SkillTable {
        &self.table
    }

    /// `None` means the skill level does not exist; the caller must not apply
    /// anything for this beatline.
    pub fn next_judgement(&mut self, skill: &str, streak: i32) -> Option<Judgement> {
        let Some(profile) = self.table.get(skill) else {
            error!("CPU skill level '{skill}' is not defined.");
            return None;
        };
        let total = profile.total_weight();
        if total == 0 {
            error!("CPU skill level '{skill}' has no weight.");
            return None;
        }
        let roll = self.rng.random_range(0..total);
        Some(judgement_for_roll(profile, roll, streak))
    }
}

#[cfg(test)]
mod tests {
    use super::{CpuModel, SkillError, SkillProfile, SkillTable, judgement_for_roll};
    use crate::game::judgment::Judgement;
    use std::sync::Arc;

    fn sample_profile() -> SkillProfile {
        "Sample = 10, 20, 30, 40, 0, 3".parse().expect("valid skill line")
    }

    #[test]
    fn rolls_walk_tiers_best_to_worst() {
        let p = sample_profile();
        assert_eq!(p.total_weight(), 100);
        assert_eq!(judgement_for_roll(&p, 0, 0), Judgement::Ideal);
        assert_eq!(judgement_for_roll(&p, 9, 0), Judgement::Ideal);
        assert_eq!(judgement_for_roll(&p, 10, 0), Judgement::Cool);
        assert_eq!(judgement_for_roll(&p, 29, 0), Judgement::Cool);
        assert_eq!(judgement_for_roll(&p, 30, 0), Judgement::Ok);
        assert_eq!(judgement_for_roll(&p, 60, 0), Judgement::Bad);
        assert_eq!(judgement_for_roll(&p, 99, 0), Judgement::Bad);
    }

    #[test]
    fn ideal_roll_at_streak_cap_is_demoted_to_cool() {
        let p = sample_profile();
        assert_eq!(judgement_for_roll(&p, 5, 2), Judgement::Ideal);
        assert_eq!(judgement_for_roll(&p, 5, 3), Judgement::Cool);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let table = SkillTable::parse(
            "# name = ideal, cool, ok, bad, fail, cap\n\
             Easy = 5, 15, 30, 30, 20, 4\n\
             Broken = 1, 2, three, 4, 5, 6\n\
             Short = 1, 2\n\
             NoEquals 1,2,3,4,5,6\n\
             \n\
             Hard = 40, 30, 20, 8, 2, 12\n",
        );
        assert_eq!(table.len(), 2);
        assert!(table.get("easy").is_some());
        assert_eq!(table.get("HARD").map(|p| p.streak_cap), Some(12));
        assert!(table.get("Broken").is_none());
    }

    #[test]
    fn builtin_levels_are_all_valid() {
        let table = SkillTable::builtin();
        assert_eq!(table.len(), 5);
        for name in ["Beginner", "Easy", "Normal", "Hard", "Expert"] {
            assert!(table.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn single_entry_errors_are_reported() {
        assert!(matches!(
            "X = 1, 2, 3".parse::<SkillProfile>(),
            Err(SkillError::WrongFieldCount { found: 3, .. })
        ));
        assert!(matches!(
            "X = 0, 0, 0, 0, 0, 5".parse::<SkillProfile>(),
            Err(SkillError::NoWeight(_))
        ));
        assert!(matches!(
            "X = 1, -2, 3, 4, 5, 6".parse::<SkillProfile>(),
            Err(SkillError::BadValue { .. })
        ));
    }

    #[test]
    fn unknown_skill_yields_no_judgement() {
        let mut model = CpuModel::seeded(Arc::new(SkillTable::default()), 7);
        assert_eq!(model.next_judgement("Nobody", 0), None);
        assert!(matches!(
            model.table().require("Nobody"),
            Err(SkillError::UnknownSkill(_))
        ));
    }

    #[test]
    fn rolled_tiers_follow_weights() {
        let mut table = SkillTable::default();
        table.insert("Perfect = 1, 0, 0, 0, 0, 1000".parse().expect("valid"));
        table.insert("Sloppy = 0, 0, 0, 1, 1, 0".parse().expect("valid"));
        let mut model = CpuModel::seeded(Arc::new(table), 42);
        for streak in 0..50 {
            assert_eq!(model.next_judgement("perfect", streak), Some(Judgement::Ideal));
        }
        for _ in 0..50 {
            let j = model.next_judgement("Sloppy", 0).expect("known skill");
            assert!(matches!(j, Judgement::Bad | Judgement::Fail), "got {j}");
        }
    }
}
