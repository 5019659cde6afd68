use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    #[default]
    Easy,
    Medium,
    Hard,
    Insane,
}

impl Difficulty {
    /// 0 for Beginner up to 4 for Insane; feeds the FAIL penalty and max life.
    #[inline(always)]
    pub const fn level(self) -> i32 {
        match self {
            Self::Beginner => 0,
            Self::Easy => 1,
            Self::Medium => 2,
            Self::Hard => 3,
            Self::Insane => 4,
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            "insane" => Ok(Self::Insane),
            other => Err(format!("'{other}' is not a valid Difficulty setting")),
        }
    }
}

impl core::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Beginner => write!(f, "Beginner"),
            Self::Easy => write!(f, "Easy"),
            Self::Medium => write!(f, "Medium"),
            Self::Hard => write!(f, "Hard"),
            Self::Insane => write!(f, "Insane"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Normal,
    Cooperative,
    Team,
    VsCpu,
    SyncPro,
    SyncPlus,
    Sync,
}

impl GameMode {
    #[inline(always)]
    pub const fn is_sync(self) -> bool {
        matches!(self, Self::Sync | Self::SyncPlus | Self::SyncPro)
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut key = String::with_capacity(s.len());
        for ch in s.trim().chars() {
            if ch.is_ascii_alphanumeric() {
                key.push(ch.to_ascii_lowercase());
            }
        }
        match key.as_str() {
            "normal" | "solo" => Ok(Self::Normal),
            "cooperative" | "coop" => Ok(Self::Cooperative),
            "team" => Ok(Self::Team),
            "vscpu" | "cpu" => Ok(Self::VsCpu),
            "syncpro" => Ok(Self::SyncPro),
            "syncplus" => Ok(Self::SyncPlus),
            "sync" => Ok(Self::Sync),
            other => Err(format!("'{other}' is not a valid GameMode setting")),
        }
    }
}

impl core::fmt::Display for GameMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Cooperative => write!(f, "Cooperative"),
            Self::Team => write!(f, "Team"),
            Self::VsCpu => write!(f, "VsCpu"),
            Self::SyncPro => write!(f, "SyncPro"),
            Self::SyncPlus => write!(f, "SyncPlus"),
            Self::Sync => write!(f, "Sync"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Blue,
    Red,
}

impl Team {
    /// Players 1-2 are Blue, 3-4 are Red.
    #[inline(always)]
    pub const fn for_player(player: usize) -> Self {
        if player < 2 { Self::Blue } else { Self::Red }
    }
}

/// Who drives a player slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Controller {
    Human,
    Cpu { skill: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    pub name: String,
    pub difficulty: Difficulty,
    pub disable_ko: bool,
    pub controller: Controller,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            difficulty: Difficulty::default(),
            disable_ko: false,
            controller: Controller::Human,
        }
    }
}

impl PlayerOptions {
    pub fn cpu(name: &str, skill: &str, difficulty: Difficulty) -> Self {
        Self {
            name: name.to_string(),
            difficulty,
            controller: Controller::Cpu {
                skill: skill.to_string(),
            },
            ..Self::default()
        }
    }

    #[inline(always)]
    pub fn is_cpu(&self) -> bool {
        matches!(self.controller, Controller::Cpu { .. })
    }

    pub fn cpu_skill(&self) -> Option<&str> {
        match &self.controller {
            Controller::Cpu { skill } => Some(skill),
            Controller::Human => None,
        }
    }
}
