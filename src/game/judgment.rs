use crate::game::timing_windows::JudgementWindows;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Judgement {
    Ideal,
    Cool,
    Ok,
    Bad,
    Fail,
    Miss,
}

/// Number of judgement tiers; sizes every per-tier table.
pub const JUDGEMENT_COUNT: usize = 6;

impl Judgement {
    /// Every tier, best first.
    pub const ALL: [Judgement; JUDGEMENT_COUNT] = [
        Judgement::Ideal,
        Judgement::Cool,
        Judgement::Ok,
        Judgement::Bad,
        Judgement::Fail,
        Judgement::Miss,
    ];

    /// Tiers a hit can land in (MISS only comes from an expired marker).
    pub const HITS: [Judgement; 5] = [
        Judgement::Ideal,
        Judgement::Cool,
        Judgement::Ok,
        Judgement::Bad,
        Judgement::Fail,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Self::Ideal => 0,
            Self::Cool => 1,
            Self::Ok => 2,
            Self::Bad => 3,
            Self::Fail => 4,
            Self::Miss => 5,
        }
    }

    /// The next worse tier; MISS stays MISS.
    #[inline(always)]
    pub const fn demoted(self) -> Self {
        match self {
            Self::Ideal => Self::Cool,
            Self::Cool => Self::Ok,
            Self::Ok => Self::Bad,
            Self::Bad => Self::Fail,
            Self::Fail | Self::Miss => Self::Miss,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ideal => "Ideal",
            Self::Cool => "Cool",
            Self::Ok => "OK",
            Self::Bad => "Bad",
            Self::Fail => "Fail",
            Self::Miss => "Miss",
        }
    }
}

impl core::fmt::Display for Judgement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier counters indexed by [`Judgement::index`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgementCounts(pub [i32; JUDGEMENT_COUNT]);

impl JudgementCounts {
    #[inline(always)]
    pub fn record(&mut self, judgement: Judgement) {
        self.0[judgement.index()] += 1;
    }

    #[inline(always)]
    pub fn get(&self, judgement: Judgement) -> i32 {
        self.0[judgement.index()]
    }

    pub fn total(&self) -> i32 {
        self.0.iter().sum()
    }
}

/// IDEAL is never awarded once the streak has reached the cap; it drops exactly
/// one tier instead.
#[inline(always)]
pub fn cap_streak(judgement: Judgement, streak: i32, streak_cap: i32) -> Judgement {
    if judgement == Judgement::Ideal && streak >= streak_cap {
        judgement.demoted()
    } else {
        judgement
    }
}

/// Buckets a signed phrase offset into a tier by its magnitude. Anything
/// outside the BAD window is a FAIL.
#[inline(always)]
pub fn classify_offset(offset: f64, windows: &JudgementWindows) -> Judgement {
    let abs = offset.abs();
    let w = windows.windows;
    if abs.is_nan() {
        Judgement::Fail
    } else if abs <= w[0] {
        Judgement::Ideal
    } else if abs <= w[1] {
        Judgement::Cool
    } else if abs <= w[2] {
        Judgement::Ok
    } else if abs <= w[3] {
        Judgement::Bad
    } else {
        Judgement::Fail
    }
}

/// `hit_offset` is the hit's phrase minus the marker's phrase.
pub fn resolve(hit_offset: f64, current_streak: i32, windows: &JudgementWindows) -> Judgement {
    cap_streak(
        classify_offset(hit_offset, windows),
        current_streak,
        windows.streak_cap,
    )
}
