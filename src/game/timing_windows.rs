// Shared hit windows so gameplay, the CPU model and the summary agree.

// All windows are absolute phrase offsets from the beatline marker.
pub const BASE_IDEAL_WINDOW: f64 = 0.0125;
pub const BASE_COOL_WINDOW: f64 = 0.025;
pub const BASE_OK_WINDOW: f64 = 0.05;
pub const BASE_BAD_WINDOW: f64 = 0.1;

// How far (phrases) a marker may fall behind before it is trimmed as a miss.
pub const BASE_EXPIRY_GRACE: f64 = 0.15;

// Markers are added once the live phrase is this close to the next boundary.
pub const MARKER_LOOKAHEAD_PHRASES: f64 = 2.0;

// Consecutive IDEALs after which IDEAL is no longer awarded.
pub const DEFAULT_STREAK_CAP: i32 = 100;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JudgementWindows {
    /// IDEAL, COOL, OK and BAD upper bounds, tightest first.
    pub windows: [f64; 4],
    pub expiry_grace: f64,
    pub streak_cap: i32,
}

impl Default for JudgementWindows {
    fn default() -> Self {
        Self {
            windows: [
                BASE_IDEAL_WINDOW,
                BASE_COOL_WINDOW,
                BASE_OK_WINDOW,
                BASE_BAD_WINDOW,
            ],
            expiry_grace: BASE_EXPIRY_GRACE,
            streak_cap: DEFAULT_STREAK_CAP,
        }
    }
}

impl JudgementWindows {
    /// Rejects tables whose windows are not strictly increasing, or whose
    /// expiry grace would trim a marker that could still be judged BAD.
    pub fn validated(self) -> Option<Self> {
        let w = self.windows;
        let ordered = w.iter().all(|v| v.is_finite() && *v > 0.0)
            && w.windows(2).all(|pair| pair[0] < pair[1]);
        if !ordered || !self.expiry_grace.is_finite() || self.expiry_grace < w[3] {
            return None;
        }
        Some(Self {
            streak_cap: self.streak_cap.max(1),
            ..self
        })
    }

    /// Windows converted to milliseconds at `bpm`, for display.
    pub fn windows_ms(&self, bpm: f64) -> [f64; 4] {
        let ms_per_phrase = 240_000.0 / bpm.max(f64::EPSILON);
        self.windows.map(|w| w * ms_per_phrase)
    }
}

#[cfg(test)]
mod tests {
    use super::JudgementWindows;

    #[test]
    fn defaults_are_valid() {
        assert!(JudgementWindows::default().validated().is_some());
    }

    #[test]
    fn unordered_windows_are_rejected() {
        let w = JudgementWindows {
            windows: [0.02, 0.01, 0.05, 0.1],
            ..JudgementWindows::default()
        };
        assert!(w.validated().is_none());
    }

    #[test]
    fn grace_shorter_than_bad_window_is_rejected() {
        let w = JudgementWindows {
            expiry_grace: 0.05,
            ..JudgementWindows::default()
        };
        assert!(w.validated().is_none());
    }

    #[test]
    fn windows_in_ms_scale_with_tempo() {
        let ms = JudgementWindows::default().windows_ms(120.0);
        assert!((ms[0] - 25.0).abs() < 1e-9, "ideal at 120bpm should be 25ms, got {}", ms[0]);
        assert!((ms[3] - 200.0).abs() < 1e-9);
    }
}
