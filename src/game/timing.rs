use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

// A phrase is one bar of four beats; every gameplay decision is made in phrases.
pub const BEATS_PER_PHRASE: f64 = 4.0;
pub const DEFAULT_BPM: f64 = 120.0;

// Drift (ms) between the audio clock and our own clock that we tolerate before
// folding a correction in.
pub const RESYNC_THRESHOLD_MS: f64 = 20.0;
// Fraction of the observed drift folded into the correction per resync.
const RESYNC_DAMPING: f64 = 0.5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("bpm change at phrase {phrase} has invalid bpm {bpm}")]
    InvalidBpm { phrase: f64, bpm: f64 },
    #[error("bpm change at phrase {0} is not finite")]
    InvalidPhrase(f64),
    #[error("malformed bpm entry '{0}'")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy)]
struct BpmPoint {
    phrase: f64,
    /// Song time (ms, offset already removed) at which this segment starts.
    time_ms: f64,
    bpm: f64,
}

/// Piecewise-constant tempo map keyed by phrase position.
#[derive(Debug, Clone)]
pub struct BpmSchedule {
    points: Arc<Vec<BpmPoint>>,
    max_bpm: f64,
}

impl Default for BpmSchedule {
    fn default() -> Self {
        Self::constant(DEFAULT_BPM)
    }
}

#[inline(always)]
fn ms_per_phrase(bpm: f64) -> f64 {
    60_000.0 * BEATS_PER_PHRASE / bpm
}

impl BpmSchedule {
    pub fn constant(bpm: f64) -> Self {
        let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { DEFAULT_BPM };
        Self {
            points: Arc::new(vec![BpmPoint { phrase: 0.0, time_ms: 0.0, bpm }]),
            max_bpm: bpm,
        }
    }

    /// Builds the schedule from `(phrase, bpm)` changes. Changes may arrive in
    /// any order; the earliest one is pulled back to phrase 0 so the tempo is
    /// defined for the whole song.
    pub fn from_changes(changes: &[(f64, f64)]) -> Result<Self, ScheduleError> {
        let mut sorted = changes.to_vec();
        for &(phrase, bpm) in &sorted {
            if !phrase.is_finite() {
                return Err(ScheduleError::InvalidPhrase(phrase));
            }
            if !bpm.is_finite() || bpm <= 0.0 {
                return Err(ScheduleError::InvalidBpm { phrase, bpm });
            }
        }
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        // A later entry at the same phrase replaces the earlier one.
        sorted.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = later.1;
                true
            } else {
                false
            }
        });

        let Some(&(_, first_bpm)) = sorted.first() else {
            return Ok(Self::default());
        };

        let mut points = Vec::with_capacity(sorted.len());
        let mut time_ms = 0.0;
        let mut last_phrase = 0.0;
        let mut last_bpm = first_bpm;
        let mut max_bpm = 0.0_f64;
        for (i, &(phrase, bpm)) in sorted.iter().enumerate() {
            let phrase = if i == 0 { 0.0 } else { phrase.max(0.0) };
            if phrase > last_phrase {
                time_ms += (phrase - last_phrase) * ms_per_phrase(last_bpm);
            }
            points.push(BpmPoint { phrase, time_ms, bpm });
            max_bpm = max_bpm.max(bpm);
            last_phrase = phrase;
            last_bpm = bpm;
        }
        debug!("BpmSchedule built with {} segments (max bpm {max_bpm}).", points.len());

        Ok(Self { points: Arc::new(points), max_bpm })
    }

    /// Parses a `phrase=bpm,phrase=bpm` list as found in song definitions.
    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        let mut changes = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some((phrase_str, bpm_str)) = part.split_once('=') else {
                return Err(ScheduleError::Malformed(part.to_string()));
            };
            let phrase = phrase_str
                .trim()
                .parse::<f64>()
                .map_err(|_| ScheduleError::Malformed(part.to_string()))?;
            let bpm = bpm_str
                .trim()
                .parse::<f64>()
                .map_err(|_| ScheduleError::Malformed(part.to_string()))?;
            changes.push((phrase, bpm));
        }
        Self::from_changes(&changes)
    }

    #[inline(always)]
    fn point_index_for_time(&self, song_ms: f64) -> usize {
        self.points
            .partition_point(|p| p.time_ms <= song_ms)
            .saturating_sub(1)
    }

    #[inline(always)]
    fn point_index_for_phrase(&self, phrase: f64) -> usize {
        self.points
            .partition_point(|p| p.phrase <= phrase)
            .saturating_sub(1)
    }

    /// Phrase position at `song_ms` milliseconds after the song's zero point.
    /// Times before zero extrapolate with the opening tempo.
    pub fn phrase_at(&self, song_ms: f64) -> f64 {
        let p = self.points[self.point_index_for_time(song_ms)];
        p.phrase + (song_ms - p.time_ms) / ms_per_phrase(p.bpm)
    }

    /// Inverse of [`Self::phrase_at`].
    pub fn time_at(&self, phrase: f64) -> f64 {
        let p = self.points[self.point_index_for_phrase(phrase)];
        p.time_ms + (phrase - p.phrase) * ms_per_phrase(p.bpm)
    }

    pub fn bpm_at(&self, phrase: f64) -> f64 {
        self.points[self.point_index_for_phrase(phrase)].bpm
    }

    pub fn max_bpm(&self) -> f64 {
        self.max_bpm
    }

    pub fn segment_count(&self) -> usize {
        self.points.len()
    }
}

/// `(elapsed_ms - offset_s * 1000) / 1000 * bpm / 240`, summed across tempo changes.
#[inline(always)]
pub fn phrase_number(elapsed_ms: f64, schedule: &BpmSchedule, offset_s: f64) -> f64 {
    schedule.phrase_at(elapsed_ms - offset_s * 1000.0)
}

/// Converts round time into phrase time and keeps it locked to the audio clock.
#[derive(Debug, Clone)]
pub struct PhraseClock {
    schedule: BpmSchedule,
    offset_s: f64,
    elapsed_ms: f64,
    resync_accumulator_ms: f64,
    resync_threshold_ms: f64,
}

impl PhraseClock {
    pub fn new(schedule: BpmSchedule, offset_s: f64) -> Self {
        Self {
            schedule,
            offset_s,
            elapsed_ms: 0.0,
            resync_accumulator_ms: 0.0,
            resync_threshold_ms: RESYNC_THRESHOLD_MS,
        }
    }

    pub fn with_resync_threshold(mut self, threshold_ms: f64) -> Self {
        if threshold_ms.is_finite() && threshold_ms >= 0.0 {
            self.resync_threshold_ms = threshold_ms;
        }
        self
    }

    /// Records the raw elapsed round time for this frame.
    pub fn advance_to(&mut self, elapsed_ms: f64) {
        if elapsed_ms.is_finite() {
            self.elapsed_ms = elapsed_ms;
        }
    }

    /// Elapsed time with the accumulated resync correction applied.
    #[inline(always)]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms + self.resync_accumulator_ms
    }

    #[inline(always)]
    pub fn phrase(&self) -> f64 {
        phrase_number(self.elapsed_ms(), &self.schedule, self.offset_s)
    }

    /// Phrase number for a raw round timestamp, e.g. an input event's, using
    /// the current resync correction.
    pub fn phrase_at_elapsed(&self, elapsed_ms: f64) -> f64 {
        phrase_number(
            elapsed_ms + self.resync_accumulator_ms,
            &self.schedule,
            self.offset_s,
        )
    }

    pub fn bpm(&self) -> f64 {
        self.schedule.bpm_at(self.phrase())
    }

    pub fn resync_accumulator_ms(&self) -> f64 {
        self.resync_accumulator_ms
    }

    pub fn schedule(&self) -> &BpmSchedule {
        &self.schedule
    }

    /// Compares the audio playback position against our clock and, if the two
    /// disagree by more than the threshold, moves half of the way towards the
    /// audio clock. Returns the correction applied this call.
    pub fn resync(&mut self, audio_position_ms: Option<f64>) -> Option<f64> {
        let audio_ms = audio_position_ms.filter(|ms| ms.is_finite())?;
        let drift = audio_ms - self.elapsed_ms();
        if drift.abs() <= self.resync_threshold_ms {
            return None;
        }
        let correction = drift * RESYNC_DAMPING;
        self.resync_accumulator_ms += correction;
        info!(
            "Resync: drift {drift:.1}ms, applying {correction:.1}ms (total {:.1}ms).",
            self.resync_accumulator_ms
        );
        Some(correction)
    }
}

#[cfg(test)]
mod tests {
    use super::{BpmSchedule, PhraseClock, ScheduleError, phrase_number};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn two_seconds_at_120_bpm_is_one_phrase() {
        let schedule = BpmSchedule::constant(120.0);
        let phrase = phrase_number(2000.0, &schedule, 0.0);
        assert!(close(phrase, 1.0), "expected 1.0, got {phrase}");
    }

    #[test]
    fn phrase_is_linear_inside_a_constant_segment() {
        let schedule = BpmSchedule::constant(150.0);
        for (t1, t2) in [(0.0, 10.0), (1234.5, 9876.0), (-500.0, 250.0)] {
            let delta = phrase_number(t2, &schedule, 0.25) - phrase_number(t1, &schedule, 0.25);
            let expected = (t2 - t1) / 1000.0 * 150.0 / 240.0;
            assert!(close(delta, expected), "delta {delta} != {expected} for {t1}..{t2}");
        }
    }

    #[test]
    fn offset_shifts_phrase_zero() {
        let schedule = BpmSchedule::constant(120.0);
        assert!(close(phrase_number(1500.0, &schedule, 1.5), 0.0));
        assert!(phrase_number(0.0, &schedule, 1.5) < 0.0);
    }

    #[test]
    fn phrase_accumulates_across_bpm_changes() {
        let schedule = BpmSchedule::parse("0=120,1=240").expect("valid schedule");
        assert!(close(schedule.phrase_at(2000.0), 1.0));
        assert!(close(schedule.phrase_at(3000.0), 2.0));
        assert!(close(schedule.time_at(2.0), 3000.0));
        assert!(close(schedule.bpm_at(1.5), 240.0));
        assert!(close(schedule.bpm_at(0.5), 120.0));
        assert_eq!(schedule.segment_count(), 2);
    }

    #[test]
    fn unsorted_changes_are_ordered_and_first_starts_at_zero() {
        let schedule = BpmSchedule::from_changes(&[(2.0, 60.0), (0.5, 120.0)]).expect("valid");
        assert!(close(schedule.bpm_at(0.0), 120.0));
        assert!(close(schedule.time_at(2.0), 4000.0));
        assert!(close(schedule.max_bpm(), 120.0));
    }

    #[test]
    fn changes_sort_by_phrase_and_the_last_duplicate_wins() {
        let schedule = BpmSchedule::from_changes(&[
            (4.0, 180.0),
            (0.0, 100.0),
            (4.0, 150.0),
            (1.0, 120.0),
        ])
        .expect("valid");
        assert_eq!(schedule.segment_count(), 3);
        assert!(close(schedule.bpm_at(0.5), 100.0));
        assert!(close(schedule.bpm_at(4.0), 150.0));
        // One phrase at 100 BPM, then three at 120.
        assert!(close(schedule.time_at(4.0), 2400.0 + 6000.0));
    }

    #[test]
    fn invalid_bpm_is_rejected() {
        assert_eq!(
            BpmSchedule::from_changes(&[(0.0, 0.0)]).err(),
            Some(ScheduleError::InvalidBpm { phrase: 0.0, bpm: 0.0 })
        );
        assert!(matches!(
            BpmSchedule::parse("0=abc"),
            Err(ScheduleError::Malformed(_))
        ));
    }

    #[test]
    fn resync_folds_half_the_drift() {
        let mut clock = PhraseClock::new(BpmSchedule::constant(120.0), 0.0);
        clock.advance_to(1000.0);
        let applied = clock.resync(Some(1100.0));
        assert_eq!(applied, Some(50.0));
        assert!(close(clock.elapsed_ms(), 1050.0));
        // Still 50ms off: another half step.
        assert_eq!(clock.resync(Some(1100.0)), Some(25.0));
        assert!(close(clock.resync_accumulator_ms(), 75.0));
    }

    #[test]
    fn resync_ignores_small_drift_and_missing_audio() {
        let mut clock = PhraseClock::new(BpmSchedule::constant(120.0), 0.0);
        clock.advance_to(1000.0);
        assert_eq!(clock.resync(Some(1015.0)), None);
        assert_eq!(clock.resync(None), None);
        assert_eq!(clock.resync(Some(f64::NAN)), None);
        assert!(close(clock.resync_accumulator_ms(), 0.0));
        assert!(close(clock.phrase(), 0.5));
    }
}
