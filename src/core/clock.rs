/// Where a round gets its notion of "now" from.
pub trait TimeSource {
    /// Milliseconds since the round started.
    fn elapsed_ms(&self) -> f64;

    /// Playback position reported by the audio device, once playback has
    /// started.
    fn audio_position_ms(&self) -> Option<f64>;
}

/// A clock that only moves when told to, with an audio stream that can run
/// fast or slow against it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedClock {
    elapsed_ms: f64,
    audio_ms: f64,
    /// Audio milliseconds per clock millisecond minus one.
    audio_drift: f64,
    audio_started: bool,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the simulated audio run `drift` faster (positive) or slower.
    pub fn with_audio_drift(mut self, drift: f64) -> Self {
        self.audio_drift = drift;
        self
    }

    pub fn start_audio(&mut self) {
        self.audio_started = true;
    }

    pub fn advance(&mut self, delta_ms: f64) {
        let delta_ms = delta_ms.max(0.0);
        self.elapsed_ms += delta_ms;
        if self.audio_started {
            self.audio_ms += delta_ms * (1.0 + self.audio_drift);
        }
    }
}

impl TimeSource for SimulatedClock {
    fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    fn audio_position_ms(&self) -> Option<f64> {
        self.audio_started.then_some(self.audio_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulatedClock, TimeSource};

    #[test]
    fn audio_position_is_absent_until_playback_starts() {
        let mut clock = SimulatedClock::new();
        clock.advance(100.0);
        assert_eq!(clock.elapsed_ms(), 100.0);
        assert_eq!(clock.audio_position_ms(), None);
        clock.start_audio();
        clock.advance(50.0);
        assert_eq!(clock.audio_position_ms(), Some(50.0));
    }

    #[test]
    fn drifting_audio_pulls_away_from_the_clock() {
        let mut clock = SimulatedClock::new().with_audio_drift(0.01);
        clock.start_audio();
        clock.advance(1000.0);
        let audio = clock.audio_position_ms().unwrap_or_default();
        assert!((audio - 1010.0).abs() < 1e-9, "got {audio}");
    }

    #[test]
    fn time_never_runs_backwards() {
        let mut clock = SimulatedClock::new();
        clock.advance(10.0);
        clock.advance(-5.0);
        assert_eq!(clock.elapsed_ms(), 10.0);
    }
}
