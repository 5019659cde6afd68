use crate::game::profile::Difficulty;

pub const STARTING_LIFE: f64 = 50.0;
// Life above this is "surplus": it only fills at a reduced rate.
pub const NOMINAL_LIFE: f64 = 100.0;
pub const LIFE_PER_DIFFICULTY: f64 = 25.0;
pub const OVERFLOW_RATE: f64 = 0.75;

// Blazing burns surplus life at this rate (per phrase) until it is gone.
pub const BLAZING_DRAIN_PER_PHRASE: f64 = 6.0;

// Life per completed note.
pub const LIFE_IDEAL: f64 = 1.0;
pub const LIFE_COOL: f64 = 0.5;
pub const LIFE_OK: f64 = 0.0;
pub const LIFE_BAD: f64 = -1.0;

/// Ceiling for one player: 100 on Beginner, +25 per difficulty step.
#[inline(always)]
pub fn max_life(difficulty: Difficulty) -> f64 {
    NOMINAL_LIFE + LIFE_PER_DIFFICULTY * difficulty.level() as f64
}

/// Applies `delta` with the surplus soft cap: whatever lands above `nominal`
/// only counts at 75%, and the result is clipped into `[0, max]`.
pub fn adjust_life(life: f64, delta: f64, nominal: f64, max: f64) -> f64 {
    let mut next = life + delta;
    if delta > 0.0 {
        if life >= nominal {
            next = life + delta * OVERFLOW_RATE;
        } else if next > nominal {
            next = nominal + (next - nominal) * OVERFLOW_RATE;
        }
    }
    next.clamp(0.0, max.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::{NOMINAL_LIFE, adjust_life, max_life};
    use crate::game::profile::Difficulty;

    #[test]
    fn crossing_nominal_applies_three_quarters_of_the_excess() {
        let life = adjust_life(95.0, 10.0, NOMINAL_LIFE, 150.0);
        assert!((life - 103.75).abs() < 1e-9, "got {life}");
    }

    #[test]
    fn gains_above_nominal_are_reduced() {
        let life = adjust_life(110.0, 4.0, NOMINAL_LIFE, 150.0);
        assert!((life - 113.0).abs() < 1e-9, "got {life}");
    }

    #[test]
    fn losses_are_never_reduced() {
        assert_eq!(adjust_life(110.0, -20.0, NOMINAL_LIFE, 150.0), 90.0);
    }

    #[test]
    fn result_is_clipped_to_range() {
        assert_eq!(adjust_life(5.0, -12.0, NOMINAL_LIFE, 100.0), 0.0);
        assert_eq!(adjust_life(99.0, 50.0, NOMINAL_LIFE, 100.0), 100.0);
        assert_eq!(adjust_life(200.0, 0.0, NOMINAL_LIFE, 125.0), 125.0);
    }

    #[test]
    fn max_life_grows_with_difficulty() {
        assert_eq!(max_life(Difficulty::Beginner), 100.0);
        assert_eq!(max_life(Difficulty::Hard), 175.0);
        assert_eq!(max_life(Difficulty::Insane), 200.0);
    }
}
