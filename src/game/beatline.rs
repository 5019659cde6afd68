use crate::game::timing_windows::{BASE_EXPIRY_GRACE, MARKER_LOOKAHEAD_PHRASES};
use log::trace;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// A point in phrase time at which the player has to confirm.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BeatMarker {
    pub position: f64,
    pub hit: bool,
}

/// A marker that scrolled past the grace window without being hit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ExpiredMarker {
    pub position: f64,
    pub late_by: f64,
}

/// A marker claimed by a confirm press.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClaimedMarker {
    pub position: f64,
    /// Hit phrase minus marker phrase; negative is early.
    pub offset: f64,
}

pub type ExpiredMarkers = SmallVec<[ExpiredMarker; 2]>;

/// One beatline: a marker on every integer phrase, spawned ahead of time and
/// trimmed once it can no longer be hit.
#[derive(Clone, Debug)]
pub struct BeatlineSchedule {
    markers: VecDeque<BeatMarker>,
    next_boundary: i64,
    last_boundary: Option<i64>,
    lookahead: f64,
    grace: f64,
}

impl Default for BeatlineSchedule {
    fn default() -> Self {
        Self::new(1, BASE_EXPIRY_GRACE)
    }
}

impl BeatlineSchedule {
    pub fn new(first_boundary: i64, grace: f64) -> Self {
        Self {
            markers: VecDeque::with_capacity(4),
            next_boundary: first_boundary,
            last_boundary: None,
            lookahead: MARKER_LOOKAHEAD_PHRASES,
            grace: grace.max(0.0),
        }
    }

    /// No markers are spawned past `last_boundary`.
    pub fn with_last_boundary(mut self, last_boundary: i64) -> Self {
        self.last_boundary = Some(last_boundary);
        self
    }

    /// Spawns markers that came into the lookahead and trims those that fell
    /// behind `phrase` by more than the grace window. Unhit trimmed markers
    /// are returned, earliest first.
    pub fn tick(&mut self, phrase: f64) -> ExpiredMarkers {
        self.spawn(phrase);
        self.expire(phrase)
    }

    /// Appends a marker for every boundary within the lookahead of `phrase`.
    pub fn spawn(&mut self, phrase: f64) {
        if !phrase.is_finite() {
            return;
        }
        while self.next_boundary as f64 - phrase <= self.lookahead
            && self.last_boundary.is_none_or(|last| self.next_boundary <= last)
        {
            trace!("Spawning beatline marker at phrase {}.", self.next_boundary);
            self.markers.push_back(BeatMarker {
                position: self.next_boundary as f64,
                hit: false,
            });
            self.next_boundary += 1;
        }
    }

    /// Trims markers more than the grace window behind `phrase`, returning the
    /// unhit ones.
    pub fn expire(&mut self, phrase: f64) -> ExpiredMarkers {
        let mut expired = ExpiredMarkers::new();
        if !phrase.is_finite() {
            return expired;
        }
        while let Some(front) = self.markers.front().copied() {
            if front.position + self.grace >= phrase {
                break;
            }
            self.markers.pop_front();
            if !front.hit {
                expired.push(ExpiredMarker {
                    position: front.position,
                    late_by: phrase - front.position,
                });
            }
        }
        expired
    }

    /// The unhit marker closest to `phrase`; the earliest wins a tie.
    pub fn nearest_pending(&self, phrase: f64) -> Option<&BeatMarker> {
        let mut best: Option<&BeatMarker> = None;
        for marker in self.markers.iter().filter(|m| !m.hit) {
            match best {
                Some(b) if (marker.position - phrase).abs() >= (b.position - phrase).abs() => {}
                _ => best = Some(marker),
            }
        }
        best
    }

    /// Marks the nearest unhit marker as hit and reports the timing offset.
    pub fn claim(&mut self, phrase: f64) -> Option<ClaimedMarker> {
        let position = self.nearest_pending(phrase)?.position;
        let marker = self.markers.iter_mut().find(|m| m.position == position)?;
        marker.hit = true;
        Some(ClaimedMarker {
            position,
            offset: phrase - position,
        })
    }

    /// Claims the earliest unhit marker that is already due at `phrase`.
    pub fn claim_earliest_due(&mut self, phrase: f64) -> Option<ClaimedMarker> {
        let marker = self
            .markers
            .iter_mut()
            .find(|m| !m.hit && m.position <= phrase)?;
        marker.hit = true;
        Some(ClaimedMarker {
            position: marker.position,
            offset: phrase - marker.position,
        })
    }

    pub fn markers(&self) -> impl Iterator<Item = &BeatMarker> {
        self.markers.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.markers.iter().filter(|m| !m.hit).count()
    }

    /// True once every marker up to the last boundary has been spawned and trimmed.
    pub fn is_finished(&self) -> bool {
        self.markers.is_empty()
            && self
                .last_boundary
                .is_some_and(|last| self.next_boundary > last)
    }
}

#[cfg(test)]
mod tests {
    use super::BeatlineSchedule;

    fn positions(s: &BeatlineSchedule) -> Vec<f64> {
        s.markers().map(|m| m.position).collect()
    }

    #[test]
    fn markers_spawn_two_phrases_ahead() {
        let mut s = BeatlineSchedule::new(1, 0.15);
        assert!(s.tick(-1.5).is_empty());
        assert!(positions(&s).is_empty(), "nothing within lookahead yet");
        s.tick(-1.0);
        assert_eq!(positions(&s), vec![1.0]);
        s.tick(0.0);
        assert_eq!(positions(&s), vec![1.0, 2.0]);
        s.tick(0.99);
        assert_eq!(positions(&s), vec![1.0, 2.0]);
        s.tick(1.0);
        assert_eq!(positions(&s), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn spawned_markers_can_be_claimed_before_they_expire() {
        let mut s = BeatlineSchedule::new(1, 0.15);
        s.spawn(1.25);
        let claimed = s.claim_earliest_due(1.25).expect("marker 1 is due");
        assert_eq!(claimed.position, 1.0);
        assert!(s.expire(1.25).is_empty(), "claimed markers are not missed");
        assert_eq!(positions(&s), vec![2.0, 3.0]);
    }

    #[test]
    fn unhit_markers_expire_after_grace() {
        let mut s = BeatlineSchedule::new(1, 0.15);
        s.tick(0.0);
        assert!(s.tick(1.15).is_empty(), "still inside grace");
        let expired = s.tick(1.2);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].position, 1.0);
        assert!((expired[0].late_by - 0.2).abs() < 1e-9);
    }

    #[test]
    fn hit_markers_are_trimmed_silently() {
        let mut s = BeatlineSchedule::new(1, 0.15);
        s.tick(0.98);
        let claimed = s.claim(0.98).expect("marker in range");
        assert_eq!(claimed.position, 1.0);
        assert!((claimed.offset + 0.02).abs() < 1e-9);
        assert!(s.tick(1.5).is_empty());
        assert_eq!(positions(&s), vec![2.0, 3.0]);
    }

    #[test]
    fn skipped_frames_expire_every_passed_marker_in_order() {
        let mut s = BeatlineSchedule::new(1, 0.15);
        s.tick(0.0);
        let expired = s.tick(3.5);
        let got: Vec<f64> = expired.iter().map(|e| e.position).collect();
        assert_eq!(got, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn nearest_marker_is_claimed_and_ties_go_to_the_earliest() {
        let mut s = BeatlineSchedule::new(1, 0.15);
        s.tick(0.5);
        // Equidistant from 1.0 and 2.0.
        assert_eq!(s.nearest_pending(1.5).map(|m| m.position), Some(1.0));
        assert_eq!(s.claim(1.9).map(|c| c.position), Some(2.0));
        assert_eq!(s.claim(1.9).map(|c| c.position), Some(1.0));
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn due_markers_are_claimed_in_order() {
        let mut s = BeatlineSchedule::new(1, 0.15);
        s.tick(0.5);
        assert!(s.claim_earliest_due(0.9).is_none());
        s.tick(2.05);
        assert_eq!(s.claim_earliest_due(2.05).map(|c| c.position), Some(2.0));
        assert!(s.claim_earliest_due(2.05).is_none());
    }

    #[test]
    fn last_boundary_stops_spawning() {
        let mut s = BeatlineSchedule::new(1, 0.15).with_last_boundary(2);
        s.tick(5.0);
        assert!(s.is_finished());
        let mut s = BeatlineSchedule::new(1, 0.15).with_last_boundary(2);
        s.tick(0.0);
        assert_eq!(positions(&s), vec![1.0, 2.0]);
        assert!(!s.is_finished());
    }
}
