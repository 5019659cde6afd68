use crate::core::input::Lane;
use rand::Rng;
use smallvec::SmallVec;

/// Outcome of one directional press against a note bar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArrowPress {
    Completed,
    /// Wrong direction; progress went back to the first arrow.
    Reset,
    /// Every arrow is already done; the press is ignored.
    Full,
}

/// The arrows a player has to enter before confirming on the beatline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteBar {
    arrows: SmallVec<[Lane; 10]>,
    completed: usize,
}

impl NoteBar {
    pub fn new(arrows: &[Lane]) -> Self {
        Self {
            arrows: SmallVec::from_slice(arrows),
            completed: 0,
        }
    }

    /// A random bar of `length` arrows.
    pub fn generate<R: Rng + ?Sized>(length: usize, rng: &mut R) -> Self {
        let arrows = (0..length)
            .map(|_| Lane::from_index(rng.random_range(0..Lane::ALL.len())))
            .collect();
        Self {
            arrows,
            completed: 0,
        }
    }

    pub fn press(&mut self, lane: Lane) -> ArrowPress {
        match self.arrows.get(self.completed) {
            None => ArrowPress::Full,
            Some(&expected) if expected == lane => {
                self.completed += 1;
                ArrowPress::Completed
            }
            Some(_) => {
                self.completed = 0;
                ArrowPress::Reset
            }
        }
    }

    #[inline(always)]
    pub fn completed(&self) -> i32 {
        self.completed as i32
    }

    #[inline(always)]
    pub fn incomplete(&self) -> i32 {
        (self.arrows.len() - self.completed) as i32
    }

    #[inline(always)]
    pub fn is_complete(&self) -> bool {
        self.completed == self.arrows.len()
    }

    pub fn len(&self) -> usize {
        self.arrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrows.is_empty()
    }

    pub fn arrows(&self) -> &[Lane] {
        &self.arrows
    }

    /// The arrow the player has to enter next.
    pub fn next_arrow(&self) -> Option<Lane> {
        self.arrows.get(self.completed).copied()
    }
}
