//! Pending-candidate tracking
//!
//! Holds at most one pending candidate per direction. A candidate is only replaced
//! by one with a more extreme anchor (lower low for uptrends, higher high for
//! downtrends), or an equal anchor and a more extreme close.

use crate::{Direction, OHLCV};

// ============================================================
// PENDING CANDIDATE
// ============================================================

/// A tentative reversal bar awaiting confirmation
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PendingCandidate {
    pub direction: Direction,
    /// Slice position of the candidate bar
    pub position: usize,
    pub bar_index: u64,
    /// Low for an uptrend candidate, high for a downtrend candidate
    pub anchor: f64,
    /// Close of the candidate bar, used to break anchor ties
    pub companion: f64,
}

impl PendingCandidate {
    pub fn from_bar<T: OHLCV + ?Sized>(
        direction: Direction,
        position: usize,
        bar: &T,
        bar_index: u64,
    ) -> Self {
        let anchor = match direction {
            Direction::Up => bar.low(),
            Direction::Down => bar.high(),
        };
        Self {
            direction,
            position,
            bar_index,
            anchor,
            companion: bar.close(),
        }
    }

    /// Strictly more extreme than `other` on the same side
    pub fn improves_on(&self, other: &PendingCandidate) -> bool {
        if self.direction != other.direction {
            return false;
        }
        match self.direction {
            Direction::Up => {
                self.anchor < other.anchor
                    || (self.anchor == other.anchor && self.companion < other.companion)
            }
            Direction::Down => {
                self.anchor > other.anchor
                    || (self.anchor == other.anchor && self.companion > other.companion)
            }
        }
    }
}

/// What `form_pending` did with a nominated bar
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome", content = "candidate", rename_all = "snake_case")]
pub enum FormOutcome {
    /// No candidate was live; the nominee became the candidate
    Formed,
    /// The nominee replaced the returned candidate
    Superseded(PendingCandidate),
    /// The returned live candidate was at least as extreme and stays
    Retained(PendingCandidate),
}

// ============================================================
// CANDIDATE TRACKER
// ============================================================

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidateTracker {
    up: Option<PendingCandidate>,
    down: Option<PendingCandidate>,
}

impl CandidateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self, direction: Direction) -> Option<&PendingCandidate> {
        match direction {
            Direction::Up => self.up.as_ref(),
            Direction::Down => self.down.as_ref(),
        }
    }

    #[inline]
    fn slot_mut(&mut self, direction: Direction) -> &mut Option<PendingCandidate> {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }

    /// Nominate `candidate` for its side: it becomes the candidate if none is live,
    /// otherwise it has to improve on the live one.
    pub fn form_pending(&mut self, candidate: PendingCandidate) -> FormOutcome {
        let Some(held) = self.current(candidate.direction).copied() else {
            *self.slot_mut(candidate.direction) = Some(candidate);
            return FormOutcome::Formed;
        };
        match self.maybe_supersede(candidate) {
            Some(replaced) => FormOutcome::Superseded(replaced),
            None => FormOutcome::Retained(held),
        }
    }

    /// Replace the live candidate only if `candidate` improves on it. Returns the
    /// replaced candidate; does nothing when no candidate is live.
    pub fn maybe_supersede(&mut self, candidate: PendingCandidate) -> Option<PendingCandidate> {
        let slot = self.slot_mut(candidate.direction);
        match *slot {
            Some(held) if candidate.improves_on(&held) => {
                *slot = Some(candidate);
                Some(held)
            }
            _ => None,
        }
    }

    /// Unconditional replacement
    pub fn force(&mut self, candidate: PendingCandidate) -> Option<PendingCandidate> {
        self.slot_mut(candidate.direction).replace(candidate)
    }

    pub fn clear(&mut self, direction: Direction) -> Option<PendingCandidate> {
        self.slot_mut(direction).take()
    }

    /// Clear the `direction` candidate if it sits at or before `position`
    pub fn invalidate_through(
        &mut self,
        direction: Direction,
        position: usize,
    ) -> Option<PendingCandidate> {
        let slot = self.slot_mut(direction);
        if slot.is_some_and(|c| c.position <= position) {
            slot.take()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.up.is_none() && self.down.is_none()
    }
}
