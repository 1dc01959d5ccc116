//! Containment tracking
//!
//! Containment starts when a bar trades strictly inside the range of a live pending
//! candidate (the downtrend candidate is preferred) and ends on the first bar that
//! trades outside that range.

use crate::{tracker::CandidateTracker, Direction, OHLCVExt, OHLCV};

/// Which pending candidate supplied the reference range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Pending-downtrend candidate (a pending high)
    PendingHigh,
    /// Pending-uptrend candidate (a pending low)
    PendingLow,
}

impl From<Direction> for ReferenceType {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => ReferenceType::PendingLow,
            Direction::Down => ReferenceType::PendingHigh,
        }
    }
}

/// Side(s) of the reference range a bar traded through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakout {
    Up,
    Down,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContainmentContext {
    pub reference_bar_index: u64,
    pub reference_position: usize,
    pub reference_type: ReferenceType,
    pub reference_high: f64,
    pub reference_low: f64,
    /// Bars processed inside the range, the entry bar included
    pub bars_inside: u32,
}

impl ContainmentContext {
    pub fn new<T: OHLCV + ?Sized>(
        reference_type: ReferenceType,
        reference_position: usize,
        reference_bar_index: u64,
        bar: &T,
    ) -> Self {
        Self {
            reference_bar_index,
            reference_position,
            reference_type,
            reference_high: bar.high(),
            reference_low: bar.low(),
            bars_inside: 0,
        }
    }

    #[inline]
    pub fn contains<T: OHLCV + ?Sized>(&self, bar: &T) -> bool {
        bar.is_strictly_inside(self.reference_low, self.reference_high)
    }

    /// Which side(s) `bar` broke, if any
    pub fn breakout<T: OHLCV + ?Sized>(&self, bar: &T) -> Option<Breakout> {
        let up = bar.high() > self.reference_high;
        let down = bar.low() < self.reference_low;
        match (up, down) {
            (true, true) => Some(Breakout::Both),
            (true, false) => Some(Breakout::Up),
            (false, true) => Some(Breakout::Down),
            (false, false) => None,
        }
    }
}

/// Range reference for the current bar: the downtrend candidate if live, else the
/// uptrend candidate.
pub fn select_reference<T: OHLCV>(
    tracker: &CandidateTracker,
    bars: &[T],
) -> Option<ContainmentContext> {
    let candidate = tracker
        .current(Direction::Down)
        .or_else(|| tracker.current(Direction::Up))?;
    let bar = bars.get(candidate.position)?;
    Some(ContainmentContext::new(
        candidate.direction.into(),
        candidate.position,
        candidate.bar_index,
        bar,
    ))
}

// ============================================================
// PHASE
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "phase", content = "context", rename_all = "snake_case")]
pub enum ContainmentPhase {
    #[default]
    Inactive,
    Active(ContainmentContext),
}

/// What one bar did to the containment phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContainmentTransition {
    /// Still inactive
    Idle,
    Entered(ContainmentContext),
    /// Still inside; carries the updated context
    Inside(ContainmentContext),
    Exited {
        context: ContainmentContext,
        breakout: Breakout,
    },
}

impl ContainmentPhase {
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, ContainmentPhase::Active(_))
    }

    pub fn context(&self) -> Option<&ContainmentContext> {
        match self {
            ContainmentPhase::Active(ctx) => Some(ctx),
            ContainmentPhase::Inactive => None,
        }
    }

    /// Feed the bar at `position`. `reference` is only consulted while inactive and
    /// must sit strictly before `position`.
    pub fn advance<T: OHLCV + ?Sized>(
        &mut self,
        bar: &T,
        position: usize,
        reference: Option<ContainmentContext>,
    ) -> ContainmentTransition {
        match self {
            ContainmentPhase::Active(ctx) => match ctx.breakout(bar) {
                Some(breakout) => {
                    let context = *ctx;
                    *self = ContainmentPhase::Inactive;
                    ContainmentTransition::Exited { context, breakout }
                }
                None => {
                    ctx.bars_inside += 1;
                    ContainmentTransition::Inside(*ctx)
                }
            },
            ContainmentPhase::Inactive => match reference {
                Some(mut ctx) if ctx.reference_position < position && ctx.contains(bar) => {
                    ctx.bars_inside = 1;
                    *self = ContainmentPhase::Active(ctx);
                    ContainmentTransition::Entered(ctx)
                }
                _ => ContainmentTransition::Idle,
            },
        }
    }
}
