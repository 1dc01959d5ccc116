//! Strict up/down alternation
//!
//! Two consecutive confirmations in the same direction get a synthetic opposite
//! event inserted between them, anchored at the most extreme bar of the gap.

use std::ops::Range;

use crate::{
    event::ConfirmedEvent,
    rules::{
        helpers::{highest_high, lowest_low},
        RuleId,
    },
    Bar, Direction, OHLCV,
};

/// The last event the engine emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LastConfirmed {
    pub direction: Direction,
    /// Slice position of the anchored bar
    pub position: usize,
    pub bar_index: u64,
}

impl LastConfirmed {
    pub fn of(event: &ConfirmedEvent, position: usize) -> Self {
        Self {
            direction: event.direction,
            position,
            bar_index: event.anchored_bar_index,
        }
    }
}

/// Two same-direction events with no bar between their anchors
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AlternationViolation {
    pub direction: Direction,
    pub previous_anchor_index: u64,
    pub anchor_index: u64,
    pub triggering_bar_index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Enforcement {
    /// Direction differs from the previous event (or there is none)
    Alternates,
    /// Emit `event` (anchored at slice `position`) before the new one
    Forced { event: ConfirmedEvent, position: usize },
    Unresolved(AlternationViolation),
}

/// Position of the most extreme bar for an `inserted` event within `range`:
/// lowest low for a downtrend, highest high for an uptrend. Earliest wins ties.
pub fn extreme_position<T: OHLCV>(
    bars: &[T],
    range: Range<usize>,
    inserted: Direction,
) -> Option<usize> {
    let start = range.start;
    let window = bars.get(range)?;
    let offset = match inserted {
        Direction::Down => lowest_low(window),
        Direction::Up => highest_high(window),
    }?;
    Some(start + offset)
}

/// Decide whether `event`, anchored at `anchor_position`, needs a forced opposite
/// event after `previous`.
pub fn enforce(
    bars: &[Bar],
    previous: Option<&LastConfirmed>,
    event: &ConfirmedEvent,
    anchor_position: usize,
) -> Enforcement {
    let Some(previous) = previous else {
        return Enforcement::Alternates;
    };
    if previous.direction != event.direction {
        return Enforcement::Alternates;
    }

    let inserted = event.direction.opposite();
    let found = if previous.position + 1 < anchor_position {
        extreme_position(bars, previous.position + 1..anchor_position, inserted)
    } else {
        None
    };

    match found.and_then(|p| bars.get(p).map(|b| (p, b))) {
        Some((position, bar)) => Enforcement::Forced {
            event: ConfirmedEvent::from_bar(
                inserted,
                bar,
                event.triggering_bar_index,
                RuleId::ForcedAlternation,
            ),
            position,
        },
        None => Enforcement::Unresolved(AlternationViolation {
            direction: event.direction,
            previous_anchor_index: previous.bar_index,
            anchor_index: event.anchored_bar_index,
            triggering_bar_index: event.triggering_bar_index,
        }),
    }
}
