//! Diagnostics records emitted while the engine runs
//!
//! Records describe candidate bookkeeping, shadowed rule matches, containment
//! transitions and alternation problems. They never influence the result; a run
//! with [`NullSink`] produces the same events as one with any other sink.

use tracing::{debug, trace, warn};

use crate::{
    alternation::AlternationViolation,
    containment::{Breakout, ContainmentContext},
    event::ConfirmedEvent,
    rules::{FormationRule, RuleId},
    tracker::FormOutcome,
    Direction,
};

/// Why a pending candidate left the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    /// Its own side was confirmed
    Confirmed,
    /// An opposite confirmation anchored at or after it
    Stale,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceRecord {
    Formation {
        direction: Direction,
        bar_index: u64,
        rule: FormationRule,
        outcome: FormOutcome,
    },
    CandidateForced {
        direction: Direction,
        bar_index: u64,
        replaced: Option<u64>,
    },
    CandidateCleared {
        direction: Direction,
        bar_index: u64,
        reason: ClearReason,
    },
    /// A downtrend rule matched on a bar where an uptrend confirmation took priority
    RuleShadowed { rule: RuleId, bar_index: u64 },
    Confirmed { event: ConfirmedEvent },
    AlternationUnresolved { violation: AlternationViolation },
    ContainmentEntered {
        context: ContainmentContext,
        bar_index: u64,
    },
    ContainmentExited {
        context: ContainmentContext,
        breakout: Breakout,
        bar_index: u64,
    },
    InsufficientData { got: usize },
}

/// Receives trace records from the engine
pub trait DiagnosticsSink {
    fn record(&mut self, record: TraceRecord);
}

/// Drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    #[inline]
    fn record(&mut self, _record: TraceRecord) {}
}

/// Forwards records to `tracing`. Installing a subscriber is up to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&mut self, record: TraceRecord) {
        match record {
            TraceRecord::Formation {
                direction,
                bar_index,
                rule,
                outcome,
            } => match outcome {
                FormOutcome::Formed => {
                    trace!(%direction, bar_index, %rule, "candidate formed")
                }
                FormOutcome::Superseded(old) => trace!(
                    %direction,
                    bar_index,
                    %rule,
                    replaced = old.bar_index,
                    "candidate superseded"
                ),
                FormOutcome::Retained(held) => trace!(
                    %direction,
                    bar_index,
                    held = held.bar_index,
                    "candidate retained"
                ),
            },
            TraceRecord::CandidateForced {
                direction,
                bar_index,
                replaced,
            } => trace!(%direction, bar_index, ?replaced, "candidate forced"),
            TraceRecord::CandidateCleared {
                direction,
                bar_index,
                reason,
            } => trace!(%direction, bar_index, ?reason, "candidate cleared"),
            TraceRecord::RuleShadowed { rule, bar_index } => {
                debug!(%rule, bar_index, "downtrend rule shadowed by uptrend confirmation")
            }
            TraceRecord::Confirmed { event } => debug!(
                direction = %event.direction,
                anchor = event.anchored_bar_index,
                trigger = event.triggering_bar_index,
                rule = %event.rule_id,
                "trend start confirmed"
            ),
            TraceRecord::AlternationUnresolved { violation } => warn!(
                direction = %violation.direction,
                previous = violation.previous_anchor_index,
                anchor = violation.anchor_index,
                "no bar between same-direction anchors, alternation not restored"
            ),
            TraceRecord::ContainmentEntered { context, bar_index } => debug!(
                bar_index,
                reference = context.reference_bar_index,
                reference_type = ?context.reference_type,
                "containment entered"
            ),
            TraceRecord::ContainmentExited {
                context,
                breakout,
                bar_index,
            } => debug!(
                bar_index,
                reference = context.reference_bar_index,
                bars_inside = context.bars_inside,
                ?breakout,
                "containment exited"
            ),
            TraceRecord::InsufficientData { got } => {
                debug!(got, "fewer than two bars, nothing to detect")
            }
        }
    }
}

impl DiagnosticsSink for Vec<TraceRecord> {
    fn record(&mut self, record: TraceRecord) {
        self.push(record);
    }
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut S {
    fn record(&mut self, record: TraceRecord) {
        (**self).record(record);
    }
}
