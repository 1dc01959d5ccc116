//! Pattern rule library
//!
//! Two ordered confirmation tables (CUS for pending uptrends, CDS for pending
//! downtrends) plus the formation rules that create pending candidates.
//!
//! # Rule Tables
//!
//! - **Uptrend (4)**: lower-ohlc, low-undercut-high-respect, outside-bar-down-close,
//!   engulfing-up-downtrend-break
//! - **Downtrend (6)**: reversal-vs-anchor-open, pullback-then-break-a, thrust-break-b,
//!   failed-rally-f, outside-bar-low-break-g, outside-bar-reversal-h
//!
//! Tables are evaluated first-match: the first rule whose predicate holds wins.

pub mod helpers;

pub mod downtrend;
pub mod formation;
pub mod uptrend;

pub use downtrend::*;
pub use formation::{formation_match, FormationRule};
pub use uptrend::*;

use crate::{tracker::PendingCandidate, Direction, OHLCV};

// ============================================================
// RULE IDS
// ============================================================

/// Stable identifier of the predicate that produced a confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RuleId {
    #[serde(rename = "lower-ohlc")]
    LowerOhlc,
    #[serde(rename = "low-undercut-high-respect")]
    LowUndercutHighRespect,
    #[serde(rename = "outside-bar-down-close")]
    OutsideBarDownClose,
    #[serde(rename = "engulfing-up-downtrend-break")]
    EngulfingUpWithDowntrendBreak,
    #[serde(rename = "reversal-vs-anchor-open")]
    ReversalVsAnchorOpen,
    #[serde(rename = "pullback-then-break-a")]
    PullbackThenBreakA,
    #[serde(rename = "thrust-break-b")]
    ThrustBreakB,
    #[serde(rename = "failed-rally-f")]
    FailedRallyF,
    #[serde(rename = "outside-bar-low-break-g")]
    OutsideBarLowBreakG,
    #[serde(rename = "outside-bar-reversal-h")]
    OutsideBarReversalH,
    #[serde(rename = "forced-alternation")]
    ForcedAlternation,
}

impl RuleId {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleId::LowerOhlc => "lower-ohlc",
            RuleId::LowUndercutHighRespect => "low-undercut-high-respect",
            RuleId::OutsideBarDownClose => "outside-bar-down-close",
            RuleId::EngulfingUpWithDowntrendBreak => "engulfing-up-downtrend-break",
            RuleId::ReversalVsAnchorOpen => "reversal-vs-anchor-open",
            RuleId::PullbackThenBreakA => "pullback-then-break-a",
            RuleId::ThrustBreakB => "thrust-break-b",
            RuleId::FailedRallyF => "failed-rally-f",
            RuleId::OutsideBarLowBreakG => "outside-bar-low-break-g",
            RuleId::OutsideBarReversalH => "outside-bar-reversal-h",
            RuleId::ForcedAlternation => "forced-alternation",
        }
    }

    /// Direction this rule confirms. `None` for forced alternation, which can go
    /// either way.
    pub fn side(self) -> Option<Direction> {
        match self {
            RuleId::LowerOhlc
            | RuleId::LowUndercutHighRespect
            | RuleId::OutsideBarDownClose
            | RuleId::EngulfingUpWithDowntrendBreak => Some(Direction::Up),
            RuleId::ReversalVsAnchorOpen
            | RuleId::PullbackThenBreakA
            | RuleId::ThrustBreakB
            | RuleId::FailedRallyF
            | RuleId::OutsideBarLowBreakG
            | RuleId::OutsideBarReversalH => Some(Direction::Down),
            RuleId::ForcedAlternation => None,
        }
    }

    #[inline]
    pub fn is_forced(self) -> bool {
        matches!(self, RuleId::ForcedAlternation)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// RULE CONTEXT
// ============================================================

/// Everything a confirmation predicate may look at: the bar slice, the current
/// position and the pending candidate under test.
///
/// Positions are slice positions, not bar indices. Construction checks every
/// position, so the accessors index without bounds failures.
pub struct RuleContext<'a, T> {
    bars: &'a [T],
    current: usize,
    candidate: &'a PendingCandidate,
    opposite: Option<&'a PendingCandidate>,
}

impl<'a, T: OHLCV> RuleContext<'a, T> {
    /// Returns `None` when `current` has no predecessor, lies outside `bars`, or does
    /// not come after the candidate.
    pub fn new(
        bars: &'a [T],
        current: usize,
        candidate: &'a PendingCandidate,
        opposite: Option<&'a PendingCandidate>,
    ) -> Option<Self> {
        if current == 0 || current >= bars.len() || candidate.position >= current {
            return None;
        }
        if opposite.is_some_and(|o| o.position >= bars.len()) {
            return None;
        }
        Some(Self {
            bars,
            current,
            candidate,
            opposite,
        })
    }

    #[inline]
    pub fn current(&self) -> &'a T {
        &self.bars[self.current]
    }

    #[inline]
    pub fn previous(&self) -> &'a T {
        &self.bars[self.current - 1]
    }

    #[inline]
    pub fn candidate(&self) -> &'a PendingCandidate {
        self.candidate
    }

    #[inline]
    pub fn candidate_bar(&self) -> &'a T {
        &self.bars[self.candidate.position]
    }

    /// Bar of the opposite-side pending candidate, if one is live
    #[inline]
    pub fn opposite_bar(&self) -> Option<&'a T> {
        self.opposite.map(|o| &self.bars[o.position])
    }

    #[inline]
    pub fn previous_is_candidate(&self) -> bool {
        self.candidate.position + 1 == self.current
    }

    /// Bars after the candidate up to and including the previous bar
    #[inline]
    pub fn intervening(&self) -> &'a [T] {
        &self.bars[self.candidate.position + 1..self.current]
    }
}

// ============================================================
// CONFIRMATION RULE TRAIT
// ============================================================

/// A named, pure predicate that confirms a pending candidate
pub trait ConfirmationRule: Send + Sync {
    fn id(&self) -> RuleId;
    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool;
}

// ============================================================
// BUILTIN RULES - generated via macro
// ============================================================

/// Macro to generate the BuiltinRule enum without boilerplate
macro_rules! define_builtin_rules {
    (
        $(
            $variant:ident($rule:ty)
        ),* $(,)?
    ) => {
        /// All builtin confirmation rules - enum dispatch, no vtable
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum BuiltinRule {
            $($variant($rule)),*
        }

        impl BuiltinRule {
            #[inline]
            pub fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
                match self {
                    $(Self::$variant(r) => ConfirmationRule::matches(r, ctx)),*
                }
            }

            #[inline]
            pub fn id(&self) -> RuleId {
                match self {
                    $(Self::$variant(r) => ConfirmationRule::id(r)),*
                }
            }
        }
    };
}

define_builtin_rules! {
    // Uptrend (4)
    LowerOhlc(LowerOhlcRule),
    LowUndercutHighRespect(LowUndercutHighRespectRule),
    OutsideBarDownClose(OutsideBarDownCloseRule),
    EngulfingUpWithDowntrendBreak(EngulfingUpWithDowntrendBreakRule),

    // Downtrend (6)
    ReversalVsAnchorOpen(ReversalVsAnchorOpenRule),
    PullbackThenBreakA(PullbackThenBreakARule),
    ThrustBreakB(ThrustBreakBRule),
    FailedRallyF(FailedRallyFRule),
    OutsideBarLowBreakG(OutsideBarLowBreakGRule),
    OutsideBarReversalH(OutsideBarReversalHRule),
}

// ============================================================
// RULE TABLES
// ============================================================

/// Ordered, first-match rule table for one side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    side: Direction,
    rules: Vec<BuiltinRule>,
}

impl RuleTable {
    /// CUS table in priority order
    pub fn uptrend() -> Self {
        Self {
            side: Direction::Up,
            rules: vec![
                BuiltinRule::LowerOhlc(LowerOhlcRule),
                BuiltinRule::LowUndercutHighRespect(LowUndercutHighRespectRule),
                BuiltinRule::OutsideBarDownClose(OutsideBarDownCloseRule),
                BuiltinRule::EngulfingUpWithDowntrendBreak(EngulfingUpWithDowntrendBreakRule),
            ],
        }
    }

    /// CDS table in priority order
    pub fn downtrend() -> Self {
        Self {
            side: Direction::Down,
            rules: vec![
                BuiltinRule::ReversalVsAnchorOpen(ReversalVsAnchorOpenRule),
                BuiltinRule::PullbackThenBreakA(PullbackThenBreakARule),
                BuiltinRule::ThrustBreakB(ThrustBreakBRule),
                BuiltinRule::FailedRallyF(FailedRallyFRule),
                BuiltinRule::OutsideBarLowBreakG(OutsideBarLowBreakGRule),
                BuiltinRule::OutsideBarReversalH(OutsideBarReversalHRule),
            ],
        }
    }

    /// Table for `side` in priority order
    pub fn for_side(side: Direction) -> Self {
        match side {
            Direction::Up => Self::uptrend(),
            Direction::Down => Self::downtrend(),
        }
    }

    /// Drop the listed rules, keeping the order of the rest
    pub fn without(mut self, ids: &[RuleId]) -> Self {
        self.rules.retain(|r| !ids.contains(&r.id()));
        self
    }

    #[inline]
    pub fn side(&self) -> Direction {
        self.side
    }

    pub fn ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules.iter().map(BuiltinRule::id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Id of the first rule that holds for `ctx`
    #[inline]
    pub fn first_match<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> Option<RuleId> {
        first_true(&self.rules, |rule| rule.matches(ctx)).map(BuiltinRule::id)
    }
}

/// First item of an ordered table whose predicate holds
#[inline]
pub fn first_true<'r, R, F>(table: &'r [R], mut predicate: F) -> Option<&'r R>
where
    F: FnMut(&R) -> bool,
{
    table.iter().find(|item| predicate(item))
}

// ============================================================
// TESTS
// ============================================================
