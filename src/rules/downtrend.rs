//! Confirmed-downtrend-start (CDS) rules
//!
//! Evaluated only while a pending-downtrend candidate is live. Most rules inspect the
//! intervening bars (after the candidate, up to and including the previous bar): a
//! bar above the candidate's high means the top was not in, and a bar below the
//! candidate's low is the pullback that makes the top meaningful.

use super::{
    helpers::{any_low_below, no_high_above},
    ConfirmationRule, RuleContext, RuleId,
};
use crate::{OHLCVExt, OHLCV};

/// No intervening bar traded above the candidate's high
#[inline]
fn top_holds<T: OHLCV>(ctx: &RuleContext<'_, T>) -> bool {
    no_high_above(ctx.intervening(), ctx.candidate_bar().high())
}

/// Some intervening bar traded below the candidate's low
#[inline]
fn pulled_back<T: OHLCV>(ctx: &RuleContext<'_, T>) -> bool {
    any_low_below(ctx.intervening(), ctx.candidate_bar().low())
}

// ============================================================
// REVERSAL VS ANCHOR OPEN
// ============================================================

/// Reversal-shaped bar (lower low, higher high, higher close) whose low undercuts the
/// candidate's open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReversalVsAnchorOpenRule;

impl ConfirmationRule for ReversalVsAnchorOpenRule {
    fn id(&self) -> RuleId {
        RuleId::ReversalVsAnchorOpen
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let cur = ctx.current();
        let prev = ctx.previous();

        cur.is_outside(prev)
            && cur.close() > prev.close()
            && top_holds(ctx)
            && cur.low() < ctx.candidate_bar().open()
    }
}

// ============================================================
// PULLBACK THEN BREAK (A)
// ============================================================

/// After a pullback below the candidate's low, the current bar pushes a higher high
/// and higher close while itself trading below that low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullbackThenBreakARule;

impl ConfirmationRule for PullbackThenBreakARule {
    fn id(&self) -> RuleId {
        RuleId::PullbackThenBreakA
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let cur = ctx.current();
        let prev = ctx.previous();

        pulled_back(ctx)
            && top_holds(ctx)
            && cur.high() > prev.high()
            && cur.close() > prev.close()
            && cur.low() < ctx.candidate_bar().low()
    }
}

// ============================================================
// THRUST BREAK (B)
// ============================================================

/// After a pullback, a bar that holds the previous low and thrusts through the
/// candidate's high.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrustBreakBRule;

impl ConfirmationRule for ThrustBreakBRule {
    fn id(&self) -> RuleId {
        RuleId::ThrustBreakB
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let cur = ctx.current();
        let prev = ctx.previous();

        pulled_back(ctx)
            && top_holds(ctx)
            && cur.close() > prev.close()
            && cur.low() >= prev.low()
            && cur.high() > ctx.candidate_bar().high()
    }
}

// ============================================================
// FAILED RALLY (F)
// ============================================================

/// Previous bar broke the candidate's low; the current bar tries higher but closes
/// lower than the previous close and below its own open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailedRallyFRule;

impl ConfirmationRule for FailedRallyFRule {
    fn id(&self) -> RuleId {
        RuleId::FailedRallyF
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let cur = ctx.current();
        let prev = ctx.previous();

        top_holds(ctx)
            && prev.low() < ctx.candidate_bar().low()
            && cur.high() > prev.high()
            && cur.close() < prev.close()
            && cur.is_bearish()
    }
}

// ============================================================
// OUTSIDE BAR LOW BREAK (G)
// ============================================================

/// A plain higher-OHLC bar right after the previous bar broke the candidate's low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutsideBarLowBreakGRule;

impl ConfirmationRule for OutsideBarLowBreakGRule {
    fn id(&self) -> RuleId {
        RuleId::OutsideBarLowBreakG
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let prev = ctx.previous();

        ctx.current().is_higher_ohlc_than(prev)
            && top_holds(ctx)
            && prev.low() < ctx.candidate_bar().low()
    }
}

// ============================================================
// OUTSIDE BAR REVERSAL (H)
// ============================================================

/// The previous bar is the candidate itself and the current bar engulfs it, closing
/// above its close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutsideBarReversalHRule;

impl ConfirmationRule for OutsideBarReversalHRule {
    fn id(&self) -> RuleId {
        RuleId::OutsideBarReversalH
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        if !ctx.previous_is_candidate() {
            return false;
        }
        let cur = ctx.current();
        let anchor = ctx.candidate_bar();

        cur.is_outside(anchor) && cur.close() > anchor.close()
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rules::RuleTable, tracker::PendingCandidate, Bar, Direction};

    fn bar(index: u64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(index, index as i64, o, h, l, c, 1.0)
    }

    /// The candidate is always the first bar; the last bar is current.
    fn eval(bars: &[Bar]) -> Option<RuleId> {
        let cand = PendingCandidate::from_bar(Direction::Down, 0, &bars[0], bars[0].index);
        let ctx = RuleContext::new(bars, bars.len() - 1, &cand, None).unwrap();
        RuleTable::downtrend().first_match(&ctx)
    }

    fn anchor() -> Bar {
        // open 104, high 106, low 100, close 101
        bar(1, 104.0, 106.0, 100.0, 101.0)
    }

    #[test]
    fn test_reversal_vs_anchor_open() {
        let bars = [
            anchor(),
            bar(2, 103.0, 104.0, 102.0, 102.5),
            bar(3, 102.0, 105.0, 101.0, 104.5),
        ];
        assert_eq!(eval(&bars), Some(RuleId::ReversalVsAnchorOpen));
    }

    #[test]
    fn test_reversal_blocked_by_higher_high() {
        let bars = [
            anchor(),
            bar(2, 103.0, 107.0, 102.0, 102.5),
            bar(3, 102.0, 108.0, 101.0, 104.5),
        ];
        assert_eq!(eval(&bars), None);
    }

    #[test]
    fn test_pullback_then_break_a() {
        let bars = [
            anchor(),
            bar(2, 100.5, 101.0, 98.0, 98.5),
            bar(3, 98.5, 101.5, 98.5, 101.0),
        ];
        // low 98.5 is not below the previous low, so no reversal shape
        assert_eq!(eval(&bars), Some(RuleId::PullbackThenBreakA));
    }

    #[test]
    fn test_thrust_break_b() {
        let bars = [
            anchor(),
            bar(2, 100.5, 101.0, 98.0, 99.0),
            bar(3, 99.0, 103.0, 100.5, 102.0),
            bar(4, 102.0, 106.5, 101.0, 106.0),
        ];
        // bar 4 holds bar 3's low and clears the anchor high
        assert_eq!(eval(&bars), Some(RuleId::ThrustBreakB));
    }

    #[test]
    fn test_failed_rally_f() {
        let bars = [
            anchor(),
            bar(2, 100.5, 101.0, 99.0, 100.0),
            bar(3, 100.2, 101.5, 99.5, 99.8),
        ];
        assert_eq!(eval(&bars), Some(RuleId::FailedRallyF));
    }

    #[test]
    fn test_outside_bar_low_break_g() {
        let bars = [
            anchor(),
            bar(2, 100.5, 101.0, 99.0, 100.0),
            bar(3, 100.6, 101.2, 100.0, 100.1),
        ];
        assert_eq!(eval(&bars), Some(RuleId::OutsideBarLowBreakG));
    }

    #[test]
    fn test_outside_bar_reversal_h() {
        let bars = [anchor(), bar(2, 100.5, 107.0, 99.0, 102.0)];
        // an outside bar off the candidate also undercuts its open, so the
        // reversal rule earlier in the table wins
        assert_eq!(eval(&bars), Some(RuleId::ReversalVsAnchorOpen));

        let cand = PendingCandidate::from_bar(Direction::Down, 0, &bars[0], 1);
        let ctx = RuleContext::new(&bars, 1, &cand, None).unwrap();
        assert!(OutsideBarReversalHRule.matches(&ctx));

        let table = RuleTable::downtrend().without(&[RuleId::ReversalVsAnchorOpen]);
        assert_eq!(table.first_match(&ctx), Some(RuleId::OutsideBarReversalH));
    }

    #[test]
    fn test_outside_bar_reversal_h_needs_adjacent_candidate() {
        let bars = [
            anchor(),
            bar(2, 104.0, 106.0, 100.0, 101.0),
            bar(3, 100.5, 107.0, 99.0, 102.0),
        ];
        // bar 2 sits between the candidate and the outside bar
        let cand = PendingCandidate::from_bar(Direction::Down, 0, &bars[0], 1);
        let ctx = RuleContext::new(&bars, 2, &cand, None).unwrap();
        assert!(!OutsideBarReversalHRule.matches(&ctx));
    }

    #[test]
    fn test_quiet_bars_do_not_confirm() {
        let bars = [
            anchor(),
            bar(2, 103.0, 104.0, 101.0, 102.0),
            bar(3, 102.0, 103.0, 101.5, 101.8),
        ];
        assert_eq!(eval(&bars), None);
    }
}
