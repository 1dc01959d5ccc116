//! Confirmed-uptrend-start (CUS) rules
//!
//! Evaluated only while a pending-uptrend candidate is live. Each rule compares the
//! current bar with the previous one, and some also with the pending-downtrend
//! candidate on the other side.

use super::{ConfirmationRule, RuleContext, RuleId};
use crate::{OHLCVExt, OHLCV};

// ============================================================
// LOWER OHLC
// ============================================================

/// Current bar makes a lower low, lower high and lower close than the previous bar
/// without breaking the pending-downtrend low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowerOhlcRule;

impl ConfirmationRule for LowerOhlcRule {
    fn id(&self) -> RuleId {
        RuleId::LowerOhlc
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let cur = ctx.current();
        let prev = ctx.previous();

        if !(cur.low() < prev.low() && cur.high() < prev.high() && cur.close() < prev.close()) {
            return false;
        }

        // A break of the pending-downtrend low belongs to the down move.
        match ctx.opposite_bar() {
            Some(pending_down) => cur.low() >= pending_down.low(),
            None => true,
        }
    }
}

// ============================================================
// LOW UNDERCUT, HIGH RESPECT
// ============================================================

/// Current bar undercuts the pending-downtrend low, stays under its high, and closes
/// above the previous close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowUndercutHighRespectRule;

impl ConfirmationRule for LowUndercutHighRespectRule {
    fn id(&self) -> RuleId {
        RuleId::LowUndercutHighRespect
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let Some(pending_down) = ctx.opposite_bar() else {
            return false;
        };
        let cur = ctx.current();

        cur.low() < pending_down.low()
            && cur.high() <= pending_down.high()
            && cur.close() > ctx.previous().close()
    }
}

// ============================================================
// OUTSIDE BAR, DOWN CLOSE
// ============================================================

/// Outside bar that closes below its own open.
///
/// Besides confirming the uptrend, the engine forces this bar to become the new
/// pending-downtrend candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutsideBarDownCloseRule;

impl ConfirmationRule for OutsideBarDownCloseRule {
    fn id(&self) -> RuleId {
        RuleId::OutsideBarDownClose
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let cur = ctx.current();
        cur.is_outside(ctx.previous()) && cur.is_bearish()
    }
}

// ============================================================
// ENGULFING UP WITH DOWNTREND BREAK
// ============================================================

/// Bullish outside bar that closes above the previous close while breaking the
/// pending-downtrend low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngulfingUpWithDowntrendBreakRule;

impl ConfirmationRule for EngulfingUpWithDowntrendBreakRule {
    fn id(&self) -> RuleId {
        RuleId::EngulfingUpWithDowntrendBreak
    }

    fn matches<T: OHLCV>(&self, ctx: &RuleContext<'_, T>) -> bool {
        let Some(pending_down) = ctx.opposite_bar() else {
            return false;
        };
        let cur = ctx.current();
        let prev = ctx.previous();

        cur.is_outside(prev)
            && cur.close() > prev.close()
            && cur.is_bullish()
            && cur.low() < pending_down.low()
    }
}

// ============================================================
// TESTS
// ============================================================
