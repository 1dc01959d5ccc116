//! Candidate formation rules
//!
//! A formation rule compares the current bar with the previous one and, when it
//! holds, nominates the *previous* bar as a pending candidate. Rules are checked in
//! [`FormationRule::ORDER`] and the first that holds is reported.

use crate::{Direction, OHLCVExt, OHLCV};

/// Why a bar was nominated as a pending candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormationRule {
    /// Current bar continues away from the previous one on all four prices
    DirectionalContinuation,
    /// Current bar respects the previous extreme and closes through its open
    RejectionClose,
    /// Current bar does not exceed the previous extreme
    NonExceedance,
}

impl FormationRule {
    pub const ORDER: [FormationRule; 3] = [
        FormationRule::DirectionalContinuation,
        FormationRule::RejectionClose,
        FormationRule::NonExceedance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormationRule::DirectionalContinuation => "directional-continuation",
            FormationRule::RejectionClose => "rejection-close",
            FormationRule::NonExceedance => "non-exceedance",
        }
    }

    /// Does this rule nominate `prev` as a `direction` candidate, given `cur`?
    pub fn holds<T: OHLCV + ?Sized>(self, direction: Direction, prev: &T, cur: &T) -> bool {
        match (self, direction) {
            (FormationRule::DirectionalContinuation, Direction::Up) => {
                cur.is_higher_ohlc_than(prev)
            }
            (FormationRule::DirectionalContinuation, Direction::Down) => {
                cur.is_lower_ohlc_than(prev)
            }
            (FormationRule::RejectionClose, Direction::Up) => {
                cur.low() >= prev.low() && cur.close() > prev.open()
            }
            (FormationRule::RejectionClose, Direction::Down) => {
                cur.high() <= prev.high() && cur.close() < prev.open()
            }
            (FormationRule::NonExceedance, Direction::Up) => cur.low() >= prev.low(),
            (FormationRule::NonExceedance, Direction::Down) => cur.high() <= prev.high(),
        }
    }
}

impl std::fmt::Display for FormationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First formation rule that nominates `prev` for `direction`
#[inline]
pub fn formation_match<T: OHLCV + ?Sized>(
    direction: Direction,
    prev: &T,
    cur: &T,
) -> Option<FormationRule> {
    FormationRule::ORDER
        .into_iter()
        .find(|rule| rule.holds(direction, prev, cur))
}
