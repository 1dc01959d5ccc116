//! # trendstart - trend-start detection over OHLC bar series
//!
//! Streams a chronologically ordered bar series through a small state machine that
//! tracks pending reversal candidates, confirms them with an ordered rule library and
//! keeps confirmed uptrend/downtrend starts strictly alternating.
//!
//! ## Quick Start
//!
//! ```rust
//! use trendstart::prelude::*;
//!
//! let bars = vec![
//!     Bar::new(1, 1_000, 100.0, 101.0, 99.0, 100.5, 10.0),
//!     Bar::new(2, 2_000, 100.6, 102.0, 99.5, 101.8, 10.0),
//!     Bar::new(3, 3_000, 101.0, 101.5, 98.0, 98.5, 10.0),
//! ];
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let scan = engine.run(&bars).unwrap();
//!
//! assert_eq!(scan.events.len(), 1);
//! assert_eq!(scan.events[0].direction, Direction::Up);
//! assert_eq!(scan.events[0].anchored_bar_index, 1);
//! ```

pub mod alternation;
pub mod config;
pub mod containment;
pub mod diagnostics;
pub mod engine;
pub mod event;
pub mod rules;
pub mod tracker;

pub mod prelude {
    pub use crate::{
        // Alternation
        alternation::{AlternationViolation, Enforcement, LastConfirmed},
        // Configuration
        config::EngineConfig,
        // Containment
        containment::{Breakout, ContainmentContext, ContainmentPhase, ReferenceType},
        // Diagnostics
        diagnostics::{ClearReason, DiagnosticsSink, NullSink, TraceRecord, TracingSink},
        // Engine
        engine::{Anomaly, Engine, EngineBuilder, EngineState, TrendDetector, TrendScan},
        // Events
        event::{ConfirmedEvent, SeriesTag, SignalKey, TaggedEvent},
        // Rules
        rules::{BuiltinRule, ConfirmationRule, FormationRule, RuleContext, RuleId, RuleTable},
        // Parallel
        scan_parallel,
        // Tracking
        tracker::{CandidateTracker, FormOutcome, PendingCandidate},
        // Core types
        Bar,
        Direction,
        OHLCVExt,
        Result,
        SeriesError,
        SeriesScan,
        TrendError,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, TrendError>;

/// Errors that abort a detection run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrendError {
    #[error("Non-monotonic bar index at position {position}: {index} does not follow {previous}")]
    NonMonotonicSequence {
        position: usize,
        previous: u64,
        index: u64,
    },

    #[error(
        "Non-monotonic timestamp at position {position}: {timestamp} is earlier than {previous}"
    )]
    NonMonotonicTimestamp {
        position: usize,
        previous: i64,
        timestamp: i64,
    },

    #[error("Sequence rewound: {processed} bars already processed, {supplied} supplied")]
    SequenceRewound { processed: usize, supplied: usize },

    #[error("Sequence mismatch: expected bar {expected} at the processed boundary, found {found}")]
    SequenceMismatch { expected: u64, found: u64 },

    #[error("Invalid bar {index}: {reason}")]
    InvalidBar { index: u64, reason: &'static str },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

// ============================================================
// DIRECTION
// ============================================================

/// Direction of a trend start
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }

    fn timestamp(&self) -> Option<i64> {
        (**self).timestamp()
    }
}

/// Extension trait with bar-to-bar comparisons used by the rule library
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Open, high, low and close all strictly above `other`'s
    #[inline]
    fn is_higher_ohlc_than<O: OHLCV + ?Sized>(&self, other: &O) -> bool {
        self.open() > other.open()
            && self.high() > other.high()
            && self.low() > other.low()
            && self.close() > other.close()
    }

    /// Open, high, low and close all strictly below `other`'s
    #[inline]
    fn is_lower_ohlc_than<O: OHLCV + ?Sized>(&self, other: &O) -> bool {
        self.open() < other.open()
            && self.high() < other.high()
            && self.low() < other.low()
            && self.close() < other.close()
    }

    /// Higher high and lower low than `other` (outside bar)
    #[inline]
    fn is_outside<O: OHLCV + ?Sized>(&self, other: &O) -> bool {
        self.high() > other.high() && self.low() < other.low()
    }

    /// Range lies strictly inside `[low, high]`
    #[inline]
    fn is_strictly_inside(&self, low: f64, high: f64) -> bool {
        self.high() < high && self.low() > low
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(TrendError::InvalidBar {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(TrendError::InvalidBar {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if self.high() < self.low() {
            return Err(TrendError::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

// ============================================================
// BAR
// ============================================================

/// One OHLCV sample with its position in the series.
///
/// `index` is 1-based and strictly increasing; gaps are allowed. `timestamp` is in
/// epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub index: u64,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        index: u64,
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            index,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use engine::{Engine, TrendScan};
use rayon::prelude::*;

/// Result of scanning a single series (one contract/timeframe pair)
#[derive(Debug)]
pub struct SeriesScan {
    pub series: String,
    pub scan: TrendScan,
}

/// Error from scanning a single series
#[derive(Debug)]
pub struct SeriesError {
    pub series: String,
    pub error: TrendError,
}

/// Run the engine over many independent series in parallel.
///
/// Every series gets its own fresh `EngineState`; the engine itself is shared.
pub fn scan_parallel<'a, I>(engine: &Engine, series: I) -> (Vec<SeriesScan>, Vec<SeriesError>)
where
    I: IntoParallelIterator<Item = (&'a str, &'a [Bar])>,
{
    let results: Vec<_> = series
        .into_par_iter()
        .map(|(name, bars)| {
            engine
                .run(bars)
                .map(|scan| SeriesScan {
                    series: name.to_string(),
                    scan,
                })
                .map_err(|error| SeriesError {
                    series: name.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
