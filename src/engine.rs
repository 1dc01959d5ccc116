//! Trend-start engine
//!
//! [`Engine`] is immutable once built; all per-series memory lives in an
//! [`EngineState`], so one engine can drive any number of series. Each bar runs the
//! same fixed sequence:
//!
//! 1. containment update
//! 2. downtrend then uptrend rule evaluation; an uptrend confirmation takes
//!    priority and a shadowed downtrend match is only reported
//! 3. alternation enforcement for the confirmed event
//! 4. candidate clearing, invalidation and re-arming
//! 5. candidate formation on the previous bar

use crate::{
    alternation::{enforce, AlternationViolation, Enforcement, LastConfirmed},
    config::EngineConfig,
    containment::{select_reference, ContainmentPhase, ContainmentTransition},
    diagnostics::{ClearReason, DiagnosticsSink, TraceRecord, TracingSink},
    event::{normalize, ConfirmedEvent},
    rules::{formation_match, RuleContext, RuleId, RuleTable},
    tracker::{CandidateTracker, PendingCandidate},
    Bar, Direction, OHLCVExt, Result, TrendError,
};

// ============================================================
// STATE & OUTPUT
// ============================================================

/// Per-series memory carried between calls to [`Engine::advance`]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineState {
    candidates: CandidateTracker,
    containment: ContainmentPhase,
    last_confirmed: Option<LastConfirmed>,
    processed: usize,
    last_index: Option<u64>,
    last_timestamp: Option<i64>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates(&self) -> &CandidateTracker {
        &self.candidates
    }

    pub fn containment(&self) -> &ContainmentPhase {
        &self.containment
    }

    pub fn last_confirmed(&self) -> Option<&LastConfirmed> {
        self.last_confirmed.as_ref()
    }

    /// Number of bars of the series already consumed
    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn last_index(&self) -> Option<u64> {
        self.last_index
    }
}

/// Something worth knowing about a run that did not stop it
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    InsufficientData { got: usize },
    UnresolvedAlternation { violation: AlternationViolation },
}

/// Output of one run or one incremental advance
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendScan {
    /// Sorted by `(anchored_bar_index, direction)`, no duplicate keys
    pub events: Vec<ConfirmedEvent>,
    pub anomalies: Vec<Anomaly>,
    /// Containment phase after the last processed bar
    pub containment: ContainmentPhase,
}

/// Collects what a single `advance` call produces
struct Output {
    events: Vec<ConfirmedEvent>,
    anomalies: Vec<Anomaly>,
}

// ============================================================
// ENGINE
// ============================================================

#[derive(Debug, Clone)]
pub struct Engine {
    uptrend: RuleTable,
    downtrend: RuleTable,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            uptrend: RuleTable::uptrend(),
            downtrend: RuleTable::downtrend(),
            config: EngineConfig::default(),
        }
    }
}

impl Engine {
    /// Build an engine from a config, validating it first
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let table = |side| RuleTable::for_side(side).without(&config.disabled_rules);
        Ok(Self {
            uptrend: table(Direction::Up),
            downtrend: table(Direction::Down),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self, side: Direction) -> &RuleTable {
        match side {
            Direction::Up => &self.uptrend,
            Direction::Down => &self.downtrend,
        }
    }

    /// Run a whole series from a fresh state. Diagnostics go to `tracing`.
    pub fn run(&self, bars: &[Bar]) -> Result<TrendScan> {
        self.run_with_sink(bars, &mut TracingSink)
    }

    pub fn run_with_sink<S: DiagnosticsSink + ?Sized>(
        &self,
        bars: &[Bar],
        sink: &mut S,
    ) -> Result<TrendScan> {
        let mut state = EngineState::new();
        self.advance(&mut state, bars, sink)
    }

    /// Process `bars[state.processed()..]`.
    ///
    /// `bars` must be the same series the state has seen so far, extended at the
    /// end. On error the state is left untouched.
    pub fn advance<S: DiagnosticsSink + ?Sized>(
        &self,
        state: &mut EngineState,
        bars: &[Bar],
        sink: &mut S,
    ) -> Result<TrendScan> {
        self.check_continuation(state, bars)?;
        self.validate_bars(state, bars)?;

        let mut out = Output {
            events: Vec::new(),
            anomalies: Vec::new(),
        };

        if bars.len() < 2 {
            sink.record(TraceRecord::InsufficientData { got: bars.len() });
            out.anomalies.push(Anomaly::InsufficientData { got: bars.len() });
        } else {
            for position in state.processed.max(1)..bars.len() {
                self.step(state, bars, position, &mut out, sink);
            }
        }

        if let Some(last) = bars.last() {
            state.last_index = Some(last.index);
            state.last_timestamp = Some(last.timestamp);
        }
        state.processed = bars.len();

        normalize(&mut out.events);
        Ok(TrendScan {
            events: out.events,
            anomalies: out.anomalies,
            containment: state.containment,
        })
    }

    // ===========================================
    // Input checks
    // ===========================================

    fn check_continuation(&self, state: &EngineState, bars: &[Bar]) -> Result<()> {
        if bars.len() < state.processed {
            return Err(TrendError::SequenceRewound {
                processed: state.processed,
                supplied: bars.len(),
            });
        }
        if state.processed > 0 {
            let boundary = bars[state.processed - 1].index;
            if state.last_index != Some(boundary) {
                return Err(TrendError::SequenceMismatch {
                    expected: state.last_index.unwrap_or_default(),
                    found: boundary,
                });
            }
        }
        Ok(())
    }

    /// Validate only the bars not yet processed
    fn validate_bars(&self, state: &EngineState, bars: &[Bar]) -> Result<()> {
        let mut previous = state.last_index.zip(state.last_timestamp);

        for (position, bar) in bars.iter().enumerate().skip(state.processed) {
            if self.config.validate_data {
                bar.validate().map_err(|e| match e {
                    TrendError::InvalidBar { reason, .. } => TrendError::InvalidBar {
                        index: bar.index,
                        reason,
                    },
                    other => other,
                })?;
            }

            if let Some((index, timestamp)) = previous {
                if bar.index <= index {
                    return Err(TrendError::NonMonotonicSequence {
                        position,
                        previous: index,
                        index: bar.index,
                    });
                }
                if bar.timestamp < timestamp {
                    return Err(TrendError::NonMonotonicTimestamp {
                        position,
                        previous: timestamp,
                        timestamp: bar.timestamp,
                    });
                }
            }
            previous = Some((bar.index, bar.timestamp));
        }
        Ok(())
    }

    // ===========================================
    // Per-bar processing
    // ===========================================

    fn step<S: DiagnosticsSink + ?Sized>(
        &self,
        state: &mut EngineState,
        bars: &[Bar],
        position: usize,
        out: &mut Output,
        sink: &mut S,
    ) {
        let cur = &bars[position];

        // 1. containment
        if self.config.track_containment {
            let reference = select_reference(&state.candidates, bars);
            match state.containment.advance(cur, position, reference) {
                ContainmentTransition::Entered(context) => {
                    sink.record(TraceRecord::ContainmentEntered {
                        context,
                        bar_index: cur.index,
                    })
                }
                ContainmentTransition::Exited { context, breakout } => {
                    sink.record(TraceRecord::ContainmentExited {
                        context,
                        breakout,
                        bar_index: cur.index,
                    })
                }
                ContainmentTransition::Idle | ContainmentTransition::Inside(_) => {}
            }
        }
        let contained = state.containment.is_active();

        // 2. rule evaluation
        let up = state.candidates.current(Direction::Up).copied();
        let down = state.candidates.current(Direction::Down).copied();

        let cds = down
            .as_ref()
            .and_then(|c| RuleContext::new(bars, position, c, up.as_ref()))
            .and_then(|ctx| self.downtrend.first_match(&ctx));
        let cus = up
            .as_ref()
            .and_then(|c| RuleContext::new(bars, position, c, down.as_ref()))
            .and_then(|ctx| self.uptrend.first_match(&ctx));

        // 3-4. confirmation
        let mut rearmed = false;
        match (cus, up, cds, down) {
            (Some(rule), Some(candidate), shadowed, _) => {
                if let Some(shadowed) = shadowed {
                    sink.record(TraceRecord::RuleShadowed {
                        rule: shadowed,
                        bar_index: cur.index,
                    });
                }
                self.confirm(state, bars, position, candidate, rule, out, sink);
                self.rearm_downtrend(state, bars, position, candidate.position, rule, sink);
                rearmed = true;
            }
            (None, _, Some(rule), Some(candidate)) => {
                self.confirm(state, bars, position, candidate, rule, out, sink);
            }
            _ => {}
        }

        // 5. formation on the previous bar
        if self.config.suppress_formation_while_contained && contained {
            return;
        }
        let prev_position = position - 1;
        if !self.after_last_anchor(state, prev_position) {
            return;
        }
        self.form(state, bars, position, Direction::Up, sink);
        if !rearmed {
            self.form(state, bars, position, Direction::Down, sink);
        }
    }

    #[inline]
    fn after_last_anchor(&self, state: &EngineState, position: usize) -> bool {
        state
            .last_confirmed
            .map_or(true, |last| position > last.position)
    }

    /// Nominate `bars[position - 1]` for `direction` if a formation rule holds
    fn form<S: DiagnosticsSink + ?Sized>(
        &self,
        state: &mut EngineState,
        bars: &[Bar],
        position: usize,
        direction: Direction,
        sink: &mut S,
    ) {
        self.nominate(state, bars, position - 1, position, direction, sink);
    }

    /// Nominate `bars[nominee]` for `direction` if a formation rule holds with
    /// `bars[other]` in the role of the following bar
    fn nominate<S: DiagnosticsSink + ?Sized>(
        &self,
        state: &mut EngineState,
        bars: &[Bar],
        nominee: usize,
        other: usize,
        direction: Direction,
        sink: &mut S,
    ) {
        let bar = &bars[nominee];
        let Some(rule) = formation_match(direction, bar, &bars[other]) else {
            return;
        };
        let candidate = PendingCandidate::from_bar(direction, nominee, bar, bar.index);
        let outcome = state.candidates.form_pending(candidate);
        sink.record(TraceRecord::Formation {
            direction,
            bar_index: bar.index,
            rule,
            outcome,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn confirm<S: DiagnosticsSink + ?Sized>(
        &self,
        state: &mut EngineState,
        bars: &[Bar],
        position: usize,
        candidate: PendingCandidate,
        rule: RuleId,
        out: &mut Output,
        sink: &mut S,
    ) {
        let direction = candidate.direction;
        let anchored = &bars[candidate.position];

        state.candidates.clear(direction);
        sink.record(TraceRecord::CandidateCleared {
            direction,
            bar_index: candidate.bar_index,
            reason: ClearReason::Confirmed,
        });

        let event = ConfirmedEvent::from_bar(direction, anchored, bars[position].index, rule);

        if self.config.enforce_alternation {
            match enforce(bars, state.last_confirmed.as_ref(), &event, candidate.position) {
                Enforcement::Alternates => {}
                Enforcement::Forced {
                    event: forced,
                    position: forced_position,
                } => {
                    sink.record(TraceRecord::Confirmed { event: forced });
                    out.events.push(forced);
                    state.last_confirmed = Some(LastConfirmed::of(&forced, forced_position));
                }
                Enforcement::Unresolved(violation) => {
                    sink.record(TraceRecord::AlternationUnresolved { violation });
                    out.anomalies
                        .push(Anomaly::UnresolvedAlternation { violation });
                }
            }
        }

        sink.record(TraceRecord::Confirmed { event });
        out.events.push(event);
        state.last_confirmed = Some(LastConfirmed::of(&event, candidate.position));

        let opposite = direction.opposite();
        if let Some(stale) = state.candidates.invalidate_through(opposite, candidate.position) {
            sink.record(TraceRecord::CandidateCleared {
                direction: opposite,
                bar_index: stale.bar_index,
                reason: ClearReason::Stale,
            });
        }
    }

    /// After an uptrend confirmation the downtrend side is re-armed on this bar:
    /// the previous bar is nominated as usual, then the triggering bar itself,
    /// checked against its predecessor since nothing follows it yet.
    fn rearm_downtrend<S: DiagnosticsSink + ?Sized>(
        &self,
        state: &mut EngineState,
        bars: &[Bar],
        position: usize,
        anchor_position: usize,
        rule: RuleId,
        sink: &mut S,
    ) {
        let cur = &bars[position];

        if rule == RuleId::OutsideBarDownClose {
            let forced = PendingCandidate::from_bar(Direction::Down, position, cur, cur.index);
            let replaced = state.candidates.force(forced);
            sink.record(TraceRecord::CandidateForced {
                direction: Direction::Down,
                bar_index: cur.index,
                replaced: replaced.map(|c| c.bar_index),
            });
            return;
        }

        if position - 1 > anchor_position {
            self.form(state, bars, position, Direction::Down, sink);
        }
        self.nominate(state, bars, position, position - 1, Direction::Down, sink);
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`Engine`]
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    pub fn enforce_alternation(mut self, enable: bool) -> Self {
        self.config.enforce_alternation = enable;
        self
    }

    pub fn track_containment(mut self, enable: bool) -> Self {
        self.config.track_containment = enable;
        self
    }

    pub fn suppress_formation_while_contained(mut self, enable: bool) -> Self {
        self.config.suppress_formation_while_contained = enable;
        self
    }

    /// Remove a confirmation rule from its table
    pub fn disable_rule(mut self, rule: RuleId) -> Self {
        if !self.config.is_disabled(rule) {
            self.config.disabled_rules.push(rule);
        }
        self
    }

    /// Replace the whole config
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<Engine> {
        Engine::with_config(self.config)
    }
}

// ============================================================
// STREAMING DETECTOR
// ============================================================

/// Owns a growing bar history and its state; feed bars as they close.
#[derive(Debug, Clone)]
pub struct TrendDetector {
    engine: Engine,
    bars: Vec<Bar>,
    state: EngineState,
}

impl TrendDetector {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            bars: Vec::new(),
            state: EngineState::new(),
        }
    }

    /// Continue from a persisted state. `bars` must hold at least the bars the
    /// state has processed.
    pub fn resume(engine: Engine, bars: Vec<Bar>, state: EngineState) -> Result<Self> {
        engine.check_continuation(&state, &bars)?;
        Ok(Self {
            engine,
            bars,
            state,
        })
    }

    /// Append one bar; returns the events it confirmed
    pub fn push(&mut self, bar: Bar) -> Result<Vec<ConfirmedEvent>> {
        self.push_with_sink(bar, &mut TracingSink)
    }

    pub fn push_with_sink<S: DiagnosticsSink + ?Sized>(
        &mut self,
        bar: Bar,
        sink: &mut S,
    ) -> Result<Vec<ConfirmedEvent>> {
        self.bars.push(bar);
        match self.engine.advance(&mut self.state, &self.bars, sink) {
            Ok(scan) => Ok(scan.events),
            Err(e) => {
                self.bars.pop();
                Err(e)
            }
        }
    }

    /// Append several bars at once. Either all are accepted or none are.
    pub fn extend<I: IntoIterator<Item = Bar>>(&mut self, bars: I) -> Result<Vec<ConfirmedEvent>> {
        let keep = self.bars.len();
        self.bars.extend(bars);
        match self.engine.advance(&mut self.state, &self.bars, &mut TracingSink) {
            Ok(scan) => Ok(scan.events),
            Err(e) => {
                self.bars.truncate(keep);
                Err(e)
            }
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn into_parts(self) -> (Vec<Bar>, EngineState) {
        (self.bars, self.state)
    }
}

// ============================================================
// TESTS
// ============================================================
