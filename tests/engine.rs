//! Integration tests for the trendstart engine.
//!
//! Scenario series are small enough to follow bar by bar.

use trendstart::prelude::*;

fn bar(index: u64, o: f64, h: f64, l: f64, c: f64) -> Bar {
    Bar::new(index, index as i64 * 60_000, o, h, l, c, 1_000.0)
}

fn summary(events: &[ConfirmedEvent]) -> Vec<(Direction, u64, u64, RuleId)> {
    events
        .iter()
        .map(|e| {
            (
                e.direction,
                e.anchored_bar_index,
                e.triggering_bar_index,
                e.rule_id,
            )
        })
        .collect()
}

/// Bars 1-5 decline, 6-10 rise (bar 6 clears bar 5's high), 11-15 decline, and
/// bar 16 is the first bounce.
fn swing_series() -> Vec<Bar> {
    let mut bars = Vec::new();
    for k in 1..=5u64 {
        let o = 100.0 - 2.0 * (k - 1) as f64;
        bars.push(bar(k, o, o + 1.0, o - 2.0, o - 1.0));
    }
    for k in 6..=10u64 {
        let b = 92.0 + 2.0 * (k - 5) as f64;
        bars.push(bar(k, b - 1.0, b + 1.0, b - 2.0, b + 0.5));
    }
    for (k, o) in (11..=15u64).zip([100.0, 98.0, 96.0, 94.0, 92.0]) {
        bars.push(bar(k, o, o + 1.0, o - 2.0, o - 1.0));
    }
    bars.push(bar(16, 92.5, 94.0, 91.0, 93.5));
    bars
}

/// Two uptrend confirmations anchored at bars 1 and 4
fn double_up_series() -> Vec<Bar> {
    vec![
        bar(1, 100.0, 101.0, 99.0, 100.5),
        bar(2, 100.6, 102.0, 99.5, 101.8),
        bar(3, 101.9, 103.0, 100.5, 102.8),
        bar(4, 102.5, 102.6, 98.0, 98.5),
        bar(5, 98.2, 99.0, 98.1, 98.4),
        bar(6, 98.3, 98.9, 97.9, 98.6),
    ]
}

/// A wide first bar followed by bars trading inside it
fn flat_series(n: u64) -> Vec<Bar> {
    let mut bars = vec![bar(1, 100.0, 110.0, 90.0, 100.0)];
    bars.extend((2..=n).map(|i| bar(i, 100.0, 101.0, 99.0, 100.0)));
    bars
}

/// An outside bar that closes down confirms the uptrend, then gets reversed
fn outside_bar_series() -> Vec<Bar> {
    vec![
        bar(1, 100.0, 101.0, 99.0, 100.5),
        bar(2, 100.6, 102.0, 99.5, 101.8),
        bar(3, 102.5, 103.0, 99.2, 99.6),
        bar(4, 99.5, 103.5, 99.0, 101.0),
    ]
}

// ============================================================
// SCENARIOS
// ============================================================

#[test]
fn test_swing_series() {
    let scan = Engine::default().run(&swing_series()).unwrap();

    assert_eq!(
        summary(&scan.events),
        vec![
            (Direction::Down, 1, 6, RuleId::PullbackThenBreakA),
            (Direction::Up, 5, 11, RuleId::LowerOhlc),
            (Direction::Down, 10, 16, RuleId::PullbackThenBreakA),
        ]
    );
    assert!(scan.anomalies.is_empty());

    let up = &scan.events[1];
    assert_eq!((up.open, up.high, up.low, up.close), (92.0, 93.0, 90.0, 91.0));
    assert_eq!(up.timestamp, 5 * 60_000);
}

#[test]
fn test_swing_series_without_bounce() {
    let bars = swing_series();
    let scan = Engine::default().run(&bars[..15]).unwrap();

    // the final decline has no counter move yet, so only two starts confirm
    assert_eq!(
        summary(&scan.events),
        vec![
            (Direction::Down, 1, 6, RuleId::PullbackThenBreakA),
            (Direction::Up, 5, 11, RuleId::LowerOhlc),
        ]
    );
    assert!(scan.anomalies.is_empty());
}

#[test]
fn test_uptrend_confirmation_rearms_on_triggering_bar() {
    // bar 1 seeds both candidates, bar 3 undercuts it and confirms the uptrend
    let bars = vec![
        bar(1, 100.0, 110.0, 95.0, 100.0),
        bar(2, 100.0, 105.0, 96.0, 102.0),
        bar(3, 101.0, 106.0, 94.0, 104.0),
    ];
    let mut records: Vec<TraceRecord> = Vec::new();
    let mut detector = TrendDetector::new(Engine::default());
    let mut events = Vec::new();
    for b in &bars {
        events.extend(detector.push_with_sink(*b, &mut records).unwrap());
    }

    assert_eq!(
        summary(&events),
        vec![(Direction::Up, 1, 3, RuleId::LowUndercutHighRespect)]
    );
    let down = detector
        .state()
        .candidates()
        .current(Direction::Down)
        .expect("downtrend candidate");
    assert_eq!(down.bar_index, 3);
    assert_eq!(down.anchor, 106.0);
    assert!(records.iter().any(|r| matches!(
        r,
        TraceRecord::Formation {
            direction: Direction::Down,
            bar_index: 3,
            rule: FormationRule::NonExceedance,
            outcome: FormOutcome::Formed,
        }
    )));
}

#[test]
fn test_forced_alternation_between_uptrends() {
    let scan = Engine::default().run(&double_up_series()).unwrap();

    assert_eq!(
        summary(&scan.events),
        vec![
            (Direction::Up, 1, 4, RuleId::LowerOhlc),
            (Direction::Down, 2, 6, RuleId::ForcedAlternation),
            (Direction::Up, 4, 6, RuleId::LowUndercutHighRespect),
        ]
    );
    // bar 2 has the lowest low between the two anchors
    assert_eq!(scan.events[1].low, 99.5);
    assert_eq!(scan.events.iter().filter(|e| e.is_forced()).count(), 1);
}

#[test]
fn test_alternation_can_be_disabled() {
    let engine = EngineBuilder::new().enforce_alternation(false).build().unwrap();
    let scan = engine.run(&double_up_series()).unwrap();

    assert_eq!(
        summary(&scan.events),
        vec![
            (Direction::Up, 1, 4, RuleId::LowerOhlc),
            (Direction::Up, 4, 6, RuleId::LowUndercutHighRespect),
        ]
    );
}

#[test]
fn test_flat_series_stays_contained() {
    let scan = Engine::default().run(&flat_series(8)).unwrap();

    assert!(scan.events.is_empty());
    let ctx = scan.containment.context().expect("containment active");
    assert_eq!(ctx.reference_bar_index, 1);
    assert_eq!(ctx.reference_type, ReferenceType::PendingHigh);
    assert_eq!((ctx.reference_low, ctx.reference_high), (90.0, 110.0));
    // bars 3..=8; candidates only exist once bar 2 has been seen
    assert_eq!(ctx.bars_inside, 6);
}

#[test]
fn test_containment_tracking_off() {
    let engine = EngineBuilder::new().track_containment(false).build().unwrap();
    let scan = engine.run(&flat_series(8)).unwrap();
    assert!(!scan.containment.is_active());
    assert!(scan.events.is_empty());
}

#[test]
fn test_containment_reports_entry_and_exit() {
    let mut bars = flat_series(5);
    bars.push(bar(6, 100.0, 111.0, 99.0, 110.5));

    let mut records: Vec<TraceRecord> = Vec::new();
    let scan = Engine::default().run_with_sink(&bars, &mut records).unwrap();

    assert!(!scan.containment.is_active());
    assert!(records
        .iter()
        .any(|r| matches!(r, TraceRecord::ContainmentEntered { bar_index: 3, .. })));
    assert!(records.iter().any(|r| matches!(
        r,
        TraceRecord::ContainmentExited {
            breakout: Breakout::Up,
            bar_index: 6,
            context
        } if context.bars_inside == 3
    )));
}

#[test]
fn test_suppressed_formation_while_contained() {
    fn formed_after_first(records: &[TraceRecord]) -> usize {
        records
            .iter()
            .filter(|r| matches!(r, TraceRecord::Formation { bar_index, .. } if *bar_index > 1))
            .count()
    }

    let mut normal: Vec<TraceRecord> = Vec::new();
    Engine::default()
        .run_with_sink(&flat_series(8), &mut normal)
        .unwrap();
    assert!(formed_after_first(&normal) > 0);

    let engine = EngineBuilder::new()
        .suppress_formation_while_contained(true)
        .build()
        .unwrap();
    let mut suppressed: Vec<TraceRecord> = Vec::new();
    let scan = engine
        .run_with_sink(&flat_series(8), &mut suppressed)
        .unwrap();
    assert_eq!(formed_after_first(&suppressed), 0);
    assert!(scan.events.is_empty());
}

#[test]
fn test_outside_bar_forces_downtrend_candidate() {
    let mut records: Vec<TraceRecord> = Vec::new();
    let scan = Engine::default()
        .run_with_sink(&outside_bar_series(), &mut records)
        .unwrap();

    assert!(records.iter().any(|r| matches!(
        r,
        TraceRecord::CandidateForced {
            direction: Direction::Down,
            bar_index: 3,
            replaced: None
        }
    )));
    assert_eq!(
        summary(&scan.events),
        vec![
            (Direction::Up, 1, 3, RuleId::OutsideBarDownClose),
            (Direction::Down, 3, 4, RuleId::ReversalVsAnchorOpen),
        ]
    );
}

#[test]
fn test_outside_bar_reversal_h_when_earlier_rule_disabled() {
    let engine = EngineBuilder::new()
        .disable_rule(RuleId::ReversalVsAnchorOpen)
        .build()
        .unwrap();
    let scan = engine.run(&outside_bar_series()).unwrap();
    assert_eq!(scan.events[1].rule_id, RuleId::OutsideBarReversalH);
}

// ============================================================
// DETERMINISM & STREAMING
// ============================================================

#[test]
fn test_runs_are_idempotent() {
    let engine = Engine::default();
    let bars = swing_series();
    assert_eq!(engine.run(&bars).unwrap(), engine.run(&bars).unwrap());
}

#[test]
fn test_streaming_matches_batch() {
    let engine = Engine::default();
    for bars in [swing_series(), double_up_series(), outside_bar_series()] {
        let batch = engine.run(&bars).unwrap();

        let mut detector = TrendDetector::new(engine.clone());
        let mut streamed = Vec::new();
        for b in &bars {
            streamed.extend(detector.push(*b).unwrap());
        }

        assert_eq!(streamed, batch.events);
        assert_eq!(detector.state().containment(), &batch.containment);
    }
}

#[test]
fn test_resume_from_serialized_state() {
    let engine = Engine::default();
    let bars = swing_series();
    let batch = engine.run(&bars).unwrap();

    let mut first = TrendDetector::new(engine.clone());
    let mut events = first.extend(bars[..8].iter().copied()).unwrap();
    let (history, state) = first.into_parts();

    let json = serde_json::to_string(&state).unwrap();
    let restored: EngineState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);

    let mut second = TrendDetector::resume(engine, history, restored).unwrap();
    events.extend(second.extend(bars[8..].iter().copied()).unwrap());

    assert_eq!(events, batch.events);
}

#[test]
fn test_resume_rejects_short_history() {
    let engine = Engine::default();
    let bars = swing_series();
    let mut detector = TrendDetector::new(engine.clone());
    detector.extend(bars.iter().copied()).unwrap();
    let (_, state) = detector.into_parts();

    let result = TrendDetector::resume(engine, bars[..4].to_vec(), state);
    assert!(matches!(
        result,
        Err(TrendError::SequenceRewound {
            processed: 16,
            supplied: 4
        })
    ));
}

#[test]
fn test_rejected_extend_keeps_history() {
    let mut detector = TrendDetector::new(Engine::default());
    detector.extend(swing_series().into_iter().take(4)).unwrap();

    let bad = vec![bar(5, 92.0, 93.0, 90.0, 91.0), bar(5, 92.0, 93.0, 90.0, 91.0)];
    assert!(matches!(
        detector.extend(bad),
        Err(TrendError::NonMonotonicSequence { position: 5, .. })
    ));
    assert_eq!(detector.bars().len(), 4);
    assert_eq!(detector.state().processed(), 4);
}

// ============================================================
// OUTPUT
// ============================================================

#[test]
fn test_tagged_keys_are_unique() {
    let scan = Engine::default().run(&swing_series()).unwrap();
    let tag = SeriesTag::new("trendstart", "ESZ5", "1m");

    let keys: std::collections::HashSet<SignalKey> =
        tag.tag_all(&scan.events).map(|t| t.key()).collect();
    assert_eq!(keys.len(), scan.events.len());
}

#[test]
fn test_scan_serializes() {
    let scan = Engine::default().run(&double_up_series()).unwrap();
    let json = serde_json::to_value(&scan).unwrap();

    assert_eq!(json["events"][1]["rule_id"], "forced-alternation");
    assert_eq!(json["events"][0]["direction"], "up");

    let back: TrendScan = serde_json::from_value(json).unwrap();
    assert_eq!(back, scan);
}

#[test]
fn test_parallel_matches_sequential() {
    let engine = Engine::default();
    let swing = swing_series();
    let double = double_up_series();
    let flat = flat_series(10);
    let series: Vec<(&str, &[Bar])> = vec![
        ("ES:1m", &swing),
        ("NQ:1m", &double),
        ("CL:5m", &flat),
    ];

    let (results, errors) = scan_parallel(&engine, series.clone());
    assert!(errors.is_empty());
    assert_eq!(results.len(), 3);

    for (name, bars) in series {
        let found = results.iter().find(|r| r.series == name).unwrap();
        assert_eq!(found.scan, engine.run(bars).unwrap());
    }
}
