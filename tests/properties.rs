//! Property tests over random-walk bar series.

use std::collections::HashMap;

use proptest::prelude::*;
use trendstart::prelude::*;

/// Snap to a quarter tick so equal highs/lows show up regularly
fn tick(x: f64) -> f64 {
    (x * 4.0).round() / 4.0
}

fn arb_bars(max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((-3.0f64..3.0, 0.0f64..2.0, 0.0f64..2.0), 0..max_len).prop_map(
        |steps| {
            let mut price = 100.0;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (drift, wick_up, wick_down))| {
                    let open = tick(price);
                    let close = tick(price + drift);
                    let high = tick(open.max(close) + wick_up);
                    let low = tick(open.min(close) - wick_down);
                    price = close;
                    Bar::new(i as u64 + 1, i as i64 * 60_000, open, high, low, close, 1.0)
                })
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_events_alternate_or_are_reported(bars in arb_bars(120)) {
        let scan = Engine::default().run(&bars).unwrap();

        for pair in scan.events.windows(2) {
            if pair[0].direction == pair[1].direction {
                let reported = scan.anomalies.iter().any(|a| matches!(
                    a,
                    Anomaly::UnresolvedAlternation { violation }
                        if violation.previous_anchor_index == pair[0].anchored_bar_index
                            && violation.anchor_index == pair[1].anchored_bar_index
                ));
                prop_assert!(reported, "unreported repeat at {:?}", pair[1]);
            }
        }
    }

    #[test]
    fn prop_anchors_strictly_increase(bars in arb_bars(120)) {
        for engine in [
            Engine::default(),
            EngineBuilder::new().enforce_alternation(false).build().unwrap(),
        ] {
            let scan = engine.run(&bars).unwrap();
            for pair in scan.events.windows(2) {
                prop_assert!(pair[0].anchored_bar_index < pair[1].anchored_bar_index);
            }
            for e in &scan.events {
                prop_assert!(e.anchored_bar_index < e.triggering_bar_index);
            }
        }
    }

    #[test]
    fn prop_runs_are_idempotent(bars in arb_bars(80)) {
        let engine = Engine::default();
        prop_assert_eq!(engine.run(&bars).unwrap(), engine.run(&bars).unwrap());
    }

    #[test]
    fn prop_one_natural_confirmation_per_bar(bars in arb_bars(120)) {
        let scan = Engine::default().run(&bars).unwrap();
        let mut per_trigger: HashMap<u64, usize> = HashMap::new();
        for e in scan.events.iter().filter(|e| !e.is_forced()) {
            *per_trigger.entry(e.triggering_bar_index).or_default() += 1;
        }
        prop_assert!(per_trigger.values().all(|&n| n == 1));
    }

    #[test]
    fn prop_superseding_candidates_are_more_extreme(bars in arb_bars(120)) {
        let mut records: Vec<TraceRecord> = Vec::new();
        Engine::default().run_with_sink(&bars, &mut records).unwrap();

        for record in &records {
            if let TraceRecord::Formation {
                direction,
                bar_index,
                outcome: FormOutcome::Superseded(old),
                ..
            } = record
            {
                let position = (*bar_index - 1) as usize;
                let new = PendingCandidate::from_bar(*direction, position, &bars[position], *bar_index);
                prop_assert!(new.improves_on(old));
                prop_assert!(old.position < new.position);
            }
        }
    }

    #[test]
    fn prop_streaming_matches_batch(bars in arb_bars(80)) {
        let engine = Engine::default();
        let batch = engine.run(&bars).unwrap();

        let mut detector = TrendDetector::new(engine);
        let mut streamed = Vec::new();
        for b in &bars {
            streamed.extend(detector.push(*b).unwrap());
        }
        prop_assert_eq!(streamed, batch.events);
        prop_assert_eq!(detector.state().containment(), &batch.containment);
    }

    #[test]
    fn prop_short_series_are_empty(bars in arb_bars(2)) {
        let scan = Engine::default().run(&bars).unwrap();
        prop_assert!(scan.events.is_empty());
        prop_assert_eq!(scan.anomalies, vec![Anomaly::InsufficientData { got: bars.len() }]);
    }
}
