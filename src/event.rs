//! Confirmed trend-start events and their storage keys

use crate::{rules::RuleId, Bar, Direction};

/// A committed trend start, anchored to a historical bar.
///
/// The OHLCV fields are a snapshot of the anchored bar, not of the bar that
/// triggered the confirmation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfirmedEvent {
    pub direction: Direction,
    pub anchored_bar_index: u64,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub triggering_bar_index: u64,
    pub rule_id: RuleId,
}

impl ConfirmedEvent {
    pub fn from_bar(
        direction: Direction,
        anchored: &Bar,
        triggering_bar_index: u64,
        rule_id: RuleId,
    ) -> Self {
        Self {
            direction,
            anchored_bar_index: anchored.index,
            timestamp: anchored.timestamp,
            open: anchored.open,
            high: anchored.high,
            low: anchored.low,
            close: anchored.close,
            volume: anchored.volume,
            triggering_bar_index,
            rule_id,
        }
    }

    #[inline]
    pub fn is_forced(&self) -> bool {
        self.rule_id.is_forced()
    }

    /// Output order and de-duplication key
    #[inline]
    pub fn sort_key(&self) -> (u64, Direction) {
        (self.anchored_bar_index, self.direction)
    }

    pub fn tagged(&self, tag: &SeriesTag) -> TaggedEvent {
        TaggedEvent {
            tag: tag.clone(),
            event: *self,
        }
    }
}

/// Sort by `(anchored_bar_index, direction)` and drop later duplicates of a key.
///
/// The sort is stable, so the first event emitted for a key is the one kept.
pub fn normalize(events: &mut Vec<ConfirmedEvent>) {
    events.sort_by_key(ConfirmedEvent::sort_key);
    events.dedup_by_key(|e| e.sort_key());
}

// ============================================================
// TAGGING
// ============================================================

/// Identifies one analyzed series downstream
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SeriesTag {
    pub analyzer_id: String,
    pub contract_id: String,
    pub timeframe: String,
}

impl SeriesTag {
    pub fn new(
        analyzer_id: impl Into<String>,
        contract_id: impl Into<String>,
        timeframe: impl Into<String>,
    ) -> Self {
        Self {
            analyzer_id: analyzer_id.into(),
            contract_id: contract_id.into(),
            timeframe: timeframe.into(),
        }
    }

    pub fn tag_all<'a, I>(&'a self, events: I) -> impl Iterator<Item = TaggedEvent> + 'a
    where
        I: IntoIterator<Item = &'a ConfirmedEvent>,
        I::IntoIter: 'a,
    {
        events.into_iter().map(move |e| e.tagged(self))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaggedEvent {
    #[serde(flatten)]
    pub tag: SeriesTag,
    #[serde(flatten)]
    pub event: ConfirmedEvent,
}

/// Upsert key for downstream storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct SignalKey {
    pub analyzer_id: String,
    pub contract_id: String,
    pub timeframe: String,
    pub event_timestamp: i64,
    pub direction: Direction,
}

impl TaggedEvent {
    pub fn key(&self) -> SignalKey {
        SignalKey {
            analyzer_id: self.tag.analyzer_id.clone(),
            contract_id: self.tag.contract_id.clone(),
            timeframe: self.tag.timeframe.clone(),
            event_timestamp: self.event.timestamp,
            direction: self.event.direction,
        }
    }
}
