//! Entity processors: durable per-driver state merged from partial updates.
//!
//! Each processor owns one disjoint slice of driver state and never reads
//! another processor's storage. Updates are monotonic merges: a field absent
//! from an incoming payload leaves the stored value untouched, and records are
//! created on first sight of a racing number.
//!
//! | Processor | Topics | Record |
//! |---|---|---|
//! | [`DriverProcessor`] | `DriverList`, `TimingAppData` | [`DriverRecord`](crate::types::DriverRecord) |
//! | [`PositionProcessor`] | `TimingData`, `Position` | [`PositionRecord`](crate::types::PositionRecord) |
//! | [`TimingProcessor`] | `TimingData` | [`TimingRecord`](crate::types::TimingRecord) |
//! | [`SessionProcessor`] | `SessionInfo`, `TrackStatus`, `LapCount` | [`SessionSummary`](crate::types::SessionSummary) |

mod driver;
mod position;
mod session;
mod timing;

pub use driver::DriverProcessor;
pub use position::PositionProcessor;
pub use session::SessionProcessor;
pub use timing::TimingProcessor;

use crate::types::{DriverNumber, Payload, Topic};

/// Result of offering a payload to a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Payload merged; `entities` records were touched
    Applied { entities: usize },
    /// Payload carries nothing this processor owns; not an error
    Ignored,
}

impl MergeOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, MergeOutcome::Applied { .. })
    }
}

/// A keyed store of records merged from decoded payloads.
pub trait Processor {
    type Record: Clone;

    /// Merge `payload` (received under `topic`) into the stored records.
    fn apply_update(&mut self, topic: &Topic, payload: &Payload) -> MergeOutcome;

    /// Fresh ordered copy of every record.
    fn snapshot(&self) -> Vec<Self::Record>;

    fn get(&self, driver_number: DriverNumber) -> Option<&Self::Record>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record (new session).
    fn clear(&mut self);
}

/// Overwrite `slot` only when a value is present.
fn merge<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if let Some(value) = incoming {
        *slot = Some(value);
    }
}

/// Overwrite `slot` only with a present, non-blank string.
fn merge_text(slot: &mut Option<String>, incoming: Option<&str>) {
    if let Some(text) = incoming.map(str::trim).filter(|t| !t.is_empty()) {
        *slot = Some(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn timing_data(lines: Value) -> Payload {
        Payload::from_value(&Topic::TimingData, json!({ "Lines": lines }))
    }

    /// One partial TimingData line: each field present or absent independently.
    fn arb_line() -> impl Strategy<Value = Value> {
        (
            proptest::option::of(1u32..21),
            proptest::option::of("[0-9]\\.[0-9]{3}"),
            proptest::option::of("1:[0-5][0-9]\\.[0-9]{3}"),
            proptest::option::of("[0-9]{2}\\.[0-9]{3}"),
            proptest::option::of(1u32..80),
            proptest::option::of(200u32..350),
            proptest::option::of(any::<bool>()),
        )
            .prop_map(|(position, gap, lap, sector, laps, speed, in_pit)| {
                let mut line = serde_json::Map::new();
                if let Some(p) = position {
                    line.insert("Position".into(), json!(p.to_string()));
                }
                if let Some(g) = gap {
                    line.insert("GapToLeader".into(), json!(format!("+{g}")));
                }
                if let Some(l) = lap {
                    line.insert("LastLapTime".into(), json!({ "Value": l }));
                }
                if let Some(s) = sector {
                    line.insert("Sectors".into(), json!({ "1": { "Value": s } }));
                }
                if let Some(n) = laps {
                    line.insert("NumberOfLaps".into(), json!(n));
                }
                if let Some(st) = speed {
                    line.insert("Speeds".into(), json!({ "ST": { "Value": st.to_string() } }));
                }
                if let Some(p) = in_pit {
                    line.insert("InPit".into(), json!(p));
                }
                Value::Object(line)
            })
    }

    fn is_superset<T: PartialEq>(before: &Option<T>, after: &Option<T>) -> bool {
        before.is_none() || after.is_some()
    }

    proptest! {
        #[test]
        fn prop_merges_never_lose_known_fields(lines in prop::collection::vec(arb_line(), 1..20)) {
            let mut positions = PositionProcessor::new();
            let mut timing = TimingProcessor::new();

            for line in lines {
                let before_pos = positions.get(44).cloned();
                let before_timing = timing.get(44).cloned();

                let payload = timing_data(json!({ "44": line }));
                positions.apply_update(&Topic::TimingData, &payload);
                timing.apply_update(&Topic::TimingData, &payload);

                let after_pos = positions.get(44).cloned().expect("record exists");
                let after_timing = timing.get(44).cloned().expect("record exists");

                if let Some(before) = before_pos {
                    prop_assert!(is_superset(&before.position, &after_pos.position));
                    prop_assert!(is_superset(&before.gap_to_leader, &after_pos.gap_to_leader));
                    prop_assert!(is_superset(&before.status, &after_pos.status));
                }
                if let Some(before) = before_timing {
                    prop_assert!(is_superset(&before.last_lap_time, &after_timing.last_lap_time));
                    prop_assert!(is_superset(&before.sectors[1], &after_timing.sectors[1]));
                    prop_assert!(is_superset(&before.number_of_laps, &after_timing.number_of_laps));
                    prop_assert!(is_superset(&before.speeds.st, &after_timing.speeds.st));
                }
            }
        }

        #[test]
        fn prop_snapshot_is_pure(lines in prop::collection::vec(arb_line(), 0..10)) {
            let mut positions = PositionProcessor::new();
            let mut timing = TimingProcessor::new();
            for (i, line) in lines.into_iter().enumerate() {
                let mut keyed = serde_json::Map::new();
                keyed.insert((i % 5 + 1).to_string(), line);
                let payload = timing_data(Value::Object(keyed));
                positions.apply_update(&Topic::TimingData, &payload);
                timing.apply_update(&Topic::TimingData, &payload);
            }

            prop_assert_eq!(positions.snapshot(), positions.snapshot());
            prop_assert_eq!(timing.snapshot(), timing.snapshot());
        }
    }

    #[test]
    fn merge_helpers_keep_known_values() {
        let mut slot = Some(3);
        merge(&mut slot, None);
        assert_eq!(slot, Some(3));
        merge(&mut slot, Some(4));
        assert_eq!(slot, Some(4));

        let mut text = Some("+1.234".to_string());
        merge_text(&mut text, Some("  "));
        merge_text(&mut text, None);
        assert_eq!(text.as_deref(), Some("+1.234"));
        merge_text(&mut text, Some("+0.9"));
        assert_eq!(text.as_deref(), Some("+0.9"));
    }
}
