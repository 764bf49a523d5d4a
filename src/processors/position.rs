//! Race order, gaps and car locations

use std::collections::BTreeMap;

use tracing::trace;

use super::{MergeOutcome, Processor, merge, merge_text};
use crate::types::{
    DriverNumber, Payload, PositionPayload, PositionRecord, RunningStatus, TimingDataPayload, TimingLine,
    Topic, TrackLocation,
};

/// Last known value of each running-status flag.
#[derive(Debug, Clone, Copy, Default)]
struct StatusFlags {
    retired: Option<bool>,
    knocked_out: Option<bool>,
    stopped: Option<bool>,
    in_pit: Option<bool>,
}

impl StatusFlags {
    /// Merge the flags present on `line`; true when the line carried any.
    fn merge(&mut self, line: &TimingLine) -> bool {
        merge(&mut self.retired, line.retired);
        merge(&mut self.knocked_out, line.knocked_out);
        merge(&mut self.stopped, line.stopped);
        merge(&mut self.in_pit, line.in_pit);
        [line.retired, line.knocked_out, line.stopped, line.in_pit].iter().any(Option::is_some)
    }

    fn status(&self) -> RunningStatus {
        if self.retired == Some(true) {
            RunningStatus::Retired
        } else if self.knocked_out == Some(true) {
            RunningStatus::KnockedOut
        } else if self.stopped == Some(true) {
            RunningStatus::Stopped
        } else if self.in_pit == Some(true) {
            RunningStatus::InPit
        } else {
            RunningStatus::Running
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    record: PositionRecord,
    flags: StatusFlags,
}

/// Race order keyed by racing number.
///
/// Rank, gaps and running status come from `TimingData`; on/off-track status
/// and coordinates come from the `Position` stream. Neither source depends on
/// the timing processor.
#[derive(Debug, Default)]
pub struct PositionProcessor {
    entries: BTreeMap<DriverNumber, Entry>,
}

impl PositionProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Car classified first, if any.
    pub fn leader(&self) -> Option<&PositionRecord> {
        self.entries.values().map(|e| &e.record).find(|r| r.position == Some(1))
    }

    /// The first `n` cars in race order.
    pub fn top(&self, n: usize) -> Vec<PositionRecord> {
        let mut ordered = self.snapshot();
        ordered.truncate(n);
        ordered
    }

    fn entry(&mut self, number: DriverNumber) -> &mut Entry {
        self.entries
            .entry(number)
            .or_insert_with(|| Entry { record: PositionRecord::new(number), flags: StatusFlags::default() })
    }

    fn apply_timing(&mut self, data: &TimingDataPayload) -> usize {
        for (&number, line) in &data.lines {
            let entry = self.entry(number);
            merge(&mut entry.record.position, line.position.filter(|&p| p > 0));
            merge_text(&mut entry.record.gap_to_leader, line.gap_to_leader.as_deref());
            merge_text(
                &mut entry.record.interval,
                line.interval_to_position_ahead.as_ref().and_then(|f| f.current()),
            );
            if entry.flags.merge(line) {
                entry.record.status = Some(entry.flags.status());
            }
        }
        data.lines.len()
    }

    fn apply_locations(&mut self, data: &PositionPayload) -> usize {
        let mut touched = 0;
        // Batches arrive oldest first; the last sample per car wins
        for batch in &data.position {
            for (&number, sample) in &batch.entries {
                let entry = self.entry(number);
                merge_text(&mut entry.record.track_status, sample.status.as_deref());
                if let (Some(x), Some(y)) = (sample.x, sample.y) {
                    entry.record.location = Some(TrackLocation { x, y, z: sample.z.unwrap_or_default() });
                }
                touched += 1;
            }
        }
        touched
    }
}

impl Processor for PositionProcessor {
    type Record = PositionRecord;

    fn apply_update(&mut self, topic: &Topic, payload: &Payload) -> MergeOutcome {
        let entities = match payload {
            Payload::TimingData(data) => self.apply_timing(data),
            Payload::Position(data) => self.apply_locations(data),
            _ => return MergeOutcome::Ignored,
        };
        trace!(topic = %topic, entities, "Positions merged");
        MergeOutcome::Applied { entities }
    }

    /// Ranked cars by rank, then unranked cars by racing number.
    fn snapshot(&self) -> Vec<PositionRecord> {
        let mut ordered: Vec<PositionRecord> = self.entries.values().map(|e| e.record.clone()).collect();
        ordered.sort_by_key(|r| (r.position.is_none(), r.position, r.driver_number));
        ordered
    }

    fn get(&self, driver_number: DriverNumber) -> Option<&PositionRecord> {
        self.entries.get(&driver_number).map(|e| &e.record)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}
