//! Lap, sector and speed-trap timing

use std::collections::BTreeMap;

use tracing::trace;

use super::{MergeOutcome, Processor, merge, merge_text};
use crate::types::{
    DriverNumber, Payload, SpeedTraps, TimingLine, TimingRecord, Topic, ValueField, lap_time_millis,
};

/// Lap timing keyed by racing number, from `TimingData`.
#[derive(Debug, Default)]
pub struct TimingProcessor {
    timing: BTreeMap<DriverNumber, TimingRecord>,
}

impl TimingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quickest best lap across the field, as `(driver, lap time)`.
    ///
    /// Ties go to the lower racing number.
    pub fn fastest_lap(&self) -> Option<(DriverNumber, &str)> {
        self.timing
            .values()
            .filter_map(|t| {
                let best = t.best_lap_time.as_deref()?;
                Some((lap_time_millis(best)?, t.driver_number, best))
            })
            .min_by_key(|&(millis, number, _)| (millis, number))
            .map(|(_, number, best)| (number, best))
    }

    /// Drivers whose last lap is their personal best.
    pub fn personal_bests(&self) -> Vec<DriverNumber> {
        self.timing
            .values()
            .filter(|t| matches!((&t.last_lap_time, &t.best_lap_time), (Some(last), Some(best)) if last == best))
            .map(|t| t.driver_number)
            .collect()
    }

    fn merge_line(record: &mut TimingRecord, line: &TimingLine) {
        merge_text(&mut record.last_lap_time, line.last_lap_time.as_ref().and_then(ValueField::current));
        merge_text(&mut record.best_lap_time, line.best_lap_time.as_ref().and_then(ValueField::current));
        merge(&mut record.number_of_laps, line.number_of_laps);

        for (&index, sector) in &line.sectors {
            if let Some(slot) = record.sectors.get_mut(index) {
                merge_text(slot, sector.current_or_previous());
            }
        }

        if let Some(speeds) = &line.speeds {
            let SpeedTraps { i1, i2, fl, st } = &mut record.speeds;
            merge(i1, trap_speed(&speeds.i1));
            merge(i2, trap_speed(&speeds.i2));
            merge(fl, trap_speed(&speeds.fl));
            merge(st, trap_speed(&speeds.st));
        }
    }
}

fn trap_speed(field: &Option<ValueField>) -> Option<u32> {
    field.as_ref()?.current()?.trim().parse().ok()
}

impl Processor for TimingProcessor {
    type Record = TimingRecord;

    fn apply_update(&mut self, topic: &Topic, payload: &Payload) -> MergeOutcome {
        let Payload::TimingData(data) = payload else {
            return MergeOutcome::Ignored;
        };
        for (&number, line) in &data.lines {
            let record = self.timing.entry(number).or_insert_with(|| TimingRecord::new(number));
            Self::merge_line(record, line);
        }
        trace!(topic = %topic, entities = data.lines.len(), "Timing merged");
        MergeOutcome::Applied { entities: data.lines.len() }
    }

    fn snapshot(&self) -> Vec<TimingRecord> {
        self.timing.values().cloned().collect()
    }

    fn get(&self, driver_number: DriverNumber) -> Option<&TimingRecord> {
        self.timing.get(&driver_number)
    }

    fn len(&self) -> usize {
        self.timing.len()
    }

    fn clear(&mut self) {
        self.timing.clear();
    }
}
