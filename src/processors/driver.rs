//! Driver roster

use std::collections::BTreeMap;

use tracing::trace;

use super::{MergeOutcome, Processor, merge, merge_text};
use crate::types::{DriverListEntry, DriverNumber, DriverRecord, Payload, Topic};

/// Roster keyed by racing number, from `DriverList` plus grid slots from `TimingAppData`.
#[derive(Debug, Default)]
pub struct DriverProcessor {
    drivers: BTreeMap<DriverNumber, DriverRecord>,
}

impl DriverProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drivers of one team, by racing number. Team names compare case-insensitively.
    pub fn by_team(&self, team_name: &str) -> Vec<&DriverRecord> {
        self.drivers
            .values()
            .filter(|d| d.team_name.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(team_name)))
            .collect()
    }

    fn merge_entry(record: &mut DriverRecord, entry: &DriverListEntry) {
        merge_text(&mut record.broadcast_name, entry.broadcast_name.as_deref());
        merge_text(&mut record.full_name, entry.full_name.as_deref());
        merge_text(&mut record.name_acronym, entry.tla.as_deref());
        merge_text(&mut record.first_name, entry.first_name.as_deref());
        merge_text(&mut record.last_name, entry.last_name.as_deref());
        merge_text(&mut record.team_name, entry.team_name.as_deref());
        merge_text(&mut record.team_colour, entry.team_colour.as_deref());
        merge_text(&mut record.country_code, entry.country_code.as_deref());
        merge_text(&mut record.headshot_url, entry.headshot_url.as_deref());
        merge(&mut record.line, entry.line);

        // Each short name stands in for the other until both are known
        if record.broadcast_name.is_none() {
            record.broadcast_name = record.name_acronym.clone();
        }
        if record.name_acronym.is_none() {
            record.name_acronym = record.broadcast_name.clone();
        }
    }
}

impl Processor for DriverProcessor {
    type Record = DriverRecord;

    fn apply_update(&mut self, topic: &Topic, payload: &Payload) -> MergeOutcome {
        match payload {
            Payload::DriverList(list) => {
                for (&number, entry) in &list.0 {
                    let record = self.drivers.entry(number).or_insert_with(|| DriverRecord::new(number));
                    Self::merge_entry(record, entry);
                }
                trace!(topic = %topic, entities = list.0.len(), "Driver list merged");
                MergeOutcome::Applied { entities: list.0.len() }
            }
            Payload::TimingAppData(app) => {
                let mut touched = 0;
                for (&number, line) in &app.lines {
                    if let Some(grid) = line.grid_pos {
                        self.drivers
                            .entry(number)
                            .or_insert_with(|| DriverRecord::new(number))
                            .grid_position = Some(grid);
                        touched += 1;
                    }
                }
                MergeOutcome::Applied { entities: touched }
            }
            _ => MergeOutcome::Ignored,
        }
    }

    fn snapshot(&self) -> Vec<DriverRecord> {
        self.drivers.values().cloned().collect()
    }

    fn get(&self, driver_number: DriverNumber) -> Option<&DriverRecord> {
        self.drivers.get(&driver_number)
    }

    fn len(&self) -> usize {
        self.drivers.len()
    }

    fn clear(&mut self) {
        self.drivers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn driver_list(value: serde_json::Value) -> Payload {
        Payload::from_value(&Topic::DriverList, value)
    }

    #[test]
    fn builds_roster_from_driver_list() {
        let mut drivers = DriverProcessor::new();
        let outcome = drivers.apply_update(
            &Topic::DriverList,
            &driver_list(json!({
                "44": {"RacingNumber": "44", "BroadcastName": "L HAMILTON", "FullName": "Lewis HAMILTON",
                       "Tla": "HAM", "Line": 2, "TeamName": "Ferrari", "TeamColour": "E80020",
                       "FirstName": "Lewis", "LastName": "Hamilton", "CountryCode": "GBR"},
                "1": {"RacingNumber": "1", "Tla": "VER", "Line": 1, "TeamName": "Red Bull Racing"},
                "_kf": true
            })),
        );

        assert_eq!(outcome, MergeOutcome::Applied { entities: 2 });
        let roster = drivers.snapshot();
        assert_eq!(roster.iter().map(|d| d.driver_number).collect::<Vec<_>>(), vec![1, 44]);

        let ham = drivers.get(44).expect("driver 44");
        assert_eq!(ham.name_acronym.as_deref(), Some("HAM"));
        assert_eq!(ham.team_colour.as_deref(), Some("E80020"));
        assert_eq!(ham.line, Some(2));

        // Missing broadcast name falls back to the TLA
        assert_eq!(drivers.get(1).and_then(|d| d.broadcast_name.as_deref()), Some("VER"));
    }

    #[test]
    fn partial_updates_keep_known_fields() {
        let mut drivers = DriverProcessor::new();
        drivers.apply_update(
            &Topic::DriverList,
            &driver_list(json!({"16": {"Tla": "LEC", "TeamName": "Ferrari", "Line": 3}})),
        );
        drivers.apply_update(&Topic::DriverList, &driver_list(json!({"16": {"Line": 1}})));

        let lec = drivers.get(16).expect("driver 16");
        assert_eq!(lec.line, Some(1));
        assert_eq!(lec.team_name.as_deref(), Some("Ferrari"));
        assert_eq!(lec.name_acronym.as_deref(), Some("LEC"));
    }

    #[test]
    fn grid_positions_from_timing_app_data() {
        let mut drivers = DriverProcessor::new();
        let payload = Payload::from_value(
            &Topic::TimingAppData,
            json!({"Lines": {"81": {"GridPos": "3"}, "4": {"Stints": []}}}),
        );

        assert_eq!(drivers.apply_update(&Topic::TimingAppData, &payload), MergeOutcome::Applied { entities: 1 });
        assert_eq!(drivers.get(81).and_then(|d| d.grid_position), Some(3));
        assert!(drivers.get(4).is_none());
    }

    #[test]
    fn team_lookup_ignores_case() {
        let mut drivers = DriverProcessor::new();
        drivers.apply_update(
            &Topic::DriverList,
            &driver_list(json!({
                "16": {"TeamName": "Ferrari"},
                "44": {"TeamName": "Ferrari"},
                "4": {"TeamName": "McLaren"}
            })),
        );

        let ferrari: Vec<_> = drivers.by_team("FERRARI").iter().map(|d| d.driver_number).collect();
        assert_eq!(ferrari, vec![16, 44]);
        assert!(drivers.by_team("Williams").is_empty());
    }

    #[test]
    fn unrelated_payloads_are_ignored() {
        let mut drivers = DriverProcessor::new();
        let payload = Payload::from_value(&Topic::WeatherData, json!({"AirTemp": "20"}));
        assert_eq!(drivers.apply_update(&Topic::WeatherData, &payload), MergeOutcome::Ignored);
        assert!(drivers.is_empty());
    }
}
