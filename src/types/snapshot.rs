//! Consolidated consumer-facing snapshot

use serde::{Deserialize, Serialize};

use super::{DriverNumber, DriverRecord, PositionRecord, SessionSummary, TimingRecord};

/// Immutable view over every processor, assembled after each dispatched frame.
///
/// Drivers and timing are ordered by racing number; positions are ordered by
/// rank with unranked cars last. Two snapshots taken with no frame in between
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TimingSnapshot {
    pub drivers: Vec<DriverRecord>,
    pub positions: Vec<PositionRecord>,
    pub timing: Vec<TimingRecord>,
    pub session: Option<SessionSummary>,
}

impl TimingSnapshot {
    pub fn driver(&self, number: DriverNumber) -> Option<&DriverRecord> {
        self.drivers.iter().find(|d| d.driver_number == number)
    }

    pub fn position(&self, number: DriverNumber) -> Option<&PositionRecord> {
        self.positions.iter().find(|p| p.driver_number == number)
    }

    pub fn timing(&self, number: DriverNumber) -> Option<&TimingRecord> {
        self.timing.iter().find(|t| t.driver_number == number)
    }

    /// Car currently classified first, if any.
    pub fn leader(&self) -> Option<&PositionRecord> {
        self.positions.first().filter(|p| p.position == Some(1))
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty() && self.positions.is_empty() && self.timing.is_empty()
    }
}
