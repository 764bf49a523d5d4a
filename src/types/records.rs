//! Durable per-driver records held by the entity processors

use serde::{Deserialize, Serialize};

use super::DriverNumber;

/// Roster entry for one car.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DriverRecord {
    pub driver_number: DriverNumber,
    pub broadcast_name: Option<String>,
    pub full_name: Option<String>,
    pub name_acronym: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub team_name: Option<String>,
    /// Hex colour without leading `#`, as sent by the feed
    pub team_colour: Option<String>,
    pub country_code: Option<String>,
    pub headshot_url: Option<String>,
    /// Display line in the official timing tower
    pub line: Option<u32>,
    pub grid_position: Option<u32>,
}

impl DriverRecord {
    pub fn new(driver_number: DriverNumber) -> Self {
        Self { driver_number, ..Self::default() }
    }
}

/// Running state derived from the timing line flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum RunningStatus {
    Running,
    InPit,
    Stopped,
    Retired,
    KnockedOut,
}

/// Car location from the position stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TrackLocation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Race order and gaps for one car.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct PositionRecord {
    pub driver_number: DriverNumber,
    pub position: Option<u32>,
    pub gap_to_leader: Option<String>,
    pub interval: Option<String>,
    pub status: Option<RunningStatus>,
    /// `OnTrack` / `OffTrack` from the position stream
    pub track_status: Option<String>,
    pub location: Option<TrackLocation>,
}

impl PositionRecord {
    pub fn new(driver_number: DriverNumber) -> Self {
        Self { driver_number, ..Self::default() }
    }
}

/// Speed trap readings in km/h.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SpeedTraps {
    pub i1: Option<u32>,
    pub i2: Option<u32>,
    pub fl: Option<u32>,
    pub st: Option<u32>,
}

/// Lap and sector timing for one car. Times are kept in feed format (`1:23.456`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TimingRecord {
    pub driver_number: DriverNumber,
    pub last_lap_time: Option<String>,
    pub best_lap_time: Option<String>,
    pub sectors: [Option<String>; 3],
    pub number_of_laps: Option<u32>,
    pub speeds: SpeedTraps,
}

impl TimingRecord {
    pub fn new(driver_number: DriverNumber) -> Self {
        Self { driver_number, ..Self::default() }
    }
}

/// Session metadata merged from SessionInfo, TrackStatus and LapCount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SessionSummary {
    pub session_key: Option<u32>,
    pub meeting_name: Option<String>,
    pub session_name: Option<String>,
    pub session_type: Option<String>,
    pub circuit_key: Option<u32>,
    pub circuit_short_name: Option<String>,
    pub country_name: Option<String>,
    pub session_status: Option<String>,
    pub track_status: Option<String>,
    pub track_message: Option<String>,
    pub current_lap: Option<u32>,
    pub total_laps: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub gmt_offset: Option<String>,
}

/// Convert a feed lap time (`1:23.456` or `58.123`) to milliseconds.
pub fn lap_time_millis(time: &str) -> Option<u64> {
    let time = time.trim();
    let (minutes, seconds) = match time.split_once(':') {
        Some((m, s)) => (m.parse::<u64>().ok()?, s),
        None => (0, time),
    };
    let seconds: f64 = seconds.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(minutes * 60_000 + (seconds * 1000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lap_times_convert_to_millis() {
        assert_eq!(lap_time_millis("1:23.456"), Some(83_456));
        assert_eq!(lap_time_millis("58.123"), Some(58_123));
        assert_eq!(lap_time_millis(" 2:00.000 "), Some(120_000));
        assert_eq!(lap_time_millis(""), None);
        assert_eq!(lap_time_millis("1:xx"), None);
    }
}
