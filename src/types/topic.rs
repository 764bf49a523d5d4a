//! Feed topic names

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix marking a base64 + deflate compressed topic on the wire.
pub const COMPRESSED_SUFFIX: &str = ".z";

/// Closed set of topics published by the live timing hub.
///
/// Compressed wire names (`CarData.z`, `Position.z`) resolve to the same
/// variant as their plain form. Anything else lands in [`Topic::Unknown`]
/// so new feed topics never break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Topic {
    Heartbeat,
    CarData,
    Position,
    ExtrapolatedClock,
    TopThree,
    TimingStats,
    TimingAppData,
    WeatherData,
    TrackStatus,
    DriverList,
    RaceControlMessages,
    SessionInfo,
    SessionData,
    LapCount,
    TimingData,
    TyreStintSeries,
    PitStopSeries,
    TeamRadio,
    Unknown(String),
}

impl Topic {
    /// Resolve a wire topic name, ignoring the compression suffix.
    pub fn from_wire(name: &str) -> Self {
        match name.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(name) {
            "Heartbeat" => Topic::Heartbeat,
            "CarData" => Topic::CarData,
            "Position" => Topic::Position,
            "ExtrapolatedClock" => Topic::ExtrapolatedClock,
            "TopThree" => Topic::TopThree,
            "TimingStats" => Topic::TimingStats,
            "TimingAppData" => Topic::TimingAppData,
            "WeatherData" => Topic::WeatherData,
            "TrackStatus" => Topic::TrackStatus,
            "DriverList" => Topic::DriverList,
            "RaceControlMessages" => Topic::RaceControlMessages,
            "SessionInfo" => Topic::SessionInfo,
            "SessionData" => Topic::SessionData,
            "LapCount" => Topic::LapCount,
            "TimingData" => Topic::TimingData,
            "TyreStintSeries" => Topic::TyreStintSeries,
            "PitStopSeries" => Topic::PitStopSeries,
            "TeamRadio" => Topic::TeamRadio,
            other => Topic::Unknown(other.to_string()),
        }
    }

    /// Plain topic name, without compression suffix.
    pub fn as_str(&self) -> &str {
        match self {
            Topic::Heartbeat => "Heartbeat",
            Topic::CarData => "CarData",
            Topic::Position => "Position",
            Topic::ExtrapolatedClock => "ExtrapolatedClock",
            Topic::TopThree => "TopThree",
            Topic::TimingStats => "TimingStats",
            Topic::TimingAppData => "TimingAppData",
            Topic::WeatherData => "WeatherData",
            Topic::TrackStatus => "TrackStatus",
            Topic::DriverList => "DriverList",
            Topic::RaceControlMessages => "RaceControlMessages",
            Topic::SessionInfo => "SessionInfo",
            Topic::SessionData => "SessionData",
            Topic::LapCount => "LapCount",
            Topic::TimingData => "TimingData",
            Topic::TyreStintSeries => "TyreStintSeries",
            Topic::PitStopSeries => "PitStopSeries",
            Topic::TeamRadio => "TeamRadio",
            Topic::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Topic::Unknown(_))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a wire field name carries a compressed payload.
pub fn is_compressed(name: &str) -> bool {
    name.ends_with(COMPRESSED_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_names_resolve_to_plain_topic() {
        assert_eq!(Topic::from_wire("Position.z"), Topic::Position);
        assert_eq!(Topic::from_wire("CarData.z"), Topic::CarData);
        assert_eq!(Topic::from_wire("Position"), Topic::Position);
        assert!(is_compressed("CarData.z"));
        assert!(!is_compressed("TimingData"));
    }

    #[test]
    fn unknown_topics_round_trip_their_name() {
        let topic = Topic::from_wire("ChampionshipPrediction");
        assert_eq!(topic, Topic::Unknown("ChampionshipPrediction".to_string()));
        assert_eq!(topic.as_str(), "ChampionshipPrediction");
        assert!(!topic.is_known());
    }

    #[test]
    fn every_known_topic_resolves_from_its_name() {
        for name in crate::session::DEFAULT_TOPICS {
            let topic = Topic::from_wire(name);
            assert!(topic.is_known(), "{name} should be a known topic");
            assert_eq!(topic.as_str(), name.trim_end_matches(COMPRESSED_SUFFIX));
        }
    }
}
