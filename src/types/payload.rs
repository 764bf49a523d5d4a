//! Typed topic payloads
//!
//! The feed sends loosely typed JSON: numbers arrive as strings, sector
//! lists arrive as arrays in snapshots and as index-keyed objects in diffs,
//! and keyed maps sometimes carry bookkeeping keys such as `_kf`. Every
//! shape is normalised here so processors only ever see typed, optional
//! fields. A field that is absent (or `null`) on the wire is `None`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::Topic;
use crate::error::FieldDecodeError;

/// Stable entity identifier (the car's racing number).
pub type DriverNumber = u32;

/// Decoded payload of one topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    DriverList(DriverListPayload),
    TimingData(TimingDataPayload),
    TimingAppData(TimingAppDataPayload),
    Position(PositionPayload),
    SessionInfo(SessionInfoPayload),
    TrackStatus(TrackStatusPayload),
    LapCount(LapCountPayload),
    /// Known or unknown topic with no typed shape; carried verbatim
    Passthrough(Value),
    /// The field could not be decoded; the raw wire value is kept for inspection
    Corrupt { raw: Value, error: FieldDecodeError },
}

impl Payload {
    /// Decode a JSON value into the typed shape registered for `topic`.
    ///
    /// Shape mismatches never fail the frame; they produce [`Payload::Corrupt`].
    pub fn from_value(topic: &Topic, value: Value) -> Self {
        match topic {
            Topic::DriverList => typed(topic, value, Payload::DriverList),
            Topic::TimingData => typed(topic, value, Payload::TimingData),
            Topic::TimingAppData => typed(topic, value, Payload::TimingAppData),
            Topic::Position => typed(topic, value, Payload::Position),
            Topic::SessionInfo => typed(topic, value, Payload::SessionInfo),
            Topic::TrackStatus => typed(topic, value, Payload::TrackStatus),
            Topic::LapCount => typed(topic, value, Payload::LapCount),
            _ => Payload::Passthrough(value),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Payload::Corrupt { .. })
    }

    pub fn decode_error(&self) -> Option<&FieldDecodeError> {
        match self {
            Payload::Corrupt { error, .. } => Some(error),
            _ => None,
        }
    }
}

fn typed<T, F>(topic: &Topic, value: Value, wrap: F) -> Payload
where
    T: DeserializeOwned,
    F: FnOnce(T) -> Payload,
{
    match T::deserialize(&value) {
        Ok(decoded) => wrap(decoded),
        Err(e) => Payload::Corrupt {
            raw: value,
            error: FieldDecodeError::new(topic.as_str(), e.to_string()),
        },
    }
}

/// `DriverList`: racing number -> roster entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DriverListPayload(#[serde(deserialize_with = "numbered")] pub BTreeMap<DriverNumber, DriverListEntry>);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DriverListEntry {
    #[serde(deserialize_with = "lenient_string")]
    pub racing_number: Option<String>,
    pub broadcast_name: Option<String>,
    pub full_name: Option<String>,
    pub tla: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub line: Option<u32>,
    pub team_name: Option<String>,
    pub team_colour: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country_code: Option<String>,
    pub headshot_url: Option<String>,
}

/// `TimingData`: per-driver timing lines.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TimingDataPayload {
    #[serde(deserialize_with = "numbered")]
    pub lines: BTreeMap<DriverNumber, TimingLine>,
    pub withheld: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TimingLine {
    #[serde(deserialize_with = "lenient_u32")]
    pub position: Option<u32>,
    #[serde(deserialize_with = "lenient_string")]
    pub gap_to_leader: Option<String>,
    pub interval_to_position_ahead: Option<ValueField>,
    pub knocked_out: Option<bool>,
    pub retired: Option<bool>,
    pub stopped: Option<bool>,
    pub in_pit: Option<bool>,
    pub pit_out: Option<bool>,
    pub last_lap_time: Option<ValueField>,
    pub best_lap_time: Option<ValueField>,
    #[serde(deserialize_with = "lenient_u32")]
    pub number_of_laps: Option<u32>,
    #[serde(deserialize_with = "indexed")]
    pub sectors: BTreeMap<usize, ValueField>,
    pub speeds: Option<SpeedTrapsField>,
}

/// `{ "Value": .., "PreviousValue": .. }` wrapper used across timing topics.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ValueField {
    #[serde(deserialize_with = "lenient_string")]
    pub value: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub previous_value: Option<String>,
}

impl ValueField {
    /// Non-empty `Value`.
    pub fn current(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Non-empty `Value`, else non-empty `PreviousValue`.
    pub fn current_or_previous(&self) -> Option<&str> {
        self.current().or_else(|| self.previous_value.as_deref().filter(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeedTrapsField {
    #[serde(rename = "I1")]
    pub i1: Option<ValueField>,
    #[serde(rename = "I2")]
    pub i2: Option<ValueField>,
    #[serde(rename = "FL")]
    pub fl: Option<ValueField>,
    #[serde(rename = "ST")]
    pub st: Option<ValueField>,
}

/// `TimingAppData`: per-driver app lines (grid slot, stints).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TimingAppDataPayload {
    #[serde(deserialize_with = "numbered")]
    pub lines: BTreeMap<DriverNumber, TimingAppLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TimingAppLine {
    #[serde(deserialize_with = "lenient_u32")]
    pub grid_pos: Option<u32>,
}

/// `Position` (usually `Position.z`): batches of car locations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PositionPayload {
    pub position: Vec<PositionBatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PositionBatch {
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "numbered")]
    pub entries: BTreeMap<DriverNumber, PositionEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PositionEntry {
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "X")]
    pub x: Option<f64>,
    #[serde(rename = "Y")]
    pub y: Option<f64>,
    #[serde(rename = "Z")]
    pub z: Option<f64>,
}

/// `SessionInfo`: meeting and session metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SessionInfoPayload {
    #[serde(deserialize_with = "lenient_u32")]
    pub key: Option<u32>,
    pub name: Option<String>,
    #[serde(rename = "Type")]
    pub session_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub gmt_offset: Option<String>,
    pub session_status: Option<String>,
    pub meeting: Option<MeetingInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeetingInfo {
    #[serde(deserialize_with = "lenient_u32")]
    pub key: Option<u32>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub country: Option<CountryInfo>,
    pub circuit: Option<CircuitInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CountryInfo {
    pub name: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CircuitInfo {
    #[serde(deserialize_with = "lenient_u32")]
    pub key: Option<u32>,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TrackStatusPayload {
    #[serde(deserialize_with = "lenient_string")]
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LapCountPayload {
    #[serde(deserialize_with = "lenient_u32")]
    pub current_lap: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub total_laps: Option<u32>,
}

/// Accept a number or a numeric string; anything else becomes `None`.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Accept a string or a number rendered as a string.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

/// Map keyed by racing number; non-numeric keys and malformed entries are skipped.
fn numbered<'de, D, T>(deserializer: D) -> Result<BTreeMap<DriverNumber, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let number = key.trim().parse::<DriverNumber>().ok()?;
            T::deserialize(value).ok().map(|entry| (number, entry))
        })
        .collect())
}

/// List (snapshot form) or index-keyed object (diff form).
fn indexed<'de, D, T>(deserializer: D) -> Result<BTreeMap<usize, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Indexed {
        List(Vec<Value>),
        Map(BTreeMap<String, Value>),
    }

    let entries: Vec<(usize, Value)> = match Option::<Indexed>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Indexed::List(items)) => items.into_iter().enumerate().collect(),
        Some(Indexed::Map(map)) => map
            .into_iter()
            .filter_map(|(key, value)| key.trim().parse().ok().map(|idx| (idx, value)))
            .collect(),
    };

    Ok(entries
        .into_iter()
        .filter_map(|(idx, value)| T::deserialize(value).ok().map(|entry| (idx, entry)))
        .collect())
}
