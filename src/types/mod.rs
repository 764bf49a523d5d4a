//! Core types for the live timing feed and replay traces.
//!
//! ## Architecture
//!
//! The types follow the data flow of the crate:
//! - [`Topic`] names a feed topic; compressed wire names resolve to the plain variant
//! - [`Payload`] is the typed decode of one topic, with explicit passthrough and corrupt variants
//! - [`Frame`] is one decoded inbound message (snapshot, update batch or keep-alive)
//! - [`DriverRecord`], [`PositionRecord`], [`TimingRecord`] and [`SessionSummary`] are the
//!   durable per-driver state merged by the processors
//! - [`TimingSnapshot`] is the consolidated, ordered view handed to consumers
//! - [`TelemetrySample`] and [`ResampledTrace`] feed the replay engine
//!
//! ## Usage Example
//!
//! ```rust
//! use pitlane::types::{Payload, Topic};
//! use serde_json::json;
//!
//! let payload = Payload::from_value(
//!     &Topic::from_wire("TimingData"),
//!     json!({ "Lines": { "1": { "Position": "1" } } }),
//! );
//! let Payload::TimingData(data) = payload else { unreachable!() };
//! assert_eq!(data.lines[&1].position, Some(1));
//! ```

mod frame;
mod payload;
mod records;
mod snapshot;
mod telemetry;
mod topic;
mod update_rate;

pub use frame::{Frame, TopicMessage};
pub use payload::{
    CircuitInfo, CountryInfo, DriverListEntry, DriverListPayload, DriverNumber, LapCountPayload,
    MeetingInfo, Payload, PositionBatch, PositionEntry, PositionPayload, SessionInfoPayload,
    SpeedTrapsField, TimingAppDataPayload, TimingAppLine, TimingDataPayload, TimingLine,
    TrackStatusPayload, ValueField,
};
pub use records::{
    DriverRecord, PositionRecord, RunningStatus, SessionSummary, SpeedTraps, TimingRecord,
    TrackLocation, lap_time_millis,
};
pub use snapshot::TimingSnapshot;
pub use telemetry::{ResampledTrace, TelemetrySample};
pub use topic::{COMPRESSED_SUFFIX, Topic, is_compressed};
pub use update_rate::UpdateRate;
