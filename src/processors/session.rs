//! Session metadata and the new-session signal

use tracing::{debug, info};

use super::{MergeOutcome, merge, merge_text};
use crate::types::{Payload, SessionInfoPayload, SessionSummary, Topic};

/// Merges `SessionInfo`, `TrackStatus` and `LapCount` into one [`SessionSummary`].
#[derive(Debug, Default)]
pub struct SessionProcessor {
    summary: Option<SessionSummary>,
}

impl SessionProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `payload` announces a different session than the one known.
    ///
    /// Only a `SessionInfo` carrying a key that differs from an already known
    /// key counts; the first key ever seen is not a change.
    pub fn starts_new_session(&self, payload: &Payload) -> bool {
        let Payload::SessionInfo(SessionInfoPayload { key: Some(incoming), .. }) = payload else {
            return false;
        };
        self.summary
            .as_ref()
            .and_then(|s| s.session_key)
            .is_some_and(|known| known != *incoming)
    }

    pub fn apply_update(&mut self, topic: &Topic, payload: &Payload) -> MergeOutcome {
        match payload {
            Payload::SessionInfo(info) => {
                let summary = self.summary.get_or_insert_with(SessionSummary::default);
                merge(&mut summary.session_key, info.key);
                merge_text(&mut summary.session_name, info.name.as_deref());
                merge_text(&mut summary.session_type, info.session_type.as_deref());
                merge_text(&mut summary.session_status, info.session_status.as_deref());
                merge_text(&mut summary.start_date, info.start_date.as_deref());
                merge_text(&mut summary.end_date, info.end_date.as_deref());
                merge_text(&mut summary.gmt_offset, info.gmt_offset.as_deref());
                if let Some(meeting) = &info.meeting {
                    merge_text(&mut summary.meeting_name, meeting.name.as_deref());
                    if let Some(country) = &meeting.country {
                        merge_text(&mut summary.country_name, country.name.as_deref());
                    }
                    if let Some(circuit) = &meeting.circuit {
                        merge(&mut summary.circuit_key, circuit.key);
                        merge_text(&mut summary.circuit_short_name, circuit.short_name.as_deref());
                    }
                }
                debug!(topic = %topic, key = ?summary.session_key, name = ?summary.session_name, "Session info merged");
            }
            Payload::TrackStatus(status) => {
                let summary = self.summary.get_or_insert_with(SessionSummary::default);
                merge_text(&mut summary.track_status, status.status.as_deref());
                merge_text(&mut summary.track_message, status.message.as_deref());
                debug!(status = ?summary.track_status, message = ?summary.track_message, "Track status");
            }
            Payload::LapCount(laps) => {
                let summary = self.summary.get_or_insert_with(SessionSummary::default);
                merge(&mut summary.current_lap, laps.current_lap);
                merge(&mut summary.total_laps, laps.total_laps);
            }
            _ => return MergeOutcome::Ignored,
        }
        MergeOutcome::Applied { entities: 1 }
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn clear(&mut self) {
        if let Some(key) = self.summary.as_ref().and_then(|s| s.session_key) {
            info!(previous_key = key, "Session state cleared");
        }
        self.summary = None;
    }
}
