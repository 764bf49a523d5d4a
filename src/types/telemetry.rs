//! Replay telemetry samples

use serde::{Deserialize, Serialize};

/// One telemetry sample of a historical lap trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TelemetrySample {
    pub x: f64,
    pub y: f64,
    /// km/h
    pub speed: f64,
    /// 0-100 %
    pub throttle: f64,
    pub brake: bool,
    pub gear: i32,
    /// Raw DRS channel value
    pub drs: i32,
    /// Seconds since the start of the trace
    pub time: f64,
}

/// Two traces resampled onto one fixed-rate frame clock.
///
/// `first[i].time == second[i].time == i / fixed_rate` for every frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ResampledTrace {
    pub first: Vec<TelemetrySample>,
    pub second: Vec<TelemetrySample>,
    pub fixed_rate: f64,
    pub total_frames: usize,
    /// Longer of the two nominal durations, in seconds
    pub duration: f64,
}

impl ResampledTrace {
    pub fn is_empty(&self) -> bool {
        self.total_frames == 0
    }

    /// Both samples for one frame.
    pub fn frame(&self, index: usize) -> Option<(&TelemetrySample, &TelemetrySample)> {
        Some((self.first.get(index)?, self.second.get(index)?))
    }
}
