//! Fixed-rate resampling of two lap traces

use tracing::{debug, warn};

use crate::types::{ResampledTrace, TelemetrySample};

/// Upper bound on frames per trace; a day of data at 100 Hz.
pub const MAX_TOTAL_FRAMES: usize = 8_640_000;

/// Resample two irregular traces onto one `fixed_rate` frame clock.
///
/// Produces `ceil(max(duration_a, duration_b) * fixed_rate)` frames per trace,
/// frame `i` sitting at exactly `i / fixed_rate` seconds. Targets outside a
/// trace's sampled range take the first (or last) sample unchanged apart from
/// its time. Empty traces, non-positive rates, non-finite durations and
/// clocks longer than [`MAX_TOTAL_FRAMES`] yield an empty trace.
pub fn resample(
    first: &[TelemetrySample],
    second: &[TelemetrySample],
    duration_a: f64,
    duration_b: f64,
    fixed_rate: f64,
) -> ResampledTrace {
    let duration = duration_a.max(duration_b);
    if first.is_empty() || second.is_empty() || !duration.is_finite() || duration <= 0.0 {
        warn!(
            first = first.len(),
            second = second.len(),
            duration,
            "Nothing to resample"
        );
        return ResampledTrace { fixed_rate, ..ResampledTrace::default() };
    }
    if !fixed_rate.is_finite() || fixed_rate <= 0.0 {
        warn!(fixed_rate, "Invalid resample rate");
        return ResampledTrace { duration, ..ResampledTrace::default() };
    }

    let frames = (duration * fixed_rate).ceil();
    if !frames.is_finite() || frames > MAX_TOTAL_FRAMES as f64 {
        warn!(duration, fixed_rate, frames, max = MAX_TOTAL_FRAMES, "Replay clock too long to resample");
        return ResampledTrace { fixed_rate, duration, ..ResampledTrace::default() };
    }
    let total_frames = frames as usize;
    let mut cursor_a = Cursor::new(first);
    let mut cursor_b = Cursor::new(second);
    let mut out_a = Vec::with_capacity(total_frames);
    let mut out_b = Vec::with_capacity(total_frames);

    for frame in 0..total_frames {
        let time = frame as f64 / fixed_rate;
        out_a.push(cursor_a.sample_at(time));
        out_b.push(cursor_b.sample_at(time));
    }

    debug!(
        first = first.len(),
        second = second.len(),
        total_frames,
        fixed_rate,
        "Traces resampled"
    );

    ResampledTrace { first: out_a, second: out_b, fixed_rate, total_frames, duration }
}

/// Forward-only bracketing search over one trace.
///
/// Target times must be non-decreasing between calls.
struct Cursor<'a> {
    samples: &'a [TelemetrySample],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn new(samples: &'a [TelemetrySample]) -> Self {
        Self { samples, index: 0 }
    }

    fn sample_at(&mut self, time: f64) -> TelemetrySample {
        let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) else {
            return TelemetrySample { time, ..TelemetrySample::default() };
        };
        if time <= first.time {
            return TelemetrySample { time, ..*first };
        }
        if time >= last.time {
            return TelemetrySample { time, ..*last };
        }

        while self.index + 1 < self.samples.len() && self.samples[self.index + 1].time <= time {
            self.index += 1;
        }
        let before = &self.samples[self.index];
        let after = &self.samples[(self.index + 1).min(self.samples.len() - 1)];
        interpolate(before, after, time)
    }
}

fn interpolate(before: &TelemetrySample, after: &TelemetrySample, time: f64) -> TelemetrySample {
    let span = after.time - before.time;
    if span <= 0.0 {
        return TelemetrySample { time, ..*before };
    }

    let ratio = (time - before.time) / span;
    let lerp = |a: f64, b: f64| a + (b - a) * ratio;
    let past_midpoint = ratio >= 0.5;

    TelemetrySample {
        x: lerp(before.x, after.x),
        y: lerp(before.y, after.y),
        speed: lerp(before.speed, after.speed),
        throttle: lerp(before.throttle, after.throttle),
        brake: if past_midpoint { after.brake } else { before.brake },
        gear: lerp(f64::from(before.gear), f64::from(after.gear)).round() as i32,
        drs: if past_midpoint { after.drs } else { before.drs },
        time,
    }
}
