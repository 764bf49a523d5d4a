//! Gap-based frame projection between two resampled traces

/// Average trace time covered by one frame, computed once per replay load.
///
/// Returns `0.0` when there are no frames.
pub fn avg_duration_per_frame(duration_a: f64, duration_b: f64, total_frames: usize) -> f64 {
    if total_frames == 0 {
        return 0.0;
    }
    (duration_a + duration_b) / (2.0 * total_frames as f64)
}

/// Frame of the lagging trace matching `lead_frame` of the leading trace.
///
/// The gap (seconds) is converted to a frame offset with the average frame
/// duration. The result is always inside `[0, total_frames - 1]`; with no
/// frames it is `0`.
pub fn project_frame(lead_frame: usize, current_gap: f64, total_frames: usize, avg_duration_per_frame: f64) -> usize {
    let Some(last) = total_frames.checked_sub(1) else {
        return 0;
    };

    let offset = if avg_duration_per_frame > 0.0 && current_gap.is_finite() {
        (current_gap / avg_duration_per_frame).round()
    } else {
        0.0
    };

    // Clamp in float space; huge offsets must not wrap
    let projected = lead_frame as f64 - offset;
    projected.clamp(0.0, last as f64) as usize
}
