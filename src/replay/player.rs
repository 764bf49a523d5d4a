//! Replay playback: synchronized frame pairs and a pacing clock

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info};

use super::resample::resample;
use super::sync::{avg_duration_per_frame, project_frame};
use crate::types::{ResampledTrace, TelemetrySample};

/// Slowest and fastest playback multipliers.
pub const SPEED_RANGE: (f64, f64) = (0.1, 10.0);

/// One rendered replay frame: the leading sample and its synchronized partner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePair {
    pub lead_frame: usize,
    pub lagging_frame: usize,
    pub lead: TelemetrySample,
    pub lagging: TelemetrySample,
}

/// Two laps resampled once, ready for scrubbing.
///
/// The first trace leads; the second is projected against it with the gap
/// supplied per frame.
#[derive(Debug, Clone)]
pub struct ReplayPlayer {
    trace: Arc<ResampledTrace>,
    avg_duration_per_frame: f64,
}

impl ReplayPlayer {
    /// Resample both laps and compute the average frame duration.
    pub fn load(
        first: &[TelemetrySample],
        second: &[TelemetrySample],
        duration_a: f64,
        duration_b: f64,
        fixed_rate: f64,
    ) -> Self {
        let trace = resample(first, second, duration_a, duration_b, fixed_rate);
        let avg = avg_duration_per_frame(duration_a, duration_b, trace.total_frames);
        info!(
            total_frames = trace.total_frames,
            fixed_rate,
            avg_duration_per_frame = avg,
            "Replay loaded"
        );
        Self { trace: Arc::new(trace), avg_duration_per_frame: avg }
    }

    pub fn trace(&self) -> &ResampledTrace {
        &self.trace
    }

    pub fn total_frames(&self) -> usize {
        self.trace.total_frames
    }

    pub fn avg_duration_per_frame(&self) -> f64 {
        self.avg_duration_per_frame
    }

    /// Lead sample at `lead_frame` and the lagging sample `gap` seconds behind it.
    ///
    /// Returns `None` when `lead_frame` is past the end of the trace.
    pub fn frame_pair(&self, lead_frame: usize, gap: f64) -> Option<FramePair> {
        let lead = *self.trace.first.get(lead_frame)?;
        let lagging_frame = project_frame(lead_frame, gap, self.trace.total_frames, self.avg_duration_per_frame);
        let lagging = *self.trace.second.get(lagging_frame)?;
        Some(FramePair { lead_frame, lagging_frame, lead, lagging })
    }

    /// Clock pacing this replay's frames in real time.
    pub fn clock(&self) -> ReplayClock {
        ReplayClock::new(self.trace.fixed_rate, self.trace.total_frames)
    }
}

/// Paces frame indices at `fixed_rate * speed` frames per second.
///
/// Independent of the resampler: it only knows the frame count and rate.
#[derive(Debug)]
pub struct ReplayClock {
    fixed_rate: f64,
    total_frames: usize,
    frame: usize,
    speed: f64,
    paused: bool,
    /// Created on first tick so the clock can be built outside a runtime
    interval: Option<Interval>,
}

impl ReplayClock {
    pub fn new(fixed_rate: f64, total_frames: usize) -> Self {
        Self { fixed_rate, total_frames, frame: 0, speed: 1.0, paused: false, interval: None }
    }

    /// Set playback speed
    pub fn set_speed(&mut self, speed: f64) {
        let (min, max) = SPEED_RANGE;
        self.speed = if speed.is_nan() { 1.0 } else { speed.clamp(min, max) };
        // New period applies from the next tick
        self.interval = None;
        debug!("Playback speed set to {}x", self.speed);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Jump to `frame`, clamped to the last frame. Returns the new position.
    pub fn seek(&mut self, frame: usize) -> usize {
        self.frame = frame.min(self.total_frames.saturating_sub(1));
        debug!(frame = self.frame, "Seek");
        self.frame
    }

    /// Frame the next tick will yield.
    pub fn position(&self) -> usize {
        self.frame
    }

    /// Trace time of the current position, in seconds.
    pub fn current_time(&self) -> f64 {
        if self.fixed_rate > 0.0 { self.frame as f64 / self.fixed_rate } else { 0.0 }
    }

    pub fn is_finished(&self) -> bool {
        self.frame >= self.total_frames
    }

    /// Wait for the next frame boundary and return the frame to render.
    ///
    /// While paused the same frame is returned on every tick. Returns `None`
    /// once the last frame has been played.
    pub async fn tick(&mut self) -> Option<usize> {
        if self.is_finished() {
            return None;
        }

        let period = self.frame_period();
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;

        let frame = self.frame;
        if !self.paused {
            self.frame += 1;
        }
        Some(frame)
    }

    /// Consume the clock as a stream of frame indices.
    pub fn into_stream(self) -> BoxStream<'static, usize> {
        stream::unfold(self, |mut clock| async move {
            let frame = clock.tick().await?;
            Some((frame, clock))
        })
        .boxed()
    }

    fn frame_period(&self) -> Duration {
        let hz = self.fixed_rate * self.speed;
        if hz.is_finite() && hz > 0.0 {
            Duration::from_secs_f64(1.0 / hz)
        } else {
            Duration::from_secs(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn lap(duration: f64, top_speed: f64) -> Vec<TelemetrySample> {
        (0..=10)
            .map(|i| {
                let time = duration * i as f64 / 10.0;
                TelemetrySample { time, speed: top_speed * i as f64 / 10.0, x: i as f64, ..TelemetrySample::default() }
            })
            .collect()
    }

    #[test]
    fn frame_pair_projects_the_second_lap() {
        let player = ReplayPlayer::load(&lap(90.0, 300.0), &lap(91.0, 290.0), 90.0, 91.0, 60.0);
        assert_eq!(player.total_frames(), 5460);
        assert!((player.avg_duration_per_frame() - 181.0 / 10920.0).abs() < 1e-12);

        let pair = player.frame_pair(1000, 0.5).expect("inside trace");
        assert_eq!(pair.lead_frame, 1000);
        assert_eq!(pair.lagging_frame, 970);
        assert_eq!(pair.lead, player.trace().first[1000]);
        assert_eq!(pair.lagging, player.trace().second[970]);

        assert!(player.frame_pair(5460, 0.0).is_none());
        assert_eq!(player.frame_pair(0, 10.0).map(|p| p.lagging_frame), Some(0));
    }

    #[test]
    fn empty_replay_has_no_frames() {
        let player = ReplayPlayer::load(&[], &[], 90.0, 91.0, 60.0);
        assert_eq!(player.total_frames(), 0);
        assert!(player.frame_pair(0, 0.0).is_none());
        assert!(player.clock().is_finished());
    }

    #[test]
    fn speed_is_clamped() {
        let mut clock = ReplayClock::new(60.0, 100);
        clock.set_speed(25.0);
        assert_eq!(clock.speed(), 10.0);
        clock.set_speed(0.0);
        assert_eq!(clock.speed(), 0.1);
        clock.set_speed(f64::NAN);
        assert_eq!(clock.speed(), 1.0);
    }

    #[test]
    fn seek_clamps_to_last_frame() {
        let mut clock = ReplayClock::new(60.0, 100);
        assert_eq!(clock.seek(30), 30);
        assert_eq!(clock.current_time(), 0.5);
        assert_eq!(clock.seek(1000), 99);
        assert!(!clock.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_rate_times_speed() {
        let mut clock = ReplayClock::new(10.0, 100);
        clock.set_speed(2.0);

        let start = Instant::now();
        for expected in 0..5 {
            assert_eq!(clock.tick().await, Some(expected));
        }
        // First tick is immediate, then 50 ms apart
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_the_frame() {
        let mut clock = ReplayClock::new(60.0, 10);
        assert_eq!(clock.tick().await, Some(0));
        clock.pause();
        assert_eq!(clock.tick().await, Some(1));
        assert_eq!(clock.tick().await, Some(1));
        clock.resume();
        assert_eq!(clock.tick().await, Some(1));
        assert_eq!(clock.tick().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_ends_after_last_frame() {
        let mut clock = ReplayClock::new(60.0, 4);
        clock.seek(1);
        let frames: Vec<usize> = clock.into_stream().collect().await;
        assert_eq!(frames, vec![1, 2, 3]);
    }
}
