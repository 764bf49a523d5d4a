//! Offline comparison of two historical laps
//!
//! Both traces are resampled once onto a shared fixed-rate clock
//! ([`resample`]); during playback the second lap is projected against the
//! first using the live gap between the cars ([`project_frame`]). Everything
//! here is pure apart from [`ReplayClock`], which only paces frame indices.
//!
//! ```rust
//! use pitlane::replay::ReplayPlayer;
//! use pitlane::types::TelemetrySample;
//!
//! let lap = |speed: f64| vec![
//!     TelemetrySample { time: 0.0, speed, ..Default::default() },
//!     TelemetrySample { time: 2.0, speed: speed * 2.0, ..Default::default() },
//! ];
//! let player = ReplayPlayer::load(&lap(100.0), &lap(90.0), 2.0, 2.0, 1.0);
//! assert_eq!(player.total_frames(), 2);
//!
//! let pair = player.frame_pair(1, 0.0).unwrap();
//! assert_eq!(pair.lead.speed, 150.0);
//! ```

mod player;
mod resample;
mod sync;

pub use player::{FramePair, ReplayClock, ReplayPlayer, SPEED_RANGE};
pub use resample::{MAX_TOTAL_FRAMES, resample};
pub use sync::{avg_duration_per_frame, project_frame};

/// Frame rate used by the replay view.
pub const DEFAULT_FIXED_RATE: f64 = 60.0;
