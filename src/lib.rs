//! Live timing client and lap replay engine for motorsport telemetry.
//!
//! Pitlane connects to a push-based live timing feed, rebuilds a consistent
//! picture of the session from snapshots and incremental diffs, and hands
//! consumers an ordered, immutable snapshot after every inbound frame. It also
//! aligns two historical laps onto one fixed-rate frame clock for side by side
//! replay.
//!
//! # Features
//!
//! - **Live Timing**: session negotiation through an intermediary, WebSocket
//!   transport with bounded exponential reconnect, compressed topic decoding
//! - **Consistent State**: per-driver processors with monotonic merges; a new
//!   session key resets everything, a reconnect resets nothing
//! - **Backpressure-free**: snapshots go through a single latest-wins slot, so a
//!   slow consumer never stalls ingestion
//! - **Replay**: pure resampling and gap-based synchronization of two laps
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pitlane::{FeedConfig, Pitlane, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> pitlane::Result<()> {
//!     let config = FeedConfig::default().with_backend_url("https://timing-proxy.example.com");
//!     let live = Pitlane::connect(config).await?;
//!
//!     let mut snapshots = live.snapshots(UpdateRate::Max(4));
//!     while let Some(snapshot) = snapshots.next().await {
//!         if let Some(leader) = snapshot.leader() {
//!             println!("P1: #{}", leader.driver_number);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod codec;
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Live path
pub mod connection;
pub mod orchestrator;
pub mod processors;
pub mod session;
pub mod stream;
pub mod transport;

// Offline replay
pub mod replay;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::FeedConfig;
pub use connection::LiveTiming;
pub use orchestrator::{Orchestrator, TimingState};
pub use replay::{ReplayClock, ReplayPlayer};
pub use session::{FeedStatus, HttpNegotiator, Negotiator, SessionDescriptor};
pub use transport::{Connector, TransportManager, TransportState, WebSocketConnector};

/// Unified entry point for live timing and replay.
///
/// # Examples
///
/// ## Live timing
/// ```rust,no_run
/// use pitlane::{FeedConfig, Pitlane};
///
/// #[tokio::main]
/// async fn main() -> pitlane::Result<()> {
///     let live = Pitlane::connect(FeedConfig::default()).await?;
///     // Use connection...
///     live.shutdown().await
/// }
/// ```
///
/// ## Lap replay
/// ```rust
/// use pitlane::{Pitlane, TelemetrySample};
///
/// let lap = vec![
///     TelemetrySample { time: 0.0, speed: 100.0, ..Default::default() },
///     TelemetrySample { time: 2.0, speed: 200.0, ..Default::default() },
/// ];
/// let player = Pitlane::replay(&lap, &lap, 2.0, 2.0);
/// assert_eq!(player.total_frames(), 120);
/// ```
pub struct Pitlane;

impl Pitlane {
    /// Negotiate a session and start streaming live timing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The intermediary refuses the negotiation or answers garbage
    /// - The first WebSocket handshake fails
    pub async fn connect(config: FeedConfig) -> Result<LiveTiming> {
        config.validate()?;
        let negotiator = HttpNegotiator::new(config.clone())?;
        let transport = TransportManager::new(WebSocketConnector, config.reconnect_policy());
        Orchestrator::start(&negotiator, transport, &config).await
    }

    /// Ask the intermediary whether the upstream feed is reachable.
    pub async fn feed_status(config: FeedConfig) -> Result<FeedStatus> {
        let negotiator = HttpNegotiator::new(config)?;
        Ok(negotiator.probe_status().await)
    }

    /// Load two laps for synchronized replay at [`replay::DEFAULT_FIXED_RATE`].
    pub fn replay(
        first: &[TelemetrySample],
        second: &[TelemetrySample],
        duration_a: f64,
        duration_b: f64,
    ) -> ReplayPlayer {
        ReplayPlayer::load(first, second, duration_a, duration_b, replay::DEFAULT_FIXED_RATE)
    }
}

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_directive` (for example `"pitlane=info"`) when
/// `RUST_LOG` is unset or invalid. Does nothing if a global subscriber is
/// already installed.
pub fn init_tracing(default_directive: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
