//! Error types for the live timing client.
//!
//! This module provides the error taxonomy for the whole crate. All errors
//! implement `std::error::Error` and carry enough context to decide whether
//! an operation can be retried.
//!
//! ## Error Categories
//!
//! - **Negotiation Errors**: The intermediary refused or garbled the handshake
//! - **Transport Errors**: The WebSocket link failed or dropped
//! - **Reconnect Exhaustion**: The bounded backoff gave up (terminal)
//! - **Codec Errors**: A whole inbound frame could not be parsed
//! - **Field Decode Errors**: One topic inside a frame could not be decoded
//! - **Configuration Errors**: Invalid or unreadable configuration
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use pitlane::TimingError;
//!
//! let error = TimingError::transport_failed("socket reset by peer");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```
//!
//! An update for a topic no processor is registered for is *not* an error;
//! processors report it as [`MergeOutcome::Ignored`](crate::processors::MergeOutcome).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for live timing operations.
pub type Result<T, E = TimingError> = std::result::Result<T, E>;

/// A single topic inside an otherwise valid frame failed to decode.
///
/// Carried inside [`Payload::Corrupt`](crate::types::Payload::Corrupt) so the
/// orchestrator can skip just that topic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to decode topic '{topic}': {reason}")]
pub struct FieldDecodeError {
    pub topic: String,
    pub reason: String,
}

impl FieldDecodeError {
    pub fn new(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { topic: topic.into(), reason: reason.into() }
    }
}

/// Main error type for live timing operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TimingError {
    #[error("Session negotiation failed: {reason}")]
    Negotiation {
        reason: String,
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Transport is not open (state: {state})")]
    NotConnected { state: String },

    #[error("Frame decode error in {context}: {details}")]
    Codec { context: String, details: String },

    #[error(transparent)]
    FieldDecode(#[from] FieldDecodeError),

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl TimingError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TimingError::Negotiation { status, .. } => !matches!(status, Some(400..=499)),
            TimingError::Transport { .. } => true,
            TimingError::NotConnected { .. } => true,
            TimingError::Timeout { .. } => true,
            TimingError::ReconnectExhausted { .. } => false,
            TimingError::Codec { .. } => false,
            TimingError::FieldDecode(_) => false,
            TimingError::Config { .. } => false,
            TimingError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TimingError::Negotiation { .. } => vec![
                "Check the intermediary backend is reachable",
                "Verify the configured negotiate path",
                "Retry negotiation once the upstream feed is online",
            ],
            TimingError::Transport { .. } => vec![
                "Check network connectivity to the feed endpoint",
                "Negotiate a fresh session token",
            ],
            TimingError::ReconnectExhausted { .. } => vec![
                "Start a new session from scratch",
                "Increase reconnect.max_attempts or reconnect.base_delay_ms",
                "Check whether the live session has ended",
            ],
            TimingError::NotConnected { .. } => vec![
                "Wait for the transport to reach the Open state",
                "Call connect before sending",
            ],
            TimingError::Codec { .. } => vec![
                "Verify the feed protocol version",
                "Capture the raw frame for inspection",
            ],
            TimingError::FieldDecode(_) => vec![
                "The topic is skipped for this frame; later frames will refresh it",
                "Capture the compressed payload for inspection",
            ],
            TimingError::Config { .. } => vec![
                "Check the configuration values",
                "Fall back to FeedConfig::default()",
            ],
            TimingError::File { .. } => vec![
                "Check the configuration file exists and is readable",
                "Check file permissions",
            ],
            TimingError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Check the intermediary backend is responding",
            ],
        }
    }

    /// Helper constructor for negotiation failures without an HTTP status.
    pub fn negotiation_failed(reason: impl Into<String>) -> Self {
        TimingError::Negotiation { reason: reason.into(), status: None, source: None }
    }

    /// Helper constructor for non-success negotiation responses.
    pub fn negotiation_status(status: u16, reason: impl Into<String>) -> Self {
        TimingError::Negotiation { reason: reason.into(), status: Some(status), source: None }
    }

    /// Helper constructor for negotiation failures with a source error.
    pub fn negotiation_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TimingError::Negotiation { reason: reason.into(), status: None, source: Some(source) }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        TimingError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TimingError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for whole-frame codec errors.
    pub fn codec_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TimingError::Codec { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(details: impl Into<String>) -> Self {
        TimingError::Config { details: details.into() }
    }
}

impl From<reqwest::Error> for TimingError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        TimingError::Negotiation {
            reason: err.to_string(),
            status,
            source: Some(Box::new(err)),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TimingError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TimingError::Transport { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}
