//! Decoded wire frames

use super::{Payload, Topic};
use crate::error::FieldDecodeError;

/// One `(topic, payload, timestamp)` triple out of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessage {
    pub topic: Topic,
    pub payload: Payload,
    /// Feed timestamp, present on streaming updates only
    pub timestamp: Option<String>,
}

impl TopicMessage {
    pub fn new(topic: Topic, payload: Payload, timestamp: Option<String>) -> Self {
        Self { topic, payload, timestamp }
    }
}

/// A single decoded inbound message.
///
/// Frames are ephemeral: they live for one dispatch cycle of the
/// orchestrator and are dropped afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Initial state, one message per topic
    Snapshot(Vec<TopicMessage>),
    /// Streaming diffs in arrival order
    Update(Vec<TopicMessage>),
    /// Empty keep-alive or protocol bookkeeping message
    KeepAlive,
}

impl Frame {
    pub fn messages(&self) -> &[TopicMessage] {
        match self {
            Frame::Snapshot(messages) | Frame::Update(messages) => messages,
            Frame::KeepAlive => &[],
        }
    }

    pub fn is_keep_alive(&self) -> bool {
        matches!(self, Frame::KeepAlive)
    }

    /// Per-topic decode failures isolated inside this frame.
    pub fn decode_errors(&self) -> impl Iterator<Item = &FieldDecodeError> {
        self.messages().iter().filter_map(|m| m.payload.decode_error())
    }
}
