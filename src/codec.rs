//! Frame codec for the streaming hub wire format.
//!
//! Three inbound shapes are recognised:
//!
//! - `{"R": {topic: payload, ...}}` is the one-time initial state returned by the
//!   subscription call
//! - `{"M": [{"H": hub, "M": method, "A": [topic, payload, timestamp]}, ...]}` carries
//!   streaming diffs (the tuple form `[hub, method, [topic, payload, timestamp]]` is
//!   accepted as well)
//! - anything else that parses as a JSON object (`{}`, `{"C": ..}`, `{"I": ..}`) is
//!   protocol bookkeeping and decodes to [`Frame::KeepAlive`]
//!
//! Topics whose wire name ends in `.z` carry a base64 string holding deflated JSON.
//! Those are inflated here, and the decoded payload is filed under the plain topic.
//! A field that fails to inflate becomes [`Payload::Corrupt`] while its siblings
//! decode normally.

use std::io::Read;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::error::FieldDecodeError;
use crate::types::{Frame, Payload, Topic, TopicMessage, is_compressed};
use crate::{Result, TimingError};

/// Decode one raw inbound message.
///
/// Fails only when the message is not a JSON object at all. Per-topic
/// problems are isolated inside the returned frame.
pub fn decode(raw: &[u8]) -> Result<Frame> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| TimingError::codec_error("frame", e.to_string()))?;

    let Value::Object(mut root) = value else {
        return Err(TimingError::codec_error("frame", "expected a JSON object"));
    };

    if let Some(Value::Object(initial)) = root.remove("R") {
        return Ok(Frame::Snapshot(decode_snapshot(initial)));
    }

    if let Some(Value::Array(entries)) = root.remove("M") {
        let messages: Vec<TopicMessage> = entries.into_iter().filter_map(decode_update).collect();
        if !messages.is_empty() {
            return Ok(Frame::Update(messages));
        }
    }

    Ok(Frame::KeepAlive)
}

fn decode_snapshot(initial: Map<String, Value>) -> Vec<TopicMessage> {
    initial
        .into_iter()
        .map(|(name, value)| {
            let topic = Topic::from_wire(&name);
            let payload = decode_field(&name, &topic, value);
            TopicMessage::new(topic, payload, None)
        })
        .collect()
}

fn decode_update(entry: Value) -> Option<TopicMessage> {
    let args = match entry {
        Value::Object(mut invocation) => invocation.remove("A")?,
        // [hub, method, [topic, payload, timestamp]]
        Value::Array(mut tuple) if tuple.len() == 3 => tuple.pop()?,
        other => {
            trace!(entry = %other, "Skipping unrecognised hub message");
            return None;
        }
    };

    let Value::Array(args) = args else {
        trace!("Skipping hub message without argument list");
        return None;
    };

    let mut args = args.into_iter();
    let name = match args.next()? {
        Value::String(name) => name,
        other => {
            trace!(topic = %other, "Skipping hub message with non-string topic");
            return None;
        }
    };
    let value = args.next().unwrap_or(Value::Null);
    let timestamp = match args.next() {
        Some(Value::String(ts)) => Some(ts),
        _ => None,
    };

    let topic = Topic::from_wire(&name);
    let payload = decode_field(&name, &topic, value);
    Some(TopicMessage::new(topic, payload, timestamp))
}

fn decode_field(wire_name: &str, topic: &Topic, value: Value) -> Payload {
    if !is_compressed(wire_name) {
        return Payload::from_value(topic, value);
    }

    let inflated = match &value {
        Value::String(encoded) => inflate_field(encoded),
        other => Err(format!("expected base64 string, got {}", json_kind(other))),
    };

    match inflated {
        Ok(decoded) => Payload::from_value(topic, decoded),
        Err(reason) => {
            let error = FieldDecodeError::new(wire_name, reason);
            warn!(topic = %wire_name, error = %error, "Compressed field failed to decode");
            Payload::Corrupt { raw: value, error }
        }
    }
}

/// Inflate a compressed topic payload: base64, then deflate, then JSON.
///
/// Both raw deflate streams and zlib-wrapped streams are accepted.
pub fn inflate_field(encoded: &str) -> std::result::Result<Value, String> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("base64: {e}"))?;

    let mut text = String::new();
    if has_zlib_header(&bytes) {
        ZlibDecoder::new(bytes.as_slice()).read_to_string(&mut text)
    } else {
        DeflateDecoder::new(bytes.as_slice()).read_to_string(&mut text)
    }
    .map_err(|e| format!("inflate: {e}"))?;

    serde_json::from_str(&text).map_err(|e| format!("json: {e}"))
}

/// RFC 1950 header: CM = 8 and the check bits make the first 16 bits a multiple of 31.
fn has_zlib_header(bytes: &[u8]) -> bool {
    match bytes {
        [cmf, flg, ..] => cmf & 0x0f == 8 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
