//! Test utilities: wire fixtures and scripted collaborators
//!
//! This module provides builders for the hub wire format and in-memory stand-ins
//! for the [`Negotiator`] and [`Connector`] seams so the live path can be driven
//! end to end without a network.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use flate2::Compression;
use flate2::write::{DeflateEncoder, ZlibEncoder};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{Value, json};

use crate::session::{Negotiator, SessionDescriptor};
use crate::transport::{Connector, Link};
use crate::{Result, TimingError};

/// Encode `value` the way the feed encodes `.z` topics (raw deflate + base64).
pub fn compress_field(value: &Value) -> String {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(value.to_string().as_bytes()).expect("in-memory write");
    BASE64_STANDARD.encode(encoder.finish().expect("in-memory deflate"))
}

/// Same as [`compress_field`] but with a zlib wrapper.
pub fn compress_field_zlib(value: &Value) -> String {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(value.to_string().as_bytes()).expect("in-memory write");
    BASE64_STANDARD.encode(encoder.finish().expect("in-memory deflate"))
}

/// Initial-state message: `{"R": topics, "I": "1"}`.
pub fn snapshot_frame(topics: Value) -> String {
    json!({ "R": topics, "I": "1" }).to_string()
}

/// Streaming message carrying one hub invocation per `(topic, payload, timestamp)`.
pub fn update_frame(updates: &[(&str, Value, &str)]) -> String {
    let messages: Vec<Value> = updates
        .iter()
        .map(|(topic, payload, timestamp)| {
            json!({ "H": "Streaming", "M": "feed", "A": [topic, payload, timestamp] })
        })
        .collect();
    json!({ "C": "d-1,2|A,3|B,4", "M": messages }).to_string()
}

/// Descriptor pointing at a test endpoint.
pub fn test_descriptor() -> SessionDescriptor {
    SessionDescriptor {
        connection_token: "test-token".to_string(),
        connection_id: "test-connection".to_string(),
        protocol_version: "1.5".to_string(),
        endpoint_template: "wss://feed.test/signalr/connect".to_string(),
        hub: "Streaming".to_string(),
        client_protocol: "1.5".to_string(),
    }
}

/// Negotiator returning a fixed outcome, or never answering.
pub struct StaticNegotiator {
    outcome: Option<std::result::Result<SessionDescriptor, String>>,
    calls: AtomicUsize,
}

impl StaticNegotiator {
    pub fn succeeding(descriptor: SessionDescriptor) -> Self {
        Self { outcome: Some(Ok(descriptor)), calls: AtomicUsize::new(0) }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self { outcome: Some(Err(reason.into())), calls: AtomicUsize::new(0) }
    }

    pub fn stalled() -> Self {
        Self { outcome: None, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Negotiator for StaticNegotiator {
    async fn negotiate(&self) -> Result<SessionDescriptor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Some(Ok(descriptor)) => Ok(descriptor.clone()),
            Some(Err(reason)) => Err(TimingError::negotiation_status(503, reason.clone())),
            None => std::future::pending().await,
        }
    }
}

enum ScriptStep {
    Link(Link),
    Failure(String),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    endpoints: Vec<Url>,
}

/// Connector replaying a queue of links and handshake failures.
///
/// Each `open` pops the next step; an empty queue fails the handshake.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a link that opens successfully, returning the far end.
    pub fn push_link(&self) -> LinkHandle {
        let (inbound_tx, inbound_rx) = mpsc::unbounded::<Result<Vec<u8>>>();
        let (outbound_tx, outbound_rx) = mpsc::unbounded::<String>();

        let outbound = outbound_tx
            .sink_map_err(|e| TimingError::transport_failed(format!("scripted sink closed: {e}")));
        let link = Link { inbound: inbound_rx.boxed(), outbound: Box::pin(outbound) };

        self.lock().steps.push_back(ScriptStep::Link(link));
        LinkHandle { inbound: inbound_tx, outbound: outbound_rx }
    }

    /// Queue a failed handshake.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.lock().steps.push_back(ScriptStep::Failure(reason.into()));
    }

    /// Number of `open` calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Endpoints passed to `open`, in call order.
    pub fn endpoints(&self) -> Vec<Url> {
        self.lock().endpoints.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, endpoint: &Url) -> Result<Link> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut script = self.lock();
            script.endpoints.push(endpoint.clone());
            script.steps.pop_front()
        };
        match step {
            Some(ScriptStep::Link(link)) => Ok(link),
            Some(ScriptStep::Failure(reason)) => Err(TimingError::transport_failed(reason)),
            None => Err(TimingError::transport_failed("no scripted link left")),
        }
    }
}

/// Far end of a scripted link.
///
/// Dropping the handle closes the link.
pub struct LinkHandle {
    inbound: mpsc::UnboundedSender<Result<Vec<u8>>>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl LinkHandle {
    /// Deliver a text message to the client.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.unbounded_send(Ok(text.into().into_bytes()));
    }

    /// Break the link with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.inbound.unbounded_send(Err(TimingError::transport_failed(reason.to_string())));
    }

    /// End the inbound stream as a clean close from the server.
    pub fn close(&self) {
        self.inbound.close_channel();
    }

    /// Next message the client wrote.
    pub async fn next_outbound(&mut self) -> Option<String> {
        self.outbound.next().await
    }
}
