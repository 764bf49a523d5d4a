//! Transport state machine
//!
//! ```text
//! Idle -> Connecting -> Open -> Closing -> Idle
//!                        |
//!                        +--> Reconnecting -> Connecting -> Open
//!                                  |
//!                                  +--> Failed (terminal)
//! ```
//!
//! One background task owns the live link exclusively. It decodes inbound
//! messages, writes queued outbound text, and replaces the link after a loss.
//! Nothing else ever touches the socket, so sends cannot race a reconnect.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::backoff::{Backoff, ReconnectPolicy};
use super::connector::{Connector, Link};
use crate::codec;
use crate::types::Frame;
use crate::{Result, TimingError};

const OUTBOUND_CAPACITY: usize = 32;

/// Lifecycle state of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Connecting,
    Open,
    Closing,
    /// Waiting `delay` before reconnect attempt `attempt` (1-based)
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect attempts exhausted; terminal until the next `connect`
    Failed { attempts: u32 },
}

impl TransportState {
    pub fn is_open(&self) -> bool {
        matches!(self, TransportState::Open)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TransportState::Failed { .. })
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Idle => f.write_str("Idle"),
            TransportState::Connecting => f.write_str("Connecting"),
            TransportState::Open => f.write_str("Open"),
            TransportState::Closing => f.write_str("Closing"),
            TransportState::Reconnecting { attempt, delay } => {
                write!(f, "Reconnecting (attempt {attempt} in {}ms)", delay.as_millis())
            }
            TransportState::Failed { attempts } => write!(f, "Failed after {attempts} attempts"),
        }
    }
}

/// What the transport hands to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A decoded snapshot or update frame
    Frame(Frame),
    /// Reconnection gave up; no further events follow
    Failed { attempts: u32 },
}

/// Owns the live connection and its reconnect loop.
pub struct TransportManager<C: Connector> {
    connector: Arc<C>,
    policy: ReconnectPolicy,
    state: Arc<watch::Sender<TransportState>>,
    outbound: Option<mpsc::Sender<String>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<C: Connector> TransportManager<C> {
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(TransportState::Idle);
        Self {
            connector: Arc::new(connector),
            policy,
            state: Arc::new(state),
            outbound: None,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> TransportState {
        self.state.borrow().clone()
    }

    /// Receiver observing every state transition.
    pub fn watch_state(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }

    /// Open the link and start forwarding decoded frames to `events`.
    ///
    /// Blocks until the first handshake completes. A failed first handshake is
    /// returned to the caller and leaves the transport `Idle`; only the loss
    /// of an established link drives the reconnect machine.
    pub async fn connect(&mut self, endpoint: Url, events: mpsc::Sender<TransportEvent>) -> Result<()> {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(TimingError::transport_failed(format!(
                "transport already running (state: {})",
                self.state()
            )));
        }

        self.state.send_replace(TransportState::Connecting);
        info!(host = endpoint.host_str().unwrap_or_default(), "Connecting transport");

        let link = match self.connector.open(&endpoint).await {
            Ok(link) => link,
            Err(e) => {
                error!(error = %e, "Initial handshake failed");
                self.state.send_replace(TransportState::Idle);
                return Err(match e {
                    transport @ TimingError::Transport { .. } => transport,
                    other => TimingError::transport_failed_with_source("initial handshake failed", Box::new(other)),
                });
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.outbound = Some(outbound_tx);
        self.cancel = CancellationToken::new();
        self.state.send_replace(TransportState::Open);
        info!("Transport open");

        let run = RunLoop {
            connector: Arc::clone(&self.connector),
            endpoint,
            backoff: Backoff::new(self.policy),
            state: Arc::clone(&self.state),
            outbound: outbound_rx,
            events,
            cancel: self.cancel.clone(),
        };
        self.task = Some(tokio::spawn(run.run(link)));
        Ok(())
    }

    /// Queue a text message on the open link.
    ///
    /// Fails with [`TimingError::NotConnected`] outside `Open`.
    pub async fn send(&self, message: impl Into<String>) -> Result<()> {
        let state = self.state();
        if !state.is_open() {
            return Err(TimingError::NotConnected { state: state.to_string() });
        }
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| TimingError::NotConnected { state: state.to_string() })?;
        outbound
            .send(message.into())
            .await
            .map_err(|_| TimingError::transport_failed("transport task stopped"))
    }

    /// Close the link, cancel any pending reconnect, and return to `Idle`.
    ///
    /// Safe from any state; never reports `Failed`.
    pub async fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            info!(state = %self.state(), "Disconnecting transport");
            self.state.send_replace(TransportState::Closing);
            self.cancel.cancel();
            match task.await {
                Err(e) if e.is_panic() => error!("Transport task panicked: {e}"),
                _ => {}
            }
        }
        self.outbound = None;
        self.state.send_replace(TransportState::Idle);
        debug!("Transport idle");
    }
}

impl<C: Connector> Drop for TransportManager<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum LinkEnd {
    Lost(String),
    Cancelled,
    ConsumerGone,
}

struct RunLoop<C: Connector> {
    connector: Arc<C>,
    endpoint: Url,
    backoff: Backoff,
    state: Arc<watch::Sender<TransportState>>,
    outbound: mpsc::Receiver<String>,
    events: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
}

impl<C: Connector> RunLoop<C> {
    async fn run(mut self, first: Link) {
        let mut link = Some(first);

        loop {
            if let Some(active) = link.take() {
                match self.pump(active).await {
                    LinkEnd::Cancelled => break,
                    LinkEnd::ConsumerGone => {
                        debug!("Event receiver dropped, stopping transport");
                        break;
                    }
                    LinkEnd::Lost(reason) => warn!(reason = %reason, "Link lost"),
                }
            }

            let Some(delay) = self.backoff.next_delay() else {
                let attempts = self.backoff.attempts();
                error!(attempts, "Reconnect attempts exhausted");
                self.state.send_replace(TransportState::Failed { attempts });
                let _ = self.events.send(TransportEvent::Failed { attempts }).await;
                return;
            };

            let attempt = self.backoff.attempts();
            warn!(
                attempt,
                max_attempts = self.backoff.policy().max_attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );
            self.state.send_replace(TransportState::Reconnecting { attempt, delay });

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            self.state.send_replace(TransportState::Connecting);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                opened = self.connector.open(&self.endpoint) => match opened {
                    Ok(new_link) => {
                        self.backoff.reset();
                        self.state.send_replace(TransportState::Open);
                        info!(attempt, "Reconnected");
                        link = Some(new_link);
                    }
                    Err(e) => warn!(attempt, error = %e, "Reconnect attempt failed"),
                },
            }
        }

        debug!("Transport task cancelled");
    }

    async fn pump(&mut self, link: Link) -> LinkEnd {
        let Link { mut inbound, mut outbound } = link;
        let mut received = 0u64;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = outbound.close().await;
                    return LinkEnd::Cancelled;
                }
                message = inbound.next() => match message {
                    Some(Ok(bytes)) => {
                        received += 1;
                        let frame = match codec::decode(&bytes) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(error = %e, bytes = bytes.len(), "Dropping undecodable message");
                                continue;
                            }
                        };
                        if frame.is_keep_alive() {
                            trace!(received, "Keep-alive");
                            continue;
                        }
                        tokio::select! {
                            _ = self.cancel.cancelled() => return LinkEnd::Cancelled,
                            sent = self.events.send(TransportEvent::Frame(frame)) => {
                                if sent.is_err() {
                                    return LinkEnd::ConsumerGone;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => return LinkEnd::Lost(e.to_string()),
                    None => return LinkEnd::Lost(format!("stream ended after {received} messages")),
                },
                Some(text) = self.outbound.recv() => {
                    trace!(bytes = text.len(), "Sending");
                    if let Err(e) = outbound.send(text).await {
                        return LinkEnd::Lost(e.to_string());
                    }
                }
            }
        }
    }
}
