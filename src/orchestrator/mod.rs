//! Telemetry orchestrator: routes decoded frames to processors and publishes snapshots.
//!
//! [`TimingState`] is the synchronous core. It owns one instance of every
//! processor and dispatches each `(topic, payload, timestamp)` triple through a
//! static routing table. [`Orchestrator::start`] wraps it in a single task fed by
//! the transport, so processors only ever see one writer.
//!
//! Snapshots are published through a `watch` channel: one slot, latest wins.
//! A slow consumer misses intermediate snapshots instead of stalling ingestion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::FeedConfig;
use crate::connection::LiveTiming;
use crate::processors::{
    DriverProcessor, MergeOutcome, PositionProcessor, Processor, SessionProcessor, TimingProcessor,
};
use crate::session::Negotiator;
use crate::transport::{Connector, TransportEvent, TransportManager};
use crate::types::{Frame, TimingSnapshot, Topic, TopicMessage};
use crate::{Result, TimingError};

#[cfg(test)]
mod tests;

/// Processor families a topic can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    Driver,
    Position,
    Timing,
    Session,
}

/// Static topic -> processor table. Unrouted topics map to an empty slice.
pub fn route(topic: &Topic) -> &'static [ProcessorKind] {
    match topic {
        Topic::DriverList | Topic::TimingAppData => &[ProcessorKind::Driver],
        Topic::TimingData => &[ProcessorKind::Position, ProcessorKind::Timing],
        Topic::Position => &[ProcessorKind::Position],
        Topic::SessionInfo | Topic::TrackStatus | Topic::LapCount => &[ProcessorKind::Session],
        _ => &[],
    }
}

/// Tally of one frame's dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Processor merges that changed state
    pub applied: usize,
    /// Triples no processor is registered for, or that a processor declined
    pub ignored: usize,
    /// Triples skipped because their field failed to decode
    pub skipped: usize,
    /// A session change cleared the entity maps during this frame
    pub new_session: bool,
}

/// Every processor of one live session.
#[derive(Debug, Default)]
pub struct TimingState {
    drivers: DriverProcessor,
    positions: PositionProcessor,
    timing: TimingProcessor,
    session: SessionProcessor,
}

impl TimingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch every triple of `frame` in order.
    ///
    /// A SessionInfo announcing a different session key clears all state
    /// before any triple of the frame is applied, wherever it sits in the frame.
    pub fn dispatch_frame(&mut self, frame: &Frame) -> DispatchReport {
        let mut report = DispatchReport::default();

        let announced = frame
            .messages()
            .iter()
            .find(|message| self.session.starts_new_session(&message.payload));
        if let Some(message) = announced {
            info!(topic = %message.topic, "New session announced, clearing timing state");
            self.reset();
            report.new_session = true;
        }

        for message in frame.messages() {
            self.dispatch(message, &mut report);
        }
        trace!(
            applied = report.applied,
            ignored = report.ignored,
            skipped = report.skipped,
            "Frame dispatched"
        );
        report
    }

    fn dispatch(&mut self, message: &TopicMessage, report: &mut DispatchReport) {
        let TopicMessage { topic, payload, .. } = message;

        if let Some(error) = payload.decode_error() {
            debug!(topic = %topic, error = %error, "Skipping undecodable topic");
            report.skipped += 1;
            return;
        }

        let targets = route(topic);
        if targets.is_empty() {
            trace!(topic = %topic, "No processor registered");
            report.ignored += 1;
            return;
        }

        for kind in targets {
            let outcome = match kind {
                ProcessorKind::Driver => self.drivers.apply_update(topic, payload),
                ProcessorKind::Position => self.positions.apply_update(topic, payload),
                ProcessorKind::Timing => self.timing.apply_update(topic, payload),
                ProcessorKind::Session => self.session.apply_update(topic, payload),
            };
            match outcome {
                MergeOutcome::Applied { .. } => report.applied += 1,
                MergeOutcome::Ignored => report.ignored += 1,
            }
        }
    }

    /// Consolidated view over every processor.
    pub fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            drivers: self.drivers.snapshot(),
            positions: self.positions.snapshot(),
            timing: self.timing.snapshot(),
            session: self.session.summary().cloned(),
        }
    }

    /// Drop all driver, position, timing and session state.
    pub fn reset(&mut self) {
        self.drivers.clear();
        self.positions.clear();
        self.timing.clear();
        self.session.clear();
    }

    pub fn drivers(&self) -> &DriverProcessor {
        &self.drivers
    }

    pub fn positions(&self) -> &PositionProcessor {
        &self.positions
    }

    pub fn timing(&self) -> &TimingProcessor {
        &self.timing
    }

    pub fn session(&self) -> &SessionProcessor {
        &self.session
    }
}

/// Starts the live pipeline: negotiate, connect, subscribe, dispatch.
pub struct Orchestrator;

impl Orchestrator {
    /// Negotiate a session, open the transport and spawn the dispatch task.
    ///
    /// Negotiation and the first handshake are awaited here, so their errors
    /// reach the caller directly. The subscription is sent once, after the
    /// configured settle delay.
    pub async fn start<N, C>(
        negotiator: &N,
        mut transport: TransportManager<C>,
        config: &FeedConfig,
    ) -> Result<LiveTiming>
    where
        N: Negotiator + ?Sized,
        C: Connector,
    {
        let timeout = config.negotiation_timeout();
        let descriptor = tokio::time::timeout(timeout, negotiator.negotiate())
            .await
            .map_err(|_| TimingError::Timeout { duration: timeout })??;
        let endpoint = descriptor.endpoint()?;
        let subscription = descriptor.subscription(&config.stream.topics).to_json()?;

        let (events_tx, events_rx) = mpsc::channel(config.stream.event_capacity);
        transport.connect(endpoint, events_tx).await?;

        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let transport_state = transport.watch_state();
        let cancel = CancellationToken::new();

        let dispatch = DispatchLoop {
            transport,
            events: events_rx,
            subscription,
            topic_count: config.stream.topics.len(),
            settle_delay: config.settle_delay(),
            snapshots: snapshot_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(dispatch.run());

        info!(connection_id = %descriptor.connection_id, "Live timing started");
        Ok(LiveTiming::new(descriptor, snapshot_rx, transport_state, cancel, task))
    }
}

struct DispatchLoop<C: Connector> {
    transport: TransportManager<C>,
    events: mpsc::Receiver<TransportEvent>,
    subscription: String,
    topic_count: usize,
    settle_delay: Duration,
    snapshots: watch::Sender<Option<Arc<TimingSnapshot>>>,
    cancel: CancellationToken,
}

impl<C: Connector> DispatchLoop<C> {
    async fn run(mut self) -> Result<()> {
        let mut state = TimingState::new();
        let mut frames = 0u64;
        let mut subscribed = false;

        let settle = tokio::time::sleep(self.settle_delay);
        tokio::pin!(settle);

        let outcome = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Dispatch cancelled");
                    break Ok(());
                }
                _ = &mut settle, if !subscribed => {
                    subscribed = true;
                    match self.transport.send(self.subscription.clone()).await {
                        Ok(()) => info!(topics = self.topic_count, "Subscription sent"),
                        Err(e) => warn!(error = %e, "Subscription could not be sent"),
                    }
                }
                event = self.events.recv() => match event {
                    Some(TransportEvent::Frame(frame)) => {
                        frames += 1;
                        let report = state.dispatch_frame(&frame);
                        if report.new_session {
                            info!(frames, "Timing state reset for new session");
                        }
                        self.snapshots.send_replace(Some(Arc::new(state.snapshot())));
                    }
                    Some(TransportEvent::Failed { attempts }) => {
                        error!(attempts, frames, "Live feed lost");
                        break Err(TimingError::ReconnectExhausted { attempts });
                    }
                    None => {
                        debug!("Transport event stream ended");
                        break Ok(());
                    }
                },
            }
        };

        // A failed transport has already stopped; leave its terminal state visible
        if outcome.is_ok() {
            self.transport.disconnect().await;
        }
        info!(frames, "Dispatch task ended");
        outcome
    }
}
