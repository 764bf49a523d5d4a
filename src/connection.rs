//! Consumer handle for a running live timing session

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::SessionDescriptor;
use crate::stream::ThrottleExt;
use crate::transport::TransportState;
use crate::types::{TimingSnapshot, UpdateRate};
use crate::{Result, TimingError};

/// Live connection to the timing feed.
///
/// Snapshots are published into a single slot: a consumer that falls behind
/// sees the latest snapshot, never a backlog. Dropping the handle stops the
/// session.
pub struct LiveTiming {
    /// Negotiated session this connection runs on
    session: SessionDescriptor,

    /// Latest published snapshot
    snapshots: watch::Receiver<Option<Arc<TimingSnapshot>>>,

    /// Transport lifecycle
    transport: watch::Receiver<TransportState>,

    /// Cancellation token for stopping the dispatch task
    cancel: CancellationToken,

    task: Option<JoinHandle<Result<()>>>,
}

impl LiveTiming {
    pub(crate) fn new(
        session: SessionDescriptor,
        snapshots: watch::Receiver<Option<Arc<TimingSnapshot>>>,
        transport: watch::Receiver<TransportState>,
        cancel: CancellationToken,
        task: JoinHandle<Result<()>>,
    ) -> Self {
        Self { session, snapshots, transport, cancel, task: Some(task) }
    }

    /// Stream of consolidated snapshots.
    ///
    /// Yields the current snapshot immediately if one exists, then one per
    /// dispatched frame, optionally throttled. The stream ends when the
    /// session stops.
    pub fn snapshots(&self, rate: UpdateRate) -> BoxStream<'static, Arc<TimingSnapshot>> {
        // WatchStream yields the current value first; skip the empty slot
        // until the first frame has been dispatched
        let snapshots = WatchStream::new(self.snapshots.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => snapshots.boxed(),
            Some(interval) => snapshots.throttle(interval).boxed(),
        }
    }

    /// Raw single-slot receiver, for callers that prefer `changed()` loops.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<TimingSnapshot>>> {
        self.snapshots.clone()
    }

    /// Invoke `callback` with each snapshot from a separate task.
    ///
    /// The callback never runs inside the dispatch loop; while it is busy,
    /// newer snapshots replace older ones.
    pub fn on_snapshot_ready<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(Arc<TimingSnapshot>) + Send + 'static,
    {
        let mut snapshots = self.snapshots(UpdateRate::Native);
        tokio::spawn(async move {
            while let Some(snapshot) = snapshots.next().await {
                callback(snapshot);
            }
        })
    }

    /// Latest published snapshot, if any frame has been dispatched.
    pub fn current_snapshot(&self) -> Option<Arc<TimingSnapshot>> {
        self.snapshots.borrow().clone()
    }

    /// Current transport state.
    pub fn transport_state(&self) -> TransportState {
        self.transport.borrow().clone()
    }

    /// Transport state changes, starting with the current state.
    pub fn transport_states(&self) -> WatchStream<TransportState> {
        WatchStream::new(self.transport.clone())
    }

    pub fn session(&self) -> &SessionDescriptor {
        &self.session
    }

    /// Wait for the session to stop.
    ///
    /// Resolves to [`TimingError::ReconnectExhausted`] when the feed was lost
    /// for good, `Ok(())` after a shutdown. Later calls return `Ok(())`.
    pub async fn closed(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(TimingError::transport_failed_with_source("dispatch task aborted", Box::new(e))),
        }
    }

    /// Stop the session and wait for the transport to close.
    pub async fn shutdown(mut self) -> Result<()> {
        info!(connection_id = %self.session.connection_id, "Shutting down live timing");
        self.cancel.cancel();
        self.closed().await
    }
}

impl Drop for LiveTiming {
    fn drop(&mut self) {
        debug!("Dropping live timing connection");
        self.cancel.cancel();
    }
}
