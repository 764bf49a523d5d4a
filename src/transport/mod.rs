//! Transport manager: the live duplex link with bounded reconnection.
//!
//! [`TransportManager`] drives a [`Connector`] (normally [`WebSocketConnector`]),
//! runs every inbound message through the [frame codec](crate::codec) and
//! forwards the resulting [`TransportEvent`]s over a bounded channel. Losing an
//! established link schedules reconnects per [`ReconnectPolicy`]; exhausting the
//! policy ends in [`TransportState::Failed`] and a final
//! [`TransportEvent::Failed`].

mod backoff;
mod connector;
mod manager;


pub use backoff::{Backoff, ReconnectPolicy};
pub use connector::{Connector, Inbound, Link, Outbound, WebSocketConnector};
pub use manager::{TransportEvent, TransportManager, TransportState};
