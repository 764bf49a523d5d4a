//! Duplex link seam and its WebSocket implementation

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, StreamExt, future};
use reqwest::Url;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, trace};

use crate::{Result, TimingError};

/// Raw inbound messages of one link.
pub type Inbound = BoxStream<'static, Result<Vec<u8>>>;

/// Text sink of one link.
pub type Outbound = Pin<Box<dyn Sink<String, Error = TimingError> + Send>>;

/// One established duplex connection.
///
/// The inbound stream ending (or yielding an error) means the link is lost.
pub struct Link {
    pub inbound: Inbound,
    pub outbound: Outbound,
}

/// Opens links to an endpoint. Resolves once the handshake completes or fails.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, endpoint: &Url) -> Result<Link>;
}

/// [`Connector`] over tokio-tungstenite with rustls.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, endpoint: &Url) -> Result<Link> {
        let host = endpoint.host_str().unwrap_or("<no host>").to_string();
        debug!(host = %host, "Opening WebSocket");

        let (stream, response) = connect_async(endpoint.as_str()).await.map_err(|e| {
            TimingError::transport_failed_with_source(format!("handshake with {host} failed"), Box::new(e))
        })?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = stream.split();

        let inbound = read
            .filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(text.into_bytes())),
                    Ok(Message::Binary(data)) => Some(Ok(data)),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Close frame received");
                        None
                    }
                    Ok(other) => {
                        trace!(kind = ?other, "Ignoring control message");
                        None
                    }
                    Err(e) => Some(Err(TimingError::from(e))),
                })
            })
            .boxed();

        let outbound = write
            .sink_map_err(TimingError::from)
            .with(|text: String| future::ready(Ok::<_, TimingError>(Message::Text(text))));

        Ok(Link { inbound, outbound: Box::pin(outbound) })
    }
}
