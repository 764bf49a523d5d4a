//! Session negotiation against the intermediary backend.
//!
//! The intermediary brokers the hub handshake so the client never talks to the
//! upstream negotiate endpoint directly. One GET yields a [`SessionDescriptor`];
//! the WebSocket endpoint and the subscription message are pure functions of it.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::{Result, TimingError};

/// Topics subscribed by default, in wire form.
pub const DEFAULT_TOPICS: [&str; 18] = [
    "Heartbeat",
    "CarData.z",
    "Position.z",
    "ExtrapolatedClock",
    "TopThree",
    "TimingStats",
    "TimingAppData",
    "WeatherData",
    "TrackStatus",
    "DriverList",
    "RaceControlMessages",
    "SessionInfo",
    "SessionData",
    "LapCount",
    "TimingData",
    "TyreStintSeries",
    "PitStopSeries",
    "TeamRadio",
];

/// Hub method invoked to start streaming.
pub const SUBSCRIBE_METHOD: &str = "Subscribe";

/// Connection descriptor for one negotiated session.
///
/// Immutable once negotiated and discarded on disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub connection_token: String,
    pub connection_id: String,
    pub protocol_version: String,
    /// Connect URL without query parameters
    pub endpoint_template: String,
    pub hub: String,
    pub client_protocol: String,
}

impl SessionDescriptor {
    /// WebSocket URL for this session.
    ///
    /// Query parameters are encoded once; the token is never pre-escaped.
    pub fn endpoint(&self) -> Result<Url> {
        let connection_data = serde_json::json!([{ "name": self.hub }]).to_string();
        Url::parse_with_params(
            &self.endpoint_template,
            &[
                ("transport", "webSockets"),
                ("connectionToken", self.connection_token.as_str()),
                ("connectionData", connection_data.as_str()),
                ("clientProtocol", self.client_protocol.as_str()),
            ],
        )
        .map_err(|e| {
            TimingError::config_error(format!("invalid endpoint '{}': {e}", self.endpoint_template))
        })
    }

    /// Subscription request naming `topics` on this session's hub.
    pub fn subscription<S: AsRef<str>>(&self, topics: &[S]) -> SubscribeRequest {
        SubscribeRequest {
            hub: self.hub.clone(),
            method: SUBSCRIBE_METHOD.to_string(),
            args: vec![topics.iter().map(|t| t.as_ref().to_string()).collect()],
            invocation_id: 1,
        }
    }
}

/// Hub invocation sent once after the socket opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    #[serde(rename = "H")]
    pub hub: String,
    #[serde(rename = "M")]
    pub method: String,
    #[serde(rename = "A")]
    pub args: Vec<Vec<String>>,
    #[serde(rename = "I")]
    pub invocation_id: u32,
}

impl SubscribeRequest {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TimingError::codec_error("subscribe request", e.to_string()))
    }

    pub fn topics(&self) -> &[String] {
        self.args.first().map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NegotiateResponse {
    connection_token: String,
    connection_id: String,
    protocol_version: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    try_web_sockets: Option<bool>,
}

/// Reachability of the upstream feed as reported by the intermediary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FeedStatus {
    pub online: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    error: Option<String>,
}

/// Source of session descriptors.
///
/// A single request/response exchange; implementations never retry.
#[async_trait]
pub trait Negotiator: Send + Sync + 'static {
    async fn negotiate(&self) -> Result<SessionDescriptor>;
}

/// Negotiator speaking HTTP to the intermediary backend.
pub struct HttpNegotiator {
    client: Client,
    config: FeedConfig,
}

impl HttpNegotiator {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.negotiation_timeout())
            .build()
            .map_err(|e| TimingError::negotiation_failed_with_source("building HTTP client", Box::new(e)))?;
        Ok(Self { client, config })
    }

    fn request_error(&self, context: impl Into<String>, err: reqwest::Error) -> TimingError {
        if err.is_timeout() {
            TimingError::Timeout { duration: self.config.negotiation_timeout() }
        } else {
            TimingError::negotiation_failed_with_source(context, Box::new(err))
        }
    }

    /// Ask the intermediary whether the upstream feed is reachable.
    ///
    /// Never fails: an unreachable intermediary is reported as offline.
    pub async fn probe_status(&self) -> FeedStatus {
        let url = self.config.status_url();
        debug!(url = %url, "Probing feed status");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Feed status probe failed");
                return FeedStatus { online: false, status_code: None, error: Some(e.to_string()) };
            }
        };

        let http_status = response.status().as_u16();
        match response.json::<StatusBody>().await {
            Ok(body) => FeedStatus {
                online: body.status == "online",
                status_code: body.status_code,
                error: body.error,
            },
            Err(e) => FeedStatus {
                online: false,
                status_code: Some(http_status),
                error: Some(e.to_string()),
            },
        }
    }
}

#[async_trait]
impl Negotiator for HttpNegotiator {
    async fn negotiate(&self) -> Result<SessionDescriptor> {
        let url = self.config.negotiate_url();
        info!(url = %url, "Negotiating live timing session");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.request_error(format!("GET {url}"), e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error("reading response body", e))?;

        let descriptor = interpret_response(status, &body, &self.config)?;
        info!(connection_id = %descriptor.connection_id, "Session negotiated");
        Ok(descriptor)
    }
}

/// Turn a negotiate response into a descriptor.
///
/// Non-2xx statuses and bodies missing the token, id or protocol version are
/// negotiation errors.
pub fn interpret_response(status: u16, body: &[u8], config: &FeedConfig) -> Result<SessionDescriptor> {
    if !(200..300).contains(&status) {
        let detail = String::from_utf8_lossy(body);
        let detail = detail.chars().take(200).collect::<String>();
        return Err(TimingError::negotiation_status(
            status,
            format!("intermediary returned HTTP {status}: {detail}"),
        ));
    }

    let parsed: NegotiateResponse = serde_json::from_slice(body)
        .map_err(|e| TimingError::negotiation_failed(format!("malformed negotiate response: {e}")))?;

    if parsed.connection_token.is_empty() {
        return Err(TimingError::negotiation_failed("empty connection token"));
    }
    if parsed.try_web_sockets == Some(false) {
        warn!("Intermediary reports WebSockets unavailable, connecting anyway");
    }
    debug!(
        protocol_version = %parsed.protocol_version,
        upstream_url = ?parsed.url,
        "Negotiate response accepted"
    );

    Ok(SessionDescriptor {
        connection_token: parsed.connection_token,
        connection_id: parsed.connection_id,
        protocol_version: parsed.protocol_version,
        endpoint_template: config.stream.endpoint.clone(),
        hub: config.stream.hub.clone(),
        client_protocol: config.stream.client_protocol.clone(),
    })
}
