//! Hub channel with auto-reconnect and server-driven flow control.
//!
//! Maintains a single persistent websocket connection to the machine
//! interface hub. The connection state machine lives in a
//! [`tokio::sync::watch`] channel; control messages from the server
//! (`pause`, `resume`, `tagsLoaded`) are dispatched by the read side of
//! the connection task, and outbound invocations are fire-and-forget.
//!
//! Reconnection uses capped exponential backoff with jitter and retries
//! until the channel is explicitly closed. An unauthorized error
//! invalidates the shared token, so the next attempt performs a fresh
//! acquisition instead of reusing stale credentials.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::hub::protocol::{self, ClientInvocation, ControlMessage, TagValueUpdate};
use crate::token::TokenManager;
use crate::transport::{AUTH_HEADER, SERVICE_HEADER};

const OUTBOUND_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Hub name used by the machine interface.
pub const DEFAULT_HUB_NAME: &str = "machineInterfaceHub";

// ── ChannelState ─────────────────────────────────────────────────────

/// Connection state observable by consumers.
///
/// Exactly one instance per channel; all transitions are applied by the
/// connection task (or the control dispatch it runs), never concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Server requested a transmission pause; pushes are dropped, not queued.
    Paused,
    Error { reason: String },
}

// ── HubEvent ─────────────────────────────────────────────────────────

/// Events the channel raises toward the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// The server reloaded its tag list; the consumer should refetch.
    /// The channel itself does not refetch.
    TagListReloaded,
}

// ── PushOutcome ──────────────────────────────────────────────────────

/// Result of handing an outbound invocation to the channel.
///
/// `Sent` means accepted for transmission -- delivery is fire-and-forget
/// and no acknowledgment is awaited. Transport failures never surface
/// here; they only show up in the observable [`ChannelState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    DroppedPaused,
    DroppedDisconnected,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for hub reconnection.
///
/// Attempts continue until the channel is closed; there is no retry cap.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

// ── HubConfig ────────────────────────────────────────────────────────

/// Connection settings for the hub endpoint.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Websocket URL of the hub endpoint (`ws://` or `wss://`).
    pub url: Url,
    pub hub_name: String,
    pub service_name: String,
    pub reconnect: ReconnectConfig,
}

impl HubConfig {
    /// Derive the hub config from the REST base URL.
    ///
    /// The hub lives at `{base}/signalr`; `http(s)` is mapped to `ws(s)`.
    pub fn from_base_url(base_url: &Url, service_name: impl Into<String>) -> Result<Self, Error> {
        let mut url = base_url.join("signalr").map_err(Error::InvalidUrl)?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            "ws" => "ws",
            "wss" => "wss",
            other => {
                return Err(Error::HubConnect(format!(
                    "unsupported hub scheme: {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::HubConnect("could not derive websocket scheme".into()))?;

        Ok(Self {
            url,
            hub_name: DEFAULT_HUB_NAME.into(),
            service_name: service_name.into(),
            reconnect: ReconnectConfig::default(),
        })
    }
}

// ── HubChannel ───────────────────────────────────────────────────────

struct Outbound {
    method: &'static str,
    args: Vec<serde_json::Value>,
}

struct ChannelInner {
    config: HubConfig,
    tokens: Arc<TokenManager>,
    state_tx: watch::Sender<ChannelState>,
    event_tx: broadcast::Sender<HubEvent>,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Outbound>>>,
    /// Single-flight guard: a concurrent `connect()` waits for the
    /// in-flight attempt instead of starting a second one.
    connect_gate: Mutex<()>,
    /// Sticky across reconnects -- the server re-sends `resume` when it
    /// wants transmission to restart.
    paused: AtomicBool,
    invocation_seq: AtomicU64,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the hub channel. Cheaply cloneable.
#[derive(Clone)]
pub struct HubChannel {
    inner: Arc<ChannelInner>,
}

impl HubChannel {
    /// Create a channel. Does not connect -- the connection is
    /// established lazily by [`connect()`](Self::connect) or the first push.
    pub fn new(config: HubConfig, tokens: Arc<TokenManager>) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(ChannelInner {
                config,
                tokens,
                state_tx,
                event_tx,
                outbound_tx,
                outbound_rx: Mutex::new(Some(outbound_rx)),
                connect_gate: Mutex::new(()),
                paused: AtomicBool::new(false),
                invocation_seq: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// The current channel state.
    pub fn state(&self) -> ChannelState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to channel state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to hub events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<HubEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Establish the hub connection.
    ///
    /// Ensures a valid token first, then waits for the in-flight attempt
    /// to resolve. No-op when already connected (or paused); a concurrent
    /// caller waits on the gate rather than starting a second handshake.
    pub async fn connect(&self) -> Result<(), Error> {
        let _gate = self.inner.connect_gate.lock().await;

        if self.inner.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        if matches!(
            self.state(),
            ChannelState::Connected | ChannelState::Paused
        ) {
            return Ok(());
        }

        // Fail fast on bad credentials before spawning the loop.
        self.inner.tokens.ensure_valid().await?;
        self.ensure_loop().await;

        // Wait for the current attempt to resolve either way.
        let mut rx = self.inner.state_tx.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                ChannelState::Connected | ChannelState::Paused => return Ok(()),
                ChannelState::Error { reason } => return Err(Error::HubConnect(reason)),
                ChannelState::Disconnected if self.inner.cancel.is_cancelled() => {
                    return Err(Error::ChannelClosed);
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(Error::ChannelClosed);
            }
        }
    }

    /// Push a tag value update over the hub.
    ///
    /// While paused, updates are dropped silently (debug-logged only).
    /// Otherwise the channel is connected on demand and the invocation is
    /// handed off fire-and-forget; a channel that cannot accept the update
    /// synchronously drops it.
    pub async fn push_value(&self, update: &TagValueUpdate) -> PushOutcome {
        if matches!(self.state(), ChannelState::Paused) {
            debug!(tag_id = update.id, "hub paused, dropping value update");
            return PushOutcome::DroppedPaused;
        }

        if !matches!(self.state(), ChannelState::Connected) {
            if let Err(e) = self.connect().await {
                debug!(tag_id = update.id, error = %e, "hub unavailable, dropping value update");
                return PushOutcome::DroppedDisconnected;
            }
            // A pause can arrive during the handshake.
            if matches!(self.state(), ChannelState::Paused) {
                debug!(tag_id = update.id, "hub paused, dropping value update");
                return PushOutcome::DroppedPaused;
            }
        }

        let value = match serde_json::to_value(update) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "could not serialize value update");
                return PushOutcome::DroppedDisconnected;
            }
        };
        self.enqueue("UpdateTagValue", vec![value])
    }

    /// Send a free-form diagnostic message to the hub.
    ///
    /// Unlike value pushes, messages are not gated by pause.
    pub async fn send_message(&self, message: serde_json::Value) -> PushOutcome {
        if !matches!(
            self.state(),
            ChannelState::Connected | ChannelState::Paused
        ) {
            if let Err(e) = self.connect().await {
                debug!(error = %e, "hub unavailable, dropping message");
                return PushOutcome::DroppedDisconnected;
            }
        }
        self.enqueue("SendMessage", vec![message])
    }

    /// Tear the channel down. Any state transitions to `Disconnected`
    /// and the background task is joined.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
        // send_replace stores the state even with no receiver alive;
        // plain send() would drop it.
        let _ = self.inner.state_tx.send_replace(ChannelState::Disconnected);
        debug!("hub channel closed");
    }

    fn enqueue(&self, method: &'static str, args: Vec<serde_json::Value>) -> PushOutcome {
        match self.inner.outbound_tx.try_send(Outbound { method, args }) {
            Ok(()) => PushOutcome::Sent,
            Err(_) => {
                debug!(method, "outbound queue unavailable, dropping invocation");
                PushOutcome::DroppedDisconnected
            }
        }
    }

    /// Spawn the connection loop if it is not already running.
    async fn ensure_loop(&self) {
        let mut task = self.inner.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let Some(outbound_rx) = self.inner.outbound_rx.lock().await.take() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(ws_loop(inner, outbound_rx)));
    }
}

impl std::fmt::Debug for HubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubChannel")
            .field("url", &self.inner.config.url.as_str())
            .field("hub_name", &self.inner.config.hub_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect -> pump -> on error, backoff -> reconnect.
async fn ws_loop(inner: Arc<ChannelInner>, mut outbound_rx: mpsc::Receiver<Outbound>) {
    let mut attempt: u32 = 0;

    loop {
        if inner.cancel.is_cancelled() {
            break;
        }

        let _ = inner.state_tx.send_replace(if attempt == 0 {
            ChannelState::Connecting
        } else {
            ChannelState::Reconnecting { attempt }
        });

        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            result = connect_and_pump(&inner, &mut outbound_rx) => match result {
                // Clean disconnect (server close frame or stream ended).
                // Reset the attempt counter, but still wait the initial
                // delay: a server that accepts and promptly closes must
                // not drive an immediate reconnect storm.
                Ok(()) => {
                    info!("hub disconnected cleanly, reconnecting");
                    attempt = 0;
                    tokio::select! {
                        biased;
                        _ = inner.cancel.cancelled() => break,
                        _ = tokio::time::sleep(inner.config.reconnect.initial_delay) => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, "hub channel error");

                    if matches!(e, Error::Unauthorized) {
                        // Never reuse the rejected token.
                        inner.tokens.invalidate().await;
                    }

                    let _ = inner.state_tx.send_replace(ChannelState::Error {
                        reason: e.to_string(),
                    });

                    let delay = calculate_backoff(attempt, &inner.config.reconnect);
                    debug!(
                        delay_ms = delay.as_millis() as u64,
                        attempt,
                        "waiting before hub reconnect"
                    );

                    tokio::select! {
                        biased;
                        _ = inner.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }

                    attempt += 1;
                }
            }
        }
    }

    let _ = inner.state_tx.send_replace(ChannelState::Disconnected);
    debug!("hub loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one hub connection and pump frames until it drops.
///
/// Auth and service-name headers are re-applied on every attempt, so a
/// token refreshed after an unauthorized error is picked up here.
async fn connect_and_pump(
    inner: &Arc<ChannelInner>,
    outbound_rx: &mut mpsc::Receiver<Outbound>,
) -> Result<(), Error> {
    let token = inner.tokens.ensure_valid().await?;

    debug!(url = %inner.config.url, "connecting to hub");

    let uri: tungstenite::http::Uri = inner
        .config
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::HubConnect(e.to_string()))?;

    let request = ClientRequestBuilder::new(uri)
        .with_header(AUTH_HEADER, token)
        .with_header(SERVICE_HEADER, inner.config.service_name.clone());

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(classify_connect_error)?;

    info!("hub connected");
    let _ = inner.state_tx.send_replace(if inner.paused.load(Ordering::Relaxed) {
        ChannelState::Paused
    } else {
        ChannelState::Connected
    });

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => return Ok(()),
            outbound = outbound_rx.recv() => {
                // The sender lives in ChannelInner, so recv() only yields
                // None during teardown.
                let Some(outbound) = outbound else { return Ok(()) };

                // Value pushes enqueued just before a pause landed are
                // dropped here; other invocations still flow while paused.
                if outbound.method == "UpdateTagValue" && inner.paused.load(Ordering::Relaxed) {
                    debug!(method = outbound.method, "hub paused, dropping queued value push");
                    continue;
                }

                let invocation = ClientInvocation {
                    hub: &inner.config.hub_name,
                    method: outbound.method,
                    args: outbound.args,
                    id: inner.invocation_seq.fetch_add(1, Ordering::Relaxed),
                };
                let payload = match serde_json::to_string(&invocation) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "could not serialize hub invocation");
                        continue;
                    }
                };

                trace!(method = outbound.method, "hub invoke");
                if let Err(e) = write.send(tungstenite::Message::Text(payload.into())).await {
                    return Err(Error::HubConnect(e.to_string()));
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        handle_frame(inner, &text);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pongs automatically
                        trace!("hub ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            info!(code = %cf.code, reason = %cf.reason, "hub close frame received");
                            if cf.reason.as_str().eq_ignore_ascii_case("unauthorized") {
                                return Err(Error::Unauthorized);
                            }
                        } else {
                            info!("hub close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::HubConnect(e.to_string()));
                    }
                    None => {
                        info!("hub stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

fn classify_connect_error(e: tungstenite::Error) -> Error {
    if let tungstenite::Error::Http(ref resp) = e {
        if resp.status() == tungstenite::http::StatusCode::UNAUTHORIZED {
            return Error::Unauthorized;
        }
    }
    Error::HubConnect(e.to_string())
}

// ── Control dispatch ─────────────────────────────────────────────────

/// Dispatch the control invocations carried in one inbound frame.
fn handle_frame(inner: &ChannelInner, text: &str) {
    let Some(frame) = protocol::parse_frame(text) else {
        return;
    };

    for msg in frame.messages {
        if !msg.hub.is_empty() && !msg.hub.eq_ignore_ascii_case(&inner.config.hub_name) {
            debug!(hub = %msg.hub, "ignoring invocation for foreign hub");
            continue;
        }

        match ControlMessage::from_method(&msg.method) {
            Some(ControlMessage::Echo) => {
                debug!(args = ?msg.args, "hub echo");
            }
            Some(ControlMessage::Pause) => {
                info!("hub pause received, suppressing value pushes");
                inner.paused.store(true, Ordering::Relaxed);
                let _ = inner.state_tx.send_replace(ChannelState::Paused);
            }
            Some(ControlMessage::Resume) => {
                info!("hub resume received");
                inner.paused.store(false, Ordering::Relaxed);
                let _ = inner.state_tx.send_replace(ChannelState::Connected);
            }
            Some(ControlMessage::TagsLoaded) => {
                debug!("hub signaled tag list reload");
                // No subscribers is fine -- the notification is best-effort.
                let _ = inner.event_tx.send(HubEvent::TagListReloaded);
            }
            None => {
                debug!(method = %msg.method, "unhandled hub method");
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread reconnection storms from multiple bridges.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * ((attempt as f64 * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn hub_config_maps_http_to_ws() {
        let base = Url::parse("http://llumin.example.com/app/").unwrap();
        let config = HubConfig::from_base_url(&base, "LLuminMachineInterface").unwrap();
        assert_eq!(config.url.as_str(), "ws://llumin.example.com/app/signalr");
        assert_eq!(config.hub_name, DEFAULT_HUB_NAME);
    }

    #[test]
    fn hub_config_maps_https_to_wss() {
        let base = Url::parse("https://llumin.example.com/").unwrap();
        let config = HubConfig::from_base_url(&base, "svc").unwrap();
        assert_eq!(config.url.scheme(), "wss");
    }

    #[test]
    fn hub_config_keeps_websocket_schemes() {
        let base = Url::parse("ws://llumin.example.com/").unwrap();
        let config = HubConfig::from_base_url(&base, "svc").unwrap();
        assert_eq!(config.url.as_str(), "ws://llumin.example.com/signalr");

        let base = Url::parse("wss://llumin.example.com/").unwrap();
        let config = HubConfig::from_base_url(&base, "svc").unwrap();
        assert_eq!(config.url.scheme(), "wss");
    }

    #[test]
    fn hub_config_rejects_unknown_scheme() {
        let base = Url::parse("ftp://llumin.example.com/").unwrap();
        assert!(HubConfig::from_base_url(&base, "svc").is_err());
    }

    #[test]
    fn new_channel_starts_disconnected() {
        let base = Url::parse("http://127.0.0.1:1/").unwrap();
        let tokens = Arc::new(
            TokenManager::new(
                &base,
                "user",
                "password".to_string().into(),
                reqwest::Client::new(),
            )
            .unwrap(),
        );
        let config = HubConfig::from_base_url(&base, "svc").unwrap();
        let channel = HubChannel::new(config, tokens);
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }
}
