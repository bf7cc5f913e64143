//! Live websocket connection to a weft backend.
//!
//! The [`WebsocketConnection`] spawns a background task that owns the
//! socket and drives the session state machine:
//!
//! ```text
//! Initial → PingingServer → Connecting → Connected
//!                ▲              │            │ socket drop
//!                └──────────────┴────────────┘ (bounded retries)
//!                                │
//!                       DisconnectedForever
//! ```
//!
//! Candidate base URIs are health-checked in order; the first to answer
//! becomes the active URI. Failed rounds back off exponentially with
//! jitter, surfacing a [`SessionEvent::Retry`] per attempt so the manager
//! can escalate at its warning threshold. After too many consecutive
//! failures the connection gives up for good.
//!
//! Incoming frames are decoded and resolved against the forward-message
//! cache strictly in arrival order: a cache miss awaits its fetch inline
//! rather than letting later messages overtake the stalled one.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use weft_core::prelude::*;
use weft_core::state::ConnectionState;
use weft_core::wire::{BackMsg, ForwardMsg, HostConfig};

use crate::cache::ForwardMsgCache;
use crate::endpoints::Endpoints;
use crate::events::SessionEvent;
use crate::uri::{self, HEALTH_PATH, HOST_CONFIG_PATH, STREAM_PATH};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Backoff before the first reconnection attempt.
const INITIAL_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Backoff ceiling. With doubling from 500 ms the first five waits sum to
/// ~15.5 s, which is what the manager's warning threshold is calibrated to.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(15);

/// Jitter applied to every backoff, as a fraction of the delay.
const RETRY_JITTER: f64 = 0.25;

/// Consecutive failed attempts before giving up for good.
pub const MAX_RETRIES_BEFORE_DISCONNECT: u32 = 10;

/// Timeout for one health-check request.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the websocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the command channel (bounded, to apply backpressure).
const CMD_CHANNEL_CAPACITY: usize = 32;

/// Subprotocol announced during the websocket handshake; the host auth
/// token rides along as a second entry when present.
const WS_SUBPROTOCOL: &str = "weft.v1";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Configuration for one live connection attempt.
#[derive(Debug, Clone)]
pub struct WebsocketConnectionConfig {
    /// Candidate base URIs, most specific first.
    pub base_uri_list: Vec<Url>,

    /// Host-supplied auth token, claimed for the first handshake.
    pub auth_token: Option<String>,
}

/// Internal messages sent from the public API to the background task.
enum WsCommand {
    SendBackMsg(Box<BackMsg>),
    IncrementCacheRunCount(u32),
    Disconnect,
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

// ---------------------------------------------------------------------------
// WebsocketConnection
// ---------------------------------------------------------------------------

/// Handle to the background connection task.
///
/// Dropping the handle closes the command channel, which the task treats as
/// a disconnect: no retries continue and no late completion mutates state
/// afterwards.
pub struct WebsocketConnection {
    cmd_tx: mpsc::Sender<WsCommand>,
    state: Arc<std::sync::RwLock<ConnectionState>>,
    active_base: Arc<std::sync::RwLock<Option<Url>>>,
}

impl WebsocketConnection {
    /// Spawn the connection task. Events (state changes, messages, retry
    /// notices) flow to `event_tx` in order.
    pub fn start<E>(
        config: WebsocketConnectionConfig,
        endpoints: Arc<E>,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Self
    where
        E: Endpoints + Send + Sync + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let state = Arc::new(std::sync::RwLock::new(ConnectionState::Initial));
        let active_base = Arc::new(std::sync::RwLock::new(None));

        tokio::spawn(run_connection_task(
            config,
            endpoints,
            cmd_rx,
            event_tx,
            Arc::clone(&state),
            Arc::clone(&active_base),
        ));

        Self {
            cmd_tx,
            state,
            active_base,
        }
    }

    /// Queue a message for the backend. Logged and dropped when the
    /// connection is down — callers must not crash on transient disconnects.
    pub fn send_back_msg(&self, msg: BackMsg) {
        if let Err(err) = self.cmd_tx.try_send(WsCommand::SendBackMsg(Box::new(msg))) {
            warn!("cannot send message while disconnected: {err}");
        }
    }

    /// Advance the message cache's run counter.
    pub fn increment_message_cache_run_count(&self, max_age: u32) {
        if let Err(err) = self
            .cmd_tx
            .try_send(WsCommand::IncrementCacheRunCount(max_age))
        {
            debug!("message cache run-count increment dropped: {err}");
        }
    }

    /// Tear the connection down. Stops further retries; late socket
    /// completions are discarded.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.try_send(WsCommand::Disconnect);
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// The base URI that passed the health check, once connected.
    pub fn base_uri(&self) -> Option<Url> {
        self.active_base
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// How one io-loop run ended.
enum IoOutcome {
    /// Connection lost; caller should retry.
    Reconnect,
    /// Disconnect command or dropped handle; terminate silently.
    Shutdown,
    /// Protocol violation; terminate loudly without retrying.
    Fatal(String),
}

struct TaskContext {
    event_tx: mpsc::Sender<SessionEvent>,
    state: Arc<std::sync::RwLock<ConnectionState>>,
}

impl TaskContext {
    /// Record and publish a state transition. Returns `false` when the
    /// event channel is gone (session torn down).
    async fn set_state(&self, new_state: ConnectionState, message: Option<String>) -> bool {
        {
            let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
            *guard = new_state;
        }
        self.event_tx
            .send(SessionEvent::StateChanged {
                state: new_state,
                message,
            })
            .await
            .is_ok()
    }
}

async fn run_connection_task<E>(
    config: WebsocketConnectionConfig,
    endpoints: Arc<E>,
    mut cmd_rx: mpsc::Receiver<WsCommand>,
    event_tx: mpsc::Sender<SessionEvent>,
    state: Arc<std::sync::RwLock<ConnectionState>>,
    active_base: Arc<std::sync::RwLock<Option<Url>>>,
) where
    E: Endpoints + Send + Sync + 'static,
{
    let ctx = TaskContext { event_tx, state };
    let mut cache = ForwardMsgCache::new();
    let mut auth_token = config.auth_token;
    let mut total_tries: u32 = 0;

    let http = match reqwest::Client::builder()
        .connect_timeout(HEALTH_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            ctx.set_state(
                ConnectionState::DisconnectedForever,
                Some(format!("cannot initialize HTTP client: {err}")),
            )
            .await;
            return;
        }
    };

    loop {
        // ── Pick a base URI via health checks ───────────────────────────
        if !ctx.set_state(ConnectionState::PingingServer, None).await {
            return;
        }

        let base = match ping_candidates(&http, &config.base_uri_list).await {
            Some(base) => base,
            None => {
                total_tries += 1;
                let message = format!(
                    "no server answered the health check on {} candidate URI(s)",
                    config.base_uri_list.len()
                );
                if give_up_or_wait(&ctx, &mut cmd_rx, total_tries, message).await {
                    return;
                }
                continue;
            }
        };

        info!("health check passed for {base}");
        endpoints.set_base_uri(&base);
        {
            let mut guard = active_base.write().unwrap_or_else(|e| e.into_inner());
            *guard = Some(base.clone());
        }

        // Host configuration is advisory; a missing endpoint is not fatal.
        match fetch_host_config(&http, &base).await {
            Ok(host_config) => {
                if ctx
                    .event_tx
                    .send(SessionEvent::HostConfig(host_config))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(err) => debug!("host config unavailable: {err}"),
        }

        // ── Open the duplex channel ─────────────────────────────────────
        if !ctx.set_state(ConnectionState::Connecting, None).await {
            return;
        }

        let request = match build_ws_request(&base, auth_token.take()) {
            Ok(request) => request,
            Err(err) => {
                // URI arithmetic failing is not retryable.
                ctx.set_state(ConnectionState::DisconnectedForever, Some(err.to_string()))
                    .await;
                return;
            }
        };

        let ws_stream = match tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request)).await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(err)) => {
                total_tries += 1;
                let message = format!("websocket handshake to {base} failed: {err}");
                if give_up_or_wait(&ctx, &mut cmd_rx, total_tries, message).await {
                    return;
                }
                continue;
            }
            Err(_) => {
                total_tries += 1;
                let message = format!("websocket handshake to {base} timed out");
                if give_up_or_wait(&ctx, &mut cmd_rx, total_tries, message).await {
                    return;
                }
                continue;
            }
        };

        total_tries = 0;
        if !ctx.set_state(ConnectionState::Connected, None).await {
            return;
        }

        match run_io_loop(ws_stream, &mut cmd_rx, &ctx, &mut cache, endpoints.as_ref()).await {
            IoOutcome::Shutdown => {
                debug!("websocket task shutting down");
                return;
            }
            IoOutcome::Fatal(message) => {
                ctx.set_state(ConnectionState::DisconnectedForever, Some(message))
                    .await;
                return;
            }
            IoOutcome::Reconnect => {
                total_tries += 1;
                // Socket dropped out from under an established session.
                if !ctx.set_state(ConnectionState::Connecting, None).await {
                    return;
                }
                let message = format!("connection to {base} lost");
                if give_up_or_wait(&ctx, &mut cmd_rx, total_tries, message).await {
                    return;
                }
            }
        }
    }
}

/// Emit a retry notice and sleep through the backoff, or transition to
/// `DisconnectedForever` once the retry budget is spent. Returns `true`
/// when the task must exit.
async fn give_up_or_wait(
    ctx: &TaskContext,
    cmd_rx: &mut mpsc::Receiver<WsCommand>,
    total_tries: u32,
    message: String,
) -> bool {
    if total_tries >= MAX_RETRIES_BEFORE_DISCONNECT {
        warn!("giving up after {total_tries} connection attempts: {message}");
        ctx.set_state(ConnectionState::DisconnectedForever, Some(message))
            .await;
        return true;
    }

    let delay = jitter(compute_backoff(total_tries));
    warn!(
        "connection attempt {total_tries}/{MAX_RETRIES_BEFORE_DISCONNECT} failed, retrying in {:?}: {message}",
        delay
    );
    if ctx
        .event_tx
        .send(SessionEvent::Retry {
            total_tries,
            message,
            next_delay: delay,
        })
        .await
        .is_err()
    {
        return true;
    }

    wait_or_disconnect(cmd_rx, delay).await
}

/// Sleep for `delay`, but wake early for a disconnect. Returns `true` on
/// disconnect or a dropped handle.
async fn wait_or_disconnect(cmd_rx: &mut mpsc::Receiver<WsCommand>, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            cmd = cmd_rx.recv() => match cmd {
                Some(WsCommand::Disconnect) | None => return true,
                Some(WsCommand::SendBackMsg(msg)) => {
                    warn!("cannot send message while disconnected: {msg:?}");
                }
                Some(WsCommand::IncrementCacheRunCount(_)) => {
                    debug!("cache run-count increment ignored while disconnected");
                }
            },
        }
    }
}

/// Try each candidate once, in order; the first healthy one wins.
async fn ping_candidates(client: &reqwest::Client, candidates: &[Url]) -> Option<Url> {
    for base in candidates {
        let health_url = uri::join_path(base, HEALTH_PATH);
        let request = client.get(health_url.clone()).send();
        match tokio::time::timeout(HEALTH_TIMEOUT, request).await {
            Ok(Ok(response)) if response.status().is_success() => {
                return Some(base.clone());
            }
            Ok(Ok(response)) => {
                debug!("health check at {health_url} returned {}", response.status());
            }
            Ok(Err(err)) => {
                debug!("health check at {health_url} failed: {err}");
            }
            Err(_) => {
                debug!("health check at {health_url} timed out");
            }
        }
    }
    None
}

/// Fetch the host configuration exposed next to the health endpoint.
async fn fetch_host_config(client: &reqwest::Client, base: &Url) -> Result<HostConfig> {
    let url = uri::join_path(base, HOST_CONFIG_PATH);
    let response = tokio::time::timeout(HEALTH_TIMEOUT, client.get(url.clone()).send())
        .await
        .map_err(|_| Error::timeout("host config fetch"))?
        .map_err(|e| Error::connection(format!("host config fetch failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::http(response.status().as_u16(), url.as_str()));
    }

    response
        .json::<HostConfig>()
        .await
        .map_err(|e| Error::decode(format!("bad host config payload: {e}")))
}

/// Build the websocket handshake request, carrying the auth token (when
/// claimed) in the subprotocol list.
fn build_ws_request(base: &Url, auth_token: Option<String>) -> Result<Request> {
    let ws_url = uri::build_ws_url(base, STREAM_PATH)?;
    let mut request = ws_url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::invalid_uri(format!("bad websocket URL '{ws_url}': {e}")))?;

    let protocols = match auth_token {
        Some(token) => format!("{WS_SUBPROTOCOL}, {token}"),
        None => WS_SUBPROTOCOL.to_string(),
    };
    let value = HeaderValue::from_str(&protocols)
        .map_err(|e| Error::invalid_uri(format!("auth token is not header-safe: {e}")))?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", value);

    Ok(request)
}

/// Exponential backoff for attempt `n` (1-based): 0.5 s, 1 s, 2 s, 4 s,
/// 8 s, then capped.
fn compute_backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let multiplier: u64 = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    let millis = (INITIAL_RETRY_BACKOFF.as_millis() as u64).saturating_mul(multiplier);
    Duration::from_millis(millis.min(MAX_RETRY_BACKOFF.as_millis() as u64))
}

/// Spread a delay by ±`RETRY_JITTER` so reconnecting clients don't stampede.
fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0 - RETRY_JITTER..=1.0 + RETRY_JITTER);
    delay.mul_f64(factor)
}

// ---------------------------------------------------------------------------
// IO loop
// ---------------------------------------------------------------------------

/// Run one connection's read/write select loop until it drops or is told
/// to stop.
async fn run_io_loop<E: Endpoints>(
    ws_stream: WsStream,
    cmd_rx: &mut mpsc::Receiver<WsCommand>,
    ctx: &TaskContext,
    cache: &mut ForwardMsgCache,
    endpoints: &E,
) -> IoOutcome {
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            // ── Incoming frame ───────────────────────────────────────────
            frame = ws_stream.next() => {
                let bytes = match frame {
                    Some(Ok(WsMessage::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(WsMessage::Binary(bytes))) => bytes.to_vec(),
                    Some(Ok(WsMessage::Close(_))) => {
                        debug!("received close frame");
                        return IoOutcome::Reconnect;
                    }
                    Some(Ok(_)) => continue, // ping/pong
                    Some(Err(err)) => {
                        warn!("websocket read error: {err}");
                        return IoOutcome::Reconnect;
                    }
                    None => {
                        debug!("websocket stream ended");
                        return IoOutcome::Reconnect;
                    }
                };

                // Decode and cache-resolve *before* touching the next
                // frame; the stream is a serial pipeline.
                match resolve_incoming(&bytes, cache, endpoints).await {
                    Ok(msg) => {
                        if ctx.event_tx.send(SessionEvent::Message(Box::new(msg))).await.is_err() {
                            return IoOutcome::Shutdown;
                        }
                    }
                    Err(err) if err.is_fatal() => {
                        return IoOutcome::Fatal(err.to_string());
                    }
                    Err(err) => {
                        // A failed cache fetch leaves a hole in the stream;
                        // the only safe recovery is a fresh connection.
                        warn!("message resolution failed: {err}");
                        let _ = ctx.event_tx.send(SessionEvent::error(err.to_string())).await;
                        return IoOutcome::Reconnect;
                    }
                }
            }

            // ── Outgoing command ─────────────────────────────────────────
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(WsCommand::SendBackMsg(msg)) => {
                        match msg.encode() {
                            Ok(bytes) => {
                                if let Err(err) = ws_sink.send(WsMessage::Binary(bytes.into())).await {
                                    warn!("websocket send failed: {err}");
                                    return IoOutcome::Reconnect;
                                }
                            }
                            Err(err) => {
                                warn!("dropping unencodable back message: {err}");
                            }
                        }
                    }
                    Some(WsCommand::IncrementCacheRunCount(max_age)) => {
                        cache.increment_run_count(max_age);
                    }
                    Some(WsCommand::Disconnect) | None => {
                        send_close(&mut ws_sink).await;
                        return IoOutcome::Shutdown;
                    }
                }
            }
        }
    }
}

/// Decode a frame and resolve it against the message cache.
async fn resolve_incoming<E: Endpoints>(
    bytes: &[u8],
    cache: &mut ForwardMsgCache,
    endpoints: &E,
) -> Result<ForwardMsg> {
    let msg = ForwardMsg::decode(bytes)?;
    cache.process_message(endpoints, msg).await
}

/// Send a close frame, ignoring any write errors.
async fn send_close(ws_sink: &mut SplitSink<WsStream, WsMessage>) {
    let _ = ws_sink.send(WsMessage::Close(None)).await;
    let _ = ws_sink.close().await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
