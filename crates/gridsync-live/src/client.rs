//! Background WebSocket reader for live row transactions.
//!
//! [`LiveTransactionChannel::spawn`] validates the endpoint, starts a Tokio
//! task that owns the socket, and hands back a receiver of [`LiveEvent`]s.
//! The task never writes application data; it only reads frames, turns them
//! into [`RowTransaction`]s and reports connection state changes.
//!
//! ```text
//! ┌──────────────────────────┐           ┌──────────────────────────────┐
//! │ LiveTransactionChannel   │──cmd────▶ │ Background task               │
//! │   connection_state()     │  chan     │   connect / read / reconnect  │
//! │   close()                │           │   frame → parse_live_message  │
//! └──────────────────────────┘           └──────────────┬───────────────┘
//!                                                       │ evt chan
//!                                                       ▼
//!                                         mpsc::Receiver<LiveEvent>
//! ```
//!
//! Dropping the channel closes the command channel, which makes the task send
//! a Close frame and exit.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use gridsync_core::prelude::*;
use gridsync_core::RowTransaction;

use crate::protocol::parse_live_message;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Initial reconnection backoff duration.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum reconnection backoff duration (cap).
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Maximum number of consecutive reconnection attempts before giving up.
const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Capacity of the command channel.
const CMD_CHANNEL_CAPACITY: usize = 4;

/// Capacity of the event channel (transactions can be bursty).
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Current connection state of a [`LiveTransactionChannel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Not connected and not attempting to connect.
    Disconnected,
    /// Initial connection attempt in progress.
    Connecting,
    /// Connected and receiving frames.
    Connected,
    /// Connection lost; background task is retrying.
    Reconnecting {
        /// The current reconnection attempt number (1-indexed).
        attempt: u32,
    },
}

/// When and how often to reconnect after the socket drops.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that stops after the first connection ends.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Backoff before reconnection attempt `attempt`.
    ///
    /// The formula is `initial_backoff * 2^(attempt-1)`, capped at
    /// `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier: u32 = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(multiplier)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// What the background task reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// A well-formed frame, ready to apply to the view.
    Transaction(RowTransaction),
    /// The socket changed state.
    StateChanged(ConnectionState),
}

// ---------------------------------------------------------------------------
// Internal command type
// ---------------------------------------------------------------------------

enum ChannelCommand {
    /// Close the socket and stop the background task.
    Close,
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

type SharedState = Arc<std::sync::RwLock<ConnectionState>>;

// ---------------------------------------------------------------------------
// LiveTransactionChannel
// ---------------------------------------------------------------------------

/// Owner handle for the live transaction task.
pub struct LiveTransactionChannel {
    url: String,
    cmd_tx: mpsc::Sender<ChannelCommand>,
    state: SharedState,
}

impl std::fmt::Debug for LiveTransactionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveTransactionChannel")
            .field("url", &self.url)
            .field("connection_state", &self.connection_state())
            .finish()
    }
}

impl LiveTransactionChannel {
    /// Start streaming transactions from `url`.
    ///
    /// Must be called from within a Tokio runtime. The first connection is
    /// made in the background, so an unreachable host shows up as
    /// [`LiveEvent::StateChanged`] rather than an error here.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `url` is not a `ws://` or `wss://` URL.
    pub fn spawn(url: &str, policy: ReconnectPolicy) -> Result<(Self, mpsc::Receiver<LiveEvent>)> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::config(format!("invalid live endpoint {url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "live endpoint must use ws:// or wss://, got {}://",
                parsed.scheme()
            )));
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let state = Arc::new(std::sync::RwLock::new(ConnectionState::Connecting));

        info!("Live channel: streaming transactions from {}", url);
        tokio::spawn(run_channel_task(
            url.to_string(),
            policy,
            cmd_rx,
            event_tx,
            Arc::clone(&state),
        ));

        Ok((
            Self {
                url: url.to_string(),
                cmd_tx,
                state,
            },
            event_rx,
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Return `true` if the socket is currently open.
    pub fn is_connected(&self) -> bool {
        *self.state.read().unwrap_or_else(|e| e.into_inner()) == ConnectionState::Connected
    }

    /// Ask the background task to close the socket and exit.
    pub fn close(&self) {
        // Full or closed both mean the task is already on its way out.
        let _ = self.cmd_tx.try_send(ChannelCommand::Close);
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

async fn run_channel_task(
    url: String,
    policy: ReconnectPolicy,
    mut cmd_rx: mpsc::Receiver<ChannelCommand>,
    event_tx: mpsc::Sender<LiveEvent>,
    state: SharedState,
) {
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            if !policy.enabled {
                break;
            }
            if attempt > policy.max_attempts {
                error!(
                    "Live channel: exceeded {} reconnection attempts, giving up",
                    policy.max_attempts
                );
                break;
            }

            set_state(&state, &event_tx, ConnectionState::Reconnecting { attempt });
            let backoff = policy.backoff(attempt);
            warn!(
                "Live channel: connection lost, retrying in {:?} (attempt {}/{})",
                backoff, attempt, policy.max_attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ChannelCommand::Close) | None => break,
                    }
                }
            }
        }

        match connect_ws(&url).await {
            Ok(ws_stream) => {
                if attempt > 0 {
                    info!("Live channel: reconnected (attempt {})", attempt);
                }
                set_state(&state, &event_tx, ConnectionState::Connected);
                attempt = 0;

                if !run_read_loop(ws_stream, &mut cmd_rx, &event_tx).await {
                    break;
                }
                attempt = 1;
            }
            Err(err) => {
                warn!("Live channel: {}", err);
                attempt += 1;
            }
        }
    }

    set_state(&state, &event_tx, ConnectionState::Disconnected);
    debug!("Live channel background task exiting");
}

/// Read frames from one connection.
///
/// Returns `true` if the connection was lost (caller may reconnect), or
/// `false` if the task should terminate.
async fn run_read_loop(
    ws_stream: WsStream,
    cmd_rx: &mut mpsc::Receiver<ChannelCommand>,
    event_tx: &mpsc::Sender<LiveEvent>,
) -> bool {
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if !forward_frame(text.as_str(), event_tx).await {
                            send_close(&mut ws_sink).await;
                            return false;
                        }
                    }
                    Some(Ok(WsMessage::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            if !forward_frame(text, event_tx).await {
                                send_close(&mut ws_sink).await;
                                return false;
                            }
                        }
                        Err(_) => warn!("Live channel: dropping non UTF-8 binary frame"),
                    },
                    Some(Ok(WsMessage::Close(_))) => {
                        debug!("Live channel: received Close frame");
                        return true;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("Live channel: WebSocket read error: {}", err);
                        return true;
                    }
                    None => {
                        debug!("Live channel: WebSocket stream ended");
                        return true;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Close) | None => {
                        debug!("Live channel: closing on request");
                        send_close(&mut ws_sink).await;
                        return false;
                    }
                }
            }
        }
    }
}

/// Parse one frame and hand the transaction on.
///
/// Malformed frames are logged and dropped. Returns `false` once nobody is
/// listening any more.
async fn forward_frame(text: &str, event_tx: &mpsc::Sender<LiveEvent>) -> bool {
    match parse_live_message(text) {
        Ok(transaction) => {
            trace!("Live channel: {} row patch(es)", transaction.len());
            event_tx
                .send(LiveEvent::Transaction(transaction))
                .await
                .is_ok()
        }
        Err(err) => {
            warn!("Live channel: {}", err);
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

async fn connect_ws(url: &str) -> Result<WsStream> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|err| Error::live(format!("failed to connect to {url}: {err}")))?;
    Ok(ws_stream)
}

fn set_state(state: &SharedState, event_tx: &mpsc::Sender<LiveEvent>, next: ConnectionState) {
    {
        let mut guard = state.write().unwrap_or_else(|e| e.into_inner());
        if *guard == next {
            return;
        }
        *guard = next.clone();
    }
    let _ = event_tx.try_send(LiveEvent::StateChanged(next));
}

/// Send a WebSocket Close frame, ignoring any write errors.
async fn send_close(ws_sink: &mut SplitSink<WsStream, WsMessage>) {
    let _ = ws_sink.send(WsMessage::Close(None)).await;
    let _ = ws_sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    async fn next_transaction(rx: &mut mpsc::Receiver<LiveEvent>) -> RowTransaction {
        loop {
            let event = tokio::time::timeout(TEST_TIMEOUT, rx.recv())
                .await
                .expect("timed out waiting for a transaction")
                .expect("event channel closed");
            if let LiveEvent::Transaction(tx) = event {
                return tx;
            }
        }
    }

    async fn wait_for_state(rx: &mut mpsc::Receiver<LiveEvent>, wanted: ConnectionState) {
        loop {
            let event = tokio::time::timeout(TEST_TIMEOUT, rx.recv())
                .await
                .expect("timed out waiting for state")
                .expect("event channel closed");
            if event == LiveEvent::StateChanged(wanted.clone()) {
                return;
            }
        }
    }

    // -- ConnectionState -----------------------------------------------------

    #[test]
    fn test_connection_state_eq() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(ConnectionState::Connected, ConnectionState::Disconnected);
        assert_ne!(
            ConnectionState::Reconnecting { attempt: 1 },
            ConnectionState::Reconnecting { attempt: 2 }
        );
    }

    // -- ReconnectPolicy -----------------------------------------------------

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(5), Duration::from_secs(16));
        assert_eq!(policy.backoff(6), Duration::from_secs(30));
        assert_eq!(policy.backoff(64), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_respects_custom_policy() {
        let policy = ReconnectPolicy {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(1),
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
    }

    #[test]
    fn test_disabled_policy() {
        let policy = ReconnectPolicy::disabled();
        assert!(!policy.enabled);
        assert_eq!(policy.max_attempts, MAX_RECONNECT_ATTEMPTS);
    }

    // -- LiveTransactionChannel ----------------------------------------------

    #[tokio::test]
    async fn test_spawn_rejects_non_websocket_url() {
        let err = LiveTransactionChannel::spawn("http://localhost:9000", ReconnectPolicy::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(LiveTransactionChannel::spawn("not a url", ReconnectPolicy::default()).is_err());
    }

    #[tokio::test]
    async fn test_channel_forwards_sanitized_transactions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(WsMessage::Text(r#"{"update":[{"id":1,"price":NaN}]}"#.into()))
                .await
                .unwrap();
            ws.send(WsMessage::Text("not json".into())).await.unwrap();
            ws.send(WsMessage::Text(r#"{"update":[{"id":2,"price":3.5}]}"#.into()))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (channel, mut rx) =
            LiveTransactionChannel::spawn(&format!("ws://{addr}"), ReconnectPolicy::disabled())
                .unwrap();

        let first = next_transaction(&mut rx).await;
        assert_eq!(first.update[0]["id"], json!(1));
        assert_eq!(first.update[0]["price"], Value::Null);

        // The malformed frame in between is dropped without ending the stream.
        let second = next_transaction(&mut rx).await;
        assert_eq!(second.update[0]["price"], json!(3.5));
        assert!(channel.is_connected());

        channel.close();
        wait_for_state(&mut rx, ConnectionState::Disconnected).await;
        assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_without_reconnect_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (channel, mut rx) =
            LiveTransactionChannel::spawn(&format!("ws://{addr}"), ReconnectPolicy::disabled())
                .unwrap();

        wait_for_state(&mut rx, ConnectionState::Disconnected).await;
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_server_close_triggers_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // First connection closes straight away, second one delivers data.
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = ws.close(None).await;

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(WsMessage::Text(r#"{"update":[{"id":9}]}"#.into()))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let policy = ReconnectPolicy {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            ..ReconnectPolicy::default()
        };
        let (_channel, mut rx) =
            LiveTransactionChannel::spawn(&format!("ws://{addr}"), policy).unwrap();

        wait_for_state(&mut rx, ConnectionState::Reconnecting { attempt: 1 }).await;
        let tx = next_transaction(&mut rx).await;
        assert_eq!(tx.update[0]["id"], json!(9));
    }
}
