//! Push-notification channel.
//!
//! Discovers the socket endpoint through the authenticated session, opens a
//! WebSocket, and hands every decoded text frame to the client's
//! [`ObserverRegistry`](crate::ObserverRegistry). Runs as its own tokio task
//! so lock/unlock commands never wait on it.
//!
//! Lifecycle: `Idle -> Connecting -> Listening -> (Closed | Failed)`.
//! A normal closure (code 1000) ends in `Closed`; anything else ends in
//! `Failed` and the error is returned from [`PushHandle::join`]. Automatic
//! reconnection is opt-in via [`ReconnectConfig`].
//!
//! # Example
//!
//! ```rust,ignore
//! use kevo_api::{Credentials, KevoClient};
//!
//! let client = KevoClient::with_credentials(Credentials::new("me", password));
//! client.subscribe(|msg| println!("bolt: {:?}", msg.bolt_state()));
//!
//! let handle = client.connect_websocket();
//! // ... later
//! handle.shutdown();
//! handle.join().await?;
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::client::KevoClient;
use crate::error::Error;
use crate::models::PushMessage;
use crate::observers::ObserverRegistry;

const CLOSE_NORMAL: u16 = 1000;
/// Reported when a close frame carries no status code.
const CLOSE_NO_STATUS: u16 = 1005;
/// Reported when the stream ends without a close frame.
const CLOSE_ABNORMAL: u16 = 1006;

// ── ChannelState ─────────────────────────────────────────────────────

/// Where the push channel is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Listening,
    Closed,
    Failed,
}

impl ChannelState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff for reconnecting after abnormal closures.
///
/// Only transient failures are retried (see [`Error::is_transient`]); a
/// rejected login or a failed endpoint lookup ends the channel at once.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push task.
///
/// Dropping the handle detaches the task; it keeps running until the
/// server closes the socket or the client is shut down.
#[derive(Debug)]
pub struct PushHandle {
    task: JoinHandle<Result<(), Error>>,
    cancel: CancellationToken,
    state: watch::Receiver<ChannelState>,
}

impl PushHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Ask the task to close the socket and stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end and return its outcome.
    ///
    /// `Ok(())` after a normal closure or [`shutdown`](Self::shutdown);
    /// the channel error otherwise.
    pub async fn join(self) -> Result<(), Error> {
        self.task
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))?
    }
}

// ── Spawning ─────────────────────────────────────────────────────────

impl KevoClient {
    /// Start the push channel without reconnection.
    ///
    /// Returns immediately; URL discovery and the handshake happen on the
    /// spawned task. Must be called from within a tokio runtime.
    pub fn connect_websocket(&self) -> PushHandle {
        self.connect_websocket_with(None)
    }

    /// Start the push channel, reconnecting on abnormal closures when
    /// `reconnect` is set.
    pub fn connect_websocket_with(&self, reconnect: Option<ReconnectConfig>) -> PushHandle {
        let (state_tx, state_rx) = watch::channel(ChannelState::Idle);
        let cancel = CancellationToken::new();

        let client = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            push_loop(client, reconnect, task_cancel, state_tx).await
        });

        PushHandle {
            task,
            cancel,
            state: state_rx,
        }
    }
}

// ── Background loop ──────────────────────────────────────────────────

async fn push_loop(
    client: KevoClient,
    reconnect: Option<ReconnectConfig>,
    cancel: CancellationToken,
    state: watch::Sender<ChannelState>,
) -> Result<(), Error> {
    let mut attempt: u32 = 0;

    loop {
        state.send_replace(ChannelState::Connecting);

        let err = match connect_and_read(&client, &cancel, &state).await {
            Ok(()) => {
                state.send_replace(ChannelState::Closed);
                debug!("push channel closed");
                return Ok(());
            }
            Err(e) => e,
        };

        // A connection that made it to Listening resets the backoff.
        if *state.borrow() == ChannelState::Listening {
            attempt = 0;
        }

        let Some(config) = reconnect.as_ref() else {
            warn!(error = %err, "push channel failed");
            state.send_replace(ChannelState::Failed);
            return Err(err);
        };

        if !err.is_transient() {
            warn!(error = %err, "push channel failed with a permanent error, not reconnecting");
            state.send_replace(ChannelState::Failed);
            return Err(err);
        }

        if config.max_retries.is_some_and(|max| attempt >= max) {
            warn!(error = %err, attempt, "push channel reconnection limit reached, giving up");
            state.send_replace(ChannelState::Failed);
            return Err(err);
        }

        let delay = calculate_backoff(attempt, config);
        warn!(
            error = %err,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "push channel dropped, reconnecting"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                state.send_replace(ChannelState::Closed);
                return Ok(());
            }
            () = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}

/// One connection: discover URL, connect, read until the socket ends.
///
/// `Ok(())` means normal closure or cancellation.
async fn connect_and_read(
    client: &KevoClient,
    cancel: &CancellationToken,
    state: &watch::Sender<ChannelState>,
) -> Result<(), Error> {
    let url = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        url = client.websocket_url() => url?,
    };

    info!(host = url.host_str().unwrap_or(""), "Connecting to push channel");

    let connect = tokio_tungstenite::connect_async(url.as_str());
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = connect => result.map_err(|e| Error::WebSocketConnect(e.to_string()))?,
    };

    state.send_replace(ChannelState::Listening);
    info!("Push channel connected");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("push channel cancelled, closing socket");
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "failed to send close frame");
                }
                return Ok(());
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    dispatch_text(&text, client.observers());
                }
                Some(Ok(Message::Close(frame))) => {
                    // Flush the queued close reply so the handshake completes.
                    if let Err(e) = write.close().await {
                        debug!(error = %e, "failed to complete close handshake");
                    }
                    return close_outcome(frame);
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong itself
                    trace!("push channel ping");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
                None => {
                    return Err(Error::WebSocketClosed {
                        code: CLOSE_ABNORMAL,
                        reason: "stream ended without close frame".into(),
                    });
                }
            },
        }
    }
}

// ── Frame handling ───────────────────────────────────────────────────

/// Decode a text frame and fan it out. Undecodable frames are skipped.
fn dispatch_text(text: &str, observers: &ObserverRegistry) -> usize {
    match PushMessage::from_text(text) {
        Ok(message) => {
            trace!(bolt_state = ?message.bolt_state(), "push message received");
            observers.dispatch(&message)
        }
        Err(e) => {
            warn!(error = %e, "Failed to decode push message, skipping");
            0
        }
    }
}

/// Map a received close frame to the task outcome.
fn close_outcome(frame: Option<CloseFrame>) -> Result<(), Error> {
    let Some(frame) = frame else {
        info!("Push channel close frame received (no payload)");
        return Err(Error::WebSocketClosed {
            code: CLOSE_NO_STATUS,
            reason: String::new(),
        });
    };

    let code = u16::from(frame.code);
    info!(code, reason = %frame.reason, "Push channel close frame received");

    if code == CLOSE_NORMAL {
        Ok(())
    } else {
        Err(Error::WebSocketClosed {
            code,
            reason: frame.reason.to_string(),
        })
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
