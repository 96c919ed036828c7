//! Persistent WebSocket subscription with unbounded, exponentially
//! backed-off reconnection.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use rand::rngs::SmallRng;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use wall_core::{ConnectionState, Reconnector};

use crate::config::WallConfig;
use crate::engine::{ChannelMessage, Source};
use crate::error::{Result, SyncError};
use crate::wire::{PushEvent, parse_event};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bound on sending a close frame during shutdown.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// Why a connected socket stopped.
enum StreamEnd {
    Cancelled,
    ReceiverGone,
    Closed,
    Failed(String),
}

pub struct PushChannel {
    push_url: Url,
    connect_timeout: Duration,
    reconnector: Reconnector,
}

impl PushChannel {
    pub fn new(config: &WallConfig, rng: SmallRng) -> Result<Self> {
        Ok(Self {
            push_url: config.push_url()?,
            connect_timeout: config.connect_timeout(),
            reconnector: Reconnector::new(config.backoff_policy(), rng),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.reconnector.state()
    }

    /// Open the subscription. The connect timeout covers the TCP connect
    /// and the upgrade handshake; the socket itself stays open indefinitely.
    async fn connect(&self) -> Result<Socket> {
        let handshake = connect_async(self.push_url.as_str());
        let (socket, _response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| SyncError::Timeout("push connect"))??;
        Ok(socket)
    }

    /// Subscribe, forward events, and reconnect forever until cancelled.
    pub async fn run(mut self, tx: mpsc::Sender<ChannelMessage>, cancel: CancellationToken) {
        tracing::info!(url = %self.push_url, "push channel started");

        loop {
            let state = self.reconnector.connecting();
            if tx.send(ChannelMessage::Connection(state)).await.is_err() {
                break;
            }

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.connect() => result,
            };

            match connected {
                Ok(socket) => {
                    let state = self.reconnector.connected();
                    tracing::info!("push connected");
                    if tx.send(ChannelMessage::Connection(state)).await.is_err() {
                        break;
                    }
                    match pump(socket, &tx, &cancel).await {
                        StreamEnd::Cancelled | StreamEnd::ReceiverGone => break,
                        StreamEnd::Closed => tracing::info!("push socket closed by server"),
                        StreamEnd::Failed(e) => tracing::warn!("push socket dropped: {e}"),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        retry = state.retry_count,
                        kind = ?e.kind(),
                        "push connect failed: {e}"
                    );
                }
            }

            let delay = self.reconnector.lost(Instant::now());
            let state = self.reconnector.state();
            tracing::debug!(
                retry = state.retry_count,
                delay_ms = delay.as_millis() as u64,
                "push backing off"
            );
            if tx.send(ChannelMessage::Connection(state)).await.is_err() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let state = self.reconnector.disconnected();
        let _ = tx.try_send(ChannelMessage::Connection(state));
        tracing::debug!("push channel stopped");
    }
}

async fn pump(
    mut socket: Socket,
    tx: &mpsc::Sender<ChannelMessage>,
    cancel: &CancellationToken,
) -> StreamEnd {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => None,
            next = socket.next() => Some(next),
        };
        let Some(next) = next else {
            let _ = tokio::time::timeout(CLOSE_GRACE, socket.close(None)).await;
            return StreamEnd::Cancelled;
        };
        let message = match next {
            None | Some(Ok(Message::Close(_))) => return StreamEnd::Closed,
            Some(Err(e)) => return StreamEnd::Failed(e.to_string()),
            Some(Ok(message)) => message,
        };
        let raw = match &message {
            Message::Text(text) => text.as_str(),
            Message::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("discarding non-UTF-8 push frame: {e}");
                    continue;
                }
            },
            _ => continue,
        };
        if raw.trim().is_empty() {
            continue;
        }

        let parsed = match parse_event(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("discarding malformed push event: {e}");
                continue;
            }
        };
        match &parsed {
            PushEvent::Hello { ideas, rejected, .. } => {
                if *rejected > 0 {
                    tracing::warn!(rejected, "hello carried malformed ideas");
                }
                tracing::debug!(ideas = ideas.len(), "push hello");
            }
            PushEvent::IdeaAdded(idea) => tracing::debug!(idea_id = %idea.id, "push idea"),
            PushEvent::HeaderChanged(_) => tracing::debug!("push header"),
            PushEvent::Unknown(kind) => tracing::debug!(kind, "ignoring push event"),
        }
        if let Some(update) = parsed.into_update() {
            let message = ChannelMessage::Update {
                source: Source::Push,
                update,
            };
            if tx.send(message).await.is_err() {
                return StreamEnd::ReceiverGone;
            }
        }
    }
}
