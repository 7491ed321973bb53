//! Streaming token-launch feed connection
//!
//! [`TokenFeed`] owns at most one websocket at a time. After every close or
//! transport error it waits the configured delay and runs the whole
//! lifecycle again (connect, subscribe, read) with no retry cap. Only
//! [`TokenFeed::stop`] or a dropped frame consumer ends the loop.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use tokenfeed_core::{FeedConfig, FeedError, FeedResult, RawFrame};

use crate::frames::parse_frame;
use crate::status::FeedStatus;

/// Why a connection session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    Shutdown,
    ConsumerGone,
    AlreadyOpen,
}

/// Caller-owned connection manager
pub struct TokenFeed {
    config: FeedConfig,
    status: Arc<FeedStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl TokenFeed {
    pub fn new(config: FeedConfig) -> Self {
        let status = Arc::new(FeedStatus::new(config.raw_trail_capacity));
        Self {
            config,
            status,
            task: Mutex::new(None),
            shutdown: Mutex::new(None),
        }
    }

    pub fn status(&self) -> Arc<FeedStatus> {
        Arc::clone(&self.status)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Spawn the connection loop, forwarding parsed frames to `frames_tx`.
    ///
    /// Returns `false` (and does nothing) if the loop is already running.
    pub fn start(&self, frames_tx: mpsc::Sender<RawFrame>) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().map_or(false, |handle| !handle.is_finished()) {
            debug!("Token feed already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shutdown.lock() = Some(shutdown_tx);

        let config = self.config.clone();
        let status = Arc::clone(&self.status);
        *task = Some(tokio::spawn(async move {
            run(config, status, frames_tx, shutdown_rx).await;
        }));

        info!("Started token feed for {}", self.config.url);
        true
    }

    /// Close the socket and cancel any pending reconnect
    pub async fn stop(&self) {
        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(());
        }

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Token feed task failed: {}", e);
            }
        }

        self.status.mark_disconnected();
        info!("Stopped token feed");
    }
}

async fn run(
    config: FeedConfig,
    status: Arc<FeedStatus>,
    frames_tx: mpsc::Sender<RawFrame>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let delay = config.reconnect_delay();

    loop {
        match connect_and_listen(&config, &status, &frames_tx, &mut shutdown_rx).await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::ConsumerGone) => {
                info!("Frame consumer dropped, stopping token feed");
                break;
            }
            Ok(SessionEnd::AlreadyOpen) => debug!("Socket already open, skipping connect"),
            Ok(SessionEnd::Closed) => info!("Token feed connection closed"),
            Err(e) => {
                error!("Token feed error: {}", e);
                status.record_error(&e);
            }
        }

        status.mark_disconnected();
        status.record_reconnect();
        warn!("Reconnecting to {} in {:?}", config.url, delay);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = &mut shutdown_rx => break,
        }
    }
}

async fn connect_and_listen(
    config: &FeedConfig,
    status: &Arc<FeedStatus>,
    frames_tx: &mpsc::Sender<RawFrame>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> FeedResult<SessionEnd> {
    let Some(_claim) = status.claim_socket() else {
        return Ok(SessionEnd::AlreadyOpen);
    };

    info!("Connecting to token feed at {}", config.url);

    let ws_stream = tokio::select! {
        connected = connect_async(config.url.as_str()) => {
            connected.map_err(|e| FeedError::ConnectionFailed(e.to_string()))?.0
        }
        _ = &mut *shutdown_rx => return Ok(SessionEnd::Shutdown),
    };
    let (mut write, mut read) = ws_stream.split();

    status.mark_connected();
    info!("Connected to token feed");

    write
        .send(Message::Text(config.subscribe_message().to_string()))
        .await
        .map_err(|e| FeedError::SubscriptionFailed(e.to_string()))?;
    debug!("Sent {} subscription", config.subscribe_method);

    loop {
        tokio::select! {
            _ = &mut *shutdown_rx => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if !forward(&text, status, frames_tx).await {
                        return Ok(SessionEnd::ConsumerGone);
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        if !forward(&text, status, frames_tx).await {
                            return Ok(SessionEnd::ConsumerGone);
                        }
                    }
                    Err(e) => warn!("Dropping non-UTF-8 binary frame: {}", e),
                },
                Some(Ok(Message::Ping(data))) => {
                    write
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| FeedError::Transport(e.to_string()))?;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("WebSocket closed by server: {:?}", frame);
                    return Ok(SessionEnd::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(FeedError::Transport(e.to_string())),
                None => return Ok(SessionEnd::Closed),
            }
        }
    }
}

/// Parse a frame, record it in the trail and hand it to the consumer.
///
/// Returns `false` once the consumer is gone.
async fn forward(text: &str, status: &FeedStatus, frames_tx: &mpsc::Sender<RawFrame>) -> bool {
    let payload = match parse_frame(text) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Dropping malformed frame: {}", e);
            return true;
        }
    };

    let frame = RawFrame::new(payload);
    status.push_frame(frame.clone());

    if frames_tx.send(frame).await.is_err() {
        debug!("Frame channel closed");
        return false;
    }
    true
}
