//! Panel Transport
//!
//! A single-client WebSocket listener on loopback. The panel connects to
//! us; the server never dials out. One JSON envelope per text frame in both
//! directions.
//!
//! Connection policy is last-writer-wins: a new panel connection replaces
//! the previous one, and requests tied to the replaced connection are
//! rejected with a disconnect. Inbound frames above 10 MiB are dropped with
//! a logged protocol error. Shutdown is deterministic: the listener stops
//! accepting, the current connection closes, and every outstanding request
//! is rejected.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::broker::{FrameSink, RequestBroker};
use super::config::BridgeConfig;
use super::envelope::ScriptResponse;
use super::error::{BridgeError, BridgeResult};

/// Inbound frames larger than this are dropped.
const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

type PanelWriter = SplitSink<WebSocketStream<TcpStream>, Message>;

/// The WebSocket listener and the write half of the current connection.
///
/// Implements [`FrameSink`] for the broker: sends go to whichever panel is
/// connected right now, or fail with a disconnect.
pub struct PanelTransport {
    connected: AtomicBool,
    writer: tokio::sync::Mutex<Option<PanelWriter>>,
    /// Bumped on every accepted connection so a stale reader's cleanup
    /// cannot tear down its replacement.
    generation: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PanelTransport {
    pub fn new() -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Arc::new(Self {
            connected: AtomicBool::new(false),
            writer: tokio::sync::Mutex::new(None),
            generation: AtomicU64::new(0),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Bind per the config and run the accept loop until shutdown. Returns
    /// the bound address once listening.
    pub async fn start(
        self: &Arc<Self>,
        config: &BridgeConfig,
        broker: Arc<RequestBroker>,
    ) -> BridgeResult<std::net::SocketAddr> {
        config.validate().map_err(BridgeError::Transport)?;
        self.start_on(&config.bind_addr(), broker).await
    }

    /// Bind to an explicit loopback address. Exposed for tests and
    /// embedders that manage ports themselves.
    pub async fn start_on(
        self: &Arc<Self>,
        addr: &str,
        broker: Arc<RequestBroker>,
    ) -> BridgeResult<std::net::SocketAddr> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Transport(format!("bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        log::info!("panel transport listening on ws://{}", local_addr);

        let transport = self.clone();
        tokio::spawn(async move {
            transport.accept_loop(listener, broker).await;
        });
        Ok(local_addr)
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, broker: Arc<RequestBroker>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            log::info!("panel connection from {}", peer);
                            match tokio_tungstenite::accept_async(stream).await {
                                Ok(ws) => self.install_connection(ws, broker.clone()).await,
                                Err(e) => log::warn!("websocket handshake failed: {}", e),
                            }
                        }
                        Err(e) => {
                            log::warn!("accept failed: {}", e);
                        }
                    }
                }
            }
        }
        log::info!("panel transport shutting down");
        self.teardown(&broker, "server shutdown").await;
    }

    /// Make a freshly accepted connection the current one, replacing and
    /// rejecting whatever was there before.
    async fn install_connection(
        self: &Arc<Self>,
        ws: WebSocketStream<TcpStream>,
        broker: Arc<RequestBroker>,
    ) {
        let (writer, mut reader) = ws.split();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = {
            let mut slot = self.writer.lock().await;
            slot.replace(writer)
        };
        self.connected.store(true, Ordering::SeqCst);
        if previous.is_some() {
            log::warn!("panel reconnected; replacing previous connection");
            broker.fail_all_pending("connection replaced");
        }

        let transport = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => transport.handle_frame(&text, &broker),
                    Ok(Message::Binary(bytes)) => {
                        log::warn!(
                            "protocol error: unexpected binary frame ({} bytes) dropped",
                            bytes.len()
                        );
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {} // ping/pong handled by the stream
                    Err(e) => {
                        log::warn!("websocket read error: {}", e);
                        break;
                    }
                }
            }
            // Only the reader of the *current* connection clears state; a
            // replaced reader exits quietly.
            if transport.generation.load(Ordering::SeqCst) == generation {
                log::info!("panel disconnected");
                transport.teardown(&broker, "panel disconnected").await;
            }
        });
    }

    fn handle_frame(&self, text: &str, broker: &Arc<RequestBroker>) {
        if text.len() > MAX_FRAME_BYTES {
            log::warn!(
                "protocol error: frame of {} bytes exceeds the {} byte cap; dropped",
                text.len(),
                MAX_FRAME_BYTES
            );
            return;
        }
        match ScriptResponse::from_frame(text) {
            Ok(response) => broker.resolve_response(response),
            Err(e) => log::warn!("dropping bad frame: {}", e),
        }
    }

    async fn teardown(&self, broker: &Arc<RequestBroker>, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let _ = writer.close().await;
        }
        broker.fail_all_pending(reason);
    }

    /// Stop accepting, close the current connection, and reject everything
    /// outstanding. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[async_trait]
impl FrameSink for PanelTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_frame(&self, frame: String) -> BridgeResult<()> {
        let mut slot = self.writer.lock().await;
        match slot.as_mut() {
            None => Err(BridgeError::Disconnected),
            Some(writer) => match writer.send(Message::Text(frame)).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    // The write half is dead; drop it so later sends fail
                    // fast with a disconnect.
                    slot.take();
                    self.connected.store(false, Ordering::SeqCst);
                    Err(BridgeError::Transport(format!("send failed: {}", e)))
                }
            },
        }
    }
}
