//! Request Broker
//!
//! Turns "send this script to the panel and wait for its result" into one
//! awaitable call. The broker owns a registry of in-flight requests keyed
//! by correlation id; the transport loop resolves entries as response
//! frames arrive, and the awaiting tool call wakes with exactly the
//! response that carries its id.
//!
//! # Architecture
//!
//! ```text
//! tool call ──► send_script ──► FrameSink ──► panel
//!                   │                           │
//!                   ▼                           ▼
//!            pending registry ◄── resolve_response (transport loop)
//! ```
//!
//! For every correlation id exactly one of three things happens: the
//! response resolves the awaiter, the deadline fires, or the connection
//! drops. In all three cases the registry entry is removed before the
//! caller observes the outcome, so a late response can only ever be an
//! orphan — it is logged as a protocol error and dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::envelope::{ScriptCommand, ScriptRequest, ScriptResponse};
use super::error::{BridgeError, BridgeResult};

/// Outbound side of the transport as the broker sees it.
///
/// `send_frame` must either deliver the whole frame or error; a partial
/// write surfaces as a transport error on the awaiting call.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Whether a panel peer is currently connected.
    fn is_connected(&self) -> bool;

    /// Deliver one text frame to the connected peer.
    async fn send_frame(&self, frame: String) -> BridgeResult<()>;
}

/// One in-flight request awaiting its response.
struct PendingRequest {
    trace_id: String,
    /// Human-facing command tag, kept for log lines only.
    command: Option<String>,
    completion: oneshot::Sender<ScriptResponse>,
}

/// Correlates outbound scripts with inbound responses across the tool and
/// transport sides.
pub struct RequestBroker {
    sink: Arc<dyn FrameSink>,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    next_id: AtomicU64,
    default_timeout: Duration,
}

impl RequestBroker {
    pub fn new(sink: Arc<dyn FrameSink>, default_timeout: Duration) -> Self {
        Self {
            sink,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            default_timeout,
        }
    }

    /// Requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("broker registry poisoned").len()
    }

    /// Send a script and await its correlated response under the default
    /// timeout.
    pub async fn send_script(
        &self,
        script: impl Into<String>,
        command: Option<ScriptCommand>,
    ) -> BridgeResult<ScriptResponse> {
        self.send_script_with_timeout(script, command, self.default_timeout)
            .await
    }

    /// Send a script and await its correlated response.
    ///
    /// Fails immediately with [`BridgeError::Disconnected`] when no panel is
    /// connected — requests are never queued for a future connection.
    pub async fn send_script_with_timeout(
        &self,
        script: impl Into<String>,
        command: Option<ScriptCommand>,
        timeout: Duration,
    ) -> BridgeResult<ScriptResponse> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let trace_id = format!(
            "tr-{}-{}",
            id,
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );

        if !self.sink.is_connected() {
            log::warn!("send_script: no panel connected (trace {})", trace_id);
            return Err(BridgeError::Disconnected);
        }

        let command_tag = command.as_ref().map(|c| c.command_type.clone());
        let (tx, mut rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("broker registry poisoned");
            pending.insert(
                id,
                PendingRequest {
                    trace_id: trace_id.clone(),
                    command: command_tag.clone(),
                    completion: tx,
                },
            );
        }

        let mut request = ScriptRequest::new(id, script);
        if let Some(command) = command {
            request = request.with_command(command);
        }
        let frame = match request.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.remove(id);
                return Err(e);
            }
        };

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "sending request id={} trace={} command={:?} ({} bytes)",
                id,
                trace_id,
                command_tag,
                frame.len()
            );
        }
        if let Err(e) = self.sink.send_frame(frame).await {
            self.remove(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(response)) => Ok(response),
            // The sender was dropped: the connection went away (or was
            // replaced) while we were waiting.
            Ok(Err(_)) => Err(BridgeError::Disconnected),
            Err(_) => {
                // Deadline. If the response raced us and already resolved,
                // take it; otherwise forget the id so a late arrival is
                // treated as an orphan.
                if self.remove(id).is_some() {
                    log::warn!("request id={} timed out (trace {})", id, trace_id);
                    Err(BridgeError::Timeout {
                        trace_id,
                        timeout_ms: timeout.as_millis() as u64,
                    })
                } else {
                    match rx.try_recv() {
                        Ok(response) => Ok(response),
                        Err(_) => Err(BridgeError::Disconnected),
                    }
                }
            }
        }
    }

    /// Resolve an inbound response against the registry. Called from the
    /// transport loop. Responses without a matching correlation id are
    /// dropped with a logged protocol error.
    pub fn resolve_response(&self, response: ScriptResponse) {
        let entry = self.remove(response.id);
        match entry {
            Some(pending) => {
                if log::log_enabled!(log::Level::Debug) {
                    log::debug!(
                        "resolved id={} trace={} command={:?}",
                        response.id,
                        pending.trace_id,
                        pending.command
                    );
                }
                if pending.completion.send(response).is_err() {
                    // The awaiter gave up between removal and delivery;
                    // nothing left to wake.
                    log::debug!("awaiter already gone for trace {}", pending.trace_id);
                }
            }
            None => {
                log::warn!(
                    "protocol error: response with unknown correlation id {} dropped",
                    response.id
                );
            }
        }
    }

    /// Reject every outstanding request with a disconnect. Called when the
    /// connection drops, is replaced, or the server shuts down.
    pub fn fail_all_pending(&self, reason: &str) {
        let drained: Vec<(u64, PendingRequest)> = {
            let mut pending = self.pending.lock().expect("broker registry poisoned");
            pending.drain().collect()
        };
        if !drained.is_empty() {
            log::warn!("rejecting {} outstanding request(s): {}", drained.len(), reason);
        }
        // Dropping the completion handles wakes every awaiter with a
        // disconnect.
        for (id, pending) in drained {
            log::debug!("rejected id={} trace={}", id, pending.trace_id);
        }
    }

    fn remove(&self, id: u64) -> Option<PendingRequest> {
        self.pending
            .lock()
            .expect("broker registry poisoned")
            .remove(&id)
    }
}
