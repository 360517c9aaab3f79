//! Bridge Error Taxonomy
//!
//! Every failure a caller can observe from the broker/transport side of the
//! bridge is one of four categories. Tool code converts these into tool-level
//! errors; they are never wrapped in a task report.
//!
//! | Variant | Meaning |
//! |---|---|
//! | `Disconnected` | No panel is connected, or the panel dropped mid-flight |
//! | `Timeout` | No response arrived within the per-call deadline |
//! | `Transport` | Frame parse, oversize frame, or send failure |
//! | `Protocol` | A response arrived that matches no outstanding request |

use std::error::Error;
use std::fmt;

/// Errors surfaced by the request broker and the panel transport.
///
/// `Protocol` errors are logged and dropped inside the transport loop; they
/// only reach callers when a frame is malformed on the send path.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// No connected panel peer, or the peer dropped while requests were
    /// outstanding.
    Disconnected,
    /// The per-call deadline elapsed before a response arrived. Carries the
    /// trace id so logs on both loops can be correlated.
    Timeout {
        trace_id: String,
        timeout_ms: u64,
    },
    /// Frame-level failure: JSON parse error, oversize frame, or a send that
    /// could not complete.
    Transport(String),
    /// A response without a matching correlation id, or an envelope that
    /// violates the wire contract.
    Protocol(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Disconnected => write!(f, "panel disconnected"),
            BridgeError::Timeout {
                trace_id,
                timeout_ms,
            } => write!(
                f,
                "request timed out after {}ms (trace {})",
                timeout_ms, trace_id
            ),
            BridgeError::Transport(msg) => write!(f, "transport error: {}", msg),
            BridgeError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl Error for BridgeError {}

/// Result type for broker and transport operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_disconnected() {
        assert_eq!(BridgeError::Disconnected.to_string(), "panel disconnected");
    }

    #[test]
    fn test_display_timeout_includes_trace_id() {
        let err = BridgeError::Timeout {
            trace_id: "tr-42-abcd".to_string(),
            timeout_ms: 30_000,
        };
        let text = err.to_string();
        assert!(text.contains("30000ms"));
        assert!(text.contains("tr-42-abcd"));
    }

    #[test]
    fn test_display_transport_and_protocol() {
        assert!(BridgeError::Transport("send failed".into())
            .to_string()
            .contains("send failed"));
        assert!(BridgeError::Protocol("orphan response id=9".into())
            .to_string()
            .contains("orphan response"));
    }
}
