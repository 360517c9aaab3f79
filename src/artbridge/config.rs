//! Configuration for the bridge.
//!
//! Provides the [`BridgeConfig`] struct consumed by
//! [`PanelTransport`](crate::artbridge::transport::PanelTransport) and the
//! request broker. Users construct this manually — no file parsing
//! dependencies are required.
//!
//! # Example
//!
//! ```rust
//! use artbridge::BridgeConfig;
//!
//! // Defaults: port 8081, 30 second per-call timeout, no HTTP side channel.
//! let config = BridgeConfig::default();
//!
//! // Or override pieces with the builder methods:
//! let config = BridgeConfig::default().with_port(8085).with_timeout_secs(10);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

/// Lowest port the listener will accept; everything below is privileged.
const MIN_PORT: u16 = 1024;

/// Connection settings for the panel WebSocket listener.
///
/// The listener always binds to loopback; the port is the only reachable
/// surface. When an HTTP side channel is enabled its port must differ from
/// the WebSocket port.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// WebSocket listener port (loopback only).
    pub port: u16,
    /// Per-call deadline for broker requests.
    pub timeout: Duration,
    /// Optional HTTP side-channel port. `None` disables the side channel.
    pub http_port: Option<u16>,
}

impl Default for BridgeConfig {
    /// Port 8081, 30 second timeout, no HTTP side channel.
    fn default() -> Self {
        Self {
            port: 8081,
            timeout: Duration::from_secs(30),
            http_port: None,
        }
    }
}

impl BridgeConfig {
    /// Set the WebSocket listener port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-call broker timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Enable the HTTP side channel on the given port.
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = Some(port);
        self
    }

    /// Check port ranges and cross-channel distinctness.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when a port is outside 1024–65535 or
    /// the HTTP side channel shares the WebSocket port.
    pub fn validate(&self) -> Result<(), String> {
        if self.port < MIN_PORT {
            return Err(format!(
                "websocket port {} is below the allowed range ({}-65535)",
                self.port, MIN_PORT
            ));
        }
        if let Some(http_port) = self.http_port {
            if http_port < MIN_PORT {
                return Err(format!(
                    "http port {} is below the allowed range ({}-65535)",
                    http_port, MIN_PORT
                ));
            }
            if http_port == self.port {
                return Err(format!(
                    "http port and websocket port must be distinct (both {})",
                    http_port
                ));
            }
        }
        Ok(())
    }

    /// Loopback bind address for the listener.
    pub fn bind_addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.port, 8081);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.http_port.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::default()
            .with_port(9001)
            .with_timeout_secs(5)
            .with_http_port(9002);
        assert_eq!(config.port, 9001);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.http_port, Some(9002));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_privileged_port_rejected() {
        let config = BridgeConfig::default().with_port(80);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_port_collision_rejected() {
        let config = BridgeConfig::default().with_port(8081).with_http_port(8081);
        let err = config.validate().unwrap_err();
        assert!(err.contains("distinct"));
    }

    #[test]
    fn test_bind_addr_is_loopback() {
        let config = BridgeConfig::default().with_port(8085);
        assert_eq!(config.bind_addr(), "127.0.0.1:8085");
    }
}
