use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

/// Smallest receive buffer that still fits any message a peer sends
pub const MIN_RECV_BUFFER: usize = 512;

/// Runtime settings for a peer.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes:
///
/// ```json
/// { "bind_addr": "0.0.0.0:5001", "max_retries": 8 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Local address to bind the UDP socket to
    pub bind_addr: SocketAddr,

    /// How long to wait for an ACK before retransmitting
    pub ack_timeout_ms: u64,

    /// Retransmissions before a message is declared undeliverable
    pub max_retries: u32,

    /// How often pending messages are checked for retransmission
    pub retransmit_interval_ms: u64,

    /// Longest a receive waits before checking for shutdown
    pub poll_interval_ms: u64,

    pub recv_buffer_size: usize,

    /// How far below the highest seen sequence number duplicates are tracked
    pub seen_window: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            ack_timeout_ms: 2000,
            max_retries: 5,
            retransmit_interval_ms: 500,
            poll_interval_ms: 1000,
            recv_buffer_size: 4096,
            seen_window: 1024,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("recv_buffer_size must be at least {min} bytes, got {size}")]
    BufferTooSmall { size: usize, min: usize },
}

impl PeerConfig {
    /// Default settings bound to `addr`
    pub fn bound_to(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Self::default()
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn retransmit_interval(&self) -> Duration {
        Duration::from_millis(self.retransmit_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid peer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read peer config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Failed to load {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::Zero("ack_timeout_ms"));
        }
        if self.retransmit_interval_ms == 0 {
            return Err(ConfigError::Zero("retransmit_interval_ms"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.seen_window == 0 {
            return Err(ConfigError::Zero("seen_window"));
        }
        if self.recv_buffer_size < MIN_RECV_BUFFER {
            return Err(ConfigError::BufferTooSmall {
                size: self.recv_buffer_size,
                min: MIN_RECV_BUFFER,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PeerConfig::default();
        assert_eq!(config.ack_timeout(), Duration::from_secs(2));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.recv_buffer_size, 4096);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_from_json_partial() {
        let config = PeerConfig::from_json(r#"{ "bind_addr": "0.0.0.0:6000", "max_retries": 8 }"#)
            .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:6000".parse().unwrap());
        assert_eq!(config.max_retries, 8);
        assert_eq!(config.ack_timeout_ms, 2000);
    }

    #[test]
    fn test_from_json_rejects_invalid_values() {
        let err = PeerConfig::from_json(r#"{ "ack_timeout_ms": 0 }"#).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::Zero("ack_timeout_ms"))
        );

        assert!(PeerConfig::from_json(r#"{ "bind_addr": "not an address" }"#).is_err());
    }

    #[test]
    fn test_validate_buffer_size() {
        let config = PeerConfig {
            recv_buffer_size: 64,
            ..PeerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BufferTooSmall {
                size: 64,
                min: MIN_RECV_BUFFER
            })
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = PeerConfig::load("/nonexistent/pokelink.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read peer config"));
    }
}
