use std::fmt;
use std::net::SocketAddr;

use pokelink_battle::IllegalTransition;
use pokelink_protocol::{EncodeError, MessageType};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by the peer runtime
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Failed to bind UDP socket on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Rejected by the session: {0}")]
    Rejected(#[from] IllegalTransition),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] EncodeError),

    #[error("No peer to send to")]
    NoPeer,

    #[error("Peer runtime has shut down")]
    Closed,

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// A message that was never acknowledged within the retry ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub peer: SocketAddr,
    pub seq: u32,
    pub message_type: MessageType,
    /// Transmissions made, including the first
    pub attempts: u32,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seq {} to {} unacknowledged after {} attempts",
            self.message_type, self.seq, self.peer, self.attempts
        )
    }
}
