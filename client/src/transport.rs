//! UDP datagram transport.
//!
//! [`Transport`] only moves bytes; framing, sequencing and acknowledgment
//! live in the layers above it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::config::PeerConfig;
use crate::error::PeerError;

#[derive(Debug)]
pub struct Transport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    poll_interval: Duration,
    buffer_size: usize,
}

impl Transport {
    /// Bind to `config.bind_addr`. Port 0 lets the OS pick one.
    pub async fn bind(config: &PeerConfig) -> Result<Self, PeerError> {
        let addr = config.bind_addr;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| PeerError::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            poll_interval: config.poll_interval(),
            buffer_size: config.recv_buffer_size,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn send_to(&self, bytes: &[u8], peer: SocketAddr) -> Result<(), PeerError> {
        self.socket.send_to(bytes, peer).await?;
        Ok(())
    }

    /// Wait up to the poll interval for one datagram.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    pub async fn recv(&self) -> Result<Option<(Vec<u8>, SocketAddr)>, PeerError> {
        let mut buf = vec![0u8; self.buffer_size];
        match tokio::time::timeout(self.poll_interval, self.socket.recv_from(&mut buf)).await {
            Err(_elapsed) => Ok(None),
            Ok(Ok((len, from))) => {
                buf.truncate(len);
                Ok(Some((buf, from)))
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }
}
