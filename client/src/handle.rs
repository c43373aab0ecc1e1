use std::net::SocketAddr;

use pokelink_battle::{Move, PokemonStats};
use pokelink_protocol::Message;
use tokio::sync::{mpsc, oneshot};

use crate::error::PeerError;

/// A send request for the session loop
#[derive(Debug, Clone)]
pub enum Command {
    /// Send HELLO to a peer
    Connect(SocketAddr),
    Select(PokemonStats),
    Ready,
    Attack(Move),
    Chat(String),
    Sticker(String),
    Disconnect(Option<String>),
    /// Send a prebuilt message to the current peer
    Send(Message),
}

pub(crate) enum Input {
    Command {
        command: Command,
        reply: Option<oneshot::Sender<Result<u32, PeerError>>>,
    },
    Delivered {
        from: SocketAddr,
        message: Message,
    },
    Shutdown,
}

/// Cloneable handle for queueing sends on a running peer.
///
/// The fire-and-forget methods only fail once the peer has shut down;
/// rejections by the session are logged. Use [`PeerHandle::request`] to get
/// the outcome.
#[derive(Clone)]
pub struct PeerHandle {
    tx: mpsc::UnboundedSender<Input>,
    local_addr: SocketAddr,
}

impl PeerHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Input>, local_addr: SocketAddr) -> Self {
        Self { tx, local_addr }
    }

    /// Address the peer's socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn send(&self, command: Command) -> Result<(), PeerError> {
        self.tx
            .send(Input::Command {
                command,
                reply: None,
            })
            .map_err(|_| PeerError::Closed)
    }

    pub fn connect(&self, peer: SocketAddr) -> Result<(), PeerError> {
        self.send(Command::Connect(peer))
    }

    pub fn select(&self, pokemon: PokemonStats) -> Result<(), PeerError> {
        self.send(Command::Select(pokemon))
    }

    pub fn ready(&self) -> Result<(), PeerError> {
        self.send(Command::Ready)
    }

    pub fn attack(&self, mv: Move) -> Result<(), PeerError> {
        self.send(Command::Attack(mv))
    }

    pub fn chat(&self, text: impl Into<String>) -> Result<(), PeerError> {
        self.send(Command::Chat(text.into()))
    }

    pub fn sticker(&self, sticker: impl Into<String>) -> Result<(), PeerError> {
        self.send(Command::Sticker(sticker.into()))
    }

    pub fn disconnect(&self, reason: Option<String>) -> Result<(), PeerError> {
        self.send(Command::Disconnect(reason))
    }

    pub fn send_message(&self, message: Message) -> Result<(), PeerError> {
        self.send(Command::Send(message))
    }

    /// Queue a command and wait until it has been sent.
    ///
    /// Returns the sequence number the message went out with. Must not be
    /// awaited from inside a [`Handler`](crate::Handler) callback: the
    /// session loop only gets to the request once the callback returns.
    pub async fn request(&self, command: Command) -> Result<u32, PeerError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Input::Command {
                command,
                reply: Some(reply),
            })
            .map_err(|_| PeerError::Closed)?;
        response.await.map_err(|_| PeerError::Closed)?
    }

    /// Stop the peer. Pending messages are abandoned.
    pub fn shutdown(&self) -> Result<(), PeerError> {
        self.tx.send(Input::Shutdown).map_err(|_| PeerError::Closed)
    }
}
