//! Async UDP peer for pokelink battles.
//!
//! A peer binds one socket, runs a reliability layer on top of it
//! (sequence numbers, ACKs, retransmission, duplicate suppression) and feeds
//! every delivered message through a [`Session`](pokelink_battle::Session).
//! Applications react through a [`Handler`] and send through a
//! [`PeerHandle`].
//!
//! ```ignore
//! let session = Session::new(Role::Host, "misty");
//! let (handle, mut runner) = Peer::bind(PeerConfig::default(), session).await?;
//!
//! let mut bot = MyHandler::new(handle.clone());
//! runner.run(&mut bot).await?;
//! ```

mod config;
mod error;
mod handle;
mod handler;
mod peer;
pub mod reliability;
mod transport;

pub use config::{ConfigError, MIN_RECV_BUFFER, PeerConfig};
pub use error::{DeliveryFailure, PeerError};
pub use handle::{Command, PeerHandle};
pub use handler::Handler;
pub use peer::{Peer, PeerRunner};
pub use reliability::{ReliabilityEngine, SEQUENCE_START};
pub use transport::Transport;

pub use pokelink_battle::{
    AttackOutcome, BattleResult, BattleState, ChatLine, IllegalTransition, Move, PokemonStats,
    Role, Session, SessionEvent, SessionState, Side,
};
pub use pokelink_protocol::{Message, MessageType};
