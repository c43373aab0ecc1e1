//! Battle domain types and the session state machine for pokelink peers.
//!
//! # Overview
//!
//! `pokelink-battle` sits between `pokelink-protocol` (wire format) and the
//! peer runtime:
//!
//! ```text
//! pokelink-protocol (wire format)
//!        │
//!        ▼
//! pokelink-battle (domain types + session) ← THIS CRATE
//!        │
//!        ▼
//! pokelink-client (UDP transport, reliability, runtime)
//! ```
//!
//! # Main Types
//!
//! ## Domain Types
//! - [`Type`] - Elemental types with effectiveness chart
//! - [`PokemonStats`] / [`PokemonState`] - A selected Pokemon and its battle HP
//! - [`Move`] - Named move with type, power and category
//!
//! ## Turn Resolution
//! - [`TurnResolver`] - Computes damage for one attack
//! - [`StandardResolver`] - Deterministic simplified damage formula
//!
//! ## Session
//! - [`Session`] - State machine fed with every inbound and outbound message
//! - [`TRANSITION_TABLE`] - The legal (state, message type) pairs
//!
//! # Example Usage
//!
//! ```ignore
//! use pokelink_battle::{Role, Session, SessionEvent};
//!
//! let mut session = Session::new(Role::Joiner, "ash");
//!
//! let mut hello = session.hello();
//! session.apply_outbound(host_addr, &mut hello)?;
//!
//! for event in session.apply_inbound(host_addr, &reply)? {
//!     if let SessionEvent::StateChanged { to, .. } = event {
//!         println!("now {to}");
//!     }
//! }
//! ```

use std::net::SocketAddr;

use pokelink_protocol::{FieldError, MessageType};
use thiserror::Error;

pub mod resolver;
pub mod session;
pub mod types;

pub use resolver::{Resolution, StandardResolver, TurnResolver};
pub use session::{
    AttackOutcome, BattleResult, BattleState, ChatLine, Role, Session, SessionEvent,
    SessionState, Side, TRANSITION_TABLE, Transition,
};
pub use types::{MAX_USES, Move, PokemonState, PokemonStats, TYPE_CHART, Type};

/// A message the session refused. The session is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IllegalTransition {
    #[error("{message_type} is not accepted in state {state}")]
    NotAccepted {
        state: SessionState,
        message_type: MessageType,
    },

    #[error("Not the {attacker} side's turn")]
    NotYourTurn { attacker: Side },

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] FieldError),

    #[error("The {0} side must select a Pokemon first")]
    SelectionRequired(Side),

    #[error("The {0} side is already ready")]
    AlreadyReady(Side),

    #[error("Only the host announces the battle start")]
    NotHost,

    #[error("Message from {0}, which is not the session peer")]
    ForeignPeer(SocketAddr),

    #[error("Unknown player {0:?}")]
    UnknownPlayer(String),

    #[error("{0} has no uses left")]
    MoveExhausted(String),
}
