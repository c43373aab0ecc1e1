use std::net::SocketAddr;

use pokelink_protocol::{Message, MessageType};

use crate::IllegalTransition;
use crate::resolver::Resolution;
use crate::types::{Move, PokemonStats};

use super::state::{SessionState, Side};

/// Something the session did in response to a message.
///
/// Every transition returns its events as a list; `Emit` carries messages
/// the caller must send to the peer, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    PeerRecorded {
        addr: SocketAddr,
        name: Option<String>,
    },
    HandshakeComplete {
        peer_name: Option<String>,
    },
    SelectionRecorded {
        side: Side,
        pokemon: PokemonStats,
    },
    /// Both sides have chosen a Pokemon
    SelectionComplete,
    ReadyRecorded {
        side: Side,
    },
    BattleStarted {
        first_mover: Side,
    },
    /// The host's BATTLE_START was applied
    FirstMoverAnnounced {
        first_mover: Side,
        agreed: bool,
    },
    AttackResolved(AttackOutcome),
    /// The attacker reported different damage than we computed
    DamageMismatch {
        reported: u32,
        computed: u32,
    },
    HpConfirmed {
        side: Side,
        hp: u32,
    },
    HpMismatch {
        side: Side,
        reported: u32,
        expected: u32,
    },
    Chat {
        side: Side,
        line: ChatLine,
    },
    BattleEnded(BattleResult),
    ResultConfirmed(BattleResult),
    ResultMismatch {
        reported: BattleResult,
        expected: Option<BattleResult>,
    },
    Disconnected {
        side: Side,
        reason: Option<String>,
    },
    /// An inbound message arrived early and was parked until the session catches up
    Deferred {
        message_type: MessageType,
    },
    /// A parked message was replayed and still rejected
    Rejected {
        message_type: MessageType,
        error: IllegalTransition,
    },
    Emit(Message),
}

/// A resolved attack
#[derive(Debug, Clone, PartialEq)]
pub struct AttackOutcome {
    pub attacker: Side,
    pub mv: Move,
    pub resolution: Resolution,
    /// HP actually removed from the defender
    pub damage: u32,
    pub defender_hp: u32,
    pub defender_max_hp: u32,
    pub turn_number: u32,
    pub fainted: bool,
}

/// A chat line or sticker
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChatLine {
    pub sender: String,
    pub text: Option<String>,
    pub sticker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleResult {
    pub winner: String,
    pub loser: String,
}

/// One entry of the transition log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    #[cfg_attr(feature = "serde", serde(with = "message_type_name"))]
    pub message_type: MessageType,
    pub side: Side,
}

#[cfg(feature = "serde")]
mod message_type_name {
    use pokelink_protocol::MessageType;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(kind: &MessageType, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(kind.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<MessageType, D::Error> {
        let name = String::deserialize(d)?;
        MessageType::parse(&name).ok_or_else(|| D::Error::custom(format!("unknown type {name}")))
    }
}
