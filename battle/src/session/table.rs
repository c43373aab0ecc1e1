//! The closed table of legal (state, message type) pairs

use pokelink_protocol::MessageType;

use super::state::SessionState;
use SessionState::*;

/// What accepting a message does to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Connect,
    Handshake,
    Select,
    Rematch,
    Ready,
    BattleStart,
    Attack,
    HpUpdate,
    BattleResult,
    Chat,
    Disconnect,
}

/// One accepted (state, message type) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: SessionState,
    pub on: MessageType,
    pub kind: EdgeKind,
}

const fn edge(from: SessionState, on: MessageType, kind: EdgeKind) -> Edge {
    Edge { from, on, kind }
}

/// Every pair missing from this table is an illegal transition
pub static TRANSITION_TABLE: &[Edge] = &[
    edge(Disconnected, MessageType::Hello, EdgeKind::Connect),
    edge(Connecting, MessageType::Hello, EdgeKind::Connect),
    edge(Connecting, MessageType::HelloAck, EdgeKind::Handshake),
    edge(Selecting, MessageType::HelloAck, EdgeKind::Handshake),
    edge(Selecting, MessageType::PokemonSelect, EdgeKind::Select),
    edge(ReadyWait, MessageType::PokemonSelect, EdgeKind::Select),
    edge(BattleEnded, MessageType::PokemonSelect, EdgeKind::Rematch),
    edge(Selecting, MessageType::Ready, EdgeKind::Ready),
    edge(ReadyWait, MessageType::Ready, EdgeKind::Ready),
    edge(InBattle, MessageType::BattleStart, EdgeKind::BattleStart),
    edge(InBattle, MessageType::Attack, EdgeKind::Attack),
    edge(InBattle, MessageType::HpUpdate, EdgeKind::HpUpdate),
    edge(BattleEnded, MessageType::HpUpdate, EdgeKind::HpUpdate),
    edge(BattleEnded, MessageType::BattleResult, EdgeKind::BattleResult),
    edge(Selecting, MessageType::ChatMessage, EdgeKind::Chat),
    edge(ReadyWait, MessageType::ChatMessage, EdgeKind::Chat),
    edge(InBattle, MessageType::ChatMessage, EdgeKind::Chat),
    edge(BattleEnded, MessageType::ChatMessage, EdgeKind::Chat),
    edge(Selecting, MessageType::Sticker, EdgeKind::Chat),
    edge(ReadyWait, MessageType::Sticker, EdgeKind::Chat),
    edge(InBattle, MessageType::Sticker, EdgeKind::Chat),
    edge(BattleEnded, MessageType::Sticker, EdgeKind::Chat),
    edge(Connecting, MessageType::Disconnect, EdgeKind::Disconnect),
    edge(Selecting, MessageType::Disconnect, EdgeKind::Disconnect),
    edge(ReadyWait, MessageType::Disconnect, EdgeKind::Disconnect),
    edge(InBattle, MessageType::Disconnect, EdgeKind::Disconnect),
    edge(BattleEnded, MessageType::Disconnect, EdgeKind::Disconnect),
];

/// Find the edge for a (state, message type) pair
pub fn lookup(state: SessionState, on: MessageType) -> Option<&'static Edge> {
    TRANSITION_TABLE
        .iter()
        .find(|edge| edge.from == state && edge.on == on)
}

/// Message types accepted in `state`
pub fn accepted_in(state: SessionState) -> impl Iterator<Item = MessageType> {
    TRANSITION_TABLE
        .iter()
        .filter(move |edge| edge.from == state)
        .map(|edge| edge.on)
}

/// Whether `on` only becomes legal once the session has moved past `state`.
///
/// Used to park messages that overtook an earlier one on the wire.
pub fn accepted_later(state: SessionState, on: MessageType) -> bool {
    TRANSITION_TABLE
        .iter()
        .any(|edge| edge.from > state && edge.on == on && edge.kind != EdgeKind::Disconnect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicate_edges() {
        for (i, a) in TRANSITION_TABLE.iter().enumerate() {
            for b in &TRANSITION_TABLE[i + 1..] {
                assert!(
                    !(a.from == b.from && a.on == b.on),
                    "duplicate edge {:?} {:?}",
                    a.from,
                    a.on
                );
            }
        }
    }

    #[test]
    fn test_ack_never_reaches_the_session() {
        for state in SessionState::ALL {
            assert!(lookup(state, MessageType::Ack).is_none());
        }
    }

    #[test]
    fn test_attack_only_in_battle() {
        for state in SessionState::ALL {
            let accepted = lookup(state, MessageType::Attack).is_some();
            assert_eq!(accepted, state == SessionState::InBattle);
        }
    }

    #[test]
    fn test_disconnect_from_every_connected_state() {
        for state in SessionState::ALL {
            let edge = lookup(state, MessageType::Disconnect);
            assert_eq!(edge.is_some(), state.is_connected());
        }
    }

    #[test]
    fn test_simultaneous_open_edges() {
        assert!(lookup(SessionState::Connecting, MessageType::Hello).is_some());
        assert!(lookup(SessionState::Selecting, MessageType::HelloAck).is_some());
        assert!(lookup(SessionState::Selecting, MessageType::Hello).is_none());
    }

    #[test]
    fn test_accepted_in_disconnected() {
        let types: Vec<_> = accepted_in(SessionState::Disconnected).collect();
        assert_eq!(types, vec![MessageType::Hello]);
    }

    #[test]
    fn test_accepted_later() {
        assert!(accepted_later(SessionState::ReadyWait, MessageType::Attack));
        assert!(accepted_later(SessionState::Connecting, MessageType::PokemonSelect));
        assert!(!accepted_later(SessionState::InBattle, MessageType::Hello));
        assert!(!accepted_later(SessionState::BattleEnded, MessageType::Attack));
    }
}
