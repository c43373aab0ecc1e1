use std::fmt;
use std::str::FromStr;

use crate::DecodeError;

/// The closed set of message types a peer may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    Hello,
    HelloAck,
    PokemonSelect,
    Ready,
    BattleStart,
    Attack,
    HpUpdate,
    BattleResult,
    ChatMessage,
    Sticker,
    Disconnect,
    Ack,
}

impl MessageType {
    pub const ALL: [MessageType; 12] = [
        MessageType::Hello,
        MessageType::HelloAck,
        MessageType::PokemonSelect,
        MessageType::Ready,
        MessageType::BattleStart,
        MessageType::Attack,
        MessageType::HpUpdate,
        MessageType::BattleResult,
        MessageType::ChatMessage,
        MessageType::Sticker,
        MessageType::Disconnect,
        MessageType::Ack,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HELLO" => Some(MessageType::Hello),
            "HELLO_ACK" => Some(MessageType::HelloAck),
            "POKEMON_SELECT" => Some(MessageType::PokemonSelect),
            "READY" => Some(MessageType::Ready),
            "BATTLE_START" => Some(MessageType::BattleStart),
            "ATTACK" => Some(MessageType::Attack),
            "HP_UPDATE" => Some(MessageType::HpUpdate),
            "BATTLE_RESULT" => Some(MessageType::BattleResult),
            "CHAT_MESSAGE" => Some(MessageType::ChatMessage),
            "STICKER" => Some(MessageType::Sticker),
            "DISCONNECT" => Some(MessageType::Disconnect),
            "ACK" => Some(MessageType::Ack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Hello => "HELLO",
            MessageType::HelloAck => "HELLO_ACK",
            MessageType::PokemonSelect => "POKEMON_SELECT",
            MessageType::Ready => "READY",
            MessageType::BattleStart => "BATTLE_START",
            MessageType::Attack => "ATTACK",
            MessageType::HpUpdate => "HP_UPDATE",
            MessageType::BattleResult => "BATTLE_RESULT",
            MessageType::ChatMessage => "CHAT_MESSAGE",
            MessageType::Sticker => "STICKER",
            MessageType::Disconnect => "DISCONNECT",
            MessageType::Ack => "ACK",
        }
    }

    /// Whether messages of this type are sequenced and retransmitted.
    ///
    /// Only bare ACKs travel without a sequence number.
    pub fn is_reliable(&self) -> bool {
        !matches!(self, MessageType::Ack)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DecodeError::UnknownType(s.to_string()))
    }
}
