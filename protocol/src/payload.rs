//! Typed views over the fields each message type carries

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ACK_SEQ_FIELD, FieldError, Message, MessageType};

/// Physical moves use attack/defense, special moves use sp_attack/sp_defense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveCategory {
    Physical,
    Special,
}

impl MoveCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveCategory::Physical => "physical",
            MoveCategory::Special => "special",
        }
    }
}

impl fmt::Display for MoveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoveCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // older peers call physical moves "normal"
            "physical" | "normal" => Ok(MoveCategory::Physical),
            "special" => Ok(MoveCategory::Special),
            _ => Err(()),
        }
    }
}

/// A Pokemon as announced in POKEMON_SELECT.
///
/// Stats travel with the selection so the receiving peer needs no lookup
/// table of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonEntry {
    pub pokemon_name: String,
    pub type1: String,
    #[serde(default)]
    pub type2: Option<String>,
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub sp_attack: u32,
    pub sp_defense: u32,
    pub speed: u32,
}

/// Fields of an ATTACK message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackPayload {
    pub attacker: String,
    pub move_name: String,
    pub move_type: String,
    pub power: u32,
    pub category: MoveCategory,
    /// Damage the attacker computed, filled in when the attack is sent
    pub damage: Option<u32>,
    pub turn_number: Option<u32>,
}

/// Every message type with its fields decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Hello {
        player_name: String,
        role: Option<String>,
    },
    HelloAck {
        player_name: String,
    },
    PokemonSelect(PokemonEntry),
    Ready,
    BattleStart {
        first_player: String,
    },
    Attack(AttackPayload),
    HpUpdate {
        player: String,
        hp: u32,
        max_hp: u32,
        turn_number: u32,
    },
    BattleResult {
        winner: String,
        loser: String,
    },
    Chat {
        sender: String,
        text: String,
    },
    Sticker {
        sender: String,
        sticker: String,
    },
    Disconnect {
        player_name: String,
        reason: Option<String>,
    },
    Ack {
        ack_seq: u32,
    },
}

impl Payload {
    pub fn kind(&self) -> MessageType {
        match self {
            Payload::Hello { .. } => MessageType::Hello,
            Payload::HelloAck { .. } => MessageType::HelloAck,
            Payload::PokemonSelect(_) => MessageType::PokemonSelect,
            Payload::Ready => MessageType::Ready,
            Payload::BattleStart { .. } => MessageType::BattleStart,
            Payload::Attack(_) => MessageType::Attack,
            Payload::HpUpdate { .. } => MessageType::HpUpdate,
            Payload::BattleResult { .. } => MessageType::BattleResult,
            Payload::Chat { .. } => MessageType::ChatMessage,
            Payload::Sticker { .. } => MessageType::Sticker,
            Payload::Disconnect { .. } => MessageType::Disconnect,
            Payload::Ack { .. } => MessageType::Ack,
        }
    }

    /// Read the typed payload out of a message, checking required fields
    pub fn parse(msg: &Message) -> Result<Self, FieldError> {
        let text = |key: &str| msg.require(key).map(str::to_string);
        let optional = |key: &str| msg.get(key).map(str::to_string);

        let payload = match msg.kind {
            MessageType::Hello => Payload::Hello {
                player_name: text("player_name")?,
                role: optional("role"),
            },
            MessageType::HelloAck => Payload::HelloAck {
                player_name: text("player_name")?,
            },
            MessageType::PokemonSelect => Payload::PokemonSelect(PokemonEntry {
                pokemon_name: text("pokemon_name")?,
                type1: text("type1")?,
                type2: optional("type2").filter(|t| !t.is_empty()),
                hp: msg.parse_field("hp")?,
                attack: msg.parse_field("attack")?,
                defense: msg.parse_field("defense")?,
                sp_attack: msg.parse_field("sp_attack")?,
                sp_defense: msg.parse_field("sp_defense")?,
                speed: msg.parse_field("speed")?,
            }),
            MessageType::Ready => Payload::Ready,
            MessageType::BattleStart => Payload::BattleStart {
                first_player: text("first_player")?,
            },
            MessageType::Attack => Payload::Attack(AttackPayload {
                attacker: text("attacker")?,
                move_name: text("move_name")?,
                move_type: text("move_type")?,
                power: msg.parse_field("power")?,
                category: msg.parse_field("category")?,
                damage: msg.parse_optional("damage")?,
                turn_number: msg.parse_optional("turn_number")?,
            }),
            MessageType::HpUpdate => Payload::HpUpdate {
                player: text("player")?,
                hp: msg.parse_field("hp")?,
                max_hp: msg.parse_field("max_hp")?,
                turn_number: msg.parse_field("turn_number")?,
            },
            MessageType::BattleResult => Payload::BattleResult {
                winner: text("winner")?,
                loser: text("loser")?,
            },
            MessageType::ChatMessage => Payload::Chat {
                sender: text("sender")?,
                text: text("message")?,
            },
            MessageType::Sticker => Payload::Sticker {
                sender: text("sender")?,
                sticker: text("sticker")?,
            },
            MessageType::Disconnect => Payload::Disconnect {
                player_name: text("player_name")?,
                reason: optional("reason"),
            },
            MessageType::Ack => Payload::Ack {
                ack_seq: msg.parse_field(ACK_SEQ_FIELD)?,
            },
        };

        Ok(payload)
    }

    /// Build the message carrying this payload (no sequence number yet)
    pub fn into_message(self) -> Message {
        let msg = Message::new(self.kind());
        match self {
            Payload::Hello { player_name, role } => {
                let msg = msg.with("player_name", player_name);
                match role {
                    Some(role) => msg.with("role", role),
                    None => msg,
                }
            }
            Payload::HelloAck { player_name } => msg.with("player_name", player_name),
            Payload::PokemonSelect(entry) => {
                let msg = msg
                    .with("pokemon_name", entry.pokemon_name)
                    .with("type1", entry.type1);
                let msg = match entry.type2 {
                    Some(type2) => msg.with("type2", type2),
                    None => msg,
                };
                msg.with("hp", entry.hp)
                    .with("attack", entry.attack)
                    .with("defense", entry.defense)
                    .with("sp_attack", entry.sp_attack)
                    .with("sp_defense", entry.sp_defense)
                    .with("speed", entry.speed)
            }
            Payload::Ready => msg.with("status", "READY"),
            Payload::BattleStart { first_player } => msg.with("first_player", first_player),
            Payload::Attack(attack) => {
                let mut msg = msg
                    .with("attacker", attack.attacker)
                    .with("move_name", attack.move_name)
                    .with("move_type", attack.move_type)
                    .with("power", attack.power)
                    .with("category", attack.category);
                if let Some(damage) = attack.damage {
                    msg.set("damage", damage);
                }
                if let Some(turn) = attack.turn_number {
                    msg.set("turn_number", turn);
                }
                msg
            }
            Payload::HpUpdate {
                player,
                hp,
                max_hp,
                turn_number,
            } => msg
                .with("player", player)
                .with("hp", hp)
                .with("max_hp", max_hp)
                .with("turn_number", turn_number),
            Payload::BattleResult { winner, loser } => {
                msg.with("winner", winner).with("loser", loser)
            }
            Payload::Chat { sender, text } => msg.with("sender", sender).with("message", text),
            Payload::Sticker { sender, sticker } => {
                msg.with("sender", sender).with("sticker", sticker)
            }
            Payload::Disconnect {
                player_name,
                reason,
            } => {
                let msg = msg.with("player_name", player_name);
                match reason {
                    Some(reason) => msg.with("reason", reason),
                    None => msg,
                }
            }
            Payload::Ack { ack_seq } => msg.with(ACK_SEQ_FIELD, ack_seq),
        }
    }
}

impl From<Payload> for Message {
    fn from(payload: Payload) -> Self {
        payload.into_message()
    }
}
