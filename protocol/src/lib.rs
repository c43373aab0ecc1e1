//! Wire protocol for pokelink peers.
//!
//! Every UDP datagram carries exactly one [`Message`]: a type tag, an
//! optional sequence number and an ordered list of `key: value` fields,
//! terminated by a blank line.
//!
//! ```text
//! type: ATTACK
//! seq: 7
//! attacker: ash
//! move_name: Thunder Blast
//!
//! ```
//!
//! [`decode`] turns raw bytes into a [`Message`], [`Message::encode`] does the
//! reverse, and [`Payload`] gives typed access to the fields each message
//! type requires.

use thiserror::Error;

mod codec;
mod message;
mod message_type;
mod payload;

pub use codec::{decode, encode_ack};
pub use message::Message;
pub use message_type::MessageType;
pub use payload::{AttackPayload, MoveCategory, Payload, PokemonEntry};

/// Field carrying the sequence number of a data message.
pub const SEQ_FIELD: &str = "seq";

/// Field carrying the type tag of every message.
pub const TYPE_FIELD: &str = "type";

/// Field an ACK uses to reference the acknowledged sequence number.
pub const ACK_SEQ_FIELD: &str = "ack_seq";

/// Reasons a datagram could not be decoded into a [`Message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed message: payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Malformed message: missing type line")]
    MissingType,

    #[error("Malformed message: unknown message type {0:?}")]
    UnknownType(String),

    #[error("Malformed message: line {0:?} is not `key: value`")]
    InvalidLine(String),

    #[error("Malformed message: invalid sequence number {0:?}")]
    InvalidSequence(String),

    #[error("Malformed message: duplicate field {0:?}")]
    DuplicateField(String),

    #[error("Malformed message: missing blank line terminator")]
    MissingTerminator,

    #[error("Malformed message: unexpected data after terminator")]
    TrailingData,

    #[error("Malformed message: {0} without a sequence number")]
    MissingSequence(MessageType),

    #[error("Malformed message: ACK without a valid ack_seq")]
    InvalidAck,
}

/// Encoding precondition violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Invalid field key {0:?}")]
    InvalidKey(String),

    #[error("Value of field {0:?} contains a line break")]
    MultilineValue(String),
}

/// Errors reading typed payloads out of a [`Message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Missing required field: {0}")]
    Missing(String),

    #[error("Invalid value {value:?} for field {field}")]
    Invalid { field: String, value: String },

    #[error("Expected {expected} message, got {actual}")]
    WrongType {
        expected: MessageType,
        actual: MessageType,
    },
}
