use std::str::FromStr;

use crate::{ACK_SEQ_FIELD, EncodeError, FieldError, MessageType, SEQ_FIELD, TYPE_FIELD};

/// A single protocol message.
///
/// Fields keep their insertion order so encoded messages read naturally, but
/// order carries no meaning. Keys are unique: setting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageType,
    /// Sequence number assigned by the reliability layer (absent on ACKs)
    pub seq: Option<u32>,
    fields: Vec<(String, String)>,
}

impl Message {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            seq: None,
            fields: Vec::new(),
        }
    }

    /// Build a bare acknowledgment for `seq`.
    pub fn ack(seq: u32) -> Self {
        Self::new(MessageType::Ack).with(ACK_SEQ_FIELD, seq)
    }

    /// Set a field and return the message (chainable)
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Set a field, replacing any previous value for the same key
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(idx).1)
    }

    /// Get a required field
    pub fn require(&self, key: &str) -> Result<&str, FieldError> {
        self.get(key)
            .ok_or_else(|| FieldError::Missing(key.to_string()))
    }

    /// Get a required field parsed into `T`
    pub fn parse_field<T: FromStr>(&self, key: &str) -> Result<T, FieldError> {
        let raw = self.require(key)?;
        raw.trim().parse().map_err(|_| FieldError::Invalid {
            field: key.to_string(),
            value: raw.to_string(),
        })
    }

    /// Get an optional field parsed into `T`
    pub fn parse_optional<T: FromStr>(&self, key: &str) -> Result<Option<T>, FieldError> {
        match self.get(key) {
            Some(_) => self.parse_field(key).map(Some),
            None => Ok(None),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Sequence number referenced by an ACK, if this is a well-formed ACK
    pub fn ack_seq(&self) -> Option<u32> {
        if self.kind != MessageType::Ack {
            return None;
        }
        self.get(ACK_SEQ_FIELD)?.trim().parse().ok()
    }

    /// Compare two messages ignoring field order
    pub fn same_content(&self, other: &Message) -> bool {
        self.kind == other.kind
            && self.seq == other.seq
            && self.fields.len() == other.fields.len()
            && self.fields().all(|(k, v)| other.get(k) == Some(v))
    }

    /// Serialize to the `key: value` wire format.
    ///
    /// Fails when a key is empty, reserved, or contains `:` or a line break,
    /// or when a value contains a line break.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        self.to_wire_format().map(String::into_bytes)
    }

    pub fn to_wire_format(&self) -> Result<String, EncodeError> {
        let mut out = format!("{}: {}\n", TYPE_FIELD, self.kind);
        if let Some(seq) = self.seq {
            out.push_str(&format!("{}: {}\n", SEQ_FIELD, seq));
        }

        for (key, value) in &self.fields {
            validate_key(key)?;
            if value.contains(['\n', '\r']) {
                return Err(EncodeError::MultilineValue(key.clone()));
            }
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }

        out.push('\n');
        Ok(out)
    }
}

fn validate_key(key: &str) -> Result<(), EncodeError> {
    let reserved = key == TYPE_FIELD || key == SEQ_FIELD;
    // keys are trimmed on decode
    let padded = key != key.trim();
    if key.is_empty() || padded || reserved || key.contains([':', '\n', '\r']) {
        return Err(EncodeError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut msg = Message::new(MessageType::Hello)
            .with("player_name", "red")
            .with("role", "HOST");
        msg.set("player_name", "blue");

        let fields: Vec<_> = msg.fields().collect();
        assert_eq!(fields, vec![("player_name", "blue"), ("role", "HOST")]);
    }

    #[test]
    fn test_parse_field() {
        let msg = Message::new(MessageType::HpUpdate)
            .with("hp", 42)
            .with("max_hp", "lots");

        assert_eq!(msg.parse_field::<u32>("hp"), Ok(42));
        assert_eq!(
            msg.parse_field::<u32>("max_hp"),
            Err(FieldError::Invalid {
                field: "max_hp".into(),
                value: "lots".into()
            })
        );
        assert_eq!(
            msg.parse_field::<u32>("turn_number"),
            Err(FieldError::Missing("turn_number".into()))
        );
        assert_eq!(msg.parse_optional::<u32>("turn_number"), Ok(None));
    }

    #[test]
    fn test_ack_seq() {
        assert_eq!(Message::ack(9).ack_seq(), Some(9));
        assert_eq!(Message::new(MessageType::Ack).ack_seq(), None);
        assert_eq!(
            Message::new(MessageType::Ready).with(ACK_SEQ_FIELD, 3).ack_seq(),
            None
        );
    }

    #[test]
    fn test_encode_layout() {
        let mut msg = Message::new(MessageType::ChatMessage)
            .with("sender", "red")
            .with("message", "gl hf");
        msg.seq = Some(4);

        let wire = msg.to_wire_format().unwrap();
        assert_eq!(
            wire,
            "type: CHAT_MESSAGE\nseq: 4\nsender: red\nmessage: gl hf\n\n"
        );
    }

    #[test]
    fn test_encode_rejects_multiline_value() {
        let msg = Message::new(MessageType::ChatMessage).with("message", "line one\nline two");
        assert_eq!(
            msg.encode(),
            Err(EncodeError::MultilineValue("message".into()))
        );
    }

    #[test]
    fn test_encode_rejects_bad_keys() {
        for key in ["", " ", "type", "seq", "a:b", "two\nlines", " sender", "sender ", " type"] {
            let msg = Message::new(MessageType::Ready).with(key, "x");
            assert_eq!(msg.encode(), Err(EncodeError::InvalidKey(key.into())));
        }
    }

    #[test]
    fn test_same_content_ignores_order() {
        let a = Message::new(MessageType::BattleResult)
            .with("winner", "red")
            .with("loser", "blue");
        let b = Message::new(MessageType::BattleResult)
            .with("loser", "blue")
            .with("winner", "red");

        assert_ne!(a, b);
        assert!(a.same_content(&b));
    }
}
