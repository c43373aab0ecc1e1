mod tests;

use crate::{ACK_SEQ_FIELD, DecodeError, Message, MessageType, SEQ_FIELD, TYPE_FIELD};

/// Decode one datagram into a [`Message`].
///
/// The datagram must hold exactly one message: `key: value` lines ending in
/// a blank line. Unknown keys are kept as ordinary fields.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;

    let mut kind: Option<MessageType> = None;
    let mut seq: Option<u32> = None;
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut terminated = false;

    let mut lines = text.split_inclusive('\n');
    for raw in lines.by_ref() {
        let complete = raw.ends_with('\n');
        let line = raw.trim_end_matches('\n');
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() && complete {
            terminated = true;
            break;
        }

        let (key, value) = parse_line(line)?;
        match key {
            TYPE_FIELD => {
                if kind.is_some() {
                    return Err(DecodeError::DuplicateField(key.to_string()));
                }
                kind = Some(value.trim().parse()?);
            }
            SEQ_FIELD => {
                if seq.is_some() {
                    return Err(DecodeError::DuplicateField(key.to_string()));
                }
                let parsed = value
                    .trim()
                    .parse()
                    .map_err(|_| DecodeError::InvalidSequence(value.to_string()))?;
                seq = Some(parsed);
            }
            _ => {
                if fields.iter().any(|(k, _)| k == key) {
                    return Err(DecodeError::DuplicateField(key.to_string()));
                }
                fields.push((key.to_string(), value.to_string()));
            }
        }
    }

    if !terminated {
        return Err(DecodeError::MissingTerminator);
    }

    // One message per datagram: nothing but whitespace may follow.
    if lines.any(|rest| !rest.trim().is_empty()) {
        return Err(DecodeError::TrailingData);
    }

    let kind = kind.ok_or(DecodeError::MissingType)?;
    let mut message = Message::new(kind);
    message.seq = seq;
    for (key, value) in fields {
        message.set(key, value);
    }
    Ok(message)
}

/// Encode the acknowledgment for `seq`.
///
/// Same bytes as `Message::ack(seq).encode()`, but infallible since every key
/// is fixed.
pub fn encode_ack(seq: u32) -> Vec<u8> {
    format!(
        "{}: {}\n{}: {}\n\n",
        TYPE_FIELD,
        MessageType::Ack,
        ACK_SEQ_FIELD,
        seq
    )
    .into_bytes()
}

/// Split `key: value`, dropping the single space after the colon
fn parse_line(line: &str) -> Result<(&str, &str), DecodeError> {
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| DecodeError::InvalidLine(line.to_string()))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(DecodeError::InvalidLine(line.to_string()));
    }

    Ok((key, value.strip_prefix(' ').unwrap_or(value)))
}
