#[cfg(test)]
mod tests {
    use crate::{DecodeError, Message, MessageType, decode, encode_ack};

    fn sample(kind: MessageType) -> Message {
        let mut msg = Message::new(kind)
            .with("player_name", "red")
            .with("note", "")
            .with("padded", "  spaced value")
            .with("url", "http://example.com:8080/path");
        if kind.is_reliable() {
            msg.seq = Some(41);
        } else {
            msg.set("ack_seq", 41);
        }
        msg
    }

    #[test]
    fn test_round_trip_every_type() {
        for kind in MessageType::ALL {
            let msg = sample(kind);
            let decoded = decode(&msg.encode().unwrap()).unwrap();

            assert!(decoded.same_content(&msg), "{kind} did not round-trip");
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_decode_basic() {
        let msg = decode(b"type: HELLO\nseq: 0\nplayer_name: red\nrole: HOST\n\n").unwrap();

        assert_eq!(msg.kind, MessageType::Hello);
        assert_eq!(msg.seq, Some(0));
        assert_eq!(msg.get("player_name"), Some("red"));
        assert_eq!(msg.get("role"), Some("HOST"));
    }

    #[test]
    fn test_decode_type_need_not_be_first() {
        let msg = decode(b"seq: 3\nplayer_name: red\ntype: HELLO_ACK\n\n").unwrap();

        assert_eq!(msg.kind, MessageType::HelloAck);
        assert_eq!(msg.seq, Some(3));
    }

    #[test]
    fn test_decode_ack() {
        let msg = decode(b"type: ACK\nack_seq: 12\n\n").unwrap();

        assert_eq!(msg.kind, MessageType::Ack);
        assert_eq!(msg.seq, None);
        assert_eq!(msg.ack_seq(), Some(12));
    }

    #[test]
    fn test_decode_preserves_unknown_fields() {
        let msg = decode(b"type: READY\nseq: 5\nfavourite_berry: oran\n\n").unwrap();

        assert_eq!(msg.get("favourite_berry"), Some("oran"));
        assert_eq!(msg.field_count(), 1);
    }

    #[test]
    fn test_decode_tolerates_crlf() {
        let msg = decode(b"type: READY\r\nseq: 1\r\n\r\n").unwrap();

        assert_eq!(msg.kind, MessageType::Ready);
        assert_eq!(msg.seq, Some(1));
    }

    #[test]
    fn test_decode_missing_type() {
        let result = decode(b"seq: 1\nplayer_name: red\n\n");
        assert_eq!(result, Err(DecodeError::MissingType));
    }

    #[test]
    fn test_decode_missing_terminator() {
        assert_eq!(
            decode(b"type: READY\nseq: 1\n"),
            Err(DecodeError::MissingTerminator)
        );
        assert_eq!(decode(b"type: READY"), Err(DecodeError::MissingTerminator));
        assert_eq!(decode(b""), Err(DecodeError::MissingTerminator));
    }

    #[test]
    fn test_decode_invalid_line() {
        let result = decode(b"type: READY\nnot a field\n\n");
        assert_eq!(result, Err(DecodeError::InvalidLine("not a field".into())));

        let result = decode(b"type: READY\n: orphan value\n\n");
        assert_eq!(result, Err(DecodeError::InvalidLine(": orphan value".into())));
    }

    #[test]
    fn test_decode_unknown_type() {
        let result = decode(b"type: SPECTATE\n\n");
        assert_eq!(result, Err(DecodeError::UnknownType("SPECTATE".into())));
    }

    #[test]
    fn test_decode_invalid_sequence() {
        let result = decode(b"type: READY\nseq: -1\n\n");
        assert_eq!(result, Err(DecodeError::InvalidSequence("-1".into())));

        let result = decode(b"type: READY\nseq: 4294967296\n\n");
        assert!(matches!(result, Err(DecodeError::InvalidSequence(_))));
    }

    #[test]
    fn test_decode_duplicate_field() {
        let result = decode(b"type: READY\nstatus: a\nstatus: b\n\n");
        assert_eq!(result, Err(DecodeError::DuplicateField("status".into())));

        let result = decode(b"type: READY\ntype: HELLO\n\n");
        assert_eq!(result, Err(DecodeError::DuplicateField("type".into())));
    }

    #[test]
    fn test_decode_rejects_batched_messages() {
        let result = decode(b"type: READY\nseq: 1\n\ntype: READY\nseq: 2\n\n");
        assert_eq!(result, Err(DecodeError::TrailingData));
    }

    #[test]
    fn test_decode_allows_trailing_whitespace() {
        let msg = decode(b"type: READY\nseq: 1\n\n\n  \n").unwrap();
        assert_eq!(msg.seq, Some(1));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let result = decode(&[0x74, 0x79, 0xff, 0xfe, b'\n', b'\n']);
        assert_eq!(result, Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_encode_ack_matches_message_ack() {
        assert_eq!(encode_ack(12), Message::ack(12).encode().unwrap());
        assert_eq!(decode(&encode_ack(0)).unwrap().ack_seq(), Some(0));
    }
}
