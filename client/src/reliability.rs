//! Reliable delivery over unreliable datagrams.
//!
//! [`ReliabilityEngine`] tracks, per peer:
//! - the next outbound sequence number (starting at [`SEQUENCE_START`]),
//! - every data message sent but not yet acknowledged,
//! - a window of recently received sequence numbers for duplicate
//!   suppression.
//!
//! Delivery is at-least-once on the wire and exactly-once to the session:
//! duplicates are re-acknowledged but not delivered again. Messages may be
//! delivered out of order.
//!
//! This module only manages state; the caller performs all socket I/O and
//! passes the current time in, which keeps it testable without a clock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use pokelink_protocol::{DecodeError, EncodeError, Message, MessageType, decode, encode_ack};

use crate::config::PeerConfig;
use crate::error::DeliveryFailure;

/// First sequence number used towards every peer
pub const SEQUENCE_START: u32 = 0;

/// Bytes to put on the wire for a newly sent message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub seq: u32,
    pub bytes: Vec<u8>,
}

/// What a received datagram turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// New data message; send `ack` back and hand `message` to the session
    Deliver { message: Message, ack: Vec<u8> },
    /// Already delivered; send `ack` back again and drop it
    Duplicate { seq: u32, ack: Vec<u8> },
    /// Acknowledged one of our pending messages
    Acked { seq: u32 },
    /// Acknowledged something no longer pending
    StaleAck { seq: u32 },
}

/// A pending message due for retransmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resend {
    pub peer: SocketAddr,
    pub seq: u32,
    pub bytes: Vec<u8>,
    /// Transmission number this resend represents (2 for the first resend)
    pub attempt: u32,
}

#[derive(Debug, Default)]
pub struct RetransmitBatch {
    pub resend: Vec<Resend>,
    pub failed: Vec<DeliveryFailure>,
}

impl RetransmitBatch {
    pub fn is_empty(&self) -> bool {
        self.resend.is_empty() && self.failed.is_empty()
    }
}

/// A data message waiting for its ACK
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub message: Message,
    /// Exact bytes of the first transmission, reused for every resend
    pub bytes: Vec<u8>,
    pub first_sent_at: Instant,
    pub last_sent_at: Instant,
    /// Transmissions so far, including the first
    pub attempts: u32,
}

/// Sequence numbers received from one peer.
///
/// Anchored at the highest number seen; anything more than `window` below
/// it is forgotten and treated as already delivered.
#[derive(Debug)]
struct SeenWindow {
    highest: Option<u32>,
    seen: BTreeSet<u32>,
    window: u32,
}

impl SeenWindow {
    fn new(window: u32) -> Self {
        Self {
            highest: None,
            seen: BTreeSet::new(),
            window,
        }
    }

    /// Record `seq`, returning whether it is new
    fn insert(&mut self, seq: u32) -> bool {
        if let Some(highest) = self.highest
            && seq < highest.saturating_sub(self.window)
        {
            return false;
        }
        if !self.seen.insert(seq) {
            return false;
        }

        if self.highest.is_none_or(|highest| seq > highest) {
            self.highest = Some(seq);
            let floor = seq.saturating_sub(self.window);
            self.seen = self.seen.split_off(&floor);
        }
        true
    }
}

#[derive(Debug)]
struct PeerLink {
    next_seq: u32,
    pending: BTreeMap<u32, PendingSend>,
    seen: SeenWindow,
    last_heard: Option<Instant>,
}

impl PeerLink {
    fn new(window: u32) -> Self {
        Self {
            next_seq: SEQUENCE_START,
            pending: BTreeMap::new(),
            seen: SeenWindow::new(window),
            last_heard: None,
        }
    }
}

#[derive(Debug)]
pub struct ReliabilityEngine {
    peers: HashMap<SocketAddr, PeerLink>,
    ack_timeout: Duration,
    max_retries: u32,
    seen_window: u32,
}

impl ReliabilityEngine {
    pub fn new(config: &PeerConfig) -> Self {
        Self {
            peers: HashMap::new(),
            ack_timeout: config.ack_timeout(),
            max_retries: config.max_retries,
            seen_window: config.seen_window,
        }
    }

    fn link(&mut self, peer: SocketAddr) -> &mut PeerLink {
        let window = self.seen_window;
        self.peers
            .entry(peer)
            .or_insert_with(|| PeerLink::new(window))
    }

    /// Assign the next sequence number to a data message and start tracking
    /// it until acknowledged.
    ///
    /// If encoding fails nothing is recorded and the sequence number is not
    /// consumed.
    pub fn send_reliable(
        &mut self,
        peer: SocketAddr,
        mut message: Message,
        now: Instant,
    ) -> Result<Outgoing, EncodeError> {
        let link = self.link(peer);
        let seq = link.next_seq;
        message.seq = Some(seq);
        let bytes = message.encode()?;

        link.next_seq = seq.wrapping_add(1);
        link.pending.insert(
            seq,
            PendingSend {
                message,
                bytes: bytes.clone(),
                first_sent_at: now,
                last_sent_at: now,
                attempts: 1,
            },
        );

        Ok(Outgoing { seq, bytes })
    }

    /// Classify a received datagram
    pub fn on_receive(
        &mut self,
        from: SocketAddr,
        bytes: &[u8],
        now: Instant,
    ) -> Result<Inbound, DecodeError> {
        let message = decode(bytes)?;

        if message.kind == MessageType::Ack {
            let seq = message.ack_seq().ok_or(DecodeError::InvalidAck)?;
            let acked = self
                .peers
                .get_mut(&from)
                .and_then(|link| link.pending.remove(&seq))
                .is_some();
            return Ok(if acked {
                Inbound::Acked { seq }
            } else {
                Inbound::StaleAck { seq }
            });
        }

        let seq = message
            .seq
            .ok_or(DecodeError::MissingSequence(message.kind))?;
        let ack = encode_ack(seq);

        let link = self.link(from);
        link.last_heard = Some(now);
        if link.seen.insert(seq) {
            Ok(Inbound::Deliver { message, ack })
        } else {
            Ok(Inbound::Duplicate { seq, ack })
        }
    }

    /// Collect messages whose ACK is overdue.
    ///
    /// Each is resent with the same sequence number and bytes while it has
    /// retries left; after that it is dropped and reported as failed, and
    /// never retried again.
    pub fn poll_retransmit(&mut self, now: Instant) -> RetransmitBatch {
        let mut batch = RetransmitBatch::default();

        for (peer, link) in &mut self.peers {
            let mut expired = Vec::new();

            for (seq, entry) in link.pending.iter_mut() {
                if now.saturating_duration_since(entry.last_sent_at) < self.ack_timeout {
                    continue;
                }
                if entry.attempts <= self.max_retries {
                    entry.attempts += 1;
                    entry.last_sent_at = now;
                    batch.resend.push(Resend {
                        peer: *peer,
                        seq: *seq,
                        bytes: entry.bytes.clone(),
                        attempt: entry.attempts,
                    });
                } else {
                    expired.push(*seq);
                }
            }

            for seq in expired {
                if let Some(entry) = link.pending.remove(&seq) {
                    batch.failed.push(DeliveryFailure {
                        peer: *peer,
                        seq,
                        message_type: entry.message.kind,
                        attempts: entry.attempts,
                    });
                }
            }
        }

        batch
    }

    /// Forget everything about `peer`. Returns how many pending messages were
    /// dropped.
    pub fn teardown(&mut self, peer: SocketAddr) -> usize {
        self.peers
            .remove(&peer)
            .map(|link| link.pending.len())
            .unwrap_or(0)
    }

    pub fn pending_count(&self, peer: SocketAddr) -> usize {
        self.peers
            .get(&peer)
            .map(|link| link.pending.len())
            .unwrap_or(0)
    }

    pub fn pending(&self, peer: SocketAddr, seq: u32) -> Option<&PendingSend> {
        self.peers.get(&peer)?.pending.get(&seq)
    }

    /// Sequence number the next message to `peer` will carry
    pub fn next_seq(&self, peer: SocketAddr) -> u32 {
        self.peers
            .get(&peer)
            .map(|link| link.next_seq)
            .unwrap_or(SEQUENCE_START)
    }

    /// Addresses with any tracked state
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn last_heard(&self, peer: SocketAddr) -> Option<Instant> {
        self.peers.get(&peer)?.last_heard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(max_retries: u32) -> ReliabilityEngine {
        let config = PeerConfig {
            max_retries,
            ..PeerConfig::default()
        };
        ReliabilityEngine::new(&config)
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn chat(text: &str) -> Message {
        Message::new(MessageType::ChatMessage)
            .with("sender", "red")
            .with("message", text)
    }

    fn data(seq: u32) -> Vec<u8> {
        let mut msg = chat("hi");
        msg.seq = Some(seq);
        msg.encode().unwrap()
    }

    #[test]
    fn test_sequence_numbers_per_peer() {
        let mut engine = engine(5);
        let now = Instant::now();

        assert_eq!(engine.send_reliable(addr(1), chat("a"), now).unwrap().seq, 0);
        assert_eq!(engine.send_reliable(addr(1), chat("b"), now).unwrap().seq, 1);
        assert_eq!(engine.send_reliable(addr(2), chat("c"), now).unwrap().seq, 0);
        assert_eq!(engine.pending_count(addr(1)), 2);
        assert_eq!(engine.next_seq(addr(1)), 2);
    }

    #[test]
    fn test_encode_failure_consumes_nothing() {
        let mut engine = engine(5);
        let bad = chat("line\nbreak");

        assert!(engine.send_reliable(addr(1), bad, Instant::now()).is_err());
        assert_eq!(engine.pending_count(addr(1)), 0);
        assert_eq!(engine.next_seq(addr(1)), SEQUENCE_START);
    }

    #[test]
    fn test_ack_clears_pending() {
        let mut engine = engine(5);
        let now = Instant::now();
        let out = engine.send_reliable(addr(1), chat("a"), now).unwrap();

        let ack = encode_ack(out.seq);
        assert_eq!(
            engine.on_receive(addr(1), &ack, now),
            Ok(Inbound::Acked { seq: out.seq })
        );
        assert_eq!(engine.pending_count(addr(1)), 0);
        assert_eq!(
            engine.on_receive(addr(1), &ack, now),
            Ok(Inbound::StaleAck { seq: out.seq })
        );
    }

    #[test]
    fn test_ack_from_other_address_is_stale() {
        let mut engine = engine(5);
        let now = Instant::now();
        let out = engine.send_reliable(addr(1), chat("a"), now).unwrap();

        assert_eq!(
            engine.on_receive(addr(2), &encode_ack(out.seq), now),
            Ok(Inbound::StaleAck { seq: out.seq })
        );
        assert_eq!(engine.pending_count(addr(1)), 1);
    }

    #[test]
    fn test_duplicate_delivered_once_acked_twice() {
        let mut engine = engine(5);
        let now = Instant::now();
        let bytes = data(7);

        let first = engine.on_receive(addr(1), &bytes, now).unwrap();
        let second = engine.on_receive(addr(1), &bytes, now).unwrap();

        match first {
            Inbound::Deliver { message, ack } => {
                assert_eq!(message.seq, Some(7));
                assert_eq!(ack, encode_ack(7));
            }
            other => panic!("expected delivery, got {:?}", other),
        }
        assert_eq!(
            second,
            Inbound::Duplicate {
                seq: 7,
                ack: encode_ack(7)
            }
        );
    }

    #[test]
    fn test_out_of_order_arrival_delivered() {
        let mut engine = engine(5);
        let now = Instant::now();

        for seq in [2, 0, 1] {
            assert!(matches!(
                engine.on_receive(addr(1), &data(seq), now),
                Ok(Inbound::Deliver { .. })
            ));
        }
        assert_eq!(engine.last_heard(addr(1)), Some(now));
    }

    #[test]
    fn test_seen_window_evicts_old_numbers() {
        let config = PeerConfig {
            seen_window: 4,
            ..PeerConfig::default()
        };
        let mut engine = ReliabilityEngine::new(&config);
        let now = Instant::now();

        assert!(matches!(
            engine.on_receive(addr(1), &data(10), now),
            Ok(Inbound::Deliver { .. })
        ));
        // below 10 - 4: treated as already delivered
        assert!(matches!(
            engine.on_receive(addr(1), &data(3), now),
            Ok(Inbound::Duplicate { seq: 3, .. })
        ));
        assert!(matches!(
            engine.on_receive(addr(1), &data(7), now),
            Ok(Inbound::Deliver { .. })
        ));
    }

    #[test]
    fn test_malformed_datagrams() {
        let mut engine = engine(5);
        let now = Instant::now();

        assert!(engine.on_receive(addr(1), b"garbage", now).is_err());
        assert_eq!(
            engine.on_receive(addr(1), &chat("no seq").encode().unwrap(), now),
            Err(DecodeError::MissingSequence(MessageType::ChatMessage))
        );
        assert_eq!(
            engine.on_receive(addr(1), b"type: ACK\n\n", now),
            Err(DecodeError::InvalidAck)
        );
    }

    #[test]
    fn test_retransmit_after_timeout_with_same_bytes() {
        let mut engine = engine(5);
        let t0 = Instant::now();
        let out = engine.send_reliable(addr(1), chat("a"), t0).unwrap();

        assert!(engine.poll_retransmit(t0 + Duration::from_millis(1999)).is_empty());

        let batch = engine.poll_retransmit(t0 + Duration::from_secs(2));
        assert_eq!(
            batch.resend,
            vec![Resend {
                peer: addr(1),
                seq: out.seq,
                bytes: out.bytes.clone(),
                attempt: 2
            }]
        );
        assert!(batch.failed.is_empty());

        // the timer restarts from the resend
        assert!(engine.poll_retransmit(t0 + Duration::from_secs(3)).is_empty());
        let pending = engine.pending(addr(1), out.seq).unwrap();
        assert_eq!(pending.attempts, 2);
        assert_eq!(pending.first_sent_at, t0);
    }

    #[test]
    fn test_failure_after_retry_ceiling() {
        let mut engine = engine(2);
        let t0 = Instant::now();
        let out = engine.send_reliable(addr(1), chat("a"), t0).unwrap();
        let step = |n: u64| t0 + Duration::from_secs(2 * n);

        assert_eq!(engine.poll_retransmit(step(1)).resend.len(), 1);
        assert_eq!(engine.poll_retransmit(step(2)).resend.len(), 1);

        let batch = engine.poll_retransmit(step(3));
        assert!(batch.resend.is_empty());
        assert_eq!(
            batch.failed,
            vec![DeliveryFailure {
                peer: addr(1),
                seq: out.seq,
                message_type: MessageType::ChatMessage,
                attempts: 3
            }]
        );
        assert_eq!(engine.pending_count(addr(1)), 0);

        assert!(engine.poll_retransmit(step(10)).is_empty());
    }

    #[test]
    fn test_teardown_resets_peer() {
        let mut engine = engine(5);
        let now = Instant::now();
        engine.send_reliable(addr(1), chat("a"), now).unwrap();
        engine.send_reliable(addr(1), chat("b"), now).unwrap();
        engine.on_receive(addr(1), &data(0), now).unwrap();

        engine.on_receive(addr(2), &data(0), now).unwrap();
        assert_eq!(engine.peer_count(), 2);

        assert_eq!(engine.teardown(addr(1)), 2);
        assert_eq!(engine.peer_count(), 1);
        assert_eq!(engine.pending_count(addr(1)), 0);
        assert_eq!(engine.next_seq(addr(1)), SEQUENCE_START);

        // a new session may reuse sequence numbers
        assert!(matches!(
            engine.on_receive(addr(1), &data(0), now),
            Ok(Inbound::Deliver { .. })
        ));
        assert!(engine.poll_retransmit(now + Duration::from_secs(60)).is_empty());
    }
}
