use std::net::SocketAddr;

use async_trait::async_trait;
use pokelink_battle::{
    AttackOutcome, BattleResult, BattleState, ChatLine, IllegalTransition, PokemonStats, Session,
    SessionEvent, SessionState, Side,
};
use pokelink_protocol::MessageType;

use crate::error::DeliveryFailure;

/// Trait for reacting to what happens in a session.
///
/// Implement this trait to drive a peer. All methods have default no-op
/// implementations, so you only need to implement the events you care
/// about. Callbacks run on the session loop: sends requested through a
/// [`PeerHandle`](crate::PeerHandle) from inside a callback are queued and
/// processed after it returns.
///
/// # Example
///
/// ```ignore
/// struct Greeter {
///     handle: PeerHandle,
/// }
///
/// #[async_trait]
/// impl Handler for Greeter {
///     async fn on_handshake_complete(&mut self, _peer: SocketAddr, name: Option<&str>) {
///         let hello = format!("hi {}", name.unwrap_or("there"));
///         self.handle.chat(hello).ok();
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send {
    /// Called for every session event, before the specific callback.
    async fn on_event(&mut self, event: &SessionEvent, session: &Session) {
        let _ = (event, session);
    }

    async fn on_state_change(&mut self, from: SessionState, to: SessionState) {
        let _ = (from, to);
    }

    /// Called once HELLO / HELLO_ACK have been exchanged.
    async fn on_handshake_complete(&mut self, peer: SocketAddr, peer_name: Option<&str>) {
        let _ = (peer, peer_name);
    }

    /// Called when either side chooses its Pokemon.
    async fn on_selection(&mut self, side: Side, pokemon: &PokemonStats) {
        let _ = (side, pokemon);
    }

    async fn on_battle_start(&mut self, first_mover: Side, battle: &BattleState) {
        let _ = (first_mover, battle);
    }

    /// Called after every attack, sent or received.
    async fn on_attack(&mut self, outcome: &AttackOutcome) {
        let _ = outcome;
    }

    /// Called for chat messages and stickers from either side.
    async fn on_chat(&mut self, side: Side, line: &ChatLine) {
        let _ = (side, line);
    }

    async fn on_battle_end(&mut self, result: &BattleResult, won: bool) {
        let _ = (result, won);
    }

    async fn on_disconnect(&mut self, side: Side, reason: Option<&str>) {
        let _ = (side, reason);
    }

    /// Called when the session refuses a message from the peer.
    async fn on_rejected(
        &mut self,
        from: SocketAddr,
        message_type: MessageType,
        error: &IllegalTransition,
    ) {
        let _ = (from, message_type, error);
    }

    /// Called when a message exhausted its retries. The session is dropped
    /// right after.
    async fn on_delivery_failed(&mut self, failure: &DeliveryFailure) {
        let _ = failure;
    }
}
