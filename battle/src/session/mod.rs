//! Session state machine driven by protocol messages.
//!
//! A [`Session`] sees every message twice: once on the sending peer through
//! [`Session::apply_outbound`] and once on the receiving peer through
//! [`Session::apply_inbound`]. Both directions go through the same
//! transition table, so the two peers walk through the same states.

mod battle;
mod events;
mod state;
mod table;

pub use battle::{BattleState, first_mover};
pub use events::{AttackOutcome, BattleResult, ChatLine, SessionEvent, Transition};
pub use state::{Role, SessionState, Side};
pub use table::{Edge, EdgeKind, TRANSITION_TABLE, accepted_in, accepted_later, lookup};

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;

use pokelink_protocol::{AttackPayload, Message, MessageType, Payload, PokemonEntry};

use crate::IllegalTransition;
use crate::resolver::{StandardResolver, TurnResolver};
use crate::types::{Move, PokemonStats};

/// Transitions kept in the history log
pub const HISTORY_LIMIT: usize = 256;

/// Early inbound messages parked while waiting for the session to catch up
pub const MAX_DEFERRED: usize = 16;

/// One peer's view of a two-player session
pub struct Session {
    role: Role,
    player_name: String,
    state: SessionState,

    peer: Option<SocketAddr>,
    peer_name: Option<String>,

    /// Indexed by `Side::index`
    selections: [Option<PokemonStats>; 2],
    ready: [bool; 2],

    battle: Option<BattleState>,
    result: Option<BattleResult>,

    resolver: Box<dyn TurnResolver>,
    history: VecDeque<Transition>,
    deferred: VecDeque<(SocketAddr, Message)>,
}

impl Session {
    /// Create a session that resolves attacks with [`StandardResolver`]
    pub fn new(role: Role, player_name: impl Into<String>) -> Self {
        Self::with_resolver(role, player_name, Box::new(StandardResolver))
    }

    pub fn with_resolver(
        role: Role,
        player_name: impl Into<String>,
        resolver: Box<dyn TurnResolver>,
    ) -> Self {
        Self {
            role,
            player_name: player_name.into(),
            state: SessionState::Disconnected,
            peer: None,
            peer_name: None,
            selections: [None, None],
            ready: [false, false],
            battle: None,
            result: None,
            resolver,
            history: VecDeque::new(),
            deferred: VecDeque::new(),
        }
    }

    // === Queries ===

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Peer endpoint, fixed from the first HELLO until disconnect
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn peer_name(&self) -> Option<&str> {
        self.peer_name.as_deref()
    }

    pub fn selection(&self, side: Side) -> Option<&PokemonStats> {
        self.selections[side.index()].as_ref()
    }

    pub fn is_ready(&self, side: Side) -> bool {
        self.ready[side.index()]
    }

    pub fn battle(&self) -> Option<&BattleState> {
        self.battle.as_ref()
    }

    pub fn result(&self) -> Option<&BattleResult> {
        self.result.as_ref()
    }

    /// Whether it is this peer's turn to attack
    pub fn is_my_turn(&self) -> bool {
        self.state == SessionState::InBattle
            && self.battle.as_ref().is_some_and(|b| b.is_turn(Side::Local))
    }

    /// Recent transitions, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Transition> {
        self.history.iter()
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Moves the locally selected Pokemon can use
    pub fn local_moves(&self) -> Vec<Move> {
        self.selection(Side::Local)
            .map(|s| Move::moveset_for(s.primary_type, s.secondary_type))
            .unwrap_or_default()
    }

    /// Uses left for one of our moves, while a battle runs
    pub fn uses_left(&self, mv: &Move) -> Option<u32> {
        self.battle
            .as_ref()
            .map(|battle| battle.local.uses_left(&mv.name))
    }

    fn name_of(&self, side: Side) -> String {
        match side {
            Side::Local => self.player_name.clone(),
            Side::Remote => self.peer_name.clone().unwrap_or_default(),
        }
    }

    // === Message builders ===

    pub fn hello(&self) -> Message {
        Payload::Hello {
            player_name: self.player_name.clone(),
            role: Some(self.role.to_string()),
        }
        .into_message()
    }

    pub fn select(&self, pokemon: &PokemonStats) -> Message {
        Payload::PokemonSelect(PokemonEntry::from(pokemon)).into_message()
    }

    pub fn ready(&self) -> Message {
        Payload::Ready.into_message()
    }

    pub fn attack(&self, mv: &Move) -> Message {
        Payload::Attack(mv.to_payload(self.player_name.clone())).into_message()
    }

    pub fn chat(&self, text: impl Into<String>) -> Message {
        Payload::Chat {
            sender: self.player_name.clone(),
            text: text.into(),
        }
        .into_message()
    }

    pub fn sticker(&self, sticker: impl Into<String>) -> Message {
        Payload::Sticker {
            sender: self.player_name.clone(),
            sticker: sticker.into(),
        }
        .into_message()
    }

    pub fn disconnect(&self, reason: Option<String>) -> Message {
        Payload::Disconnect {
            player_name: self.player_name.clone(),
            reason,
        }
        .into_message()
    }

    // === Transitions ===

    /// Apply a message received from `from`.
    ///
    /// On error the session is unchanged.
    pub fn apply_inbound(
        &mut self,
        from: SocketAddr,
        msg: &Message,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        let mut msg = msg.clone();
        self.apply(Side::Remote, from, &mut msg)
    }

    /// Apply a message this peer is about to send to `to`.
    ///
    /// Fills in derived fields (`damage` and `turn_number` on ATTACK). On
    /// error the session and the message are unchanged and nothing should be
    /// sent.
    pub fn apply_outbound(
        &mut self,
        to: SocketAddr,
        msg: &mut Message,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        self.apply(Side::Local, to, msg)
    }

    /// Drop the session without a DISCONNECT exchange (e.g. the peer stopped
    /// acknowledging)
    pub fn force_disconnect(&mut self, reason: Option<String>) -> Vec<SessionEvent> {
        if !self.state.is_connected() {
            return Vec::new();
        }
        self.on_disconnect(Side::Local, reason)
    }

    fn apply(
        &mut self,
        side: Side,
        addr: SocketAddr,
        msg: &mut Message,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        let before = self.state;
        let mut events = self.dispatch(side, addr, msg)?;
        if self.state != before {
            self.replay_deferred(&mut events);
        }
        Ok(events)
    }

    fn dispatch(
        &mut self,
        side: Side,
        addr: SocketAddr,
        msg: &mut Message,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        if self.state.is_connected() && self.peer != Some(addr) {
            return Err(IllegalTransition::ForeignPeer(addr));
        }

        let Some(edge) = table::lookup(self.state, msg.kind) else {
            return self.defer_or_reject(side, addr, msg);
        };

        let not_accepted = IllegalTransition::NotAccepted {
            state: self.state,
            message_type: msg.kind,
        };

        let events = match (edge.kind, Payload::parse(msg)?) {
            // past Disconnected, HELLO and HELLO_ACK only arrive from a peer
            // that opened at the same time as us
            (EdgeKind::Connect, Payload::Hello { .. })
                if self.state.is_connected() && side == Side::Local =>
            {
                return Err(not_accepted);
            }
            (EdgeKind::Connect, Payload::Hello { player_name, .. }) => {
                self.on_connect(side, addr, player_name)
            }
            (EdgeKind::Handshake, Payload::HelloAck { .. })
                if self.state == SessionState::Selecting && side == Side::Local =>
            {
                return Err(not_accepted);
            }
            (EdgeKind::Handshake, Payload::HelloAck { player_name }) => {
                self.on_handshake(side, player_name)
            }
            (EdgeKind::Select, Payload::PokemonSelect(entry)) => self.on_select(side, &entry)?,
            (EdgeKind::Rematch, Payload::PokemonSelect(entry)) => {
                self.on_rematch(side, &entry)?
            }
            (EdgeKind::Ready, Payload::Ready) => self.on_ready(side)?,
            (EdgeKind::BattleStart, Payload::BattleStart { first_player }) => {
                self.on_battle_start(side, first_player)?
            }
            (EdgeKind::Attack, Payload::Attack(attack)) => self.on_attack(side, &attack, msg)?,
            (EdgeKind::HpUpdate, Payload::HpUpdate { hp, .. }) => self.on_hp_update(side, hp),
            (EdgeKind::BattleResult, Payload::BattleResult { winner, loser }) => {
                self.on_battle_result(side, BattleResult { winner, loser })
            }
            (EdgeKind::Chat, Payload::Chat { sender, text }) => vec![SessionEvent::Chat {
                side,
                line: ChatLine {
                    sender,
                    text: Some(text),
                    sticker: None,
                },
            }],
            (EdgeKind::Chat, Payload::Sticker { sender, sticker }) => vec![SessionEvent::Chat {
                side,
                line: ChatLine {
                    sender,
                    text: None,
                    sticker: Some(sticker),
                },
            }],
            (EdgeKind::Disconnect, Payload::Disconnect { reason, .. }) => {
                self.on_disconnect(side, reason)
            }
            _ => return Err(not_accepted),
        };

        Ok(events)
    }

    /// Park an inbound message that overtook the one moving us to the state
    /// that accepts it, or reject it.
    fn defer_or_reject(
        &mut self,
        side: Side,
        addr: SocketAddr,
        msg: &Message,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        let waiting = matches!(
            self.state,
            SessionState::Connecting | SessionState::ReadyWait
        );
        let early = side == Side::Remote
            && waiting
            && table::accepted_later(self.state, msg.kind)
            && self.deferred.len() < MAX_DEFERRED;

        if !early {
            return Err(IllegalTransition::NotAccepted {
                state: self.state,
                message_type: msg.kind,
            });
        }

        self.deferred.push_back((addr, msg.clone()));
        Ok(vec![SessionEvent::Deferred {
            message_type: msg.kind,
        }])
    }

    fn replay_deferred(&mut self, events: &mut Vec<SessionEvent>) {
        while !self.deferred.is_empty() {
            let before = self.state;
            let parked: Vec<_> = self.deferred.drain(..).collect();
            for (addr, mut msg) in parked {
                match self.dispatch(Side::Remote, addr, &mut msg) {
                    Ok(more) => events.extend(more),
                    Err(error) => events.push(SessionEvent::Rejected {
                        message_type: msg.kind,
                        error,
                    }),
                }
            }
            if self.state == before {
                break;
            }
        }
    }

    fn transition(
        &mut self,
        to: SessionState,
        message_type: MessageType,
        side: Side,
        events: &mut Vec<SessionEvent>,
    ) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;

        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(Transition {
            from,
            to,
            message_type,
            side,
        });
        events.push(SessionEvent::StateChanged { from, to });
    }

    // === Edge handlers ===

    fn on_connect(&mut self, side: Side, addr: SocketAddr, player_name: String) -> Vec<SessionEvent> {
        self.peer = Some(addr);
        if side == Side::Remote {
            self.peer_name = Some(player_name);
        }

        let mut events = vec![SessionEvent::PeerRecorded {
            addr,
            name: self.peer_name.clone(),
        }];
        self.transition(SessionState::Connecting, MessageType::Hello, side, &mut events);

        if side == Side::Remote {
            let ack = Payload::HelloAck {
                player_name: self.player_name.clone(),
            };
            events.push(SessionEvent::Emit(ack.into_message()));
        }
        events
    }

    fn on_handshake(&mut self, side: Side, player_name: String) -> Vec<SessionEvent> {
        if side == Side::Remote {
            self.peer_name = Some(player_name);
        }

        // the answer to our own HELLO_ACK after a simultaneous open
        if self.state == SessionState::Selecting {
            return Vec::new();
        }

        let mut events = Vec::new();
        self.transition(SessionState::Selecting, MessageType::HelloAck, side, &mut events);
        events.push(SessionEvent::HandshakeComplete {
            peer_name: self.peer_name.clone(),
        });
        events
    }

    fn on_select(
        &mut self,
        side: Side,
        entry: &PokemonEntry,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        // a choice is final once its side is ready
        if self.is_ready(side) && self.selection(side).is_some() {
            return Err(IllegalTransition::AlreadyReady(side));
        }
        let stats = PokemonStats::try_from(entry)?;

        let mut events = Vec::new();
        self.record_selection(side, stats, &mut events);
        self.try_start_battle(MessageType::PokemonSelect, side, &mut events);
        Ok(events)
    }

    fn on_rematch(
        &mut self,
        side: Side,
        entry: &PokemonEntry,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        let stats = PokemonStats::try_from(entry)?;

        self.battle = None;
        self.result = None;
        self.selections = [None, None];
        self.ready = [false, false];

        let mut events = Vec::new();
        self.transition(
            SessionState::Selecting,
            MessageType::PokemonSelect,
            side,
            &mut events,
        );
        self.record_selection(side, stats, &mut events);
        Ok(events)
    }

    fn record_selection(&mut self, side: Side, stats: PokemonStats, events: &mut Vec<SessionEvent>) {
        let was_complete = self.selections.iter().all(Option::is_some);
        self.selections[side.index()] = Some(stats.clone());
        events.push(SessionEvent::SelectionRecorded {
            side,
            pokemon: stats,
        });

        if !was_complete && self.selections.iter().all(Option::is_some) {
            events.push(SessionEvent::SelectionComplete);
        }
    }

    fn on_ready(&mut self, side: Side) -> Result<Vec<SessionEvent>, IllegalTransition> {
        if self.is_ready(side) {
            return Err(IllegalTransition::AlreadyReady(side));
        }
        // the peer's choice may still be in flight, ours may not
        if side == Side::Local && self.selection(side).is_none() {
            return Err(IllegalTransition::SelectionRequired(side));
        }

        self.ready[side.index()] = true;
        let mut events = vec![SessionEvent::ReadyRecorded { side }];
        self.transition(SessionState::ReadyWait, MessageType::Ready, side, &mut events);
        self.try_start_battle(MessageType::Ready, side, &mut events);
        Ok(events)
    }

    /// Enter the battle once both sides have chosen and are ready
    fn try_start_battle(
        &mut self,
        message_type: MessageType,
        side: Side,
        events: &mut Vec<SessionEvent>,
    ) {
        if self.state != SessionState::ReadyWait || !self.ready.iter().all(|r| *r) {
            return;
        }
        let (Some(local), Some(remote)) = (&self.selections[0], &self.selections[1]) else {
            return;
        };

        let battle = BattleState::new(local.clone(), remote.clone(), self.role);
        let first_mover = battle.first_mover;
        self.battle = Some(battle);

        self.transition(SessionState::InBattle, message_type, side, events);
        events.push(SessionEvent::BattleStarted { first_mover });

        if self.role == Role::Host {
            let start = Payload::BattleStart {
                first_player: self.name_of(first_mover),
            };
            events.push(SessionEvent::Emit(start.into_message()));
        }
    }

    fn on_battle_start(
        &mut self,
        side: Side,
        first_player: String,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        let sender_is_host = match side {
            Side::Local => self.role == Role::Host,
            Side::Remote => self.role == Role::Joiner,
        };
        if !sender_is_host {
            return Err(IllegalTransition::NotHost);
        }
        if side == Side::Local {
            return Ok(Vec::new());
        }

        let is_local = first_player == self.player_name;
        let is_remote = self.peer_name.as_deref() == Some(first_player.as_str());
        let Some(battle) = self.battle.as_mut() else {
            return Err(IllegalTransition::NotAccepted {
                state: self.state,
                message_type: MessageType::BattleStart,
            });
        };

        let announced = match (is_local, is_remote) {
            (true, false) => Side::Local,
            (false, true) => Side::Remote,
            // both players share a name, nothing to adopt
            (true, true) => battle.first_mover,
            (false, false) => return Err(IllegalTransition::UnknownPlayer(first_player)),
        };

        let agreed = announced == battle.first_mover;
        battle.set_first_mover(announced);

        Ok(vec![SessionEvent::FirstMoverAnnounced {
            first_mover: battle.first_mover,
            agreed,
        }])
    }

    fn on_attack(
        &mut self,
        side: Side,
        attack: &AttackPayload,
        msg: &mut Message,
    ) -> Result<Vec<SessionEvent>, IllegalTransition> {
        let Some(battle) = self.battle.as_mut() else {
            return Err(IllegalTransition::NotAccepted {
                state: self.state,
                message_type: MessageType::Attack,
            });
        };
        if !battle.is_turn(side) {
            return Err(IllegalTransition::NotYourTurn { attacker: side });
        }
        let mv = Move::try_from(attack)?;
        // the peer enforces its own limit
        if !battle.pokemon_mut(side).use_move(&mv.name) && side == Side::Local {
            return Err(IllegalTransition::MoveExhausted(mv.name));
        }

        let resolution = self.resolver.resolve(
            &battle.pokemon(side).stats,
            &battle.pokemon(side.opposite()).stats,
            &mv,
        );
        let turn_number = battle.turn_number;

        let defender = battle.pokemon_mut(side.opposite());
        let dealt = defender.take_damage(resolution.damage);
        let outcome = AttackOutcome {
            attacker: side,
            mv,
            resolution: resolution.clone(),
            damage: dealt,
            defender_hp: defender.hp_current,
            defender_max_hp: defender.hp_max(),
            turn_number,
            fainted: defender.is_fainted(),
        };
        if !outcome.fainted {
            battle.advance_turn();
        }

        let mut events = Vec::new();
        match side {
            Side::Local => {
                msg.set("damage", resolution.damage);
                msg.set("turn_number", turn_number);
            }
            Side::Remote => {
                let reported = attack.damage.filter(|d| *d != resolution.damage);
                if let Some(reported) = reported {
                    events.push(SessionEvent::DamageMismatch {
                        reported,
                        computed: resolution.damage,
                    });
                }
            }
        }

        let fainted = outcome.fainted;
        let hp_update = Payload::HpUpdate {
            player: self.player_name.clone(),
            hp: outcome.defender_hp,
            max_hp: outcome.defender_max_hp,
            turn_number,
        };
        events.push(SessionEvent::AttackResolved(outcome));

        // the defender reports its HP and, when it faints, the result
        if side == Side::Remote {
            events.push(SessionEvent::Emit(hp_update.into_message()));
        }

        if fainted {
            let result = BattleResult {
                winner: self.name_of(side),
                loser: self.name_of(side.opposite()),
            };
            self.result = Some(result.clone());
            self.transition(SessionState::BattleEnded, MessageType::Attack, side, &mut events);
            events.push(SessionEvent::BattleEnded(result.clone()));

            if side == Side::Remote {
                let payload = Payload::BattleResult {
                    winner: result.winner,
                    loser: result.loser,
                };
                events.push(SessionEvent::Emit(payload.into_message()));
            }
        }

        Ok(events)
    }

    fn on_hp_update(&mut self, side: Side, hp: u32) -> Vec<SessionEvent> {
        // the sender reports its own Pokemon
        let Some(battle) = self.battle.as_ref() else {
            return Vec::new();
        };
        if side == Side::Local {
            return Vec::new();
        }

        let expected = battle.pokemon(side).hp_current;
        let event = if hp == expected {
            SessionEvent::HpConfirmed { side, hp }
        } else {
            SessionEvent::HpMismatch {
                side,
                reported: hp,
                expected,
            }
        };
        vec![event]
    }

    fn on_battle_result(&mut self, side: Side, reported: BattleResult) -> Vec<SessionEvent> {
        if side == Side::Local {
            return Vec::new();
        }

        let event = match &self.result {
            Some(expected) if *expected == reported => SessionEvent::ResultConfirmed(reported),
            expected => SessionEvent::ResultMismatch {
                reported,
                expected: expected.clone(),
            },
        };
        vec![event]
    }

    fn on_disconnect(&mut self, side: Side, reason: Option<String>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.transition(
            SessionState::Disconnected,
            MessageType::Disconnect,
            side,
            &mut events,
        );

        self.peer = None;
        self.peer_name = None;
        self.selections = [None, None];
        self.ready = [false, false];
        self.battle = None;
        self.result = None;
        self.deferred.clear();

        events.push(SessionEvent::Disconnected { side, reason });
        events
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("player_name", &self.player_name)
            .field("state", &self.state)
            .field("peer", &self.peer)
            .field("peer_name", &self.peer_name)
            .field("battle", &self.battle)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}
