use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use pokelink_battle::{Session, SessionEvent};
use pokelink_protocol::Message;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::PeerConfig;
use crate::error::PeerError;
use crate::handle::{Command, Input, PeerHandle};
use crate::handler::Handler;
use crate::reliability::{Inbound, ReliabilityEngine};
use crate::transport::Transport;

type SharedEngine = Arc<Mutex<ReliabilityEngine>>;

fn lock(engine: &Mutex<ReliabilityEngine>) -> MutexGuard<'_, ReliabilityEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entry point for starting a peer
pub struct Peer;

impl Peer {
    /// Bind the socket and start the receive task.
    ///
    /// Returns a handle for queueing sends and the runner that owns the
    /// session. Nothing is processed until [`PeerRunner::run`] is awaited.
    pub async fn bind(
        config: PeerConfig,
        session: Session,
    ) -> Result<(PeerHandle, PeerRunner), PeerError> {
        config.validate()?;
        let transport = Arc::new(Transport::bind(&config).await?);
        let engine = Arc::new(Mutex::new(ReliabilityEngine::new(&config)));
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        tracing::info!(
            addr = %transport.local_addr(),
            role = %session.role(),
            player = session.player_name(),
            "Peer bound"
        );

        let receive_task = tokio::spawn(receive_loop(
            transport.clone(),
            engine.clone(),
            tx.clone(),
            shutdown_rx,
        ));

        let handle = PeerHandle::new(tx, transport.local_addr());
        let runner = PeerRunner {
            session,
            config,
            transport,
            engine,
            inputs: rx,
            outbox: VecDeque::new(),
            shutdown,
            receive_task: Some(receive_task),
        };

        Ok((handle, runner))
    }
}

/// Polls the socket, acknowledges data messages and forwards new ones to the
/// session loop.
async fn receive_loop(
    transport: Arc<Transport>,
    engine: SharedEngine,
    inputs: mpsc::UnboundedSender<Input>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = transport.recv() => received,
        };

        let (bytes, from) = match received {
            Ok(Some(datagram)) => datagram,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(error = %e, "Failed to receive datagram");
                continue;
            }
        };

        let inbound = lock(&engine).on_receive(from, &bytes, Instant::now());
        match inbound {
            Ok(Inbound::Deliver { message, ack }) => {
                tracing::debug!(peer = %from, seq = ?message.seq, message_type = %message.kind, "Received");
                send_ack(&transport, &ack, from).await;
                if inputs.send(Input::Delivered { from, message }).is_err() {
                    break;
                }
            }
            Ok(Inbound::Duplicate { seq, ack }) => {
                tracing::debug!(peer = %from, seq, "Duplicate, acknowledging again");
                send_ack(&transport, &ack, from).await;
            }
            Ok(Inbound::Acked { seq }) => {
                tracing::debug!(peer = %from, seq, "Acknowledged");
            }
            Ok(Inbound::StaleAck { seq }) => {
                tracing::debug!(peer = %from, seq, "Ignoring ACK for nothing pending");
            }
            Err(e) => {
                tracing::warn!(peer = %from, error = %e, "Dropping malformed datagram");
            }
        }
    }

    tracing::debug!("Receive task stopped");
}

async fn send_ack(transport: &Transport, ack: &[u8], peer: SocketAddr) {
    if let Err(e) = transport.send_to(ack, peer).await {
        tracing::error!(peer = %peer, error = %e, "Failed to send ACK");
    }
}

/// Owns the session and drives it from inbound messages, send requests and
/// the retransmission timer.
pub struct PeerRunner {
    session: Session,
    config: PeerConfig,
    transport: Arc<Transport>,
    engine: SharedEngine,
    inputs: mpsc::UnboundedReceiver<Input>,
    /// Messages the session asked us to send, in order
    outbox: VecDeque<Message>,
    shutdown: watch::Sender<bool>,
    receive_task: Option<JoinHandle<()>>,
}

impl PeerRunner {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Messages still waiting for an ACK from the current peer
    pub fn pending_count(&self) -> usize {
        match self.session.peer() {
            Some(peer) => lock(&self.engine).pending_count(peer),
            None => 0,
        }
    }

    /// Addresses the reliability layer holds state for
    pub fn tracked_peers(&self) -> usize {
        lock(&self.engine).peer_count()
    }

    /// Run the session loop, dispatching events to the handler.
    ///
    /// Runs until [`PeerHandle::shutdown`] is called. A finished or failed
    /// session does not stop the loop; a new one can be started with
    /// [`PeerHandle::connect`].
    pub async fn run<H: Handler>(&mut self, handler: &mut H) -> Result<(), PeerError> {
        let mut retransmit = tokio::time::interval(self.config.retransmit_interval());
        retransmit.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(Input::Delivered { from, message }) => {
                        self.on_delivered(handler, from, message).await;
                    }
                    Some(Input::Command { command, reply }) => {
                        let result = self.on_command(handler, command).await;
                        match reply {
                            Some(reply) => {
                                let _ = reply.send(result);
                            }
                            None => {
                                if let Err(e) = result {
                                    tracing::warn!(error = %e, "Send request failed");
                                }
                            }
                        }
                    }
                    Some(Input::Shutdown) | None => break,
                },
                _ = retransmit.tick() => self.on_retransmit_tick(handler).await,
            }
        }

        self.stop().await;
        Ok(())
    }

    async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.receive_task.take()
            && let Err(e) = task.await
        {
            tracing::error!(error = %e, "Receive task failed");
        }
        tracing::info!(addr = %self.local_addr(), "Peer stopped");
    }

    async fn on_delivered<H: Handler>(&mut self, handler: &mut H, from: SocketAddr, message: Message) {
        let message_type = message.kind;
        match self.session.apply_inbound(from, &message) {
            Ok(events) => self.dispatch_events(handler, from, events).await,
            Err(error) => {
                // only the session peer keeps reliability state
                if self.session.peer() != Some(from) {
                    lock(&self.engine).teardown(from);
                }
                tracing::warn!(
                    peer = %from,
                    message_type = %message_type,
                    state = %self.session.state(),
                    error = %error,
                    "Rejected inbound message"
                );
                handler.on_rejected(from, message_type, &error).await;
            }
        }
        self.flush(handler).await;
    }

    async fn on_command<H: Handler>(
        &mut self,
        handler: &mut H,
        command: Command,
    ) -> Result<u32, PeerError> {
        let (to, message) = match command {
            Command::Connect(peer) => (peer, self.session.hello()),
            Command::Select(pokemon) => (self.peer()?, self.session.select(&pokemon)),
            Command::Ready => (self.peer()?, self.session.ready()),
            Command::Attack(mv) => (self.peer()?, self.session.attack(&mv)),
            Command::Chat(text) => (self.peer()?, self.session.chat(text)),
            Command::Sticker(sticker) => (self.peer()?, self.session.sticker(sticker)),
            Command::Disconnect(reason) => (self.peer()?, self.session.disconnect(reason)),
            Command::Send(message) => (self.peer()?, message),
        };

        let seq = self.transmit(handler, to, message).await?;
        self.flush(handler).await;
        Ok(seq)
    }

    fn peer(&self) -> Result<SocketAddr, PeerError> {
        self.session.peer().ok_or(PeerError::NoPeer)
    }

    /// Send everything the session queued up
    async fn flush<H: Handler>(&mut self, handler: &mut H) {
        while let Some(message) = self.outbox.pop_front() {
            let message_type = message.kind;
            let result = match self.peer() {
                Ok(to) => self.transmit(handler, to, message).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(message_type = %message_type, error = %e, "Dropped queued message");
            }
        }
    }

    /// Validate a message against the session, then send it reliably
    async fn transmit<H: Handler>(
        &mut self,
        handler: &mut H,
        to: SocketAddr,
        mut message: Message,
    ) -> Result<u32, PeerError> {
        // refuse unencodable messages before the session moves
        message.encode()?;
        let events = self.session.apply_outbound(to, &mut message)?;

        let message_type = message.kind;
        let outgoing = lock(&self.engine).send_reliable(to, message, Instant::now())?;
        // once tracked, a failed first send is left to the retransmit timer
        match self.transport.send_to(&outgoing.bytes, to).await {
            Ok(()) => {
                tracing::debug!(peer = %to, seq = outgoing.seq, message_type = %message_type, "Sent");
            }
            Err(e) => {
                tracing::warn!(
                    peer = %to,
                    seq = outgoing.seq,
                    message_type = %message_type,
                    error = %e,
                    "First send failed, will retransmit"
                );
            }
        }

        self.dispatch_events(handler, to, events).await;
        Ok(outgoing.seq)
    }

    async fn on_retransmit_tick<H: Handler>(&mut self, handler: &mut H) {
        let batch = lock(&self.engine).poll_retransmit(Instant::now());

        for resend in batch.resend {
            tracing::debug!(
                peer = %resend.peer,
                seq = resend.seq,
                attempt = resend.attempt,
                "Retransmitting"
            );
            if let Err(e) = self.transport.send_to(&resend.bytes, resend.peer).await {
                tracing::error!(peer = %resend.peer, error = %e, "Failed to retransmit");
            }
        }

        for failure in batch.failed {
            tracing::error!(
                peer = %failure.peer,
                seq = failure.seq,
                message_type = %failure.message_type,
                attempts = failure.attempts,
                "Delivery failed, dropping peer"
            );
            handler.on_delivery_failed(&failure).await;

            if self.session.peer() == Some(failure.peer) {
                let reason = format!("{} was never acknowledged", failure.message_type);
                let events = self.session.force_disconnect(Some(reason));
                self.dispatch_events(handler, failure.peer, events).await;
            } else {
                lock(&self.engine).teardown(failure.peer);
            }
        }
    }

    /// Hand session events to the handler and queue emitted messages
    async fn dispatch_events<H: Handler>(
        &mut self,
        handler: &mut H,
        peer: SocketAddr,
        events: Vec<SessionEvent>,
    ) {
        for event in events {
            if let SessionEvent::Emit(message) = event {
                self.outbox.push_back(message);
                continue;
            }

            handler.on_event(&event, &self.session).await;

            match event {
                SessionEvent::StateChanged { from, to } => {
                    tracing::info!(peer = %peer, from = %from, to = %to, "Session state changed");
                    handler.on_state_change(from, to).await;
                }
                SessionEvent::HandshakeComplete { peer_name } => {
                    handler.on_handshake_complete(peer, peer_name.as_deref()).await;
                }
                SessionEvent::SelectionRecorded { side, pokemon } => {
                    handler.on_selection(side, &pokemon).await;
                }
                SessionEvent::BattleStarted { first_mover } => {
                    if let Some(battle) = self.session.battle() {
                        handler.on_battle_start(first_mover, battle).await;
                    }
                }
                SessionEvent::AttackResolved(outcome) => {
                    handler.on_attack(&outcome).await;
                }
                SessionEvent::Chat { side, line } => {
                    handler.on_chat(side, &line).await;
                }
                SessionEvent::BattleEnded(result) => {
                    tracing::info!(winner = %result.winner, loser = %result.loser, "Battle ended");
                    let won = self
                        .session
                        .battle()
                        .is_some_and(|battle| battle.remote.is_fainted());
                    handler.on_battle_end(&result, won).await;
                }
                SessionEvent::Disconnected { side, reason } => {
                    let dropped = lock(&self.engine).teardown(peer);
                    self.outbox.clear();
                    tracing::info!(peer = %peer, side = %side, dropped, "Session closed");
                    handler.on_disconnect(side, reason.as_deref()).await;
                }
                SessionEvent::Rejected {
                    message_type,
                    error,
                } => {
                    tracing::warn!(peer = %peer, message_type = %message_type, error = %error, "Rejected parked message");
                    handler.on_rejected(peer, message_type, &error).await;
                }
                SessionEvent::Deferred { message_type } => {
                    tracing::debug!(peer = %peer, message_type = %message_type, "Parked early message");
                }
                SessionEvent::DamageMismatch { reported, computed } => {
                    tracing::warn!(reported, computed, "Peer computed different damage");
                }
                SessionEvent::HpMismatch {
                    side,
                    reported,
                    expected,
                } => {
                    tracing::warn!(side = %side, reported, expected, "HP report disagrees");
                }
                SessionEvent::ResultMismatch { reported, expected } => {
                    tracing::warn!(
                        winner = %reported.winner,
                        expected = ?expected,
                        "Battle result disagrees"
                    );
                }
                _ => {}
            }
        }
    }
}

impl Drop for PeerRunner {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.receive_task.take() {
            task.abort();
        }
    }
}

