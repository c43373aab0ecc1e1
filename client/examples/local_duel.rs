//! Local Duel Example
//!
//! Runs a host and a joiner in one process on loopback. Both sides pick
//! random moves until one Pokemon faints, chatting along the way.
//!
//! Set RUST_LOG=pokelink_client=debug to see every datagram.

use std::net::SocketAddr;

use anyhow::Result;
use async_trait::async_trait;
use pokelink_client::{
    AttackOutcome, BattleResult, BattleState, ChatLine, Handler, Peer, PeerConfig, PeerHandle,
    PokemonStats, Role, Session, SessionEvent, Side,
};
use pokelink_protocol::PokemonEntry;
use rand::seq::SliceRandom;

const ROSTER: &str = r#"[
    { "pokemon_name": "Pikachu", "type1": "electric",
      "hp": 35, "attack": 55, "defense": 40, "sp_attack": 50, "sp_defense": 50, "speed": 90 },
    { "pokemon_name": "Bulbasaur", "type1": "grass", "type2": "poison",
      "hp": 45, "attack": 49, "defense": 49, "sp_attack": 65, "sp_defense": 65, "speed": 45 },
    { "pokemon_name": "Squirtle", "type1": "water",
      "hp": 44, "attack": 48, "defense": 65, "sp_attack": 50, "sp_defense": 64, "speed": 43 },
    { "pokemon_name": "Geodude", "type1": "rock", "type2": "ground",
      "hp": 40, "attack": 80, "defense": 100, "sp_attack": 30, "sp_defense": 30, "speed": 20 }
]"#;

struct DuelBot {
    name: &'static str,
    handle: PeerHandle,
    pokemon: PokemonStats,
    last_turn: Option<u32>,
}

#[async_trait]
impl Handler for DuelBot {
    async fn on_handshake_complete(&mut self, peer: SocketAddr, peer_name: Option<&str>) {
        println!(
            "[{}] Connected to {} at {}",
            self.name,
            peer_name.unwrap_or("?"),
            peer
        );
        println!("[{}] I choose you, {}!", self.name, self.pokemon.name);
        self.handle.select(self.pokemon.clone()).ok();
        self.handle.ready().ok();
        self.handle.chat("good luck!").ok();
    }

    async fn on_event(&mut self, _event: &SessionEvent, session: &Session) {
        if !session.is_my_turn() {
            return;
        }
        let Some(turn) = session.battle().map(|b| b.turn_number) else {
            return;
        };
        if self.last_turn == Some(turn) {
            return;
        }
        self.last_turn = Some(turn);

        let moves = session.local_moves();
        if let Some(mv) = moves.choose(&mut rand::thread_rng()) {
            self.handle.attack(mv.clone()).ok();
        }
    }

    async fn on_battle_start(&mut self, first_mover: Side, battle: &BattleState) {
        println!(
            "[{}] {} vs {}, {} moves first",
            self.name,
            battle.local.name(),
            battle.remote.name(),
            battle.pokemon(first_mover).name()
        );
    }

    async fn on_attack(&mut self, outcome: &AttackOutcome) {
        if outcome.attacker == Side::Remote {
            return;
        }
        println!(
            "[{}] Turn {}: {} for {} damage ({}/{} left)",
            self.name,
            outcome.turn_number,
            outcome.mv.name,
            outcome.damage,
            outcome.defender_hp,
            outcome.defender_max_hp
        );
        for note in &outcome.resolution.notes {
            println!("[{}]   {}", self.name, note);
        }
    }

    async fn on_chat(&mut self, side: Side, line: &ChatLine) {
        if side == Side::Remote
            && let Some(text) = &line.text
        {
            println!("[{}] <{}> {}", self.name, line.sender, text);
        }
    }

    async fn on_battle_end(&mut self, result: &BattleResult, won: bool) {
        let verdict = if won { "We won" } else { "We lost" };
        println!("[{}] {}! {} beat {}", self.name, verdict, result.winner, result.loser);
        self.handle.shutdown().ok();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let roster: Vec<PokemonEntry> = serde_json::from_str(ROSTER)?;
    let mut picks = roster.choose_multiple(&mut rand::thread_rng(), 2);
    let (Some(first), Some(second)) = (picks.next(), picks.next()) else {
        anyhow::bail!("roster needs at least two Pokemon");
    };

    let config = PeerConfig::bound_to("127.0.0.1:0".parse()?);
    let (host, mut host_runner) =
        Peer::bind(config.clone(), Session::new(Role::Host, "misty")).await?;
    let (joiner, mut joiner_runner) =
        Peer::bind(config, Session::new(Role::Joiner, "brock")).await?;
    println!("Host on {}, joiner on {}", host.local_addr(), joiner.local_addr());

    let mut host_bot = DuelBot {
        name: "misty",
        handle: host.clone(),
        pokemon: PokemonStats::try_from(first)?,
        last_turn: None,
    };
    let mut joiner_bot = DuelBot {
        name: "brock",
        handle: joiner.clone(),
        pokemon: PokemonStats::try_from(second)?,
        last_turn: None,
    };

    joiner.connect(host.local_addr())?;

    let (host_done, joiner_done) = tokio::join!(
        host_runner.run(&mut host_bot),
        joiner_runner.run(&mut joiner_bot)
    );
    host_done?;
    joiner_done?;

    Ok(())
}
