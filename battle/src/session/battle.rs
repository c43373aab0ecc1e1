use crate::types::{PokemonState, PokemonStats};

use super::state::{Role, Side};

/// Both Pokemon and the turn bookkeeping of a running battle
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleState {
    pub local: PokemonState,
    pub remote: PokemonState,

    /// Side whose attack is expected next
    pub turn: Side,

    /// Number of the attack expected next, starting at 1
    pub turn_number: u32,

    pub first_mover: Side,
}

impl BattleState {
    pub fn new(local: PokemonStats, remote: PokemonStats, role: Role) -> Self {
        let first_mover = first_mover(&local, &remote, role);
        Self {
            local: PokemonState::new(local),
            remote: PokemonState::new(remote),
            turn: first_mover,
            turn_number: 1,
            first_mover,
        }
    }

    pub fn pokemon(&self, side: Side) -> &PokemonState {
        match side {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }

    pub fn pokemon_mut(&mut self, side: Side) -> &mut PokemonState {
        match side {
            Side::Local => &mut self.local,
            Side::Remote => &mut self.remote,
        }
    }

    pub fn is_turn(&self, side: Side) -> bool {
        self.turn == side
    }

    /// Whether any attack has been resolved yet
    pub fn has_started(&self) -> bool {
        self.turn_number > 1
    }

    /// Replace the first mover before the first attack
    pub fn set_first_mover(&mut self, side: Side) {
        if !self.has_started() {
            self.first_mover = side;
            self.turn = side;
        }
    }

    pub fn advance_turn(&mut self) {
        self.turn = self.turn.opposite();
        self.turn_number += 1;
    }

    /// Side whose Pokemon fainted, if any
    pub fn fainted_side(&self) -> Option<Side> {
        if self.local.is_fainted() {
            Some(Side::Local)
        } else if self.remote.is_fainted() {
            Some(Side::Remote)
        } else {
            None
        }
    }
}

/// Faster Pokemon moves first; an exact tie goes to the host.
pub fn first_mover(local: &PokemonStats, remote: &PokemonStats, role: Role) -> Side {
    match local.speed.cmp(&remote.speed) {
        std::cmp::Ordering::Greater => Side::Local,
        std::cmp::Ordering::Less => Side::Remote,
        std::cmp::Ordering::Equal => match role {
            Role::Host => Side::Local,
            Role::Joiner => Side::Remote,
        },
    }
}
