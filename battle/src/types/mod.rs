//! Domain types for battles between two peers

mod moves;
mod pokemon;
mod pokemon_type;

pub use moves::{DEFAULT_POWER, MAX_USES, Move};
pub use pokemon::{PokemonState, PokemonStats};
pub use pokemon_type::{TYPE_CHART, Type};
