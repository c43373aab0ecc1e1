//! Turn resolution: how much damage a move deals

use pokelink_protocol::MoveCategory;

use crate::types::{Move, PokemonStats};

/// Level every Pokemon battles at
pub const BATTLE_LEVEL: u32 = 50;

/// Multiplier for a move that matches one of the attacker's types
pub const STAB_MULTIPLIER: f64 = 1.5;

/// Outcome of one attack
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    pub damage: u32,
    pub effectiveness: f32,
    /// Human readable notes ("It's super effective!")
    pub notes: Vec<String>,
}

/// Computes the result of an attack.
///
/// Both peers resolve every attack locally, so implementations must be
/// deterministic: the same inputs always give the same damage.
pub trait TurnResolver: Send + Sync {
    fn resolve(&self, attacker: &PokemonStats, defender: &PokemonStats, mv: &Move) -> Resolution;
}

/// Simplified main-series damage formula without the random roll
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardResolver;

impl StandardResolver {
    pub fn new() -> Self {
        Self
    }
}

impl TurnResolver for StandardResolver {
    fn resolve(&self, attacker: &PokemonStats, defender: &PokemonStats, mv: &Move) -> Resolution {
        let (attack, defense) = match mv.category {
            MoveCategory::Physical => (attacker.attack, defender.defense),
            MoveCategory::Special => (attacker.sp_attack, defender.sp_defense),
        };
        let effectiveness = mv
            .move_type
            .against_pair(defender.primary_type, defender.secondary_type);

        let mut notes = Vec::new();
        if let Some(note) = effectiveness_note(effectiveness) {
            notes.push(note.to_string());
        }

        if effectiveness == 0.0 || mv.power == 0 {
            return Resolution {
                damage: 0,
                effectiveness,
                notes,
            };
        }

        let level_factor = (2 * BATTLE_LEVEL / 5 + 2) as f64;
        let defense = defense.max(1) as f64;
        let base = level_factor * mv.power as f64 * attack as f64 / defense / 50.0 + 2.0;

        let stab = if attacker.has_type(mv.move_type) {
            STAB_MULTIPLIER
        } else {
            1.0
        };

        let damage = (base * stab * effectiveness as f64).floor().max(1.0) as u32;

        Resolution {
            damage,
            effectiveness,
            notes,
        }
    }
}

fn effectiveness_note(effectiveness: f32) -> Option<&'static str> {
    if effectiveness == 0.0 {
        Some("It had no effect...")
    } else if effectiveness > 1.0 {
        Some("It's super effective!")
    } else if effectiveness < 1.0 {
        Some("It's not very effective...")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn mon(name: &str, primary: Type, secondary: Option<Type>) -> PokemonStats {
        PokemonStats {
            name: name.into(),
            primary_type: primary,
            secondary_type: secondary,
            hp: 100,
            attack: 100,
            defense: 100,
            sp_attack: 100,
            sp_defense: 100,
            speed: 100,
        }
    }

    #[test]
    fn test_neutral_damage() {
        let attacker = mon("a", Type::Normal, None);
        let defender = mon("d", Type::Normal, None);
        // 22 * 60 * 100 / 100 / 50 + 2 = 28.4
        let res = StandardResolver.resolve(&attacker, &defender, &Move::strike(Type::Fire));
        assert_eq!(res.damage, 28);
        assert!(res.notes.is_empty());
    }

    #[test]
    fn test_stab_and_super_effective() {
        let attacker = mon("a", Type::Water, None);
        let defender = mon("d", Type::Fire, None);
        let res = StandardResolver.resolve(&attacker, &defender, &Move::blast(Type::Water));
        // 28.4 * 1.5 * 2
        assert_eq!(res.damage, 85);
        assert_eq!(res.effectiveness, 2.0);
        assert_eq!(res.notes, vec!["It's super effective!".to_string()]);
    }

    #[test]
    fn test_immune_deals_nothing() {
        let attacker = mon("a", Type::Electric, None);
        let defender = mon("d", Type::Ground, Some(Type::Rock));
        let res = StandardResolver.resolve(&attacker, &defender, &Move::strike(Type::Electric));
        assert_eq!(res.damage, 0);
        assert_eq!(res.notes, vec!["It had no effect...".to_string()]);
    }

    #[test]
    fn test_minimum_one_damage() {
        let mut attacker = mon("a", Type::Normal, None);
        attacker.attack = 1;
        let mut defender = mon("d", Type::Water, Some(Type::Dragon));
        defender.defense = 500;
        let res = StandardResolver.resolve(&attacker, &defender, &Move::strike(Type::Fire));
        assert_eq!(res.damage, 1);
    }

    #[test]
    fn test_category_selects_stats() {
        let mut attacker = mon("a", Type::Normal, None);
        attacker.attack = 200;
        let defender = mon("d", Type::Normal, None);

        let physical = StandardResolver.resolve(&attacker, &defender, &Move::strike(Type::Ice));
        let special = StandardResolver.resolve(&attacker, &defender, &Move::blast(Type::Ice));
        assert!(physical.damage > special.damage);
    }

    #[test]
    fn test_deterministic() {
        let attacker = mon("a", Type::Fire, None);
        let defender = mon("d", Type::Grass, Some(Type::Steel));
        let mv = Move::blast(Type::Fire);
        let first = StandardResolver.resolve(&attacker, &defender, &mv);
        for _ in 0..10 {
            assert_eq!(StandardResolver.resolve(&attacker, &defender, &mv), first);
        }
    }
}
