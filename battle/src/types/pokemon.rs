//! Pokemon stats and in-battle state

use std::collections::BTreeMap;

use pokelink_protocol::{FieldError, PokemonEntry};

use super::moves::MAX_USES;
use super::pokemon_type::Type;

/// Base stats of a selected Pokemon (fixed for the whole battle)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PokemonStats {
    pub name: String,
    pub primary_type: Type,
    pub secondary_type: Option<Type>,
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub sp_attack: u32,
    pub sp_defense: u32,
    pub speed: u32,
}

impl PokemonStats {
    /// Whether either of this Pokemon's types is `t`
    pub fn has_type(&self, t: Type) -> bool {
        self.primary_type == t || self.secondary_type == Some(t)
    }
}

impl TryFrom<&PokemonEntry> for PokemonStats {
    type Error = FieldError;

    fn try_from(entry: &PokemonEntry) -> Result<Self, Self::Error> {
        let parse_type = |field: &str, value: &str| {
            Type::parse(value).ok_or_else(|| FieldError::Invalid {
                field: field.to_string(),
                value: value.to_string(),
            })
        };

        if entry.hp == 0 {
            return Err(FieldError::Invalid {
                field: "hp".into(),
                value: "0".into(),
            });
        }

        Ok(Self {
            name: entry.pokemon_name.clone(),
            primary_type: parse_type("type1", &entry.type1)?,
            secondary_type: entry
                .type2
                .as_deref()
                .map(|t| parse_type("type2", t))
                .transpose()?,
            hp: entry.hp,
            attack: entry.attack,
            defense: entry.defense,
            sp_attack: entry.sp_attack,
            sp_defense: entry.sp_defense,
            speed: entry.speed,
        })
    }
}

impl From<&PokemonStats> for PokemonEntry {
    fn from(stats: &PokemonStats) -> Self {
        Self {
            pokemon_name: stats.name.clone(),
            type1: stats.primary_type.to_string(),
            type2: stats.secondary_type.map(|t| t.to_string()),
            hp: stats.hp,
            attack: stats.attack,
            defense: stats.defense,
            sp_attack: stats.sp_attack,
            sp_defense: stats.sp_defense,
            speed: stats.speed,
        }
    }
}

/// A Pokemon during battle
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PokemonState {
    pub stats: PokemonStats,

    /// Current HP, never above `stats.hp`
    pub hp_current: u32,

    /// Times each move (by name) has been used this battle
    pub moves_used: BTreeMap<String, u32>,
}

impl PokemonState {
    /// Start a battle at full HP
    pub fn new(stats: PokemonStats) -> Self {
        Self {
            hp_current: stats.hp,
            stats,
            moves_used: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.stats.name
    }

    pub fn hp_max(&self) -> u32 {
        self.stats.hp
    }

    /// Apply damage, clamping at 0. Returns the HP actually lost.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.hp_current);
        self.hp_current -= dealt;
        dealt
    }

    /// Restore HP up to the maximum. Returns the HP actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.stats.hp - self.hp_current);
        self.hp_current += restored;
        restored
    }

    pub fn uses_left(&self, move_name: &str) -> u32 {
        let used = self.moves_used.get(move_name).copied().unwrap_or(0);
        MAX_USES.saturating_sub(used)
    }

    /// Spend one use of a move. Returns false, changing nothing, once it is
    /// used up.
    pub fn use_move(&mut self, move_name: &str) -> bool {
        if self.uses_left(move_name) == 0 {
            return false;
        }
        *self.moves_used.entry(move_name.to_string()).or_insert(0) += 1;
        true
    }

    pub fn is_fainted(&self) -> bool {
        self.hp_current == 0
    }

    /// HP as a percentage of max (0-100)
    pub fn hp_percent(&self) -> u8 {
        if self.stats.hp == 0 {
            return 0;
        }
        ((self.hp_current as u64 * 100) / self.stats.hp as u64) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> PokemonEntry {
        PokemonEntry {
            pokemon_name: "Charizard".into(),
            type1: "Fire".into(),
            type2: Some("flying".into()),
            hp: 78,
            attack: 84,
            defense: 78,
            sp_attack: 109,
            sp_defense: 85,
            speed: 100,
        }
    }

    #[test]
    fn test_stats_from_entry() {
        let stats = PokemonStats::try_from(&entry()).unwrap();
        assert_eq!(stats.primary_type, Type::Fire);
        assert_eq!(stats.secondary_type, Some(Type::Flying));
        assert!(stats.has_type(Type::Flying));
        assert!(!stats.has_type(Type::Water));

        let back = PokemonEntry::from(&stats);
        assert_eq!(back.type1, "fire");
        assert_eq!(back.sp_attack, 109);
    }

    #[test]
    fn test_stats_rejects_unknown_type() {
        let mut bad = entry();
        bad.type2 = Some("cosmic".into());
        assert_eq!(
            PokemonStats::try_from(&bad),
            Err(FieldError::Invalid {
                field: "type2".into(),
                value: "cosmic".into()
            })
        );
    }

    #[test]
    fn test_stats_rejects_zero_hp() {
        let mut bad = entry();
        bad.hp = 0;
        assert!(PokemonStats::try_from(&bad).is_err());
    }

    #[test]
    fn test_take_damage_clamps_at_zero() {
        let mut mon = PokemonState::new(PokemonStats::try_from(&entry()).unwrap());

        assert_eq!(mon.take_damage(77), 77);
        assert_eq!(mon.hp_current, 1);
        assert!(!mon.is_fainted());

        assert_eq!(mon.take_damage(50), 1);
        assert_eq!(mon.hp_current, 0);
        assert!(mon.is_fainted());
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut mon = PokemonState::new(PokemonStats::try_from(&entry()).unwrap());
        mon.take_damage(30);
        assert_eq!(mon.heal(100), 30);
        assert_eq!(mon.hp_current, 78);
    }

    #[test]
    fn test_hp_percent() {
        let mut mon = PokemonState::new(PokemonStats::try_from(&entry()).unwrap());
        assert_eq!(mon.hp_percent(), 100);
        mon.take_damage(39);
        assert_eq!(mon.hp_percent(), 50);
    }

    #[test]
    fn test_move_uses_run_out() {
        let mut mon = PokemonState::new(PokemonStats::try_from(&entry()).unwrap());
        for _ in 0..MAX_USES {
            assert!(mon.use_move("Fire Blast"));
        }
        assert_eq!(mon.uses_left("Fire Blast"), 0);
        assert!(!mon.use_move("Fire Blast"));
        assert_eq!(mon.moves_used["Fire Blast"], MAX_USES);

        // other moves keep their own count
        assert_eq!(mon.uses_left("Fire Strike"), MAX_USES);
    }
}
