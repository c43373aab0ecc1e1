//! Moves and their ATTACK message form

use pokelink_protocol::{AttackPayload, FieldError, MoveCategory};

use super::pokemon_type::Type;

/// Base power of generated moves
pub const DEFAULT_POWER: u32 = 60;

/// Times each move can be used in one battle
pub const MAX_USES: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Move {
    pub name: String,
    pub move_type: Type,
    pub power: u32,
    pub category: MoveCategory,
}

impl Move {
    pub fn new(name: impl Into<String>, move_type: Type, power: u32, category: MoveCategory) -> Self {
        Self {
            name: name.into(),
            move_type,
            power,
            category,
        }
    }

    /// Physical move of the given type, e.g. "Fire Strike"
    pub fn strike(move_type: Type) -> Self {
        Self::new(
            format!("{} Strike", capitalized(move_type)),
            move_type,
            DEFAULT_POWER,
            MoveCategory::Physical,
        )
    }

    /// Special move of the given type, e.g. "Fire Blast"
    pub fn blast(move_type: Type) -> Self {
        Self::new(
            format!("{} Blast", capitalized(move_type)),
            move_type,
            DEFAULT_POWER,
            MoveCategory::Special,
        )
    }

    /// One strike and one blast for each of the Pokemon's types
    pub fn moveset_for(primary: Type, secondary: Option<Type>) -> Vec<Move> {
        let mut moves = vec![Move::strike(primary), Move::blast(primary)];
        if let Some(secondary) = secondary.filter(|t| *t != primary) {
            moves.push(Move::strike(secondary));
            moves.push(Move::blast(secondary));
        }
        moves
    }

    /// ATTACK payload for this move; damage and turn are filled in by the session
    pub fn to_payload(&self, attacker: impl Into<String>) -> AttackPayload {
        AttackPayload {
            attacker: attacker.into(),
            move_name: self.name.clone(),
            move_type: self.move_type.to_string(),
            power: self.power,
            category: self.category,
            damage: None,
            turn_number: None,
        }
    }
}

impl TryFrom<&AttackPayload> for Move {
    type Error = FieldError;

    fn try_from(attack: &AttackPayload) -> Result<Self, Self::Error> {
        let move_type = Type::parse(&attack.move_type).ok_or_else(|| FieldError::Invalid {
            field: "move_type".into(),
            value: attack.move_type.clone(),
        })?;
        Ok(Self::new(
            attack.move_name.clone(),
            move_type,
            attack.power,
            attack.category,
        ))
    }
}

fn capitalized(t: Type) -> String {
    let name = t.wire_name();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_moves() {
        let strike = Move::strike(Type::Electric);
        assert_eq!(strike.name, "Electric Strike");
        assert_eq!(strike.category, MoveCategory::Physical);
        assert_eq!(strike.power, DEFAULT_POWER);

        let blast = Move::blast(Type::Water);
        assert_eq!(blast.name, "Water Blast");
        assert_eq!(blast.category, MoveCategory::Special);
    }

    #[test]
    fn test_moveset_for_dual_type() {
        let names: Vec<_> = Move::moveset_for(Type::Grass, Some(Type::Poison))
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(
            names,
            vec!["Grass Strike", "Grass Blast", "Poison Strike", "Poison Blast"]
        );
        assert_eq!(Move::moveset_for(Type::Fire, None).len(), 2);
    }

    #[test]
    fn test_payload_conversion() {
        let payload = Move::blast(Type::Fire).to_payload("red");
        assert_eq!(payload.move_type, "fire");
        assert_eq!(payload.damage, None);
        assert_eq!(Move::try_from(&payload), Ok(Move::blast(Type::Fire)));
    }

    #[test]
    fn test_payload_unknown_type() {
        let mut payload = Move::strike(Type::Ice).to_payload("red");
        payload.move_type = "shadow".into();
        assert!(Move::try_from(&payload).is_err());
    }
}
