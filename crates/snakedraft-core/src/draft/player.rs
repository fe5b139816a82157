// Player and team representation: identifiers, positions, roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a registered player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

/// Identifier of a team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        TeamId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        PlayerId(s.to_string())
    }
}

impl From<&str> for TeamId {
    fn from(s: &str) -> Self {
        TeamId(s.to_string())
    }
}

/// Line-up positions, numbered by the traditional shirt number of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    RightBack,
    LeftCenterBack,
    RightCenterBack,
    LeftBack,
    DefensiveMidfield,
    RightMidfield,
    CentralMidfield,
    LeftMidfield,
    LeftStriker,
    RightStriker,
}

impl Position {
    pub const ALL: [Position; 11] = [
        Position::Goalkeeper,
        Position::RightBack,
        Position::LeftCenterBack,
        Position::RightCenterBack,
        Position::LeftBack,
        Position::DefensiveMidfield,
        Position::RightMidfield,
        Position::CentralMidfield,
        Position::LeftMidfield,
        Position::LeftStriker,
        Position::RightStriker,
    ];

    /// Parse a position from either its abbreviation or its slot number.
    ///
    /// - "GK" or "1" -> Goalkeeper
    /// - "CB" is ambiguous and maps to LeftCenterBack; "ST" maps to LeftStriker
    pub fn from_str_pos(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return Self::from_number(n);
        }
        match trimmed.to_uppercase().as_str() {
            "GK" => Some(Position::Goalkeeper),
            "RB" => Some(Position::RightBack),
            "LCB" | "CB" => Some(Position::LeftCenterBack),
            "RCB" => Some(Position::RightCenterBack),
            "LB" => Some(Position::LeftBack),
            "CDM" | "DM" => Some(Position::DefensiveMidfield),
            "RM" => Some(Position::RightMidfield),
            "CM" => Some(Position::CentralMidfield),
            "LM" => Some(Position::LeftMidfield),
            "LST" | "ST" => Some(Position::LeftStriker),
            "RST" => Some(Position::RightStriker),
            _ => None,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1..=11 => Some(Self::ALL[usize::from(n - 1)]),
            _ => None,
        }
    }

    /// Slot number, 1 through 11.
    pub fn number(&self) -> u8 {
        match self {
            Position::Goalkeeper => 1,
            Position::RightBack => 2,
            Position::LeftCenterBack => 3,
            Position::RightCenterBack => 4,
            Position::LeftBack => 5,
            Position::DefensiveMidfield => 6,
            Position::RightMidfield => 7,
            Position::CentralMidfield => 8,
            Position::LeftMidfield => 9,
            Position::LeftStriker => 10,
            Position::RightStriker => 11,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::RightBack => "RB",
            Position::LeftCenterBack => "LCB",
            Position::RightCenterBack => "RCB",
            Position::LeftBack => "LB",
            Position::DefensiveMidfield => "CDM",
            Position::RightMidfield => "RM",
            Position::CentralMidfield => "CM",
            Position::LeftMidfield => "LM",
            Position::LeftStriker => "LST",
            Position::RightStriker => "RST",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// What an identity is allowed to do in the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    /// A registered player with no special rights.
    #[default]
    Player,
    /// The one player authorized to pick on behalf of a team.
    Delegate,
    /// Draft administrator (configured, never stored on a player).
    Admin,
}

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub primary_position: Position,
    #[serde(default)]
    pub secondary_position: Option<Position>,
    /// Team the player belongs to. `None` means the player is in the available pool.
    #[serde(default)]
    pub team: Option<TeamId>,
    #[serde(default)]
    pub role: Role,
}

impl Player {
    /// Create an unassigned player with the default `Player` role.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        primary_position: Position,
        secondary_position: Option<Position>,
    ) -> Self {
        Player {
            id: PlayerId::new(id),
            name: name.into(),
            primary_position,
            secondary_position,
            team: None,
            role: Role::Player,
        }
    }

    pub fn is_available(&self) -> bool {
        self.team.is_none()
    }

    pub fn plays(&self, pos: Position) -> bool {
        self.primary_position == pos || self.secondary_position == Some(pos)
    }
}

/// A team and its roster. `roster[0]` is always the delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub delegate: PlayerId,
    /// Player ids in pick order.
    pub roster: Vec<PlayerId>,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>, delegate: PlayerId) -> Self {
        Team {
            id,
            name: name.into(),
            roster: vec![delegate.clone()],
            delegate,
        }
    }

    pub fn has_member(&self, player: &PlayerId) -> bool {
        self.roster.contains(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_parses_abbreviations_and_numbers() {
        assert_eq!(Position::from_str_pos("gk"), Some(Position::Goalkeeper));
        assert_eq!(Position::from_str_pos("CDM"), Some(Position::DefensiveMidfield));
        assert_eq!(Position::from_str_pos(" 8 "), Some(Position::CentralMidfield));
        assert_eq!(Position::from_str_pos("11"), Some(Position::RightStriker));
        assert_eq!(Position::from_str_pos("0"), None);
        assert_eq!(Position::from_str_pos("12"), None);
        assert_eq!(Position::from_str_pos("QB"), None);
    }

    #[test]
    fn position_numbers_match_slot_order() {
        for (i, pos) in Position::ALL.iter().enumerate() {
            assert_eq!(usize::from(pos.number()), i + 1);
            assert_eq!(Position::from_number(pos.number()), Some(*pos));
        }
    }

    #[test]
    fn new_team_rosters_its_delegate_first() {
        let team = Team::new(TeamId::from("team_1"), "Galacticos", PlayerId::from("p1"));
        assert_eq!(team.roster, vec![PlayerId::from("p1")]);
        assert!(team.has_member(&PlayerId::from("p1")));
    }

    #[test]
    fn player_plays_primary_or_secondary() {
        let p = Player::new(
            "p1",
            "Ana Diaz",
            Position::RightBack,
            Some(Position::RightMidfield),
        );
        assert!(p.plays(Position::RightBack));
        assert!(p.plays(Position::RightMidfield));
        assert!(!p.plays(Position::Goalkeeper));
        assert!(p.is_available());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&TeamId::from("team_3")).unwrap();
        assert_eq!(json, "\"team_3\"");
    }
}
