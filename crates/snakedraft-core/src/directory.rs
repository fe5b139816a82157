// Player and team directories consumed by the engine, plus the in-memory
// league that implements them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::draft::player::{Player, PlayerId, Position, Role, Team, TeamId};
use crate::error::InvariantViolation;

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

pub trait PlayerDirectory {
    fn player(&self, id: &PlayerId) -> Option<&Player>;

    /// All players in registration order.
    fn players(&self) -> Vec<&Player>;

    fn set_team(&mut self, id: &PlayerId, team: Option<TeamId>)
        -> Result<(), InvariantViolation>;

    fn set_role(&mut self, id: &PlayerId, role: Role) -> Result<(), InvariantViolation>;
}

pub trait TeamDirectory {
    fn team(&self, id: &TeamId) -> Option<&Team>;

    /// All teams in creation order.
    fn teams(&self) -> Vec<&Team>;

    fn append_roster_member(
        &mut self,
        team: &TeamId,
        player: PlayerId,
    ) -> Result<(), InvariantViolation>;

    fn insert_team(&mut self, team: Team);

    fn remove_team(&mut self, id: &TeamId) -> Option<Team>;

    /// Allocate an id no team in this directory has ever used.
    fn allocate_team_id(&mut self) -> TeamId;
}

/// Who is acting, as far as pick authorization is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub delegates_team: Option<TeamId>,
}

pub trait IdentityProvider {
    /// Resolve an acting identity. `None` means the actor is unknown.
    fn resolve(&self, actor: &str) -> Option<Identity>;
}

/// Everything the engine needs from its surroundings.
pub trait Directory: PlayerDirectory + TeamDirectory + IdentityProvider {}

impl<T: PlayerDirectory + TeamDirectory + IdentityProvider> Directory for T {}

// ---------------------------------------------------------------------------
// In-memory league
// ---------------------------------------------------------------------------

/// Filter for the available-player listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolFilter {
    pub position: Option<Position>,
    /// Case-insensitive substring of the player's name.
    pub search: Option<String>,
}

/// In-memory player and team registry for a single draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LeagueRecord")]
pub struct League {
    players: Vec<Player>,
    teams: Vec<Team>,
    /// User ids with administrative rights.
    admins: Vec<String>,
    /// Sequence number of the last allocated team id.
    team_seq: u32,
    /// Position of each player in `players`, rebuilt on load.
    #[serde(skip)]
    index: HashMap<PlayerId, usize>,
}

/// Stored form of a [`League`].
#[derive(Deserialize)]
struct LeagueRecord {
    players: Vec<Player>,
    teams: Vec<Team>,
    #[serde(default)]
    admins: Vec<String>,
    #[serde(default)]
    team_seq: u32,
}

impl From<LeagueRecord> for League {
    fn from(record: LeagueRecord) -> Self {
        let index = record
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        League {
            players: record.players,
            teams: record.teams,
            admins: record.admins,
            team_seq: record.team_seq,
            index,
        }
    }
}

impl League {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admins(admins: impl IntoIterator<Item = String>) -> Self {
        League {
            admins: admins.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Register a player. Returns `false` (and changes nothing) if the id is taken.
    pub fn register_player(&mut self, player: Player) -> bool {
        if self.index.contains_key(&player.id) {
            return false;
        }
        self.index.insert(player.id.clone(), self.players.len());
        self.players.push(player);
        true
    }

    /// Replace the admin list, e.g. after the config changed between runs.
    pub fn set_admins(&mut self, admins: impl IntoIterator<Item = String>) {
        self.admins = admins.into_iter().collect();
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }

    /// Players with no team, filtered and ordered by name.
    pub fn available_players(&self, filter: &PoolFilter) -> Vec<&Player> {
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut out: Vec<&Player> = self
            .players
            .iter()
            .filter(|p| p.is_available())
            .filter(|p| filter.position.map_or(true, |pos| p.plays(pos)))
            .filter(|p| {
                needle
                    .as_deref()
                    .map_or(true, |n| p.name.to_lowercase().contains(n))
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Players eligible to be made a team delegate.
    pub fn delegate_candidates(&self) -> Vec<&Player> {
        self.players
            .iter()
            .filter(|p| p.is_available() && !self.teams.iter().any(|t| t.delegate == p.id))
            .collect()
    }

    pub fn team_of_delegate(&self, player: &PlayerId) -> Option<&Team> {
        self.teams.iter().find(|t| &t.delegate == player)
    }

    fn player_mut(&mut self, id: &PlayerId) -> Result<&mut Player, InvariantViolation> {
        self.index
            .get(id)
            .and_then(|&i| self.players.get_mut(i))
            .ok_or_else(|| InvariantViolation::MissingPlayer(id.clone()))
    }
}

impl PlayerDirectory for League {
    fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.index.get(id).and_then(|&i| self.players.get(i))
    }

    fn players(&self) -> Vec<&Player> {
        self.players.iter().collect()
    }

    fn set_team(
        &mut self,
        id: &PlayerId,
        team: Option<TeamId>,
    ) -> Result<(), InvariantViolation> {
        self.player_mut(id)?.team = team;
        Ok(())
    }

    fn set_role(&mut self, id: &PlayerId, role: Role) -> Result<(), InvariantViolation> {
        self.player_mut(id)?.role = role;
        Ok(())
    }
}

impl TeamDirectory for League {
    fn team(&self, id: &TeamId) -> Option<&Team> {
        self.teams.iter().find(|t| &t.id == id)
    }

    fn teams(&self) -> Vec<&Team> {
        self.teams.iter().collect()
    }

    fn append_roster_member(
        &mut self,
        team: &TeamId,
        player: PlayerId,
    ) -> Result<(), InvariantViolation> {
        let t = self
            .teams
            .iter_mut()
            .find(|t| &t.id == team)
            .ok_or_else(|| InvariantViolation::MissingTeam(team.clone()))?;
        t.roster.push(player);
        Ok(())
    }

    fn insert_team(&mut self, team: Team) {
        self.teams.push(team);
    }

    fn remove_team(&mut self, id: &TeamId) -> Option<Team> {
        let idx = self.teams.iter().position(|t| &t.id == id)?;
        Some(self.teams.remove(idx))
    }

    fn allocate_team_id(&mut self) -> TeamId {
        self.team_seq += 1;
        TeamId(format!("team_{}", self.team_seq))
    }
}

impl IdentityProvider for League {
    fn resolve(&self, actor: &str) -> Option<Identity> {
        if self.is_admin(actor) {
            return Some(Identity {
                user_id: actor.to_string(),
                role: Role::Admin,
                delegates_team: None,
            });
        }
        let player = self.player(&PlayerId::from(actor))?;
        Some(Identity {
            user_id: actor.to_string(),
            role: player.role,
            delegates_team: self.team_of_delegate(&player.id).map(|t| t.id.clone()),
        })
    }
}
