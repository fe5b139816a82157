// Team/player assignment: team creation and removal, draft start and reset,
// and the roster half of a committed pick.

use std::collections::HashSet;

use tracing::info;

use super::player::{PlayerId, Role, Team, TeamId};
use super::state::DraftState;
use super::turn::TurnPointer;
use crate::directory::{PlayerDirectory, TeamDirectory};
use crate::error::{DraftError, EngineError, InvariantViolation};

/// Minimum number of teams for a draft to start.
pub const MIN_TEAMS: usize = 2;

/// Fix the turn order and start the draft.
///
/// `order` must list every existing team exactly once, and there must be at
/// least [`MIN_TEAMS`] of them.
pub fn start_draft<D>(state: &mut DraftState, dir: &D, order: &[TeamId]) -> Result<(), DraftError>
where
    D: TeamDirectory,
{
    if state.started {
        return Err(DraftError::TeamsFrozen);
    }

    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !seen.insert(id) {
            return Err(DraftError::InvalidOrder(format!("team {id} is listed twice")));
        }
        if dir.team(id).is_none() {
            return Err(DraftError::InvalidOrder(format!("team {id} does not exist")));
        }
    }
    if seen.len() < MIN_TEAMS {
        return Err(DraftError::InvalidOrder(format!(
            "at least {MIN_TEAMS} teams are required, got {}",
            seen.len()
        )));
    }
    if let Some(missing) = dir.teams().iter().find(|t| !seen.contains(&t.id)) {
        return Err(DraftError::InvalidOrder(format!(
            "team {} is missing from the order",
            missing.id
        )));
    }

    state.turn_order = order.to_vec();
    state.set_pointer(TurnPointer::START);
    state.started = true;
    info!("Draft started with {} teams", order.len());
    Ok(())
}

/// Create a team whose delegate is `delegate`, promoting that player.
///
/// Validation happens before any mutation; a directory failure after that
/// point is reported as corruption, not as a rejection.
pub fn add_team<D>(
    state: &DraftState,
    dir: &mut D,
    name: &str,
    delegate: &PlayerId,
) -> Result<TeamId, EngineError>
where
    D: PlayerDirectory + TeamDirectory,
{
    if state.started {
        return Err(DraftError::TeamsFrozen.into());
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(DraftError::EmptyTeamName.into());
    }
    let Some(player) = dir.player(delegate) else {
        return Err(DraftError::PlayerNotFound(delegate.clone()).into());
    };
    let already_delegating = dir.teams().iter().any(|t| &t.delegate == delegate);
    if player.team.is_some() || already_delegating {
        return Err(DraftError::DelegateUnavailable(delegate.clone()).into());
    }

    let team_id = dir.allocate_team_id();
    dir.set_team(delegate, Some(team_id.clone()))?;
    dir.set_role(delegate, Role::Delegate)?;
    dir.insert_team(Team::new(team_id.clone(), name, delegate.clone()));
    info!("Team {} ('{}') created with delegate {}", team_id, name, delegate);
    Ok(team_id)
}

/// Remove a team before the draft starts, returning its players (delegate
/// included) to the available pool and demoting the delegate.
pub fn remove_team<D>(
    state: &DraftState,
    dir: &mut D,
    team_id: &TeamId,
) -> Result<Team, EngineError>
where
    D: PlayerDirectory + TeamDirectory,
{
    if state.started {
        return Err(DraftError::TeamsFrozen.into());
    }
    let Some(team) = dir.remove_team(team_id) else {
        return Err(DraftError::NoSuchTeam(team_id.clone()).into());
    };
    release(dir, &team)?;
    info!(
        "Team {} removed, {} players returned to the pool",
        team.id,
        team.roster.len()
    );
    Ok(team)
}

/// Return the draft to its pre-start state: every team is dissolved, every
/// player is back in the pool with the plain `Player` role, and the turn
/// order and history are cleared. Idempotent.
pub fn reset_draft<D>(state: &mut DraftState, dir: &mut D) -> Result<(), InvariantViolation>
where
    D: PlayerDirectory + TeamDirectory,
{
    let team_ids: Vec<TeamId> = dir.teams().iter().map(|t| t.id.clone()).collect();
    for id in &team_ids {
        if let Some(team) = dir.remove_team(id) {
            release(dir, &team)?;
        }
    }

    // Players may carry stale references if the directory was edited
    // outside the engine; clear those too.
    let stragglers: Vec<PlayerId> = dir
        .players()
        .iter()
        .filter(|p| p.team.is_some() || p.role != Role::Player)
        .map(|p| p.id.clone())
        .collect();
    for id in &stragglers {
        dir.set_team(id, None)?;
        dir.set_role(id, Role::Player)?;
    }

    *state = DraftState::new();
    info!("Draft reset: {} teams dissolved", team_ids.len());
    Ok(())
}

/// Put `player` on `team`'s roster and point the player at the team.
pub fn assign_pick<D>(
    dir: &mut D,
    team: &TeamId,
    player: &PlayerId,
) -> Result<(), InvariantViolation>
where
    D: PlayerDirectory + TeamDirectory,
{
    dir.append_roster_member(team, player.clone())?;
    dir.set_team(player, Some(team.clone()))
}

fn release<D>(dir: &mut D, team: &Team) -> Result<(), InvariantViolation>
where
    D: PlayerDirectory,
{
    for member in &team.roster {
        dir.set_team(member, None)?;
    }
    dir.set_role(&team.delegate, Role::Player)
}
