// Pick authorization and player availability checks.

use serde::{Deserialize, Serialize};

use super::player::{Player, PlayerId, Role, TeamId};
use super::state::DraftState;
use crate::directory::{IdentityProvider, PlayerDirectory, TeamDirectory};
use crate::error::DraftError;

/// Knobs for pick authorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickPolicy {
    /// Let an `Admin` identity pick for whichever team is on the clock.
    pub allow_admin_override: bool,
}

/// Resolve the team on the clock and confirm `actor` may pick for it.
pub fn authorize<D>(
    actor: &str,
    state: &DraftState,
    dir: &D,
    policy: &PickPolicy,
) -> Result<TeamId, DraftError>
where
    D: TeamDirectory + IdentityProvider,
{
    if !state.started {
        return Err(DraftError::NotStarted);
    }

    let on_clock = state
        .turn_order
        .get(state.current_index)
        .ok_or_else(|| DraftError::NoSuchTeam(TeamId(format!("#{}", state.current_index))))?;
    let team = dir
        .team(on_clock)
        .ok_or_else(|| DraftError::NoSuchTeam(on_clock.clone()))?;

    let identity = dir.resolve(actor);
    let allowed = match &identity {
        Some(id) if id.role == Role::Admin => policy.allow_admin_override,
        Some(id) => id.delegates_team.as_ref() == Some(&team.id),
        None => false,
    };

    if allowed {
        Ok(team.id.clone())
    } else {
        Err(DraftError::OutOfTurn {
            actor: actor.to_string(),
            on_clock: team.id.clone(),
        })
    }
}

/// Confirm `player_id` exists and is still in the available pool.
pub fn check_availability<'a, D>(
    player_id: &PlayerId,
    state: &DraftState,
    dir: &'a D,
) -> Result<&'a Player, DraftError>
where
    D: PlayerDirectory,
{
    let player = dir
        .player(player_id)
        .ok_or_else(|| DraftError::PlayerNotFound(player_id.clone()))?;
    if player.team.is_some() || state.is_picked(player_id) {
        return Err(DraftError::PlayerAlreadyTaken(player_id.clone()));
    }
    Ok(player)
}
