// Error taxonomy for the draft engine.

use thiserror::Error;

use crate::draft::player::{PlayerId, TeamId};

// ---------------------------------------------------------------------------
// Request-level errors
// ---------------------------------------------------------------------------

/// A request the engine refused. The draft state is unchanged whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("the draft has not started")]
    NotStarted,

    #[error("`{actor}` may not pick now: team {on_clock} is on the clock")]
    OutOfTurn { actor: String, on_clock: TeamId },

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("player {0} has already been taken")]
    PlayerAlreadyTaken(PlayerId),

    #[error("team {0} not found")]
    NoSuchTeam(TeamId),

    #[error("invalid turn order: {0}")]
    InvalidOrder(String),

    #[error("player {0} cannot become a delegate")]
    DelegateUnavailable(PlayerId),

    #[error("team name must not be empty")]
    EmptyTeamName,

    #[error("teams are frozen once the draft has started")]
    TeamsFrozen,

    #[error("the draft moved on before this request was applied")]
    ConcurrentConflict,
}

impl DraftError {
    /// Stable machine-readable code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            DraftError::NotStarted => "NOT_STARTED",
            DraftError::OutOfTurn { .. } => "OUT_OF_TURN",
            DraftError::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            DraftError::PlayerAlreadyTaken(_) => "PLAYER_ALREADY_TAKEN",
            DraftError::NoSuchTeam(_) => "NO_SUCH_TEAM",
            DraftError::InvalidOrder(_) => "INVALID_ORDER",
            DraftError::DelegateUnavailable(_) => "DELEGATE_UNAVAILABLE",
            DraftError::EmptyTeamName => "EMPTY_TEAM_NAME",
            DraftError::TeamsFrozen => "TEAMS_FROZEN",
            DraftError::ConcurrentConflict => "CONCURRENT_CONFLICT",
        }
    }
}

// ---------------------------------------------------------------------------
// Internal corruption
// ---------------------------------------------------------------------------

/// The engine found its own state inconsistent. This is a bug, not a bad
/// request, and is never produced by validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("player {0} appears more than once in the pick history")]
    DuplicatePick(PlayerId),

    #[error("picked player {player} is not on the roster of team {team:?}")]
    RosterMismatch {
        player: PlayerId,
        team: Option<TeamId>,
    },

    #[error("player {0} is rostered but was never picked or made a delegate")]
    UnrecordedRosterMember(PlayerId),

    #[error("team {0} does not have its delegate at the head of its roster")]
    DelegateNotFirst(TeamId),

    #[error("turn order does not list every team exactly once")]
    TurnOrderMismatch,

    #[error("turn index {index} is out of range for {teams} teams")]
    TurnIndexOutOfRange { index: usize, teams: usize },

    #[error("directory has no player {0}")]
    MissingPlayer(PlayerId),

    #[error("directory has no team {0}")]
    MissingTeam(TeamId),

    #[error("draft engine lock poisoned by a panicked writer")]
    Poisoned,
}

// ---------------------------------------------------------------------------
// Engine result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] DraftError),

    #[error("draft state corrupted: {0}")]
    Corrupted(#[from] InvariantViolation),
}

impl EngineError {
    /// The user-facing rejection, if this is one.
    pub fn rejection(&self) -> Option<&DraftError> {
        match self {
            EngineError::Rejected(e) => Some(e),
            EngineError::Corrupted(_) => None,
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, EngineError::Corrupted(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Rejected(e) => e.code(),
            EngineError::Corrupted(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            DraftError::NotStarted,
            DraftError::OutOfTurn {
                actor: "p2".into(),
                on_clock: TeamId::from("team_1"),
            },
            DraftError::PlayerNotFound(PlayerId::from("x")),
            DraftError::PlayerAlreadyTaken(PlayerId::from("x")),
            DraftError::NoSuchTeam(TeamId::from("t")),
            DraftError::InvalidOrder("dup".into()),
            DraftError::DelegateUnavailable(PlayerId::from("x")),
            DraftError::EmptyTeamName,
            DraftError::TeamsFrozen,
            DraftError::ConcurrentConflict,
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn engine_error_separates_rejection_from_corruption() {
        let rejected: EngineError = DraftError::NotStarted.into();
        assert_eq!(rejected.rejection(), Some(&DraftError::NotStarted));
        assert!(!rejected.is_corruption());

        let corrupted: EngineError = InvariantViolation::Poisoned.into();
        assert!(corrupted.rejection().is_none());
        assert!(corrupted.is_corruption());
    }

    #[test]
    fn out_of_turn_message_names_team_on_clock() {
        let err = DraftError::OutOfTurn {
            actor: "p7".into(),
            on_clock: TeamId::from("team_1"),
        };
        assert_eq!(
            err.to_string(),
            "`p7` may not pick now: team team_1 is on the clock"
        );
    }
}
