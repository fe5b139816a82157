// JSON messages exchanged with draft clients over the WebSocket.

use serde::{Deserialize, Serialize};

use snakedraft_core::{
    DraftState, DraftStatus, EngineError, Player, PlayerId, Position, Team, TeamId,
};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Commands a client can send. `actor` is the user id the command is issued
/// as; administrative commands require that id to resolve to an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    GetState,
    StartDraft {
        actor: String,
        order: Vec<TeamId>,
    },
    SubmitPick {
        actor: String,
        player_id: PlayerId,
        /// Pick number the client believes is next.
        #[serde(default)]
        expected_pick: Option<usize>,
    },
    UpcomingTurns {
        #[serde(default)]
        count: Option<usize>,
    },
    AvailablePlayers {
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        search: Option<String>,
    },
    /// Players who could be made a team delegate.
    DelegateCandidates,
    AddTeam {
        actor: String,
        name: String,
        delegate: PlayerId,
    },
    RemoveTeam {
        actor: String,
        team_id: TeamId,
    },
    ResetDraft {
        actor: String,
        #[serde(default)]
        confirm: bool,
    },
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Full picture of the draft.
    State {
        state: DraftState,
        status: DraftStatus,
        teams: Vec<Team>,
        upcoming: Vec<TeamId>,
    },
    PickCommitted {
        pick_number: usize,
        team_id: TeamId,
        player_id: PlayerId,
        state: DraftState,
        upcoming: Vec<TeamId>,
    },
    UpcomingTurns {
        teams: Vec<TeamId>,
    },
    Players {
        players: Vec<Player>,
    },
    DelegateCandidates {
        players: Vec<Player>,
    },
    TeamAdded {
        team: Team,
    },
    TeamRemoved {
        team_id: TeamId,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"ERROR","code":"INTERNAL","message":"{e}"}}"#)
        })
    }
}

impl From<&EngineError> for ServerMessage {
    fn from(e: &EngineError) -> Self {
        if e.is_corruption() {
            // Internal details stay in the log.
            return ServerMessage::error(e.code(), "internal error");
        }
        ServerMessage::error(e.code(), e.to_string())
    }
}
