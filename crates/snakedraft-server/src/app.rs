// Application layer: routes client commands to the draft engine, fans results
// out to connected clients, and queues persistence.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use snakedraft_core::config::Config;
use snakedraft_core::db::Database;
use snakedraft_core::directory::{IdentityProvider, TeamDirectory};
use snakedraft_core::draft::lookahead;
use snakedraft_core::persist::PersistenceSink;
use snakedraft_core::{
    DraftEngine, DraftState, EngineError, InvariantViolation, League, PickRequest, Player,
    PlayerId, PoolFilter, Role, TeamId,
};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::ws_server::{ConnectionId, WsEvent};

/// Upper bound on a requested lookahead.
const MAX_UPCOMING: usize = 256;

// ---------------------------------------------------------------------------
// Persistence jobs
// ---------------------------------------------------------------------------

/// Work for the persistence task, queued after a mutation has committed in
/// memory. Each job carries a consistent copy of league and state.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistJob {
    Snapshot {
        league: League,
        state: DraftState,
    },
    Pick {
        pick_number: usize,
        team_id: TeamId,
        player_id: PlayerId,
        league: League,
        state: DraftState,
    },
    /// The draft was reset; later picks belong to a new draft id.
    Reset {
        league: League,
        state: DraftState,
    },
}

/// Owns the database on the persistence task.
pub struct Persister {
    db: Database,
    draft_id: String,
}

impl Persister {
    /// Resume the stored draft id, or start a new one.
    pub fn new(db: Database) -> anyhow::Result<Self> {
        let draft_id = match db.get_draft_id()? {
            Some(id) => id,
            None => {
                let id = Database::generate_draft_id();
                db.set_draft_id(&id)?;
                id
            }
        };
        info!("Persisting under draft_id={}", draft_id);
        Ok(Self { db, draft_id })
    }

    pub fn draft_id(&self) -> &str {
        &self.draft_id
    }

    pub fn apply(&mut self, job: PersistJob) -> anyhow::Result<()> {
        match job {
            PersistJob::Snapshot { league, state } => self.db.save_snapshot(&league, &state),
            PersistJob::Pick {
                pick_number,
                team_id,
                player_id,
                league,
                state,
            } => {
                self.db
                    .record_pick(pick_number, &team_id, &player_id, &self.draft_id)?;
                self.db.save_snapshot(&league, &state)
            }
            PersistJob::Reset { league, state } => {
                let id = Database::generate_draft_id();
                self.db.set_draft_id(&id)?;
                info!("Draft reset, new draft_id={}", id);
                self.draft_id = id;
                self.db.save_snapshot(&league, &state)
            }
        }
    }
}

/// Drain persistence jobs until every sender is dropped.
pub async fn run_persistence(mut persister: Persister, mut rx: mpsc::Receiver<PersistJob>) {
    while let Some(job) = rx.recv().await {
        if let Err(e) = persister.apply(job) {
            error!("Failed to persist draft state: {:#}", e);
        }
    }
    info!("Persistence task exiting");
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub engine: DraftEngine,
    /// Default number of upcoming turns sent to clients.
    pub lookahead: usize,
    clients: HashMap<ConnectionId, mpsc::Sender<String>>,
    persist_tx: mpsc::Sender<PersistJob>,
}

/// What handling one client command produced.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Messages for the client that sent the command.
    pub reply: Vec<ServerMessage>,
    /// Messages for every connected client.
    pub broadcast: Vec<ServerMessage>,
    pub persist: Option<PersistJob>,
}

impl Outcome {
    fn reply(msg: ServerMessage) -> Self {
        Outcome {
            reply: vec![msg],
            ..Outcome::default()
        }
    }

    fn broadcast(msgs: Vec<ServerMessage>, persist: PersistJob) -> Self {
        Outcome {
            reply: Vec::new(),
            broadcast: msgs,
            persist: Some(persist),
        }
    }
}

impl AppState {
    pub fn new(
        engine: DraftEngine,
        lookahead: usize,
        persist_tx: mpsc::Sender<PersistJob>,
    ) -> Self {
        AppState {
            engine,
            lookahead,
            clients: HashMap::new(),
            persist_tx,
        }
    }

    /// Full state message for one client.
    pub fn state_message(&self) -> Result<ServerMessage, EngineError> {
        let status = self.engine.status()?;
        let lookahead = self.lookahead;
        self.engine.read(|dir, state| ServerMessage::State {
            state: state.clone(),
            status,
            teams: dir.teams().into_iter().cloned().collect(),
            upcoming: lookahead::project(state, lookahead),
        })
    }

    /// Apply one client command. Never performs I/O.
    pub fn handle(&self, msg: ClientMessage) -> Outcome {
        match self.dispatch(msg) {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_corruption() {
                    error!("Engine reported corruption: {}", e);
                }
                Outcome::reply(ServerMessage::from(&e))
            }
        }
    }

    fn dispatch(&self, msg: ClientMessage) -> Result<Outcome, EngineError> {
        match msg {
            ClientMessage::GetState => Ok(Outcome::reply(self.state_message()?)),

            ClientMessage::UpcomingTurns { count } => {
                let n = count.unwrap_or(self.lookahead).min(MAX_UPCOMING);
                let teams = self.engine.upcoming_turns(n)?;
                Ok(Outcome::reply(ServerMessage::UpcomingTurns { teams }))
            }

            ClientMessage::AvailablePlayers { position, search } => {
                let filter = PoolFilter { position, search };
                let players: Vec<Player> = self.engine.read(|dir, _| {
                    dir.available_players(&filter)
                        .into_iter()
                        .cloned()
                        .collect()
                })?;
                Ok(Outcome::reply(ServerMessage::Players { players }))
            }

            ClientMessage::DelegateCandidates => {
                let players: Vec<Player> = self.engine.read(|dir, _| {
                    dir.delegate_candidates().into_iter().cloned().collect()
                })?;
                Ok(Outcome::reply(ServerMessage::DelegateCandidates { players }))
            }

            ClientMessage::SubmitPick {
                actor,
                player_id,
                expected_pick,
            } => {
                let pick = self.engine.submit(&PickRequest {
                    player_id,
                    actor,
                    expected_pick,
                })?;
                let (league, state) = self.engine.export()?;
                let upcoming = lookahead::project(&pick.state, self.lookahead);
                let persist = PersistJob::Pick {
                    pick_number: pick.pick_number,
                    team_id: pick.team_id.clone(),
                    player_id: pick.player_id.clone(),
                    league,
                    state,
                };
                let msg = ServerMessage::PickCommitted {
                    pick_number: pick.pick_number,
                    team_id: pick.team_id,
                    player_id: pick.player_id,
                    state: pick.state,
                    upcoming,
                };
                Ok(Outcome::broadcast(vec![msg], persist))
            }

            ClientMessage::StartDraft { actor, order } => {
                if let Some(denied) = self.require_admin(&actor)? {
                    return Ok(denied);
                }
                self.engine.start_draft(&order)?;
                self.broadcast_state(Vec::new(), false)
            }

            ClientMessage::AddTeam {
                actor,
                name,
                delegate,
            } => {
                if let Some(denied) = self.require_admin(&actor)? {
                    return Ok(denied);
                }
                let team_id = self.engine.add_team(&name, &delegate)?;
                let team = self
                    .engine
                    .read(|dir, _| dir.team(&team_id).cloned())?
                    .ok_or(InvariantViolation::MissingTeam(team_id))?;
                self.broadcast_state(vec![ServerMessage::TeamAdded { team }], false)
            }

            ClientMessage::RemoveTeam { actor, team_id } => {
                if let Some(denied) = self.require_admin(&actor)? {
                    return Ok(denied);
                }
                let team = self.engine.remove_team(&team_id)?;
                let removed = ServerMessage::TeamRemoved { team_id: team.id };
                self.broadcast_state(vec![removed], false)
            }

            ClientMessage::ResetDraft { actor, confirm } => {
                if let Some(denied) = self.require_admin(&actor)? {
                    return Ok(denied);
                }
                if !confirm {
                    return Ok(Outcome::reply(ServerMessage::error(
                        "CONFIRMATION_REQUIRED",
                        "resetting dissolves every team; resend with confirm=true",
                    )));
                }
                self.engine.reset_draft()?;
                info!("Draft reset by {}", actor);
                self.broadcast_state(Vec::new(), true)
            }
        }
    }

    /// `Some(reply)` when `actor` is not an admin.
    fn require_admin(&self, actor: &str) -> Result<Option<Outcome>, EngineError> {
        let role = self
            .engine
            .read(|dir, _| dir.resolve(actor).map(|identity| identity.role))?;
        if role == Some(Role::Admin) {
            return Ok(None);
        }
        warn!("Rejected administrative command from '{}'", actor);
        Ok(Some(Outcome::reply(ServerMessage::error(
            "FORBIDDEN",
            format!("`{actor}` is not an administrator"),
        ))))
    }

    fn broadcast_state(
        &self,
        mut msgs: Vec<ServerMessage>,
        reset: bool,
    ) -> Result<Outcome, EngineError> {
        msgs.push(self.state_message()?);
        let (league, state) = self.engine.export()?;
        let persist = if reset {
            PersistJob::Reset { league, state }
        } else {
            PersistJob::Snapshot { league, state }
        };
        Ok(Outcome::broadcast(msgs, persist))
    }

    fn send_to(&mut self, id: ConnectionId, msg: &ServerMessage) {
        let Some(tx) = self.clients.get(&id) else {
            return;
        };
        if let Err(e) = tx.try_send(msg.to_json()) {
            warn!("Dropping client {id}: {e}");
            self.clients.remove(&id);
        }
    }

    fn broadcast(&mut self, msg: &ServerMessage) {
        let json = msg.to_json();
        let mut dead = Vec::new();
        for (id, tx) in &self.clients {
            if let Err(e) = tx.try_send(json.clone()) {
                warn!("Dropping client {id}: {e}");
                dead.push(*id);
            }
        }
        for id in dead {
            self.clients.remove(&id);
        }
    }

    async fn deliver(&mut self, from: ConnectionId, outcome: Outcome) {
        for msg in &outcome.reply {
            self.send_to(from, msg);
        }
        for msg in &outcome.broadcast {
            self.broadcast(msg);
        }
        if let Some(job) = outcome.persist {
            if self.persist_tx.send(job).await.is_err() {
                error!("Persistence task is gone; committed change was not saved");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the application event loop until the WebSocket channel closes.
pub async fn run(mut ws_rx: mpsc::Receiver<WsEvent>, mut state: AppState) -> anyhow::Result<()> {
    info!("Application event loop started");

    while let Some(event) = ws_rx.recv().await {
        match event {
            WsEvent::Connected { id, addr, outbound } => {
                info!("Client {} registered ({})", id, addr);
                state.clients.insert(id, outbound);
                match state.state_message() {
                    Ok(msg) => state.send_to(id, &msg),
                    Err(e) => state.send_to(id, &ServerMessage::from(&e)),
                }
            }
            WsEvent::Disconnected { id } => {
                state.clients.remove(&id);
            }
            WsEvent::Message { id, text } => {
                let outcome = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => state.handle(msg),
                    Err(e) => {
                        warn!("Unparseable message from {}: {}", id, e);
                        Outcome::reply(ServerMessage::error("BAD_REQUEST", e.to_string()))
                    }
                };
                state.deliver(id, outcome).await;
            }
        }
    }

    info!("WebSocket channel closed, application event loop exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Startup / crash recovery
// ---------------------------------------------------------------------------

/// Build the engine from whatever the database holds.
///
/// A stored league and state are verified against each other before the
/// draft resumes; an inconsistent pair is an error. With nothing stored, a
/// fresh league is created and seeded from the configured player pool
/// (resolved relative to `base_dir`). Returns the engine and whether an
/// existing draft was resumed.
pub fn recover_from_db(
    db: &Database,
    config: &Config,
    base_dir: &Path,
) -> anyhow::Result<(DraftEngine, bool)> {
    let policy = config.pick_policy();
    let league = db.load_league().context("failed to load stored league")?;
    let state = db.load().context("failed to load stored draft state")?;

    match (league, state) {
        (Some(mut league), state) => {
            league.set_admins(config.draft.admins.iter().cloned());
            let state = state.unwrap_or_default();
            let picks = state.history.len();
            check_pick_log(db, &state.history)?;
            let engine = DraftEngine::restore(league, state, policy)
                .map_err(|v| anyhow!("stored draft is inconsistent: {v}"))?;
            info!("Crash recovery: resumed draft with {} picks", picks);
            Ok((engine, true))
        }
        (None, Some(_)) => Err(anyhow!(
            "stored draft state has no league to go with it; refusing to resume"
        )),
        (None, None) => {
            let mut league = League::with_admins(config.draft.admins.iter().cloned());
            if let Some(pool) = &config.pool.players {
                let path = base_dir.join(pool);
                let added = snakedraft_core::pool::import_into(&mut league, &path)
                    .with_context(|| format!("failed to import player pool {}", path.display()))?;
                info!("Seeded league with {} players", added);
            }
            db.save_snapshot(&league, &DraftState::new())?;
            Ok((DraftEngine::new(league, policy), false))
        }
    }
}

/// Compare the current draft's pick log with the stored history. The state
/// is authoritative; a log that disagrees is only reported.
fn check_pick_log(db: &Database, history: &[PlayerId]) -> anyhow::Result<bool> {
    let Some(draft_id) = db.get_draft_id()? else {
        return Ok(true);
    };
    let logged = db.load_picks(&draft_id)?;
    let matches = logged.len() == history.len()
        && logged
            .iter()
            .zip(history)
            .enumerate()
            .all(|(i, (record, id))| record.pick_number == i + 1 && &record.player_id == id);
    if !matches {
        warn!(
            "Pick log for {} ({} entries) disagrees with the stored history ({} picks)",
            draft_id,
            logged.len(),
            history.len()
        );
    }
    Ok(matches)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
