// The draft engine: the only place turn, roster and history change, each
// change made as one unit under a per-draft lock.

use std::sync::{Mutex, MutexGuard, TryLockError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::directory::{Directory, League};
use crate::draft::lookahead;
use crate::draft::player::{PlayerId, Team, TeamId};
use crate::draft::roster;
use crate::draft::state::DraftState;
use crate::draft::turn;
use crate::draft::validate::{self, PickPolicy};
use crate::error::{DraftError, EngineError, InvariantViolation};

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// A pick submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRequest {
    pub player_id: PlayerId,
    /// Acting identity, resolved through the directory.
    pub actor: String,
    /// 1-based pick number the submitter believes is next. When set and
    /// stale, the pick is refused with `ConcurrentConflict`.
    #[serde(default)]
    pub expected_pick: Option<usize>,
}

impl PickRequest {
    pub fn new(player_id: PlayerId, actor: impl Into<String>) -> Self {
        PickRequest {
            player_id,
            actor: actor.into(),
            expected_pick: None,
        }
    }

    pub fn expecting(mut self, pick_number: usize) -> Self {
        self.expected_pick = Some(pick_number);
        self
    }
}

/// A pick that has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedPick {
    /// 1-based.
    pub pick_number: usize,
    pub team_id: TeamId,
    pub player_id: PlayerId,
    /// State immediately after the pick.
    pub state: DraftState,
}

/// The team on the clock, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnClock {
    pub team_id: TeamId,
    pub team_name: String,
    pub delegate: PlayerId,
}

/// Read model summarizing the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftStatus {
    pub started: bool,
    pub on_clock: Option<OnClock>,
    pub reversed: bool,
    pub pick_count: usize,
    pub round: usize,
    pub available_count: usize,
}

// ---------------------------------------------------------------------------
// DraftEngine
// ---------------------------------------------------------------------------

struct Draft<D> {
    dir: D,
    state: DraftState,
}

/// Serialized access to one draft.
///
/// Every mutating operation takes the same lock, validates against the state
/// it finds there, and only then applies its effects. Nothing inside the lock
/// performs I/O; persisting the returned state is the caller's job.
pub struct DraftEngine<D = League> {
    inner: Mutex<Draft<D>>,
    policy: PickPolicy,
}

impl<D: Directory + Clone> DraftEngine<D> {
    /// Engine over `dir` with a fresh, unstarted draft.
    pub fn new(dir: D, policy: PickPolicy) -> Self {
        DraftEngine {
            inner: Mutex::new(Draft {
                dir,
                state: DraftState::new(),
            }),
            policy,
        }
    }

    /// Engine resuming a previously persisted draft. The pair must be
    /// consistent; a mismatch means one of them was corrupted.
    pub fn restore(
        dir: D,
        state: DraftState,
        policy: PickPolicy,
    ) -> Result<Self, InvariantViolation> {
        state.verify(&dir)?;
        info!(
            "Draft restored: started={}, {} picks, turn index {}",
            state.started,
            state.history.len(),
            state.current_index
        );
        Ok(DraftEngine {
            inner: Mutex::new(Draft { dir, state }),
            policy,
        })
    }

    pub fn policy(&self) -> PickPolicy {
        self.policy
    }

    fn lock(&self) -> Result<MutexGuard<'_, Draft<D>>, InvariantViolation> {
        self.inner.lock().map_err(|_| InvariantViolation::Poisoned)
    }

    /// Fix the turn order and start the draft.
    pub fn start_draft(&self, order: &[TeamId]) -> Result<DraftState, EngineError> {
        let mut draft = self.lock()?;
        draft.stage(|state, dir| Ok(roster::start_draft(state, &*dir, order)?))?;
        Ok(draft.state.clone())
    }

    /// Submit a pick for `player_id` on behalf of `actor`, waiting for the lock.
    pub fn submit_pick(
        &self,
        player_id: &PlayerId,
        actor: &str,
    ) -> Result<CommittedPick, EngineError> {
        self.submit(&PickRequest::new(player_id.clone(), actor))
    }

    pub fn submit(&self, req: &PickRequest) -> Result<CommittedPick, EngineError> {
        let mut draft = self.lock()?;
        draft.commit(req, &self.policy)
    }

    /// Like [`submit`](Self::submit) but gives up with `ConcurrentConflict`
    /// instead of waiting when another operation holds the lock.
    pub fn try_submit(&self, req: &PickRequest) -> Result<CommittedPick, EngineError> {
        let mut draft = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                debug!("Pick for {} lost the race for the draft lock", req.player_id);
                return Err(DraftError::ConcurrentConflict.into());
            }
            Err(TryLockError::Poisoned(_)) => return Err(InvariantViolation::Poisoned.into()),
        };
        draft.commit(req, &self.policy)
    }

    /// The next `n` teams to pick, starting with the one on the clock.
    pub fn upcoming_turns(&self, n: usize) -> Result<Vec<TeamId>, EngineError> {
        let draft = self.lock()?;
        Ok(lookahead::project(&draft.state, n))
    }

    /// Dissolve every team and clear the draft. Confirmation is the caller's
    /// responsibility.
    pub fn reset_draft(&self) -> Result<DraftState, EngineError> {
        let mut draft = self.lock()?;
        draft.stage(|state, dir| Ok(roster::reset_draft(state, dir)?))?;
        Ok(draft.state.clone())
    }

    pub fn add_team(&self, name: &str, delegate: &PlayerId) -> Result<TeamId, EngineError> {
        let mut draft = self.lock()?;
        draft.stage(|state, dir| roster::add_team(state, dir, name, delegate))
    }

    pub fn remove_team(&self, team_id: &TeamId) -> Result<Team, EngineError> {
        let mut draft = self.lock()?;
        draft.stage(|state, dir| roster::remove_team(state, dir, team_id))
    }

    /// Copy of the current draft state.
    pub fn snapshot(&self) -> Result<DraftState, EngineError> {
        Ok(self.lock()?.state.clone())
    }

    pub fn status(&self) -> Result<DraftStatus, EngineError> {
        let draft = self.lock()?;
        let state = &draft.state;
        let on_clock = state
            .current_team()
            .and_then(|id| draft.dir.team(id))
            .map(|t| OnClock {
                team_id: t.id.clone(),
                team_name: t.name.clone(),
                delegate: t.delegate.clone(),
            });
        let available_count = draft
            .dir
            .players()
            .iter()
            .filter(|p| p.is_available())
            .count();
        Ok(DraftStatus {
            started: state.started,
            on_clock,
            reversed: state.reversed,
            pick_count: state.pick_count(),
            round: state.round(),
            available_count,
        })
    }

    /// Run a read-only query against the directory and state under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&D, &DraftState) -> R) -> Result<R, EngineError> {
        let draft = self.lock()?;
        Ok(f(&draft.dir, &draft.state))
    }

    /// Consistent copy of directory and state, for persistence.
    pub fn export(&self) -> Result<(D, DraftState), EngineError> {
        let draft = self.lock()?;
        Ok((draft.dir.clone(), draft.state.clone()))
    }
}

impl<D: Directory + Clone> Draft<D> {
    /// Run `f` against copies of the directory and state and install them
    /// only if `f` succeeds and the result verifies. On any error the draft
    /// is left exactly as it was.
    fn stage<T>(
        &mut self,
        f: impl FnOnce(&mut DraftState, &mut D) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut dir = self.dir.clone();
        let mut state = self.state.clone();
        let out = f(&mut state, &mut dir)?;
        state.verify(&dir)?;
        self.dir = dir;
        self.state = state;
        Ok(out)
    }

    /// Validate and apply one pick. Either every effect lands or none does.
    fn commit(
        &mut self,
        req: &PickRequest,
        policy: &PickPolicy,
    ) -> Result<CommittedPick, EngineError> {
        let team_id = match self.validate(req, policy) {
            Ok(team_id) => team_id,
            Err(e) => {
                debug!("Pick of {} by '{}' rejected: {}", req.player_id, req.actor, e);
                return Err(e.into());
            }
        };

        let applied = self.stage(|state, dir| {
            roster::assign_pick(dir, &team_id, &req.player_id)?;
            state.history.push(req.player_id.clone());
            let next = turn::advance(state.team_count(), state.pointer());
            state.set_pointer(next);
            Ok(())
        });
        if let Err(e) = applied {
            error!("Draft state corrupted while committing {}: {}", req.player_id, e);
            return Err(e);
        }

        let pick_number = self.state.history.len();
        info!(
            "Pick {}: team {} took player {} (next: index {}, reversed={})",
            pick_number, team_id, req.player_id, self.state.current_index, self.state.reversed
        );
        Ok(CommittedPick {
            pick_number,
            team_id,
            player_id: req.player_id.clone(),
            state: self.state.clone(),
        })
    }

    fn validate(&self, req: &PickRequest, policy: &PickPolicy) -> Result<TeamId, DraftError> {
        let team_id = validate::authorize(&req.actor, &self.state, &self.dir, policy)?;
        validate::check_availability(&req.player_id, &self.state, &self.dir)?;
        if let Some(expected) = req.expected_pick {
            if expected != self.state.next_pick_number() {
                return Err(DraftError::ConcurrentConflict);
            }
        }
        Ok(team_id)
    }
}
