// Draft state: started flag, turn order, turn pointer, pick history.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::player::{PlayerId, TeamId};
use super::turn::TurnPointer;
use crate::directory::{PlayerDirectory, TeamDirectory};
use crate::error::InvariantViolation;

/// The authoritative, persisted state of one draft.
///
/// Field names on the wire follow the stored shape
/// (`isStarted`, `currentTurnIndex`, `turnOrder`, `isSnakeReversed`, `history`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftState {
    #[serde(rename = "isStarted")]
    pub started: bool,
    #[serde(rename = "currentTurnIndex")]
    pub current_index: usize,
    #[serde(rename = "turnOrder")]
    pub turn_order: Vec<TeamId>,
    #[serde(rename = "isSnakeReversed")]
    pub reversed: bool,
    /// Picked player ids, oldest first. Append-only outside of a reset.
    pub history: Vec<PlayerId>,
}

impl DraftState {
    /// A draft that has not started: no order, no picks.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer(&self) -> TurnPointer {
        TurnPointer::new(self.current_index, self.reversed)
    }

    pub(crate) fn set_pointer(&mut self, pointer: TurnPointer) {
        self.current_index = pointer.index;
        self.reversed = pointer.reversed;
    }

    pub fn team_count(&self) -> usize {
        self.turn_order.len()
    }

    /// The team on the clock, if the draft is running.
    pub fn current_team(&self) -> Option<&TeamId> {
        if !self.started {
            return None;
        }
        self.turn_order.get(self.current_index)
    }

    pub fn pick_count(&self) -> usize {
        self.history.len()
    }

    /// 1-based number of the next pick.
    pub fn next_pick_number(&self) -> usize {
        self.history.len() + 1
    }

    /// 1-based round of the next pick. A round is one pass over the order.
    pub fn round(&self) -> usize {
        match self.team_count() {
            0 => 1,
            n => self.history.len() / n + 1,
        }
    }

    pub fn is_picked(&self, player: &PlayerId) -> bool {
        self.history.contains(player)
    }

    /// Check the state against itself and against the directory it governs.
    ///
    /// - history has no duplicates
    /// - every picked player sits on exactly the roster its team reference names
    /// - every rostered player is either that team's delegate or in history
    /// - each team lists its delegate first
    /// - a started draft's order is a permutation of the teams and the
    ///   pointer is in range
    pub fn verify<D>(&self, dir: &D) -> Result<(), InvariantViolation>
    where
        D: PlayerDirectory + TeamDirectory,
    {
        let mut seen = HashSet::with_capacity(self.history.len());
        for id in &self.history {
            if !seen.insert(id) {
                return Err(InvariantViolation::DuplicatePick(id.clone()));
            }
            let player = dir
                .player(id)
                .ok_or_else(|| InvariantViolation::MissingPlayer(id.clone()))?;
            let on_roster = player
                .team
                .as_ref()
                .and_then(|t| dir.team(t))
                .is_some_and(|t| t.has_member(id));
            if !on_roster {
                return Err(InvariantViolation::RosterMismatch {
                    player: id.clone(),
                    team: player.team.clone(),
                });
            }
        }

        let teams = dir.teams();
        for team in &teams {
            if team.roster.first() != Some(&team.delegate) {
                return Err(InvariantViolation::DelegateNotFirst(team.id.clone()));
            }
            for member in &team.roster {
                let player = dir
                    .player(member)
                    .ok_or_else(|| InvariantViolation::MissingPlayer(member.clone()))?;
                if player.team.as_ref() != Some(&team.id) {
                    return Err(InvariantViolation::RosterMismatch {
                        player: member.clone(),
                        team: player.team.clone(),
                    });
                }
                if member != &team.delegate && !seen.contains(member) {
                    return Err(InvariantViolation::UnrecordedRosterMember(member.clone()));
                }
            }
        }

        if self.started {
            let order: HashSet<&TeamId> = self.turn_order.iter().collect();
            let all_listed = teams.iter().all(|t| order.contains(&t.id));
            if order.len() != self.turn_order.len()
                || order.len() != teams.len()
                || !all_listed
            {
                return Err(InvariantViolation::TurnOrderMismatch);
            }
            if self.current_index >= self.turn_order.len() {
                return Err(InvariantViolation::TurnIndexOutOfRange {
                    index: self.current_index,
                    teams: self.turn_order.len(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::League;
    use crate::draft::player::{Player, Position, Team};

    fn league_with_team() -> League {
        let mut l = League::new();
        for i in 1..=3 {
            l.register_player(Player::new(
                format!("p{i}"),
                format!("Player {i}"),
                Position::CentralMidfield,
                None,
            ));
        }
        l.set_team(&PlayerId::from("p1"), Some(TeamId::from("team_1")))
            .unwrap();
        l.insert_team(Team::new(TeamId::from("team_1"), "A", PlayerId::from("p1")));
        l
    }

    #[test]
    fn new_state_is_not_started() {
        let s = DraftState::new();
        assert!(!s.started);
        assert!(s.current_team().is_none());
        assert_eq!(s.next_pick_number(), 1);
        assert_eq!(s.round(), 1);
    }

    #[test]
    fn serializes_with_stored_field_names() {
        let s = DraftState {
            started: true,
            current_index: 1,
            turn_order: vec![TeamId::from("a"), TeamId::from("b")],
            reversed: true,
            history: vec![PlayerId::from("p9")],
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "isStarted": true,
                "currentTurnIndex": 1,
                "turnOrder": ["a", "b"],
                "isSnakeReversed": true,
                "history": ["p9"]
            })
        );
        let back: DraftState = serde_json::from_value(v).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn round_counts_passes_over_the_order() {
        let mut s = DraftState {
            started: true,
            turn_order: vec![TeamId::from("a"), TeamId::from("b"), TeamId::from("c")],
            ..DraftState::default()
        };
        assert_eq!(s.round(), 1);
        s.history = (0..3).map(|i| PlayerId(format!("x{i}"))).collect();
        assert_eq!(s.round(), 2);
        s.history.push(PlayerId::from("x3"));
        assert_eq!(s.round(), 2);
    }

    #[test]
    fn verify_accepts_consistent_state() {
        let mut l = league_with_team();
        l.set_team(&PlayerId::from("p2"), Some(TeamId::from("team_1")))
            .unwrap();
        l.append_roster_member(&TeamId::from("team_1"), PlayerId::from("p2"))
            .unwrap();
        let s = DraftState {
            history: vec![PlayerId::from("p2")],
            ..DraftState::default()
        };
        assert_eq!(s.verify(&l), Ok(()));
    }

    #[test]
    fn verify_detects_duplicate_history() {
        let mut l = league_with_team();
        l.set_team(&PlayerId::from("p2"), Some(TeamId::from("team_1")))
            .unwrap();
        l.append_roster_member(&TeamId::from("team_1"), PlayerId::from("p2"))
            .unwrap();
        let s = DraftState {
            history: vec![PlayerId::from("p2"), PlayerId::from("p2")],
            ..DraftState::default()
        };
        assert_eq!(
            s.verify(&l),
            Err(InvariantViolation::DuplicatePick(PlayerId::from("p2")))
        );
    }

    #[test]
    fn verify_detects_picked_player_without_team() {
        let l = league_with_team();
        let s = DraftState {
            history: vec![PlayerId::from("p3")],
            ..DraftState::default()
        };
        assert!(matches!(
            s.verify(&l),
            Err(InvariantViolation::RosterMismatch { team: None, .. })
        ));
    }

    #[test]
    fn verify_detects_rostered_player_missing_from_history() {
        let mut l = league_with_team();
        l.set_team(&PlayerId::from("p2"), Some(TeamId::from("team_1")))
            .unwrap();
        l.append_roster_member(&TeamId::from("team_1"), PlayerId::from("p2"))
            .unwrap();
        assert_eq!(
            DraftState::new().verify(&l),
            Err(InvariantViolation::UnrecordedRosterMember(PlayerId::from("p2")))
        );
    }

    #[test]
    fn verify_detects_bad_turn_order() {
        let l = league_with_team();
        let s = DraftState {
            started: true,
            turn_order: vec![TeamId::from("team_1"), TeamId::from("team_1")],
            ..DraftState::default()
        };
        assert_eq!(s.verify(&l), Err(InvariantViolation::TurnOrderMismatch));
    }

    #[test]
    fn verify_detects_pointer_out_of_range() {
        let l = league_with_team();
        let s = DraftState {
            started: true,
            turn_order: vec![TeamId::from("team_1")],
            current_index: 4,
            ..DraftState::default()
        };
        assert_eq!(
            s.verify(&l),
            Err(InvariantViolation::TurnIndexOutOfRange { index: 4, teams: 1 })
        );
    }
}
