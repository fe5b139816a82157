// Forecast of upcoming picking teams.

use super::player::TeamId;
use super::state::DraftState;
use super::turn::SnakeTurns;

/// The next `n` teams to pick, starting with the team currently on the clock.
///
/// Walks the same `advance` transition the engine applies on commit, so the
/// forecast cannot drift from what actually happens. Empty when the draft
/// has not started.
pub fn project(state: &DraftState, n: usize) -> Vec<TeamId> {
    if !state.started {
        return Vec::new();
    }
    SnakeTurns::new(state.team_count(), state.pointer())
        .take(n)
        .filter_map(|p| state.turn_order.get(p.index).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::turn::{advance, TurnPointer};

    fn started(teams: &[&str], index: usize, reversed: bool) -> DraftState {
        DraftState {
            started: true,
            current_index: index,
            reversed,
            turn_order: teams.iter().map(|t| TeamId::from(*t)).collect(),
            history: Vec::new(),
        }
    }

    fn ids(v: &[&str]) -> Vec<TeamId> {
        v.iter().map(|t| TeamId::from(*t)).collect()
    }

    #[test]
    fn projects_from_start() {
        let s = started(&["T1", "T2", "T3", "T4"], 0, false);
        assert_eq!(
            project(&s, 8),
            ids(&["T1", "T2", "T3", "T4", "T4", "T3", "T2", "T1"])
        );
    }

    #[test]
    fn projects_from_mid_reversal() {
        let s = started(&["A", "B", "C"], 2, true);
        assert_eq!(project(&s, 5), ids(&["C", "B", "A", "A", "B"]));
    }

    #[test]
    fn does_not_mutate_state() {
        let s = started(&["A", "B"], 1, false);
        let before = s.clone();
        let _ = project(&s, 10);
        assert_eq!(s, before);
    }

    #[test]
    fn matches_repeated_advance() {
        let s = started(&["A", "B", "C", "D", "E"], 3, true);
        let mut p = s.pointer();
        let mut expected = Vec::new();
        for _ in 0..12 {
            expected.push(s.turn_order[p.index].clone());
            p = advance(s.team_count(), p);
        }
        assert_eq!(project(&s, 12), expected);
    }

    #[test]
    fn empty_before_start_or_for_zero() {
        let mut s = started(&["A", "B"], 0, false);
        assert!(project(&s, 0).is_empty());
        s.started = false;
        assert!(project(&s, 4).is_empty());
        assert_eq!(s.pointer(), TurnPointer::START);
    }
}
