// Snake turn sequencing: forward through the order, then back, with the
// end teams picking twice in a row at each turnaround.

use serde::{Deserialize, Serialize};

/// Whose turn it is: an index into the turn order plus the snake direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnPointer {
    pub index: usize,
    pub reversed: bool,
}

impl TurnPointer {
    pub const START: TurnPointer = TurnPointer {
        index: 0,
        reversed: false,
    };

    pub fn new(index: usize, reversed: bool) -> Self {
        TurnPointer { index, reversed }
    }
}

/// Compute the pointer that follows `pointer` in a draft of `team_count` teams.
///
/// Going forward, the last team keeps the turn and the direction flips;
/// going backward, the first team keeps the turn and the direction flips.
/// For 4 teams this yields `0,1,2,3,3,2,1,0,0,1,...`.
///
/// `team_count == 0` has no valid pointer and returns the input unchanged.
/// Callers reject empty orders before a draft starts.
pub fn advance(team_count: usize, pointer: TurnPointer) -> TurnPointer {
    if team_count == 0 {
        return pointer;
    }
    let last = team_count - 1;
    match (pointer.reversed, pointer.index) {
        (false, i) if i >= last => TurnPointer::new(last, true),
        (false, i) => TurnPointer::new(i + 1, false),
        (true, 0) => TurnPointer::new(0, false),
        (true, i) if i > last => TurnPointer::new(last, true),
        (true, i) => TurnPointer::new(i - 1, true),
    }
}

/// Endless iterator over successive turn pointers, starting with `from`.
#[derive(Debug, Clone)]
pub struct SnakeTurns {
    team_count: usize,
    next: TurnPointer,
}

impl SnakeTurns {
    pub fn new(team_count: usize, from: TurnPointer) -> Self {
        SnakeTurns {
            team_count,
            next: from,
        }
    }
}

impl Iterator for SnakeTurns {
    type Item = TurnPointer;

    fn next(&mut self) -> Option<TurnPointer> {
        if self.team_count == 0 {
            return None;
        }
        let current = self.next;
        self.next = advance(self.team_count, current);
        Some(current)
    }
}
