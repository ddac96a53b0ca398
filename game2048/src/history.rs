use std::collections::VecDeque;

use crate::{GameError, GameState};

/// Bounded undo stack of exact prior states, most recent last.
#[derive(Clone, Debug)]
pub struct History {
    snapshots: VecDeque<GameState>,
    capacity: usize,
}

impl History {
    /// A capacity of 0 keeps nothing, which disables undo.
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn push(&mut self, state: GameState) {
        if self.capacity == 0 {
            return;
        }
        while self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(state);
    }

    pub fn undo(&mut self) -> Result<GameState, GameError> {
        self.snapshots.pop_back().ok_or(GameError::HistoryEmpty)
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
