//! The host conversation, as seen by the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::book::SheetBook;
use crate::snapshot::Piece;

/// Position of a turn in the conversation.
pub type TurnIndex = usize;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub is_user: bool,
    pub text: String,
    /// Sheet states at the end of this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece: Option<Piece>,
    /// Raw edit spans this turn was last processed with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_record: Option<Vec<String>>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { is_user: true, text: text.into(), ..Default::default() }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self { is_user: false, text: text.into(), ..Default::default() }
    }

    fn carries_piece(&self) -> bool {
        !self.is_user && self.piece.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to save chat: {0}")]
pub struct SaveError(pub String);

/// Storage for the conversation's turns.
pub trait ChatStore {
    fn turn_count(&self) -> usize;

    fn turn(&self, index: TurnIndex) -> Option<&Turn>;

    fn turn_mut(&mut self, index: TurnIndex) -> Option<&mut Turn>;

    /// Persist the turns and the sheets they reference.
    fn save(&mut self, book: &SheetBook) -> Result<(), SaveError>;

    fn latest(&self) -> Option<TurnIndex> {
        self.turn_count().checked_sub(1)
    }

    /// Nearest turn before `before` that is not a user turn and carries a
    /// piece.
    fn previous_piece_index(&self, before: TurnIndex) -> Option<TurnIndex> {
        (0..before.min(self.turn_count()))
            .rev()
            .find(|&i| self.turn(i).is_some_and(Turn::carries_piece))
    }

    fn latest_piece_index(&self) -> Option<TurnIndex> {
        self.previous_piece_index(self.turn_count())
    }

    /// The `n`-th most recent piece-bearing turn; `n = 0` is the latest.
    fn nth_latest_piece_index(&self, n: usize) -> Option<TurnIndex> {
        (0..self.turn_count())
            .rev()
            .filter(|&i| self.turn(i).is_some_and(Turn::carries_piece))
            .nth(n)
    }

    /// Most recent turn that is not a user turn.
    fn latest_ai_index(&self) -> Option<TurnIndex> {
        (0..self.turn_count())
            .rev()
            .find(|&i| self.turn(i).is_some_and(|t| !t.is_user))
    }

    /// Non-user turns after `after`, oldest first.
    fn later_ai_turns(&self, after: TurnIndex) -> Vec<TurnIndex> {
        (after + 1..self.turn_count())
            .filter(|&i| self.turn(i).is_some_and(|t| !t.is_user))
            .collect()
    }
}

/// In-memory chat.
#[derive(Debug, Clone, Default)]
pub struct MemoryChat {
    pub turns: Vec<Turn>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> TurnIndex {
        self.turns.push(Turn::user(text));
        self.turns.len() - 1
    }

    pub fn push_ai(&mut self, text: impl Into<String>) -> TurnIndex {
        self.turns.push(Turn::ai(text));
        self.turns.len() - 1
    }

    pub fn set_text(&mut self, index: TurnIndex, text: impl Into<String>) -> bool {
        match self.turns.get_mut(index) {
            Some(turn) => {
                turn.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: TurnIndex) -> Option<Turn> {
        (index < self.turns.len()).then(|| self.turns.remove(index))
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves
    }

    /// Make every following save fail.
    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }
}

impl ChatStore for MemoryChat {
    fn turn_count(&self) -> usize {
        self.turns.len()
    }

    fn turn(&self, index: TurnIndex) -> Option<&Turn> {
        self.turns.get(index)
    }

    fn turn_mut(&mut self, index: TurnIndex) -> Option<&mut Turn> {
        self.turns.get_mut(index)
    }

    fn save(&mut self, _book: &SheetBook) -> Result<(), SaveError> {
        if self.fail_saves {
            return Err(SaveError("storage unavailable".into()));
        }
        self.saves += 1;
        Ok(())
    }
}
