use thiserror::Error;

use crate::chat::{SaveError, TurnIndex};

/// Errors that abort a whole turn. Per-call problems are
/// [`Diagnostic`](crate::edit::Diagnostic)s instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no enabled sheets to apply turn {turn} to")]
    NoEnabledSheets { turn: TurnIndex },

    #[error("turn {turn} out of range (chat has {len} turns)")]
    TurnOutOfRange { turn: TurnIndex, len: usize },

    #[error(transparent)]
    Transport(#[from] SaveError),

    #[error("rebuild rejected: {0}")]
    Rebuild(String),
}
