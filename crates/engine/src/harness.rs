//! Test harness for turn processing with event tracking.
//!
//! `TurnHarness` bundles a book, an in-memory chat and an orchestrator whose
//! events land in a shared `EventCollector`, so tests can drive a
//! conversation turn by turn and inspect both state and events.

use std::sync::{Arc, Mutex};

use crate::book::SheetBook;
use crate::cell_id::CellPos;
use crate::chat::{MemoryChat, TurnIndex};
use crate::error::EngineError;
use crate::events::EventCollector;
use crate::sheet::{SheetTemplate, SheetUid};
use crate::snapshot::Piece;
use crate::turn::{EditOptions, Orchestrator, TurnReport};

/// Wrap calls in an edit region the way a model is asked to write it.
pub fn edit_text(calls: &str) -> String {
    format!("Reply text.\n<tableEdit>\n<!--\n{}\n-->\n</tableEdit>", calls)
}

/// A book with one "People" sheet (Name, Age).
pub fn people_book() -> (SheetBook, SheetUid) {
    let mut book = SheetBook::new();
    let uid = book.add_sheet(&SheetTemplate::new("People", &["Name", "Age"]));
    (book, uid)
}

/// Display text of the data rows of the `index`-th enabled sheet at `piece`.
pub fn data_rows(book: &SheetBook, piece: Option<&Piece>, index: usize) -> Vec<Vec<String>> {
    let views = book.views_at(piece);
    let Some(view) = views.get(index) else {
        return Vec::new();
    };
    (1..view.row_count())
        .map(|row| (1..view.col_count()).map(|col| view.display(CellPos::new(row, col))).collect())
        .collect()
}

pub struct TurnHarness {
    pub book: SheetBook,
    pub chat: MemoryChat,
    pub orch: Orchestrator,
    events: Arc<Mutex<EventCollector>>,
}

impl TurnHarness {
    pub fn new(templates: &[SheetTemplate]) -> Self {
        let (events, callback) = EventCollector::shared();
        Self {
            book: SheetBook::from_templates(templates),
            chat: MemoryChat::new(),
            orch: Orchestrator::new(EditOptions::default()).with_event_callback(callback),
            events,
        }
    }

    /// Push an AI turn carrying `calls` and process it.
    pub fn ai(&mut self, calls: &str) -> Result<TurnReport, EngineError> {
        let turn = self.chat.push_ai(edit_text(calls));
        self.orch.apply_message(&mut self.book, &mut self.chat, turn, false)
    }

    pub fn user(&mut self, text: &str) -> TurnIndex {
        self.chat.push_user(text)
    }

    /// Data rows of the `index`-th enabled sheet at the latest piece.
    pub fn rows(&self, index: usize) -> Vec<Vec<String>> {
        let piece = self.latest_piece();
        data_rows(&self.book, piece.as_ref(), index)
    }

    pub fn latest_piece(&self) -> Option<Piece> {
        use crate::chat::ChatStore;
        self.chat
            .latest_piece_index()
            .and_then(|i| self.chat.turns[i].piece.clone())
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn events(&self) -> std::sync::MutexGuard<'_, EventCollector> {
        self.events.lock().expect("event collector lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_tracks_turns_and_events() {
        let mut h = TurnHarness::new(&[SheetTemplate::new("People", &["Name", "Age"])]);
        h.ai(r#"insertRow(0, {0:"Ann", 1:"30"})"#).unwrap();
        h.user("and Bob?");
        h.ai(r#"insertRow(0, {0:"Bob"})"#).unwrap();

        assert_eq!(h.rows(0), vec![vec!["Ann", "30"], vec!["Bob", ""]]);
        assert_eq!(h.events().persisted().len(), 2);
        assert!(h.event_count() > 2);
    }
}
