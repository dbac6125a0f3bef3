// End-to-end turn scenarios driven through the orchestrator.

use pretty_assertions::assert_eq;
use sheetmem_engine::edit::Diagnostic;
use sheetmem_engine::{
    CellPos, CellValue, ChatEvent, ChatStore, EditOptions, MemoryChat, Orchestrator, Piece,
    SheetBook, SheetTemplate,
};

struct Conversation {
    book: SheetBook,
    chat: MemoryChat,
    orch: Orchestrator,
}

impl Conversation {
    fn new(columns: &[&str]) -> Self {
        Self {
            book: SheetBook::from_templates(&[SheetTemplate::new("Trip", columns)]),
            chat: MemoryChat::new(),
            orch: Orchestrator::new(EditOptions::default()),
        }
    }

    fn ai(&mut self, calls: &str) -> sheetmem_engine::TurnReport {
        let turn = self.chat.push_ai(wrap(calls));
        self.orch
            .handle(&mut self.book, &mut self.chat, ChatEvent::MessageReceived(turn))
            .unwrap()
            .unwrap()
    }

    fn piece(&self, turn: usize) -> Option<Piece> {
        self.chat.turn(turn).and_then(|t| t.piece.clone())
    }

    fn rows_at(&self, turn: usize) -> Vec<Vec<String>> {
        let piece = self.piece(turn);
        let views = self.book.views_at(piece.as_ref());
        let view = views[0];
        view.data_rows()
            .iter()
            .map(|row| row.iter().map(CellValue::raw_display).collect())
            .collect()
    }

    fn latest_rows(&self) -> Vec<Vec<String>> {
        self.rows_at(self.chat.latest_piece_index().unwrap())
    }
}

fn wrap(calls: &str) -> String {
    format!("Sure.\n<tableEdit>\n<!--\n{}\n-->\n</tableEdit>\nAnything else?", calls)
}

#[test]
fn insert_into_empty_sheet() {
    let mut conv = Conversation::new(&["Date", "Location"]);
    let report = conv.ai(r#"insertRow(0, {0:"Day1", 1:"Town"})"#);
    assert!(report.changed);
    assert_eq!(report.applied, 1);
    assert_eq!(conv.latest_rows(), vec![vec!["Day1", "Town"]]);
}

#[test]
fn update_then_delete_across_turns() {
    let mut conv = Conversation::new(&["Date", "Location"]);
    conv.ai(r#"insertRow(0, {0:"Day1", 1:"Town"})"#);
    conv.ai(r#"updateRow(0, 0, {1:"NewTown"})"#);
    assert_eq!(conv.latest_rows(), vec![vec!["Day1", "NewTown"]]);

    conv.ai("deleteRow(0,0)");
    assert_eq!(conv.latest_rows(), Vec::<Vec<String>>::new());

    // Earlier turns keep their own states.
    assert_eq!(conv.rows_at(0), vec![vec!["Day1", "Town"]]);
    assert_eq!(conv.rows_at(1), vec![vec!["Day1", "NewTown"]]);
}

#[test]
fn deletes_run_highest_row_first() {
    let mut conv = Conversation::new(&["Date"]);
    conv.ai(r#"insertRow(0, {0:"a"}) insertRow(0, {0:"b"}) insertRow(0, {0:"c"})"#);
    let report = conv.ai("deleteRow(0,0)\ndeleteRow(0,2)");
    assert_eq!(report.applied, 2);
    assert_eq!(conv.latest_rows(), vec![vec!["b"]]);
}

#[test]
fn update_past_end_becomes_insert() {
    let mut conv = Conversation::new(&["Date", "Location"]);
    conv.ai(r#"insertRow(0, {0:"a"}) insertRow(0, {0:"b"})"#);
    conv.ai(r#"updateRow(0, 5, {0:"X"})"#);
    assert_eq!(
        conv.latest_rows(),
        vec![vec!["a", ""], vec!["b", ""], vec!["X", ""]]
    );
}

#[test]
fn insert_value_lands_one_column_right_in_grid() {
    let mut conv = Conversation::new(&["A", "B", "C"]);
    conv.ai(r#"insertRow(0, {2: "third"})"#);
    let piece = conv.piece(0);
    let view = conv.book.views_at(piece.as_ref())[0];
    assert_eq!(view.display(CellPos::new(1, 3)), "third");
    assert_eq!(view.display(CellPos::new(1, 2)), "");
}

#[test]
fn one_broken_mapping_does_not_stop_the_rest() {
    let mut conv = Conversation::new(&["Name", "Note"]);
    let report = conv.ai(
        "insertRow(0, {0: \"Ann\", 1: \"ok\"})\n\
         insertRow(0, {0: \"Bob, 1: \"oops})\n\
         insertRow(0, {0: \"Cid\", 1: \"fine\"})",
    );
    assert_eq!(report.applied, 2);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::DroppedMapping { .. } | Diagnostic::MalformedCall { .. })));
    assert_eq!(conv.latest_rows(), vec![vec!["Ann", "ok"], vec!["Cid", "fine"]]);
}

#[test]
fn escaped_quotes_are_kept_literally() {
    let mut conv = Conversation::new(&["Quote"]);
    conv.ai(r#"insertRow(0, {0: "she said \"hi\""})"#);
    assert_eq!(conv.latest_rows(), vec![vec![r#"she said "hi""#]]);
}

#[test]
fn descriptive_keys_are_dropped() {
    let mut conv = Conversation::new(&["Name", "Age"]);
    conv.ai(r#"insertRow(0, {0: "Ann", "age in years": 30, 1: 31})"#);
    assert_eq!(conv.latest_rows(), vec![vec!["Ann", "31"]]);
}

#[test]
fn unknown_sheet_is_reported_and_skipped() {
    let mut conv = Conversation::new(&["Name"]);
    let report = conv.ai(r#"insertRow(3, {0: "x"}) insertRow(0, {0: "y"})"#);
    assert_eq!(report.applied, 1);
    assert!(report.diagnostics.contains(&Diagnostic::UnknownSheet { index: 3 }));
    assert_eq!(conv.latest_rows(), vec![vec!["y"]]);
}

#[test]
fn editing_an_old_turn_replays_later_turns() {
    let mut conv = Conversation::new(&["Name"]);
    conv.ai(r#"insertRow(0, {0: "Ann"})"#);
    conv.chat.push_user("thanks");
    conv.ai(r#"insertRow(0, {0: "Bob"})"#);
    assert_eq!(conv.latest_rows(), vec![vec!["Ann"], vec!["Bob"]]);

    conv.chat.set_text(0, wrap(r#"insertRow(0, {0: "Zed"})"#));
    let report = conv
        .orch
        .handle(&mut conv.book, &mut conv.chat, ChatEvent::MessageEdited(0))
        .unwrap()
        .unwrap();
    assert_eq!(report.replayed.len(), 1);
    assert_eq!(conv.rows_at(0), vec![vec!["Zed"]]);
    assert_eq!(conv.latest_rows(), vec![vec!["Zed"], vec!["Bob"]]);
}

#[test]
fn text_without_edit_region_applies_nothing() {
    let mut conv = Conversation::new(&["Name"]);
    let turn = conv.chat.push_ai("Just chatting, no table changes.");
    let report = conv
        .orch
        .apply_message(&mut conv.book, &mut conv.chat, turn, false)
        .unwrap();
    assert_eq!(report.actions, 0);
    assert_eq!(conv.latest_rows(), Vec::<Vec<String>>::new());
}
