//! Render sheets as prompt text for the model.

use crate::book::SheetBook;
use crate::cell_id::CellPos;
use crate::sheet::SheetView;
use crate::snapshot::Piece;

/// Sections to include when rendering a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableParts {
    pub title: bool,
    pub note: bool,
    pub headers: bool,
    pub rows: bool,
    pub edit_rules: bool,
}

impl TableParts {
    pub fn full() -> Self {
        Self { title: true, note: true, headers: true, rows: true, edit_rules: true }
    }

    /// Data only, for read-only injection.
    pub fn pure_data() -> Self {
        Self { note: false, edit_rules: false, ..Self::full() }
    }
}

impl Default for TableParts {
    fn default() -> Self {
        Self::full()
    }
}

/// Render one sheet. `index` is the sheet's position in the enabled-sheet
/// list, the number edit calls use to address it.
pub fn render_sheet(view: &SheetView<'_>, index: usize, parts: TableParts) -> String {
    let sheet = view.sheet();
    let mut out = String::new();

    if parts.title {
        out.push_str(&format!("[{}:{}]\n", index, sheet.name));
    }
    if parts.note && !sheet.prompts.note.is_empty() {
        out.push_str(&format!("Note: {}\n", sheet.prompts.note));
    }
    if parts.headers {
        let columns: Vec<String> = view
            .headers()
            .iter()
            .enumerate()
            .map(|(i, name)| format!("[{}:{}]", i, name))
            .collect();
        out.push_str(&format!("Columns: {}\n", columns.join(", ")));
    }
    if parts.rows {
        if view.data_row_count() == 0 {
            out.push_str("(empty)\n");
        }
        for row in 1..view.row_count() {
            let values: Vec<String> = (1..view.col_count())
                .map(|col| view.display(CellPos::new(row, col)))
                .collect();
            out.push_str(&format!("[{}] {}\n", row - 1, values.join(", ")));
        }
    }
    if parts.edit_rules {
        let prompts = &sheet.prompts;
        for (label, text) in [
            ("Init", &prompts.init),
            ("Insert", &prompts.insert),
            ("Update", &prompts.update),
            ("Delete", &prompts.delete),
        ] {
            if !text.is_empty() {
                out.push_str(&format!("{}: {}\n", label, text));
            }
        }
    }
    out
}

/// Render every enabled sheet marked for context, as of `piece`.
pub fn render_tables(book: &SheetBook, piece: Option<&Piece>, parts: TableParts) -> String {
    book.views_at(piece)
        .iter()
        .enumerate()
        .filter(|(_, view)| view.sheet().send_to_context)
        .map(|(index, view)| render_sheet(view, index, parts))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Where the table block goes in a conversation of `len` messages: before
/// the message `depth` places from the end, or at the start when the
/// conversation is shorter than that.
pub fn injection_position(len: usize, depth: usize) -> usize {
    len.saturating_sub(depth)
}
