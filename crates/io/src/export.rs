// Table export
//
// Two shapes: a map keyed by sheet uid with the full grid content, and a
// flat list of { name, data } with the header row first.

use std::collections::BTreeMap;

use serde::Serialize;
use sheetmem_engine::{Piece, SheetBook, SheetView};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedTable {
    pub uid: u64,
    pub name: String,
    /// Header row followed by data rows, row-header column excluded.
    pub content: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedTable {
    pub name: String,
    pub data: Vec<Vec<String>>,
}

fn content(view: &SheetView<'_>) -> Vec<Vec<String>> {
    view.to_strings()
        .into_iter()
        .map(|mut row| {
            if !row.is_empty() {
                row.remove(0);
            }
            row
        })
        .collect()
}

/// Enabled sheets at `piece`, keyed by uid.
pub fn export_tables(book: &SheetBook, piece: Option<&Piece>) -> BTreeMap<String, ExportedTable> {
    book.views_at(piece)
        .iter()
        .map(|view| {
            let uid = view.uid().0;
            (
                uid.to_string(),
                ExportedTable { uid, name: view.name().to_string(), content: content(view) },
            )
        })
        .collect()
}

/// Enabled sheets at `piece` in book order.
pub fn list_tables(book: &SheetBook, piece: Option<&Piece>) -> Vec<ListedTable> {
    book.views_at(piece)
        .iter()
        .map(|view| ListedTable { name: view.name().to_string(), data: content(view) })
        .collect()
}

/// [`export_tables`] as pretty JSON.
pub fn export_json(book: &SheetBook, piece: Option<&Piece>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&export_tables(book, piece))
}
