//! `{{GET::Table Name:B2}}` cell lookups in message text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::book::SheetBook;
use crate::cell_id::CellPos;

static GET_MACRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{GET::\s*([^:}]+?)\s*:\s*([A-Za-z]+\d+)\s*\}\}").expect("macro pattern is valid")
});

/// Replace every `{{GET::Table:A1}}` with the value at that address in the
/// live sheet of that name. A1 addresses the full grid, so `B2` is the first
/// data row's first data column.
pub fn resolve_table_macros(text: &str, book: &SheetBook) -> String {
    if !text.contains("{{GET::") {
        return text.to_string();
    }

    GET_MACRO
        .replace_all(text, |caps: &Captures| {
            let table = caps[1].trim();
            let address = &caps[2];
            let Some(sheet) = book.sheets().iter().find(|s| s.name.trim() == table) else {
                return format!("[GET: table \"{}\" not found]", table);
            };
            match CellPos::parse_a1(address).and_then(|pos| sheet.view().value(pos)) {
                Some(value) => value.raw_display(),
                None => format!("[GET: cell \"{}\" not found in \"{}\"]", address, table),
            }
        })
        .into_owned()
}
