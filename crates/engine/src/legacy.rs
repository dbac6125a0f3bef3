//! Conversion from the flat table format older chats stored.

use serde::{Deserialize, Serialize};

use crate::book::SheetBook;
use crate::cell::CellValue;
use crate::sheet::{SheetDomain, SheetKind, SheetPrompts, SheetTemplate, SheetUid};

/// A table as older chats stored it: headers plus rows of strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegacyTable {
    pub table_name: String,
    pub columns: Vec<String>,
    pub content: Vec<Vec<String>>,
    #[serde(default = "default_enable")]
    pub enable: bool,
    #[serde(rename = "Required")]
    pub required: bool,
    pub note: String,
    pub init_node: String,
    pub insert_node: String,
    pub update_node: String,
    pub delete_node: String,
}

fn default_enable() -> bool {
    true
}

impl LegacyTable {
    fn template(&self) -> SheetTemplate {
        SheetTemplate {
            name: self.table_name.clone(),
            columns: self.columns.clone(),
            domain: SheetDomain::Chat,
            kind: SheetKind::Dynamic,
            enabled: self.enable,
            required: self.required,
            send_to_context: true,
            prompts: SheetPrompts {
                note: self.note.clone(),
                init: self.init_node.clone(),
                insert: self.insert_node.clone(),
                update: self.update_node.clone(),
                delete: self.delete_node.clone(),
            },
        }
    }

    fn rows(&self) -> Vec<Vec<CellValue>> {
        self.content
            .iter()
            .map(|row| row.iter().map(|v| CellValue::from_text(v.as_str())).collect())
            .collect()
    }
}

/// Load legacy tables into the book's working grids. A sheet with the same
/// name is rebuilt in place; otherwise a new sheet is created. Returns the
/// affected sheets in input order. The caller persists them.
pub fn convert_legacy_tables(book: &mut SheetBook, tables: &[LegacyTable]) -> Vec<SheetUid> {
    let mut uids = Vec::with_capacity(tables.len());
    for table in tables {
        let rows = table.rows();
        let uid = match book.sheet_by_name_mut(&table.table_name) {
            Some(sheet) => {
                log::info!("legacy table {:?} updates existing sheet", table.table_name);
                sheet.rebuild_from_values(Some(&table.columns), &rows);
                sheet.uid
            }
            None => {
                let uid = book.add_sheet(&table.template());
                if let Some(sheet) = book.sheet_mut(uid) {
                    sheet.rebuild_from_values(None, &rows);
                }
                uid
            }
        };
        uids.push(uid);
    }
    uids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{data_rows, edit_text};
    use crate::chat::MemoryChat;
    use crate::turn::{EditOptions, Orchestrator};
    use pretty_assertions::assert_eq;

    const LEGACY: &str = r#"[
        {"tableName": "People", "columns": ["Name", "Age"], "content": [["Ann", "30"], ["Bob", ""]],
         "enable": true, "Required": true, "note": "who is who", "insertNode": "add people"},
        {"tableName": "Places", "columns": ["Place"], "content": [["Rome"]]}
    ]"#;

    #[test]
    fn test_deserialize_legacy_names() {
        let tables: Vec<LegacyTable> = serde_json::from_str(LEGACY).unwrap();
        assert!(tables[0].required);
        assert!(tables[1].enable);
        assert_eq!(tables[0].insert_node, "add people");
    }

    #[test]
    fn test_converts_new_and_existing_sheets() {
        let tables: Vec<LegacyTable> = serde_json::from_str(LEGACY).unwrap();
        let mut book = SheetBook::from_templates(&[SheetTemplate::new("Places", &["Place"])]);
        let uids = convert_legacy_tables(&mut book, &tables);

        assert_eq!(book.len(), 2);
        assert_eq!(uids, vec![SheetUid(2), SheetUid(1)]);
        let people = book.sheet(SheetUid(2)).unwrap();
        assert_eq!(people.prompts.note, "who is who");
        assert_eq!(people.kind, SheetKind::Dynamic);
        assert_eq!(people.view().headers(), vec!["Name", "Age"]);
        assert_eq!(book.sheet(SheetUid(1)).unwrap().data_row_count(), 1);
    }

    #[test]
    fn test_converted_tables_persist_into_latest_turn() {
        let tables: Vec<LegacyTable> = serde_json::from_str(LEGACY).unwrap();
        let mut book = SheetBook::new();
        let mut chat = MemoryChat::new();
        chat.push_ai(edit_text(""));
        convert_legacy_tables(&mut book, &tables);

        let mut orch = Orchestrator::new(EditOptions::default());
        orch.persist_live(&mut book, &mut chat).unwrap();
        let piece = chat.turns[0].piece.clone();
        assert_eq!(data_rows(&book, piece.as_ref(), 0), vec![vec!["Ann", "30"], vec!["Bob", ""]]);
        assert_eq!(data_rows(&book, piece.as_ref(), 1), vec![vec!["Rome"]]);
    }
}
