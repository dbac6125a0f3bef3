//! Staged full-table rebuilds.
//!
//! A rebuild replaces whole sheets with tables regenerated by a model. The
//! model's reply is parsed into a [`RebuildPlan`] first; nothing is written
//! until the plan is handed to
//! [`Orchestrator::commit_rebuild`](crate::turn::Orchestrator::commit_rebuild).
//! Dropping a plan cancels the rebuild.

use serde::Deserialize;
use serde_json::Value;

use crate::book::SheetBook;
use crate::cell::CellValue;
use crate::error::EngineError;
use crate::sheet::SheetUid;

/// One regenerated table.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuiltTable {
    pub table_uid: Option<u64>,
    pub table_index: Option<usize>,
    pub table_name: Option<String>,
    /// Column headers; empty keeps the sheet's current headers.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildPlan {
    pub tables: Vec<RebuiltTable>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTable {
    #[serde(default)]
    table_uid: Option<Value>,
    #[serde(default)]
    table_index: Option<usize>,
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    columns: Vec<Value>,
    #[serde(default)]
    content: Vec<Vec<Value>>,
}

impl RebuildPlan {
    /// Parse a model reply. Accepts an array of tables or an array of such
    /// arrays (the last wins), optionally inside a code fence or after
    /// leading prose.
    pub fn parse(reply: &str) -> Result<Self, EngineError> {
        let json = strip_fence(reply);
        let value: Value = serde_json::from_str(json)
            .map_err(|e| EngineError::Rebuild(format!("reply is not JSON: {}", e)))?;

        let tables = match value {
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_array) => {
                items.into_iter().last().unwrap_or(Value::Null)
            }
            other => other,
        };
        let raw: Vec<RawTable> = serde_json::from_value(tables)
            .map_err(|e| EngineError::Rebuild(format!("reply is not a list of tables: {}", e)))?;

        let tables = raw.into_iter().map(RebuiltTable::from).collect();
        Ok(Self { tables })
    }

    /// Match each table to an enabled sheet: by uid, else by `tableIndex`,
    /// else by position. Tables matching nothing are skipped. Fails if no
    /// table matches.
    pub fn resolve(&self, book: &SheetBook, enabled: &[SheetUid]) -> Result<Vec<(SheetUid, &RebuiltTable)>, EngineError> {
        let mut resolved = Vec::new();
        for (position, table) in self.tables.iter().enumerate() {
            let uid = match (table.table_uid, table.table_index) {
                (Some(uid), _) => enabled.iter().copied().find(|u| u.0 == uid),
                (None, Some(index)) => enabled.get(index).copied(),
                (None, None) => enabled.get(position).copied(),
            };
            match uid.filter(|u| book.sheet(*u).is_some()) {
                Some(uid) => resolved.push((uid, table)),
                None => log::warn!(
                    "rebuilt table {:?} matches no enabled sheet",
                    table.table_name.as_deref().unwrap_or("?")
                ),
            }
        }
        if resolved.is_empty() {
            return Err(EngineError::Rebuild("no table matches an enabled sheet".into()));
        }
        Ok(resolved)
    }
}

impl From<RawTable> for RebuiltTable {
    fn from(raw: RawTable) -> Self {
        let table_uid = raw.table_uid.and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        Self {
            table_uid,
            table_index: raw.table_index,
            table_name: raw.table_name,
            columns: raw.columns.iter().map(|v| json_to_value(v).raw_display()).collect(),
            rows: raw
                .content
                .iter()
                .map(|row| row.iter().map(json_to_value).collect())
                .collect(),
        }
    }
}

fn json_to_value(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        Value::String(s) => CellValue::from_text(s.as_str()),
        other => CellValue::Text(other.to_string()),
    }
}

fn strip_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let body = match trimmed.find("```") {
        Some(start) => {
            let after = &trimmed[start + 3..];
            let after = after.find('\n').map(|i| &after[i + 1..]).unwrap_or(after);
            after.find("```").map(|end| &after[..end]).unwrap_or(after)
        }
        None => trimmed,
    };
    let body = body.trim();
    match body.find('[') {
        Some(start) => &body[start..],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatStore;
    use crate::harness::TurnHarness;
    use crate::sheet::SheetTemplate;
    use pretty_assertions::assert_eq;

    fn harness() -> TurnHarness {
        let mut h = TurnHarness::new(&[
            SheetTemplate::new("People", &["Name", "Age"]),
            SheetTemplate::new("Places", &["Place"]),
        ]);
        h.ai(r#"insertRow(0, {0:"Ann", 1:"30"})"#).unwrap();
        h
    }

    #[test]
    fn test_parse_plain_and_nested() {
        let plain = r#"[{"tableIndex": 0, "tableName": "People", "columns": ["Name", "Age"], "content": [["Bob", 41]]}]"#;
        let plan = RebuildPlan::parse(plain).unwrap();
        assert_eq!(plan.tables[0].rows, vec![vec![CellValue::from("Bob"), CellValue::Number(41.0)]]);

        let nested = format!("[[], {}]", plain);
        assert_eq!(RebuildPlan::parse(&nested).unwrap(), plan);
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "Here you go:\n```json\n[{\"tableUid\": \"2\", \"columns\": [], \"content\": [[\"Rome\"]]}]\n```";
        let plan = RebuildPlan::parse(reply).unwrap();
        assert_eq!(plan.tables[0].table_uid, Some(2));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(RebuildPlan::parse("no tables today"), Err(EngineError::Rebuild(_))));
        assert!(matches!(RebuildPlan::parse(r#"{"a": 1}"#), Err(EngineError::Rebuild(_))));
    }

    #[test]
    fn test_commit_rewrites_matched_sheets() {
        let mut h = harness();
        let plan = RebuildPlan::parse(
            r#"[{"tableIndex": 0, "columns": ["Name", "Age"], "content": [["Bob", 41], ["", ""], ["Cy", null]]}]"#,
        )
        .unwrap();
        let report = h.orch.commit_rebuild(&mut h.book, &mut h.chat, plan).unwrap();
        assert!(report.changed);
        assert_eq!(h.rows(0), vec![vec!["Bob", "41"], vec!["Cy", ""]]);
        assert!(h.rows(1).is_empty());
    }

    #[test]
    fn test_dropped_plan_changes_nothing() {
        let h = harness();
        let before = h.latest_piece();
        let saves = h.chat.saves();
        {
            let _plan = RebuildPlan::parse(r#"[{"content": [["Zed"]]}]"#).unwrap();
            // cancelled: never committed
        }
        assert_eq!(h.latest_piece(), before);
        assert_eq!(h.chat.saves(), saves);
        assert_eq!(h.rows(0), vec![vec!["Ann", "30"]]);
    }

    #[test]
    fn test_unmatched_plan_is_rejected_without_writes() {
        let mut h = harness();
        let before = h.latest_piece();
        let plan = RebuildPlan::parse(r#"[{"tableUid": 99, "content": [["Zed"]]}]"#).unwrap();
        let err = h.orch.commit_rebuild(&mut h.book, &mut h.chat, plan).unwrap_err();
        assert!(matches!(err, EngineError::Rebuild(_)));
        assert_eq!(h.latest_piece(), before);
        assert_eq!(h.chat.latest_piece_index(), Some(0));
    }
}
