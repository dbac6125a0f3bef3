//! Render actions back into edit text.

use super::extract::edit_region_ranges;
use super::{EditAction, RowData};
use crate::cell::CellValue;

impl EditAction {
    /// The call as a model would write it.
    pub fn to_call(&self) -> String {
        let name = self.op.call_name();
        let mut args = vec![self.sheet_index.to_string()];
        if let Some(row) = self.row {
            args.push(row.0.to_string());
        }
        if let Some(data) = &self.data {
            args.push(render_row_data(data));
        }
        format!("{}({})", name, args.join(", "))
    }
}

fn render_row_data(data: &RowData) -> String {
    let entries: Vec<String> = data
        .iter()
        .map(|(col, value)| format!("{}: {}", col.0, render_value(value)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn render_value(value: &CellValue) -> String {
    match value {
        CellValue::Empty => "\"\"".to_string(),
        CellValue::Number(_) => value.raw_display(),
        CellValue::Text(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
    }
}

/// Body of an edit region holding `actions`, wrapped in a comment.
pub fn render_edit_region(actions: &[EditAction]) -> String {
    let mut out = String::from("\n<!--\n");
    for action in actions {
        out.push_str(&action.to_call());
        out.push('\n');
    }
    out.push_str("-->\n");
    out
}

/// Replace the body of every edit region in `text` with `body`. When the text
/// has no region, one is appended.
pub fn replace_edit_region(text: &str, tag: &str, body: &str) -> String {
    let ranges = edit_region_ranges(text, tag);
    if ranges.is_empty() {
        return format!("{}\n<{}>{}</{}>", text, tag, body, tag);
    }

    let mut out = String::with_capacity(text.len() + body.len());
    let mut pos = 0;
    for (start, end) in ranges {
        out.push_str(&text[pos..start]);
        out.push_str(&format!("<{}>{}</{}>", tag, body, tag));
        pos = end;
    }
    out.push_str(&text[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell_id::DataCol;
    use crate::edit::{build_actions, extract_edit_spans, parse_calls, strip_comment_markers};
    use pretty_assertions::assert_eq;

    fn data(pairs: &[(usize, CellValue)]) -> RowData {
        pairs.iter().cloned().map(|(c, v)| (DataCol(c), v)).collect()
    }

    #[test]
    fn test_to_call() {
        let insert = EditAction::insert(0, data(&[(0, "Day1".into()), (1, CellValue::Number(3.0))]));
        assert_eq!(insert.to_call(), r#"insertRow(0, {0: "Day1", 1: 3})"#);
        assert_eq!(EditAction::delete(1, 2).to_call(), "deleteRow(1, 2)");
        let update = EditAction::update(0, 4, data(&[(2, r#"say "hi""#.into())]));
        assert_eq!(update.to_call(), r#"updateRow(0, 4, {2: "say \"hi\""})"#);
    }

    #[test]
    fn test_rendered_region_parses_back() {
        let actions = vec![
            EditAction::update(0, 1, data(&[(0, "a, b".into())])),
            EditAction::delete(0, 3),
        ];
        let text = format!("<tableEdit>{}</tableEdit>", render_edit_region(&actions));
        let spans = extract_edit_spans(&text, "tableEdit");
        let (inner, wrapped) = strip_comment_markers(&spans[0]);
        assert!(wrapped);
        let (calls, diags) = parse_calls(inner, 0);
        assert!(diags.is_empty());
        let (parsed, _) = build_actions(&calls);
        let parsed: Vec<_> = parsed.into_iter().map(|mut a| { a.offset = 0; a }).collect();
        assert_eq!(parsed, actions);
    }

    #[test]
    fn test_replace_existing_region() {
        let text = "Reply.<t>old</t> tail";
        assert_eq!(replace_edit_region(text, "t", "new"), "Reply.<t>new</t> tail");
    }

    #[test]
    fn test_replace_appends_when_missing() {
        assert_eq!(replace_edit_region("Reply.", "t", "x"), "Reply.\n<t>x</t>");
    }
}
