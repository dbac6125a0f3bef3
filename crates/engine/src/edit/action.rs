use super::parser::{ParsedCall, Token};
use super::{Diagnostic, EditAction, EditOp};
use crate::cell_id::DataRow;

/// Classify a call's tokens by type: the first number is the sheet index,
/// the second number is the row index, the first mapping is the row data.
/// String tokens are ignored.
pub fn build_action(call: &ParsedCall) -> Result<EditAction, Diagnostic> {
    let mut numbers = call.tokens.iter().filter_map(|t| match t {
        Token::Number(n) => Some(*n),
        _ => None,
    });
    let sheet_index = numbers.next();
    let row = numbers.next().map(DataRow);
    let data = call.tokens.iter().find_map(|t| match t {
        Token::Mapping(m) => Some(m.clone()),
        _ => None,
    });

    let malformed = |reason: &str| Diagnostic::MalformedCall {
        call: call.source.clone(),
        reason: reason.to_string(),
    };

    let sheet_index = sheet_index.ok_or_else(|| malformed("missing sheet index"))?;

    let (row, data) = match call.op {
        EditOp::Insert => {
            let data = data.ok_or_else(|| malformed("missing row data"))?;
            (None, Some(data))
        }
        EditOp::Update => {
            let row = row.ok_or_else(|| malformed("missing row index"))?;
            let data = data.ok_or_else(|| malformed("missing row data"))?;
            (Some(row), Some(data))
        }
        EditOp::Delete => {
            let row = row.ok_or_else(|| malformed("missing row index"))?;
            (Some(row), None)
        }
    };

    Ok(EditAction { op: call.op, sheet_index, row, data, offset: call.offset })
}

/// Build actions for every call, collecting a diagnostic for each call that
/// could not be classified.
pub fn build_actions(calls: &[ParsedCall]) -> (Vec<EditAction>, Vec<Diagnostic>) {
    let mut actions = Vec::with_capacity(calls.len());
    let mut diagnostics = Vec::new();
    for call in calls {
        match build_action(call) {
            Ok(action) => actions.push(action),
            Err(diagnostic) => {
                log::warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
            }
        }
    }
    (actions, diagnostics)
}
