//! Edit commands: extraction, parsing, scheduling and execution.
//!
//! An AI turn carries its table edits as function-call text inside a tagged
//! region. The pipeline is:
//!
//! 1. [`extract`] pulls the raw spans out of the turn text.
//! 2. [`parser`] finds the calls in a span and lexes their arguments.
//! 3. [`action`] turns lexed calls into typed [`EditAction`]s.
//! 4. [`schedule`] orders actions so deletes cannot shift later targets.
//! 5. [`execute`] applies each action to a sheet's working grid.
//!
//! Nothing in the pipeline fails the turn. Problems are reported as
//! [`Diagnostic`]s and the offending call is skipped.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::CellValue;
use crate::cell_id::{DataCol, DataRow};
use crate::sheet::SheetUid;

pub mod action;
pub mod execute;
pub mod extract;
pub mod loose;
pub mod parser;
pub mod render;
pub mod schedule;

pub use action::{build_action, build_actions};
pub use execute::{execute, Applied};
pub use extract::{extract_edit_spans, strip_comment_markers};
pub use parser::{parse_calls, ParsedCall, Token};
pub use render::{render_edit_region, replace_edit_region};
pub use schedule::schedule;

/// Column-indexed values of one row, as carried by insert and update calls.
pub type RowData = BTreeMap<DataCol, CellValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOp {
    Insert,
    Update,
    Delete,
}

impl EditOp {
    /// Name of the call in edit text.
    pub fn call_name(self) -> &'static str {
        match self {
            EditOp::Insert => "insertRow",
            EditOp::Update => "updateRow",
            EditOp::Delete => "deleteRow",
        }
    }

    pub fn from_call_name(name: &str) -> Option<Self> {
        match name {
            "insertRow" => Some(EditOp::Insert),
            "updateRow" => Some(EditOp::Update),
            "deleteRow" => Some(EditOp::Delete),
            _ => None,
        }
    }

    /// Execution order: updates, then inserts, then deletes.
    pub fn priority(self) -> u8 {
        match self {
            EditOp::Update => 0,
            EditOp::Insert => 1,
            EditOp::Delete => 2,
        }
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.call_name())
    }
}

/// One typed edit, ready to schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct EditAction {
    pub op: EditOp,
    /// Index into the turn's enabled-sheet list.
    pub sheet_index: usize,
    pub row: Option<DataRow>,
    pub data: Option<RowData>,
    /// Byte offset of the call within the turn's edit text.
    pub offset: usize,
}

impl EditAction {
    pub fn insert(sheet_index: usize, data: RowData) -> Self {
        Self { op: EditOp::Insert, sheet_index, row: None, data: Some(data), offset: 0 }
    }

    pub fn update(sheet_index: usize, row: usize, data: RowData) -> Self {
        Self { op: EditOp::Update, sheet_index, row: Some(DataRow(row)), data: Some(data), offset: 0 }
    }

    pub fn delete(sheet_index: usize, row: usize) -> Self {
        Self { op: EditOp::Delete, sheet_index, row: Some(DataRow(row)), data: None, offset: 0 }
    }
}

/// Non-fatal problem found while processing a turn's edits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A call that could not be turned into an action.
    MalformedCall { call: String, reason: String },
    /// A `{...}` argument the loose parser rejected.
    DroppedMapping { call: String, text: String },
    /// Sheet index outside the enabled-sheet list.
    UnknownSheet { index: usize },
    /// Delete targeting a row the sheet does not have.
    RowOutOfRange { sheet: SheetUid, row: usize },
    /// The sheet's kind does not accept this operation.
    OperationNotPermitted { sheet: SheetUid, op: EditOp },
    /// Edit text not wrapped in `<!-- -->`.
    MissingCommentMarkers,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedCall { call, reason } => {
                write!(f, "malformed call `{}`: {}", truncate(call, 60), reason)
            }
            Diagnostic::DroppedMapping { call, text } => {
                write!(f, "unparseable row data {} in `{}`", truncate(text, 40), truncate(call, 60))
            }
            Diagnostic::UnknownSheet { index } => write!(f, "no enabled sheet at index {}", index),
            Diagnostic::RowOutOfRange { sheet, row } => {
                write!(f, "row {} does not exist in {}", row, sheet)
            }
            Diagnostic::OperationNotPermitted { sheet, op } => {
                write!(f, "{} is not permitted on {}", op, sheet)
            }
            Diagnostic::MissingCommentMarkers => {
                write!(f, "edit text is not wrapped in <!-- -->")
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
