use serde::{Deserialize, Serialize};

use crate::cell_id::CellPos;
use crate::sheet::SheetUid;

/// Identifier of one immutable cell record.
///
/// A write never changes an existing record; it mints a new record with a
/// fresh uid and points the grid at it. Old uids stay resolvable so earlier
/// snapshots keep their values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellUid(pub u64);

impl std::fmt::Display for CellUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Role of a cell, derived from its grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Top-left corner.
    Origin,
    ColumnHeader,
    RowHeader,
    Data,
}

impl CellKind {
    pub fn at(pos: CellPos) -> Self {
        match (pos.row.0, pos.col.0) {
            (0, 0) => CellKind::Origin,
            (0, _) => CellKind::ColumnHeader,
            (_, 0) => CellKind::RowHeader,
            _ => CellKind::Data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Interpret user input: blank is empty, numeric text is a number.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if let Ok(num) = trimmed.parse::<f64>() {
            if num.is_finite() {
                return CellValue::Number(num);
            }
        }

        CellValue::Text(trimmed.to_string())
    }

    /// Keep text verbatim; only the empty string maps to `Empty`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn raw_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }

    /// Bytes fed into uid minting. Distinguishes `Number(1)` from `Text("1")`.
    pub(crate) fn fingerprint(&self) -> Vec<u8> {
        match self {
            CellValue::Empty => vec![0],
            CellValue::Number(n) => {
                let mut out = vec![1];
                out.extend_from_slice(&n.to_bits().to_le_bytes());
                out
            }
            CellValue::Text(s) => {
                let mut out = vec![2];
                out.extend_from_slice(s.as_bytes());
                out
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::from_text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One immutable cell record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub uid: CellUid,
    pub sheet: SheetUid,
    pub kind: CellKind,
    #[serde(default)]
    pub value: CellValue,
}
