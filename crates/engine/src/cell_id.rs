//! Cell addressing.
//!
//! Two index spaces exist for every sheet. Grid indices address the full
//! grid, where row 0 holds the column headers and column 0 holds the row
//! headers. Data indices are what an edit command speaks: data row 0 is grid
//! row 1, data column 0 is grid column 1. Keeping them as distinct types
//! makes the +1 offset explicit at every crossing.

use serde::{Deserialize, Serialize};

/// Row index into the full grid (row 0 is the header row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridRow(pub usize);

/// Column index into the full grid (column 0 is the row-header column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridCol(pub usize);

/// Row index as used by edit commands (excludes the header row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRow(pub usize);

/// Column index as used by edit commands (excludes the row-header column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataCol(pub usize);

impl DataRow {
    #[inline]
    pub fn to_grid(self) -> GridRow {
        GridRow(self.0.saturating_add(1))
    }
}

impl DataCol {
    #[inline]
    pub fn to_grid(self) -> GridCol {
        GridCol(self.0.saturating_add(1))
    }
}

impl GridRow {
    /// Data row for this grid row, `None` for the header row.
    pub fn to_data(self) -> Option<DataRow> {
        self.0.checked_sub(1).map(DataRow)
    }
}

impl GridCol {
    pub fn to_data(self) -> Option<DataCol> {
        self.0.checked_sub(1).map(DataCol)
    }
}

/// A position in a sheet's grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellPos {
    pub row: GridRow,
    pub col: GridCol,
}

impl CellPos {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row: GridRow(row), col: GridCol(col) }
    }

    /// Parse an A1-style address ("A1" is grid row 0, grid column 0).
    pub fn parse_a1(addr: &str) -> Option<Self> {
        let addr = addr.trim();
        let split = addr.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = addr.split_at(split);
        if letters.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let col = letters_to_col(letters)?;
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, col))
    }
}

impl std::fmt::Display for CellPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col.0), self.row.0 + 1)
    }
}

/// Convert 0-based column index to Excel-style letter(s).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Inverse of [`col_to_letters`]. Accepts either case.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    let mut col: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    col.checked_sub(1)
}
