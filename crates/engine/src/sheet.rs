use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cell::{Cell, CellKind, CellUid, CellValue};
use crate::cell_id::{CellPos, DataCol, GridRow};
use crate::edit::EditOp;
use crate::snapshot::{Grid, SnapshotStore, StructuralHash};

/// Stable sheet identifier, never reused within a book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetUid(pub u64);

impl std::fmt::Display for SheetUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sheet:{}", self.0)
    }
}

/// Which edit operations a sheet accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    /// Rows may be inserted, updated and deleted.
    #[default]
    Dynamic,
    /// Row set is fixed; only updates apply.
    Fixed,
    /// Read-only for edit commands.
    Static,
}

impl SheetKind {
    pub fn permits(self, op: EditOp) -> bool {
        match self {
            SheetKind::Dynamic => true,
            SheetKind::Fixed => op == EditOp::Update,
            SheetKind::Static => false,
        }
    }
}

/// Scope a sheet template belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetDomain {
    Global,
    Role,
    #[default]
    Chat,
}

/// Per-sheet instructions rendered next to the table in prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetPrompts {
    pub note: String,
    pub init: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
}

impl SheetPrompts {
    pub fn is_empty(&self) -> bool {
        self.note.is_empty()
            && self.init.is_empty()
            && self.insert.is_empty()
            && self.update.is_empty()
            && self.delete.is_empty()
    }
}

/// Blueprint a sheet is created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetTemplate {
    pub name: String,
    pub columns: Vec<String>,
    pub domain: SheetDomain,
    pub kind: SheetKind,
    pub enabled: bool,
    pub required: bool,
    pub send_to_context: bool,
    pub prompts: SheetPrompts,
}

impl Default for SheetTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            columns: Vec::new(),
            domain: SheetDomain::default(),
            kind: SheetKind::default(),
            enabled: true,
            required: false,
            send_to_context: true,
            prompts: SheetPrompts::default(),
        }
    }
}

impl SheetTemplate {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }
}

/// A sheet: metadata, the append-only history of its cell records, every
/// persisted state, and the working grid edits are applied to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub uid: SheetUid,
    pub name: String,
    pub domain: SheetDomain,
    pub kind: SheetKind,
    pub enabled: bool,
    pub required: bool,
    pub send_to_context: bool,
    #[serde(default)]
    pub prompts: SheetPrompts,
    cells: BTreeMap<CellUid, Cell>,
    snapshots: SnapshotStore,
    base: StructuralHash,
    grid: Grid,
    /// Hash of the grid the current edit batch started from. Seeds uid minting.
    #[serde(skip)]
    edit_base: StructuralHash,
    #[serde(skip)]
    edit_seq: u64,
}

impl Sheet {
    /// Create a sheet holding only its header row, and store that state as
    /// the sheet's base state.
    pub fn new(uid: SheetUid, template: &SheetTemplate) -> Self {
        let mut sheet = Self {
            uid,
            name: template.name.clone(),
            domain: template.domain,
            kind: template.kind,
            enabled: template.enabled,
            required: template.required,
            send_to_context: template.send_to_context,
            prompts: template.prompts.clone(),
            cells: BTreeMap::new(),
            snapshots: SnapshotStore::new(),
            base: StructuralHash::default(),
            grid: Grid::default(),
            edit_base: StructuralHash::default(),
            edit_seq: 0,
        };

        let mut header = Vec::with_capacity(template.columns.len() + 1);
        header.push(sheet.mint(CellPos::new(0, 0), CellValue::Empty));
        for (i, name) in template.columns.iter().enumerate() {
            header.push(sheet.mint(CellPos::new(0, i + 1), CellValue::from_text(name.as_str())));
        }
        sheet.grid.rows.push(header);

        let (base, _) = sheet.persist();
        sheet.base = base;
        sheet.begin_batch();
        sheet
    }

    /// Hash of the header-only state the sheet was created with.
    pub fn base_hash(&self) -> StructuralHash {
        self.base
    }

    /// Hash of the working grid.
    pub fn current_hash(&self) -> StructuralHash {
        self.grid.hash()
    }

    pub fn row_count(&self) -> usize {
        self.grid.row_count()
    }

    pub fn col_count(&self) -> usize {
        self.grid.col_count()
    }

    /// Rows excluding the header row.
    pub fn data_row_count(&self) -> usize {
        self.grid.row_count().saturating_sub(1)
    }

    pub fn history_len(&self) -> usize {
        self.cells.len()
    }

    pub fn record(&self, uid: CellUid) -> Option<&Cell> {
        self.cells.get(&uid)
    }

    pub fn has_state(&self, hash: &StructuralHash) -> bool {
        self.snapshots.contains(hash)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Read access to the working grid.
    pub fn view(&self) -> SheetView<'_> {
        SheetView { sheet: self, grid: &self.grid }
    }

    /// Read access to a persisted state without touching the working grid.
    pub fn view_state(&self, hash: &StructuralHash) -> Option<SheetView<'_>> {
        self.snapshots.get(hash).map(|grid| SheetView { sheet: self, grid })
    }

    /// Replace the working grid with a persisted state. Returns false if the
    /// hash is unknown to this sheet, leaving the working grid untouched.
    pub fn load_state(&mut self, hash: &StructuralHash) -> bool {
        let Some(grid) = self.snapshots.get(hash) else {
            return false;
        };
        self.grid = grid.clone();
        self.begin_batch();
        true
    }

    /// Store the working grid as a state. Returns its hash and whether the
    /// state is new.
    pub fn persist(&mut self) -> (StructuralHash, bool) {
        self.snapshots.intern(&self.grid)
    }

    /// Start a new edit batch from the working grid. Uids minted in a batch
    /// are a pure function of the starting grid and the edits applied.
    pub fn begin_batch(&mut self) {
        self.edit_base = self.grid.hash();
        self.edit_seq = 0;
    }

    fn mint(&mut self, pos: CellPos, value: CellValue) -> CellUid {
        let kind = CellKind::at(pos);
        loop {
            let mut hasher = Sha256::new();
            hasher.update(self.uid.0.to_le_bytes());
            hasher.update(self.edit_base.0);
            hasher.update(self.edit_seq.to_le_bytes());
            hasher.update((pos.row.0 as u64).to_le_bytes());
            hasher.update((pos.col.0 as u64).to_le_bytes());
            hasher.update(value.fingerprint());
            let digest = hasher.finalize();
            self.edit_seq += 1;

            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            let uid = CellUid(u64::from_le_bytes(bytes));

            match self.cells.get(&uid) {
                // Same inputs minted before (a replayed batch): reuse the record.
                Some(existing) if existing.kind == kind && existing.value == value => return uid,
                Some(_) => continue,
                None => {
                    self.cells.insert(uid, Cell { uid, sheet: self.uid, kind, value });
                    return uid;
                }
            }
        }
    }

    /// Write a value into the working grid. Returns false if the position is
    /// outside the grid. Writing the value a cell already holds is a no-op.
    pub fn set_value(&mut self, pos: CellPos, value: CellValue) -> bool {
        let Some(current) = self.grid.get(pos.row.0, pos.col.0) else {
            return false;
        };
        if self.cells.get(&current).map(|c| &c.value) == Some(&value) {
            return true;
        }
        let uid = self.mint(pos, value);
        self.grid.rows[pos.row.0][pos.col.0] = uid;
        true
    }

    /// Append a data row. Columns missing from `data` are left empty; columns
    /// past the grid are ignored. Returns the grid row of the new row.
    pub fn append_row(&mut self, data: &BTreeMap<DataCol, CellValue>) -> GridRow {
        let row = self.grid.row_count();
        let cols = self.grid.col_count().max(1);
        let mut uids = Vec::with_capacity(cols);
        uids.push(self.mint(CellPos::new(row, 0), CellValue::Empty));
        for col in 1..cols {
            let value = data.get(&DataCol(col - 1)).cloned().unwrap_or_default();
            uids.push(self.mint(CellPos::new(row, col), value));
        }
        self.grid.rows.push(uids);
        GridRow(row)
    }

    /// Remove a row from the working grid. The header row cannot be removed.
    pub fn remove_row(&mut self, row: GridRow) -> bool {
        if row.0 == 0 || row.0 >= self.grid.row_count() {
            return false;
        }
        self.grid.rows.remove(row.0);
        true
    }

    /// Replace the working grid's content. Header cells whose text is
    /// unchanged keep their records. Rows are padded or cut to the column
    /// count.
    pub fn rebuild_from_values(&mut self, headers: Option<&[String]>, rows: &[Vec<CellValue>]) {
        let current: Vec<String> = self.view().headers();
        let headers: Vec<String> = match headers {
            Some(h) if !h.is_empty() => h.to_vec(),
            _ => current.clone(),
        };

        let mut header_row = Vec::with_capacity(headers.len() + 1);
        header_row.push(self.grid.get(0, 0).unwrap_or_else(|| self.mint(CellPos::new(0, 0), CellValue::Empty)));
        for (i, name) in headers.iter().enumerate() {
            let uid = match self.grid.get(0, i + 1) {
                Some(uid) if current.get(i) == Some(name) => uid,
                _ => self.mint(CellPos::new(0, i + 1), CellValue::from_text(name.as_str())),
            };
            header_row.push(uid);
        }

        let mut grid = Grid { rows: vec![header_row] };
        for (r, values) in rows.iter().enumerate() {
            let row = r + 1;
            let mut uids = Vec::with_capacity(headers.len() + 1);
            uids.push(self.mint(CellPos::new(row, 0), CellValue::Empty));
            for col in 0..headers.len() {
                let value = values.get(col).cloned().unwrap_or_default();
                uids.push(self.mint(CellPos::new(row, col + 1), value));
            }
            grid.rows.push(uids);
        }
        self.grid = grid;
    }

    /// Drop data rows whose data cells are all empty. Returns how many were
    /// removed.
    pub fn clear_empty_rows(&mut self) -> usize {
        let before = self.grid.row_count();
        let cells = &self.cells;
        let mut index = 0;
        self.grid.rows.retain(|row| {
            let keep = index == 0
                || row
                    .iter()
                    .skip(1)
                    .any(|uid| cells.get(uid).map(|c| !c.value.is_empty()).unwrap_or(false));
            index += 1;
            keep
        });
        before - self.grid.row_count()
    }
}

/// A sheet's metadata paired with one of its grids.
#[derive(Clone, Copy)]
pub struct SheetView<'a> {
    sheet: &'a Sheet,
    grid: &'a Grid,
}

impl<'a> SheetView<'a> {
    pub fn sheet(&self) -> &'a Sheet {
        self.sheet
    }

    pub fn uid(&self) -> SheetUid {
        self.sheet.uid
    }

    pub fn name(&self) -> &'a str {
        &self.sheet.name
    }

    pub fn hash(&self) -> StructuralHash {
        self.grid.hash()
    }

    pub fn row_count(&self) -> usize {
        self.grid.row_count()
    }

    pub fn col_count(&self) -> usize {
        self.grid.col_count()
    }

    pub fn data_row_count(&self) -> usize {
        self.grid.row_count().saturating_sub(1)
    }

    pub fn cell(&self, pos: CellPos) -> Option<&'a Cell> {
        let uid = self.grid.get(pos.row.0, pos.col.0)?;
        self.sheet.cells.get(&uid)
    }

    pub fn value(&self, pos: CellPos) -> Option<&'a CellValue> {
        self.cell(pos).map(|c| &c.value)
    }

    /// Display text of a cell, empty when out of range.
    pub fn display(&self, pos: CellPos) -> String {
        self.value(pos).map(|v| v.raw_display()).unwrap_or_default()
    }

    /// Column header texts, excluding the origin cell.
    pub fn headers(&self) -> Vec<String> {
        (1..self.col_count())
            .map(|col| self.display(CellPos::new(0, col)))
            .collect()
    }

    /// Data cell values row by row, excluding headers.
    pub fn data_rows(&self) -> Vec<Vec<CellValue>> {
        (1..self.row_count())
            .map(|row| {
                (1..self.col_count())
                    .map(|col| self.value(CellPos::new(row, col)).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// The whole grid as display strings, header row included.
    pub fn to_strings(&self) -> Vec<Vec<String>> {
        (0..self.row_count())
            .map(|row| (0..self.col_count()).map(|col| self.display(CellPos::new(row, col))).collect())
            .collect()
    }

    /// Uids of the grid, for structural comparisons in tests and replay.
    pub fn uids(&self) -> &'a [Vec<CellUid>] {
        &self.grid.rows
    }
}

impl std::fmt::Debug for SheetView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetView")
            .field("uid", &self.sheet.uid)
            .field("name", &self.sheet.name)
            .field("hash", &self.hash())
            .finish()
    }
}
