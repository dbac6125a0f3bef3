//! Structural snapshots of sheet grids.
//!
//! A grid is a matrix of cell uids. Because cell records are immutable, the
//! uid matrix fully determines a sheet's content, so hashing it gives a
//! content address for the whole state. Every persisted state lives in a
//! [`SnapshotStore`] keyed by that hash; turns only hold hashes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::cell::CellUid;
use crate::sheet::SheetUid;

/// Matrix of cell uids. Row 0 is the header row; every row has the same
/// length as row 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    pub rows: Vec<Vec<CellUid>>,
}

impl Grid {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<CellUid> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn hash(&self) -> StructuralHash {
        let mut hasher = Sha256::new();
        hasher.update((self.rows.len() as u64).to_le_bytes());
        for row in &self.rows {
            hasher.update((row.len() as u64).to_le_bytes());
            for uid in row {
                hasher.update(uid.0.to_le_bytes());
            }
        }
        StructuralHash(hasher.finalize().into())
    }
}

/// SHA-256 over a grid's dimensions and cell uids.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StructuralHash(pub [u8; 32]);

impl StructuralHash {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 64 || !s.is_ascii() {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(out))
    }

    /// First 12 hex digits, for logs and CLI output.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Debug for StructuralHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructuralHash({})", self.short())
    }
}

impl fmt::Display for StructuralHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for StructuralHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for StructuralHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        StructuralHash::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid structural hash: {}", s)))
    }
}

/// Content-addressed store of grids for one sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotStore {
    grids: BTreeMap<StructuralHash, Grid>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a grid under its hash. Returns the hash and whether the grid
    /// was not already present.
    pub fn intern(&mut self, grid: &Grid) -> (StructuralHash, bool) {
        let hash = grid.hash();
        if self.grids.contains_key(&hash) {
            return (hash, false);
        }
        self.grids.insert(hash, grid.clone());
        (hash, true)
    }

    pub fn get(&self, hash: &StructuralHash) -> Option<&Grid> {
        self.grids.get(hash)
    }

    pub fn contains(&self, hash: &StructuralHash) -> bool {
        self.grids.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

/// Per-turn persisted record: sheet uid to the hash of its state at the end
/// of that turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub sheets: BTreeMap<SheetUid, StructuralHash>,
}

impl Piece {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sheet: SheetUid) -> Option<StructuralHash> {
        self.sheets.get(&sheet).copied()
    }

    pub fn set(&mut self, sheet: SheetUid, hash: StructuralHash) {
        self.sheets.insert(sheet, hash);
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }
}
