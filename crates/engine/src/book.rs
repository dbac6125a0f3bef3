//! The set of sheets a chat carries.

use serde::{Deserialize, Serialize};

use crate::sheet::{Sheet, SheetTemplate, SheetUid, SheetView};
use crate::snapshot::{Piece, StructuralHash};

/// Sheets in creation order. The enabled subset, in this order, is the list
/// edit commands index into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetBook {
    sheets: Vec<Sheet>,
    next_sheet_uid: u64,
}

impl SheetBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: &[SheetTemplate]) -> Self {
        let mut book = Self::new();
        for template in templates {
            book.add_sheet(template);
        }
        book
    }

    /// Create a sheet from a template. Uids are never reused.
    pub fn add_sheet(&mut self, template: &SheetTemplate) -> SheetUid {
        self.next_sheet_uid += 1;
        let uid = SheetUid(self.next_sheet_uid);
        self.sheets.push(Sheet::new(uid, template));
        uid
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn sheet(&self, uid: SheetUid) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.uid == uid)
    }

    pub fn sheet_mut(&mut self, uid: SheetUid) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.uid == uid)
    }

    /// First sheet with this name (names are not unique).
    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn set_enabled(&mut self, uid: SheetUid, enabled: bool) -> bool {
        match self.sheet_mut(uid) {
            Some(sheet) => {
                sheet.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Uids of enabled sheets, in creation order.
    pub fn enabled_uids(&self) -> Vec<SheetUid> {
        self.sheets.iter().filter(|s| s.enabled).map(|s| s.uid).collect()
    }

    /// Piece mapping every enabled sheet to its base state.
    pub fn base_piece(&self) -> Piece {
        let mut piece = Piece::new();
        for sheet in self.sheets.iter().filter(|s| s.enabled) {
            piece.set(sheet.uid, sheet.base_hash());
        }
        piece
    }

    /// State of a sheet as of `piece`. Sheets the piece does not reference,
    /// or references by a hash the sheet never stored, resolve to their
    /// base state.
    pub fn state_of(&self, piece: Option<&Piece>, uid: SheetUid) -> Option<StructuralHash> {
        let sheet = self.sheet(uid)?;
        let hash = piece
            .and_then(|p| p.get(uid))
            .filter(|h| sheet.has_state(h))
            .unwrap_or_else(|| sheet.base_hash());
        Some(hash)
    }

    /// Load every enabled sheet's working grid from `piece` and return the
    /// enabled-sheet list.
    pub fn load_enabled(&mut self, piece: Option<&Piece>) -> Vec<SheetUid> {
        let uids = self.enabled_uids();
        for &uid in &uids {
            let Some(hash) = self.state_of(piece, uid) else {
                continue;
            };
            if let Some(sheet) = self.sheet_mut(uid) {
                if !sheet.load_state(&hash) {
                    log::warn!("{} has no state {}", uid, hash.short());
                }
            }
        }
        uids
    }

    /// Start a fresh edit batch on every enabled sheet's working grid.
    pub fn begin_batch(&mut self) -> Vec<SheetUid> {
        for sheet in self.sheets.iter_mut().filter(|s| s.enabled) {
            sheet.begin_batch();
        }
        self.enabled_uids()
    }

    /// Store a sheet's working grid. Returns its hash and whether it is new.
    pub fn persist(&mut self, uid: SheetUid) -> Option<(StructuralHash, bool)> {
        self.sheet_mut(uid).map(|s| s.persist())
    }

    /// Persist the working grids of `uids` into a new piece.
    pub fn persist_all(&mut self, uids: &[SheetUid]) -> Piece {
        let mut piece = Piece::new();
        for &uid in uids {
            if let Some((hash, new)) = self.persist(uid) {
                if new {
                    log::debug!("stored new state {} for {}", hash.short(), uid);
                }
                piece.set(uid, hash);
            }
        }
        piece
    }

    /// Read-only views of one sheet's state as of `piece`.
    pub fn view_at(&self, piece: Option<&Piece>, uid: SheetUid) -> Option<SheetView<'_>> {
        let hash = self.state_of(piece, uid)?;
        self.sheet(uid)?.view_state(&hash)
    }

    /// Enabled sheets as of `piece`, in enabled-list order.
    pub fn views_at(&self, piece: Option<&Piece>) -> Vec<SheetView<'_>> {
        self.enabled_uids()
            .into_iter()
            .filter_map(|uid| self.view_at(piece, uid))
            .collect()
    }

    /// Enabled sheets' working grids, in enabled-list order.
    pub fn live_views(&self) -> Vec<SheetView<'_>> {
        self.sheets.iter().filter(|s| s.enabled).map(|s| s.view()).collect()
    }
}
