use super::{Diagnostic, EditAction, EditOp, RowData};
use crate::book::SheetBook;
use crate::cell_id::{CellPos, DataRow};
use crate::sheet::{Sheet, SheetUid};

/// What an executed action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub sheet: SheetUid,
    /// Operation actually performed. An update past the last row runs as an
    /// insert.
    pub op: EditOp,
    /// Data row written, appended or removed.
    pub row: DataRow,
}

/// Apply one action to the working grid of the sheet it targets.
///
/// `sheets` is the turn's enabled-sheet list; `action.sheet_index` indexes
/// into it. Writes to cells outside the grid are skipped silently.
pub fn execute(book: &mut SheetBook, sheets: &[SheetUid], action: &EditAction) -> Result<Applied, Diagnostic> {
    let unknown = Diagnostic::UnknownSheet { index: action.sheet_index };
    let uid = *sheets.get(action.sheet_index).ok_or(unknown.clone())?;
    let sheet = book.sheet_mut(uid).ok_or(unknown)?;
    let empty = RowData::new();

    match action.op {
        EditOp::Update => {
            let row = required_row(action)?;
            let data = action.data.as_ref().unwrap_or(&empty);
            if row.0 >= sheet.data_row_count() {
                log::debug!(
                    "update of row {} on {} ({} data rows) runs as insert",
                    row.0,
                    sheet.name,
                    sheet.data_row_count()
                );
                return insert(sheet, data);
            }
            permit(sheet, EditOp::Update)?;
            for (col, value) in data {
                let pos = CellPos { row: row.to_grid(), col: col.to_grid() };
                if !sheet.set_value(pos, value.clone()) {
                    log::debug!("skipping write outside {} at {}", sheet.name, pos);
                }
            }
            Ok(Applied { sheet: uid, op: EditOp::Update, row })
        }
        EditOp::Insert => insert(sheet, action.data.as_ref().unwrap_or(&empty)),
        EditOp::Delete => {
            permit(sheet, EditOp::Delete)?;
            let row = required_row(action)?;
            if !sheet.remove_row(row.to_grid()) {
                return Err(Diagnostic::RowOutOfRange { sheet: uid, row: row.0 });
            }
            Ok(Applied { sheet: uid, op: EditOp::Delete, row })
        }
    }
}

fn insert(sheet: &mut Sheet, data: &RowData) -> Result<Applied, Diagnostic> {
    permit(sheet, EditOp::Insert)?;
    let grid_row = sheet.append_row(data);
    let row = grid_row.to_data().unwrap_or(DataRow(0));
    Ok(Applied { sheet: sheet.uid, op: EditOp::Insert, row })
}

fn required_row(action: &EditAction) -> Result<DataRow, Diagnostic> {
    action.row.ok_or_else(|| Diagnostic::MalformedCall {
        call: action.op.to_string(),
        reason: "missing row index".into(),
    })
}

fn permit(sheet: &Sheet, op: EditOp) -> Result<(), Diagnostic> {
    if sheet.kind.permits(op) {
        Ok(())
    } else {
        Err(Diagnostic::OperationNotPermitted { sheet: sheet.uid, op })
    }
}
