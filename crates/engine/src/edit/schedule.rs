use std::cmp::Ordering;

use super::{EditAction, EditOp};

/// Order actions for execution: all updates, then all inserts, then all
/// deletes. Deletes run from the highest row down so removing one row never
/// shifts the target of a later delete. Ties keep their source order.
pub fn schedule(mut actions: Vec<EditAction>) -> Vec<EditAction> {
    actions.sort_by(|a, b| {
        a.op.priority().cmp(&b.op.priority()).then_with(|| match (a.op, b.op) {
            (EditOp::Delete, EditOp::Delete) => b.row.cmp(&a.row),
            _ => Ordering::Equal,
        })
    });
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::RowData;
    use pretty_assertions::assert_eq;

    fn tagged(mut action: EditAction, offset: usize) -> EditAction {
        action.offset = offset;
        action
    }

    #[test]
    fn test_priority_order() {
        let actions = vec![
            tagged(EditAction::delete(0, 1), 0),
            tagged(EditAction::insert(0, RowData::new()), 1),
            tagged(EditAction::update(0, 0, RowData::new()), 2),
        ];
        let ops: Vec<_> = schedule(actions).iter().map(|a| a.op).collect();
        assert_eq!(ops, vec![EditOp::Update, EditOp::Insert, EditOp::Delete]);
    }

    #[test]
    fn test_deletes_descend() {
        let actions = vec![
            tagged(EditAction::delete(0, 1), 0),
            tagged(EditAction::delete(0, 3), 1),
            tagged(EditAction::delete(0, 2), 2),
        ];
        let rows: Vec<_> = schedule(actions).iter().map(|a| a.row.unwrap().0).collect();
        assert_eq!(rows, vec![3, 2, 1]);
    }

    #[test]
    fn test_stable_within_kind() {
        let actions = vec![
            tagged(EditAction::insert(1, RowData::new()), 0),
            tagged(EditAction::update(0, 5, RowData::new()), 1),
            tagged(EditAction::insert(0, RowData::new()), 2),
            tagged(EditAction::update(0, 1, RowData::new()), 3),
        ];
        let offsets: Vec<_> = schedule(actions).iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![1, 3, 0, 2]);
    }
}
