//! Address translation for structural edits
//!
//! Every structural edit (row/column insert and delete, region move) adjusts
//! addresses by the same rule: positions entirely before the edit point are
//! unchanged, positions at/after it shift by the edit's delta, and positions
//! inside a deleted span are gone. Formula rewriting, cell relocation,
//! conditional-format rules, protection regions, and comments all go through
//! this one module so they cannot drift apart.

use super::address::{CellAddress, CellRange};
use crate::{MAX_COLS, MAX_ROWS};

/// A structural edit, described by its effect on addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    /// Insert `count` rows before row `at`
    InsertRows { at: u32, count: u32 },
    /// Delete `count` rows starting at row `at`
    DeleteRows { at: u32, count: u32 },
    /// Insert `count` columns before column `at`
    InsertCols { at: u16, count: u16 },
    /// Delete `count` columns starting at column `at`
    DeleteCols { at: u16, count: u16 },
    /// Move the cells of `from` by the given delta (drag-move semantics)
    MoveRegion {
        from: CellRange,
        d_row: i64,
        d_col: i64,
    },
}

impl ShiftOp {
    /// The inverse edit, used by undo. Deletes have no structural inverse on
    /// their own (deleted content must be restored separately).
    pub fn inverse(&self) -> ShiftOp {
        match *self {
            ShiftOp::InsertRows { at, count } => ShiftOp::DeleteRows { at, count },
            ShiftOp::DeleteRows { at, count } => ShiftOp::InsertRows { at, count },
            ShiftOp::InsertCols { at, count } => ShiftOp::DeleteCols { at, count },
            ShiftOp::DeleteCols { at, count } => ShiftOp::InsertCols { at, count },
            ShiftOp::MoveRegion { from, d_row, d_col } => {
                let moved = CellRange::from_indices(
                    (from.start.row as i64 + d_row) as u32,
                    (from.start.col as i64 + d_col) as u16,
                    (from.end.row as i64 + d_row) as u32,
                    (from.end.col as i64 + d_col) as u16,
                );
                ShiftOp::MoveRegion {
                    from: moved,
                    d_row: -d_row,
                    d_col: -d_col,
                }
            }
        }
    }
}

/// Result of translating an address or range through a [`ShiftOp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation<T> {
    /// The edit does not affect this position
    Unchanged,
    /// The position moved
    Shifted(T),
    /// The position was removed by the edit (produces `#REF!` downstream)
    Deleted,
}

impl<T> Translation<T> {
    /// The translated value, or the original when unchanged; `None` if deleted.
    pub fn resolve(self, original: T) -> Option<T> {
        match self {
            Translation::Unchanged => Some(original),
            Translation::Shifted(v) => Some(v),
            Translation::Deleted => None,
        }
    }
}

/// Translate a bare (row, col) position through an edit
pub fn translate_position(row: u32, col: u16, op: &ShiftOp) -> Translation<(u32, u16)> {
    match *op {
        ShiftOp::InsertRows { at, count } => {
            if row < at {
                Translation::Unchanged
            } else if row as u64 + count as u64 >= MAX_ROWS as u64 {
                // Pushed off the end of the sheet
                Translation::Deleted
            } else {
                Translation::Shifted((row + count, col))
            }
        }
        ShiftOp::DeleteRows { at, count } => {
            if row < at {
                Translation::Unchanged
            } else if row < at + count {
                Translation::Deleted
            } else {
                Translation::Shifted((row - count, col))
            }
        }
        ShiftOp::InsertCols { at, count } => {
            if col < at {
                Translation::Unchanged
            } else if col as u32 + count as u32 >= MAX_COLS as u32 {
                Translation::Deleted
            } else {
                Translation::Shifted((row, col + count))
            }
        }
        ShiftOp::DeleteCols { at, count } => {
            if col < at {
                Translation::Unchanged
            } else if col < at + count {
                Translation::Deleted
            } else {
                Translation::Shifted((row, col - count))
            }
        }
        ShiftOp::MoveRegion { from, d_row, d_col } => {
            if !from.contains_position(row, col) {
                return Translation::Unchanged;
            }
            let new_row = row as i64 + d_row;
            let new_col = col as i64 + d_col;
            if new_row < 0
                || new_row >= MAX_ROWS as i64
                || new_col < 0
                || new_col >= MAX_COLS as i64
            {
                Translation::Deleted
            } else {
                Translation::Shifted((new_row as u32, new_col as u16))
            }
        }
    }
}

/// Translate a cell address, preserving absolute/relative markers
pub fn translate_address(addr: &CellAddress, op: &ShiftOp) -> Translation<CellAddress> {
    match translate_position(addr.row, addr.col, op) {
        Translation::Unchanged => Translation::Unchanged,
        Translation::Deleted => Translation::Deleted,
        Translation::Shifted((row, col)) => Translation::Shifted(CellAddress::with_absolute(
            row,
            col,
            addr.row_absolute,
            addr.col_absolute,
        )),
    }
}

/// Translate a range through an edit.
///
/// Inserts inside a range grow it; deletes inside it shrink it; a range
/// entirely within a deleted span is `Deleted`. A region move carries a range
/// along only when the moved block covers it entirely — a partially covered
/// range stays put.
pub fn translate_range(range: &CellRange, op: &ShiftOp) -> Translation<CellRange> {
    match *op {
        ShiftOp::InsertRows { at, count } => {
            if range.end.row < at {
                return Translation::Unchanged;
            }
            let start_row = if range.start.row >= at {
                range.start.row.saturating_add(count)
            } else {
                range.start.row
            };
            let end_row = range.end.row.saturating_add(count);
            if start_row >= MAX_ROWS || end_row >= MAX_ROWS {
                return Translation::Deleted;
            }
            Translation::Shifted(remade(range, start_row, range.start.col, end_row, range.end.col))
        }
        ShiftOp::DeleteRows { at, count } => {
            let span_end = at + count; // exclusive
            if range.end.row < at {
                return Translation::Unchanged;
            }
            if range.start.row >= at && range.end.row < span_end {
                return Translation::Deleted;
            }
            let start_row = if range.start.row < at {
                range.start.row
            } else if range.start.row >= span_end {
                range.start.row - count
            } else {
                at
            };
            let end_row = if range.end.row >= span_end {
                range.end.row - count
            } else {
                // end inside the span; last surviving row is just before it
                at - 1
            };
            Translation::Shifted(remade(range, start_row, range.start.col, end_row, range.end.col))
        }
        ShiftOp::InsertCols { at, count } => {
            if range.end.col < at {
                return Translation::Unchanged;
            }
            let start_col = if range.start.col >= at {
                range.start.col.saturating_add(count)
            } else {
                range.start.col
            };
            let end_col = range.end.col.saturating_add(count);
            if start_col >= MAX_COLS || end_col >= MAX_COLS {
                return Translation::Deleted;
            }
            Translation::Shifted(remade(range, range.start.row, start_col, range.end.row, end_col))
        }
        ShiftOp::DeleteCols { at, count } => {
            let span_end = at + count;
            if range.end.col < at {
                return Translation::Unchanged;
            }
            if range.start.col >= at && range.end.col < span_end {
                return Translation::Deleted;
            }
            let start_col = if range.start.col < at {
                range.start.col
            } else if range.start.col >= span_end {
                range.start.col - count
            } else {
                at
            };
            let end_col = if range.end.col >= span_end {
                range.end.col - count
            } else {
                at - 1
            };
            Translation::Shifted(remade(range, range.start.row, start_col, range.end.row, end_col))
        }
        ShiftOp::MoveRegion { from, .. } => {
            if !from.contains_range(range) {
                return Translation::Unchanged;
            }
            match (
                translate_address(&range.start, op),
                translate_address(&range.end, op),
            ) {
                (Translation::Shifted(start), Translation::Shifted(end)) => {
                    Translation::Shifted(CellRange::new(start, end))
                }
                _ => Translation::Deleted,
            }
        }
    }
}

fn remade(range: &CellRange, start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> CellRange {
    CellRange::new(
        CellAddress::with_absolute(
            start_row,
            start_col,
            range.start.row_absolute,
            range.start.col_absolute,
        ),
        CellAddress::with_absolute(
            end_row,
            end_col,
            range.end.row_absolute,
            range.end.col_absolute,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn range(s: &str) -> CellRange {
        CellRange::parse(s).unwrap()
    }

    #[test]
    fn test_insert_rows_shifts_at_and_after() {
        let op = ShiftOp::InsertRows { at: 2, count: 3 };

        assert_eq!(translate_address(&addr("A1"), &op), Translation::Unchanged);
        assert_eq!(translate_address(&addr("A2"), &op), Translation::Unchanged);
        assert_eq!(
            translate_address(&addr("A3"), &op),
            Translation::Shifted(addr("A6"))
        );
        assert_eq!(
            translate_address(&addr("B10"), &op),
            Translation::Shifted(addr("B13"))
        );
    }

    #[test]
    fn test_delete_rows_removes_span() {
        let op = ShiftOp::DeleteRows { at: 2, count: 2 };

        assert_eq!(translate_address(&addr("A2"), &op), Translation::Unchanged);
        assert_eq!(translate_address(&addr("A3"), &op), Translation::Deleted);
        assert_eq!(translate_address(&addr("A4"), &op), Translation::Deleted);
        assert_eq!(
            translate_address(&addr("A5"), &op),
            Translation::Shifted(addr("A3"))
        );
    }

    #[test]
    fn test_absolute_markers_preserved() {
        let op = ShiftOp::InsertRows { at: 0, count: 1 };
        let moved = match translate_address(&addr("$B$2"), &op) {
            Translation::Shifted(a) => a,
            other => panic!("expected shift, got {:?}", other),
        };
        assert_eq!(moved.to_string(), "$B$3");
    }

    #[test]
    fn test_insert_then_delete_round_trips() {
        // Inserting N rows above a reference then deleting the same N rows
        // must restore the original address exactly.
        for original in ["A1", "C7", "$D$12", "B$3"] {
            let a = addr(original);
            let insert = ShiftOp::InsertRows { at: 0, count: 4 };
            let shifted = match translate_address(&a, &insert) {
                Translation::Shifted(s) => s,
                _ => panic!("insert above should shift {}", original),
            };
            let delete = ShiftOp::DeleteRows { at: 0, count: 4 };
            let back = match translate_address(&shifted, &delete) {
                Translation::Shifted(s) => s,
                _ => panic!("delete should shift back {}", original),
            };
            assert_eq!(back.to_a1_string(), original);
        }
    }

    #[test]
    fn test_insert_cols_and_delete_cols() {
        let op = ShiftOp::InsertCols { at: 1, count: 2 };
        assert_eq!(translate_address(&addr("A5"), &op), Translation::Unchanged);
        assert_eq!(
            translate_address(&addr("B5"), &op),
            Translation::Shifted(addr("D5"))
        );

        let op = ShiftOp::DeleteCols { at: 1, count: 1 };
        assert_eq!(translate_address(&addr("B5"), &op), Translation::Deleted);
        assert_eq!(
            translate_address(&addr("C5"), &op),
            Translation::Shifted(addr("B5"))
        );
    }

    #[test]
    fn test_range_grows_on_internal_insert() {
        let op = ShiftOp::InsertRows { at: 2, count: 2 };
        assert_eq!(
            translate_range(&range("A1:A5"), &op),
            Translation::Shifted(range("A1:A7"))
        );
        // Entirely before: untouched
        assert_eq!(translate_range(&range("A1:B2"), &op), Translation::Unchanged);
        // Entirely after: shifted whole
        assert_eq!(
            translate_range(&range("A4:A6"), &op),
            Translation::Shifted(range("A6:A8"))
        );
    }

    #[test]
    fn test_range_shrinks_on_internal_delete() {
        let op = ShiftOp::DeleteRows { at: 1, count: 2 };
        // A1:A5 loses rows 2-3
        assert_eq!(
            translate_range(&range("A1:A5"), &op),
            Translation::Shifted(range("A1:A3"))
        );
        // Entirely inside the deleted span
        assert_eq!(translate_range(&range("A2:B3"), &op), Translation::Deleted);
        // Head chopped off
        assert_eq!(
            translate_range(&range("A2:A6"), &op),
            Translation::Shifted(range("A2:A4"))
        );
        // Tail chopped off
        assert_eq!(
            translate_range(&range("A1:A3"), &op),
            Translation::Shifted(range("A1:A1"))
        );
    }

    #[test]
    fn test_move_region_carries_contained_cells() {
        let op = ShiftOp::MoveRegion {
            from: range("A1:B2"),
            d_row: 2,
            d_col: 0,
        };

        assert_eq!(
            translate_address(&addr("A1"), &op),
            Translation::Shifted(addr("A3"))
        );
        assert_eq!(translate_address(&addr("C1"), &op), Translation::Unchanged);

        // A fully contained range moves; a partially covered one stays
        assert_eq!(
            translate_range(&range("A1:B1"), &op),
            Translation::Shifted(range("A3:B3"))
        );
        assert_eq!(translate_range(&range("A1:C2"), &op), Translation::Unchanged);
    }

    #[test]
    fn test_move_region_inverse() {
        let op = ShiftOp::MoveRegion {
            from: range("A1:B2"),
            d_row: 2,
            d_col: 1,
        };
        let inv = op.inverse();
        assert_eq!(
            inv,
            ShiftOp::MoveRegion {
                from: range("B3:C4"),
                d_row: -2,
                d_col: -1,
            }
        );
    }

    #[test]
    fn test_insert_past_sheet_end_deletes() {
        let op = ShiftOp::InsertRows {
            at: 0,
            count: MAX_ROWS,
        };
        assert_eq!(translate_address(&addr("A1"), &op), Translation::Deleted);
    }
}
