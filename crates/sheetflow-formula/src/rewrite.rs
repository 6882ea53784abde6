//! AST rewriting for structural edits
//!
//! When rows or columns are inserted, deleted, or moved, every formula's
//! references are adjusted in place — the tree is rewritten, never
//! re-parsed, so absolute/relative markers survive exactly. A reference
//! whose target was deleted becomes a `#REF!` error literal; the dependent
//! formula then evaluates to `#REF!`.

use crate::ast::FormulaExpr;
use sheetflow_core::{translate_address, translate_range, CellError, ShiftOp, Translation};

/// Rewrite every reference in the expression through the edit.
///
/// `on_edited_sheet` decides whether a reference's sheet qualifier (None =
/// the formula's own sheet) points at the sheet being edited; references to
/// other sheets are untouched. Returns true if anything changed.
pub fn rewrite_expr(
    expr: &mut FormulaExpr,
    op: &ShiftOp,
    on_edited_sheet: &dyn Fn(Option<&str>) -> bool,
) -> bool {
    match expr {
        FormulaExpr::CellRef(r) => {
            if !on_edited_sheet(r.sheet.as_deref()) {
                return false;
            }
            match translate_address(&r.address, op) {
                Translation::Unchanged => false,
                Translation::Shifted(address) => {
                    r.address = address;
                    true
                }
                Translation::Deleted => {
                    *expr = FormulaExpr::Error(CellError::Ref);
                    true
                }
            }
        }
        FormulaExpr::RangeRef(r) => {
            if !on_edited_sheet(r.sheet.as_deref()) {
                return false;
            }
            match translate_range(&r.range, op) {
                Translation::Unchanged => false,
                Translation::Shifted(range) => {
                    r.range = range;
                    true
                }
                Translation::Deleted => {
                    *expr = FormulaExpr::Error(CellError::Ref);
                    true
                }
            }
        }
        FormulaExpr::BinaryOp { left, right, .. } => {
            let l = rewrite_expr(left, op, on_edited_sheet);
            let r = rewrite_expr(right, op, on_edited_sheet);
            l || r
        }
        FormulaExpr::UnaryOp { operand, .. } => rewrite_expr(operand, op, on_edited_sheet),
        FormulaExpr::Call { args, .. } => {
            let mut changed = false;
            for arg in args {
                changed |= rewrite_expr(arg, op, on_edited_sheet);
            }
            changed
        }
        FormulaExpr::Number(_)
        | FormulaExpr::Text(_)
        | FormulaExpr::Boolean(_)
        | FormulaExpr::Error(_) => false,
    }
}
