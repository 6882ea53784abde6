//! Conditional-format evaluation
//!
//! Rules are re-evaluated against current cell values — typically right
//! after a recalculation pass, since predicates may reference recalculated
//! cells. `CellIs` conditions compare the displayed value type-aware;
//! `Expression` conditions evaluate their predicate formula per cell, with
//! relative references offset from the rule range's top-left anchor the way
//! spreadsheets apply shared conditional formulas.

use std::collections::BTreeMap;

use ahash::AHashSet;

use crate::engine::Engine;
use sheetflow_core::{CellError, CfCondition, Result};
use sheetflow_formula::{parse_formula, FormulaExpr, FormulaValue};

impl Engine {
    /// Evaluate the sheet's conditional-format rules, producing the style
    /// override per cell. Rules apply in priority order (lowest number
    /// first); the first style wins, and a matching `stop_if_true` rule
    /// shields the cell from lower-priority rules.
    pub fn conditional_styles(&self, sheet_idx: usize) -> Result<BTreeMap<(u32, u16), u32>> {
        let ws = self.sheet_ref(sheet_idx)?;

        let mut rules: Vec<_> = ws.conditional_formats().iter().collect();
        rules.sort_by_key(|r| r.priority);

        let mut styles: BTreeMap<(u32, u16), u32> = BTreeMap::new();
        let mut blocked: AHashSet<(u32, u16)> = AHashSet::new();

        for rule in rules {
            let predicate = match &rule.condition {
                CfCondition::Expression { formula } => {
                    match parse_formula(formula, &self.locale) {
                        Ok(ast) => Some(ast),
                        Err(e) => {
                            log::warn!("conditional format predicate failed to parse: {}", e);
                            continue;
                        }
                    }
                }
                CfCondition::CellIs { .. } => None,
            };

            for range in &rule.ranges {
                let anchor = range.start;
                for addr in range.cells() {
                    let pos = (addr.row, addr.col);
                    if blocked.contains(&pos) {
                        continue;
                    }

                    let matched = match (&rule.condition, &predicate) {
                        (
                            CfCondition::CellIs {
                                operator,
                                operand,
                                operand2,
                            },
                            _,
                        ) => {
                            let value = ws.display_value_at(addr.row, addr.col);
                            operator.compare(&value, operand, operand2.as_ref())
                        }
                        (CfCondition::Expression { .. }, Some(ast)) => {
                            let shifted = offset_expr(
                                ast,
                                addr.row as i64 - anchor.row as i64,
                                addr.col as i64 - anchor.col as i64,
                            );
                            match self.evaluate_ast(&shifted, sheet_idx) {
                                FormulaValue::Boolean(b) => b,
                                FormulaValue::Number(n) => n != 0.0,
                                _ => false,
                            }
                        }
                        (CfCondition::Expression { .. }, None) => false,
                    };

                    if matched {
                        if rule.style_index != 0 {
                            styles.entry(pos).or_insert(rule.style_index);
                        }
                        if rule.stop_if_true {
                            blocked.insert(pos);
                        }
                    }
                }
            }
        }

        Ok(styles)
    }
}

/// Shift a predicate's relative references by the cell's offset from the
/// rule anchor; absolute axes stay pinned. Offsets running off the sheet
/// become `#REF!` (the predicate then simply fails to match).
fn offset_expr(expr: &FormulaExpr, d_row: i64, d_col: i64) -> FormulaExpr {
    let mut clone = expr.clone();
    offset_in_place(&mut clone, d_row, d_col);
    clone
}

fn offset_in_place(expr: &mut FormulaExpr, d_row: i64, d_col: i64) {
    match expr {
        FormulaExpr::CellRef(r) => {
            let dr = if r.address.row_absolute { 0 } else { d_row };
            let dc = if r.address.col_absolute { 0 } else { d_col };
            match r.address.offset(dr, dc) {
                Some(address) => r.address = address,
                None => *expr = FormulaExpr::Error(CellError::Ref),
            }
        }
        FormulaExpr::RangeRef(r) => {
            let start = &r.range.start;
            let end = &r.range.end;
            let moved_start = start.offset(
                if start.row_absolute { 0 } else { d_row },
                if start.col_absolute { 0 } else { d_col },
            );
            let moved_end = end.offset(
                if end.row_absolute { 0 } else { d_row },
                if end.col_absolute { 0 } else { d_col },
            );
            match (moved_start, moved_end) {
                (Some(start), Some(end)) => {
                    r.range = sheetflow_core::CellRange::new(start, end);
                }
                _ => *expr = FormulaExpr::Error(CellError::Ref),
            }
        }
        FormulaExpr::BinaryOp { left, right, .. } => {
            offset_in_place(left, d_row, d_col);
            offset_in_place(right, d_row, d_col);
        }
        FormulaExpr::UnaryOp { operand, .. } => offset_in_place(operand, d_row, d_col),
        FormulaExpr::Call { args, .. } => {
            for arg in args {
                offset_in_place(arg, d_row, d_col);
            }
        }
        FormulaExpr::Number(_)
        | FormulaExpr::Text(_)
        | FormulaExpr::Boolean(_)
        | FormulaExpr::Error(_) => {}
    }
}
