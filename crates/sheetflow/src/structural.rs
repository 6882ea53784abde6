//! Structural edits: row/column insert and delete, region move
//!
//! One edit runs as a single pass: relocate cell storage and the sheet's
//! tables, rewrite every affected formula AST in place (no re-parsing, so
//! absolute/relative markers survive), rebuild dependency edges, and
//! recalculate. What the edit removed — cells in a deleted span, comments
//! with them, overwritten move targets, prior rule/protection/merge tables,
//! prior formula texts — is captured for undo at pre-edit coordinates.

use crate::command::{Command, StructuralCapture};
use crate::engine::Engine;
use crate::events::ChangeTracker;
use sheetflow_core::{
    translate_position, CellAddress, CellRange, CellValue, Result, ShiftOp, Translation,
};
use sheetflow_formula::{rewrite_expr, CellKey};

impl Engine {
    /// Insert `count` rows before row `at`
    pub fn insert_rows(&mut self, sheet: usize, at: u32, count: u32) -> Result<()> {
        self.structural_command(sheet, ShiftOp::InsertRows { at, count })
    }

    /// Delete `count` rows starting at row `at`
    pub fn delete_rows(&mut self, sheet: usize, at: u32, count: u32) -> Result<()> {
        self.structural_command(sheet, ShiftOp::DeleteRows { at, count })
    }

    /// Insert `count` columns before column `at`
    pub fn insert_cols(&mut self, sheet: usize, at: u16, count: u16) -> Result<()> {
        self.structural_command(sheet, ShiftOp::InsertCols { at, count })
    }

    /// Delete `count` columns starting at column `at`
    pub fn delete_cols(&mut self, sheet: usize, at: u16, count: u16) -> Result<()> {
        self.structural_command(sheet, ShiftOp::DeleteCols { at, count })
    }

    /// Move the cells of `from` so its top-left corner lands on `to`
    /// (drag-move semantics). References elsewhere follow the moved cells;
    /// content previously at the destination is overwritten (and captured
    /// for undo).
    pub fn shift_range(&mut self, sheet: usize, from: &CellRange, to: &CellAddress) -> Result<()> {
        let d_row = to.row as i64 - from.start.row as i64;
        let d_col = to.col as i64 - from.start.col as i64;
        if d_row == 0 && d_col == 0 {
            return Ok(());
        }
        self.structural_command(
            sheet,
            ShiftOp::MoveRegion {
                from: *from,
                d_row,
                d_col,
            },
        )
    }

    fn structural_command(&mut self, sheet: usize, op: ShiftOp) -> Result<()> {
        self.sheet_ref(sheet)?;
        if matches!(
            op,
            ShiftOp::InsertRows { count: 0, .. }
                | ShiftOp::DeleteRows { count: 0, .. }
                | ShiftOp::InsertCols { count: 0, .. }
                | ShiftOp::DeleteCols { count: 0, .. }
        ) {
            return Ok(());
        }

        let mut tracker = ChangeTracker::new();
        let capture = self.apply_structural_edit(sheet, op, &mut tracker);
        self.flush(tracker);
        self.push_command(Command::Structural {
            sheet,
            op,
            capture,
        });
        Ok(())
    }

    /// Run a structural edit forward. Shared by the public entry points and
    /// redo.
    pub(crate) fn apply_structural_edit(
        &mut self,
        sheet_idx: usize,
        op: ShiftOp,
        tracker: &mut ChangeTracker,
    ) -> StructuralCapture {
        // Pre-edit display values of every occupied address on the edited
        // sheet; addresses that become occupied later default to Empty.
        if let Some(ws) = self.workbook.worksheet(sheet_idx) {
            for (row, col, data) in ws.cells() {
                tracker.record(
                    CellKey::new(sheet_idx, row, col),
                    data.value.effective_value().clone(),
                );
            }
        }

        let (prior_rules, prior_protection, prior_merged) = match self.workbook.worksheet(sheet_idx)
        {
            Some(ws) => (
                ws.conditional_formats().to_vec(),
                ws.protection().clone(),
                ws.merged_regions().to_vec(),
            ),
            None => Default::default(),
        };

        // Rewrite formula ASTs everywhere; references qualified to other
        // sheets stay put, everything pointing at the edited sheet adjusts.
        let mut rewritten_formulas = Vec::new();
        let mut new_texts: Vec<(CellKey, String)> = Vec::new();
        {
            let workbook = &self.workbook;
            let locale = self.locale;
            for (key, ast) in self.asts.iter_mut() {
                let own_sheet = key.sheet;
                let changed = rewrite_expr(ast, &op, &|ref_sheet| match ref_sheet {
                    None => own_sheet == sheet_idx,
                    Some(name) => workbook.sheet_index(name) == Some(sheet_idx),
                });
                if changed {
                    let prior_text = workbook
                        .worksheet(key.sheet)
                        .and_then(|ws| ws.cell_at(key.row, key.col))
                        .and_then(|c| c.value.formula_text())
                        .unwrap_or_default()
                        .to_string();
                    rewritten_formulas.push((key.sheet, key.row, key.col, prior_text));
                    new_texts.push((*key, ast.to_formula_text(&locale)));
                }
            }
        }

        // Relocate cells, comments, merged regions, rules, and protection
        let removals = self
            .workbook
            .worksheet_mut(sheet_idx)
            .map(|ws| ws.apply_shift(&op))
            .unwrap_or_default();

        // Remap AST keys for formulas that moved with the edit
        let old_asts = std::mem::take(&mut self.asts);
        for (key, ast) in old_asts {
            if key.sheet != sheet_idx {
                self.asts.insert(key, ast);
                continue;
            }
            match translate_position(key.row, key.col, &op) {
                Translation::Unchanged => {
                    self.asts.insert(key, ast);
                }
                Translation::Shifted((row, col)) => {
                    self.asts.insert(CellKey::new(sheet_idx, row, col), ast);
                }
                Translation::Deleted => {}
            }
        }

        // Regenerated source text lands at the formula's post-edit position
        for (key, text) in new_texts {
            let target = if key.sheet == sheet_idx {
                match translate_position(key.row, key.col, &op) {
                    Translation::Unchanged => Some((key.row, key.col)),
                    Translation::Shifted(pos) => Some(pos),
                    Translation::Deleted => None,
                }
            } else {
                Some((key.row, key.col))
            };
            if let Some((row, col)) = target {
                if let Some(ws) = self.workbook.worksheet_mut(key.sheet) {
                    ws.set_formula_text(row, col, text);
                }
            }
        }

        // Post-edit occupied addresses that were empty before: Empty prior
        if let Some(ws) = self.workbook.worksheet(sheet_idx) {
            for (row, col, _) in ws.cells() {
                tracker.record(CellKey::new(sheet_idx, row, col), CellValue::Empty);
            }
        }

        self.rebuild_graph_from_asts();
        let all: Vec<CellKey> = self.asts.keys().copied().collect();
        self.recalc_cells(all, tracker);

        StructuralCapture {
            removed_cells: removals.cells,
            removed_comments: removals.comments,
            rewritten_formulas,
            prior_rules,
            prior_protection,
            prior_merged,
        }
    }

    /// Reverse a structural edit: inverse shift, then restore everything
    /// the capture holds at its pre-edit coordinates.
    pub(crate) fn undo_structural(
        &mut self,
        sheet_idx: usize,
        op: &ShiftOp,
        capture: &StructuralCapture,
    ) {
        let mut tracker = ChangeTracker::new();

        if let Some(ws) = self.workbook.worksheet(sheet_idx) {
            for (row, col, data) in ws.cells() {
                tracker.record(
                    CellKey::new(sheet_idx, row, col),
                    data.value.effective_value().clone(),
                );
            }
        }

        let inverse = op.inverse();
        if let Some(ws) = self.workbook.worksheet_mut(sheet_idx) {
            let _ = ws.apply_shift(&inverse);

            for (row, col, data) in &capture.removed_cells {
                ws.set_cell_unchecked(*row, *col, data.clone());
            }
            for (row, col, comment) in &capture.removed_comments {
                ws.set_comment_at(*row, *col, comment.clone());
            }

            ws.set_conditional_formats(capture.prior_rules.clone());
            *ws.protection_mut() = capture.prior_protection.clone();
            ws.set_merged_regions(capture.prior_merged.clone());
        }

        for (sheet, row, col, text) in &capture.rewritten_formulas {
            if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                ws.set_formula_text(*row, *col, text.clone());
            }
        }

        if let Some(ws) = self.workbook.worksheet(sheet_idx) {
            for (row, col, _) in ws.cells() {
                tracker.record(CellKey::new(sheet_idx, row, col), CellValue::Empty);
            }
        }

        // Texts are back to their pre-edit form; derive ASTs and edges from
        // them and recalculate
        self.rebuild_parsed_state();
        let all: Vec<CellKey> = self.asts.keys().copied().collect();
        self.recalc_cells(all, &mut tracker);
        self.flush(tracker);
    }
}
