//! Reversible commands and the undo/redo stack
//!
//! Commands are data: each variant carries the minimal prior state of what
//! it touched (the one cell, the one table), never a whole-sheet snapshot,
//! so undoing an edit leaves unrelated regions untouched. Structural edits
//! capture what the edit removed plus the tables and formula texts it
//! moved; the reverse shift restores positions and the capture restores
//! content.

use sheetflow_core::{
    CellComment, CellData, CellRange, ConditionalFormatRule, SheetProtection, ShiftOp,
};

/// A reversible engine operation
#[derive(Debug)]
pub(crate) enum Command {
    /// A single cell's content changed (value, formula, style, or clear)
    SetCell {
        sheet: usize,
        row: u32,
        col: u16,
        prior: Option<CellData>,
        new: Option<CellData>,
    },

    /// A comment was set or removed
    Comment {
        sheet: usize,
        row: u32,
        col: u16,
        prior: Option<CellComment>,
        new: Option<CellComment>,
    },

    /// The merged-region table changed
    Merge {
        sheet: usize,
        prior: Vec<CellRange>,
        new: Vec<CellRange>,
    },

    /// The protection state changed
    Protection {
        sheet: usize,
        prior: SheetProtection,
        new: SheetProtection,
    },

    /// The conditional-format rule table changed
    ConditionalFormats {
        sheet: usize,
        prior: Vec<ConditionalFormatRule>,
        new: Vec<ConditionalFormatRule>,
    },

    /// A row/column insert/delete or region move
    Structural {
        sheet: usize,
        op: ShiftOp,
        capture: StructuralCapture,
    },
}

/// Pre-state captured by a structural edit, at pre-edit coordinates
#[derive(Debug, Default)]
pub(crate) struct StructuralCapture {
    /// Cells the edit removed (deleted span, pushed off the sheet, or
    /// overwritten at a move destination)
    pub removed_cells: Vec<(u32, u16, CellData)>,
    /// Comments whose anchor was removed
    pub removed_comments: Vec<(u32, u16, CellComment)>,
    /// Formulas whose references were rewritten: (sheet, row, col, prior
    /// source text), keyed by pre-edit position
    pub rewritten_formulas: Vec<(usize, u32, u16, String)>,
    /// The edited sheet's conditional-format rules before relocation
    pub prior_rules: Vec<ConditionalFormatRule>,
    /// The edited sheet's protection state before relocation
    pub prior_protection: SheetProtection,
    /// The edited sheet's merged regions before relocation
    pub prior_merged: Vec<CellRange>,
}
