//! Worksheet: a single sheet of cells with its attached tables
//!
//! The worksheet owns all cell state plus the sheet-scoped tables that move
//! with structural edits: comments, merged regions, conditional-format
//! rules, and protection. Writes are gated by protection; the `*_unchecked`
//! variants bypass the gate for engine-internal relocation and undo restore.

use ahash::AHashMap;

use crate::cell::shift::{translate_position, ShiftOp, Translation};
use crate::cell::storage::{CellData, CellStorage};
use crate::comment::CellComment;
use crate::conditional_format::ConditionalFormatRule;
use crate::error::{Error, Result};
use crate::protection::SheetProtection;
use crate::{CellAddress, CellRange, CellValue};

/// A single worksheet
#[derive(Debug, Default)]
pub struct Worksheet {
    /// Sheet name
    name: String,

    /// Cell storage (values, styles, merged regions)
    storage: CellStorage,

    /// Cell comments, keyed by (row, col)
    comments: AHashMap<(u32, u16), CellComment>,

    /// Conditional formatting rules
    conditional_formats: Vec<ConditionalFormatRule>,

    /// Sheet protection settings
    protection: SheetProtection,
}

/// Cell-anchored state removed by a structural edit, handed back for undo
/// capture.
#[derive(Debug, Default)]
pub struct ShiftRemovals {
    /// Cells deleted or overwritten by the edit
    pub cells: Vec<(u32, u16, CellData)>,
    /// Comments whose anchor cell was deleted
    pub comments: Vec<(u32, u16, CellComment)>,
}

impl Worksheet {
    /// Create a new empty worksheet
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell access ===

    /// Get a cell by string address
    pub fn cell(&self, address: &str) -> Result<Option<&CellData>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell_at(addr.row, addr.col))
    }

    /// Get a cell by row/column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.storage.get(row, col)
    }

    /// Get a cell's stored value (Empty if the cell does not exist)
    pub fn value_at(&self, row: u32, col: u16) -> CellValue {
        self.storage
            .get(row, col)
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty)
    }

    /// Get a cell's stored value by string address
    pub fn value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.value_at(addr.row, addr.col))
    }

    /// Get a cell's displayed value: cached result for formulas, the stored
    /// value otherwise
    pub fn display_value_at(&self, row: u32, col: u16) -> CellValue {
        self.storage
            .get(row, col)
            .map(|c| c.value.effective_value().clone())
            .unwrap_or(CellValue::Empty)
    }

    /// Get a cell's displayed value by string address
    pub fn display_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.display_value_at(addr.row, addr.col))
    }

    /// Get a cell's style index (0 = default)
    pub fn style_index_at(&self, row: u32, col: u16) -> u32 {
        self.storage.get(row, col).map(|c| c.style_index).unwrap_or(0)
    }

    // === Cell mutation (protection-gated) ===

    /// Set a cell's value by string address
    pub fn set_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_value_at(addr.row, addr.col, value.into())
    }

    /// Set a cell's value by row/column indices
    ///
    /// Refused with [`Error::ProtectedCell`] when the cell is locked; the
    /// prior content is untouched.
    pub fn set_value_at(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        self.check_unlocked(row, col)?;
        self.storage.set_value(row, col, value);
        Ok(())
    }

    /// Store a formula cell by string address (no parse validation here; the
    /// engine parses and caches results)
    pub fn set_formula(&mut self, address: &str, formula_text: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_formula_at(addr.row, addr.col, formula_text)
    }

    /// Store a formula cell by row/column indices
    pub fn set_formula_at(&mut self, row: u32, col: u16, formula_text: &str) -> Result<()> {
        self.check_unlocked(row, col)?;
        self.storage
            .set_value(row, col, CellValue::formula(formula_text));
        Ok(())
    }

    /// Clear a cell by string address
    pub fn clear_cell(&mut self, address: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.clear_cell_at(addr.row, addr.col)
    }

    /// Clear a cell by row/column indices
    pub fn clear_cell_at(&mut self, row: u32, col: u16) -> Result<()> {
        self.check_unlocked(row, col)?;
        self.storage.set_value(row, col, CellValue::Empty);
        Ok(())
    }

    /// Set a cell's style index
    pub fn set_style_at(&mut self, row: u32, col: u16, style_index: u32) -> Result<()> {
        self.check_unlocked(row, col)?;
        self.storage.set_style(row, col, style_index);
        Ok(())
    }

    /// Write a cell value without consulting protection.
    ///
    /// For engine-internal writes: cached formula results, structural
    /// relocation, and undo restore.
    pub fn set_value_unchecked(&mut self, row: u32, col: u16, value: CellValue) {
        self.storage.set_value(row, col, value);
    }

    /// Write full cell data without consulting protection
    pub fn set_cell_unchecked(&mut self, row: u32, col: u16, data: CellData) {
        self.storage.set(row, col, data);
    }

    /// Remove a cell without consulting protection
    pub fn remove_cell_unchecked(&mut self, row: u32, col: u16) -> Option<CellData> {
        self.storage.remove(row, col)
    }

    /// Update a formula cell's cached result in place.
    ///
    /// Not protection-gated: recalculation must be able to refresh results
    /// in locked cells.
    pub fn set_formula_result(&mut self, row: u32, col: u16, result: CellValue) {
        if let Some(cell) = self.storage.get_mut(row, col) {
            if let CellValue::Formula { cached_value, .. } = &mut cell.value {
                *cached_value = Some(Box::new(result));
            }
        }
    }

    /// Rewrite a formula cell's source text in place (structural-edit
    /// reference rewriting), leaving the cached value untouched.
    pub fn set_formula_text(&mut self, row: u32, col: u16, new_text: String) {
        if let Some(cell) = self.storage.get_mut(row, col) {
            if let CellValue::Formula { text, .. } = &mut cell.value {
                *text = new_text;
            }
        }
    }

    // === Iteration ===

    /// Iterate over all cells in row order
    pub fn cells(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.storage.iter()
    }

    /// Iterate over formula cells as (row, col, formula text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.storage.iter().filter_map(|(row, col, data)| {
            data.value.formula_text().map(|text| (row, col, text))
        })
    }

    /// The bounding range of used cells, if any
    pub fn used_range(&self) -> Option<CellRange> {
        self.storage
            .used_bounds()
            .map(|(min_row, min_col, max_row, max_col)| {
                CellRange::from_indices(min_row, min_col, max_row, max_col)
            })
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.storage.cell_count()
    }

    // === Comments ===

    /// Attach a comment to a cell by string address
    pub fn set_comment(&mut self, address: &str, comment: CellComment) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_comment_at(addr.row, addr.col, comment);
        Ok(())
    }

    /// Attach a comment to a cell
    pub fn set_comment_at(&mut self, row: u32, col: u16, comment: CellComment) {
        self.comments.insert((row, col), comment);
    }

    /// Get a cell's comment by string address
    pub fn comment(&self, address: &str) -> Result<Option<&CellComment>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.comment_at(addr.row, addr.col))
    }

    /// Get a cell's comment
    pub fn comment_at(&self, row: u32, col: u16) -> Option<&CellComment> {
        self.comments.get(&(row, col))
    }

    /// Remove a cell's comment
    pub fn remove_comment_at(&mut self, row: u32, col: u16) -> Option<CellComment> {
        self.comments.remove(&(row, col))
    }

    /// Iterate over all comments
    pub fn comments(&self) -> impl Iterator<Item = ((u32, u16), &CellComment)> {
        self.comments.iter().map(|(&k, v)| (k, v))
    }

    // === Merged regions ===

    /// Merge a range of cells
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        for existing in self.storage.merged_regions() {
            if existing.overlaps(range) {
                return Err(Error::MergedCellConflict(range.to_string()));
            }
        }
        self.storage.add_merged_region(*range);
        Ok(())
    }

    /// Unmerge a previously merged range; returns false if it was not merged
    pub fn unmerge_cells(&mut self, range: &CellRange) -> bool {
        self.storage.remove_merged_region(range)
    }

    /// Current merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        self.storage.merged_regions()
    }

    /// Replace the merged-region table (undo restore)
    pub fn set_merged_regions(&mut self, regions: Vec<CellRange>) {
        self.storage.set_merged_regions(regions);
    }

    /// Check if a cell is part of a merged region
    pub fn is_merged(&self, row: u32, col: u16) -> bool {
        self.storage.is_merged(row, col)
    }

    // === Conditional formats ===

    /// Add a conditional format rule
    pub fn add_conditional_format(&mut self, rule: ConditionalFormatRule) {
        self.conditional_formats.push(rule);
    }

    /// The current conditional format rules
    pub fn conditional_formats(&self) -> &[ConditionalFormatRule] {
        &self.conditional_formats
    }

    /// Replace the rule table (undo restore)
    pub fn set_conditional_formats(&mut self, rules: Vec<ConditionalFormatRule>) {
        self.conditional_formats = rules;
    }

    // === Protection ===

    /// The sheet's protection state
    pub fn protection(&self) -> &SheetProtection {
        &self.protection
    }

    /// Mutable access to the sheet's protection state
    pub fn protection_mut(&mut self) -> &mut SheetProtection {
        &mut self.protection
    }

    /// Whether a write to this cell would be refused
    pub fn is_locked(&self, row: u32, col: u16) -> bool {
        self.protection.is_locked(row, col)
    }

    fn check_unlocked(&self, row: u32, col: u16) -> Result<()> {
        if self.is_locked(row, col) {
            Err(Error::ProtectedCell(
                CellAddress::new(row, col).to_a1_string(),
            ))
        } else {
            Ok(())
        }
    }

    // === Structural edits ===

    /// Relocate every cell-anchored table through a structural edit:
    /// cells, merged regions, comments, conditional-format ranges, and
    /// protection regions. Returns the removed state for undo capture.
    pub fn apply_shift(&mut self, op: &ShiftOp) -> ShiftRemovals {
        let mut removals = ShiftRemovals {
            cells: self.storage.apply_shift(op),
            comments: Vec::new(),
        };

        let old_comments = std::mem::take(&mut self.comments);
        for ((row, col), comment) in old_comments {
            match translate_position(row, col, op) {
                Translation::Unchanged => {
                    self.comments.insert((row, col), comment);
                }
                Translation::Shifted((r, c)) => {
                    self.comments.insert((r, c), comment);
                }
                Translation::Deleted => removals.comments.push((row, col, comment)),
            }
        }

        self.conditional_formats.retain_mut(|rule| rule.apply_shift(op));
        self.protection.apply_shift(op);

        removals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protection::ProtectionRegion;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_and_get_values() {
        let mut sheet = Worksheet::new("Sheet1");

        sheet.set_value("A1", 10.0).unwrap();
        sheet.set_value("B1", "hello").unwrap();

        assert_eq!(sheet.value("A1").unwrap(), CellValue::Number(10.0));
        assert_eq!(sheet.value("B1").unwrap().as_text(), Some("hello"));
        assert_eq!(sheet.value("C9").unwrap(), CellValue::Empty);
    }

    #[test]
    fn test_formula_storage_and_result() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_formula("A1", "=B1+1").unwrap();

        assert_eq!(
            sheet.value("A1").unwrap().formula_text(),
            Some("=B1+1")
        );
        assert_eq!(sheet.display_value("A1").unwrap(), CellValue::Empty);

        sheet.set_formula_result(0, 0, CellValue::Number(4.0));
        assert_eq!(sheet.display_value("A1").unwrap(), CellValue::Number(4.0));
    }

    #[test]
    fn test_protected_write_refused() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_value("A1", 1.0).unwrap();

        sheet.protection_mut().enable();
        sheet
            .protection_mut()
            .add_region(ProtectionRegion::unlocked(
                CellRange::parse("B1:B5").unwrap(),
            ));

        // Locked cell: refused, content untouched
        let err = sheet.set_value("A1", 2.0).unwrap_err();
        assert!(matches!(err, Error::ProtectedCell(_)));
        assert_eq!(sheet.value("A1").unwrap(), CellValue::Number(1.0));

        // Unlocked range: accepted
        sheet.set_value("B2", 5.0).unwrap();
        assert_eq!(sheet.value("B2").unwrap(), CellValue::Number(5.0));
    }

    #[test]
    fn test_merge_conflict() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet
            .merge_cells(&CellRange::parse("A1:B2").unwrap())
            .unwrap();
        assert!(sheet
            .merge_cells(&CellRange::parse("B2:C3").unwrap())
            .is_err());
        assert!(sheet.is_merged(0, 0));
    }

    #[test]
    fn test_apply_shift_relocates_everything() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_value("A2", 1.0).unwrap();
        sheet.set_comment("A2", CellComment::text_only("note")).unwrap();
        sheet.merge_cells(&CellRange::parse("B2:C2").unwrap()).unwrap();
        sheet.add_conditional_format(
            ConditionalFormatRule::cell_is_greater_than(0.0)
                .with_range(CellRange::parse("A2:A5").unwrap()),
        );

        let removals = sheet.apply_shift(&ShiftOp::InsertRows { at: 0, count: 2 });
        assert!(removals.cells.is_empty());
        assert!(removals.comments.is_empty());

        assert_eq!(sheet.value("A4").unwrap(), CellValue::Number(1.0));
        assert!(sheet.comment_at(3, 0).is_some());
        assert_eq!(sheet.merged_regions()[0].to_string(), "B4:C4");
        assert_eq!(
            sheet.conditional_formats()[0].ranges[0].to_string(),
            "A4:A7"
        );
    }

    #[test]
    fn test_apply_shift_captures_deleted_comment() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_value("A2", 1.0).unwrap();
        sheet.set_comment("A2", CellComment::text_only("gone")).unwrap();

        let removals = sheet.apply_shift(&ShiftOp::DeleteRows { at: 1, count: 1 });
        assert_eq!(removals.cells.len(), 1);
        assert_eq!(removals.comments.len(), 1);
        assert_eq!(removals.comments[0].2.text, "gone");
        assert!(sheet.comment_at(1, 0).is_none());
    }
}
