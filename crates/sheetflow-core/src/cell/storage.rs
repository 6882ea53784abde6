//! Sparse cell storage
//!
//! Only non-empty cells are stored, in a row-major `BTreeMap` structure that
//! iterates in row order and stays compact under structural edits.

use std::collections::BTreeMap;

use super::shift::{translate_position, ShiftOp, Translation};
use super::value::CellValue;
use crate::CellRange;

/// Complete data for a single cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellData {
    /// The cell's value
    pub value: CellValue,
    /// Opaque style index consumed by the presentation layer (0 = default)
    pub style_index: u32,
}

impl CellData {
    /// Create a new cell with a value and default style
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            style_index: 0,
        }
    }

    /// Create a new cell with a value and style
    pub fn with_style(value: CellValue, style_index: u32) -> Self {
        Self { value, style_index }
    }

    /// Create an empty cell
    pub fn empty() -> Self {
        Self {
            value: CellValue::Empty,
            style_index: 0,
        }
    }

    /// Check if this cell is effectively empty (no value and default style)
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.style_index == 0
    }
}

impl Default for CellData {
    fn default() -> Self {
        Self::empty()
    }
}

/// Sparse row-based storage for worksheet cells
///
/// Structure: `BTreeMap<row_index, BTreeMap<col_index, CellData>>`
#[derive(Debug, Default)]
pub struct CellStorage {
    /// Row index → column map
    rows: BTreeMap<u32, BTreeMap<u16, CellData>>,

    /// Merged cell regions
    merged_regions: Vec<CellRange>,
}

impl CellStorage {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&CellData> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Set a cell
    ///
    /// If the cell data is empty (no value, default style), the cell is removed.
    pub fn set(&mut self, row: u32, col: u16, data: CellData) {
        if data.is_empty() {
            if let Some(row_map) = self.rows.get_mut(&row) {
                row_map.remove(&col);
                if row_map.is_empty() {
                    self.rows.remove(&row);
                }
            }
        } else {
            self.rows.entry(row).or_default().insert(col, data);
        }
    }

    /// Set just the cell value (preserving style)
    pub fn set_value(&mut self, row: u32, col: u16, value: CellValue) {
        if let Some(cell) = self.get_mut(row, col) {
            cell.value = value;
            if self.get(row, col).is_some_and(|c| c.is_empty()) {
                self.remove(row, col);
            }
        } else if !value.is_empty() {
            self.set(row, col, CellData::new(value));
        }
    }

    /// Set just the cell style (preserving value)
    pub fn set_style(&mut self, row: u32, col: u16, style_index: u32) {
        if let Some(cell) = self.get_mut(row, col) {
            cell.style_index = style_index;
            if self.get(row, col).is_some_and(|c| c.is_empty()) {
                self.remove(row, col);
            }
        } else if style_index != 0 {
            self.set(row, col, CellData::with_style(CellValue::Empty, style_index));
        }
    }

    /// Remove a cell, returning its data
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellData> {
        let result = self.rows.get_mut(&row).and_then(|r| r.remove(&col));
        if self.rows.get(&row).is_some_and(|r| r.is_empty()) {
            self.rows.remove(&row);
        }
        result
    }

    /// Clear all cells and merged regions
    pub fn clear(&mut self) {
        self.rows.clear();
        self.merged_regions.clear();
    }

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the bounds of used cells as (min_row, min_col, max_row, max_col)
    pub fn used_bounds(&self) -> Option<(u32, u16, u32, u16)> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;

        let mut min_col = u16::MAX;
        let mut max_col = 0u16;
        for row_data in self.rows.values() {
            if let Some(&col) = row_data.keys().next() {
                min_col = min_col.min(col);
            }
            if let Some(&col) = row_data.keys().next_back() {
                max_col = max_col.max(col);
            }
        }

        Some((min_row, min_col, max_row, max_col))
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.rows
            .iter()
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, data)| (row, col, data)))
    }

    /// Relocate all cells through a structural edit.
    ///
    /// Returns the cells removed by the edit: cells inside a deleted span,
    /// cells pushed off the sheet, and cells overwritten at a move
    /// destination. Shifted cells overwrite whatever occupied their target,
    /// so content is never silently dropped — the displaced occupant is
    /// handed back to the caller (for undo capture).
    pub fn apply_shift(&mut self, op: &ShiftOp) -> Vec<(u32, u16, CellData)> {
        let old_rows = std::mem::take(&mut self.rows);
        let mut removed = Vec::new();
        let mut shifted = Vec::new();

        for (row, cols) in old_rows {
            for (col, data) in cols {
                match translate_position(row, col, op) {
                    Translation::Unchanged => {
                        self.rows.entry(row).or_default().insert(col, data);
                    }
                    Translation::Shifted((new_row, new_col)) => {
                        shifted.push((new_row, new_col, data));
                    }
                    Translation::Deleted => {
                        removed.push((row, col, data));
                    }
                }
            }
        }

        for (new_row, new_col, data) in shifted {
            if let Some(displaced) = self
                .rows
                .entry(new_row)
                .or_default()
                .insert(new_col, data)
            {
                removed.push((new_row, new_col, displaced));
            }
        }

        // Merged regions follow the same rule
        let old_regions = std::mem::take(&mut self.merged_regions);
        for region in old_regions {
            match super::shift::translate_range(&region, op) {
                Translation::Unchanged => self.merged_regions.push(region),
                Translation::Shifted(r) => self.merged_regions.push(r),
                Translation::Deleted => {}
            }
        }

        removed
    }

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged_regions
    }

    /// Add a merged region
    pub fn add_merged_region(&mut self, range: CellRange) {
        self.merged_regions.push(range);
    }

    /// Remove the merged region exactly matching `range`, if present
    pub fn remove_merged_region(&mut self, range: &CellRange) -> bool {
        if let Some(idx) = self.merged_regions.iter().position(|r| r == range) {
            self.merged_regions.remove(idx);
            true
        } else {
            false
        }
    }

    /// Replace the full merged-region table (undo restore)
    pub fn set_merged_regions(&mut self, regions: Vec<CellRange>) {
        self.merged_regions = regions;
    }

    /// Check if a cell is part of a merged region
    pub fn is_merged(&self, row: u32, col: u16) -> bool {
        self.merged_regions
            .iter()
            .any(|r| r.contains_position(row, col))
    }
}
