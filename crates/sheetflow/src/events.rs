//! Change notifications
//!
//! The engine emits one [`CellChanged`] per address whose *displayed* value
//! actually changed over a whole operation (mutation plus the recalculation
//! it triggers). Recomputing a formula to the same value emits nothing, so
//! a no-op `refresh_all` is silent.

use ahash::AHashMap;
use sheetflow_core::{CellAddress, CellValue};
use sheetflow_formula::CellKey;

/// A cell's displayed value changed
#[derive(Debug, Clone, PartialEq)]
pub struct CellChanged {
    /// Sheet index
    pub sheet: usize,
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based)
    pub col: u16,
    /// Displayed value before the operation
    pub old: CellValue,
    /// Displayed value after the operation
    pub new: CellValue,
}

impl CellChanged {
    /// The cell's address
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

/// Collects the first-seen prior display value of every cell an operation
/// touches. Flushed once at the end of the operation, so a cell that is
/// written twice (mutation, then recalculation) still produces at most one
/// event, comparing the true before and after.
#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    old: AHashMap<CellKey, CellValue>,
}

impl ChangeTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a cell's display value before it is (re)written. Only the
    /// first record per cell counts.
    pub(crate) fn record(&mut self, key: CellKey, old_display: CellValue) {
        self.old.entry(key).or_insert(old_display);
    }

    /// Tracked cells with their prior display values
    pub(crate) fn drain(self) -> impl Iterator<Item = (CellKey, CellValue)> {
        self.old.into_iter()
    }
}
