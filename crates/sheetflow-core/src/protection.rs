//! Sheet protection
//!
//! Protection is a sheet-level lock flag plus rectangular region overrides.
//! The common configuration is "sheet locked except unprotected ranges":
//! protection enabled, with one or more `locked: false` regions carved out.

use crate::cell::shift::{translate_range, ShiftOp, Translation};
use crate::CellRange;

/// A rectangular override of the sheet's default lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionRegion {
    /// The cells this override applies to
    pub range: CellRange,
    /// Whether cells in the range are locked
    pub locked: bool,
}

impl ProtectionRegion {
    /// Create an unlocked region (the usual override on a protected sheet)
    pub fn unlocked(range: CellRange) -> Self {
        Self {
            range,
            locked: false,
        }
    }

    /// Create a locked region
    pub fn locked(range: CellRange) -> Self {
        Self {
            range,
            locked: true,
        }
    }
}

/// Per-sheet protection state
///
/// `is_locked` consults the nearest enclosing region override — smallest
/// area wins, latest-added wins a tie — and falls back to the sheet-level
/// flag. With protection disabled nothing is locked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetProtection {
    /// Whether protection is active at all
    pub enabled: bool,
    /// Region overrides, in insertion order
    regions: Vec<ProtectionRegion>,
}

impl SheetProtection {
    /// Create a disabled protection state
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable sheet-wide protection (all cells locked unless overridden)
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disable protection entirely (overrides are kept but dormant)
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Add a region override
    pub fn add_region(&mut self, region: ProtectionRegion) {
        self.regions.push(region);
    }

    /// The current region overrides
    pub fn regions(&self) -> &[ProtectionRegion] {
        &self.regions
    }

    /// Replace the full override table (undo restore)
    pub fn set_regions(&mut self, regions: Vec<ProtectionRegion>) {
        self.regions = regions;
    }

    /// Whether a write to this cell must be refused
    pub fn is_locked(&self, row: u32, col: u16) -> bool {
        if !self.enabled {
            return false;
        }

        // Nearest enclosing override: smallest area wins, ties go to the
        // latest-added region.
        let mut best: Option<(u64, bool)> = None;
        for region in &self.regions {
            if !region.range.contains_position(row, col) {
                continue;
            }
            let area = region.range.cell_count();
            if best.map_or(true, |(best_area, _)| area <= best_area) {
                best = Some((area, region.locked));
            }
        }

        best.map(|(_, locked)| locked).unwrap_or(true)
    }

    /// Relocate region overrides through a structural edit
    pub fn apply_shift(&mut self, op: &ShiftOp) {
        let old = std::mem::take(&mut self.regions);
        for mut region in old {
            match translate_range(&region.range, op) {
                Translation::Unchanged => self.regions.push(region),
                Translation::Shifted(range) => {
                    region.range = range;
                    self.regions.push(region);
                }
                Translation::Deleted => {}
            }
        }
    }
}
