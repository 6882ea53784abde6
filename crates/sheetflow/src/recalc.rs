//! Recalculation scheduling
//!
//! After any mutation the engine computes the transitive closure of
//! dependents from the changed cells, orders the affected formulas with
//! Kahn's algorithm over that induced subgraph, and re-evaluates them in
//! order. Formulas left unordered are cycle members and are marked
//! `Error(Circular)` instead of looping. Only cells whose displayed value
//! actually moved produce change events (the tracker compares before and
//! after), which makes repeated refreshes silent.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};

use crate::engine::Engine;
use crate::events::ChangeTracker;
use sheetflow_core::{CellError, CellValue};
use sheetflow_formula::CellKey;

impl Engine {
    /// Recompute everything transitively dependent on the seed cells.
    /// Seeds that are themselves formula cells are recomputed too.
    pub(crate) fn run_recalc(&mut self, seeds: &[CellKey], tracker: &mut ChangeTracker) {
        let mut dirty: Vec<CellKey> = Vec::new();
        let mut dirty_set: AHashSet<CellKey> = AHashSet::new();
        let mut seen: AHashSet<CellKey> = AHashSet::new();
        let mut queue: VecDeque<CellKey> = VecDeque::new();

        for &seed in seeds {
            if seen.insert(seed) {
                queue.push_back(seed);
            }
            if self.asts.contains_key(&seed) && dirty_set.insert(seed) {
                dirty.push(seed);
            }
        }

        while let Some(cell) = queue.pop_front() {
            for dependent in self.graph.dependents_of(cell) {
                if dirty_set.insert(dependent) {
                    dirty.push(dependent);
                }
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        self.recalc_cells(dirty, tracker);
    }

    /// Recompute every formula in the workbook. Emits change events only
    /// for values that actually moved, so calling this twice in a row
    /// produces no events the second time.
    pub fn refresh_all(&mut self) {
        let mut tracker = ChangeTracker::new();
        let all: Vec<CellKey> = self.asts.keys().copied().collect();
        self.recalc_cells(all, &mut tracker);
        self.flush(tracker);
    }

    /// Evaluate the given formula cells in dependency order, writing
    /// results back and marking cycle members `Error(Circular)`.
    pub(crate) fn recalc_cells(&mut self, dirty: Vec<CellKey>, tracker: &mut ChangeTracker) {
        if dirty.is_empty() {
            return;
        }
        let dirty_set: AHashSet<CellKey> = dirty.iter().copied().collect();

        // In-degree within the induced subgraph. A self-dependency (a
        // formula inside its own range) counts and is never decremented, so
        // the cell correctly falls through to the cycle marking below.
        let mut in_degree: AHashMap<CellKey, usize> = AHashMap::new();
        for &cell in &dirty {
            let degree = dirty
                .iter()
                .filter(|&&other| self.graph.depends_on(cell, other))
                .count();
            in_degree.insert(cell, degree);
        }

        // Kahn's algorithm; process smallest key first for determinism
        let mut ready: Vec<CellKey> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&cell, _)| cell)
            .collect();
        sort_keys_descending(&mut ready);

        let mut processed: AHashSet<CellKey> = AHashSet::new();
        while let Some(cell) = ready.pop() {
            processed.insert(cell);
            self.recalc_one(cell, tracker);

            let mut unblocked = Vec::new();
            for dependent in self.graph.dependents_of(cell) {
                if !dirty_set.contains(&dependent) {
                    continue;
                }
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 && !processed.contains(&dependent) {
                        unblocked.push(dependent);
                    }
                }
            }
            sort_keys_descending(&mut unblocked);
            // Keep the stack ordered so the smallest key pops next
            ready.extend(unblocked);
        }

        // Anything not processed sits on a cycle
        for &cell in &dirty {
            if processed.contains(&cell) {
                continue;
            }
            if let Some(ws) = self.workbook.worksheet(cell.sheet) {
                tracker.record(cell, ws.display_value_at(cell.row, cell.col));
            }
            if let Some(ws) = self.workbook.worksheet_mut(cell.sheet) {
                ws.set_formula_result(cell.row, cell.col, CellValue::Error(CellError::Circular));
            }
        }
    }

    fn recalc_one(&mut self, cell: CellKey, tracker: &mut ChangeTracker) {
        let Some(result) = self.evaluate_cell(cell) else {
            return;
        };
        if let Some(ws) = self.workbook.worksheet(cell.sheet) {
            tracker.record(cell, ws.display_value_at(cell.row, cell.col));
        }
        if let Some(ws) = self.workbook.worksheet_mut(cell.sheet) {
            ws.set_formula_result(cell.row, cell.col, result);
        }
    }
}

fn sort_keys_descending(keys: &mut [CellKey]) {
    keys.sort_by(|a, b| {
        b.sheet
            .cmp(&a.sheet)
            .then(b.row.cmp(&a.row))
            .then(b.col.cmp(&a.col))
    });
}
