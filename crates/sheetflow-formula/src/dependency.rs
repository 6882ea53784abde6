//! Dependency tracking for formula cells
//!
//! Edges run from a formula cell to the cells and ranges it reads. Range
//! edges are stored range-wise and answered by containment test at query
//! time — a formula over `A1:A100000` costs one edge, not one hundred
//! thousand.

use ahash::{AHashMap, AHashSet};

use crate::ast::FormulaExpr;
use sheetflow_core::CellRange;

/// Unique key for a cell (sheet index + position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }
}

/// A single reference a formula makes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTarget {
    /// A single-cell read
    Cell(CellKey),
    /// A rectangular range read, kept range-wise
    Range { sheet: usize, range: CellRange },
}

/// Dependency graph for formula cells
///
/// Invariant: every formula cell has exactly the edges implied by its
/// current AST; [`DependencyGraph::set_edges`] replaces them atomically.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Formula cell → single cells it reads
    cell_precedents: AHashMap<CellKey, AHashSet<CellKey>>,
    /// Referenced cell → formula cells reading it directly
    cell_dependents: AHashMap<CellKey, AHashSet<CellKey>>,
    /// Formula cell → ranges it reads
    range_reads: AHashMap<CellKey, Vec<(usize, CellRange)>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all outgoing edges of a formula cell atomically.
    ///
    /// Pass an empty slice to clear the cell's edges (formula removed).
    pub fn set_edges(&mut self, formula: CellKey, refs: &[RefTarget]) {
        // Drop old edges
        if let Some(old) = self.cell_precedents.remove(&formula) {
            for precedent in old {
                if let Some(deps) = self.cell_dependents.get_mut(&precedent) {
                    deps.remove(&formula);
                    if deps.is_empty() {
                        self.cell_dependents.remove(&precedent);
                    }
                }
            }
        }
        self.range_reads.remove(&formula);

        // Install new ones
        let mut cells = AHashSet::new();
        let mut ranges = Vec::new();
        for target in refs {
            match target {
                RefTarget::Cell(key) => {
                    cells.insert(*key);
                }
                RefTarget::Range { sheet, range } => ranges.push((*sheet, *range)),
            }
        }

        if !cells.is_empty() {
            for precedent in &cells {
                self.cell_dependents
                    .entry(*precedent)
                    .or_default()
                    .insert(formula);
            }
            self.cell_precedents.insert(formula, cells);
        }
        if !ranges.is_empty() {
            self.range_reads.insert(formula, ranges);
        }
    }

    /// Remove all edges for a formula cell
    pub fn clear_cell(&mut self, formula: CellKey) {
        self.set_edges(formula, &[]);
    }

    /// Drop the whole graph (full rebuild after a structural edit)
    pub fn clear(&mut self) {
        self.cell_precedents.clear();
        self.cell_dependents.clear();
        self.range_reads.clear();
    }

    /// Formula cells that *directly* read the given cell, via a cell edge
    /// or a containing range edge. Transitivity is the scheduler's job.
    pub fn dependents_of(&self, key: CellKey) -> Vec<CellKey> {
        let mut result: Vec<CellKey> = self
            .cell_dependents
            .get(&key)
            .into_iter()
            .flat_map(|set| set.iter().copied())
            .collect();

        for (formula, ranges) in &self.range_reads {
            if ranges
                .iter()
                .any(|(sheet, range)| *sheet == key.sheet && range.contains_position(key.row, key.col))
                && !result.contains(formula)
            {
                result.push(*formula);
            }
        }

        result
    }

    /// Whether formula `f` directly reads cell `g`
    pub fn depends_on(&self, f: CellKey, g: CellKey) -> bool {
        if self
            .cell_precedents
            .get(&f)
            .is_some_and(|set| set.contains(&g))
        {
            return true;
        }
        self.range_reads.get(&f).is_some_and(|ranges| {
            ranges
                .iter()
                .any(|(sheet, range)| *sheet == g.sheet && range.contains_position(g.row, g.col))
        })
    }

    /// Whether the formula transitively depends on itself.
    ///
    /// Walks dependent edges (containment-tested, never expanded) from the
    /// cell; a path back to the start is a cycle.
    pub fn has_cycle(&self, start: CellKey) -> bool {
        let mut visited = AHashSet::new();
        let mut stack: Vec<CellKey> = self.dependents_of(start);

        while let Some(current) = stack.pop() {
            if current == start {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.dependents_of(current));
        }

        false
    }

    /// Number of formula cells with edges in the graph
    pub fn formula_cell_count(&self) -> usize {
        let mut keys: AHashSet<CellKey> = self.cell_precedents.keys().copied().collect();
        keys.extend(self.range_reads.keys().copied());
        keys.len()
    }
}

/// Extract the reference targets of a formula AST.
///
/// `current_sheet` resolves unqualified references; `resolve_sheet` maps
/// sheet names to indices. References to unknown sheets contribute no edge
/// (they evaluate to `#REF!` instead).
pub fn extract_references(
    expr: &FormulaExpr,
    current_sheet: usize,
    resolve_sheet: &dyn Fn(&str) -> Option<usize>,
) -> Vec<RefTarget> {
    let mut refs = Vec::new();
    walk(expr, current_sheet, resolve_sheet, &mut refs);
    refs
}

fn walk(
    expr: &FormulaExpr,
    current_sheet: usize,
    resolve_sheet: &dyn Fn(&str) -> Option<usize>,
    refs: &mut Vec<RefTarget>,
) {
    let resolve = |sheet: &Option<String>| -> Option<usize> {
        match sheet {
            None => Some(current_sheet),
            Some(name) => resolve_sheet(name),
        }
    };

    match expr {
        FormulaExpr::CellRef(r) => {
            if let Some(sheet) = resolve(&r.sheet) {
                refs.push(RefTarget::Cell(CellKey::new(
                    sheet,
                    r.address.row,
                    r.address.col,
                )));
            }
        }
        FormulaExpr::RangeRef(r) => {
            if let Some(sheet) = resolve(&r.sheet) {
                refs.push(RefTarget::Range {
                    sheet,
                    range: r.range,
                });
            }
        }
        FormulaExpr::BinaryOp { left, right, .. } => {
            walk(left, current_sheet, resolve_sheet, refs);
            walk(right, current_sheet, resolve_sheet, refs);
        }
        FormulaExpr::UnaryOp { operand, .. } => {
            walk(operand, current_sheet, resolve_sheet, refs);
        }
        FormulaExpr::Call { args, .. } => {
            for arg in args {
                walk(arg, current_sheet, resolve_sheet, refs);
            }
        }
        FormulaExpr::Number(_)
        | FormulaExpr::Text(_)
        | FormulaExpr::Boolean(_)
        | FormulaExpr::Error(_) => {}
    }
}
