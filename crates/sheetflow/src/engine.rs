//! The engine: one mutable workbook plus everything derived from it
//!
//! `Engine` owns the document (a [`Workbook`]), the parsed AST of every
//! formula cell, the dependency graph, and the undo/redo stacks. Every
//! mutation runs to completion — protection check, write, dependency
//! update, recalculation, conditional-format-visible state, change events —
//! before returning, so the model is always fully consistent between calls.

use ahash::{AHashMap, AHashSet};

use crate::command::Command;
use crate::events::{CellChanged, ChangeTracker};
use sheetflow_core::{
    CellAddress, CellComment, CellData, CellError, CellRange, CellValue, ConditionalFormatRule,
    Error, ProtectionRegion, Result, Workbook, Worksheet,
};
use sheetflow_formula::{
    evaluate, extract_references, parse_formula, CellKey, CellResolver, DependencyGraph,
    EvaluationContext, FormulaExpr, FormulaValue, Func, Locale,
};

/// Engine construction options
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Separator convention for formula text
    pub locale: Locale,
    /// Maximum number of retained undo steps
    pub undo_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            undo_limit: 100,
        }
    }
}

/// The spreadsheet engine
pub struct Engine {
    pub(crate) workbook: Workbook,
    pub(crate) locale: Locale,
    pub(crate) graph: DependencyGraph,
    /// Parsed AST per formula cell, kept in sync with the stored text
    pub(crate) asts: AHashMap<CellKey, FormulaExpr>,
    /// Cells whose formula is a live SUBTOTAL output
    pub(crate) subtotal_cells: AHashSet<CellKey>,
    pub(crate) undo_stack: Vec<Command>,
    pub(crate) redo_stack: Vec<Command>,
    pub(crate) undo_limit: usize,
    pub(crate) events: Vec<CellChanged>,
}

impl Engine {
    /// Create an engine with a fresh single-sheet workbook
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with explicit configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            workbook: Workbook::new(),
            locale: config.locale,
            graph: DependencyGraph::new(),
            asts: AHashMap::new(),
            subtotal_cells: AHashSet::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            undo_limit: config.undo_limit,
            events: Vec::new(),
        }
    }

    // === Read access ===

    /// The underlying workbook
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// A worksheet by index
    pub fn sheet(&self, index: usize) -> Option<&Worksheet> {
        self.workbook.worksheet(index)
    }

    /// Add a worksheet, returning its index
    pub fn add_sheet<S: Into<String>>(&mut self, name: S) -> Result<usize> {
        self.workbook.add_worksheet(name)
    }

    /// The active formula locale
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// A cell's displayed value
    pub fn display_value(&self, sheet: usize, address: &str) -> Result<CellValue> {
        self.sheet_ref(sheet)?.display_value(address)
    }

    /// A cell's stored value (formula cells include their source text)
    pub fn value(&self, sheet: usize, address: &str) -> Result<CellValue> {
        self.sheet_ref(sheet)?.value(address)
    }

    /// Whether a write to this cell would be refused by protection
    pub fn is_locked(&self, sheet: usize, address: &str) -> Result<bool> {
        let addr = CellAddress::parse(address)?;
        Ok(self.sheet_ref(sheet)?.is_locked(addr.row, addr.col))
    }

    /// Drain accumulated change notifications
    pub fn take_events(&mut self) -> Vec<CellChanged> {
        std::mem::take(&mut self.events)
    }

    // === Cell mutation ===

    /// Set a cell's literal value
    pub fn set_value<V: Into<CellValue>>(
        &mut self,
        sheet: usize,
        address: &str,
        value: V,
    ) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_value_at(sheet, addr.row, addr.col, value.into())
    }

    /// Set a cell's literal value by indices
    pub fn set_value_at(&mut self, sheet: usize, row: u32, col: u16, value: CellValue) -> Result<()> {
        let ws = self.sheet_ref(sheet)?;
        self.check_unlocked(ws, row, col)?;

        let prior = ws.cell_at(row, col).cloned();
        let style = prior.as_ref().map(|c| c.style_index).unwrap_or(0);
        let new = cell_data(value, style);

        self.run_set_cell(sheet, row, col, prior, new);
        Ok(())
    }

    /// Set a cell's formula from source text.
    ///
    /// Text that fails to parse is still stored — the cell keeps the source
    /// and displays `Error(InvalidFormula)`. The only refused write is one
    /// against a locked cell.
    pub fn set_formula(&mut self, sheet: usize, address: &str, text: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_formula_at(sheet, addr.row, addr.col, text)
    }

    /// Set a cell's formula by indices
    pub fn set_formula_at(&mut self, sheet: usize, row: u32, col: u16, text: &str) -> Result<()> {
        let ws = self.sheet_ref(sheet)?;
        self.check_unlocked(ws, row, col)?;

        let prior = ws.cell_at(row, col).cloned();
        let style = prior.as_ref().map(|c| c.style_index).unwrap_or(0);
        let new = Some(CellData::with_style(CellValue::formula(text), style));

        self.run_set_cell(sheet, row, col, prior, new);
        Ok(())
    }

    /// Clear a cell's value (style and comment survive)
    pub fn clear_cell(&mut self, sheet: usize, address: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        let ws = self.sheet_ref(sheet)?;
        self.check_unlocked(ws, addr.row, addr.col)?;

        let prior = ws.cell_at(addr.row, addr.col).cloned();
        let style = prior.as_ref().map(|c| c.style_index).unwrap_or(0);
        let new = cell_data(CellValue::Empty, style);

        self.run_set_cell(sheet, addr.row, addr.col, prior, new);
        Ok(())
    }

    /// Set a cell's style index (value survives)
    pub fn set_style_at(&mut self, sheet: usize, row: u32, col: u16, style_index: u32) -> Result<()> {
        let ws = self.sheet_ref(sheet)?;
        self.check_unlocked(ws, row, col)?;

        let prior = ws.cell_at(row, col).cloned();
        let value = prior.as_ref().map(|c| c.value.clone()).unwrap_or(CellValue::Empty);
        let new = cell_data(value, style_index);

        self.run_set_cell(sheet, row, col, prior, new);
        Ok(())
    }

    fn run_set_cell(
        &mut self,
        sheet: usize,
        row: u32,
        col: u16,
        prior: Option<CellData>,
        new: Option<CellData>,
    ) {
        let mut tracker = ChangeTracker::new();
        self.write_cell(sheet, row, col, new.clone(), &mut tracker);
        self.run_recalc(&[CellKey::new(sheet, row, col)], &mut tracker);
        self.flush(tracker);
        self.push_command(Command::SetCell {
            sheet,
            row,
            col,
            prior,
            new,
        });
    }

    /// Write cell data without protection checks and re-sync the parsed
    /// state for that cell. Used by mutations, undo restore, and redo.
    pub(crate) fn write_cell(
        &mut self,
        sheet: usize,
        row: u32,
        col: u16,
        data: Option<CellData>,
        tracker: &mut ChangeTracker,
    ) {
        let key = CellKey::new(sheet, row, col);
        if let Some(ws) = self.workbook.worksheet(sheet) {
            tracker.record(key, ws.display_value_at(row, col));
        }

        if let Some(ws) = self.workbook.worksheet_mut(sheet) {
            match data {
                Some(data) => ws.set_cell_unchecked(row, col, data),
                None => {
                    ws.remove_cell_unchecked(row, col);
                }
            }
        }

        self.sync_formula_state(key);
    }

    /// Bring the AST cache, dependency graph, and SUBTOTAL tags in line
    /// with the cell's stored content.
    pub(crate) fn sync_formula_state(&mut self, key: CellKey) {
        let text = self
            .workbook
            .worksheet(key.sheet)
            .and_then(|ws| ws.cell_at(key.row, key.col))
            .and_then(|c| c.value.formula_text())
            .map(str::to_string);

        let Some(text) = text else {
            self.asts.remove(&key);
            self.subtotal_cells.remove(&key);
            self.graph.clear_cell(key);
            return;
        };

        match parse_formula(&text, &self.locale) {
            Ok(ast) => {
                let workbook = &self.workbook;
                let refs = extract_references(&ast, key.sheet, &|name| workbook.sheet_index(name));
                self.graph.set_edges(key, &refs);
                if matches!(
                    ast,
                    FormulaExpr::Call {
                        func: Func::Subtotal,
                        ..
                    }
                ) {
                    self.subtotal_cells.insert(key);
                } else {
                    self.subtotal_cells.remove(&key);
                }
                self.asts.insert(key, ast);
            }
            Err(e) => {
                log::warn!(
                    "formula at sheet {} {} failed to parse: {}",
                    key.sheet,
                    CellAddress::new(key.row, key.col),
                    e
                );
                self.asts.remove(&key);
                self.subtotal_cells.remove(&key);
                self.graph.clear_cell(key);
                if let Some(ws) = self.workbook.worksheet_mut(key.sheet) {
                    ws.set_formula_result(key.row, key.col, CellValue::Error(CellError::InvalidFormula));
                }
            }
        }
    }

    /// Re-derive all parsed state (ASTs, edges, SUBTOTAL tags) from the
    /// stored formula texts across the whole workbook.
    pub(crate) fn rebuild_parsed_state(&mut self) {
        self.asts.clear();
        self.subtotal_cells.clear();
        self.graph.clear();

        let mut keys = Vec::new();
        for (sheet_idx, ws) in self.workbook.worksheets().enumerate() {
            for (row, col, _) in ws.formula_cells() {
                keys.push(CellKey::new(sheet_idx, row, col));
            }
        }
        for key in keys {
            self.sync_formula_state(key);
        }
    }

    /// Rebuild graph edges and SUBTOTAL tags from the current ASTs without
    /// re-parsing (structural edits rewrite ASTs in place).
    pub(crate) fn rebuild_graph_from_asts(&mut self) {
        self.graph.clear();
        self.subtotal_cells.clear();

        let workbook = &self.workbook;
        for (key, ast) in &self.asts {
            let refs = extract_references(ast, key.sheet, &|name| workbook.sheet_index(name));
            self.graph.set_edges(*key, &refs);
            if matches!(
                ast,
                FormulaExpr::Call {
                    func: Func::Subtotal,
                    ..
                }
            ) {
                self.subtotal_cells.insert(*key);
            }
        }
    }

    // === Comments ===

    /// Attach a comment to a cell
    pub fn set_comment(&mut self, sheet: usize, address: &str, comment: CellComment) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        let ws = self.sheet_mut(sheet)?;
        let prior = ws.comment_at(addr.row, addr.col).cloned();
        ws.set_comment_at(addr.row, addr.col, comment.clone());
        self.push_command(Command::Comment {
            sheet,
            row: addr.row,
            col: addr.col,
            prior,
            new: Some(comment),
        });
        Ok(())
    }

    /// Remove a cell's comment
    pub fn remove_comment(&mut self, sheet: usize, address: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        let ws = self.sheet_mut(sheet)?;
        let prior = ws.remove_comment_at(addr.row, addr.col);
        if prior.is_some() {
            self.push_command(Command::Comment {
                sheet,
                row: addr.row,
                col: addr.col,
                prior,
                new: None,
            });
        }
        Ok(())
    }

    // === Merged regions ===

    /// Merge a range of cells
    pub fn merge_cells(&mut self, sheet: usize, range: &CellRange) -> Result<()> {
        let ws = self.sheet_mut(sheet)?;
        let prior = ws.merged_regions().to_vec();
        ws.merge_cells(range)?;
        let new = ws.merged_regions().to_vec();
        self.push_command(Command::Merge { sheet, prior, new });
        Ok(())
    }

    /// Unmerge a previously merged range
    pub fn unmerge_cells(&mut self, sheet: usize, range: &CellRange) -> Result<()> {
        let ws = self.sheet_mut(sheet)?;
        let prior = ws.merged_regions().to_vec();
        if ws.unmerge_cells(range) {
            let new = ws.merged_regions().to_vec();
            self.push_command(Command::Merge { sheet, prior, new });
        }
        Ok(())
    }

    // === Protection ===

    /// Enable sheet-wide protection
    pub fn protect_sheet(&mut self, sheet: usize) -> Result<()> {
        self.change_protection(sheet, |p| p.enable())
    }

    /// Disable sheet protection
    pub fn unprotect_sheet(&mut self, sheet: usize) -> Result<()> {
        self.change_protection(sheet, |p| p.disable())
    }

    /// Add a protection region override (usually an unlocked carve-out)
    pub fn add_protection_region(&mut self, sheet: usize, region: ProtectionRegion) -> Result<()> {
        self.change_protection(sheet, |p| p.add_region(region))
    }

    fn change_protection(
        &mut self,
        sheet: usize,
        change: impl FnOnce(&mut sheetflow_core::SheetProtection),
    ) -> Result<()> {
        let ws = self.sheet_mut(sheet)?;
        let prior = ws.protection().clone();
        change(ws.protection_mut());
        let new = ws.protection().clone();
        self.push_command(Command::Protection { sheet, prior, new });
        Ok(())
    }

    // === Conditional formats ===

    /// Add a conditional format rule
    pub fn add_conditional_format(&mut self, sheet: usize, rule: ConditionalFormatRule) -> Result<()> {
        let ws = self.sheet_mut(sheet)?;
        let prior = ws.conditional_formats().to_vec();
        ws.add_conditional_format(rule);
        let new = ws.conditional_formats().to_vec();
        self.push_command(Command::ConditionalFormats { sheet, prior, new });
        Ok(())
    }

    // === Locale ===

    /// Change the formula locale, re-parsing every stored formula text.
    ///
    /// Formulas that no longer parse under the new separators keep their
    /// text and display `Error(InvalidFormula)`; formulas that now parse
    /// differently are recalculated. Not an undoable document edit.
    pub fn set_locale(&mut self, locale: Locale) {
        if locale == self.locale {
            return;
        }
        self.locale = locale;

        let mut tracker = ChangeTracker::new();
        self.rebuild_parsed_state();
        let all: Vec<CellKey> = self.asts.keys().copied().collect();
        self.recalc_cells(all, &mut tracker);
        self.flush(tracker);
    }

    // === Undo / redo ===

    /// Undo the most recent command. Returns false when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> bool {
        let Some(command) = self.undo_stack.pop() else {
            return false;
        };
        self.revert_command(&command);
        self.redo_stack.push(command);
        true
    }

    /// Redo the most recently undone command
    pub fn redo(&mut self) -> bool {
        let Some(mut command) = self.redo_stack.pop() else {
            return false;
        };
        self.reapply_command(&mut command);
        self.undo_stack.push(command);
        true
    }

    /// Number of commands available to undo
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    fn revert_command(&mut self, command: &Command) {
        match command {
            Command::SetCell {
                sheet,
                row,
                col,
                prior,
                ..
            } => {
                let mut tracker = ChangeTracker::new();
                self.write_cell(*sheet, *row, *col, prior.clone(), &mut tracker);
                self.run_recalc(&[CellKey::new(*sheet, *row, *col)], &mut tracker);
                self.flush(tracker);
            }
            Command::Comment {
                sheet,
                row,
                col,
                prior,
                ..
            } => {
                if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                    match prior {
                        Some(comment) => ws.set_comment_at(*row, *col, comment.clone()),
                        None => {
                            ws.remove_comment_at(*row, *col);
                        }
                    }
                }
            }
            Command::Merge { sheet, prior, .. } => {
                if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                    ws.set_merged_regions(prior.clone());
                }
            }
            Command::Protection { sheet, prior, .. } => {
                if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                    *ws.protection_mut() = prior.clone();
                }
            }
            Command::ConditionalFormats { sheet, prior, .. } => {
                if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                    ws.set_conditional_formats(prior.clone());
                }
            }
            Command::Structural { sheet, op, capture } => {
                self.undo_structural(*sheet, op, capture);
            }
        }
    }

    fn reapply_command(&mut self, command: &mut Command) {
        match command {
            Command::SetCell {
                sheet,
                row,
                col,
                new,
                ..
            } => {
                let (sheet, row, col, new) = (*sheet, *row, *col, new.clone());
                let mut tracker = ChangeTracker::new();
                self.write_cell(sheet, row, col, new, &mut tracker);
                self.run_recalc(&[CellKey::new(sheet, row, col)], &mut tracker);
                self.flush(tracker);
            }
            Command::Comment {
                sheet,
                row,
                col,
                new,
                ..
            } => {
                if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                    match new {
                        Some(comment) => ws.set_comment_at(*row, *col, comment.clone()),
                        None => {
                            ws.remove_comment_at(*row, *col);
                        }
                    }
                }
            }
            Command::Merge { sheet, new, .. } => {
                if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                    ws.set_merged_regions(new.clone());
                }
            }
            Command::Protection { sheet, new, .. } => {
                if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                    *ws.protection_mut() = new.clone();
                }
            }
            Command::ConditionalFormats { sheet, new, .. } => {
                if let Some(ws) = self.workbook.worksheet_mut(*sheet) {
                    ws.set_conditional_formats(new.clone());
                }
            }
            Command::Structural { sheet, op, capture } => {
                // Re-running the edit reproduces the exact post-command
                // state; the fresh capture replaces the stale one so a
                // following undo restores correctly.
                let mut tracker = ChangeTracker::new();
                let fresh = self.apply_structural_edit(*sheet, *op, &mut tracker);
                self.flush(tracker);
                *capture = fresh;
            }
        }
    }

    pub(crate) fn push_command(&mut self, command: Command) {
        self.redo_stack.clear();
        self.undo_stack.push(command);
        if self.undo_stack.len() > self.undo_limit {
            self.undo_stack.remove(0);
        }
    }

    // === Internals ===

    pub(crate) fn sheet_ref(&self, index: usize) -> Result<&Worksheet> {
        self.workbook
            .worksheet(index)
            .ok_or(Error::SheetOutOfBounds(index, self.workbook.sheet_count()))
    }

    pub(crate) fn sheet_mut(&mut self, index: usize) -> Result<&mut Worksheet> {
        let count = self.workbook.sheet_count();
        self.workbook
            .worksheet_mut(index)
            .ok_or(Error::SheetOutOfBounds(index, count))
    }

    fn check_unlocked(&self, ws: &Worksheet, row: u32, col: u16) -> Result<()> {
        if ws.is_locked(row, col) {
            Err(Error::ProtectedCell(
                CellAddress::new(row, col).to_a1_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Evaluate one formula cell against the current workbook state
    pub(crate) fn evaluate_cell(&self, key: CellKey) -> Option<CellValue> {
        let ast = self.asts.get(&key)?;
        Some(self.evaluate_ast(ast, key.sheet).into())
    }

    /// Evaluate an arbitrary AST as if it sat on the given sheet
    pub(crate) fn evaluate_ast(&self, ast: &FormulaExpr, current_sheet: usize) -> FormulaValue {
        let resolver = EngineResolver {
            workbook: &self.workbook,
            current_sheet,
            subtotal_cells: &self.subtotal_cells,
        };
        let ctx = EvaluationContext::new(&resolver);
        evaluate(ast, &ctx)
    }

    /// Turn tracked prior values into events for addresses whose displayed
    /// value actually changed
    pub(crate) fn flush(&mut self, tracker: ChangeTracker) {
        let mut changed = Vec::new();
        for (key, old) in tracker.drain() {
            let new = self
                .workbook
                .worksheet(key.sheet)
                .map(|ws| ws.display_value_at(key.row, key.col))
                .unwrap_or(CellValue::Empty);
            if new != old {
                changed.push(CellChanged {
                    sheet: key.sheet,
                    row: key.row,
                    col: key.col,
                    old,
                    new,
                });
            }
        }
        changed.sort_by_key(|c| (c.sheet, c.row, c.col));
        self.events.extend(changed);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_data(value: CellValue, style_index: u32) -> Option<CellData> {
    if value.is_empty() && style_index == 0 {
        None
    } else {
        Some(CellData::with_style(value, style_index))
    }
}

/// Cell lookup for the evaluator, bound to the sheet of the formula being
/// evaluated.
struct EngineResolver<'a> {
    workbook: &'a Workbook,
    current_sheet: usize,
    subtotal_cells: &'a AHashSet<CellKey>,
}

impl EngineResolver<'_> {
    fn resolve_sheet(&self, sheet: Option<&str>) -> Option<usize> {
        match sheet {
            None => Some(self.current_sheet),
            Some(name) => self.workbook.sheet_index(name),
        }
    }
}

impl CellResolver for EngineResolver<'_> {
    fn cell_value(&self, sheet: Option<&str>, row: u32, col: u16) -> FormulaValue {
        let Some(index) = self.resolve_sheet(sheet) else {
            return FormulaValue::Error(CellError::Ref);
        };
        let Some(ws) = self.workbook.worksheet(index) else {
            return FormulaValue::Error(CellError::Ref);
        };
        match ws.display_value_at(row, col) {
            // Reading a cell already in error state propagates #VALUE!
            CellValue::Error(_) => FormulaValue::Error(CellError::Value),
            value => value.into(),
        }
    }

    fn is_subtotal_cell(&self, sheet: Option<&str>, row: u32, col: u16) -> bool {
        self.resolve_sheet(sheet)
            .is_some_and(|index| self.subtotal_cells.contains(&CellKey::new(index, row, col)))
    }
}
