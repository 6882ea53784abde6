//! # sheetflow
//!
//! A spreadsheet engine: a cell-addressed document model with formula
//! evaluation, dependency-driven recalculation, structural edits
//! (row/column insert, delete, and region move with reference rewriting),
//! undo/redo, cell protection, and conditional formatting.
//!
//! The engine is synchronous and single-writer: every mutation — including
//! the full recalculation it triggers — completes before control returns,
//! so the model is always consistent between calls. Rendering, file
//! import/export, and event wiring are external collaborators that consume
//! the engine's API and [`CellChanged`] notifications.
//!
//! ## Example
//!
//! ```rust
//! use sheetflow::{CellValue, Engine};
//!
//! let mut engine = Engine::new();
//! engine.set_value(0, "A1", 10.0).unwrap();
//! engine.set_value(0, "A2", 20.0).unwrap();
//! engine.set_formula(0, "A3", "=A1+A2").unwrap();
//!
//! assert_eq!(
//!     engine.display_value(0, "A3").unwrap(),
//!     CellValue::Number(30.0)
//! );
//!
//! engine.undo();
//! assert_eq!(engine.display_value(0, "A3").unwrap(), CellValue::Empty);
//! ```

mod command;
mod conditional;
pub mod engine;
pub mod events;
pub mod prelude;
mod recalc;
mod structural;

pub use engine::{Engine, EngineConfig};
pub use events::CellChanged;

// Re-export the document model
pub use sheetflow_core::{
    CellAddress, CellComment, CellData, CellError, CellRange, CellValue, CfCondition, CfOperator,
    ConditionalFormatRule, Error, ProtectionRegion, Result, SheetProtection, ShiftOp, Workbook,
    Worksheet, MAX_COLS, MAX_ROWS,
};

// Re-export the formula layer
pub use sheetflow_formula::{
    evaluate, parse_formula, CellResolver, EvaluationContext, FormulaError, FormulaExpr,
    FormulaResult, FormulaValue, Func, Locale,
};
