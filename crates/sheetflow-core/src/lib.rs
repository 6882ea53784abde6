//! # sheetflow-core
//!
//! Core document model for the sheetflow spreadsheet engine.
//!
//! This crate provides the fundamental types used throughout sheetflow:
//! - [`CellValue`] - Cell values (numbers, text, booleans, errors, formulas)
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and ranges
//! - [`ShiftOp`] - Structural-edit address translation
//! - [`Workbook`], [`Worksheet`] - The document structure, including
//!   comments, merged regions, conditional-format rules, and protection
//!
//! ## Example
//!
//! ```rust
//! use sheetflow_core::{Workbook, CellValue};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_value("A1", "Hello").unwrap();
//! sheet.set_value("B1", 42.0).unwrap();
//! assert_eq!(sheet.value("B1").unwrap(), CellValue::Number(42.0));
//! ```

pub mod cell;
pub mod comment;
pub mod conditional_format;
pub mod error;
pub mod protection;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{
    translate_address, translate_position, translate_range, CellAddress, CellData, CellError,
    CellRange, CellStorage, CellValue, SharedString, ShiftOp, Translation,
};
pub use comment::CellComment;
pub use conditional_format::{CfCondition, CfOperator, ConditionalFormatRule};
pub use error::{Error, Result};
pub use protection::{ProtectionRegion, SheetProtection};
pub use workbook::Workbook;
pub use worksheet::{ShiftRemovals, Worksheet};

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
