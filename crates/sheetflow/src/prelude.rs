//! Convenient re-exports for typical engine usage
//!
//! ```rust
//! use sheetflow::prelude::*;
//!
//! let mut engine = Engine::new();
//! engine.set_value(0, "A1", 2.0).unwrap();
//! engine.set_formula(0, "B1", "=A1*21").unwrap();
//! assert_eq!(engine.display_value(0, "B1").unwrap(), CellValue::Number(42.0));
//! ```

pub use crate::engine::{Engine, EngineConfig};
pub use crate::events::CellChanged;

pub use sheetflow_core::{
    CellAddress, CellComment, CellError, CellRange, CellValue, ConditionalFormatRule, Error,
    ProtectionRegion, Result, Worksheet,
};

pub use sheetflow_formula::{FormulaValue, Locale};
