//! # sheetflow-formula
//!
//! Formula parsing, evaluation, and dependency tracking for the sheetflow
//! spreadsheet engine.
//!
//! - [`parse_formula`] turns locale-dependent formula text into a
//!   locale-independent [`FormulaExpr`] AST
//! - [`evaluate`] computes a value against a [`CellResolver`] lookup
//! - [`DependencyGraph`] tracks which formulas read which cells and ranges
//! - [`rewrite_expr`] adjusts ASTs in place for structural edits
//!
//! ## Example
//!
//! ```rust
//! use sheetflow_formula::{evaluate, parse_formula, EvaluationContext, FormulaValue, Locale};
//!
//! let ast = parse_formula("=1+2*3", &Locale::PERIOD_DECIMAL).unwrap();
//! let result = evaluate(&ast, &EvaluationContext::detached());
//! assert_eq!(result, FormulaValue::Number(7.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod locale;
pub mod parser;
pub mod rewrite;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use dependency::{extract_references, CellKey, DependencyGraph, RefTarget};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, CellResolver, EvaluationContext, FormulaValue};
pub use functions::{criteria::CriteriaMatcher, Func};
pub use locale::Locale;
pub use parser::parse_formula;
pub use rewrite::rewrite_expr;
