//! Formula evaluator
//!
//! Evaluation is pure per call: cell lookups go through the [`CellResolver`]
//! on the context, and every failure mode is a representable error value —
//! `evaluate` never panics and never returns `Err`.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::functions::{self, subtotal, Func};
use sheetflow_core::{CellError, CellRange, CellValue};

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
    /// An evaluated range: rows of values
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Coerce to a number the way arithmetic does: booleans to 0/1, numeric
    /// text to its value, empty to 0. `None` for everything else.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(true) => Some(1.0),
            FormulaValue::Boolean(false) => Some(0.0),
            FormulaValue::Text(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Coerce to display text (concatenation semantics)
    pub fn coerce_text(&self) -> String {
        match self {
            FormulaValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            FormulaValue::Text(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => CellError::Value.to_string(),
        }
    }

    /// The error kind, if this is an error value
    pub fn as_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::Text(s) => FormulaValue::Text(s.as_str().to_string()),
            CellValue::Boolean(b) => FormulaValue::Boolean(b),
            CellValue::Error(e) => FormulaValue::Error(e),
            CellValue::Formula { cached_value, .. } => cached_value
                .map(|v| (*v).into())
                .unwrap_or(FormulaValue::Empty),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::Text(s) => CellValue::text(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            FormulaValue::Array(_) => CellValue::Error(CellError::Value),
        }
    }
}

/// Cell lookup interface supplied by the engine.
///
/// Sheet-unqualified references (`sheet = None`) resolve against the sheet
/// of the formula being evaluated; the engine builds one resolver per
/// evaluation with that sheet baked in.
pub trait CellResolver {
    /// The displayed value of a cell
    fn cell_value(&self, sheet: Option<&str>, row: u32, col: u16) -> FormulaValue;

    /// Whether the cell's own formula is a live SUBTOTAL output (such cells
    /// are skipped by SUBTOTAL aggregation over a range)
    fn is_subtotal_cell(&self, _sheet: Option<&str>, _row: u32, _col: u16) -> bool {
        false
    }
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    resolver: Option<&'a dyn CellResolver>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context backed by a resolver
    pub fn new(resolver: &'a dyn CellResolver) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// A context with no cell store; references evaluate to Empty.
    /// Useful for evaluating literal-only formulas and in tests.
    pub fn detached() -> Self {
        Self { resolver: None }
    }

    pub(crate) fn cell(&self, sheet: Option<&str>, row: u32, col: u16) -> FormulaValue {
        match self.resolver {
            Some(r) => r.cell_value(sheet, row, col),
            None => FormulaValue::Empty,
        }
    }

    pub(crate) fn is_subtotal(&self, sheet: Option<&str>, row: u32, col: u16) -> bool {
        self.resolver
            .map(|r| r.is_subtotal_cell(sheet, row, col))
            .unwrap_or(false)
    }

    pub(crate) fn range_values(&self, sheet: Option<&str>, range: &CellRange) -> FormulaValue {
        let mut rows = Vec::with_capacity(range.row_count() as usize);
        for row in range.start.row..=range.end.row {
            let mut cols = Vec::with_capacity(range.col_count() as usize);
            for col in range.start.col..=range.end.col {
                cols.push(self.cell(sheet, row, col));
            }
            rows.push(cols);
        }
        FormulaValue::Array(rows)
    }
}

/// Evaluate a formula AST to a value
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaValue {
    match expr {
        FormulaExpr::Number(n) => FormulaValue::Number(*n),
        FormulaExpr::Text(s) => FormulaValue::Text(s.clone()),
        FormulaExpr::Boolean(b) => FormulaValue::Boolean(*b),
        FormulaExpr::Error(e) => FormulaValue::Error(*e),

        FormulaExpr::CellRef(r) => ctx.cell(r.sheet.as_deref(), r.address.row, r.address.col),
        FormulaExpr::RangeRef(r) => ctx.range_values(r.sheet.as_deref(), &r.range),

        FormulaExpr::BinaryOp { op, left, right } => {
            let left = evaluate(left, ctx);
            let right = evaluate(right, ctx);
            eval_binary(*op, left, right)
        }

        FormulaExpr::UnaryOp { op, operand } => {
            let value = evaluate(operand, ctx);
            if let Some(e) = value.as_error() {
                return FormulaValue::Error(e);
            }
            match op {
                UnaryOperator::Negate => match value.coerce_number() {
                    Some(n) => FormulaValue::Number(-n),
                    None => FormulaValue::Error(CellError::Value),
                },
                UnaryOperator::Percent => match value.coerce_number() {
                    Some(n) => FormulaValue::Number(n / 100.0),
                    None => FormulaValue::Error(CellError::Value),
                },
            }
        }

        FormulaExpr::Call { func, args } => {
            if *func == Func::Subtotal {
                return subtotal::eval(args, ctx);
            }

            let values: Vec<FormulaValue> = args.iter().map(|a| evaluate(a, ctx)).collect();
            // Scalar error arguments propagate before dispatch; errors inside
            // range arguments are the function's business
            if let Some(e) = values.iter().find_map(FormulaValue::as_error) {
                return FormulaValue::Error(e);
            }
            functions::dispatch(*func, &values)
        }
    }
}

fn eval_binary(op: BinaryOperator, left: FormulaValue, right: FormulaValue) -> FormulaValue {
    if let Some(e) = left.as_error() {
        return FormulaValue::Error(e);
    }
    if let Some(e) = right.as_error() {
        return FormulaValue::Error(e);
    }
    if matches!(left, FormulaValue::Array(_)) || matches!(right, FormulaValue::Array(_)) {
        return FormulaValue::Error(CellError::Value);
    }

    use BinaryOperator::*;
    match op {
        Add | Subtract | Multiply | Divide | Power => {
            let (Some(a), Some(b)) = (left.coerce_number(), right.coerce_number()) else {
                return FormulaValue::Error(CellError::Value);
            };
            match op {
                Add => FormulaValue::Number(a + b),
                Subtract => FormulaValue::Number(a - b),
                Multiply => FormulaValue::Number(a * b),
                Divide => {
                    if b == 0.0 {
                        FormulaValue::Error(CellError::Div0)
                    } else {
                        FormulaValue::Number(a / b)
                    }
                }
                Power => FormulaValue::Number(a.powf(b)),
                _ => unreachable!(),
            }
        }

        Concat => FormulaValue::Text(format!("{}{}", left.coerce_text(), right.coerce_text())),

        Equal | NotEqual | LessThan | LessEqual | GreaterThan | GreaterEqual => {
            let ordering = compare_values(&left, &right);
            let result = match op {
                Equal => ordering == std::cmp::Ordering::Equal,
                NotEqual => ordering != std::cmp::Ordering::Equal,
                LessThan => ordering == std::cmp::Ordering::Less,
                LessEqual => ordering != std::cmp::Ordering::Greater,
                GreaterThan => ordering == std::cmp::Ordering::Greater,
                GreaterEqual => ordering != std::cmp::Ordering::Less,
                _ => unreachable!(),
            };
            FormulaValue::Boolean(result)
        }
    }
}

/// Comparison ordering with spreadsheet type ranking: number < text < boolean.
/// Empty compares as 0, "", or FALSE depending on the other operand.
fn compare_values(left: &FormulaValue, right: &FormulaValue) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) | FormulaValue::Empty => 0,
            FormulaValue::Text(_) => 1,
            FormulaValue::Boolean(_) => 2,
            _ => 3,
        }
    }

    match (left, right) {
        (FormulaValue::Empty, FormulaValue::Text(s)) => "".cmp(s.to_lowercase().as_str()),
        (FormulaValue::Text(s), FormulaValue::Empty) => s.to_lowercase().as_str().cmp(""),
        (FormulaValue::Empty, FormulaValue::Boolean(b)) => false.cmp(b),
        (FormulaValue::Boolean(b), FormulaValue::Empty) => b.cmp(&false),
        (FormulaValue::Text(a), FormulaValue::Text(b)) => {
            a.to_lowercase().cmp(&b.to_lowercase())
        }
        (FormulaValue::Boolean(a), FormulaValue::Boolean(b)) => a.cmp(b),
        _ => match (left.coerce_number(), right.coerce_number()) {
            (Some(a), Some(b)) if rank(left) == rank(right) => {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            _ => rank(left).cmp(&rank(right)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::Locale;
    use crate::parser::parse_formula;

    fn eval_detached(formula: &str) -> FormulaValue {
        let ast = parse_formula(formula, &Locale::PERIOD_DECIMAL).unwrap();
        evaluate(&ast, &EvaluationContext::detached())
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval_detached("=1+2*3"), FormulaValue::Number(7.0));
        assert_eq!(eval_detached("=(1+2)*3"), FormulaValue::Number(9.0));
        assert_eq!(eval_detached("=2^3^2"), FormulaValue::Number(512.0));
        assert_eq!(eval_detached("=-3+5"), FormulaValue::Number(2.0));
        assert_eq!(eval_detached("=50%"), FormulaValue::Number(0.5));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            eval_detached("=1/0"),
            FormulaValue::Error(CellError::Div0)
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval_detached("=5>3"), FormulaValue::Boolean(true));
        assert_eq!(eval_detached("=5<=3"), FormulaValue::Boolean(false));
        assert_eq!(eval_detached("=5<>3"), FormulaValue::Boolean(true));
        assert_eq!(
            eval_detached("=\"Apple\"=\"APPLE\""),
            FormulaValue::Boolean(true)
        );
        // Text ranks above numbers
        assert_eq!(eval_detached("=\"1\">2"), FormulaValue::Boolean(true));
    }

    #[test]
    fn test_concat() {
        assert_eq!(
            eval_detached("=\"Total: \"&42"),
            FormulaValue::Text("Total: 42".into())
        );
    }

    #[test]
    fn test_error_literal_propagates() {
        assert_eq!(
            eval_detached("=#REF!+1"),
            FormulaValue::Error(CellError::Ref)
        );
    }

    #[test]
    fn test_text_coercion_in_arithmetic() {
        assert_eq!(eval_detached("=\"4\"+1"), FormulaValue::Number(5.0));
        assert_eq!(
            eval_detached("=\"abc\"+1"),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_function_through_detached_context() {
        assert_eq!(eval_detached("=SUM(1,2,3)"), FormulaValue::Number(6.0));
        assert_eq!(eval_detached("=AVERAGE(2,4)"), FormulaValue::Number(3.0));
    }
}
