//! SUBTOTAL: aggregate a range while skipping nested subtotal results
//!
//! `SUBTOTAL(code, ref1, ...)` aggregates its references with the function
//! selected by `code`, excluding any cell whose own formula is a live
//! SUBTOTAL output. The exclusion is what makes stacked subtotal rows sum
//! correctly without double counting. Exclusion is single-level: a skipped
//! cell's inputs are not themselves inspected.

use super::math;
use crate::ast::FormulaExpr;
use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
use sheetflow_core::CellError;

/// Aggregation codes in the classic SUBTOTAL numbering
const CODE_AVERAGE: i64 = 1;
const CODE_COUNT: i64 = 2;
const CODE_COUNTA: i64 = 3;
const CODE_PRODUCT: i64 = 6;
const CODE_SUM: i64 = 9;

/// Evaluate a SUBTOTAL call. Arguments arrive unevaluated because the
/// aggregation needs cell addresses, not just values, to apply the
/// nested-subtotal exclusion.
pub fn eval(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaValue {
    if args.len() < 2 {
        return FormulaValue::Error(CellError::Value);
    }
    let code = match evaluate(&args[0], ctx) {
        FormulaValue::Error(e) => return FormulaValue::Error(e),
        value => match value.coerce_number() {
            Some(n) if n.fract() == 0.0 => n as i64,
            _ => return FormulaValue::Error(CellError::Value),
        },
    };

    let mut values = Vec::new();
    for arg in &args[1..] {
        match arg {
            FormulaExpr::RangeRef(r) => {
                let sheet = r.sheet.as_deref();
                for addr in r.range.cells() {
                    if ctx.is_subtotal(sheet, addr.row, addr.col) {
                        continue;
                    }
                    values.push(ctx.cell(sheet, addr.row, addr.col));
                }
            }
            FormulaExpr::CellRef(r) => {
                let sheet = r.sheet.as_deref();
                if !ctx.is_subtotal(sheet, r.address.row, r.address.col) {
                    values.push(ctx.cell(sheet, r.address.row, r.address.col));
                }
            }
            // SUBTOTAL aggregates references, not computed scalars
            _ => return FormulaValue::Error(CellError::Value),
        }
    }

    let collected = FormulaValue::Array(vec![values]);
    match code {
        CODE_AVERAGE => math::average(&[collected]),
        CODE_COUNT => math::count(&[collected]),
        CODE_COUNTA => math::count_a(&[collected]),
        CODE_PRODUCT => math::product(&[collected]),
        CODE_SUM => math::sum(&[collected]),
        _ => FormulaValue::Error(CellError::Value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::CellResolver;
    use crate::locale::Locale;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    /// A fixed column of values, with some rows flagged as subtotal cells
    struct ColumnResolver {
        values: Vec<FormulaValue>,
        subtotal_rows: Vec<u32>,
    }

    impl CellResolver for ColumnResolver {
        fn cell_value(&self, _sheet: Option<&str>, row: u32, _col: u16) -> FormulaValue {
            self.values
                .get(row as usize)
                .cloned()
                .unwrap_or(FormulaValue::Empty)
        }

        fn is_subtotal_cell(&self, _sheet: Option<&str>, row: u32, _col: u16) -> bool {
            self.subtotal_rows.contains(&row)
        }
    }

    fn eval_with(resolver: &ColumnResolver, formula: &str) -> FormulaValue {
        let ast = parse_formula(formula, &Locale::PERIOD_DECIMAL).unwrap();
        evaluate(&ast, &EvaluationContext::new(resolver))
    }

    #[test]
    fn test_subtotal_sum_excludes_nested_subtotals() {
        // A1=10, A2=20, A3=SUBTOTAL(9,A1:A2)=30, A4=30, A5=40
        // SUBTOTAL(9,A1:A5) = 10+20+30+40 = 100, excluding A3's own 30
        let resolver = ColumnResolver {
            values: vec![
                FormulaValue::Number(10.0),
                FormulaValue::Number(20.0),
                FormulaValue::Number(30.0),
                FormulaValue::Number(30.0),
                FormulaValue::Number(40.0),
            ],
            subtotal_rows: vec![2],
        };

        assert_eq!(
            eval_with(&resolver, "=SUBTOTAL(9,A1:A5)"),
            FormulaValue::Number(100.0)
        );
    }

    #[test]
    fn test_subtotal_codes() {
        let resolver = ColumnResolver {
            values: vec![
                FormulaValue::Number(2.0),
                FormulaValue::Number(4.0),
                FormulaValue::Text("label".into()),
            ],
            subtotal_rows: vec![],
        };

        assert_eq!(
            eval_with(&resolver, "=SUBTOTAL(9,A1:A3)"),
            FormulaValue::Number(6.0)
        );
        assert_eq!(
            eval_with(&resolver, "=SUBTOTAL(1,A1:A3)"),
            FormulaValue::Number(3.0)
        );
        assert_eq!(
            eval_with(&resolver, "=SUBTOTAL(2,A1:A3)"),
            FormulaValue::Number(2.0)
        );
        assert_eq!(
            eval_with(&resolver, "=SUBTOTAL(3,A1:A3)"),
            FormulaValue::Number(3.0)
        );
        assert_eq!(
            eval_with(&resolver, "=SUBTOTAL(6,A1:A2)"),
            FormulaValue::Number(8.0)
        );
    }

    #[test]
    fn test_subtotal_rejects_bad_code_and_args() {
        let resolver = ColumnResolver {
            values: vec![FormulaValue::Number(1.0)],
            subtotal_rows: vec![],
        };
        assert_eq!(
            eval_with(&resolver, "=SUBTOTAL(7,A1:A1)"),
            FormulaValue::Error(CellError::Value)
        );
        assert_eq!(
            eval_with(&resolver, "=SUBTOTAL(9,5)"),
            FormulaValue::Error(CellError::Value)
        );
    }
}
