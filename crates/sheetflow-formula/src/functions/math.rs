//! Numeric aggregation functions
//!
//! Range arguments follow spreadsheet aggregation rules: only numbers
//! participate, text/booleans/empties inside a range are skipped. Scalar
//! arguments coerce (booleans to 0/1, numeric text to its value) and fail
//! with #VALUE! when they cannot. Any error value encountered propagates —
//! no function tolerates errors.

use crate::evaluator::FormulaValue;
use sheetflow_core::CellError;

/// Collect the participating numbers from an argument list
fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for value in rows.iter().flatten() {
                    match value {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Empty => {}
            scalar => match scalar.coerce_number() {
                Some(n) => numbers.push(n),
                None => return Err(CellError::Value),
            },
        }
    }
    Ok(numbers)
}

pub fn sum(args: &[FormulaValue]) -> FormulaValue {
    match collect_numbers(args) {
        Ok(numbers) => FormulaValue::Number(numbers.iter().sum()),
        Err(e) => FormulaValue::Error(e),
    }
}

pub fn product(args: &[FormulaValue]) -> FormulaValue {
    match collect_numbers(args) {
        Ok(numbers) if numbers.is_empty() => FormulaValue::Number(0.0),
        Ok(numbers) => FormulaValue::Number(numbers.iter().product()),
        Err(e) => FormulaValue::Error(e),
    }
}

pub fn average(args: &[FormulaValue]) -> FormulaValue {
    match collect_numbers(args) {
        Ok(numbers) if numbers.is_empty() => FormulaValue::Error(CellError::Div0),
        Ok(numbers) => {
            FormulaValue::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
        }
        Err(e) => FormulaValue::Error(e),
    }
}

pub fn count(args: &[FormulaValue]) -> FormulaValue {
    match collect_numbers(args) {
        Ok(numbers) => FormulaValue::Number(numbers.len() as f64),
        Err(e) => FormulaValue::Error(e),
    }
}

/// COUNTA counts every non-empty value, whatever its type
pub fn count_a(args: &[FormulaValue]) -> FormulaValue {
    let mut count = 0u64;
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for value in rows.iter().flatten() {
                    match value {
                        FormulaValue::Error(e) => return FormulaValue::Error(*e),
                        FormulaValue::Empty => {}
                        _ => count += 1,
                    }
                }
            }
            FormulaValue::Error(e) => return FormulaValue::Error(*e),
            FormulaValue::Empty => {}
            _ => count += 1,
        }
    }
    FormulaValue::Number(count as f64)
}
