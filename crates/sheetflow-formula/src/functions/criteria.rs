//! Criteria matching for COUNTIF and SUMIF
//!
//! Criteria can be:
//! - A number: exact match (e.g., 5)
//! - A text string: case-insensitive match (e.g., "apple")
//! - A comparison expression: ">5", ">=10", "<100", "<=50", "<>0", "=5"
//! - Wildcards: "*" matches any characters, "?" matches a single character
//! - Empty string: matches empty cells

use crate::evaluator::FormulaValue;
use sheetflow_core::CellError;

/// Criteria matcher shared by COUNTIF and SUMIF
#[derive(Debug)]
pub struct CriteriaMatcher {
    criteria_type: CriteriaType,
}

#[derive(Debug)]
enum CriteriaType {
    /// Exact number match
    Number(f64),
    /// Comparison with number (operator, value)
    Comparison(ComparisonOp, f64),
    /// Text match (case-insensitive, with wildcards)
    Text(String),
    /// Match empty values
    Empty,
}

#[derive(Debug, Clone, Copy)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl CriteriaMatcher {
    /// Build a matcher from the evaluated criteria argument
    pub fn new(criteria: &FormulaValue) -> Self {
        let criteria_type = match criteria {
            FormulaValue::Number(n) => CriteriaType::Number(*n),
            FormulaValue::Boolean(b) => CriteriaType::Number(if *b { 1.0 } else { 0.0 }),
            FormulaValue::Text(s) => Self::parse_text_criteria(s),
            FormulaValue::Empty => CriteriaType::Empty,
            // Errors and arrays match nothing
            FormulaValue::Error(_) | FormulaValue::Array(_) => CriteriaType::Empty,
        };

        Self { criteria_type }
    }

    fn parse_text_criteria(s: &str) -> CriteriaType {
        let s = s.trim();

        if s.is_empty() {
            return CriteriaType::Empty;
        }
        if let Some(ct) = Self::try_parse_comparison(s) {
            return ct;
        }
        if let Ok(n) = s.parse::<f64>() {
            return CriteriaType::Number(n);
        }
        CriteriaType::Text(s.to_lowercase())
    }

    fn try_parse_comparison(s: &str) -> Option<CriteriaType> {
        // Longer operators first
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            return None;
        };

        // Text after an operator (e.g. ">A") falls back to text matching
        rest.trim()
            .parse::<f64>()
            .ok()
            .map(|n| CriteriaType::Comparison(op, n))
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &FormulaValue) -> bool {
        match &self.criteria_type {
            // Only actual numeric values match a number criteria; text that
            // merely looks numeric does not
            CriteriaType::Number(criteria) => match value {
                FormulaValue::Number(n) => (n - criteria).abs() < 1e-10,
                FormulaValue::Boolean(b) => {
                    let n = if *b { 1.0 } else { 0.0 };
                    (n - criteria).abs() < 1e-10
                }
                _ => false,
            },

            CriteriaType::Comparison(op, criteria) => {
                let n = match value {
                    FormulaValue::Number(n) => *n,
                    FormulaValue::Boolean(b) => {
                        if *b {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    _ => return false,
                };
                match op {
                    ComparisonOp::Equal => (n - criteria).abs() < 1e-10,
                    ComparisonOp::NotEqual => (n - criteria).abs() >= 1e-10,
                    ComparisonOp::LessThan => n < *criteria,
                    ComparisonOp::LessEqual => n <= *criteria,
                    ComparisonOp::GreaterThan => n > *criteria,
                    ComparisonOp::GreaterEqual => n >= *criteria,
                }
            }

            CriteriaType::Text(pattern) => {
                let text = value.coerce_text().to_lowercase();
                wildcard_match(pattern, &text)
            }

            CriteriaType::Empty => {
                matches!(value, FormulaValue::Empty)
                    || matches!(value, FormulaValue::Text(s) if s.is_empty())
            }
        }
    }
}

/// Match with wildcards: * = any characters, ? = single character
fn wildcard_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') && !pattern.contains('?') {
        return pattern == text;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(sp) = star_pi {
            pi = sp + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

/// Iterate an evaluated range argument as a flat value sequence (a scalar is
/// a one-element sequence)
fn flatten(value: &FormulaValue) -> Vec<&FormulaValue> {
    match value {
        FormulaValue::Array(rows) => rows.iter().flatten().collect(),
        other => vec![other],
    }
}

/// COUNTIF(range, criteria)
pub fn count_if(args: &[FormulaValue]) -> FormulaValue {
    if args.len() < 2 {
        return FormulaValue::Error(CellError::Value);
    }
    let matcher = CriteriaMatcher::new(&args[1]);
    let mut count = 0u64;
    for value in flatten(&args[0]) {
        if let FormulaValue::Error(e) = value {
            return FormulaValue::Error(*e);
        }
        if matcher.matches(value) {
            count += 1;
        }
    }
    FormulaValue::Number(count as f64)
}

/// SUMIF(range, criteria, [sum_range])
pub fn sum_if(args: &[FormulaValue]) -> FormulaValue {
    if args.len() < 2 {
        return FormulaValue::Error(CellError::Value);
    }
    let matcher = CriteriaMatcher::new(&args[1]);
    let test_values = flatten(&args[0]);
    let sum_values = if args.len() > 2 {
        flatten(&args[2])
    } else {
        test_values.clone()
    };

    let mut total = 0.0;
    for (i, value) in test_values.iter().enumerate() {
        if let FormulaValue::Error(e) = value {
            return FormulaValue::Error(*e);
        }
        if !matcher.matches(value) {
            continue;
        }
        // A matched position with no counterpart in sum_range adds nothing
        if let Some(summed) = sum_values.get(i) {
            match summed {
                FormulaValue::Number(n) => total += n,
                FormulaValue::Error(e) => return FormulaValue::Error(*e),
                _ => {}
            }
        }
    }
    FormulaValue::Number(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_number_criteria() {
        let matcher = CriteriaMatcher::new(&FormulaValue::Number(5.0));
        assert!(matcher.matches(&FormulaValue::Number(5.0)));
        assert!(!matcher.matches(&FormulaValue::Number(4.0)));
        assert!(!matcher.matches(&FormulaValue::Text("5".into())));
    }

    #[test]
    fn test_comparison_criteria() {
        let matcher = CriteriaMatcher::new(&FormulaValue::Text(">5".into()));
        assert!(matcher.matches(&FormulaValue::Number(6.0)));
        assert!(!matcher.matches(&FormulaValue::Number(5.0)));

        let matcher = CriteriaMatcher::new(&FormulaValue::Text("<>5".into()));
        assert!(matcher.matches(&FormulaValue::Number(6.0)));
        assert!(!matcher.matches(&FormulaValue::Number(5.0)));

        let matcher = CriteriaMatcher::new(&FormulaValue::Text("<=5".into()));
        assert!(matcher.matches(&FormulaValue::Number(5.0)));
        assert!(!matcher.matches(&FormulaValue::Number(6.0)));
    }

    #[test]
    fn test_text_and_wildcard_criteria() {
        let matcher = CriteriaMatcher::new(&FormulaValue::Text("apple".into()));
        assert!(matcher.matches(&FormulaValue::Text("APPLE".into())));
        assert!(!matcher.matches(&FormulaValue::Text("pear".into())));

        let matcher = CriteriaMatcher::new(&FormulaValue::Text("a*e".into()));
        assert!(matcher.matches(&FormulaValue::Text("apple".into())));
        assert!(matcher.matches(&FormulaValue::Text("ae".into())));
        assert!(!matcher.matches(&FormulaValue::Text("apples".into())));

        let matcher = CriteriaMatcher::new(&FormulaValue::Text("a?ple".into()));
        assert!(matcher.matches(&FormulaValue::Text("apple".into())));
        assert!(!matcher.matches(&FormulaValue::Text("aple".into())));
    }

    #[test]
    fn test_count_if() {
        let range = FormulaValue::Array(vec![vec![
            FormulaValue::Number(1.0),
            FormulaValue::Number(5.0),
            FormulaValue::Number(10.0),
            FormulaValue::Text("x".into()),
        ]]);
        let result = count_if(&[range, FormulaValue::Text(">=5".into())]);
        assert_eq!(result, FormulaValue::Number(2.0));
    }

    #[test]
    fn test_sum_if_with_sum_range() {
        let test = FormulaValue::Array(vec![vec![
            FormulaValue::Text("a".into()),
            FormulaValue::Text("b".into()),
            FormulaValue::Text("a".into()),
        ]]);
        let sums = FormulaValue::Array(vec![vec![
            FormulaValue::Number(10.0),
            FormulaValue::Number(20.0),
            FormulaValue::Number(30.0),
        ]]);
        let result = sum_if(&[test, FormulaValue::Text("a".into()), sums]);
        assert_eq!(result, FormulaValue::Number(40.0));
    }

    #[test]
    fn test_sum_if_without_sum_range() {
        let range = FormulaValue::Array(vec![vec![
            FormulaValue::Number(1.0),
            FormulaValue::Number(2.0),
            FormulaValue::Number(3.0),
        ]]);
        let result = sum_if(&[range, FormulaValue::Text(">1".into())]);
        assert_eq!(result, FormulaValue::Number(5.0));
    }
}
