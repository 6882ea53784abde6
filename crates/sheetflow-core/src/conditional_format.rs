//! Conditional formatting rules
//!
//! A rule is a (ranges, condition, style index) triple. The engine
//! re-evaluates all rules after every recalculation pass, since conditions
//! may reference recalculated values; this module only holds the rule data
//! model and the value-type-aware `CellIs` comparison.

use crate::cell::shift::{translate_range, ShiftOp, Translation};
use crate::{CellRange, CellValue};

/// Comparison operators for `CellIs` conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Between,
    NotBetween,
}

/// The condition a rule tests against each cell of its ranges
#[derive(Debug, Clone, PartialEq)]
pub enum CfCondition {
    /// Compare the cell's displayed value against one or two operands
    CellIs {
        operator: CfOperator,
        operand: CellValue,
        /// Second operand, used by Between/NotBetween
        operand2: Option<CellValue>,
    },
    /// A predicate formula evaluated relative to each cell of the range;
    /// the rule matches where it yields TRUE
    Expression { formula: String },
}

/// A conditional formatting rule
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalFormatRule {
    /// The condition to test
    pub condition: CfCondition,
    /// Cell ranges this rule applies to
    pub ranges: Vec<CellRange>,
    /// Opaque style index applied where the condition holds
    pub style_index: u32,
    /// Priority (lower = evaluated first)
    pub priority: u32,
    /// Stop evaluating lower-priority rules for a cell once this one matches
    pub stop_if_true: bool,
}

impl ConditionalFormatRule {
    /// Create a rule from a condition
    pub fn new(condition: CfCondition) -> Self {
        Self {
            condition,
            ranges: Vec::new(),
            style_index: 0,
            priority: 1,
            stop_if_true: false,
        }
    }

    /// Cells greater than a value
    pub fn cell_is_greater_than(value: impl Into<CellValue>) -> Self {
        Self::new(CfCondition::CellIs {
            operator: CfOperator::GreaterThan,
            operand: value.into(),
            operand2: None,
        })
    }

    /// Cells less than a value
    pub fn cell_is_less_than(value: impl Into<CellValue>) -> Self {
        Self::new(CfCondition::CellIs {
            operator: CfOperator::LessThan,
            operand: value.into(),
            operand2: None,
        })
    }

    /// Cells equal to a value
    pub fn cell_is_equal_to(value: impl Into<CellValue>) -> Self {
        Self::new(CfCondition::CellIs {
            operator: CfOperator::Equal,
            operand: value.into(),
            operand2: None,
        })
    }

    /// Cells between two values (inclusive)
    pub fn cell_is_between(low: impl Into<CellValue>, high: impl Into<CellValue>) -> Self {
        Self::new(CfCondition::CellIs {
            operator: CfOperator::Between,
            operand: low.into(),
            operand2: Some(high.into()),
        })
    }

    /// Cells where a predicate formula yields TRUE
    pub fn expression(formula: impl Into<String>) -> Self {
        Self::new(CfCondition::Expression {
            formula: formula.into(),
        })
    }

    /// Add a cell range to this rule
    pub fn with_range(mut self, range: CellRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Set the style index applied on match
    pub fn with_style_index(mut self, style_index: u32) -> Self {
        self.style_index = style_index;
        self
    }

    /// Set the priority (lower = evaluated first)
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set whether to stop processing further rules on match
    pub fn with_stop_if_true(mut self, stop: bool) -> Self {
        self.stop_if_true = stop;
        self
    }

    /// Check if this rule applies to a specific cell
    pub fn applies_to(&self, row: u32, col: u16) -> bool {
        self.ranges.iter().any(|r| r.contains_position(row, col))
    }

    /// Relocate the rule's ranges through a structural edit.
    ///
    /// Returns false when every range was deleted and the rule should be
    /// dropped.
    pub fn apply_shift(&mut self, op: &ShiftOp) -> bool {
        let old = std::mem::take(&mut self.ranges);
        for range in old {
            match translate_range(&range, op) {
                Translation::Unchanged => self.ranges.push(range),
                Translation::Shifted(r) => self.ranges.push(r),
                Translation::Deleted => {}
            }
        }
        !self.ranges.is_empty()
    }
}

impl CfOperator {
    /// Value-type-aware comparison.
    ///
    /// Numbers compare numerically, text compares case-insensitively and
    /// only against text, booleans only against booleans. Mismatched types
    /// match `NotEqual` and nothing else.
    pub fn compare(&self, value: &CellValue, operand: &CellValue, operand2: Option<&CellValue>) -> bool {
        match self {
            CfOperator::Between => {
                let Some(high) = operand2 else { return false };
                CfOperator::GreaterEqual.compare(value, operand, None)
                    && CfOperator::LessEqual.compare(value, high, None)
            }
            CfOperator::NotBetween => {
                let Some(high) = operand2 else { return false };
                !(CfOperator::GreaterEqual.compare(value, operand, None)
                    && CfOperator::LessEqual.compare(value, high, None))
            }
            _ => compare_scalar(*self, value, operand),
        }
    }
}

fn compare_scalar(op: CfOperator, value: &CellValue, operand: &CellValue) -> bool {
    use std::cmp::Ordering;

    let value = value.effective_value();
    let operand = operand.effective_value();

    let ordering = match (value, operand) {
        (CellValue::Number(a), CellValue::Number(b)) => a.partial_cmp(b),
        (CellValue::Boolean(a), CellValue::Boolean(b)) => Some(a.cmp(b)),
        (CellValue::Text(a), CellValue::Text(b)) => {
            Some(a.as_str().to_lowercase().cmp(&b.as_str().to_lowercase()))
        }
        _ => None,
    };

    let Some(ordering) = ordering else {
        // Type mismatch: only NotEqual holds
        return op == CfOperator::NotEqual;
    };

    match op {
        CfOperator::Equal => ordering == Ordering::Equal,
        CfOperator::NotEqual => ordering != Ordering::Equal,
        CfOperator::GreaterThan => ordering == Ordering::Greater,
        CfOperator::GreaterEqual => ordering != Ordering::Less,
        CfOperator::LessThan => ordering == Ordering::Less,
        CfOperator::LessEqual => ordering != Ordering::Greater,
        CfOperator::Between | CfOperator::NotBetween => false,
    }
}
