//! Formula Abstract Syntax Tree types
//!
//! ASTs are built once per formula text and rewritten in place (not
//! re-parsed) when structural edits shift references, so every node that
//! carries an address keeps its absolute/relative markers. `to_formula_text`
//! regenerates source text from a rewritten tree.

use crate::functions::Func;
use crate::locale::Locale;
use sheetflow_core::{CellAddress, CellError, CellRange};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// Text literal
    Text(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal (also produced by rewriting a deleted reference)
    Error(CellError),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call (closed function set) ===
    Call { func: Func, args: Vec<FormulaExpr> },
}

/// Cell reference with optional sheet qualifier
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet qualifier
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}

impl BinaryOperator {
    /// Operator precedence, higher binds tighter
    fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 1,
            BinaryOperator::Concat => 2,
            BinaryOperator::Add | BinaryOperator::Subtract => 3,
            BinaryOperator::Multiply | BinaryOperator::Divide => 4,
            BinaryOperator::Power => 5,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
        }
    }

    fn is_right_associative(&self) -> bool {
        matches!(self, BinaryOperator::Power)
    }
}

impl FormulaExpr {
    /// Render the full formula text (leading `=`) under the given locale
    pub fn to_formula_text(&self, locale: &Locale) -> String {
        format!("={}", self.render(locale))
    }

    fn precedence(&self) -> u8 {
        match self {
            FormulaExpr::BinaryOp { op, .. } => op.precedence(),
            FormulaExpr::UnaryOp { .. } => 6,
            _ => 7,
        }
    }

    fn render(&self, locale: &Locale) -> String {
        match self {
            FormulaExpr::Number(n) => render_number(*n, locale),
            FormulaExpr::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            FormulaExpr::Error(e) => e.as_str().to_string(),
            FormulaExpr::CellRef(r) => {
                format!("{}{}", render_sheet_prefix(&r.sheet), r.address.to_a1_string())
            }
            FormulaExpr::RangeRef(r) => {
                // Always render both corners so single-cell ranges stay ranges
                format!(
                    "{}{}:{}",
                    render_sheet_prefix(&r.sheet),
                    r.range.start.to_a1_string(),
                    r.range.end.to_a1_string()
                )
            }
            FormulaExpr::BinaryOp { op, left, right } => {
                let prec = op.precedence();
                let left_needs_parens = left.precedence() < prec
                    || (left.precedence() == prec && op.is_right_associative());
                let right_needs_parens = right.precedence() < prec
                    || (right.precedence() == prec && !op.is_right_associative());
                format!(
                    "{}{}{}",
                    parenthesize(left.render(locale), left_needs_parens),
                    op.symbol(),
                    parenthesize(right.render(locale), right_needs_parens),
                )
            }
            FormulaExpr::UnaryOp { op, operand } => {
                let inner = parenthesize(operand.render(locale), operand.precedence() < 6);
                match op {
                    UnaryOperator::Negate => format!("-{}", inner),
                    UnaryOperator::Percent => format!("{}%", inner),
                }
            }
            FormulaExpr::Call { func, args } => {
                let rendered: Vec<String> = args.iter().map(|a| a.render(locale)).collect();
                format!(
                    "{}({})",
                    func.name(),
                    rendered.join(&locale.argument_separator.to_string())
                )
            }
        }
    }
}

fn parenthesize(s: String, needed: bool) -> String {
    if needed {
        format!("({})", s)
    } else {
        s
    }
}

fn render_sheet_prefix(sheet: &Option<String>) -> String {
    match sheet {
        None => String::new(),
        Some(name) => {
            let plain = name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if plain {
                format!("{}!", name)
            } else {
                format!("'{}'!", name)
            }
        }
    }
}

fn render_number(n: f64, locale: &Locale) -> String {
    let text = format!("{}", n);
    if locale.decimal_separator == '.' {
        text
    } else {
        text.replace('.', &locale.decimal_separator.to_string())
    }
}
