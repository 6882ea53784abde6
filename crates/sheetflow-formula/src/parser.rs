//! Formula parser
//!
//! A recursive descent parser with the usual spreadsheet operator
//! precedence. Tokenization is locale-dependent in exactly two places: the
//! decimal separator inside number literals and the argument separator
//! between function arguments. `"=1,1+1"` is therefore `1.1+1` under a
//! comma-decimal locale and a parse error under a period-decimal one.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::Func;
use crate::locale::Locale;
use sheetflow_core::{CellAddress, CellError, CellRange};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use sheetflow_formula::{parse_formula, Locale};
///
/// let ast = parse_formula("=1+2", &Locale::PERIOD_DECIMAL).unwrap();
/// let ast = parse_formula("=SUM(A1:A10)", &Locale::PERIOD_DECIMAL).unwrap();
/// let ast = parse_formula("=SUM(A1;1,5)", &Locale::COMMA_DECIMAL).unwrap();
/// ```
pub fn parse_formula(formula: &str, locale: &Locale) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();

    let body = formula
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    let mut parser = FormulaParser::new(body, *locale);
    let expr = parser.parse_expression()?;

    parser.skip_whitespace();
    if !parser.is_at_end() {
        return Err(FormulaError::Parse(format!(
            "Unexpected characters after expression: '{}'",
            &parser.input[parser.pos..]
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),

    // Identifiers and references
    Identifier(String), // Function name
    CellRef(String),    // Cell reference like A1, $A$1
    SheetRef(String),   // Sheet qualifier like Sheet1! or 'My Sheet'!

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,

    /// Locale-dependent argument separator
    ArgSep,

    // Delimiters
    LeftParen,
    RightParen,

    /// A character the tokenizer does not recognize
    Unknown(char),

    // End of input
    Eof,
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    locale: Locale,
    current_token: Option<Token>,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str, locale: Locale) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            locale,
            current_token: None,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.skip_whitespace();
        self.current_token = Some(self.scan_token());
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        if self.is_at_end() {
            return Token::Eof;
        }

        let c = self.peek_char().unwrap();

        // Number: digits, or a decimal separator directly followed by one
        if c.is_ascii_digit()
            || (c == self.locale.decimal_separator
                && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Argument separator before the single-char table, since the period
        // locale uses ',' here
        if c == self.locale.argument_separator {
            self.advance();
            return Token::ArgSep;
        }

        match c {
            '+' => {
                self.advance();
                return Token::Plus;
            }
            '-' => {
                self.advance();
                return Token::Minus;
            }
            '*' => {
                self.advance();
                return Token::Star;
            }
            '/' => {
                self.advance();
                return Token::Slash;
            }
            '^' => {
                self.advance();
                return Token::Caret;
            }
            '%' => {
                self.advance();
                return Token::Percent;
            }
            '&' => {
                self.advance();
                return Token::Ampersand;
            }
            ':' => {
                self.advance();
                return Token::Colon;
            }
            '(' => {
                self.advance();
                return Token::LeftParen;
            }
            ')' => {
                self.advance();
                return Token::RightParen;
            }
            _ => {}
        }

        if c == '<' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::LessEqual;
            } else if self.peek_char() == Some('>') {
                self.advance();
                return Token::NotEqual;
            }
            return Token::LessThan;
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::GreaterEqual;
            }
            return Token::GreaterThan;
        }

        if c == '=' {
            self.advance();
            return Token::Equal;
        }

        if c == '"' {
            return self.scan_string();
        }

        // Quoted sheet name: 'My Sheet'!A1
        if c == '\'' {
            return self.scan_quoted_sheet();
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' || c == '#' {
            return self.scan_identifier_or_ref();
        }

        self.advance();
        Token::Unknown(c)
    }

    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote

        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if c == '"' {
                // Escaped quote ("")
                if self.peek_char_at(1) == Some('"') {
                    s.push('"');
                    self.advance();
                    self.advance();
                } else {
                    break;
                }
            } else {
                s.push(c);
                self.advance();
            }
        }

        if self.peek_char() == Some('"') {
            self.advance();
        }

        Token::Text(s)
    }

    fn scan_quoted_sheet(&mut self) -> Token {
        self.advance(); // opening quote

        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if c == '\'' {
                break;
            }
            name.push(c);
            self.advance();
        }

        if self.peek_char() == Some('\'') {
            self.advance();
        }
        if self.peek_char() == Some('!') {
            self.advance();
            Token::SheetRef(name)
        } else {
            Token::Unknown('\'')
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        let dec = self.locale.decimal_separator;

        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek_char() == Some(dec)
            && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek_char().is_some_and(|c| c == 'e' || c == 'E') {
            // Only consume the exponent when it is actually one
            let mut ahead = 1;
            if self.peek_char_at(1).is_some_and(|c| c == '+' || c == '-') {
                ahead = 2;
            }
            if self.peek_char_at(ahead).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..=ahead {
                    self.advance();
                }
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = self.input[start..self.pos].replace(dec, ".");
        let num: f64 = text.parse().unwrap_or(0.0);
        Token::Number(num)
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        // Error values first (#VALUE!, #REF!, etc.)
        if self.peek_char() == Some('#') {
            let start = self.pos;
            self.advance();
            while self.peek_char().is_some_and(|c| {
                c.is_ascii_alphanumeric() || c == '!' || c == '/' || c == '?'
            }) {
                self.advance();
            }
            let error_str = &self.input[start..self.pos];
            return match CellError::from_display(error_str) {
                Some(err) => Token::Error(err),
                None => Token::Identifier(error_str.to_string()),
            };
        }

        let start = self.pos;
        while self.peek_char().is_some_and(|c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
        }) {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // Sheet qualifier (ends with !)
        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(text.to_string());
        }

        // Boolean literals, unless followed by '(' (then a function name)
        let upper = text.to_uppercase();
        if upper == "TRUE" && self.peek_char() != Some('(') {
            return Token::Boolean(true);
        }
        if upper == "FALSE" && self.peek_char() != Some('(') {
            return Token::Boolean(false);
        }

        // Cell reference shape: [$]letters[$]digits, unless followed by '('
        if Self::is_cell_reference(text) && self.peek_char() != Some('(') {
            return Token::CellRef(text.to_string());
        }

        Token::Identifier(text.to_string())
    }

    fn is_cell_reference(text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;

        if chars.get(i) == Some(&'$') {
            i += 1;
        }

        let letter_start = i;
        while i < chars.len() && chars[i].is_ascii_alphabetic() {
            i += 1;
        }
        if i == letter_start {
            return false;
        }

        if chars.get(i) == Some(&'$') {
            i += 1;
        }

        let digit_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == digit_start {
            return false;
        }

        i == chars.len()
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Lowest to highest:
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, %
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_concatenation()?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume();
            let right = self.parse_additive()?;
            left = FormulaExpr::BinaryOp {
                op: BinaryOperator::Concat,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_exponent()?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume();
            let right = self.parse_exponent()?; // Right associative
            return Ok(FormulaExpr::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        if matches!(self.current_token(), Token::Minus) {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        // Prefix plus is a no-op
        if matches!(self.current_token(), Token::Plus) {
            self.consume();
            return self.parse_unary();
        }

        let mut expr = self.parse_range()?;

        while matches!(self.current_token(), Token::Percent) {
            self.consume();
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if matches!(self.current_token(), Token::Colon) {
            self.consume();
            let right = self.parse_primary()?;

            let (FormulaExpr::CellRef(start_ref), FormulaExpr::CellRef(end_ref)) = (&left, &right)
            else {
                return Err(FormulaError::Parse(
                    "Range endpoints must be cell references".into(),
                ));
            };

            if start_ref.sheet != end_ref.sheet && end_ref.sheet.is_some() {
                return Err(FormulaError::Parse(
                    "Range references must be on the same sheet".into(),
                ));
            }

            let range = CellRange::new(start_ref.address, end_ref.address);
            return Ok(FormulaExpr::RangeRef(RangeReference {
                sheet: start_ref.sheet.clone(),
                range,
            }));
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume();
                Ok(FormulaExpr::Number(n))
            }

            Token::Text(s) => {
                self.consume();
                Ok(FormulaExpr::Text(s))
            }

            Token::Boolean(b) => {
                self.consume();
                Ok(FormulaExpr::Boolean(b))
            }

            Token::Error(e) => {
                self.consume();
                Ok(FormulaExpr::Error(e))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::SheetRef(sheet) => {
                self.consume();
                match self.current_token().clone() {
                    Token::CellRef(ref_str) => {
                        self.consume();
                        self.parse_cell_reference(Some(sheet), &ref_str)
                    }
                    _ => Err(FormulaError::Parse(
                        "Expected cell reference after sheet name".into(),
                    )),
                }
            }

            Token::CellRef(ref_str) => {
                self.consume();
                self.parse_cell_reference(None, &ref_str)
            }

            Token::Identifier(name) => {
                self.consume();
                if matches!(self.current_token(), Token::LeftParen) {
                    let func = Func::from_name(&name)
                        .ok_or(FormulaError::UnknownFunction(name))?;
                    self.parse_function_call(func)
                } else {
                    Err(FormulaError::Parse(format!("Unknown name: '{}'", name)))
                }
            }

            other => Err(FormulaError::Parse(format!(
                "Unexpected token: {:?}",
                other
            ))),
        }
    }

    fn parse_function_call(&mut self, func: Func) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);
            while matches!(self.current_token(), Token::ArgSep) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;

        let (min, max) = func.arg_bounds();
        let in_bounds = args.len() >= min && max.map_or(true, |m| args.len() <= m);
        if !in_bounds {
            return Err(FormulaError::ArgumentCount {
                function: func.name(),
                expected: match max {
                    Some(m) if m == min => format!("{}", min),
                    Some(m) => format!("{}-{}", min, m),
                    None => format!("at least {}", min),
                },
                actual: args.len(),
            });
        }

        Ok(FormulaExpr::Call { func, args })
    }

    fn parse_cell_reference(
        &mut self,
        sheet: Option<String>,
        ref_str: &str,
    ) -> FormulaResult<FormulaExpr> {
        // CellAddress::parse understands $ markers and keeps them
        let address = CellAddress::parse(ref_str).map_err(|e| {
            FormulaError::Parse(format!("Invalid cell reference '{}': {}", ref_str, e))
        })?;

        Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
    }
}
