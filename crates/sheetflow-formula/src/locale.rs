//! Formula locale
//!
//! Locale affects only tokenization: the decimal separator inside number
//! literals and the argument separator between function arguments. The AST
//! is locale-independent; changing locale means re-parsing formula text, an
//! explicit step the engine performs.

/// Separator configuration for formula text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    /// Decimal point inside number literals (`1.5` vs `1,5`)
    pub decimal_separator: char,
    /// Separator between function arguments (`SUM(A1,B1)` vs `SUM(A1;B1)`)
    pub argument_separator: char,
}

impl Locale {
    /// Period-decimal convention: `1.5`, arguments separated by `,`
    pub const PERIOD_DECIMAL: Locale = Locale {
        decimal_separator: '.',
        argument_separator: ',',
    };

    /// Comma-decimal convention: `1,5`, arguments separated by `;`
    pub const COMMA_DECIMAL: Locale = Locale {
        decimal_separator: ',',
        argument_separator: ';',
    };
}

impl Default for Locale {
    fn default() -> Self {
        Locale::PERIOD_DECIMAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(Locale::default(), Locale::PERIOD_DECIMAL);
        assert_eq!(Locale::COMMA_DECIMAL.decimal_separator, ',');
        assert_eq!(Locale::COMMA_DECIMAL.argument_separator, ';');
    }
}
