//! One-shot evaluation of expression text.
//!
//! These helpers build a throwaway [`Expression`] without bindings. Use
//! [`Expression`] directly to bind parameters, register functions or
//! evaluate the same text repeatedly.

use alloc::string::String;

use crate::error::Result;
use crate::expression::Expression;
use crate::types::ExpressionOptions;

/// Evaluates `text` with default options.
///
/// # Examples
///
/// ```
/// use exp_splice::evaluate;
///
/// assert_eq!(evaluate("2 + 3 * 4").unwrap(), Some(14.0));
/// assert_eq!(evaluate("10 - 5 - 9 - 0").unwrap(), Some(-4.0));
/// assert_eq!(evaluate("null + 1").unwrap(), None);
/// ```
pub fn evaluate(text: &str) -> Result<Option<f64>> {
    evaluate_with_options(text, ExpressionOptions::default())
}

pub fn evaluate_with_options(text: &str, options: ExpressionOptions) -> Result<Option<f64>> {
    Expression::with_options(text, options)?.evaluate()
}

/// Evaluates `text` and returns the result together with its trace.
pub fn evaluate_traced(text: &str, options: ExpressionOptions) -> Result<(Option<f64>, String)> {
    Expression::with_options(text, options)?.evaluate_traced()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExprError;

    #[test]
    fn test_evaluate() {
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), Some(20.0));
        assert_eq!(evaluate("max(1, 5, 3)").unwrap(), Some(5.0));
        assert!(matches!(evaluate("x"), Err(ExprError::UndefinedVariable { .. })));
        assert!(matches!(evaluate("2 +"), Err(ExprError::Syntax { .. })));
    }

    #[test]
    fn test_options_apply() {
        let options = ExpressionOptions::default().with_default_null_value(Some(0.0));
        assert_eq!(evaluate_with_options("null + 1", options).unwrap(), Some(1.0));
    }

    #[test]
    fn test_traced() {
        let (value, trace) = evaluate_traced("(1 + 1) * 3", ExpressionOptions::default()).unwrap();
        assert_eq!(value, Some(6.0));
        assert_eq!(trace, "[1+1] = 2\n[2*3] = 6");
    }
}
