//! Operator semantics and the NULL policy.
//!
//! Every function here takes operands as `Option<f64>` where `None` is NULL.
//! With a default NULL value configured, NULL operands are replaced by it
//! before the operator runs. Without one, any NULL operand makes the result
//! NULL and the operator is not applied.

use alloc::format;

use crate::error::{ExprError, Result};
use crate::types::{Operator, OperatorFlags};

/// Substitutes the configured default for a NULL value.
#[inline]
pub fn resolve_null(value: Option<f64>, default_null: Option<f64>) -> Option<f64> {
    value.or(default_null)
}

/// Rejects NaN and infinities.
pub fn check_finite(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExprError::NumericDomain(format!(
            "'{}' produced a non-finite result",
            what
        )))
    }
}

#[inline]
fn to_integer(value: f64) -> i64 {
    libm::trunc(value) as i64
}

#[inline]
fn truth(condition: bool) -> f64 {
    if condition { 1.0 } else { 0.0 }
}

/// Applies an explicit sign. Signs never fail.
pub fn apply_sign(negate: bool, value: Option<f64>, default_null: Option<f64>) -> Option<f64> {
    let value = resolve_null(value, default_null)?;
    Some(if negate { -value } else { value })
}

/// Applies `!` or `~`.
pub fn apply_prefix(op: Operator, operand: Option<f64>, default_null: Option<f64>) -> Result<Option<f64>> {
    let Some(a) = resolve_null(operand, default_null) else {
        return Ok(None);
    };
    let value = match op {
        Operator::Not => truth(a == 0.0),
        Operator::BitNot => !to_integer(a) as f64,
        _ => {
            return Err(ExprError::syntax(
                0,
                format!("'{}' is not a prefix operator", op.symbol()),
            ));
        }
    };
    Ok(Some(value))
}

/// Applies a binary operator.
///
/// # Errors
///
/// [`ExprError::NumericDomain`] for division or modulo by zero, shift amounts
/// outside `0..64` and non-finite results.
pub fn apply_binary(
    op: Operator,
    left: Option<f64>,
    right: Option<f64>,
    default_null: Option<f64>,
) -> Result<Option<f64>> {
    let (Some(a), Some(b)) = (resolve_null(left, default_null), resolve_null(right, default_null))
    else {
        return Ok(None);
    };

    let value = if op.flags().contains(OperatorFlags::INTEGER) {
        apply_integer(op, to_integer(a), to_integer(b))?
    } else {
        match op {
            Operator::Mul => a * b,
            Operator::Div => {
                if b == 0.0 {
                    return Err(ExprError::NumericDomain("division by zero".into()));
                }
                a / b
            }
            Operator::Mod => {
                if b == 0.0 {
                    return Err(ExprError::NumericDomain("modulo by zero".into()));
                }
                libm::fmod(a, b)
            }
            Operator::Add => a + b,
            Operator::Sub => a - b,
            Operator::Equal => truth(a == b),
            Operator::NotEqual | Operator::NotEqualSql => truth(a != b),
            Operator::Less => truth(a < b),
            Operator::LessEqual => truth(a <= b),
            Operator::Greater => truth(a > b),
            Operator::GreaterEqual => truth(a >= b),
            _ => {
                return Err(ExprError::syntax(
                    0,
                    format!("'{}' is not a binary operator", op.symbol()),
                ));
            }
        }
    };
    check_finite(op.symbol(), value).map(Some)
}

fn apply_integer(op: Operator, a: i64, b: i64) -> Result<f64> {
    let value = match op {
        Operator::BitAnd => a & b,
        Operator::BitOr => a | b,
        Operator::BitXor => a ^ b,
        Operator::BitsAll => i64::from((a & b) == b),
        Operator::BitsAny => i64::from((a & b) != 0),
        Operator::BitsNone => i64::from((a & b) == 0),
        Operator::And => i64::from(a != 0 && b != 0),
        Operator::Or => i64::from(a != 0 || b != 0),
        Operator::ShiftLeft | Operator::ShiftRight => {
            if !(0..64).contains(&b) {
                return Err(ExprError::NumericDomain(format!(
                    "shift amount {} is outside 0..64",
                    b
                )));
            }
            if op == Operator::ShiftLeft { a << b } else { a >> b }
        }
        _ => {
            return Err(ExprError::syntax(
                0,
                format!("'{}' is not an integer operator", op.symbol()),
            ));
        }
    };
    Ok(value as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: Operator, a: f64, b: f64) -> f64 {
        apply_binary(op, Some(a), Some(b), None).unwrap().unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(bin(Operator::Mul, 3.0, 4.0), 12.0);
        assert_eq!(bin(Operator::Div, 7.0, 2.0), 3.5);
        assert_eq!(bin(Operator::Mod, 7.0, 3.0), 1.0);
        assert_eq!(bin(Operator::Mod, -7.0, 3.0), -1.0);
        assert_eq!(bin(Operator::Sub, 1.0, 3.0), -2.0);
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            apply_binary(Operator::Div, Some(1.0), Some(0.0), None),
            Err(ExprError::NumericDomain(_))
        ));
        assert!(matches!(
            apply_binary(Operator::Mod, Some(1.0), Some(0.0), None),
            Err(ExprError::NumericDomain(_))
        ));
        // the default is substituted before the zero check
        assert!(matches!(
            apply_binary(Operator::Div, Some(1.0), None, Some(0.0)),
            Err(ExprError::NumericDomain(_))
        ));
    }

    #[test]
    fn test_overflow_is_a_domain_error() {
        assert!(matches!(
            apply_binary(Operator::Mul, Some(1e308), Some(10.0), None),
            Err(ExprError::NumericDomain(_))
        ));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(bin(Operator::Equal, 2.0, 2.0), 1.0);
        assert_eq!(bin(Operator::NotEqual, 2.0, 2.0), 0.0);
        assert_eq!(bin(Operator::NotEqualSql, 2.0, 3.0), 1.0);
        assert_eq!(bin(Operator::LessEqual, 2.0, 2.0), 1.0);
        assert_eq!(bin(Operator::Greater, 2.0, 3.0), 0.0);
    }

    #[test]
    fn test_integer_operators_truncate() {
        assert_eq!(bin(Operator::BitAnd, 6.9, 3.2), 2.0);
        assert_eq!(bin(Operator::BitOr, 4.0, 1.0), 5.0);
        assert_eq!(bin(Operator::BitXor, 5.0, 1.0), 4.0);
        assert_eq!(bin(Operator::And, 0.5, 1.0), 0.0);
        assert_eq!(bin(Operator::Or, 0.0, 2.0), 1.0);
        assert_eq!(bin(Operator::ShiftLeft, 1.0, 4.0), 16.0);
        assert_eq!(bin(Operator::ShiftRight, -16.0, 2.0), -4.0);
    }

    #[test]
    fn test_bit_tests() {
        assert_eq!(bin(Operator::BitsAll, 7.0, 5.0), 1.0);
        assert_eq!(bin(Operator::BitsAll, 4.0, 5.0), 0.0);
        assert_eq!(bin(Operator::BitsAny, 4.0, 5.0), 1.0);
        assert_eq!(bin(Operator::BitsAny, 2.0, 5.0), 0.0);
        assert_eq!(bin(Operator::BitsNone, 2.0, 5.0), 1.0);
        assert_eq!(bin(Operator::BitsNone, 4.0, 5.0), 0.0);
    }

    #[test]
    fn test_shift_range() {
        assert!(apply_binary(Operator::ShiftLeft, Some(1.0), Some(64.0), None).is_err());
        assert!(apply_binary(Operator::ShiftRight, Some(1.0), Some(-1.0), None).is_err());
        assert_eq!(bin(Operator::ShiftLeft, 1.0, 63.0), i64::MIN as f64);
    }

    #[test]
    fn test_null_propagates_without_default() {
        assert_eq!(apply_binary(Operator::Add, None, Some(1.0), None).unwrap(), None);
        assert_eq!(apply_binary(Operator::Div, Some(1.0), None, None).unwrap(), None);
        assert_eq!(apply_prefix(Operator::Not, None, None).unwrap(), None);
        assert_eq!(apply_sign(true, None, None), None);
    }

    #[test]
    fn test_null_takes_default() {
        assert_eq!(
            apply_binary(Operator::Add, None, Some(1.0), Some(2.0)).unwrap(),
            Some(3.0)
        );
        assert_eq!(apply_sign(true, None, Some(2.0)), Some(-2.0));
        assert_eq!(apply_prefix(Operator::Not, None, Some(0.0)).unwrap(), Some(1.0));
    }

    #[test]
    fn test_prefix() {
        assert_eq!(apply_prefix(Operator::Not, Some(0.0), None).unwrap(), Some(1.0));
        assert_eq!(apply_prefix(Operator::Not, Some(3.0), None).unwrap(), Some(0.0));
        assert_eq!(apply_prefix(Operator::BitNot, Some(0.0), None).unwrap(), Some(-1.0));
        assert_eq!(apply_prefix(Operator::BitNot, Some(5.7), None).unwrap(), Some(-6.0));
        assert!(apply_prefix(Operator::Mul, Some(1.0), None).is_err());
    }

    #[test]
    fn test_check_finite() {
        assert_eq!(check_finite("x", 1.5).unwrap(), 1.5);
        assert!(check_finite("sqrt", f64::NAN).is_err());
        assert!(check_finite("/", f64::INFINITY).is_err());
    }
}
