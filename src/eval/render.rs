//! Rendering of values and partially reduced token runs.

use alloc::string::{String, ToString};
use core::fmt::Write;

use crate::eval::state::SlotCaches;
use crate::types::{SanitizedForm, Token};

/// Largest meaningful number of significant digits for an `f64`.
pub const MAX_PRECISION: u16 = 17;

/// Rounds `value` to `precision` significant digits (clamped to `1..=17`).
pub fn round_to_precision(value: f64, precision: u16) -> f64 {
    let digits = usize::from(precision.clamp(1, MAX_PRECISION));
    let mut buf: heapless::String<40> = heapless::String::new();
    let rounded = match write!(buf, "{:.*e}", digits - 1, value) {
        Ok(()) => buf.parse::<f64>().unwrap_or(value),
        Err(_) => value,
    };
    // no negative zero in output
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Formats a value the way traces and string results show it. NULL is `null`.
pub fn format_value(value: Option<f64>, precision: u16) -> String {
    match value {
        Some(v) => round_to_precision(v, precision).to_string(),
        None => "null".to_string(),
    }
}

/// Renders a token run, showing cache references by their current value.
pub fn render_tokens(
    tokens: &[Token],
    form: &SanitizedForm,
    caches: &SlotCaches,
    precision: u16,
) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Number(v) | Token::Value(v) => out.push_str(&format_value(Some(*v), precision)),
            Token::CacheRef(slot) => {
                let value = caches.computed(*slot).and_then(|item| item.computed_value);
                out.push_str(&format_value(value, precision));
            }
            Token::Variable { symbol, .. } => {
                out.push_str(form.variables.get(*symbol).map_or("?", String::as_str))
            }
            Token::Function(symbol) => {
                out.push_str(form.functions.get(*symbol).map_or("?", String::as_str))
            }
            Token::Operator(op) => out.push_str(op.symbol()),
            Token::OpenParen | Token::OpenArgs => out.push('('),
            Token::CloseParen | Token::CloseArgs => out.push(')'),
            Token::Comma => out.push(','),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::sanitize;
    use crate::types::ExpressionOptions;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Some(20.0), 15), "20");
        assert_eq!(format_value(Some(0.1 + 0.2), 15), "0.3");
        assert_eq!(format_value(Some(0.1 + 0.2), 17), "0.30000000000000004");
        assert_eq!(format_value(Some(2.0 / 3.0), 3), "0.667");
        assert_eq!(format_value(Some(-1234.5), 2), "-1200");
        assert_eq!(format_value(None, 15), "null");
    }

    #[test]
    fn test_precision_is_clamped() {
        assert_eq!(format_value(Some(1.25), 0), "1");
        assert_eq!(format_value(Some(0.1 + 0.2), 100), "0.30000000000000004");
        assert_eq!(format_value(Some(-0.0), 15), "0");
    }

    #[test]
    fn test_render_tokens() {
        let form = sanitize("max(a, 2) * -1.5", &ExpressionOptions::default()).unwrap();
        let caches = SlotCaches::with_capacity(1);
        assert_eq!(render_tokens(&form.tokens, &form, &caches, 15), "max(a,2)*-1.5");
    }

    #[test]
    fn test_render_cache_refs() {
        let form = sanitize("null + 1", &ExpressionOptions::default()).unwrap();
        let mut caches = SlotCaches::with_capacity(2);
        caches.rewind(1);
        let slot = caches.allocate(Some(4.5));
        let tokens = [
            Token::CacheRef(0),
            Token::Operator(crate::types::Operator::Add),
            Token::CacheRef(slot),
        ];
        assert_eq!(render_tokens(&tokens, &form, &caches, 15), "null+4.5");
    }
}
