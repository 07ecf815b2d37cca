//! Property-based tests for evaluation.

use exp_splice::{Expression, ExpressionOptions};
use proptest::prelude::*;

fn options() -> ExpressionOptions {
    ExpressionOptions::default().with_parser_cache(false)
}

/// Templates over `p` and `w` that stay finite for the generated ranges.
/// Function names avoid both letters so literal substitution is a plain
/// character replacement.
fn template_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("p + w"),
        Just("p * 2 - w / 3"),
        Just("(p + 1) * (w - 1)"),
        Just("max(p, w) - min(p, w)"),
        Just("abs(p) + sqrt(abs(w))"),
        Just("p * p + 2 * p * w + w * w"),
        Just("sum(p, w, 1) % 7"),
        Just("-p - -w"),
        Just("(p < w) + (p = w) * 2"),
        Just("round(p / (abs(w) + 1), 2)"),
    ]
}

fn literal(value: f64) -> String {
    format!("({})", value)
}

proptest! {
    #[test]
    fn prop_evaluation_is_idempotent(
        template in template_strategy(),
        x in -1000.0..1000.0f64,
        y in -1000.0..1000.0f64,
    ) {
        let mut expr = Expression::with_options(template, options()).unwrap();
        expr.set_parameter("p", x);
        expr.set_parameter("w", y);
        let first = expr.evaluate().unwrap().unwrap();
        for _ in 0..3 {
            let again = expr.evaluate().unwrap().unwrap();
            prop_assert_eq!(first.to_bits(), again.to_bits());
        }
    }

    #[test]
    fn prop_parameters_match_literal_substitution(
        template in template_strategy(),
        x in -1000.0..1000.0f64,
        y in -1000.0..1000.0f64,
    ) {
        let mut bound = Expression::with_options(template, options()).unwrap();
        bound.set_parameter("p", x);
        bound.set_parameter("w", y);

        let text = template.replace('p', &literal(x)).replace('w', &literal(y));
        let mut substituted = Expression::with_options(&text, options()).unwrap();

        prop_assert_eq!(bound.evaluate().unwrap(), substituted.evaluate().unwrap());
    }

    #[test]
    fn prop_exp_log_round_trip(x in 0.001..100.0f64) {
        let mut expr = Expression::with_options("abs(exp(log(x)))", options()).unwrap();
        expr.set_parameter("x", x);
        let value = expr.evaluate().unwrap().unwrap();
        prop_assert!((value - x).abs() < 1e-10, "{} vs {}", value, x);
    }

    #[test]
    fn prop_pythagorean_identity(x in -100.0..100.0f64) {
        let mut expr = Expression::with_options("pow(sin(x), 2) + pow(cos(x), 2)", options()).unwrap();
        expr.set_parameter("x", x);
        let value = expr.evaluate().unwrap().unwrap();
        prop_assert!((value - 1.0).abs() < 1e-10);
    }

    #[test]
    fn prop_null_propagates_without_default(
        template in template_strategy(),
        y in -1000.0..1000.0f64,
    ) {
        let mut expr = Expression::with_options(template, options()).unwrap();
        expr.set_parameter("p", None);
        expr.set_parameter("w", y);
        prop_assert_eq!(expr.evaluate().unwrap(), None);
    }

    #[test]
    fn prop_default_equals_bound_value(
        template in template_strategy(),
        x in -1000.0..1000.0f64,
        y in -1000.0..1000.0f64,
    ) {
        let mut with_default =
            Expression::with_options(template, options().with_default_null_value(Some(x))).unwrap();
        with_default.set_parameter("p", None);
        with_default.set_parameter("w", y);

        let mut bound = Expression::with_options(template, options()).unwrap();
        bound.set_parameter("p", x);
        bound.set_parameter("w", y);

        prop_assert_eq!(with_default.evaluate().unwrap(), bound.evaluate().unwrap());
    }

    #[test]
    fn prop_float_parsers_agree(whole in 0u64..10_000_000, fraction in 0u64..1_000_000_000) {
        let text = format!("{}.{:09}", whole, fraction);
        let fast = Expression::with_options(&text, options()).unwrap().evaluate().unwrap();
        let slow = Expression::with_options(&text, options().with_fast_float_parser(false))
            .unwrap()
            .evaluate()
            .unwrap();
        prop_assert_eq!(fast, slow);
    }
}
