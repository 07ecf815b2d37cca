use test_helpers::{eval_with, uncached};

use std::sync::Arc;

use exp_splice::{ExprError, Expression, ExpressionOptions, SanitizedForm, sanitize};

#[test]
fn test_options_deserialize_with_defaults() {
    let options: ExpressionOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options, ExpressionOptions::default());

    let options: ExpressionOptions =
        serde_json::from_str(r#"{"precision": 6, "default_null_value": 0.5}"#).unwrap();
    assert_eq!(options.precision, 6);
    assert_eq!(options.default_null_value, Some(0.5));
    assert!(options.use_fast_float_parser);
    assert!(options.use_parser_cache);
}

#[test]
fn test_options_round_trip_through_json() {
    let options = ExpressionOptions::new()
        .with_fast_float_parser(false)
        .with_parser_cache(false)
        .with_precision(9)
        .with_default_null_value(Some(-1.0));
    let json = serde_json::to_string(&options).unwrap();
    let back: ExpressionOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, options);
}

#[test]
fn test_sanitized_form_serializes() {
    let form = sanitize("max(x, null) * 2", &uncached()).unwrap();
    let json = serde_json::to_value(&form).unwrap();
    assert_eq!(json["text"], "max[x,$0$]*2");
    assert_eq!(json["variables"][0], "x");
    let back: SanitizedForm = serde_json::from_value(json).unwrap();
    assert_eq!(back, form);
}

#[test]
fn test_stored_form_evaluates() {
    let json = serde_json::to_string(&sanitize("x * (2 + null)", &uncached()).unwrap()).unwrap();
    let form: SanitizedForm = serde_json::from_str(&json).unwrap();
    let options = uncached().with_default_null_value(Some(1.0));
    let mut expr = Expression::from_form(Arc::new(form), options).unwrap();
    expr.set_parameter("x", 4.0);
    assert_eq!(expr.evaluate().unwrap(), Some(12.0));
}

#[test]
fn test_tampered_stored_form_is_rejected() {
    let mut json = serde_json::to_value(sanitize("x + 1", &uncached()).unwrap()).unwrap();
    json["tokens"][0]["Variable"]["slot"] = serde_json::json!(1u64 << 62);
    let form: SanitizedForm = serde_json::from_value(json).unwrap();
    assert!(matches!(
        Expression::from_form(Arc::new(form), uncached()),
        Err(ExprError::Syntax { .. })
    ));

    let mut json = serde_json::to_value(sanitize("(1 + 2)", &uncached()).unwrap()).unwrap();
    json["operation_count"] = serde_json::json!(u64::MAX);
    let form: SanitizedForm = serde_json::from_value(json).unwrap();
    assert!(Expression::from_form(Arc::new(form), uncached()).is_err());
}

#[test]
fn test_float_parsers_agree() {
    let fast = uncached();
    let slow = uncached().with_fast_float_parser(false);
    for text in [
        "0.1 + 0.2",
        "123456.789 * 3",
        "1.7976931348623157 / 7",
        "0.000001",
        "9007199254740993",
    ] {
        assert_eq!(
            eval_with(text, fast.clone(), &[]).unwrap(),
            eval_with(text, slow.clone(), &[]).unwrap(),
            "{}",
            text
        );
    }
}

#[test]
fn test_precision_only_affects_rendering() {
    let mut coarse = Expression::with_options("2 / 3", uncached().with_precision(2)).unwrap();
    let mut fine = Expression::with_options("2 / 3", uncached().with_precision(17)).unwrap();
    assert_eq!(coarse.evaluate().unwrap(), fine.evaluate().unwrap());
    assert_eq!(coarse.evaluate_to_string().unwrap(), "0.67");
    assert_eq!(fine.evaluate_to_string().unwrap(), "0.6666666666666666");
}
