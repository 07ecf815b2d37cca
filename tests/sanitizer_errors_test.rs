use exp_splice::sanitizer::MAX_NESTING_DEPTH;
use exp_splice::{ExprError, Expression, ExpressionOptions, sanitize};

fn options() -> ExpressionOptions {
    ExpressionOptions::default().with_parser_cache(false)
}

fn assert_syntax(text: &str) {
    match Expression::with_options(text, options()) {
        Err(ExprError::Syntax { .. }) => {}
        other => panic!("expected a syntax error for {:?}, got {:?}", text, other.map(|_| ())),
    }
}

#[test]
fn test_malformed_input_fails_at_construction() {
    assert_syntax("(2+3*4");
    assert_syntax("2+3)*4");
    assert_syntax("()");
    assert_syntax("1,2");
    assert_syntax("(1,2)");
    assert_syntax("max(1,,2)");
    assert_syntax("max(1,)");
    assert_syntax("1.2.3");
    assert_syntax(".");
    assert_syntax("2 ** 3");
    assert_syntax("1 ---1");
    assert_syntax("2 # 3");
    assert_syntax("a $ b");
    assert_syntax("a[1]");
    assert_syntax("2 3");
    assert_syntax("x y");
    assert_syntax("2 +");
    assert_syntax("* 2");
    assert_syntax("");
    assert_syntax("   ");
    assert_syntax("3x");
}

#[test]
fn test_syntax_error_positions() {
    match sanitize("1 + 2 # 3", &options()) {
        Err(ExprError::Syntax { position, .. }) => assert_eq!(position, 6),
        other => panic!("unexpected {:?}", other),
    }
    match sanitize("1.2.3", &options()) {
        Err(ExprError::Syntax { position, .. }) => assert_eq!(position, 0),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unclosed_argument_list_is_a_nesting_error() {
    match sanitize("1 + max(1, 2", &options()) {
        Err(ExprError::Nesting { position, .. }) => assert_eq!(position, 7),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_nesting_limit() {
    let deep = "abs(".repeat(MAX_NESTING_DEPTH) + "1" + &")".repeat(MAX_NESTING_DEPTH);
    let mut expr = Expression::with_options(&deep, options()).unwrap();
    assert_eq!(expr.evaluate().unwrap(), Some(1.0));

    let too_deep = "abs(".repeat(MAX_NESTING_DEPTH + 1) + "1" + &")".repeat(MAX_NESTING_DEPTH + 1);
    assert!(matches!(
        sanitize(&too_deep, &options()),
        Err(ExprError::Nesting { .. })
    ));
}

#[test]
fn test_valid_inputs_are_accepted() {
    for text in [
        "1",
        ".5 + 5.",
        "  2  *  ( 3 )  ",
        "MAX(A, b)",
        "f()",
        "sin (x)",
        "x_1 + _y",
        "1 <= -2",
        "null",
    ] {
        assert!(sanitize(text, &options()).is_ok(), "{}", text);
    }
}

#[test]
fn test_sanitized_form_contents() {
    let form = sanitize("2 * X + max(y, NULL) - x", &options()).unwrap();
    assert_eq!(form.text, "2*x+max[y,$0$]-x");
    assert_eq!(form.discovered_variables(), ["x", "y"]);
    assert_eq!(form.discovered_functions(), ["max"]);
    assert_eq!(form.null_literals, 1);
    // one NULL literal and three variable references
    assert_eq!(form.consumed_cache_slots, 4);
    assert!(form.operation_count >= form.consumed_cache_slots);
}
