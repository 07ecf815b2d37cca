#![cfg_attr(not(feature = "std"), no_std)]
#![doc = r#"
# exp-splice

A NULL-aware, no_std-friendly expression compiler and evaluator for Rust.

## Overview

exp-splice compiles expression text once into a reusable sanitized form and
evaluates it as often as needed against changing parameter values. Evaluation
reduces the innermost parenthesis group to a single value, splices that value
back into the working token buffer and repeats until one value is left.

Key features:
- Variables bound by name, including to NULL
- A configurable default that NULL operands are replaced with
- Built-in math functions plus caller-supplied custom functions
- Sanitized forms shared process-wide through a parser cache
- Constant sub-results reused across evaluations of the same form
- Step-by-step traces of every reduced group
- No_std compatibility with the `alloc` crate

## Quick Start

```rust
use exp_splice::evaluate;

assert_eq!(evaluate("2 + 3 * 4").unwrap(), Some(14.0));
assert_eq!(evaluate("(2 + 3) * 4").unwrap(), Some(20.0));
assert_eq!(evaluate("max(1, 2, 3) % 2").unwrap(), Some(1.0));
```

## Parameters

```rust
use exp_splice::Expression;

let mut expr = Expression::new("price * (1 + rate)").unwrap();
expr.set_parameter("price", 200.0);
for (rate, expected) in [(0.0, 200.0), (0.5, 300.0)] {
    expr.set_parameter("rate", rate);
    assert_eq!(expr.evaluate().unwrap(), Some(expected));
}
```

## NULL Values

NULL is a value, not an error. Without a default NULL value it propagates
through every operator and built-in function:

```rust
use exp_splice::{Expression, ExpressionOptions};

let mut expr = Expression::new("x * 2 + 1").unwrap();
expr.set_parameter("x", None);
assert_eq!(expr.evaluate().unwrap(), None);

let options = ExpressionOptions::default().with_default_null_value(Some(0.0));
let mut expr = Expression::with_options("x * 2 + 1", options).unwrap();
expr.set_parameter("x", None);
assert_eq!(expr.evaluate().unwrap(), Some(1.0));
```

## Custom Functions

Custom functions see NULL arguments and decide themselves what to do with
them. Built-in functions take priority over custom ones with the same name.

```rust
use exp_splice::Expression;

let mut expr = Expression::new("coalesce(x, 5) * 2").unwrap();
expr.add_function("coalesce", |args| args.iter().copied().flatten().next());
expr.set_parameter("x", None);
assert_eq!(expr.evaluate().unwrap(), Some(10.0));
```

## Traces

```rust
use exp_splice::Expression;

let mut expr = Expression::new("(1 + 2) * (3 + 4)").unwrap();
let (value, trace) = expr.evaluate_traced().unwrap();
assert_eq!(value, Some(21.0));
assert_eq!(trace, "[3+4] = 7\n[1+2] = 3\n[3*7] = 21");
```

## Error Handling

```rust
use exp_splice::{evaluate, ExprError};

assert!(matches!(evaluate("2 + * 3"), Err(ExprError::Syntax { .. })));
assert!(matches!(evaluate("x + 5"), Err(ExprError::UndefinedVariable { .. })));
assert!(matches!(evaluate("1 / 0"), Err(ExprError::NumericDomain(_))));
```

## Supported Grammar

Operators bind in three tiers, tightest first. Operators of one tier apply
left to right.

| Tier | Operators                                                              |
|------|------------------------------------------------------------------------|
| -    | prefix `!` `~`, explicit signs `+` `-`                                 |
| 1    | `*` `/` `%`                                                            |
| 2    | `+` `-`                                                                |
| 3    | `<` `>` `<=` `>=` `=` `==` `!=` `<>` `&` `\|` `^` `&&` `\|\|` `<<` `>>` `&=` `\|=` `^=` |

Bitwise, logical and shift operators truncate their operands to integers.
Comparisons and logical operators yield `1` or `0`. `a &= b` tests that all
bits of `b` are set in `a`, `a |= b` that any are, `a ^= b` that none are.

### Built-in Functions

- Trigonometric: `sin`, `cos`, `tan`, `asin`, `acos`, `atan`, `atan2`
- Hyperbolic: `sinh`, `cosh`, `tanh`
- Exponential/Logarithmic: `exp`, `log`, `ln`, `log10`
- Power/Root: `sqrt`, `pow`
- Rounding: `ceil`, `floor`, `round`, `trunc`
- Aggregates: `sum`, `avg`, `max`, `min`
- Misc: `abs`, `sign`, `if`

### Built-in Constants

- `pi`: 3.14159... (π)
- `e`: 2.71828... (Euler's number)

Parameters with the same name take precedence.

## Feature Flags

- `std` (default): uses `std` for the parser cache lock. Without it the crate
  is `no_std` + `alloc` and needs a `critical-section` implementation.
"#]

extern crate alloc;

pub mod engine;
pub mod error;
pub mod eval;
pub mod expression;
pub mod functions;
pub mod parser_cache;
pub mod sanitizer;
pub mod types;

pub use engine::{evaluate, evaluate_traced, evaluate_with_options};
pub use error::{ExprError, Result};
pub use eval::{CustomFunction, format_value};
pub use expression::Expression;
pub use parser_cache::ParserCache;
pub use sanitizer::{sanitize, validate};
pub use types::*;

pub mod constants {
    pub const PI: f64 = core::f64::consts::PI;
    pub const E: f64 = core::f64::consts::E;
    pub const TEST_PRECISION: f64 = 1e-10;

    /// Built-in constant by (lower-case) name.
    pub fn lookup(name: &str) -> Option<f64> {
        match name {
            "pi" => Some(PI),
            "e" => Some(E),
            _ => None,
        }
    }
}

/// Utility macro to check if two floating point values are approximately equal
/// within a specified epsilon. Supports optional format arguments like assert_eq!.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::constants::TEST_PRECISION)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let eps: f64 = $epsilon;
        assert!(
            (left_val - right_val).abs() < eps,
            "assertion failed: `(left ≈ right)` (left: `{}`, right: `{}`, epsilon: `{}`)",
            left_val,
            right_val,
            eps
        );
    }};
    ($left:expr, $right:expr, $epsilon:expr, $($arg:tt)+) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let eps: f64 = $epsilon;
        assert!((left_val - right_val).abs() < eps, $($arg)+);
    }};
}
