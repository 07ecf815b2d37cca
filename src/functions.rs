//! Built-in mathematical functions for expression evaluation.
//!
//! This module holds the native function catalogue: a name-sorted, immutable
//! table mapping each function name to its accepted [`Arity`] and its
//! implementation. All implementations use the `libm` crate so they behave
//! the same with and without `std`.
//!
//! Implementations never fail. Out-of-domain inputs produce NaN or an
//! infinity, which the evaluator rejects as a numeric domain error.

use libm::{
    acos as libm_acos, asin as libm_asin, atan as libm_atan, atan2 as libm_atan2,
    ceil as libm_ceil, cos as libm_cos, cosh as libm_cosh, exp as libm_exp, fabs as libm_fabs,
    floor as libm_floor, log as libm_ln, log10 as libm_log10, pow as libm_pow,
    round as libm_round, sin as libm_sin, sinh as libm_sinh, sqrt as libm_sqrt, tan as libm_tan,
    tanh as libm_tanh, trunc as libm_trunc,
};

use crate::types::Arity;

/// A function from the native catalogue.
#[derive(Clone, Copy, Debug)]
pub struct NativeFunction {
    /// The name the function is called by in expressions.
    pub name: &'static str,
    /// Argument counts the function accepts.
    pub arity: Arity,
    /// The implementation. Receives exactly as many arguments as `arity`
    /// admits; NULL handling has already happened.
    pub implementation: fn(&[f64]) -> f64,
}

/// Looks up a native function by (lower-case) name.
pub fn lookup(name: &str) -> Option<&'static NativeFunction> {
    NATIVE_FUNCTIONS
        .binary_search_by(|f| f.name.cmp(name))
        .ok()
        .map(|idx| &NATIVE_FUNCTIONS[idx])
}

macro_rules! native {
    ($name:literal, $arity:expr, $implementation:expr) => {
        NativeFunction {
            name: $name,
            arity: $arity,
            implementation: $implementation,
        }
    };
}

/// The catalogue, sorted by name.
pub static NATIVE_FUNCTIONS: &[NativeFunction] = &[
    native!("abs", Arity::Exact(1), |a| libm_fabs(a[0])),
    native!("acos", Arity::Exact(1), |a| libm_acos(a[0])),
    native!("asin", Arity::Exact(1), |a| libm_asin(a[0])),
    native!("atan", Arity::Exact(1), |a| libm_atan(a[0])),
    // atan2 takes (y, x)
    native!("atan2", Arity::Exact(2), |a| libm_atan2(a[0], a[1])),
    native!("avg", Arity::AtLeast(1), avg),
    native!("ceil", Arity::Exact(1), |a| libm_ceil(a[0])),
    native!("cos", Arity::Exact(1), |a| libm_cos(a[0])),
    native!("cosh", Arity::Exact(1), |a| libm_cosh(a[0])),
    native!("exp", Arity::Exact(1), |a| libm_exp(a[0])),
    native!("floor", Arity::Exact(1), |a| libm_floor(a[0])),
    native!("if", Arity::Exact(3), |a| if a[0] != 0.0 { a[1] } else { a[2] }),
    native!("ln", Arity::Exact(1), |a| libm_ln(a[0])),
    native!("log", Arity::Exact(1), |a| libm_ln(a[0])),
    native!("log10", Arity::Exact(1), |a| libm_log10(a[0])),
    native!("max", Arity::AtLeast(1), max),
    native!("min", Arity::AtLeast(1), min),
    native!("pow", Arity::Exact(2), |a| libm_pow(a[0], a[1])),
    native!("round", Arity::Range(1, 2), round),
    native!("sign", Arity::Exact(1), sign),
    native!("sin", Arity::Exact(1), |a| libm_sin(a[0])),
    native!("sinh", Arity::Exact(1), |a| libm_sinh(a[0])),
    native!("sqrt", Arity::Exact(1), |a| libm_sqrt(a[0])),
    native!("sum", Arity::AtLeast(1), sum),
    native!("tan", Arity::Exact(1), |a| libm_tan(a[0])),
    native!("tanh", Arity::Exact(1), |a| libm_tanh(a[0])),
    native!("trunc", Arity::Exact(1), |a| libm_trunc(a[0])),
];

/// Sum of all arguments.
pub fn sum(args: &[f64]) -> f64 {
    args.iter().sum()
}

/// Arithmetic mean of all arguments.
pub fn avg(args: &[f64]) -> f64 {
    sum(args) / args.len() as f64
}

/// Largest argument.
pub fn max(args: &[f64]) -> f64 {
    args.iter()
        .copied()
        .fold(f64::NEG_INFINITY, |acc, x| if x > acc { x } else { acc })
}

/// Smallest argument.
pub fn min(args: &[f64]) -> f64 {
    args.iter()
        .copied()
        .fold(f64::INFINITY, |acc, x| if x < acc { x } else { acc })
}

/// Rounds half away from zero, optionally to a number of decimals.
///
/// # Parameters
///
/// * `args[0]` - Value to round
/// * `args[1]` - Decimals to keep (truncated to an integer, may be negative)
pub fn round(args: &[f64]) -> f64 {
    match args.get(1) {
        None => libm_round(args[0]),
        Some(&decimals) => {
            let scale = libm_pow(10.0, libm_trunc(decimals));
            libm_round(args[0] * scale) / scale
        }
    }
}

pub fn sign(args: &[f64]) -> f64 {
    let a = args[0];
    if a > 0.0 {
        1.0
    } else if a < 0.0 {
        -1.0
    } else {
        0.0
    }
}
