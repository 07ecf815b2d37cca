//! Type definitions for the sanitizer and evaluator.
//!
//! This module contains the data shared between the compile step and the
//! evaluation step: the token stream a sanitized expression is made of, the
//! operator table with its precedence tiers, the reusable [`SanitizedForm`],
//! the slot cache entries and the [`ExpressionOptions`] configuration.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Behavioural traits of an operator.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct OperatorFlags: u8 {
        /// Both operands are truncated to integers before applying.
        const INTEGER = 0b0001;
        /// Takes a single operand to its right (`!`, `~`).
        const PREFIX = 0b0010;
        /// May also act as an explicit sign on the operand that follows (`+`, `-`).
        const SIGN = 0b0100;
    }
}

/// Every operator the grammar knows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `!` logical NOT
    Not,
    /// `~` bitwise NOT
    BitNot,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `+`, binary add or explicit sign
    Add,
    /// `-`, binary subtract or explicit sign
    Sub,
    /// `<>`
    NotEqualSql,
    /// `|=`, any bit of the right operand is set in the left
    BitsAny,
    /// `&=`, all bits of the right operand are set in the left
    BitsAll,
    /// `^=`, the operands share no bit
    BitsNone,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `!=`
    NotEqual,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `=` (also written `==`)
    Equal,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `|`
    BitOr,
    /// `&`
    BitAnd,
    /// `^`
    BitXor,
}

/// Binary operator spellings, longest first so a greedy scan picks `<=` over `<`.
pub const BINARY_OPERATORS: &[(&str, Operator)] = &[
    ("<>", Operator::NotEqualSql),
    ("|=", Operator::BitsAny),
    ("&=", Operator::BitsAll),
    ("^=", Operator::BitsNone),
    ("<=", Operator::LessEqual),
    (">=", Operator::GreaterEqual),
    ("!=", Operator::NotEqual),
    ("<<", Operator::ShiftLeft),
    (">>", Operator::ShiftRight),
    ("==", Operator::Equal),
    ("&&", Operator::And),
    ("||", Operator::Or),
    ("*", Operator::Mul),
    ("/", Operator::Div),
    ("%", Operator::Mod),
    ("+", Operator::Add),
    ("-", Operator::Sub),
    ("=", Operator::Equal),
    (">", Operator::Greater),
    ("<", Operator::Less),
    ("|", Operator::BitOr),
    ("&", Operator::BitAnd),
    ("^", Operator::BitXor),
];

/// Number of binary precedence tiers.
pub const TIER_COUNT: u8 = 3;

impl Operator {
    /// Canonical spelling used when rendering.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Not => "!",
            Operator::BitNot => "~",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::NotEqualSql => "<>",
            Operator::BitsAny => "|=",
            Operator::BitsAll => "&=",
            Operator::BitsNone => "^=",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::NotEqual => "!=",
            Operator::ShiftLeft => "<<",
            Operator::ShiftRight => ">>",
            Operator::Equal => "=",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::BitOr => "|",
            Operator::BitAnd => "&",
            Operator::BitXor => "^",
        }
    }

    /// Precedence tier (1 binds tightest). `!` has no tier: it is resolved
    /// before any binary operator.
    pub fn tier(self) -> Option<u8> {
        match self {
            Operator::Not => None,
            Operator::BitNot | Operator::Mul | Operator::Div | Operator::Mod => Some(1),
            Operator::Add | Operator::Sub => Some(2),
            _ => Some(3),
        }
    }

    pub fn flags(self) -> OperatorFlags {
        match self {
            Operator::Not | Operator::BitNot => OperatorFlags::PREFIX,
            Operator::Add | Operator::Sub => OperatorFlags::SIGN,
            Operator::BitAnd
            | Operator::BitOr
            | Operator::BitXor
            | Operator::BitsAll
            | Operator::BitsAny
            | Operator::BitsNone
            | Operator::ShiftLeft
            | Operator::ShiftRight
            | Operator::And
            | Operator::Or => OperatorFlags::INTEGER,
            _ => OperatorFlags::empty(),
        }
    }

    pub fn is_prefix(self) -> bool {
        self.flags().contains(OperatorFlags::PREFIX)
    }

    pub fn is_sign(self) -> bool {
        self.flags().contains(OperatorFlags::SIGN)
    }
}

/// Returns true for every character that can start or continue an operator.
pub fn is_operator_char(c: u8) -> bool {
    matches!(
        c,
        b'+' | b'-' | b'*' | b'/' | b'%' | b'~' | b'!' | b'<' | b'>' | b'=' | b'&' | b'|' | b'^'
    )
}

/// One element of a sanitized expression.
///
/// The sanitized text stores cache references as `$<slot>$` substrings; the
/// token stream carries them as [`Token::CacheRef`] so the evaluator never
/// round-trips placeholder strings.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// A numeral written in the source. Constant across evaluations.
    Number(f64),
    /// An intermediate result spliced in during reduction.
    Value(f64),
    /// Reference to a computed-value cache slot (possibly NULL).
    CacheRef(usize),
    /// A variable reference; replaced by a `CacheRef` to `slot` before
    /// reduction starts.
    Variable { symbol: usize, slot: usize },
    /// A function name, indexing `SanitizedForm::functions`. Always
    /// followed by `OpenArgs`.
    Function(usize),
    Operator(Operator),
    OpenParen,
    CloseParen,
    /// Opening delimiter of a function argument list.
    OpenArgs,
    /// Closing delimiter of a function argument list.
    CloseArgs,
    Comma,
}

impl Token {
    pub fn operator(&self) -> Option<Operator> {
        match self {
            Token::Operator(op) => Some(*op),
            _ => None,
        }
    }
}

/// Argument counts accepted by a function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive range.
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Range(lo, hi) => write!(f, "{} to {}", lo, hi),
        }
    }
}

/// The reusable product of sanitizing an expression.
///
/// Slot numbers are handed out left to right while sanitizing (NULL literals
/// first, then variable references) and are never reused inside one form, so
/// a `CacheRef(slot)` is a stable index into the computed-value cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SanitizedForm {
    /// Normalized text: lower-cased, whitespace removed, argument lists
    /// delimited by `[`/`]`, NULL literals rewritten to `$<slot>$`.
    pub text: String,
    /// Token stream equivalent to `text`.
    pub tokens: Vec<Token>,
    /// Upper bound on the cache slots one evaluation can use. Always >= 1.
    pub operation_count: usize,
    /// Discovered variable names, unique, in discovery order.
    pub variables: Vec<String>,
    /// Discovered function names, unique, in discovery order.
    pub functions: Vec<String>,
    /// Slots assigned during sanitization (NULL literals and variable
    /// references). Intermediate results are numbered from here.
    pub consumed_cache_slots: usize,
    /// How many of the consumed slots hold NULL literals (slots `0..n`).
    pub null_literals: usize,
}

impl SanitizedForm {
    pub fn discovered_variables(&self) -> &[String] {
        &self.variables
    }

    pub fn discovered_functions(&self) -> &[String] {
        &self.functions
    }
}

/// Configuration for sanitizing and evaluating an expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionOptions {
    /// Parse numerals with the exact fast path (digits accumulated into an
    /// integer mantissa) instead of the general float parser. Both produce
    /// identical values.
    pub use_fast_float_parser: bool,
    /// Share sanitized forms through the process-wide [`crate::ParserCache`].
    pub use_parser_cache: bool,
    /// Significant digits used when rendering traces and string results.
    pub precision: u16,
    /// Value substituted for NULL operands. `None` makes NULL propagate.
    pub default_null_value: Option<f64>,
}

impl Default for ExpressionOptions {
    fn default() -> Self {
        Self {
            use_fast_float_parser: true,
            use_parser_cache: true,
            precision: 15,
            default_null_value: None,
        }
    }
}

impl ExpressionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fast_float_parser(mut self, enabled: bool) -> Self {
        self.use_fast_float_parser = enabled;
        self
    }

    pub fn with_parser_cache(mut self, enabled: bool) -> Self {
        self.use_parser_cache = enabled;
        self
    }

    pub fn with_precision(mut self, precision: u16) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_default_null_value(mut self, value: Option<f64>) -> Self {
        self.default_null_value = value;
        self
    }
}

/// Where a reduction landed on a previous pass over the same form.
///
/// `parsed_value` is set only when the reduction was constant (all inputs
/// were source numerals), in which case a later pass can splice it directly.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PreParsedCacheItem {
    pub parsed_value: Option<f64>,
    pub begin_position: usize,
    pub end_position: usize,
}

/// A resolved value addressed by a `$<slot>$` placeholder. `None` is NULL.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct PreComputedCacheItem {
    pub computed_value: Option<f64>,
    pub is_variable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_table_is_longest_first() {
        let first_single = BINARY_OPERATORS
            .iter()
            .position(|(s, _)| s.len() == 1)
            .unwrap();
        assert!(BINARY_OPERATORS[first_single..].iter().all(|(s, _)| s.len() == 1));
        assert!(BINARY_OPERATORS[..first_single].iter().all(|(s, _)| s.len() == 2));
    }

    #[test]
    fn test_tiers() {
        assert_eq!(Operator::Mul.tier(), Some(1));
        assert_eq!(Operator::BitNot.tier(), Some(1));
        assert_eq!(Operator::Sub.tier(), Some(2));
        assert_eq!(Operator::NotEqualSql.tier(), Some(3));
        assert_eq!(Operator::Or.tier(), Some(3));
        assert_eq!(Operator::Not.tier(), None);
        for (_, op) in BINARY_OPERATORS {
            assert!(op.tier().unwrap() <= TIER_COUNT);
            assert!(!op.is_prefix());
        }
    }

    #[test]
    fn test_integer_flags() {
        for op in [Operator::BitAnd, Operator::ShiftLeft, Operator::And, Operator::BitsNone] {
            assert!(op.flags().contains(OperatorFlags::INTEGER));
        }
        assert!(!Operator::Div.flags().contains(OperatorFlags::INTEGER));
        assert!(Operator::Sub.is_sign());
        assert!(Operator::Not.is_prefix());
    }

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(7));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Range(1, 2).accepts(1));
        assert!(!Arity::Range(1, 2).accepts(3));
    }

    #[test]
    fn test_default_options() {
        let options = ExpressionOptions::default();
        assert!(options.use_fast_float_parser);
        assert!(options.use_parser_cache);
        assert_eq!(options.precision, 15);
        assert_eq!(options.default_null_value, None);
    }
}
