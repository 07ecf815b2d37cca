//! Error types and handling for the exp-splice crate.
//!
//! Every failure aborts the sanitize or evaluate call in progress and surfaces
//! to the caller unchanged. NULL values are not errors: they travel through the
//! value domain (see [`crate::types::ExpressionOptions::default_null_value`]).

use alloc::string::String;

use crate::types::Arity;

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, ExprError>;

/// Error type for expression sanitization and evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// Malformed expression text, detected while sanitizing.
    ///
    /// Covers unbalanced parentheses, commas outside an argument list,
    /// malformed numerals, runs of more than two operator characters and
    /// characters the grammar does not know. `position` is the byte offset in
    /// the lower-cased input.
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A discovered variable has no bound value at evaluation time.
    ///
    /// Bind it with `Expression::set_parameter` before evaluating.
    #[error("Undefined variable: '{name}'")]
    UndefinedVariable { name: String },

    /// A function name matches neither the native catalogue nor a
    /// registered custom function.
    #[error("Undefined function: '{name}'")]
    UndefinedFunction { name: String },

    /// A native function was called with an unsupported argument count.
    #[error("Invalid call to '{name}': expected {expected} arguments, found {found}")]
    Arity {
        /// Name of the function that was called
        name: String,
        /// Argument counts the function accepts
        expected: Arity,
        /// Actual number of arguments provided
        found: usize,
    },

    /// Division or modulo by zero, an out-of-range shift, or a result that
    /// is NaN or infinite.
    #[error("Numeric domain error: {0}")]
    NumericDomain(String),

    /// A function argument list that never closes, or nesting deeper than
    /// the evaluator supports.
    #[error("Nesting error at position {position}: {message}")]
    Nesting { position: usize, message: String },
}

impl ExprError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        ExprError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn nesting(position: usize, message: impl Into<String>) -> Self {
        ExprError::Nesting {
            position,
            message: message.into(),
        }
    }
}
