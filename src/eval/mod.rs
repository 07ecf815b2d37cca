//! Expression evaluation for exp-splice.
//!
//! Evaluation works on a copy of the sanitized token stream held in an
//! [`ExpressionState`]. The innermost parenthesis group is reduced by
//! [`Reducer::compute`] and spliced back as a single value until nothing but
//! one value is left.

pub mod compute;
pub mod ops;
pub mod render;
pub mod state;

pub use compute::{CustomFunction, FunctionTable, Reducer};
pub use render::{format_value, round_to_precision};
pub use state::{ExpressionState, SlotCaches};
