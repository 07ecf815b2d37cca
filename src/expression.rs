//! The reusable expression handle.
//!
//! An [`Expression`] is built once from text, then bound and evaluated as
//! often as needed:
//!
//! 1. construction sanitizes the text, or fetches the shared form from the
//!    [`ParserCache`]
//! 2. [`Expression::set_parameter`] and [`Expression::add_function`] bind
//!    values and custom functions by name
//! 3. [`Expression::evaluate`] resets the working state, substitutes the
//!    bound values and reduces parenthesis groups innermost first
//!
//! Warm evaluations reuse the token buffer, both slot caches and the scratch
//! arena, and splice constant sub-results recorded on earlier passes.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::constants;
use crate::error::{ExprError, Result};
use crate::eval::ops::check_finite;
use crate::eval::render::format_value;
use crate::eval::{CustomFunction, ExpressionState, FunctionTable, Reducer};
use crate::parser_cache::ParserCache;
use crate::sanitizer::{sanitize, validate};
use crate::types::{ExpressionOptions, SanitizedForm};

/// A compiled expression with its bindings and working state.
///
/// # Examples
///
/// ```
/// use exp_splice::Expression;
///
/// let mut expr = Expression::new("(x + 1) * 2").unwrap();
/// expr.set_parameter("x", 4.0);
/// assert_eq!(expr.evaluate().unwrap(), Some(10.0));
///
/// expr.set_parameter("X", None);
/// assert_eq!(expr.evaluate().unwrap(), None);
/// ```
pub struct Expression {
    form: Arc<SanitizedForm>,
    options: ExpressionOptions,
    parameters: BTreeMap<String, Option<f64>>,
    functions: FunctionTable,
    state: ExpressionState,
}

impl core::fmt::Debug for Expression {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Expression")
            .field("text", &self.form.text)
            .field("options", &self.options)
            .field("parameters", &self.parameters)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Expression {
    /// Compiles `text` with default options.
    pub fn new(text: &str) -> Result<Self> {
        Self::with_options(text, ExpressionOptions::default())
    }

    /// Compiles `text`, sharing the form through [`ParserCache::global`]
    /// when `use_parser_cache` is set.
    pub fn with_options(text: &str, options: ExpressionOptions) -> Result<Self> {
        if options.use_parser_cache {
            Self::with_cache(text, options, ParserCache::global())
        } else {
            let form = Arc::new(sanitize(text, &options)?);
            Ok(Self::assemble(form, options))
        }
    }

    /// Compiles `text` through a specific cache.
    pub fn with_cache(text: &str, options: ExpressionOptions, cache: &ParserCache) -> Result<Self> {
        let form = cache.get_or_sanitize(text, &options)?;
        Ok(Self::assemble(form, options))
    }

    /// Wraps a form sanitized elsewhere, for example one deserialized from
    /// storage.
    ///
    /// # Errors
    ///
    /// Whatever [`validate`] reports for an inconsistent form.
    pub fn from_form(form: Arc<SanitizedForm>, options: ExpressionOptions) -> Result<Self> {
        validate(&form)?;
        Ok(Self::assemble(form, options))
    }

    fn assemble(form: Arc<SanitizedForm>, options: ExpressionOptions) -> Self {
        let state = ExpressionState::new(&form);
        Self {
            form,
            options,
            parameters: BTreeMap::new(),
            functions: FunctionTable::new(),
            state,
        }
    }

    /// Binds `name` (case-insensitive) to a value or to NULL. Returns the
    /// previous binding.
    ///
    /// Names that do not occur in the expression are kept but never read.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Option<f64>>) -> Option<Option<f64>> {
        self.parameters.insert(name.to_ascii_lowercase(), value.into())
    }

    /// The current binding of `name`; `Some(None)` is a NULL binding.
    pub fn parameter(&self, name: &str) -> Option<Option<f64>> {
        self.parameters.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    /// Registers a custom function under `name` (case-insensitive).
    ///
    /// Native functions take priority: a custom function named like one of
    /// them is never called. Custom functions receive NULL arguments (after
    /// the default NULL value, if any, is applied) and decide for themselves
    /// what to return.
    pub fn add_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Option<f64>]) -> Option<f64> + 'static,
    {
        let function: CustomFunction = Rc::new(function);
        self.functions.insert(name.to_ascii_lowercase(), function);
    }

    pub fn clear_functions(&mut self) {
        self.functions.clear();
    }

    pub fn sanitized(&self) -> &SanitizedForm {
        &self.form
    }

    pub fn options(&self) -> &ExpressionOptions {
        &self.options
    }

    /// Evaluates with the current bindings. `None` is a NULL result.
    ///
    /// # Errors
    ///
    /// [`ExprError::UndefinedVariable`] for an unbound name,
    /// [`ExprError::UndefinedFunction`] and [`ExprError::Arity`] for bad
    /// calls and [`ExprError::NumericDomain`] for arithmetic that leaves the
    /// finite numbers.
    pub fn evaluate(&mut self) -> Result<Option<f64>> {
        self.run(None)
    }

    /// Evaluates and also returns a trace with one `[subexpression] = value`
    /// line per reduced group, the whole expression last.
    pub fn evaluate_traced(&mut self) -> Result<(Option<f64>, String)> {
        let mut trace = String::new();
        let value = self.run(Some(&mut trace))?;
        Ok((value, trace))
    }

    /// Evaluates and formats the result with the configured precision.
    pub fn evaluate_to_string(&mut self) -> Result<String> {
        let value = self.evaluate()?;
        Ok(format_value(value, self.options.precision))
    }

    fn bound_values(&self) -> Result<Vec<Option<f64>>> {
        self.form
            .variables
            .iter()
            .map(|name| match self.parameters.get(name) {
                Some(value) => Ok(*value),
                None => constants::lookup(name).map(Some).ok_or_else(|| {
                    ExprError::UndefinedVariable {
                        name: name.to_string(),
                    }
                }),
            })
            .collect()
    }

    fn run(&mut self, mut trace: Option<&mut String>) -> Result<Option<f64>> {
        let values = self.bound_values()?;
        self.state.reset(&self.form);
        self.state.bind_variables(&values);

        let precision = self.options.precision;
        let default_null = self.options.default_null_value;
        let mut reducer = Reducer::new(&mut self.state, &self.form, &self.functions, default_null);

        while let Some((open, close)) = reducer.innermost_group()? {
            let shown = trace.as_ref().map(|_| reducer.render(open + 1, close, precision));
            reducer.collapse_group(open, close)?;
            if let (Some(out), Some(shown)) = (trace.as_deref_mut(), shown) {
                let value = reducer.value_of(open)?;
                out.push_str(&format!("[{}] = {}\n", shown, format_value(value, precision)));
            }
        }

        let len = reducer.tokens.len();
        let shown = trace.as_ref().map(|_| reducer.render(0, len, precision));
        reducer.compute(0, len)?;
        let value = reducer.value_of(0)?;
        if let (Some(out), Some(shown)) = (trace, shown) {
            out.push_str(&format!("[{}] = {}", shown, format_value(value, precision)));
        }

        match value.or(default_null) {
            Some(v) => check_finite("result", v).map(Some),
            None => Ok(None),
        }
    }
}
