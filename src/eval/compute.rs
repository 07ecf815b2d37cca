//! The sub-expression evaluator.
//!
//! [`Reducer::compute`] collapses a parenthesis-free token run into a single
//! operand token, in place. Reductions happen in a fixed order:
//!
//! 1. parentheses that enclose the whole run are dropped
//! 2. function calls, rightmost first, each argument reduced recursively
//! 3. prefix `!` and `~`, rightmost first
//! 4. binary operators by tier, leftmost first within a tier
//! 5. explicit signs left in front of the final operand
//!
//! Every reduction claims the next ordinal in the parse-position cache. A
//! reduction whose inputs are all source numerals records its value there,
//! and later passes over the same form splice that value without
//! recomputing it.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use bumpalo::Bump;
use bumpalo::collections::Vec as BumpVec;

use crate::error::{ExprError, Result};
use crate::eval::ops::{apply_binary, apply_prefix, apply_sign, check_finite, resolve_null};
use crate::eval::render::render_tokens;
use crate::eval::state::{ExpressionState, SlotCaches};
use crate::functions::{self, NativeFunction};
use crate::types::{Operator, PreParsedCacheItem, SanitizedForm, TIER_COUNT, Token};

/// A caller-supplied function. Receives its arguments with the NULL default
/// already applied; `None` entries are NULL. Returning `None` yields NULL.
pub type CustomFunction = Rc<dyn Fn(&[Option<f64>]) -> Option<f64>>;

/// Custom functions by lower-case name.
pub type FunctionTable = BTreeMap<String, CustomFunction>;

/// An operand located around an operator.
#[derive(Copy, Clone, Debug)]
struct Operand {
    value: Option<f64>,
    /// First token, including leading signs.
    begin: usize,
    /// The value token itself.
    last: usize,
    constant: bool,
}

fn malformed(position: usize, message: &str) -> ExprError {
    ExprError::syntax(position, message)
}

/// Reduces token runs of one evaluation pass.
pub struct Reducer<'a> {
    pub(crate) tokens: &'a mut Vec<Token>,
    caches: &'a mut SlotCaches,
    arena: &'a Bump,
    form: &'a SanitizedForm,
    functions: &'a FunctionTable,
    default_null: Option<f64>,
}

impl<'a> Reducer<'a> {
    pub fn new(
        state: &'a mut ExpressionState,
        form: &'a SanitizedForm,
        functions: &'a FunctionTable,
        default_null: Option<f64>,
    ) -> Self {
        let (tokens, caches, arena) = state.split();
        Self {
            tokens,
            caches,
            arena,
            form,
            functions,
            default_null,
        }
    }

    /// The rightmost `(` and the first `)` after it.
    pub fn innermost_group(&self) -> Result<Option<(usize, usize)>> {
        let Some(open) = self.tokens.iter().rposition(|t| *t == Token::OpenParen) else {
            return Ok(None);
        };
        let close = self.tokens[open + 1..]
            .iter()
            .position(|t| *t == Token::CloseParen)
            .map(|offset| open + 1 + offset)
            .ok_or_else(|| malformed(open, "unbalanced parenthesis: missing ')'"))?;
        Ok(Some((open, close)))
    }

    /// Reduces the group `open..=close` and replaces it, parentheses
    /// included, by its result.
    pub fn collapse_group(&mut self, open: usize, close: usize) -> Result<Token> {
        self.compute(open + 1, close)?;
        self.tokens.remove(open + 2);
        self.tokens.remove(open);
        Ok(self.tokens[open])
    }

    /// Reduces `tokens[start..end]` to one operand token at `start`.
    pub fn compute(&mut self, start: usize, end: usize) -> Result<Token> {
        if start >= end || end > self.tokens.len() {
            return Err(malformed(start, "empty sub-expression"));
        }
        let mut end = self.strip_enclosing(start, end);
        end = self.resolve_functions(start, end)?;
        end = self.resolve_prefix(start, end)?;
        for tier in 1..=TIER_COUNT {
            end = self.resolve_tier(tier, start, end)?;
        }
        self.fold_signs(start, end)?;
        Ok(self.tokens[start])
    }

    /// The current value of the operand token at `index`.
    pub fn value_of(&self, index: usize) -> Result<Option<f64>> {
        match self.tokens.get(index) {
            Some(Token::Number(v)) | Some(Token::Value(v)) => Ok(Some(*v)),
            Some(Token::CacheRef(slot)) => self
                .caches
                .computed(*slot)
                .map(|item| item.computed_value)
                .ok_or_else(|| malformed(index, "reference to an unset cache slot")),
            _ => Err(malformed(index, "expected an operand")),
        }
    }

    pub fn render(&self, start: usize, end: usize, precision: u16) -> String {
        match self.tokens.get(start..end) {
            Some(run) => render_tokens(run, self.form, self.caches, precision),
            None => String::new(),
        }
    }

    fn strip_enclosing(&mut self, start: usize, mut end: usize) -> usize {
        while end - start > 2
            && self.tokens[start] == Token::OpenParen
            && self.tokens[end - 1] == Token::CloseParen
            && !self.tokens[start + 1..end - 1]
                .iter()
                .any(|t| matches!(t, Token::OpenParen | Token::CloseParen))
        {
            self.tokens.remove(end - 1);
            self.tokens.remove(start);
            end -= 2;
        }
        end
    }

    /// Replaces `begin..=last` by the reduction's result and returns how many
    /// tokens the buffer shrank by.
    fn reduce<F>(&mut self, begin: usize, last: usize, constant: bool, evaluate: F) -> Result<usize>
    where
        F: FnOnce(&Self) -> Result<Option<f64>>,
    {
        let (ordinal, recorded) = self.caches.next_reduction();
        let value = match recorded {
            Some(PreParsedCacheItem {
                parsed_value: Some(v),
                begin_position,
                end_position,
            }) if constant && begin_position == begin && end_position == last => Some(v),
            _ => {
                let value = evaluate(self)?;
                self.caches.record_reduction(
                    ordinal,
                    PreParsedCacheItem {
                        parsed_value: if constant { value } else { None },
                        begin_position: begin,
                        end_position: last,
                    },
                );
                value
            }
        };

        let token = match value {
            Some(v) if constant => Token::Number(v),
            Some(v) => Token::Value(v),
            None => Token::CacheRef(self.caches.allocate(None)),
        };
        self.tokens[begin] = token;
        self.tokens.drain(begin + 1..=last);
        Ok(last - begin)
    }

    /// Signs followed by a value, starting at `from`.
    fn scan_right(&self, from: usize, end: usize) -> Result<Operand> {
        let mut at = from;
        let mut negate = false;
        while at < end {
            match self.tokens[at] {
                Token::Operator(Operator::Add) => {}
                Token::Operator(Operator::Sub) => negate = !negate,
                _ => break,
            }
            at += 1;
        }
        if at >= end {
            return Err(malformed(from, "missing operand"));
        }
        let mut value = self.value_of(at)?;
        if at > from {
            value = apply_sign(negate, value, self.default_null);
        }
        Ok(Operand {
            value,
            begin: from,
            last: at,
            constant: matches!(self.tokens[at], Token::Number(_)),
        })
    }

    /// The value just left of `op_at`, extended over any signs in sign
    /// position before it.
    fn scan_left(&self, op_at: usize, start: usize) -> Result<Operand> {
        if op_at == start {
            return Err(malformed(op_at, "missing left operand"));
        }
        let last = op_at - 1;
        let value = self.value_of(last)?;
        let mut begin = last;
        let mut negate = false;
        while begin > start {
            let prev = begin - 1;
            let minus = match self.tokens[prev] {
                Token::Operator(Operator::Add) => false,
                Token::Operator(Operator::Sub) => true,
                _ => break,
            };
            if prev != start && !matches!(self.tokens[prev - 1], Token::Operator(_)) {
                break;
            }
            negate ^= minus;
            begin = prev;
        }
        let value = if begin < last {
            apply_sign(negate, value, self.default_null)
        } else {
            value
        };
        Ok(Operand {
            value,
            begin,
            last,
            constant: matches!(self.tokens[last], Token::Number(_)),
        })
    }

    fn resolve_functions(&mut self, start: usize, mut end: usize) -> Result<usize> {
        while let Some(at) = (start..end)
            .rev()
            .find(|&i| matches!(self.tokens[i], Token::Function(_)))
        {
            let Token::Function(symbol) = self.tokens[at] else {
                break;
            };
            let open = at + 1;
            if self.tokens.get(open) != Some(&Token::OpenArgs) {
                return Err(ExprError::nesting(at, "function name without argument list"));
            }
            let mut close = (open + 1..end)
                .find(|&i| self.tokens[i] == Token::CloseArgs)
                .ok_or_else(|| ExprError::nesting(open, "function argument list is never closed"))?;

            let mut starts = BumpVec::new_in(self.arena);
            if open + 1 < close {
                let commas = (open + 1..close).filter(|&i| self.tokens[i] == Token::Comma);
                starts.extend(core::iter::once(open + 1).chain(commas.map(|i| i + 1)));
            }

            // Right to left, so the starts still to be visited stay valid.
            let mut arg_end = close;
            for &arg_start in starts.iter().rev() {
                let before = self.tokens.len();
                self.compute(arg_start, arg_end)?;
                let removed = before - self.tokens.len();
                close -= removed;
                end -= removed;
                arg_end = arg_start - 1;
            }

            let count = starts.len();
            let mut args = BumpVec::with_capacity_in(count, self.arena);
            let mut constant = true;
            for i in 0..count {
                let index = open + 1 + 2 * i;
                constant &= matches!(self.tokens[index], Token::Number(_));
                args.push(self.value_of(index)?);
            }

            let form = self.form;
            let name = form
                .functions
                .get(symbol)
                .ok_or_else(|| malformed(at, "unknown function symbol"))?;
            let native = functions::lookup(name);
            let constant = constant && native.is_some();
            end -= self.reduce(at, close, constant, move |this| this.call(name, native, args))?;
        }
        Ok(end)
    }

    fn call(
        &self,
        name: &str,
        native: Option<&'static NativeFunction>,
        args: BumpVec<'a, Option<f64>>,
    ) -> Result<Option<f64>> {
        if let Some(function) = native {
            if !function.arity.accepts(args.len()) {
                return Err(ExprError::Arity {
                    name: name.to_string(),
                    expected: function.arity,
                    found: args.len(),
                });
            }
            let mut resolved = BumpVec::with_capacity_in(args.len(), self.arena);
            for value in args.iter() {
                match resolve_null(*value, self.default_null) {
                    Some(v) => resolved.push(v),
                    None => return Ok(None),
                }
            }
            return check_finite(name, (function.implementation)(&resolved[..])).map(Some);
        }

        let Some(custom) = self.functions.get(name) else {
            return Err(ExprError::UndefinedFunction {
                name: name.to_string(),
            });
        };
        let resolved = BumpVec::from_iter_in(
            args.iter().map(|value| resolve_null(*value, self.default_null)),
            self.arena,
        );
        match custom(&resolved[..]) {
            Some(v) => check_finite(name, v).map(Some),
            None => Ok(None),
        }
    }

    fn resolve_prefix(&mut self, start: usize, mut end: usize) -> Result<usize> {
        while let Some(at) = (start..end)
            .rev()
            .find(|&i| matches!(self.tokens[i], Token::Operator(op) if op.is_prefix()))
        {
            let Some(op) = self.tokens[at].operator() else {
                break;
            };
            let operand = self.scan_right(at + 1, end)?;
            let default_null = self.default_null;
            end -= self.reduce(at, operand.last, operand.constant, move |_| {
                apply_prefix(op, operand.value, default_null)
            })?;
        }
        Ok(end)
    }

    /// Leftmost binary operator of `tier`. `+` and `-` in sign position are
    /// not binary.
    fn find_binary(&self, tier: u8, start: usize, end: usize) -> Option<(usize, Operator)> {
        (start..end).find_map(|i| {
            let op = self.tokens[i].operator()?;
            if op.is_prefix() || op.tier() != Some(tier) {
                return None;
            }
            if op.is_sign() && (i == start || matches!(self.tokens[i - 1], Token::Operator(_))) {
                return None;
            }
            Some((i, op))
        })
    }

    fn resolve_tier(&mut self, tier: u8, start: usize, mut end: usize) -> Result<usize> {
        while let Some((at, op)) = self.find_binary(tier, start, end) {
            let left = self.scan_left(at, start)?;
            let right = self.scan_right(at + 1, end)?;
            let default_null = self.default_null;
            end -= self.reduce(left.begin, right.last, left.constant && right.constant, move |_| {
                apply_binary(op, left.value, right.value, default_null)
            })?;
        }
        Ok(end)
    }

    fn fold_signs(&mut self, start: usize, end: usize) -> Result<()> {
        if end == start + 1 {
            return self.value_of(start).map(|_| ());
        }
        let operand = self.scan_right(start, end)?;
        if operand.last + 1 != end {
            return Err(malformed(operand.last + 1, "missing operator"));
        }
        self.reduce(start, operand.last, operand.constant, move |_| Ok(operand.value))?;
        Ok(())
    }
}
