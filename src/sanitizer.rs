//! Expression sanitizer: raw text in, [`SanitizedForm`] out.
//!
//! A single left-to-right scan over the lower-cased input, recursing once per
//! nested function call. Before scanning, every `null` literal is located and
//! given a cache slot, so downstream code sees NULL only as an ordinary cache
//! reference. The scan validates the text as it goes; everything that can be
//! rejected without knowing parameter values is rejected here.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::Write;

use crate::error::{ExprError, Result};
use crate::types::{BINARY_OPERATORS, ExpressionOptions, Operator, SanitizedForm, Token, is_operator_char};

/// Deepest function-call nesting accepted.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Sanitizes `text`.
///
/// # Errors
///
/// [`ExprError::Syntax`] for malformed text and [`ExprError::Nesting`] for an
/// argument list that never closes or nests deeper than [`MAX_NESTING_DEPTH`].
pub fn sanitize(text: &str, options: &ExpressionOptions) -> Result<SanitizedForm> {
    let lowered = text.to_ascii_lowercase();
    let mut sanitizer = Sanitizer::new(lowered.as_bytes(), options.use_fast_float_parser);
    sanitizer.scan_scope(Scope::Root, 0)?;
    Ok(sanitizer.finish())
}

/// Checks that `form` is internally consistent before it is evaluated.
///
/// Forms produced by [`sanitize`] always pass. A form that arrived some other
/// way (deserialized from config or the wire, or edited by hand) must keep
/// every slot inside its declared counts, every symbol inside its name
/// tables and every delimiter paired. Positions in the returned errors are
/// token indices.
///
/// # Errors
///
/// [`ExprError::Syntax`] for counts, slots, symbols or stray tokens out of
/// place and [`ExprError::Nesting`] for unpaired delimiters or argument lists
/// nested deeper than [`MAX_NESTING_DEPTH`].
pub fn validate(form: &SanitizedForm) -> Result<()> {
    let tokens = &form.tokens;
    if tokens.is_empty() {
        return Err(ExprError::syntax(0, "form has no tokens"));
    }
    if form.operation_count == 0 || form.operation_count > tokens.len() {
        return Err(ExprError::syntax(0, "operation count does not match the tokens"));
    }
    if form.null_literals > form.consumed_cache_slots || form.consumed_cache_slots > tokens.len() {
        return Err(ExprError::syntax(0, "slot counts do not match the tokens"));
    }

    let mut claimed = alloc::vec![false; form.consumed_cache_slots];
    let mut claim = |index: usize, slot: usize| -> Result<()> {
        match claimed.get_mut(slot) {
            Some(seen) if !*seen => {
                *seen = true;
                Ok(())
            }
            Some(_) => Err(ExprError::syntax(index, format!("slot {} used twice", slot))),
            None => Err(ExprError::syntax(index, format!("slot {} out of range", slot))),
        }
    };

    // `true` for an argument list, `false` for a parenthesis group.
    let mut open: Vec<bool> = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        match *token {
            Token::Number(value) if !value.is_finite() => {
                return Err(ExprError::syntax(index, "numeral out of range"));
            }
            Token::Number(_) | Token::Operator(_) => {}
            Token::Value(_) => {
                return Err(ExprError::syntax(index, "intermediate value in a sanitized form"));
            }
            Token::CacheRef(slot) => {
                if slot >= form.null_literals {
                    return Err(ExprError::syntax(index, format!("slot {} is not a NULL literal", slot)));
                }
                claim(index, slot)?;
            }
            Token::Variable { symbol, slot } => {
                if symbol >= form.variables.len() {
                    return Err(ExprError::syntax(index, format!("unknown variable symbol {}", symbol)));
                }
                if slot < form.null_literals {
                    return Err(ExprError::syntax(index, format!("slot {} belongs to a NULL literal", slot)));
                }
                claim(index, slot)?;
            }
            Token::Function(symbol) => {
                if symbol >= form.functions.len() {
                    return Err(ExprError::syntax(index, format!("unknown function symbol {}", symbol)));
                }
                if tokens.get(index + 1) != Some(&Token::OpenArgs) {
                    return Err(ExprError::nesting(index, "function name without argument list"));
                }
            }
            Token::OpenArgs => {
                if index == 0 || !matches!(tokens[index - 1], Token::Function(_)) {
                    return Err(ExprError::nesting(index, "argument list without function name"));
                }
                if open.iter().filter(|&&args| args).count() >= MAX_NESTING_DEPTH {
                    return Err(ExprError::nesting(
                        index,
                        format!("function calls nested deeper than {}", MAX_NESTING_DEPTH),
                    ));
                }
                open.push(true);
            }
            Token::OpenParen => open.push(false),
            Token::CloseArgs => {
                if open.pop() != Some(true) {
                    return Err(ExprError::nesting(index, "unpaired argument list close"));
                }
            }
            Token::CloseParen => {
                if open.pop() != Some(false) {
                    return Err(ExprError::nesting(index, "unpaired closing parenthesis"));
                }
            }
            Token::Comma => {
                if open.last() != Some(&true) {
                    return Err(ExprError::syntax(index, "comma outside an argument list"));
                }
            }
        }
    }
    if !open.is_empty() {
        return Err(ExprError::nesting(tokens.len(), "delimiter never closed"));
    }
    Ok(())
}

/// Byte offsets of every stand-alone `null` literal, in order.
fn find_null_literals(src: &[u8]) -> Vec<usize> {
    const NULL: &[u8] = b"null";
    let mut found = Vec::new();
    let mut pos = 0;
    while pos + NULL.len() <= src.len() {
        let before_ok = pos == 0 || !is_ident_char(src[pos - 1]);
        let after = pos + NULL.len();
        let after_ok = after == src.len() || !is_ident_char(src[after]);
        if before_ok && after_ok && &src[pos..after] == NULL {
            found.push(pos);
            pos = after;
        } else {
            pos += 1;
        }
    }
    found
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_lowercase() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Parses a validated numeral (digits with at most one decimal point).
///
/// With `fast` set, numerals whose digits fit an exactly representable
/// mantissa are assembled directly: one correctly rounded division by an
/// exact power of ten gives the same result as the general parser.
pub fn parse_numeral(literal: &str, fast: bool) -> Option<f64> {
    if fast {
        if let Some(value) = parse_numeral_fast(literal.as_bytes()) {
            return Some(value);
        }
    }
    literal.parse::<f64>().ok()
}

fn parse_numeral_fast(bytes: &[u8]) -> Option<f64> {
    let mut mantissa: u64 = 0;
    let mut digits = 0;
    let mut fraction_digits = 0;
    let mut seen_dot = false;
    for &b in bytes {
        if b == b'.' {
            seen_dot = true;
            continue;
        }
        if !b.is_ascii_digit() || digits >= 19 {
            return None;
        }
        mantissa = mantissa * 10 + u64::from(b - b'0');
        digits += 1;
        if seen_dot {
            fraction_digits += 1;
        }
    }
    if digits == 0 || mantissa > (1u64 << 53) || fraction_digits >= POW10.len() {
        return None;
    }
    Some(mantissa as f64 / POW10[fraction_digits])
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Scope {
    Root,
    /// A function argument list opened at byte `open`.
    Arguments { open: usize },
}

/// What the previous token was; drives adjacency checks and sign detection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Last {
    Start,
    Operand,
    Operator,
    OpenParen,
    OpenArgs,
    Comma,
    Close,
}

impl Last {
    fn expects_operand(self) -> bool {
        matches!(
            self,
            Last::Start | Last::Operator | Last::OpenParen | Last::OpenArgs | Last::Comma
        )
    }
}

struct Sanitizer<'a> {
    src: &'a [u8],
    pos: usize,
    fast_float: bool,
    nulls: Vec<usize>,
    text: String,
    tokens: Vec<Token>,
    variables: Vec<String>,
    functions: Vec<String>,
    next_slot: usize,
    operation_count: usize,
    last: Last,
    /// Operator characters seen since the last non-operator token.
    run_chars: usize,
    /// Spelling length of the previous operator in the current run.
    run_prev_len: usize,
}

impl<'a> Sanitizer<'a> {
    fn new(src: &'a [u8], fast_float: bool) -> Self {
        let nulls = find_null_literals(src);
        let null_count = nulls.len();
        Self {
            src,
            pos: 0,
            fast_float,
            nulls,
            text: String::with_capacity(src.len()),
            tokens: Vec::with_capacity(src.len()),
            variables: Vec::new(),
            functions: Vec::new(),
            next_slot: null_count,
            operation_count: null_count,
            last: Last::Start,
            run_chars: 0,
            run_prev_len: 0,
        }
    }

    fn finish(self) -> SanitizedForm {
        SanitizedForm {
            text: self.text,
            tokens: self.tokens,
            operation_count: self.operation_count.max(1),
            variables: self.variables,
            functions: self.functions,
            consumed_cache_slots: self.next_slot,
            null_literals: self.nulls.len(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn push(&mut self, token: Token, last: Last) {
        self.tokens.push(token);
        self.last = last;
        if !matches!(token, Token::Operator(_)) {
            self.run_chars = 0;
            self.run_prev_len = 0;
        }
    }

    fn scan_scope(&mut self, scope: Scope, depth: usize) -> Result<()> {
        let mut parens = 0usize;
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                break;
            };
            match c {
                b'0'..=b'9' | b'.' => self.numeral()?,
                c if is_ident_start(c) => self.identifier(depth)?,
                b'(' => {
                    self.expect_operand_position("(")?;
                    self.pos += 1;
                    self.operation_count += 1;
                    self.text.push('(');
                    self.push(Token::OpenParen, Last::OpenParen);
                    parens += 1;
                }
                b')' => {
                    if parens == 0 {
                        return match scope {
                            Scope::Arguments { .. } => self.close_arguments(),
                            Scope::Root => Err(ExprError::syntax(
                                self.pos,
                                "unbalanced parenthesis: ')' without matching '('",
                            )),
                        };
                    }
                    self.close_paren()?;
                    parens -= 1;
                }
                b',' => {
                    if !matches!(scope, Scope::Arguments { .. }) || parens > 0 {
                        return Err(ExprError::syntax(
                            self.pos,
                            "comma outside a function argument list",
                        ));
                    }
                    if !matches!(self.last, Last::Operand | Last::Close) {
                        return Err(ExprError::syntax(self.pos, "missing argument before ','"));
                    }
                    self.pos += 1;
                    self.text.push(',');
                    self.push(Token::Comma, Last::Comma);
                }
                c if is_operator_char(c) => self.operator()?,
                c => {
                    let message = if c.is_ascii_graphic() {
                        format!("unhandled character '{}'", c as char)
                    } else {
                        "unhandled character".to_string()
                    };
                    return Err(ExprError::syntax(self.pos, message));
                }
            }
        }

        match scope {
            Scope::Arguments { open } => Err(ExprError::nesting(
                open,
                "function argument list is never closed",
            )),
            Scope::Root => {
                if parens > 0 {
                    return Err(ExprError::syntax(
                        self.pos,
                        "unbalanced parenthesis: missing ')'",
                    ));
                }
                match self.last {
                    Last::Start => Err(ExprError::syntax(0, "empty expression")),
                    Last::Operator => Err(ExprError::syntax(
                        self.pos,
                        "expression ends with an operator",
                    )),
                    _ => Ok(()),
                }
            }
        }
    }

    fn expect_operand_position(&self, what: &str) -> Result<()> {
        if self.last.expects_operand() {
            Ok(())
        } else {
            Err(ExprError::syntax(
                self.pos,
                format!("missing operator before '{}'", what),
            ))
        }
    }

    fn close_paren(&mut self) -> Result<()> {
        match self.last {
            Last::Operand | Last::Close => {}
            Last::OpenParen => return Err(ExprError::syntax(self.pos, "empty parentheses")),
            _ => return Err(ExprError::syntax(self.pos, "missing operand before ')'")),
        }
        self.pos += 1;
        self.text.push(')');
        self.push(Token::CloseParen, Last::Close);
        Ok(())
    }

    fn close_arguments(&mut self) -> Result<()> {
        match self.last {
            Last::Operand | Last::Close | Last::OpenArgs => {}
            Last::Comma => return Err(ExprError::syntax(self.pos, "missing argument before ')'")),
            _ => return Err(ExprError::syntax(self.pos, "missing operand before ')'")),
        }
        self.pos += 1;
        self.text.push(']');
        self.push(Token::CloseArgs, Last::Close);
        Ok(())
    }

    fn numeral(&mut self) -> Result<()> {
        let start = self.pos;
        if !self.last.expects_operand() {
            return Err(ExprError::syntax(start, "missing operator before numeral"));
        }
        let mut dots = 0;
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    dots += 1;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if dots > 1 {
            return Err(ExprError::syntax(start, "numeral has more than one decimal point"));
        }
        if self.pos - start == dots {
            return Err(ExprError::syntax(start, "numeral has no digits"));
        }
        if matches!(self.peek(), Some(c) if is_ident_char(c)) {
            return Err(ExprError::syntax(self.pos, "invalid character in numeral"));
        }

        let literal = core::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| ExprError::syntax(start, "invalid numeral"))?;
        let value = parse_numeral(literal, self.fast_float)
            .ok_or_else(|| ExprError::syntax(start, "malformed numeral"))?;
        if !value.is_finite() {
            return Err(ExprError::syntax(start, "numeral out of range"));
        }
        self.text.push_str(literal);
        self.push(Token::Number(value), Last::Operand);
        Ok(())
    }

    fn identifier(&mut self, depth: usize) -> Result<()> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos += 1;
        }
        let name = core::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| ExprError::syntax(start, "invalid identifier"))?;

        if !self.last.expects_operand() {
            return Err(ExprError::syntax(
                start,
                format!("missing operator before '{}'", name),
            ));
        }

        if let Ok(slot) = self.nulls.binary_search(&start) {
            // Writing into a String cannot fail.
            let _ = write!(self.text, "${}$", slot);
            self.push(Token::CacheRef(slot), Last::Operand);
            return Ok(());
        }

        let name_end = self.pos;
        self.skip_whitespace();
        if self.peek() == Some(b'(') {
            if depth + 1 > MAX_NESTING_DEPTH {
                return Err(ExprError::nesting(
                    start,
                    format!("function calls nested deeper than {}", MAX_NESTING_DEPTH),
                ));
            }
            let open = self.pos;
            let symbol = intern(&mut self.functions, name);
            self.text.push_str(name);
            self.text.push('[');
            self.operation_count += 2;
            self.push(Token::Function(symbol), Last::Operand);
            self.pos += 1;
            self.push(Token::OpenArgs, Last::OpenArgs);
            return self.scan_scope(Scope::Arguments { open }, depth + 1);
        }

        // Whitespace after a variable stays a token separator.
        self.pos = name_end;
        let symbol = intern(&mut self.variables, name);
        let slot = self.next_slot;
        self.next_slot += 1;
        self.operation_count += 1;
        self.text.push_str(name);
        self.push(Token::Variable { symbol, slot }, Last::Operand);
        Ok(())
    }

    fn operator(&mut self) -> Result<()> {
        let start = self.pos;
        let rest = &self.src[start..];
        let prefix_position = self.last.expects_operand();

        let (op, len) = if prefix_position {
            let op = match rest[0] {
                b'+' => Operator::Add,
                b'-' => Operator::Sub,
                b'~' => Operator::BitNot,
                b'!' if rest.get(1) != Some(&b'=') => Operator::Not,
                _ => {
                    let spelling = longest_binary(rest).map_or("?", |(s, _)| *s);
                    return Err(ExprError::syntax(
                        start,
                        format!("operator '{}' is missing its left operand", spelling),
                    ));
                }
            };
            (op, 1)
        } else {
            match longest_binary(rest) {
                Some((spelling, op)) => (*op, spelling.len()),
                None => {
                    return Err(ExprError::syntax(
                        start,
                        format!("unexpected '{}' after operand", rest[0] as char),
                    ));
                }
            }
        };

        self.run_chars += len;
        if self.run_chars > 2 {
            let signed_two_char =
                self.run_chars == 3 && self.run_prev_len == 2 && prefix_position && op.is_sign();
            if !signed_two_char {
                return Err(ExprError::syntax(
                    start,
                    "more than two consecutive operator characters",
                ));
            }
        }
        self.run_prev_len = len;

        let spelling = core::str::from_utf8(&rest[..len])
            .map_err(|_| ExprError::syntax(start, "invalid operator"))?;
        self.text.push_str(spelling);
        self.pos += len;
        self.operation_count += 1;
        self.push(Token::Operator(op), Last::Operator);
        Ok(())
    }
}

fn longest_binary(rest: &[u8]) -> Option<&'static (&'static str, Operator)> {
    BINARY_OPERATORS
        .iter()
        .find(|(spelling, _)| rest.starts_with(spelling.as_bytes()))
}

fn intern(symbols: &mut Vec<String>, name: &str) -> usize {
    match symbols.iter().position(|s| s == name) {
        Some(idx) => idx,
        None => {
            symbols.push(name.to_string());
            symbols.len() - 1
        }
    }
}
