//! Shared cache of sanitized forms.
//!
//! Constructing an [`crate::Expression`] with `use_parser_cache` enabled looks
//! the raw text up here before sanitizing it. Entries are reference counted
//! ([`Arc`]) so every expression built from the same text shares one form.
//!
//! Lifecycle: entries are inserted lazily on first use and live until
//! [`ParserCache::clear`] is called; there is no eviction. Access is
//! serialized with a `critical-section` mutex. Two constructions racing on
//! the same key may both sanitize; the first insert wins and the loser's
//! form is dropped, which costs time but never correctness.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::cell::RefCell;

use critical_section::Mutex;

use crate::error::Result;
use crate::sanitizer::sanitize;
use crate::types::{ExpressionOptions, SanitizedForm};

/// Only options that influence sanitizing take part in the key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct CacheKey {
    fast_float: bool,
    text: String,
}

impl CacheKey {
    fn new(text: &str, options: &ExpressionOptions) -> Self {
        Self {
            fast_float: options.use_fast_float_parser,
            text: text.to_string(),
        }
    }
}

type Entries = BTreeMap<CacheKey, Arc<SanitizedForm>>;

/// A synchronized map from raw expression text to its sanitized form.
pub struct ParserCache {
    entries: Mutex<RefCell<Entries>>,
}

static GLOBAL: ParserCache = ParserCache::new();

impl Default for ParserCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserCache {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(RefCell::new(BTreeMap::new())),
        }
    }

    /// The process-wide instance used by [`crate::Expression::new`].
    pub fn global() -> &'static ParserCache {
        &GLOBAL
    }

    /// Returns the cached form for `text`, sanitizing and inserting it on a miss.
    ///
    /// Sanitization runs outside the critical section. Errors are not cached.
    pub fn get_or_sanitize(
        &self,
        text: &str,
        options: &ExpressionOptions,
    ) -> Result<Arc<SanitizedForm>> {
        let key = CacheKey::new(text, options);
        let hit = critical_section::with(|cs| self.entries.borrow(cs).borrow().get(&key).cloned());
        if let Some(form) = hit {
            return Ok(form);
        }

        let form = Arc::new(sanitize(text, options)?);
        Ok(critical_section::with(|cs| {
            self.entries
                .borrow(cs)
                .borrow_mut()
                .entry(key)
                .or_insert(form)
                .clone()
        }))
    }

    pub fn contains(&self, text: &str, options: &ExpressionOptions) -> bool {
        let key = CacheKey::new(text, options);
        critical_section::with(|cs| self.entries.borrow(cs).borrow().contains_key(&key))
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.entries.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry. Expressions already holding a form keep it alive.
    pub fn clear(&self) {
        critical_section::with(|cs| self.entries.borrow(cs).borrow_mut().clear());
    }
}
