//! Per-expression working state.
//!
//! An [`ExpressionState`] owns everything one evaluation pass mutates: the
//! token buffer being reduced, the two slot caches and a scratch arena. It is
//! reset, not rebuilt, between passes so warm evaluations reuse every
//! allocation.

use alloc::sync::Arc;
use alloc::vec::Vec;

use bumpalo::Bump;

use crate::types::{PreComputedCacheItem, PreParsedCacheItem, SanitizedForm, Token};

/// Grows `items` by doubling until `index` fits, keeping stored entries.
fn grow_to<T: Clone>(items: &mut Vec<T>, index: usize, fill: T) {
    if index < items.len() {
        return;
    }
    let mut capacity = items.len().max(1);
    while capacity <= index {
        capacity *= 2;
    }
    items.resize(capacity, fill);
}

/// The parse-position cache and the computed-value cache.
#[derive(Debug, Default)]
pub struct SlotCaches {
    /// Indexed by reduction ordinal within one pass.
    parsed: Vec<Option<PreParsedCacheItem>>,
    /// Indexed by cache slot.
    computed: Vec<PreComputedCacheItem>,
    next_parsed: usize,
    next_computed: usize,
}

impl SlotCaches {
    pub fn with_capacity(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            parsed: alloc::vec![None; slots],
            computed: alloc::vec![PreComputedCacheItem::default(); slots],
            next_parsed: 0,
            next_computed: 0,
        }
    }

    /// Rewinds both cursors. Slots below `first_free` belong to the form.
    pub fn rewind(&mut self, first_free: usize) {
        self.next_parsed = 0;
        self.next_computed = first_free;
    }

    /// Forgets every recorded reduction.
    pub fn invalidate_parsed(&mut self) {
        self.parsed.iter_mut().for_each(|item| *item = None);
    }

    pub fn set_computed(&mut self, slot: usize, item: PreComputedCacheItem) {
        grow_to(&mut self.computed, slot, PreComputedCacheItem::default());
        self.computed[slot] = item;
    }

    pub fn computed(&self, slot: usize) -> Option<&PreComputedCacheItem> {
        self.computed.get(slot)
    }

    /// Stores an intermediate result in the next free slot.
    pub fn allocate(&mut self, value: Option<f64>) -> usize {
        let slot = self.next_computed;
        self.next_computed += 1;
        self.set_computed(
            slot,
            PreComputedCacheItem {
                computed_value: value,
                is_variable: false,
            },
        );
        slot
    }

    /// Claims the next reduction ordinal along with what was recorded for it
    /// on an earlier pass.
    pub fn next_reduction(&mut self) -> (usize, Option<PreParsedCacheItem>) {
        let ordinal = self.next_parsed;
        self.next_parsed += 1;
        (ordinal, self.parsed.get(ordinal).copied().flatten())
    }

    pub fn record_reduction(&mut self, ordinal: usize, item: PreParsedCacheItem) {
        grow_to(&mut self.parsed, ordinal, None);
        self.parsed[ordinal] = Some(item);
    }

    /// Reductions recorded so far in the current pass.
    pub fn reductions(&self) -> usize {
        self.next_parsed
    }
}

/// Working state bound to one [`SanitizedForm`] at a time.
#[derive(Debug)]
pub struct ExpressionState {
    pub(crate) tokens: Vec<Token>,
    pub(crate) caches: SlotCaches,
    pub(crate) arena: Bump,
    /// Identity of the form the parse-position cache was recorded against.
    form_id: usize,
}

fn form_id(form: &Arc<SanitizedForm>) -> usize {
    Arc::as_ptr(form) as usize
}

impl ExpressionState {
    /// Creates a state sized for `form`.
    pub fn new(form: &Arc<SanitizedForm>) -> Self {
        Self {
            tokens: Vec::with_capacity(form.tokens.len()),
            caches: SlotCaches::with_capacity(form.operation_count),
            arena: Bump::new(),
            form_id: form_id(form),
        }
    }

    /// Prepares for a new pass over `form`.
    ///
    /// Copies the form's tokens into the working buffer, seeds the NULL literal
    /// slots and rewinds the caches. Recorded reductions survive unless the
    /// form differs from the last one.
    pub fn reset(&mut self, form: &Arc<SanitizedForm>) {
        let id = form_id(form);
        if id != self.form_id {
            self.caches.invalidate_parsed();
            self.form_id = id;
        }
        self.tokens.clear();
        self.tokens.extend_from_slice(&form.tokens);
        self.caches.rewind(form.consumed_cache_slots);
        for slot in 0..form.null_literals {
            self.caches.set_computed(slot, PreComputedCacheItem::default());
        }
        self.arena.reset();
    }

    /// Replaces every variable token with a reference to its slot, storing
    /// `values[symbol]` there.
    pub fn bind_variables(&mut self, values: &[Option<f64>]) {
        for token in self.tokens.iter_mut() {
            if let Token::Variable { symbol, slot } = *token {
                self.caches.set_computed(
                    slot,
                    PreComputedCacheItem {
                        computed_value: values.get(symbol).copied().flatten(),
                        is_variable: true,
                    },
                );
                *token = Token::CacheRef(slot);
            }
        }
    }

    pub fn caches(&self) -> &SlotCaches {
        &self.caches
    }

    /// Borrows the buffer, the caches and the arena separately.
    pub(crate) fn split(&mut self) -> (&mut Vec<Token>, &mut SlotCaches, &Bump) {
        (&mut self.tokens, &mut self.caches, &self.arena)
    }
}
