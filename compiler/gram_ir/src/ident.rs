//! Unique rule-name allocation.
//!
//! Programmatically built grammars create rules without a meaningful name
//! (for example the body of a semantic key). The allocator hands out names
//! derived from a hint, suffixing a counter when the hint is taken. One
//! allocator belongs to one grammar; there is no global state.

use rustc_hash::{FxHashMap, FxHashSet};

/// Fallback hint when the caller passes an empty one.
const DEFAULT_HINT: &str = "rule";

/// Issues names unique among all names issued or reserved so far.
#[derive(Clone, Debug, Default)]
pub struct IdentifierAllocator {
    issued: FxHashSet<Box<str>>,
    /// Next suffix to try per hint, so repeated hints stay O(1).
    next_suffix: FxHashMap<Box<str>, u32>,
}

impl IdentifierAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an externally chosen name. Returns `false` if it was already
    /// issued or reserved.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.issued.insert(name.into())
    }

    /// Returns `true` if `name` was issued or reserved.
    pub fn is_taken(&self, name: &str) -> bool {
        self.issued.contains(name)
    }

    /// Allocate a fresh name based on `hint`.
    ///
    /// Returns the trimmed hint itself when free, otherwise `hint_N` for the
    /// smallest `N >= 1` not yet taken.
    pub fn new_identifier(&mut self, hint: &str) -> String {
        let base = match hint.trim() {
            "" => DEFAULT_HINT,
            trimmed => trimmed,
        };
        if self.reserve(base) {
            return base.to_owned();
        }

        let mut suffix = self.next_suffix.get(base).copied().unwrap_or(1);
        loop {
            let candidate = format!("{base}_{suffix}");
            suffix += 1;
            if self.reserve(&candidate) {
                self.next_suffix.insert(base.into(), suffix);
                return candidate;
            }
        }
    }

    /// Number of issued and reserved names.
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}
