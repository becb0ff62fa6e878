//! Interned string identifier.
//!
//! Rule names, token text, tag names and every other piece of grammar text
//! is stored once in the [`NameTable`](crate::NameTable) and referred to by
//! a 32-bit [`Name`].

use std::fmt;

/// Interned string handle.
///
/// Index 0 is always the empty string, which doubles as "absent" for
/// optional text fields (pronunciation, display form, semantic key).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    /// Create from a table index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Name(index)
    }

    /// Index into the owning table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Get raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` for the empty string.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `None` for the empty string, `Some(self)` otherwise.
    #[inline]
    pub const fn non_empty(self) -> Option<Name> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_index_zero() {
        assert_eq!(Name::EMPTY.index(), 0);
        assert!(Name::EMPTY.is_empty());
        assert_eq!(Name::default(), Name::EMPTY);
    }

    #[test]
    fn non_empty_filters_empty() {
        assert_eq!(Name::EMPTY.non_empty(), None);
        assert_eq!(Name::new(3).non_empty(), Some(Name::new(3)));
    }

    #[test]
    fn names_order_by_index() {
        assert!(Name::new(1) < Name::new(2));
    }
}
