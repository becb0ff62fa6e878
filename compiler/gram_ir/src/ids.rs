//! Index newtypes for rules, elements, tag values and weights.
//!
//! These provide type-safe indices into [`Grammar`](crate::Grammar) and
//! [`ElementArena`](crate::ElementArena) storage.

use std::fmt;

/// Index of a rule in its grammar.
///
/// A `RuleRef` element stores one of these instead of a pointer to the
/// rule; the grammar's rule list is the only ownership path.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct RuleId(u32);

impl RuleId {
    /// Create a new `RuleId` from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw index into the rule list.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Get the raw `u32` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleId({})", self.0)
    }
}

/// Index into an [`ElementArena`](crate::ElementArena).
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct ElementId(u32);

impl ElementId {
    /// Sentinel value indicating "no element" (a tag without content).
    pub const INVALID: ElementId = ElementId(u32::MAX);

    /// Create a new `ElementId` from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw index into the arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Get the raw `u32` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if this is a valid (non-sentinel) ID.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "ElementId::INVALID")
        } else {
            write!(f, "ElementId({})", self.0)
        }
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A contiguous range of element IDs in the arena's list storage.
///
/// Used for rule bodies, sequence children and `OneOf` alternatives.
/// The length is 32 bits wide: a rule body may hold millions of tokens.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ElementRange {
    pub start: u32,
    pub len: u32,
}

impl ElementRange {
    /// Empty range constant.
    pub const EMPTY: Self = Self { start: 0, len: 0 };

    /// Create a new range.
    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    /// Returns `true` if the range contains no elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements in the range.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }
}

impl fmt::Debug for ElementRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementRange({}..{})", self.start, self.start + self.len)
    }
}

/// Index of a semantic tag value in the arena's value pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Range of alternative weights in the arena's weight pool.
///
/// An empty range means the alternatives are unweighted.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug)]
pub struct WeightRange {
    pub start: u32,
    pub len: u32,
}

impl WeightRange {
    pub const EMPTY: Self = Self { start: 0, len: 0 };

    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }
}

// Compile-time assertions: IDs stay 4 bytes.
const _: () = assert!(size_of::<RuleId>() == 4);
const _: () = assert!(size_of::<ElementId>() == 4);
