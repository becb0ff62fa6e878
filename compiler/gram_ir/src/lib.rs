//! Gram IR - Grammar Representation Types
//!
//! This crate contains the core data structures for the grammar compiler:
//! - Names for interned identifiers and literal text
//! - The element arena holding rule bodies (Sequence, `OneOf`, Item, Tag, ...)
//! - Rules, stored flat and addressed by [`RuleId`]
//! - The identifier allocator used for anonymous rules
//! - Capability flags aggregated during lowering
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: Strings → Name(u32)
//! - **Flatten Everything**: No Box<Element>, use ElementId(u32) indices
//! - **Weak References by Index**: a `RuleRef` stores a `RuleId`, never an
//!   owning pointer, so recursive grammars need no reference cycles.
//!
//! The grammar is immutable while it is being compiled. Any per-compilation
//! traversal state lives with the compiler, keyed by [`RuleId`], so a single
//! `&Grammar` can be compiled from several threads at once.

/// Compile-time assertion that a type has a specific size.
///
/// Used to prevent accidental size regressions in frequently-allocated types.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod arena;
pub mod ast;
mod features;
mod grammar;
mod ident;
mod ids;
mod interner;
mod name;

pub use arena::ElementArena;
pub use ast::{
    CultureId, Dynamic, Element, ElementKind, GrammarMode, HookKind, Item, Repeat, Rule, Scope,
    ScriptHooks, SpecialRule, SubsetMode, Tag, TagFormat, TagValue, Token,
};
pub use features::GrammarFeatures;
pub use grammar::Grammar;
pub use ident::IdentifierAllocator;
pub use ids::{ElementId, ElementRange, RuleId, ValueId, WeightRange};
pub use interner::{InternError, NameTable};
pub use name::Name;
