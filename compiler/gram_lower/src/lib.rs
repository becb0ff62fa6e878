//! Gram Lower - backend-agnostic grammar lowering.
//!
//! This crate turns a [`gram_ir::Grammar`] into backend output:
//! - [`Backend`]: one construction method per element kind, implemented by
//!   each lowering target
//! - [`Walker`]: the single traversal that drives any backend, with
//!   per-compilation state and cycle-safe rule references
//! - validation interleaved with the traversal, plus capability flags
//!   aggregated bottom-up
//! - [`ObjectBackend`]: lowers into an in-memory [`GrammarDocument`]
//!
//! The binary backend lives in `gram_cfg`.

pub mod backend;
mod error;
pub mod object;
mod stack;
pub mod validator;
mod walker;

pub use backend::{Backend, ItemSpec, RuleDecl, TagSpec, TagValueRef, TokenSpec, UnitInfo};
pub use error::{CompileError, NodeRef, ValidationError};
pub use object::{
    DocNode, DocNodeId, DocNodeKind, DocRule, DocRuleId, DocRuleRef, DocValue, GrammarDocument,
    ObjectBackend,
};
pub use stack::ensure_sufficient_stack;
pub use walker::Walker;

use gram_ir::Grammar;

/// Caller-supplied compilation settings.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct CompileOptions {
    /// Upper bound on the number of grammar nodes one compilation may
    /// lower. `None` means unlimited.
    pub max_nodes: Option<u64>,
    /// Added to every rule's index to form the rule id recorded in the
    /// output, so independently compiled grammars can be merged.
    pub first_rule_id: u32,
}

impl CompileOptions {
    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: u64) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    #[must_use]
    pub fn with_first_rule_id(mut self, first_rule_id: u32) -> Self {
        self.first_rule_id = first_rule_id;
        self
    }
}

/// Lower the grammar's root and public rules into a [`GrammarDocument`].
pub fn lower_to_document(
    grammar: &Grammar,
    options: CompileOptions,
) -> Result<GrammarDocument, CompileError> {
    Walker::new(grammar, ObjectBackend::new(), options).compile()
}
