//! Gram CFG - binary context-free grammar backend.
//!
//! Compiles a [`gram_ir::Grammar`] into a compact, self-contained binary
//! artifact and reads such artifacts back:
//! - [`CfgBackend`]: the [`gram_lower::Backend`] that lays out rules, words,
//!   arcs, semantic tags and script hooks as fixed-width records
//! - [`SymbolTable`]: the deduplicated string blob every record points into
//! - [`record`]: bit-packed records with range-checked setters
//! - [`CfgGrammar`]: a validating reader
//!
//! The artifact is produced in one pass and returned whole; on error
//! nothing is returned.

mod backend;
pub mod layout;
mod reader;
pub mod record;
mod states;
mod symbols;

pub use backend::{CfgBackend, CfgNode, CfgRule, MAX_REPEAT_BOUND};
pub use layout::{GrammarOptions, Header, Section};
pub use reader::{CfgGrammar, DecodeError};
pub use record::{ArcIndex, ArcKind, ArcRecord, RecordError, RuleAttrs, RuleRecord};
pub use symbols::SymbolTable;

use gram_ir::{Grammar, RuleId};
use gram_lower::{CompileError, CompileOptions, NodeRef, Walker};
use rayon::prelude::*;

use crate::record::MAX_ARC_INDEX;

/// Sizes of a compiled grammar's tables.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct CompileStats {
    pub rules: usize,
    pub arcs: usize,
    pub tags: usize,
    pub words: usize,
    pub scripts: usize,
    pub symbol_bytes: usize,
}

/// A finished binary artifact.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CompiledGrammar {
    pub bytes: Vec<u8>,
    pub stats: CompileStats,
}

impl CompiledGrammar {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Decode the artifact again.
    pub fn parse(&self) -> Result<CfgGrammar, DecodeError> {
        CfgGrammar::parse(&self.bytes)
    }
}

/// Compile the grammar's root rule (if one is named) and every public rule.
pub fn compile(grammar: &Grammar, options: CompileOptions) -> Result<CompiledGrammar, CompileError> {
    Walker::new(grammar, CfgBackend::new(options), options).compile()
}

/// Compile one rule and everything it references, with `root` as the root.
pub fn compile_rule(
    grammar: &Grammar,
    root: RuleId,
    options: CompileOptions,
) -> Result<CompiledGrammar, CompileError> {
    Walker::new(grammar, CfgBackend::new(options), options).compile_rule(root)
}

/// Compile several independent roots concurrently, one artifact each.
///
/// Every compilation keeps its own traversal state, so the grammar is only
/// ever borrowed shared. Results are in the order of `roots`.
pub fn compile_parallel(
    grammar: &Grammar,
    roots: &[RuleId],
    options: CompileOptions,
) -> Vec<Result<CompiledGrammar, CompileError>> {
    roots
        .par_iter()
        .map(|&root| compile_rule(grammar, root, options))
        .collect()
}

/// Attach rule identity to a record-level failure.
pub(crate) fn record_error(rule: &str, err: RecordError) -> CompileError {
    match err {
        RecordError::ArcIndexOutOfRange { index } => CompileError::TooManyArcs {
            rule: rule.to_owned(),
            index,
            max: MAX_ARC_INDEX,
        },
        RecordError::DiscriminantOutOfRange { value } | RecordError::UnknownVariant { value } => {
            CompileError::UnrepresentableValue {
                rule: rule.to_owned(),
                discriminant: value,
            }
        }
        RecordError::ReservedBitsSet { field, word } => CompileError::BackendRejected {
            rule: rule.to_owned(),
            node: NodeRef::rule(),
            field,
            reason: format!("reserved bits set in {word:#010x}"),
        },
        RecordError::InvalidField { field, value } => CompileError::BackendRejected {
            rule: rule.to_owned(),
            node: NodeRef::rule(),
            field,
            reason: format!("invalid value {value}"),
        },
    }
}
