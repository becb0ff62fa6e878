//! Lowering backend abstraction.
//!
//! The [`Walker`](crate::Walker) is written once against [`Backend`] and
//! drives every backend the same way: declare a rule, open its body, create
//! one child node per element under the node of its parent, close the rule,
//! and finally hand over the unit-level information. What a "node" is stays
//! private to the backend: a node in an object graph, a pending record in a
//! binary encoder's tables, or anything else.
//!
//! All text reaches the backend already resolved to `&str`; backends never
//! see the grammar's name table.

use gram_ir::{
    CultureId, Dynamic, GrammarFeatures, GrammarMode, HookKind, Repeat, RuleId, Scope,
    SpecialRule, SubsetMode, TagFormat,
};

use crate::{CompileError, NodeRef};

/// Everything a backend needs to declare a rule.
#[derive(Clone, Debug)]
pub struct RuleDecl<'a> {
    pub id: RuleId,
    pub name: &'a str,
    pub scope: Scope,
    pub dynamic: Dynamic,
    pub exported: bool,
    pub imported: bool,
    /// Designated root of the compilation.
    pub is_root: bool,
    pub hooks: Vec<(HookKind, &'a str)>,
}

/// Resolved repeat attributes of an item.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ItemSpec {
    pub repeat: Repeat,
    pub repeat_probability: f32,
    pub weight: f32,
}

/// Resolved semantic tag value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TagValueRef<'a> {
    Empty,
    String(&'a str),
    Int32(i32),
    Bool(bool),
    Float64(f64),
}

/// Resolved semantic tag.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TagSpec<'a> {
    pub name: &'a str,
    pub id: u32,
    pub value: TagValueRef<'a>,
    /// `false` for a standalone tag with no content.
    pub has_content: bool,
}

/// Resolved token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TokenSpec<'a> {
    pub text: &'a str,
    pub pronunciation: Option<&'a str>,
    pub display: Option<&'a str>,
}

/// Unit-level information passed to [`Backend::finish`].
#[derive(Copy, Clone, Debug)]
pub struct UnitInfo {
    pub culture: CultureId,
    pub mode: GrammarMode,
    pub tag_format: TagFormat,
    /// Union of every compiled rule's features.
    pub features: GrammarFeatures,
}

/// Construction interface implemented by each lowering target.
///
/// Calls arrive in depth-first order. For a given rule the sequence is
/// `begin_rule`, any number of `create_*` calls whose parents are the body
/// node or nodes created since, then `finish_rule`. Rules are never
/// interleaved. `create_rule` may be called for a rule long before its body
/// is lowered (forward references), and `begin_rule` is skipped for imported
/// rules.
pub trait Backend {
    /// Handle for a declared rule, usable as a reference target before the
    /// rule's body has been lowered.
    type Rule: Copy + std::fmt::Debug;
    /// Handle for a created node.
    type Node: Copy + std::fmt::Debug;
    /// Result of a successful compilation.
    type Output;

    /// Declare a rule. Called exactly once per distinct rule.
    fn create_rule(&mut self, decl: &RuleDecl<'_>) -> Result<Self::Rule, CompileError>;

    /// Sentinel rule handle. Repeated calls return the same handle.
    fn special_rule(&mut self, special: SpecialRule) -> Self::Rule;

    /// Open a rule body. `reachable` counts the body's nodes and may be used
    /// to pre-size tables.
    fn begin_rule(&mut self, rule: Self::Rule, reachable: u32) -> Result<Self::Node, CompileError>;

    fn create_sequence(
        &mut self,
        parent: Self::Node,
        node: NodeRef,
    ) -> Result<Self::Node, CompileError>;

    /// `weights` is empty for unweighted alternatives, otherwise one weight
    /// per alternative.
    fn create_one_of(
        &mut self,
        parent: Self::Node,
        node: NodeRef,
        weights: &[f32],
    ) -> Result<Self::Node, CompileError>;

    fn create_item(
        &mut self,
        parent: Self::Node,
        node: NodeRef,
        item: &ItemSpec,
    ) -> Result<Self::Node, CompileError>;

    fn create_property_tag(
        &mut self,
        parent: Self::Node,
        node: NodeRef,
        tag: &TagSpec<'_>,
    ) -> Result<Self::Node, CompileError>;

    /// Reference `target`, which may not have been lowered yet.
    fn create_rule_ref(
        &mut self,
        parent: Self::Node,
        node: NodeRef,
        target: Self::Rule,
        semantic_key: Option<&str>,
    ) -> Result<Self::Node, CompileError>;

    fn create_subset(
        &mut self,
        parent: Self::Node,
        node: NodeRef,
        text: &str,
        mode: SubsetMode,
    ) -> Result<Self::Node, CompileError>;

    fn create_token(
        &mut self,
        parent: Self::Node,
        node: NodeRef,
        token: &TokenSpec<'_>,
    ) -> Result<Self::Node, CompileError>;

    fn create_dictation(
        &mut self,
        parent: Self::Node,
        node: NodeRef,
        category: Option<&str>,
    ) -> Result<Self::Node, CompileError>;

    /// Close a rule. `features` is the OR of everything used in its body
    /// and its own attributes.
    fn finish_rule(
        &mut self,
        rule: Self::Rule,
        features: GrammarFeatures,
    ) -> Result<(), CompileError>;

    /// Produce the output once every reachable rule is closed.
    fn finish(self, root: Option<Self::Rule>, unit: &UnitInfo) -> Result<Self::Output, CompileError>;
}
