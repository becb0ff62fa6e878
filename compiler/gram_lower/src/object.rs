//! Object-model backend.
//!
//! Lowers a grammar into a [`GrammarDocument`]: an owned, index-linked tree
//! with one entry per compiled rule. Useful for inspecting what the walker
//! produced and for rebuilding an equivalent [`Grammar`] without going
//! through the binary format.

use std::fmt;

use gram_ir::{
    CultureId, Dynamic, ElementId, Grammar, GrammarFeatures, GrammarMode, HookKind, Item, Repeat,
    RuleId, Scope, SpecialRule, SubsetMode, TagFormat, TagValue,
};
use smallvec::SmallVec;

use crate::backend::{Backend, ItemSpec, RuleDecl, TagSpec, TagValueRef, TokenSpec, UnitInfo};
use crate::{ensure_sufficient_stack, CompileError, NodeRef};

/// Index of a rule in a [`GrammarDocument`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct DocRuleId(u32);

impl DocRuleId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for DocRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocRuleId({})", self.0)
    }
}

/// Index of a node in a [`GrammarDocument`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct DocNodeId(u32);

impl DocNodeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for DocNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocNodeId({})", self.0)
    }
}

/// Target of a rule reference.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DocRuleRef {
    Rule(DocRuleId),
    Special(SpecialRule),
}

#[derive(Clone, PartialEq, Debug)]
pub enum DocValue {
    Empty,
    String(String),
    Int32(i32),
    Bool(bool),
    Float64(f64),
}

#[derive(Clone, PartialEq, Debug)]
pub enum DocNodeKind {
    /// Rule body; children match in sequence.
    Body,
    Sequence,
    OneOf {
        weights: Vec<f32>,
    },
    Item {
        repeat: Repeat,
        repeat_probability: f32,
        weight: f32,
    },
    Tag {
        name: String,
        id: u32,
        value: DocValue,
    },
    RuleRef {
        target: DocRuleRef,
        semantic_key: Option<String>,
    },
    Subset {
        text: String,
        mode: SubsetMode,
    },
    Token {
        text: String,
        pronunciation: Option<String>,
        display: Option<String>,
    },
    Dictation {
        category: Option<String>,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub struct DocNode {
    pub kind: DocNodeKind,
    /// Grammar element this node was lowered from.
    pub source: NodeRef,
    pub children: SmallVec<[DocNodeId; 4]>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct DocRule {
    pub name: String,
    /// Rule this entry was lowered from.
    pub source: RuleId,
    pub scope: Scope,
    pub dynamic: Dynamic,
    pub exported: bool,
    pub imported: bool,
    pub is_root: bool,
    pub hooks: Vec<(HookKind, String)>,
    /// `None` for imported rules.
    pub body: Option<DocNodeId>,
    pub features: GrammarFeatures,
}

/// In-memory result of lowering through [`ObjectBackend`].
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GrammarDocument {
    pub rules: Vec<DocRule>,
    pub nodes: Vec<DocNode>,
    pub root: Option<DocRuleId>,
    pub culture: CultureId,
    pub mode: GrammarMode,
    pub tag_format: TagFormat,
    pub features: GrammarFeatures,
}

impl GrammarDocument {
    #[inline]
    pub fn rule(&self, id: DocRuleId) -> &DocRule {
        &self.rules[id.index()]
    }

    #[inline]
    pub fn node(&self, id: DocNodeId) -> &DocNode {
        &self.nodes[id.index()]
    }

    pub fn find_rule(&self, name: &str) -> Option<DocRuleId> {
        self.rules
            .iter()
            .position(|rule| rule.name == name)
            .and_then(|index| u32::try_from(index).ok())
            .map(DocRuleId)
    }

    /// Children of a rule's body, empty for imported rules.
    pub fn body(&self, id: DocRuleId) -> &[DocNodeId] {
        match self.rule(id).body {
            Some(body) => &self.node(body).children,
            None => &[],
        }
    }

    /// Rebuild an equivalent grammar.
    ///
    /// Rules appear in compilation order. Lowering-introduced special
    /// references map back to the elements that produce them: `Garbage`
    /// becomes a wildcard, `Void` an empty alternative set and `Null` an
    /// empty sequence, except that a body holding nothing but the special
    /// reference an empty body lowers to becomes empty again.
    pub fn to_grammar(&self) -> Grammar {
        let mut grammar = Grammar::new();
        grammar.set_culture(self.culture);
        grammar.set_mode(self.mode);
        grammar.set_tag_format(self.tag_format);

        let ids: Vec<RuleId> = self
            .rules
            .iter()
            .map(|rule| {
                let id = grammar.add_rule(&rule.name, rule.scope);
                let target = grammar.rule_mut(id);
                target.dynamic = rule.dynamic;
                target.exported = rule.exported;
                target.imported = rule.imported;
                for (kind, method) in &rule.hooks {
                    grammar.set_hook(id, *kind, method);
                }
                id
            })
            .collect();

        for (index, rule) in self.rules.iter().enumerate() {
            let Some(body) = rule.body else {
                continue;
            };
            let children = &self.node(body).children;
            if self.is_empty_body_marker(rule, children) {
                continue;
            }
            let rebuilt: Vec<ElementId> = children
                .iter()
                .map(|&child| self.rebuild(&mut grammar, &ids, child))
                .collect();
            grammar.set_body(ids[index], &rebuilt);
        }

        if let Some(root) = self.root {
            grammar.set_root(&self.rule(root).name);
        }
        grammar
    }

    fn is_empty_body_marker(&self, rule: &DocRule, children: &[DocNodeId]) -> bool {
        let expected = if rule.dynamic == Dynamic::True {
            SpecialRule::Void
        } else {
            SpecialRule::Null
        };
        match children {
            [only] => {
                let node = self.node(*only);
                node.source == NodeRef::rule()
                    && node.kind
                        == DocNodeKind::RuleRef {
                            target: DocRuleRef::Special(expected),
                            semantic_key: None,
                        }
            }
            _ => false,
        }
    }

    fn rebuild(&self, grammar: &mut Grammar, ids: &[RuleId], id: DocNodeId) -> ElementId {
        ensure_sufficient_stack(|| self.rebuild_node(grammar, ids, id))
    }

    fn rebuild_node(&self, grammar: &mut Grammar, ids: &[RuleId], id: DocNodeId) -> ElementId {
        let node = self.node(id);
        let children: Vec<ElementId> = node
            .children
            .iter()
            .map(|&child| self.rebuild(grammar, ids, child))
            .collect();

        match &node.kind {
            DocNodeKind::Body | DocNodeKind::Sequence => grammar.sequence(&children),
            DocNodeKind::OneOf { weights } => grammar.one_of_with_weights(&children, weights),
            DocNodeKind::Item {
                repeat,
                repeat_probability,
                weight,
            } => grammar.item_with(Item {
                child: children.first().copied().unwrap_or_default(),
                repeat: *repeat,
                repeat_probability: *repeat_probability,
                weight: *weight,
            }),
            DocNodeKind::Tag { name, id, value } => {
                let value = match value {
                    DocValue::Empty => TagValue::Empty,
                    DocValue::String(text) => grammar.string_value(text),
                    DocValue::Int32(value) => TagValue::Int32(*value),
                    DocValue::Bool(value) => TagValue::Bool(*value),
                    DocValue::Float64(value) => TagValue::Float64(*value),
                };
                grammar.tag_with_id(children.first().copied(), name, *id, value)
            }
            DocNodeKind::RuleRef {
                target,
                semantic_key,
            } => match (target, semantic_key) {
                (DocRuleRef::Rule(rule), Some(key)) => {
                    grammar.rule_ref_with_key(ids[rule.index()], key)
                }
                (DocRuleRef::Rule(rule), None) => grammar.rule_ref(ids[rule.index()]),
                (DocRuleRef::Special(SpecialRule::Garbage), _) => grammar.wildcard(),
                (DocRuleRef::Special(SpecialRule::Void), _) => grammar.one_of(&[]),
                (DocRuleRef::Special(SpecialRule::Null), _) => grammar.sequence(&[]),
            },
            DocNodeKind::Subset { text, mode } => grammar.subset(text, *mode),
            DocNodeKind::Token {
                text,
                pronunciation,
                display,
            } => grammar.token_with(text, pronunciation.as_deref(), display.as_deref()),
            DocNodeKind::Dictation { category } => grammar.dictation(category.as_deref()),
        }
    }
}

/// [`Backend`] producing a [`GrammarDocument`].
#[derive(Debug, Default)]
pub struct ObjectBackend {
    document: GrammarDocument,
}

impl ObjectBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_node(
        &mut self,
        parent: Option<DocNodeId>,
        kind: DocNodeKind,
        source: NodeRef,
    ) -> Result<DocNodeId, CompileError> {
        let index = u32::try_from(self.document.nodes.len()).map_err(|_| {
            CompileError::CapacityExceeded {
                what: "document nodes",
                limit: u64::from(u32::MAX),
                required: self.document.nodes.len() as u64 + 1,
            }
        })?;
        let id = DocNodeId(index);
        self.document.nodes.push(DocNode {
            kind,
            source,
            children: SmallVec::new(),
        });
        if let Some(parent) = parent {
            self.document.nodes[parent.index()].children.push(id);
        }
        Ok(id)
    }

    fn child(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
        kind: DocNodeKind,
    ) -> Result<DocNodeId, CompileError> {
        self.push_node(Some(parent), kind, node)
    }
}

impl Backend for ObjectBackend {
    type Rule = DocRuleRef;
    type Node = DocNodeId;
    type Output = GrammarDocument;

    fn create_rule(&mut self, decl: &RuleDecl<'_>) -> Result<DocRuleRef, CompileError> {
        // Never more document rules than grammar rules, which are u32-indexed.
        let id = DocRuleId(u32::try_from(self.document.rules.len()).unwrap_or(u32::MAX));
        self.document.rules.push(DocRule {
            name: decl.name.to_owned(),
            source: decl.id,
            scope: decl.scope,
            dynamic: decl.dynamic,
            exported: decl.exported,
            imported: decl.imported,
            is_root: decl.is_root,
            hooks: decl
                .hooks
                .iter()
                .map(|&(kind, method)| (kind, method.to_owned()))
                .collect(),
            body: None,
            features: GrammarFeatures::empty(),
        });
        Ok(DocRuleRef::Rule(id))
    }

    fn special_rule(&mut self, special: SpecialRule) -> DocRuleRef {
        DocRuleRef::Special(special)
    }

    fn begin_rule(&mut self, rule: DocRuleRef, _reachable: u32) -> Result<DocNodeId, CompileError> {
        let DocRuleRef::Rule(rule) = rule else {
            return Err(CompileError::BackendRejected {
                rule: format!("{rule:?}"),
                node: NodeRef::rule(),
                field: "body",
                reason: "special rules have no body".to_owned(),
            });
        };
        let body = self.push_node(None, DocNodeKind::Body, NodeRef::rule())?;
        self.document.rules[rule.index()].body = Some(body);
        Ok(body)
    }

    fn create_sequence(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
    ) -> Result<DocNodeId, CompileError> {
        self.child(parent, node, DocNodeKind::Sequence)
    }

    fn create_one_of(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
        weights: &[f32],
    ) -> Result<DocNodeId, CompileError> {
        self.child(
            parent,
            node,
            DocNodeKind::OneOf {
                weights: weights.to_vec(),
            },
        )
    }

    fn create_item(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
        item: &ItemSpec,
    ) -> Result<DocNodeId, CompileError> {
        self.child(
            parent,
            node,
            DocNodeKind::Item {
                repeat: item.repeat,
                repeat_probability: item.repeat_probability,
                weight: item.weight,
            },
        )
    }

    fn create_property_tag(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
        tag: &TagSpec<'_>,
    ) -> Result<DocNodeId, CompileError> {
        let value = match tag.value {
            TagValueRef::Empty => DocValue::Empty,
            TagValueRef::String(text) => DocValue::String(text.to_owned()),
            TagValueRef::Int32(value) => DocValue::Int32(value),
            TagValueRef::Bool(value) => DocValue::Bool(value),
            TagValueRef::Float64(value) => DocValue::Float64(value),
        };
        self.child(
            parent,
            node,
            DocNodeKind::Tag {
                name: tag.name.to_owned(),
                id: tag.id,
                value,
            },
        )
    }

    fn create_rule_ref(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
        target: DocRuleRef,
        semantic_key: Option<&str>,
    ) -> Result<DocNodeId, CompileError> {
        self.child(
            parent,
            node,
            DocNodeKind::RuleRef {
                target,
                semantic_key: semantic_key.map(str::to_owned),
            },
        )
    }

    fn create_subset(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
        text: &str,
        mode: SubsetMode,
    ) -> Result<DocNodeId, CompileError> {
        self.child(
            parent,
            node,
            DocNodeKind::Subset {
                text: text.to_owned(),
                mode,
            },
        )
    }

    fn create_token(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
        token: &TokenSpec<'_>,
    ) -> Result<DocNodeId, CompileError> {
        self.child(
            parent,
            node,
            DocNodeKind::Token {
                text: token.text.to_owned(),
                pronunciation: token.pronunciation.map(str::to_owned),
                display: token.display.map(str::to_owned),
            },
        )
    }

    fn create_dictation(
        &mut self,
        parent: DocNodeId,
        node: NodeRef,
        category: Option<&str>,
    ) -> Result<DocNodeId, CompileError> {
        self.child(
            parent,
            node,
            DocNodeKind::Dictation {
                category: category.map(str::to_owned),
            },
        )
    }

    fn finish_rule(
        &mut self,
        rule: DocRuleRef,
        features: GrammarFeatures,
    ) -> Result<(), CompileError> {
        if let DocRuleRef::Rule(rule) = rule {
            self.document.rules[rule.index()].features = features;
        }
        Ok(())
    }

    fn finish(
        mut self,
        root: Option<DocRuleRef>,
        unit: &UnitInfo,
    ) -> Result<GrammarDocument, CompileError> {
        self.document.root = match root {
            Some(DocRuleRef::Rule(id)) => Some(id),
            _ => None,
        };
        self.document.culture = unit.culture;
        self.document.mode = unit.mode;
        self.document.tag_format = unit.tag_format;
        self.document.features = unit.features;
        Ok(self.document)
    }
}
