//! Backend-agnostic graph walker.
//!
//! The walker owns every piece of per-compilation traversal state: which
//! rules have been declared, which are being lowered, and how many nodes the
//! compilation has touched so far. None of it is stored on the grammar, so
//! one `&Grammar` may be compiled by several walkers at the same time.
//!
//! # Traversal
//!
//! Rules are declared to the backend the first time they are reached (as
//! the root, as a public rule, or through a `RuleRef`) and queued. Each
//! queued rule's body is then lowered depth-first in declaration order.
//! A reference to a rule that has not been lowered yet, including the rule
//! currently being lowered, resolves to the handle from its declaration,
//! so recursion needs no special casing and every rule is lowered once.

use std::collections::VecDeque;

use gram_ir::{
    Dynamic, Element, ElementId, Grammar, GrammarFeatures, Rule, RuleId, SpecialRule, TagValue,
};
use smallvec::SmallVec;

use crate::backend::{Backend, ItemSpec, RuleDecl, TagSpec, TagValueRef, TokenSpec, UnitInfo};
use crate::validator::{self, Position};
use crate::{ensure_sufficient_stack, CompileError, CompileOptions, NodeRef};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

#[derive(Copy, Clone, Debug)]
struct RuleVisit<R> {
    state: VisitState,
    /// Set once the rule has been declared to the backend.
    handle: Option<R>,
    /// Final reachable count, valid once `Done`.
    reachable: u64,
}

/// Lowers a [`Grammar`] through a [`Backend`].
pub struct Walker<'g, B: Backend> {
    grammar: &'g Grammar,
    backend: B,
    options: CompileOptions,
    /// Indexed by `RuleId`.
    visits: Vec<RuleVisit<B::Rule>>,
    pending: VecDeque<(RuleId, B::Rule)>,
    root: Option<RuleId>,
    nodes: u64,
    features: GrammarFeatures,
}

impl<'g, B: Backend> Walker<'g, B> {
    pub fn new(grammar: &'g Grammar, backend: B, options: CompileOptions) -> Self {
        Walker {
            grammar,
            backend,
            options,
            visits: vec![
                RuleVisit {
                    state: VisitState::Unvisited,
                    handle: None,
                    reachable: 0,
                };
                grammar.rule_count()
            ],
            pending: VecDeque::new(),
            root: None,
            nodes: 0,
            features: GrammarFeatures::empty(),
        }
    }

    /// Compile the grammar's root rule (if one is named) and every public
    /// rule, plus everything they reference.
    pub fn compile(mut self) -> Result<B::Output, CompileError> {
        validator::check_unit(self.grammar)?;

        let root = match self.grammar.root() {
            Some(name) => {
                let id = self.grammar.find_rule_by_name(name).ok_or_else(|| {
                    CompileError::IncompleteRootRule {
                        name: self.grammar.name(name).to_owned(),
                    }
                })?;
                Some(id)
            }
            None => None,
        };

        let mut root_handle = None;
        if let Some(id) = root {
            root_handle = Some(self.lower_root(id)?);
        }

        let grammar = self.grammar;
        for (id, rule) in grammar.rules() {
            if rule.is_public() {
                self.enqueue(id)?;
                self.drain()?;
            }
        }

        self.finish(root_handle)
    }

    /// Compile a single rule and everything it references. The rule is
    /// recorded as the root regardless of the grammar's own root.
    pub fn compile_rule(mut self, root: RuleId) -> Result<B::Output, CompileError> {
        validator::check_unit(self.grammar)?;
        if self.grammar.try_rule(root).is_none() {
            return Err(CompileError::IncompleteRootRule {
                name: format!("{root:?}"),
            });
        }
        let handle = self.lower_root(root)?;
        self.finish(Some(handle))
    }

    fn lower_root(&mut self, id: RuleId) -> Result<B::Rule, CompileError> {
        let rule = self.grammar.rule(id);
        if rule.imported {
            // An imported rule has no body to compile here.
            return Err(CompileError::IncompleteRootRule {
                name: self.grammar.name(rule.name).to_owned(),
            });
        }
        self.root = Some(id);
        let handle = self.enqueue(id)?;
        self.drain()?;
        Ok(handle)
    }

    fn finish(self, root: Option<B::Rule>) -> Result<B::Output, CompileError> {
        let unit = UnitInfo {
            culture: self.grammar.culture(),
            mode: self.grammar.mode(),
            tag_format: self.grammar.tag_format(),
            features: self.features,
        };
        tracing::debug!(
            nodes = self.nodes,
            features = ?self.features,
            "grammar lowered"
        );
        self.backend.finish(root, &unit)
    }

    /// Declare `id` to the backend on first contact and queue its body.
    fn enqueue(&mut self, id: RuleId) -> Result<B::Rule, CompileError> {
        if let Some(handle) = self.visits[id.index()].handle {
            return Ok(handle);
        }
        let grammar = self.grammar;
        let rule = grammar.rule(id);
        let decl = RuleDecl {
            id,
            name: grammar.name(rule.name),
            scope: rule.scope,
            dynamic: rule.dynamic,
            exported: rule.exported,
            imported: rule.imported,
            is_root: self.root == Some(id),
            hooks: rule
                .hooks
                .iter()
                .map(|(kind, method)| (kind, grammar.name(method)))
                .collect(),
        };
        let handle = self.backend.create_rule(&decl)?;
        self.visits[id.index()].handle = Some(handle);
        self.pending.push_back((id, handle));
        Ok(handle)
    }

    fn drain(&mut self) -> Result<(), CompileError> {
        while let Some((id, handle)) = self.pending.pop_front() {
            if self.visits[id.index()].state == VisitState::Unvisited {
                self.lower_rule(id, handle)?;
            }
        }
        Ok(())
    }

    fn lower_rule(&mut self, id: RuleId, handle: B::Rule) -> Result<(), CompileError> {
        let grammar = self.grammar;
        let rule = grammar.rule(id);
        self.visits[id.index()].state = VisitState::InProgress;

        let mut features = rule_features(rule);
        let mut reachable = 0;

        if !rule.imported {
            let body = grammar.body(id);
            reachable = count_reachable(grammar, &self.visits, body);
            self.charge(reachable)?;
            tracing::debug!(
                rule = grammar.name(rule.name),
                reachable,
                "lowering rule"
            );

            let parent = self
                .backend
                .begin_rule(handle, u32::try_from(reachable).unwrap_or(u32::MAX))?;
            if body.is_empty() {
                // Dynamic rules match nothing until the engine fills them in.
                let special = if rule.dynamic == Dynamic::True {
                    SpecialRule::Void
                } else {
                    SpecialRule::Null
                };
                self.special_ref(parent, NodeRef::rule(), special)?;
            } else {
                for &child in body {
                    self.lower(rule, child, parent, Position::RuleBody, &mut features)?;
                }
            }
        }

        self.backend.finish_rule(handle, features)?;
        self.features |= features;
        let visit = &mut self.visits[id.index()];
        visit.state = VisitState::Done;
        visit.reachable = reachable;
        Ok(())
    }

    fn charge(&mut self, reachable: u64) -> Result<(), CompileError> {
        self.nodes = self.nodes.saturating_add(reachable);
        match self.options.max_nodes {
            Some(limit) if self.nodes > limit => {
                tracing::debug!(limit, required = self.nodes, "node budget exceeded");
                Err(CompileError::CapacityExceeded {
                    what: "grammar nodes",
                    limit,
                    required: self.nodes,
                })
            }
            _ => Ok(()),
        }
    }

    fn lower(
        &mut self,
        rule: &'g Rule,
        id: ElementId,
        parent: B::Node,
        position: Position,
        features: &mut GrammarFeatures,
    ) -> Result<(), CompileError> {
        ensure_sufficient_stack(|| self.lower_element(rule, id, parent, position, features))
    }

    fn lower_element(
        &mut self,
        rule: &'g Rule,
        id: ElementId,
        parent: B::Node,
        position: Position,
        features: &mut GrammarFeatures,
    ) -> Result<(), CompileError> {
        let grammar = self.grammar;
        let element = grammar.element(id);
        validator::check_element(grammar, rule, id, element, position)?;
        let node = NodeRef::new(id, element.kind());

        match *element {
            Element::Sequence(children) => {
                let sequence = self.backend.create_sequence(parent, node)?;
                for &child in grammar.list(children) {
                    self.lower(rule, child, sequence, Position::RuleBody, features)?;
                }
            }
            Element::OneOf {
                alternatives,
                weights,
            } => {
                if alternatives.is_empty() {
                    return self.special_ref(parent, node, SpecialRule::Void);
                }
                let weights = grammar.elements().weights(weights);
                let one_of = self.backend.create_one_of(parent, node, weights)?;
                for &alternative in grammar.list(alternatives) {
                    self.lower(rule, alternative, one_of, Position::Alternative, features)?;
                }
            }
            Element::Item(item) => {
                let spec = ItemSpec {
                    repeat: item.repeat,
                    repeat_probability: item.repeat_probability,
                    weight: item.weight,
                };
                let item_node = self.backend.create_item(parent, node, &spec)?;
                self.lower(rule, item.child, item_node, Position::RuleBody, features)?;
            }
            Element::Tag(tag) => {
                let spec = TagSpec {
                    name: grammar.name(tag.name),
                    id: tag.id,
                    value: resolve_value(grammar, grammar.elements().value(tag.value)),
                    has_content: tag.child.is_valid(),
                };
                let tag_node = self.backend.create_property_tag(parent, node, &spec)?;
                if tag.child.is_valid() {
                    self.lower(rule, tag.child, tag_node, Position::TagContent, features)?;
                }
            }
            Element::RuleRef {
                target,
                semantic_key,
            } => {
                let handle = self.enqueue(target)?;
                let key = semantic_key.non_empty().map(|key| grammar.name(key));
                if key.is_some() {
                    *features |= GrammarFeatures::SEMANTIC_KEYS;
                }
                self.backend.create_rule_ref(parent, node, handle, key)?;
            }
            Element::Subset { text, mode } => {
                *features |= GrammarFeatures::SUBSET;
                self.backend
                    .create_subset(parent, node, grammar.name(text), mode)?;
            }
            Element::Token(token) => {
                let spec = TokenSpec {
                    text: grammar.name(token.text),
                    pronunciation: token.pronunciation.non_empty().map(|n| grammar.name(n)),
                    display: token.display.non_empty().map(|n| grammar.name(n)),
                };
                self.backend.create_token(parent, node, &spec)?;
            }
            Element::Wildcard => {
                *features |= GrammarFeatures::WILDCARD;
                self.special_ref(parent, node, SpecialRule::Garbage)?;
            }
            Element::Dictation { category } => {
                *features |= GrammarFeatures::DICTATION;
                let category = category.non_empty().map(|n| grammar.name(n));
                self.backend.create_dictation(parent, node, category)?;
            }
        }
        Ok(())
    }

    fn special_ref(
        &mut self,
        parent: B::Node,
        node: NodeRef,
        special: SpecialRule,
    ) -> Result<(), CompileError> {
        let target = self.backend.special_rule(special);
        self.backend.create_rule_ref(parent, node, target, None)?;
        Ok(())
    }
}

/// Features a rule contributes by its own attributes.
fn rule_features(rule: &Rule) -> GrammarFeatures {
    let mut features = GrammarFeatures::empty();
    if !rule.hooks.is_empty() {
        features |= GrammarFeatures::SCRIPT_HOOKS;
    }
    if rule.dynamic == Dynamic::True {
        features |= GrammarFeatures::DYNAMIC_RULES;
    }
    features
}

/// Number of element occurrences in a rule body, plus the counts of rules
/// it references that are already lowered. A reference to a rule that is
/// not `Done` yet costs 1 and is not followed.
fn count_reachable<R>(grammar: &Grammar, visits: &[RuleVisit<R>], body: &[ElementId]) -> u64 {
    let mut stack: SmallVec<[ElementId; 16]> = SmallVec::from_slice(body);
    let mut count = 0u64;
    while let Some(id) = stack.pop() {
        count = count.saturating_add(1);
        match *grammar.element(id) {
            Element::Sequence(children)
            | Element::OneOf {
                alternatives: children,
                ..
            } => stack.extend_from_slice(grammar.list(children)),
            Element::Item(item) => stack.push(item.child),
            Element::Tag(tag) if tag.child.is_valid() => stack.push(tag.child),
            // Counted once per reference; saturates under deep sharing.
            Element::RuleRef { target, .. } => {
                let resolved = visits
                    .get(target.index())
                    .filter(|visit| visit.state == VisitState::Done)
                    .map_or(0, |visit| visit.reachable);
                count = count.saturating_add(resolved);
            }
            _ => {}
        }
    }
    count
}

fn resolve_value(grammar: &Grammar, value: TagValue) -> TagValueRef<'_> {
    match value {
        TagValue::Empty => TagValueRef::Empty,
        TagValue::String(name) => TagValueRef::String(grammar.name(name)),
        TagValue::Int32(value) => TagValueRef::Int32(value),
        TagValue::Bool(value) => TagValueRef::Bool(value),
        TagValue::Float64(value) => TagValueRef::Float64(value),
    }
}

#[cfg(test)]
mod tests;
