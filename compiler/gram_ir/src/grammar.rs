//! Grammar container and builder API.
//!
//! A [`Grammar`] owns its names, rules and element arena. Elements are
//! built bottom-up: allocate the children first, then the composite that
//! lists them. Rule bodies can be replaced at any time; nothing is cached on
//! the rule, so the next compilation always sees the current body.

use crate::arena::to_u32;
use crate::{
    CultureId, Dynamic, Element, ElementArena, ElementId, ElementRange, GrammarMode, HookKind,
    IdentifierAllocator, Item, Name, NameTable, Repeat, Rule, RuleId, Scope, SubsetMode, Tag,
    TagFormat, TagValue, Token,
};

/// One compilation unit: rules plus the elements and names they use.
#[derive(Clone, Debug, Default)]
pub struct Grammar {
    names: NameTable,
    rules: Vec<Rule>,
    elements: ElementArena,
    identifiers: IdentifierAllocator,
    root: Option<Name>,
    culture: CultureId,
    mode: GrammarMode,
    tag_format: TagFormat,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    // Names

    pub fn intern(&mut self, text: &str) -> Name {
        self.names.intern(text)
    }

    #[inline]
    pub fn name(&self, name: Name) -> &str {
        self.names.lookup(name)
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    // Rules

    /// Add a rule with an explicit name.
    ///
    /// Duplicate names are accepted here and rejected at compile time, so
    /// front ends can report every collision with full rule identity.
    pub fn add_rule(&mut self, name: &str, scope: Scope) -> RuleId {
        self.identifiers.reserve(name);
        let name = self.names.intern(name);
        self.push_rule(Rule::new(name, scope))
    }

    /// Add a rule whose name is generated from `hint` and guaranteed unique
    /// among names issued by this grammar.
    pub fn add_anonymous_rule(&mut self, hint: &str, scope: Scope) -> RuleId {
        let generated = self.identifiers.new_identifier(hint);
        let name = self.names.intern(&generated);
        self.push_rule(Rule::new(name, scope))
    }

    fn push_rule(&mut self, rule: Rule) -> RuleId {
        let id = RuleId::new(to_u32(self.rules.len(), "rules"));
        self.rules.push(rule);
        id
    }

    #[inline]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    #[inline]
    pub fn rule_mut(&mut self, id: RuleId) -> &mut Rule {
        &mut self.rules[id.index()]
    }

    /// Get the rule, or `None` for an out-of-range ID.
    pub fn try_rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.index())
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> impl ExactSizeIterator<Item = (RuleId, &Rule)> + '_ {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| (RuleId::new(to_u32(index, "rules")), rule))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// First rule declared with `name`.
    pub fn find_rule(&self, name: &str) -> Option<RuleId> {
        let name = self.names.get(name)?;
        self.find_rule_by_name(name)
    }

    pub fn find_rule_by_name(&self, name: Name) -> Option<RuleId> {
        self.rules().find(|(_, rule)| rule.name == name).map(|(id, _)| id)
    }

    /// Replace a rule's body.
    pub fn set_body(&mut self, rule: RuleId, children: &[ElementId]) {
        let body = self.elements.alloc_list(children);
        self.rules[rule.index()].body = body;
    }

    /// Replace a rule's body from an iterator of children.
    pub fn set_body_iter(&mut self, rule: RuleId, children: impl IntoIterator<Item = ElementId>) {
        let body = self.elements.alloc_list_iter(children);
        self.rules[rule.index()].body = body;
    }

    pub fn set_dynamic(&mut self, rule: RuleId, dynamic: Dynamic) {
        self.rules[rule.index()].dynamic = dynamic;
    }

    pub fn set_hook(&mut self, rule: RuleId, kind: HookKind, method: &str) {
        let method = self.names.intern(method);
        self.rules[rule.index()].hooks.set(kind, method);
    }

    // Grammar metadata

    pub fn set_root(&mut self, name: &str) {
        self.root = Some(self.names.intern(name));
    }

    pub fn clear_root(&mut self) {
        self.root = None;
    }

    /// Name of the root rule, if one was designated.
    pub fn root(&self) -> Option<Name> {
        self.root
    }

    pub fn culture(&self) -> CultureId {
        self.culture
    }

    pub fn set_culture(&mut self, culture: CultureId) {
        self.culture = culture;
    }

    pub fn mode(&self) -> GrammarMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: GrammarMode) {
        self.mode = mode;
    }

    pub fn tag_format(&self) -> TagFormat {
        self.tag_format
    }

    pub fn set_tag_format(&mut self, format: TagFormat) {
        self.tag_format = format;
    }

    // Elements

    #[inline]
    pub fn elements(&self) -> &ElementArena {
        &self.elements
    }

    #[inline]
    pub fn element(&self, id: ElementId) -> &Element {
        self.elements.get(id)
    }

    #[inline]
    pub fn list(&self, range: ElementRange) -> &[ElementId] {
        self.elements.list(range)
    }

    /// Children of a rule, in declaration order.
    pub fn body(&self, rule: RuleId) -> &[ElementId] {
        self.elements.list(self.rules[rule.index()].body)
    }

    /// Reserve room for `additional` elements.
    pub fn reserve_elements(&mut self, additional: usize) {
        self.elements.reserve(additional);
    }

    pub fn token(&mut self, text: &str) -> ElementId {
        let text = self.names.intern(text);
        self.elements.alloc(Element::Token(Token {
            text,
            pronunciation: Name::EMPTY,
            display: Name::EMPTY,
        }))
    }

    pub fn token_with(
        &mut self,
        text: &str,
        pronunciation: Option<&str>,
        display: Option<&str>,
    ) -> ElementId {
        let token = Token {
            text: self.names.intern(text),
            pronunciation: self.optional_name(pronunciation),
            display: self.optional_name(display),
        };
        self.elements.alloc(Element::Token(token))
    }

    /// Allocate a token whose text is already interned.
    pub fn token_name(&mut self, text: Name) -> ElementId {
        self.elements.alloc(Element::Token(Token {
            text,
            pronunciation: Name::EMPTY,
            display: Name::EMPTY,
        }))
    }

    pub fn sequence(&mut self, children: &[ElementId]) -> ElementId {
        let range = self.elements.alloc_list(children);
        self.elements.alloc(Element::Sequence(range))
    }

    pub fn one_of(&mut self, alternatives: &[ElementId]) -> ElementId {
        let alternatives = self.elements.alloc_list(alternatives);
        self.elements.alloc(Element::OneOf {
            alternatives,
            weights: crate::WeightRange::EMPTY,
        })
    }

    /// `OneOf` with one weight per alternative.
    pub fn one_of_weighted(&mut self, alternatives: &[(ElementId, f32)]) -> ElementId {
        let ids: Vec<ElementId> = alternatives.iter().map(|&(id, _)| id).collect();
        let weights: Vec<f32> = alternatives.iter().map(|&(_, weight)| weight).collect();
        self.one_of_with_weights(&ids, &weights)
    }

    /// `OneOf` with a separately supplied weight list. The lengths are
    /// checked at compile time, not here.
    pub fn one_of_with_weights(&mut self, alternatives: &[ElementId], weights: &[f32]) -> ElementId {
        let alternatives = self.elements.alloc_list(alternatives);
        let weights = self.elements.alloc_weights(weights);
        self.elements.alloc(Element::OneOf {
            alternatives,
            weights,
        })
    }

    pub fn item(&mut self, child: ElementId, repeat: Repeat) -> ElementId {
        self.elements.alloc(Element::Item(Item::new(child, repeat)))
    }

    pub fn item_with(&mut self, item: Item) -> ElementId {
        self.elements.alloc(Element::Item(item))
    }

    /// Semantic tag over `child`, or a standalone tag when `child` is `None`.
    pub fn tag(&mut self, child: Option<ElementId>, name: &str, value: TagValue) -> ElementId {
        self.tag_with_id(child, name, 0, value)
    }

    pub fn tag_with_id(
        &mut self,
        child: Option<ElementId>,
        name: &str,
        id: u32,
        value: TagValue,
    ) -> ElementId {
        let name = self.names.intern(name);
        let value = self.elements.alloc_value(value);
        self.elements.alloc(Element::Tag(Tag {
            child: child.unwrap_or(ElementId::INVALID),
            name,
            id,
            value,
        }))
    }

    /// Intern `text` as a string tag value.
    pub fn string_value(&mut self, text: &str) -> TagValue {
        TagValue::String(self.names.intern(text))
    }

    pub fn rule_ref(&mut self, target: RuleId) -> ElementId {
        self.elements.alloc(Element::RuleRef {
            target,
            semantic_key: Name::EMPTY,
        })
    }

    pub fn rule_ref_with_key(&mut self, target: RuleId, semantic_key: &str) -> ElementId {
        let semantic_key = self.names.intern(semantic_key);
        self.elements.alloc(Element::RuleRef {
            target,
            semantic_key,
        })
    }

    pub fn subset(&mut self, text: &str, mode: SubsetMode) -> ElementId {
        let text = self.names.intern(text);
        self.elements.alloc(Element::Subset { text, mode })
    }

    pub fn wildcard(&mut self) -> ElementId {
        self.elements.alloc(Element::Wildcard)
    }

    pub fn dictation(&mut self, category: Option<&str>) -> ElementId {
        let category = self.optional_name(category);
        self.elements.alloc(Element::Dictation { category })
    }

    fn optional_name(&mut self, text: Option<&str>) -> Name {
        text.map_or(Name::EMPTY, |text| self.names.intern(text))
    }
}
