//! Grammar AST node types.
//!
//! A grammar is a flat list of [`Rule`]s. Each rule body is a range of
//! [`Element`]s in the [`ElementArena`](crate::ElementArena); composite
//! elements refer to their children by [`ElementId`] or [`ElementRange`].

use std::fmt;

use crate::{ElementId, ElementRange, Name, RuleId, ValueId, WeightRange};

/// Rule visibility.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Scope {
    /// Externally referenceable and activatable.
    Public,
    /// Only referenceable within the same grammar.
    #[default]
    Private,
}

/// Tri-state "dynamic" rule attribute.
///
/// A dynamic rule may have its body replaced after the grammar is loaded
/// by the consuming engine.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum Dynamic {
    #[default]
    Unset = 0,
    False = 1,
    True = 2,
}

impl Dynamic {
    #[inline]
    pub const fn raw(self) -> u8 {
        self as u8
    }

    /// Decode a raw tri-state; values above 2 are invalid.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Dynamic::Unset),
            1 => Some(Dynamic::False),
            2 => Some(Dynamic::True),
            _ => None,
        }
    }

    pub const fn from_bool(value: bool) -> Self {
        if value {
            Dynamic::True
        } else {
            Dynamic::False
        }
    }
}

/// Script callback slot on a rule.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum HookKind {
    OnInit = 0,
    OnParse = 1,
    OnRecognition = 2,
    OnError = 3,
}

impl HookKind {
    pub const ALL: [HookKind; 4] = [
        HookKind::OnInit,
        HookKind::OnParse,
        HookKind::OnRecognition,
        HookKind::OnError,
    ];

    #[inline]
    pub const fn raw(self) -> u8 {
        self as u8
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(HookKind::OnInit),
            1 => Some(HookKind::OnParse),
            2 => Some(HookKind::OnRecognition),
            3 => Some(HookKind::OnError),
            _ => None,
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::OnInit => "OnInit",
            HookKind::OnParse => "OnParse",
            HookKind::OnRecognition => "OnRecognition",
            HookKind::OnError => "OnError",
        })
    }
}

/// Script method names attached to a rule. [`Name::EMPTY`] means unset.
///
/// Only the names are recorded; invoking them is up to the consumer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ScriptHooks {
    pub on_init: Name,
    pub on_parse: Name,
    pub on_recognition: Name,
    pub on_error: Name,
}

impl ScriptHooks {
    pub const NONE: Self = Self {
        on_init: Name::EMPTY,
        on_parse: Name::EMPTY,
        on_recognition: Name::EMPTY,
        on_error: Name::EMPTY,
    };

    pub fn get(&self, kind: HookKind) -> Name {
        match kind {
            HookKind::OnInit => self.on_init,
            HookKind::OnParse => self.on_parse,
            HookKind::OnRecognition => self.on_recognition,
            HookKind::OnError => self.on_error,
        }
    }

    pub fn set(&mut self, kind: HookKind, method: Name) {
        let slot = match kind {
            HookKind::OnInit => &mut self.on_init,
            HookKind::OnParse => &mut self.on_parse,
            HookKind::OnRecognition => &mut self.on_recognition,
            HookKind::OnError => &mut self.on_error,
        };
        *slot = method;
    }

    /// Attached hooks in [`HookKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (HookKind, Name)> + '_ {
        HookKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).non_empty().map(|name| (kind, name)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// A named, reusable grammar fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub name: Name,
    pub scope: Scope,
    pub dynamic: Dynamic,
    /// Explicitly exported for use by other grammars.
    pub exported: bool,
    /// Body is defined by another grammar; must be empty here.
    pub imported: bool,
    pub hooks: ScriptHooks,
    /// Rule children, matched in sequence.
    pub body: ElementRange,
}

impl Rule {
    pub fn new(name: Name, scope: Scope) -> Self {
        Self {
            name,
            scope,
            dynamic: Dynamic::Unset,
            exported: false,
            imported: false,
            hooks: ScriptHooks::NONE,
            body: ElementRange::EMPTY,
        }
    }

    #[inline]
    pub fn is_public(&self) -> bool {
        self.scope == Scope::Public
    }
}

/// Repetition bounds. `max == Repeat::UNBOUNDED` means no upper bound.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Repeat {
    pub min: u32,
    pub max: u32,
}

impl Repeat {
    pub const UNBOUNDED: u32 = u32::MAX;
    pub const ONCE: Self = Self { min: 1, max: 1 };
    pub const OPTIONAL: Self = Self { min: 0, max: 1 };
    pub const ZERO_OR_MORE: Self = Self {
        min: 0,
        max: Self::UNBOUNDED,
    };
    pub const ONE_OR_MORE: Self = Self {
        min: 1,
        max: Self::UNBOUNDED,
    };

    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub const fn exactly(count: u32) -> Self {
        Self {
            min: count,
            max: count,
        }
    }

    #[inline]
    pub const fn is_bounded(self) -> bool {
        self.max != Self::UNBOUNDED
    }

    /// `min <= max` whenever `max` is bounded.
    #[inline]
    pub const fn is_well_formed(self) -> bool {
        !self.is_bounded() || self.min <= self.max
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bounded() {
            write!(f, "{}-{}", self.min, self.max)
        } else {
            write!(f, "{}-", self.min)
        }
    }
}

/// Repeated or weighted child.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Item {
    pub child: ElementId,
    pub repeat: Repeat,
    /// Probability of taking each optional repetition.
    pub repeat_probability: f32,
    pub weight: f32,
}

impl Item {
    pub const DEFAULT_REPEAT_PROBABILITY: f32 = 0.5;

    pub fn new(child: ElementId, repeat: Repeat) -> Self {
        Self {
            child,
            repeat,
            repeat_probability: Self::DEFAULT_REPEAT_PROBABILITY,
            weight: 1.0,
        }
    }
}

/// Semantic tag value.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub enum TagValue {
    /// No value; distinct from an empty string.
    #[default]
    Empty,
    String(Name),
    Int32(i32),
    Bool(bool),
    Float64(f64),
}

/// Name/value annotation over an optional child span.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Tag {
    /// Tagged content, or [`ElementId::INVALID`] for a standalone tag.
    pub child: ElementId,
    pub name: Name,
    pub id: u32,
    pub value: ValueId,
}

/// Word to match, with optional pronunciation and display forms.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Token {
    pub text: Name,
    pub pronunciation: Name,
    pub display: Name,
}

/// Word-subset matching mode.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum SubsetMode {
    AllWords = 0,
    Subsequence = 1,
    OrderedSubset = 2,
    SubsequenceContentRequired = 3,
    OrderedSubsetContentRequired = 4,
}

impl SubsetMode {
    pub const ALL: [SubsetMode; 5] = [
        SubsetMode::AllWords,
        SubsetMode::Subsequence,
        SubsetMode::OrderedSubset,
        SubsetMode::SubsequenceContentRequired,
        SubsetMode::OrderedSubsetContentRequired,
    ];

    #[inline]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Decode a raw mode. Anything outside the five modes is `None`.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(SubsetMode::AllWords),
            1 => Some(SubsetMode::Subsequence),
            2 => Some(SubsetMode::OrderedSubset),
            3 => Some(SubsetMode::SubsequenceContentRequired),
            4 => Some(SubsetMode::OrderedSubsetContentRequired),
            _ => None,
        }
    }
}

/// Sentinel rules every backend provides.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum SpecialRule {
    /// Matches the empty input.
    Null = 1,
    /// Never matches.
    Void = 2,
    /// Matches any speech.
    Garbage = 3,
}

impl SpecialRule {
    #[inline]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(SpecialRule::Null),
            2 => Some(SpecialRule::Void),
            3 => Some(SpecialRule::Garbage),
            _ => None,
        }
    }
}

/// Grammar element stored in the arena.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Element {
    /// Children matched in order.
    Sequence(ElementRange),
    /// Exactly one alternative matches.
    OneOf {
        alternatives: ElementRange,
        weights: WeightRange,
    },
    Item(Item),
    Tag(Tag),
    RuleRef {
        target: RuleId,
        /// Property name receiving the referenced rule's result, or empty.
        semantic_key: Name,
    },
    Subset {
        text: Name,
        mode: SubsetMode,
    },
    Token(Token),
    Wildcard,
    Dictation {
        /// Dictation topic, or empty for the default.
        category: Name,
    },
}

crate::static_assert_size!(Element, 24);

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Sequence(_) => ElementKind::Sequence,
            Element::OneOf { .. } => ElementKind::OneOf,
            Element::Item(_) => ElementKind::Item,
            Element::Tag(_) => ElementKind::Tag,
            Element::RuleRef { .. } => ElementKind::RuleRef,
            Element::Subset { .. } => ElementKind::Subset,
            Element::Token(_) => ElementKind::Token,
            Element::Wildcard => ElementKind::Wildcard,
            Element::Dictation { .. } => ElementKind::Dictation,
        }
    }
}

/// Element discriminant without payload, used to identify nodes in errors.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ElementKind {
    /// The rule itself (errors about a rule's body as a whole).
    Rule,
    Sequence,
    OneOf,
    Item,
    Tag,
    RuleRef,
    Subset,
    Token,
    Wildcard,
    Dictation,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementKind::Rule => "rule",
            ElementKind::Sequence => "sequence",
            ElementKind::OneOf => "one-of",
            ElementKind::Item => "item",
            ElementKind::Tag => "tag",
            ElementKind::RuleRef => "ruleref",
            ElementKind::Subset => "subset",
            ElementKind::Token => "token",
            ElementKind::Wildcard => "wildcard",
            ElementKind::Dictation => "dictation",
        })
    }
}

/// Opaque culture (locale) identifier, carried into the compiled header.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct CultureId(pub u32);

impl CultureId {
    pub const INVARIANT: CultureId = CultureId(0x007F);
}

impl Default for CultureId {
    fn default() -> Self {
        Self::INVARIANT
    }
}

/// Input modality the grammar matches.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum GrammarMode {
    #[default]
    Voice = 0,
    Dtmf = 1,
}

impl GrammarMode {
    pub const fn raw(self) -> u32 {
        self as u32
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(GrammarMode::Voice),
            1 => Some(GrammarMode::Dtmf),
            _ => None,
        }
    }
}

/// Format of semantic tag contents.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum TagFormat {
    #[default]
    Properties = 0,
    SemanticsMs = 1,
    W3cSemantics = 2,
    Literals = 3,
}

impl TagFormat {
    pub const fn raw(self) -> u32 {
        self as u32
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(TagFormat::Properties),
            1 => Some(TagFormat::SemanticsMs),
            2 => Some(TagFormat::W3cSemantics),
            3 => Some(TagFormat::Literals),
            _ => None,
        }
    }
}
