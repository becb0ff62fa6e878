//! JSON grammar descriptions.
//!
//! A description lists rules with nested element trees; rule references
//! are by name and may point forward, so rules are declared in a first
//! pass and their bodies built in a second.
//!
//! ```json
//! {
//!   "root": "order",
//!   "rules": [
//!     { "name": "order", "scope": "public", "body": [
//!       { "kind": "token", "text": "large" },
//!       { "kind": "item", "repeat": "0-1", "child": { "kind": "rule_ref", "rule": "drink" } }
//!     ] },
//!     { "name": "drink", "body": [
//!       { "kind": "one_of", "alternatives": [
//!         { "kind": "token", "text": "tea" },
//!         { "kind": "token", "text": "coffee" }
//!       ] }
//!     ] }
//!   ]
//! }
//! ```

use gram_ir::{
    CultureId, Dynamic, ElementId, Grammar, GrammarMode, HookKind, Item, Repeat, RuleId, Scope,
    SubsetMode, TagFormat, TagValue,
};
use gram_lower::ensure_sufficient_stack;
use serde::Deserialize;

/// A description that parsed as JSON but does not describe a grammar.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid grammar description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule `{rule}` refers to unknown rule `{target}`")]
    UnknownRule { rule: String, target: String },

    #[error("rule `{rule}`: `{text}` is not a repeat range (expected `n`, `n-m` or `n-`)")]
    InvalidRepeat { rule: String, text: String },

    #[error("rule `{rule}`: tag `{tag}` has unsupported value {value}")]
    InvalidValue {
        rule: String,
        tag: String,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrammarDesc {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub culture: Option<u32>,
    #[serde(default)]
    pub mode: ModeDesc,
    #[serde(default)]
    pub tag_format: TagFormatDesc,
    pub rules: Vec<RuleDesc>,
}

#[derive(Copy, Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeDesc {
    #[default]
    Voice,
    Dtmf,
}

#[derive(Copy, Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagFormatDesc {
    #[default]
    Properties,
    SemanticsMs,
    W3cSemantics,
    Literals,
}

#[derive(Copy, Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeDesc {
    Public,
    #[default]
    Private,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HooksDesc {
    pub on_init: Option<String>,
    pub on_parse: Option<String>,
    pub on_recognition: Option<String>,
    pub on_error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDesc {
    /// Omitted for anonymous rules, which get a generated name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scope: ScopeDesc,
    #[serde(default)]
    pub dynamic: Option<bool>,
    #[serde(default)]
    pub exported: bool,
    #[serde(default)]
    pub imported: bool,
    #[serde(default)]
    pub hooks: HooksDesc,
    #[serde(default)]
    pub body: Vec<ElementDesc>,
}

#[derive(Copy, Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsetModeDesc {
    #[default]
    AllWords,
    Subsequence,
    OrderedSubset,
    SubsequenceContentRequired,
    OrderedSubsetContentRequired,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementDesc {
    Token {
        text: String,
        #[serde(default)]
        pronunciation: Option<String>,
        #[serde(default)]
        display: Option<String>,
    },
    Sequence {
        children: Vec<ElementDesc>,
    },
    OneOf {
        alternatives: Vec<ElementDesc>,
        #[serde(default)]
        weights: Vec<f32>,
    },
    Item {
        child: Box<ElementDesc>,
        #[serde(default = "default_repeat")]
        repeat: String,
        #[serde(default)]
        repeat_probability: Option<f32>,
        #[serde(default)]
        weight: Option<f32>,
    },
    Tag {
        name: String,
        #[serde(default)]
        id: u32,
        #[serde(default)]
        value: serde_json::Value,
        #[serde(default)]
        child: Option<Box<ElementDesc>>,
    },
    RuleRef {
        rule: String,
        #[serde(default)]
        key: Option<String>,
    },
    Subset {
        text: String,
        #[serde(default)]
        mode: SubsetModeDesc,
    },
    Wildcard,
    Dictation {
        #[serde(default)]
        category: Option<String>,
    },
}

fn default_repeat() -> String {
    "1".to_owned()
}

impl From<ModeDesc> for GrammarMode {
    fn from(mode: ModeDesc) -> Self {
        match mode {
            ModeDesc::Voice => GrammarMode::Voice,
            ModeDesc::Dtmf => GrammarMode::Dtmf,
        }
    }
}

impl From<TagFormatDesc> for TagFormat {
    fn from(format: TagFormatDesc) -> Self {
        match format {
            TagFormatDesc::Properties => TagFormat::Properties,
            TagFormatDesc::SemanticsMs => TagFormat::SemanticsMs,
            TagFormatDesc::W3cSemantics => TagFormat::W3cSemantics,
            TagFormatDesc::Literals => TagFormat::Literals,
        }
    }
}

impl From<ScopeDesc> for Scope {
    fn from(scope: ScopeDesc) -> Self {
        match scope {
            ScopeDesc::Public => Scope::Public,
            ScopeDesc::Private => Scope::Private,
        }
    }
}

impl From<SubsetModeDesc> for SubsetMode {
    fn from(mode: SubsetModeDesc) -> Self {
        match mode {
            SubsetModeDesc::AllWords => SubsetMode::AllWords,
            SubsetModeDesc::Subsequence => SubsetMode::Subsequence,
            SubsetModeDesc::OrderedSubset => SubsetMode::OrderedSubset,
            SubsetModeDesc::SubsequenceContentRequired => SubsetMode::SubsequenceContentRequired,
            SubsetModeDesc::OrderedSubsetContentRequired => {
                SubsetMode::OrderedSubsetContentRequired
            }
        }
    }
}

/// Parse `n`, `n-m` or `n-` (unbounded).
pub fn parse_repeat(text: &str) -> Option<Repeat> {
    let text = text.trim();
    match text.split_once('-') {
        None => text.parse().ok().map(Repeat::exactly),
        Some((min, "")) => Some(Repeat::new(min.trim().parse().ok()?, Repeat::UNBOUNDED)),
        Some((min, max)) => Some(Repeat::new(min.trim().parse().ok()?, max.trim().parse().ok()?)),
    }
}

/// Parse a JSON description and build the grammar it describes.
pub fn load_grammar(json: &str) -> Result<Grammar, LoadError> {
    let desc: GrammarDesc = serde_json::from_str(json)?;
    build_grammar(&desc)
}

pub fn build_grammar(desc: &GrammarDesc) -> Result<Grammar, LoadError> {
    let mut grammar = Grammar::new();
    if let Some(culture) = desc.culture {
        grammar.set_culture(CultureId(culture));
    }
    grammar.set_mode(desc.mode.into());
    grammar.set_tag_format(desc.tag_format.into());

    let ids: Vec<RuleId> = desc
        .rules
        .iter()
        .map(|rule| declare_rule(&mut grammar, rule))
        .collect();

    for (desc, &id) in desc.rules.iter().zip(&ids) {
        let mut builder = BodyBuilder {
            grammar: &mut grammar,
            rule: id,
        };
        let body = desc
            .body
            .iter()
            .map(|element| builder.element(element))
            .collect::<Result<Vec<_>, _>>()?;
        grammar.set_body(id, &body);
    }

    if let Some(root) = &desc.root {
        grammar.set_root(root);
    }
    tracing::debug!(rules = ids.len(), elements = grammar.elements().len(), "grammar loaded");
    Ok(grammar)
}

fn declare_rule(grammar: &mut Grammar, desc: &RuleDesc) -> RuleId {
    let id = match &desc.name {
        Some(name) => grammar.add_rule(name, desc.scope.into()),
        None => grammar.add_anonymous_rule("rule", desc.scope.into()),
    };
    let rule = grammar.rule_mut(id);
    rule.exported = desc.exported;
    rule.imported = desc.imported;
    if let Some(dynamic) = desc.dynamic {
        grammar.set_dynamic(id, Dynamic::from_bool(dynamic));
    }
    let hooks = [
        (HookKind::OnInit, &desc.hooks.on_init),
        (HookKind::OnParse, &desc.hooks.on_parse),
        (HookKind::OnRecognition, &desc.hooks.on_recognition),
        (HookKind::OnError, &desc.hooks.on_error),
    ];
    for (kind, method) in hooks {
        if let Some(method) = method {
            grammar.set_hook(id, kind, method);
        }
    }
    id
}

struct BodyBuilder<'a> {
    grammar: &'a mut Grammar,
    rule: RuleId,
}

impl BodyBuilder<'_> {
    fn rule_name(&self) -> String {
        self.grammar
            .name(self.grammar.rule(self.rule).name)
            .to_owned()
    }

    fn element(&mut self, desc: &ElementDesc) -> Result<ElementId, LoadError> {
        ensure_sufficient_stack(|| self.build(desc))
    }

    fn children(&mut self, descs: &[ElementDesc]) -> Result<Vec<ElementId>, LoadError> {
        descs.iter().map(|desc| self.element(desc)).collect()
    }

    fn build(&mut self, desc: &ElementDesc) -> Result<ElementId, LoadError> {
        let id = match desc {
            ElementDesc::Token {
                text,
                pronunciation,
                display,
            } => self
                .grammar
                .token_with(text, pronunciation.as_deref(), display.as_deref()),
            ElementDesc::Sequence { children } => {
                let children = self.children(children)?;
                self.grammar.sequence(&children)
            }
            ElementDesc::OneOf {
                alternatives,
                weights,
            } => {
                let alternatives = self.children(alternatives)?;
                if weights.is_empty() {
                    self.grammar.one_of(&alternatives)
                } else {
                    self.grammar.one_of_with_weights(&alternatives, weights)
                }
            }
            ElementDesc::Item {
                child,
                repeat,
                repeat_probability,
                weight,
            } => {
                let parsed = parse_repeat(repeat).ok_or_else(|| LoadError::InvalidRepeat {
                    rule: self.rule_name(),
                    text: repeat.clone(),
                })?;
                let child = self.element(child)?;
                self.grammar.item_with(Item {
                    repeat_probability: repeat_probability
                        .unwrap_or(Item::DEFAULT_REPEAT_PROBABILITY),
                    weight: weight.unwrap_or(1.0),
                    ..Item::new(child, parsed)
                })
            }
            ElementDesc::Tag {
                name,
                id,
                value,
                child,
            } => {
                let value = self.value(name, value)?;
                let child = match child {
                    Some(child) => Some(self.element(child)?),
                    None => None,
                };
                self.grammar.tag_with_id(child, name, *id, value)
            }
            ElementDesc::RuleRef { rule, key } => {
                let target = self
                    .grammar
                    .find_rule(rule)
                    .ok_or_else(|| LoadError::UnknownRule {
                        rule: self.rule_name(),
                        target: rule.clone(),
                    })?;
                match key {
                    Some(key) => self.grammar.rule_ref_with_key(target, key),
                    None => self.grammar.rule_ref(target),
                }
            }
            ElementDesc::Subset { text, mode } => self.grammar.subset(text, (*mode).into()),
            ElementDesc::Wildcard => self.grammar.wildcard(),
            ElementDesc::Dictation { category } => self.grammar.dictation(category.as_deref()),
        };
        Ok(id)
    }

    fn value(&mut self, tag: &str, value: &serde_json::Value) -> Result<TagValue, LoadError> {
        use serde_json::Value;

        let converted = match value {
            Value::Null => Some(TagValue::Empty),
            Value::Bool(value) => Some(TagValue::Bool(*value)),
            Value::Number(number) if number.is_f64() => number.as_f64().map(TagValue::Float64),
            // Integers must fit the 32-bit variant; they are never widened to floats.
            Value::Number(number) => number
                .as_i64()
                .and_then(|value| i32::try_from(value).ok())
                .map(TagValue::Int32),
            Value::String(text) => Some(self.grammar.string_value(text)),
            Value::Array(_) | Value::Object(_) => None,
        };
        converted.ok_or_else(|| LoadError::InvalidValue {
            rule: self.rule_name(),
            tag: tag.to_owned(),
            value: value.to_string(),
        })
    }
}
