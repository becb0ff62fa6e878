//! Structural and attribute-placement checks.
//!
//! Unit-level checks run once before traversal and cover every rule, reached
//! or not: duplicate names and each rule's own attributes. Element checks
//! run as the walker reaches each element, so a violation is reported with
//! the identity of the rule that owns it.

use rustc_hash::FxHashMap;

use gram_ir::{Element, ElementId, Grammar, HookKind, Name, Rule, RuleId, SubsetMode};

use crate::{CompileError, NodeRef, ValidationError};

/// Where an element sits relative to its parent.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Position {
    /// Directly in a rule body, a sequence, or an item.
    RuleBody,
    /// One alternative of a `OneOf`.
    Alternative,
    /// The content of a tag.
    TagContent,
}

/// Reject rule names declared more than once and rules whose attributes are
/// invalid.
pub fn check_unit(grammar: &Grammar) -> Result<(), CompileError> {
    let mut seen: FxHashMap<Name, RuleId> = FxHashMap::default();
    seen.reserve(grammar.rule_count());
    for (id, rule) in grammar.rules() {
        if let Some(&first) = seen.get(&rule.name) {
            return Err(CompileError::DuplicateRuleName {
                name: grammar.name(rule.name).to_owned(),
                first,
                second: id,
            });
        }
        seen.insert(rule.name, id);
        check_rule(grammar, rule)?;
    }
    Ok(())
}

/// Check a rule's own attributes.
pub fn check_rule(grammar: &Grammar, rule: &Rule) -> Result<(), ValidationError> {
    let rule_name = grammar.name(rule.name);
    for (hook, method) in rule.hooks.iter() {
        if hook == HookKind::OnInit && !rule.is_public() {
            return Err(ValidationError::HookRequiresPublicRule {
                rule: rule_name.to_owned(),
                hook,
            });
        }
        if method == rule.name {
            return Err(ValidationError::HookShadowsRule {
                rule: rule_name.to_owned(),
                hook,
                method: grammar.name(method).to_owned(),
            });
        }
    }
    if rule.imported && !rule.body.is_empty() {
        return Err(ValidationError::ImportedRuleHasBody {
            rule: rule_name.to_owned(),
        });
    }
    Ok(())
}

/// Check one element in its position. Children are checked when the walker
/// reaches them.
pub fn check_element(
    grammar: &Grammar,
    rule: &Rule,
    id: ElementId,
    element: &Element,
    position: Position,
) -> Result<(), ValidationError> {
    let node = NodeRef::new(id, element.kind());
    let owner = || grammar.name(rule.name).to_owned();
    match *element {
        Element::Tag(tag) if !tag.child.is_valid() && position != Position::RuleBody => {
            Err(ValidationError::EmptyTagOutsideRuleBody {
                rule: owner(),
                node,
            })
        }
        Element::Subset { text, .. } if grammar.name(text).trim().is_empty() => {
            Err(ValidationError::EmptySubsetText {
                rule: owner(),
                node,
            })
        }
        Element::Item(item) if !item.repeat.is_well_formed() => {
            Err(ValidationError::InvertedRepeat {
                rule: owner(),
                node,
                min: item.repeat.min,
                max: item.repeat.max,
            })
        }
        Element::OneOf {
            alternatives,
            weights,
        } if !weights.is_empty() && weights.len() != alternatives.len() => {
            Err(ValidationError::WeightCountMismatch {
                rule: owner(),
                node,
                alternatives: alternatives.len(),
                weights: weights.len(),
            })
        }
        Element::RuleRef { target, .. } if grammar.try_rule(target).is_none() => {
            Err(ValidationError::DanglingRuleRef {
                rule: owner(),
                node,
                target,
            })
        }
        _ => Ok(()),
    }
}

/// Decode a subset matching mode read from raw input.
pub fn subset_mode_from_raw(raw: u32) -> Result<SubsetMode, ValidationError> {
    SubsetMode::from_raw(raw).ok_or(ValidationError::InvalidSubsetMode { raw })
}

#[cfg(test)]
mod tests;
