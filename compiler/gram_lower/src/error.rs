//! Compilation errors.
//!
//! Every error is terminal for the current compilation: nothing partial is
//! returned. Errors carry the identity of the offending rule (by name) and,
//! where there is one, the element (arena index and kind). Formatting
//! human-readable diagnostics beyond that is left to the caller.

use std::fmt;

use gram_ir::{ElementId, ElementKind, HookKind, RuleId};

/// Identity of a grammar node in error reports.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct NodeRef {
    /// Arena index, or [`ElementId::INVALID`] for the rule itself.
    pub element: ElementId,
    pub kind: ElementKind,
}

impl NodeRef {
    pub const fn new(element: ElementId, kind: ElementKind) -> Self {
        Self { element, kind }
    }

    /// The rule as a whole (for example an empty body).
    pub const fn rule() -> Self {
        Self {
            element: ElementId::INVALID,
            kind: ElementKind::Rule,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.element.is_valid() {
            write!(f, "{} #{}", self.kind, self.element.raw())
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// Structural or attribute-placement violation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("rule `{rule}`: {hook} hook is only valid on a public rule")]
    HookRequiresPublicRule { rule: String, hook: HookKind },

    #[error("rule `{rule}`: {hook} hook `{method}` shadows the rule")]
    HookShadowsRule {
        rule: String,
        hook: HookKind,
        method: String,
    },

    #[error("rule `{rule}`: {node} has no content and is not in a rule-body position")]
    EmptyTagOutsideRuleBody { rule: String, node: NodeRef },

    #[error("subset matching mode {raw} is not one of the five defined modes")]
    InvalidSubsetMode { raw: u32 },

    #[error("rule `{rule}`: {node} has empty text")]
    EmptySubsetText { rule: String, node: NodeRef },

    #[error("rule `{rule}`: {node} repeats {min} to {max} times")]
    InvertedRepeat {
        rule: String,
        node: NodeRef,
        min: u32,
        max: u32,
    },

    #[error("rule `{rule}`: {node} has {alternatives} alternatives but {weights} weights")]
    WeightCountMismatch {
        rule: String,
        node: NodeRef,
        alternatives: usize,
        weights: usize,
    },

    #[error("rule `{rule}`: {node} refers to undefined rule {target:?}")]
    DanglingRuleRef {
        rule: String,
        node: NodeRef,
        target: RuleId,
    },

    #[error("rule `{rule}` is imported but defines a body")]
    ImportedRuleHasBody { rule: String },
}

/// Terminal compilation error.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("duplicate rule name `{name}` ({first:?} and {second:?})")]
    DuplicateRuleName {
        name: String,
        first: RuleId,
        second: RuleId,
    },

    #[error("rule `{rule}`: backend cannot represent {node} ({field}: {reason})")]
    BackendRejected {
        rule: String,
        node: NodeRef,
        field: &'static str,
        reason: String,
    },

    #[error("rule `{rule}`: arc index {index} exceeds the maximum of {max}")]
    TooManyArcs { rule: String, index: u64, max: u32 },

    #[error("rule `{rule}`: tag value type {discriminant} is not representable")]
    UnrepresentableValue { rule: String, discriminant: u32 },

    #[error("root rule `{name}` was not compiled")]
    IncompleteRootRule { name: String },

    #[error("{what} needs {required}, limit is {limit}")]
    CapacityExceeded {
        what: &'static str,
        limit: u64,
        required: u64,
    },
}

impl CompileError {
    /// Name of the rule the error points at, when there is one.
    pub fn rule(&self) -> Option<&str> {
        match self {
            CompileError::Validation(err) => match err {
                ValidationError::HookRequiresPublicRule { rule, .. }
                | ValidationError::HookShadowsRule { rule, .. }
                | ValidationError::EmptyTagOutsideRuleBody { rule, .. }
                | ValidationError::EmptySubsetText { rule, .. }
                | ValidationError::InvertedRepeat { rule, .. }
                | ValidationError::WeightCountMismatch { rule, .. }
                | ValidationError::DanglingRuleRef { rule, .. }
                | ValidationError::ImportedRuleHasBody { rule } => Some(rule),
                ValidationError::InvalidSubsetMode { .. } => None,
            },
            CompileError::DuplicateRuleName { name, .. }
            | CompileError::IncompleteRootRule { name } => Some(name),
            CompileError::BackendRejected { rule, .. }
            | CompileError::TooManyArcs { rule, .. }
            | CompileError::UnrepresentableValue { rule, .. } => Some(rule),
            CompileError::CapacityExceeded { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ref_display() {
        let node = NodeRef::new(ElementId::new(12), ElementKind::Token);
        assert_eq!(node.to_string(), "token #12");
        assert_eq!(NodeRef::rule().to_string(), "rule");
    }

    #[test]
    fn validation_errors_carry_rule_identity() {
        let err = CompileError::from(ValidationError::HookRequiresPublicRule {
            rule: "setup".to_owned(),
            hook: HookKind::OnInit,
        });
        assert_eq!(err.rule(), Some("setup"));
        assert_eq!(
            err.to_string(),
            "rule `setup`: OnInit hook is only valid on a public rule"
        );
    }

    #[test]
    fn capacity_error_has_no_rule() {
        let err = CompileError::CapacityExceeded {
            what: "grammar nodes",
            limit: 10,
            required: 11,
        };
        assert_eq!(err.rule(), None);
    }
}
