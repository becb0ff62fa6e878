use pretty_assertions::assert_eq;

use gram_ir::{Repeat, Scope, TagValue};

use super::*;

fn element(grammar: &Grammar, id: ElementId) -> Element {
    *grammar.element(id)
}

#[test]
fn duplicate_names_are_rejected() {
    let mut grammar = Grammar::new();
    let first = grammar.add_rule("city", Scope::Public);
    grammar.add_rule("state", Scope::Public);
    let second = grammar.add_rule("city", Scope::Private);
    assert_eq!(
        check_unit(&grammar),
        Err(CompileError::DuplicateRuleName {
            name: "city".to_owned(),
            first,
            second,
        })
    );
}

#[test]
fn names_are_case_sensitive() {
    let mut grammar = Grammar::new();
    grammar.add_rule("greeting", Scope::Public);
    grammar.add_rule("Greeting", Scope::Public);
    assert_eq!(check_unit(&grammar), Ok(()));
}

#[test]
fn on_init_requires_public_rule() {
    let mut grammar = Grammar::new();
    let private = grammar.add_rule("setup", Scope::Private);
    grammar.set_hook(private, HookKind::OnInit, "init");
    assert_eq!(
        check_rule(&grammar, grammar.rule(private)),
        Err(ValidationError::HookRequiresPublicRule {
            rule: "setup".to_owned(),
            hook: HookKind::OnInit,
        })
    );

    let public = grammar.add_rule("main", Scope::Public);
    grammar.set_hook(public, HookKind::OnInit, "init");
    assert_eq!(check_rule(&grammar, grammar.rule(public)), Ok(()));
}

#[test]
fn other_hooks_allowed_on_private_rules() {
    let mut grammar = Grammar::new();
    let rule = grammar.add_rule("digits", Scope::Private);
    grammar.set_hook(rule, HookKind::OnParse, "parse_digits");
    grammar.set_hook(rule, HookKind::OnError, "digits_failed");
    assert_eq!(check_rule(&grammar, grammar.rule(rule)), Ok(()));
}

#[test]
fn hook_named_after_rule_is_rejected() {
    let mut grammar = Grammar::new();
    let rule = grammar.add_rule("main", Scope::Public);
    grammar.set_hook(rule, HookKind::OnRecognition, "main");
    assert_eq!(
        check_rule(&grammar, grammar.rule(rule)),
        Err(ValidationError::HookShadowsRule {
            rule: "main".to_owned(),
            hook: HookKind::OnRecognition,
            method: "main".to_owned(),
        })
    );
}

#[test]
fn imported_rule_must_be_empty() {
    let mut grammar = Grammar::new();
    let rule = grammar.add_rule("shared", Scope::Public);
    grammar.rule_mut(rule).imported = true;
    assert_eq!(check_rule(&grammar, grammar.rule(rule)), Ok(()));

    let word = grammar.token("word");
    grammar.set_body(rule, &[word]);
    assert_eq!(
        check_rule(&grammar, grammar.rule(rule)),
        Err(ValidationError::ImportedRuleHasBody {
            rule: "shared".to_owned()
        })
    );
}

#[test]
fn standalone_tag_only_in_rule_body() {
    let mut grammar = Grammar::new();
    let rule = grammar.add_rule("main", Scope::Public);
    let tag = grammar.tag(None, "out", TagValue::Bool(true));
    let owner = grammar.rule(rule).clone();
    let tag_element = element(&grammar, tag);

    assert_eq!(
        check_element(&grammar, &owner, tag, &tag_element, Position::RuleBody),
        Ok(())
    );
    for position in [Position::Alternative, Position::TagContent] {
        assert_eq!(
            check_element(&grammar, &owner, tag, &tag_element, position),
            Err(ValidationError::EmptyTagOutsideRuleBody {
                rule: "main".to_owned(),
                node: NodeRef::new(tag, gram_ir::ElementKind::Tag),
            })
        );
    }
}

#[test]
fn blank_subset_text_is_rejected() {
    let mut grammar = Grammar::new();
    let rule = grammar.add_rule("main", Scope::Public);
    let subset = grammar.subset("   ", SubsetMode::AllWords);
    let owner = grammar.rule(rule).clone();
    let subset_element = element(&grammar, subset);
    assert!(matches!(
        check_element(&grammar, &owner, subset, &subset_element, Position::RuleBody),
        Err(ValidationError::EmptySubsetText { .. })
    ));
}

#[test]
fn inverted_repeat_is_rejected() {
    let mut grammar = Grammar::new();
    let rule = grammar.add_rule("main", Scope::Public);
    let word = grammar.token("word");
    let inverted = grammar.item(word, Repeat::new(3, 2));
    let unbounded = grammar.item(word, Repeat::new(3, Repeat::UNBOUNDED));
    let owner = grammar.rule(rule).clone();

    let inverted_element = element(&grammar, inverted);
    assert!(matches!(
        check_element(&grammar, &owner, inverted, &inverted_element, Position::RuleBody),
        Err(ValidationError::InvertedRepeat { min: 3, max: 2, .. })
    ));
    let unbounded_element = element(&grammar, unbounded);
    assert_eq!(
        check_element(&grammar, &owner, unbounded, &unbounded_element, Position::RuleBody),
        Ok(())
    );
}

#[test]
fn weight_count_must_match() {
    let mut grammar = Grammar::new();
    let rule = grammar.add_rule("main", Scope::Public);
    let yes = grammar.token("yes");
    let no = grammar.token("no");
    let choice = grammar.one_of_with_weights(&[yes, no], &[1.0]);
    let owner = grammar.rule(rule).clone();
    let choice_element = element(&grammar, choice);
    assert!(matches!(
        check_element(&grammar, &owner, choice, &choice_element, Position::RuleBody),
        Err(ValidationError::WeightCountMismatch {
            alternatives: 2,
            weights: 1,
            ..
        })
    ));
}

#[test]
fn dangling_rule_ref_is_rejected() {
    let mut grammar = Grammar::new();
    let rule = grammar.add_rule("main", Scope::Public);
    let dangling = grammar.rule_ref(RuleId::new(42));
    let owner = grammar.rule(rule).clone();
    let dangling_element = element(&grammar, dangling);
    assert!(matches!(
        check_element(&grammar, &owner, dangling, &dangling_element, Position::RuleBody),
        Err(ValidationError::DanglingRuleRef { .. })
    ));
}

#[test]
fn subset_modes_decode_exhaustively() {
    for mode in SubsetMode::ALL {
        assert_eq!(subset_mode_from_raw(mode.raw()), Ok(mode));
    }
    assert_eq!(
        subset_mode_from_raw(5),
        Err(ValidationError::InvalidSubsetMode { raw: 5 })
    );
    assert_eq!(
        subset_mode_from_raw(u32::MAX),
        Err(ValidationError::InvalidSubsetMode { raw: u32::MAX })
    );
}
