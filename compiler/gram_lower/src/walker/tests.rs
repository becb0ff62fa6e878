use pretty_assertions::assert_eq;

use gram_ir::{HookKind, Repeat, Scope, SubsetMode, TagValue};

use super::*;
use crate::ValidationError;

/// Backend that records every call as a line of text.
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
    rules: Vec<String>,
    nodes: u32,
}

impl Recorder {
    fn node(&mut self, parent: u32, what: String) -> u32 {
        self.nodes += 1;
        self.events.push(format!("{parent} -> {}: {what}", self.nodes));
        self.nodes
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Handle {
    Rule(usize),
    Special(SpecialRule),
}

impl Backend for Recorder {
    type Rule = Handle;
    type Node = u32;
    type Output = Vec<String>;

    fn create_rule(&mut self, decl: &RuleDecl<'_>) -> Result<Handle, CompileError> {
        self.rules.push(decl.name.to_owned());
        let root = if decl.is_root { " root" } else { "" };
        self.events.push(format!("declare {}{root}", decl.name));
        Ok(Handle::Rule(self.rules.len() - 1))
    }

    fn special_rule(&mut self, special: SpecialRule) -> Handle {
        Handle::Special(special)
    }

    fn begin_rule(&mut self, rule: Handle, reachable: u32) -> Result<u32, CompileError> {
        let Handle::Rule(index) = rule else {
            panic!("special rule opened");
        };
        self.events
            .push(format!("begin {} ({reachable})", self.rules[index]));
        Ok(0)
    }

    fn create_sequence(&mut self, parent: u32, _node: NodeRef) -> Result<u32, CompileError> {
        Ok(self.node(parent, "sequence".to_owned()))
    }

    fn create_one_of(
        &mut self,
        parent: u32,
        _node: NodeRef,
        weights: &[f32],
    ) -> Result<u32, CompileError> {
        Ok(self.node(parent, format!("one-of {weights:?}")))
    }

    fn create_item(
        &mut self,
        parent: u32,
        _node: NodeRef,
        item: &ItemSpec,
    ) -> Result<u32, CompileError> {
        Ok(self.node(parent, format!("item {}", item.repeat)))
    }

    fn create_property_tag(
        &mut self,
        parent: u32,
        _node: NodeRef,
        tag: &TagSpec<'_>,
    ) -> Result<u32, CompileError> {
        Ok(self.node(parent, format!("tag {}={:?}", tag.name, tag.value)))
    }

    fn create_rule_ref(
        &mut self,
        parent: u32,
        _node: NodeRef,
        target: Handle,
        semantic_key: Option<&str>,
    ) -> Result<u32, CompileError> {
        let target = match target {
            Handle::Rule(index) => self.rules[index].clone(),
            Handle::Special(special) => format!("{special:?}"),
        };
        let key = semantic_key.map(|key| format!(" as {key}")).unwrap_or_default();
        Ok(self.node(parent, format!("ref {target}{key}")))
    }

    fn create_subset(
        &mut self,
        parent: u32,
        _node: NodeRef,
        text: &str,
        mode: SubsetMode,
    ) -> Result<u32, CompileError> {
        Ok(self.node(parent, format!("subset {text:?} {mode:?}")))
    }

    fn create_token(
        &mut self,
        parent: u32,
        _node: NodeRef,
        token: &TokenSpec<'_>,
    ) -> Result<u32, CompileError> {
        Ok(self.node(parent, format!("token {}", token.text)))
    }

    fn create_dictation(
        &mut self,
        parent: u32,
        _node: NodeRef,
        category: Option<&str>,
    ) -> Result<u32, CompileError> {
        Ok(self.node(parent, format!("dictation {category:?}")))
    }

    fn finish_rule(
        &mut self,
        rule: Handle,
        features: GrammarFeatures,
    ) -> Result<(), CompileError> {
        let Handle::Rule(index) = rule else {
            panic!("special rule finished");
        };
        self.events
            .push(format!("finish {} {features:?}", self.rules[index]));
        Ok(())
    }

    fn finish(
        mut self,
        root: Option<Handle>,
        unit: &UnitInfo,
    ) -> Result<Vec<String>, CompileError> {
        self.events
            .push(format!("done root={root:?} {:?}", unit.features));
        Ok(self.events)
    }
}

fn walk(grammar: &Grammar) -> Result<Vec<String>, CompileError> {
    Walker::new(grammar, Recorder::default(), CompileOptions::default()).compile()
}

#[test]
fn lowers_children_in_declaration_order() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let hello = grammar.token("hello");
    let world = grammar.token("world");
    let polite = grammar.token("please");
    let optional = grammar.item(polite, Repeat::OPTIONAL);
    grammar.set_body(main, &[hello, world, optional]);

    let events = walk(&grammar).unwrap();
    assert_eq!(
        events,
        vec![
            "declare main",
            "begin main (4)",
            "0 -> 1: token hello",
            "0 -> 2: token world",
            "0 -> 3: item 0-1",
            "3 -> 4: token please",
            "finish main GrammarFeatures(0x0)",
            "done root=None GrammarFeatures(0x0)",
        ]
    );
}

#[test]
fn self_reference_lowers_rule_once() {
    let mut grammar = Grammar::new();
    let digits = grammar.add_rule("digits", Scope::Public);
    let digit = grammar.token("one");
    let again = grammar.rule_ref(digits);
    let more = grammar.item(again, Repeat::OPTIONAL);
    grammar.set_body(digits, &[digit, more]);
    grammar.set_root("digits");

    let events = walk(&grammar).unwrap();
    let declared = events.iter().filter(|e| e.starts_with("declare")).count();
    let begun = events.iter().filter(|e| e.starts_with("begin")).count();
    assert_eq!((declared, begun), (1, 1));
    assert_eq!(events[0], "declare digits root");
    assert!(events.contains(&"2 -> 3: ref digits".to_owned()));
}

#[test]
fn forward_and_shared_references_declare_once() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let city = grammar.add_rule("city", Scope::Private);
    let from = grammar.rule_ref_with_key(city, "from");
    let to = grammar.rule_ref_with_key(city, "to");
    grammar.set_body(main, &[from, to]);
    let paris = grammar.token("paris");
    grammar.set_body(city, &[paris]);

    let events = walk(&grammar).unwrap();
    assert_eq!(
        events,
        vec![
            "declare main",
            "begin main (2)",
            "declare city",
            "0 -> 1: ref city as from",
            "0 -> 2: ref city as to",
            "finish main GrammarFeatures(SEMANTIC_KEYS)",
            "begin city (1)",
            "0 -> 3: token paris",
            "finish city GrammarFeatures(0x0)",
            "done root=None GrammarFeatures(SEMANTIC_KEYS)",
        ]
    );
}

#[test]
fn unreferenced_private_rules_are_skipped() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let unused = grammar.add_rule("unused", Scope::Private);
    let word = grammar.token("word");
    grammar.set_body(main, &[word]);
    grammar.set_body(unused, &[word]);

    let events = walk(&grammar).unwrap();
    assert!(!events.iter().any(|e| e.contains("unused")));
}

#[test]
fn special_rules_replace_degenerate_elements() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    grammar.add_rule("empty", Scope::Public);
    let pending = grammar.add_rule("pending", Scope::Public);
    grammar.set_dynamic(pending, Dynamic::True);
    let wildcard = grammar.wildcard();
    let nothing = grammar.one_of(&[]);
    let word = grammar.token("word");
    let never = grammar.item(word, Repeat::exactly(0));
    grammar.set_body(main, &[wildcard, nothing, never]);

    let events = walk(&grammar).unwrap();
    assert!(events.contains(&"0 -> 1: ref Garbage".to_owned()));
    assert!(events.contains(&"0 -> 2: ref Void".to_owned()));
    assert!(events.contains(&"0 -> 5: ref Null".to_owned()), "{events:#?}");
    assert!(events.contains(&"0 -> 6: ref Void".to_owned()), "{events:#?}");
}

#[test]
fn zero_repeat_item_keeps_its_content() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let hi = grammar.token("hi");
    let code = grammar.tag(Some(hi), "code", TagValue::Int32(7));
    let never = grammar.item(code, Repeat::exactly(0));
    let there = grammar.token("there");
    grammar.set_body(main, &[never, there]);

    let events = walk(&grammar).unwrap();
    assert_eq!(
        &events[1..6],
        [
            "begin main (4)",
            "0 -> 1: item 0-0",
            "1 -> 2: tag code=Int32(7)",
            "2 -> 3: token hi",
            "0 -> 4: token there",
        ]
    );
}

#[test]
fn features_propagate_to_rule_and_unit() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    grammar.set_hook(main, HookKind::OnParse, "parse");
    let subset = grammar.subset("new york city", SubsetMode::OrderedSubset);
    let dictation = grammar.dictation(Some("spelling"));
    grammar.set_body(main, &[subset, dictation]);

    let events = walk(&grammar).unwrap();
    let expected = GrammarFeatures::SUBSET
        | GrammarFeatures::DICTATION
        | GrammarFeatures::SCRIPT_HOOKS;
    assert!(events.contains(&format!("finish main {expected:?}")));
    assert_eq!(events.last(), Some(&format!("done root=None {expected:?}")));
}

#[test]
fn validation_failure_names_rule() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let setup = grammar.add_rule("setup", Scope::Private);
    grammar.set_hook(setup, HookKind::OnInit, "init");
    let call = grammar.rule_ref(setup);
    grammar.set_body(main, &[call]);

    let err = walk(&grammar).unwrap_err();
    assert_eq!(
        err,
        CompileError::Validation(ValidationError::HookRequiresPublicRule {
            rule: "setup".to_owned(),
            hook: HookKind::OnInit,
        })
    );
    assert_eq!(err.rule(), Some("setup"));
}

#[test]
fn unreachable_rules_are_still_validated() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let word = grammar.token("go");
    grammar.set_body(main, &[word]);
    let setup = grammar.add_rule("setup", Scope::Private);
    grammar.set_hook(setup, HookKind::OnInit, "prepare");

    let expected = CompileError::Validation(ValidationError::HookRequiresPublicRule {
        rule: "setup".to_owned(),
        hook: HookKind::OnInit,
    });
    assert_eq!(walk(&grammar), Err(expected.clone()));
    assert_eq!(
        Walker::new(&grammar, Recorder::default(), CompileOptions::default())
            .compile_rule(main),
        Err(expected.clone())
    );

    // Nothing is reachable at all without a root or a public rule.
    let mut lonely = Grammar::new();
    let setup = lonely.add_rule("setup", Scope::Private);
    lonely.set_hook(setup, HookKind::OnInit, "prepare");
    assert_eq!(walk(&lonely), Err(expected));
}

#[test]
fn resolved_references_add_the_target_count() {
    let mut grammar = Grammar::new();
    let word = grammar.add_rule("word", Scope::Public);
    let backward = grammar.add_rule("backward", Scope::Public);
    let forward = grammar.add_rule("forward", Scope::Public);
    let later = grammar.add_rule("later", Scope::Private);

    let x = grammar.token("x");
    let y = grammar.token("y");
    let pair = grammar.sequence(&[x, y]);
    grammar.set_body(word, &[pair]);
    grammar.set_body(later, &[x, y]);

    let done = grammar.rule_ref(word);
    grammar.set_body(backward, &[done]);
    let pending = grammar.rule_ref(later);
    grammar.set_body(forward, &[pending]);

    let begun: Vec<String> = walk(&grammar)
        .unwrap()
        .into_iter()
        .filter(|e| e.starts_with("begin"))
        .collect();
    assert_eq!(
        begun,
        vec![
            "begin word (3)",
            "begin backward (4)",
            "begin forward (1)",
            "begin later (2)",
        ]
    );
}

#[test]
fn standalone_tag_in_alternative_is_rejected() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let tag = grammar.tag(None, "out", TagValue::Int32(1));
    let word = grammar.token("word");
    let choice = grammar.one_of(&[word, tag]);
    grammar.set_body(main, &[choice]);

    assert!(matches!(
        walk(&grammar),
        Err(CompileError::Validation(
            ValidationError::EmptyTagOutsideRuleBody { .. }
        ))
    ));
}

#[test]
fn missing_root_is_incomplete() {
    let mut grammar = Grammar::new();
    grammar.add_rule("main", Scope::Public);
    grammar.set_root("mian");
    assert_eq!(
        walk(&grammar),
        Err(CompileError::IncompleteRootRule {
            name: "mian".to_owned()
        })
    );
}

#[test]
fn node_budget_is_enforced() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let words: Vec<_> = ["a", "b", "c"].iter().map(|w| grammar.token(w)).collect();
    grammar.set_body(main, &words);

    let within = CompileOptions::default().with_max_nodes(3);
    assert!(Walker::new(&grammar, Recorder::default(), within)
        .compile()
        .is_ok());

    let over = CompileOptions::default().with_max_nodes(2);
    assert_eq!(
        Walker::new(&grammar, Recorder::default(), over).compile(),
        Err(CompileError::CapacityExceeded {
            what: "grammar nodes",
            limit: 2,
            required: 3,
        })
    );
}

#[test]
fn compile_rule_uses_given_root() {
    let mut grammar = Grammar::new();
    let first = grammar.add_rule("first", Scope::Public);
    let second = grammar.add_rule("second", Scope::Public);
    let word = grammar.token("word");
    grammar.set_body(first, &[word]);
    grammar.set_body(second, &[word]);

    let events = Walker::new(&grammar, Recorder::default(), CompileOptions::default())
        .compile_rule(second)
        .unwrap();
    assert_eq!(events[0], "declare second root");
    assert!(!events.iter().any(|e| e.contains("first")));
}

#[test]
fn deep_nesting_is_lowered() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let mut element = grammar.token("core");
    for _ in 0..20_000 {
        element = grammar.sequence(&[element]);
    }
    grammar.set_body(main, &[element]);
    let events = walk(&grammar).unwrap();
    assert!(events.iter().any(|e| e.ends_with("token core")));
}
