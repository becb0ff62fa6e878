use pretty_assertions::assert_eq;

use gram_ir::{Grammar, HookKind, Scope, SubsetMode, TagValue};
use gram_lower::CompileOptions;

use super::*;
use crate::layout::GrammarOptions;
use crate::record::word;

fn travel_grammar() -> Grammar {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("travel", Scope::Public);
    let city = grammar.add_rule("city", Scope::Private);
    grammar.rule_mut(main).exported = true;
    grammar.set_hook(main, HookKind::OnRecognition, "booked");

    let fly = grammar.token_with("fly", Some("f l ay"), None);
    let to = grammar.token("to");
    let target = grammar.rule_ref_with_key(city, "destination");
    grammar.set_body(main, &[fly, to, target]);

    let paris = grammar.token("paris");
    let paris = grammar.tag(Some(paris), "code", TagValue::Int32(75));
    let rome = grammar.token("rome");
    let rome_code = grammar.string_value("RM");
    let rome = grammar.tag_with_id(Some(rome), "code", 9, rome_code);
    let choice = grammar.one_of_weighted(&[(paris, 0.75), (rome, 0.25)]);
    let marker = grammar.tag(None, "verified", TagValue::Bool(true));
    grammar.set_body(city, &[choice, marker]);

    grammar.set_root("travel");
    grammar
}

fn compiled() -> Vec<u8> {
    crate::compile(&travel_grammar(), CompileOptions::default())
        .unwrap()
        .into_bytes()
}

fn put(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[test]
fn reads_back_rules_and_hooks() {
    let grammar = CfgGrammar::parse(&compiled()).unwrap();
    let header = grammar.header();
    assert_eq!(header.root, Some(0));
    assert!(header.options.contains(
        GrammarOptions::HAS_ROOT
            | GrammarOptions::HAS_SCRIPT_HOOKS
            | GrammarOptions::HAS_EXTENDED_FEATURES
    ));

    let names: Vec<&str> = grammar.rules().iter().map(|r| grammar.rule_name(r)).collect();
    assert_eq!(names, vec!["travel", "city"]);
    assert_eq!(
        grammar.rules()[0].attrs,
        RuleAttrs::PUBLIC
            | RuleAttrs::EXPORT
            | RuleAttrs::ROOT
            | RuleAttrs::EXTENDED
            | RuleAttrs::HAS_HOOKS
            | RuleAttrs::HAS_BODY
    );
    assert_eq!(grammar.rules()[1].attrs, RuleAttrs::HAS_BODY);
    assert_eq!(grammar.root().map(|r| grammar.rule_name(r)), Some("travel"));
    assert_eq!(grammar.find_rule("city"), Some(1));
    assert_eq!(grammar.find_rule("City"), None);

    let script = grammar.scripts()[0];
    assert_eq!(script.rule, 0);
    assert_eq!(script.hook, HookKind::OnRecognition);
    assert_eq!(grammar.symbol(script.method), Some("booked"));
}

#[test]
fn reads_back_arcs_words_and_tags() {
    let grammar = CfgGrammar::parse(&compiled()).unwrap();
    assert_eq!(grammar.rule_arc_range(0), 0..3);
    assert_eq!(grammar.rule_arc_range(1), 3..6);

    let texts: Vec<&str> = grammar
        .words()
        .iter()
        .map(|w| grammar.symbol(w.text).unwrap())
        .collect();
    assert_eq!(texts, vec!["fly", "to", "paris", "rome"]);
    assert_eq!(grammar.symbol(grammar.words()[0].pronunciation), Some("f l ay"));
    assert_eq!(grammar.words()[0].display, 0);

    let reference = grammar.arcs()[2];
    assert_eq!(reference.kind, ArcKind::RuleRef);
    assert_eq!(reference.payload, 1);
    assert_eq!(grammar.symbol(reference.aux), Some("destination"));
    assert!(reference.to_end);

    // Both alternatives leave the city rule's start state.
    let start = grammar.state_arcs(3);
    assert_eq!(start.len(), 2);
    assert_eq!(
        start.iter().map(|arc| arc.weight).collect::<Vec<_>>(),
        vec![0.75, 0.25]
    );

    let tags = grammar.tags();
    assert_eq!(tags.len(), 3);
    assert_eq!(tags[0].value(), Ok(TagPayload::Int32(75)));
    assert_eq!(tags[1].property_id, 9);
    let TagPayload::String(code) = tags[1].value().unwrap() else {
        panic!("string value expected");
    };
    assert_eq!(grammar.symbol(code), Some("RM"));
    assert_eq!(grammar.symbol(tags[2].name), Some("verified"));
    assert_eq!(tags[2].start_arc().raw(), 5);
}

#[test]
fn rejects_size_mismatch() {
    let mut bytes = compiled();
    bytes.push(0);
    assert!(matches!(
        CfgGrammar::parse(&bytes),
        Err(DecodeError::SizeMismatch { .. })
    ));
    assert!(matches!(
        CfgGrammar::parse(&bytes[..40]),
        Err(DecodeError::Truncated { .. })
    ));
}

#[test]
fn rejects_sections_outside_the_artifact() {
    let mut bytes = compiled();
    // Record count of the word section.
    put(&mut bytes, 4 * 15, 1_000);
    assert_eq!(
        CfgGrammar::parse(&bytes),
        Err(DecodeError::SectionOutOfBounds { section: "words" })
    );
}

#[test]
fn rejects_dangling_word_reference() {
    let mut bytes = compiled();
    let arcs = word(&bytes, 16) as usize;
    // Payload of the first arc.
    put(&mut bytes, arcs + 4, 99);
    assert_eq!(
        CfgGrammar::parse(&bytes),
        Err(DecodeError::DanglingReference {
            what: "word",
            index: 99
        })
    );
}

#[test]
fn rejects_raw_subset_mode_out_of_range() {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let subset = grammar.subset("new york", SubsetMode::OrderedSubset);
    grammar.set_body(main, &[subset]);
    let mut bytes = crate::compile(&grammar, CompileOptions::default())
        .unwrap()
        .into_bytes();

    let parsed = CfgGrammar::parse(&bytes).unwrap();
    assert_eq!(
        CfgGrammar::subset_mode(&parsed.arcs()[0]),
        Some(SubsetMode::OrderedSubset)
    );

    let arcs = word(&bytes, 16) as usize;
    put(&mut bytes, arcs + 8, 5);
    assert_eq!(
        CfgGrammar::parse(&bytes),
        Err(DecodeError::Validation(ValidationError::InvalidSubsetMode {
            raw: 5
        }))
    );
}

#[test]
fn rejects_unknown_tag_discriminant() {
    let mut bytes = compiled();
    let tags = word(&bytes, 18) as usize;
    let anchor = word(&bytes[tags..], 2);
    put(&mut bytes, tags + 8, (anchor & 0x3F_FFFF) | (200 << 22));
    assert_eq!(
        CfgGrammar::parse(&bytes),
        Err(DecodeError::Record(RecordError::UnknownVariant { value: 200 }))
    );
}

#[test]
fn rejects_symbol_offsets_inside_strings() {
    let grammar = CfgGrammar::parse(&compiled()).unwrap();
    let name = grammar.rules()[0].name;
    assert_eq!(grammar.symbol(name + 1), None);
    assert_eq!(grammar.symbol(u32::MAX), None);
    assert_eq!(grammar.symbol(0), Some(""));
}
