//! Property-based tests for the binary backend.
//!
//! - Symbol interning is idempotent and lossless for arbitrary text
//! - Compilation is deterministic and always yields a readable artifact
//! - Repeat expansion produces the expected number of copies

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::cast_possible_truncation,
    clippy::redundant_closure_for_method_calls,
    reason = "Proptest macros generate code with these patterns"
)]

use gram_cfg::{compile, ArcKind, CfgGrammar, SymbolTable};
use gram_ir::{ElementId, Grammar, Repeat, Scope};
use gram_lower::CompileOptions;
use proptest::prelude::*;

// -- Strategies --

fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z]{1,8}").expect("valid regex")
}

/// A shape for one body element: a token, an alternative set or an item.
#[derive(Clone, Debug)]
enum Shape {
    Word(String),
    Choice(Vec<String>),
    Repeat(String, u32, Option<u32>),
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    prop_oneof![
        word_strategy().prop_map(Shape::Word),
        prop::collection::vec(word_strategy(), 1..4).prop_map(Shape::Choice),
        (word_strategy(), 0u32..3, prop::option::of(1u32..4)).prop_map(|(word, min, extra)| {
            Shape::Repeat(word, min, extra.map(|extra| min + extra))
        }),
    ]
}

fn build(shapes: &[Shape]) -> Grammar {
    let mut grammar = Grammar::new();
    let main = grammar.add_rule("main", Scope::Public);
    let body: Vec<ElementId> = shapes
        .iter()
        .map(|shape| match shape {
            Shape::Word(word) => grammar.token(word),
            Shape::Choice(words) => {
                let alternatives: Vec<ElementId> =
                    words.iter().map(|word| grammar.token(word)).collect();
                grammar.one_of(&alternatives)
            }
            Shape::Repeat(word, min, max) => {
                let child = grammar.token(word);
                grammar.item(child, Repeat::new(*min, max.unwrap_or(Repeat::UNBOUNDED)))
            }
        })
        .collect();
    grammar.set_body(main, &body);
    grammar
}

// -- Properties --

proptest! {
    #[test]
    fn interning_is_idempotent(words in prop::collection::vec("\\PC{0,12}", 0..32)) {
        let mut symbols = SymbolTable::new();
        let offsets: Vec<usize> = words.iter().map(|word| symbols.intern(word)).collect();
        for (word, &offset) in words.iter().zip(&offsets) {
            prop_assert_eq!(symbols.intern(word), offset);
            prop_assert_eq!(symbols.get(word), Some(offset));
            prop_assert_eq!(symbols.text_at(offset), Some(word.as_str()));
        }
        for (a, &first) in words.iter().zip(&offsets) {
            for (b, &second) in words.iter().zip(&offsets) {
                prop_assert_eq!(a == b, first == second);
            }
        }
    }

    #[test]
    fn compilation_is_deterministic(shapes in prop::collection::vec(shape_strategy(), 1..12)) {
        let grammar = build(&shapes);
        let first = compile(&grammar, CompileOptions::default()).unwrap();
        let second = compile(&grammar, CompileOptions::default()).unwrap();
        prop_assert_eq!(&first.bytes, &second.bytes);

        let cfg = CfgGrammar::parse(&first.bytes).unwrap();
        prop_assert_eq!(cfg.arcs().len(), first.stats.arcs);
        prop_assert_eq!(cfg.header().total_size as usize, first.bytes.len());
        // Every state group is terminated.
        prop_assert!(cfg.arcs().last().is_some_and(|arc| arc.last));
    }

    #[test]
    fn repeats_expand_to_copies(min in 0u32..5, extra in prop::option::of(1u32..5)) {
        let max = extra.map(|extra| min + extra);
        let grammar = build(&[Shape::Repeat("again".to_owned(), min, max)]);
        let cfg = CfgGrammar::parse(&compile(&grammar, CompileOptions::default()).unwrap().bytes)
            .unwrap();

        let words = cfg.arcs().iter().filter(|arc| arc.kind == ArcKind::Word).count() as u32;
        let epsilons = cfg.arcs().iter().filter(|arc| arc.kind == ArcKind::Epsilon).count() as u32;
        match max {
            Some(max) => {
                prop_assert_eq!(words, max);
                prop_assert_eq!(epsilons, max - min);
            }
            None => {
                prop_assert_eq!(words, min + 1);
                prop_assert_eq!(epsilons, if min == 0 { 2 } else { 1 });
            }
        }
    }
}
