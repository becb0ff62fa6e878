//! End-to-end tests for the driver commands: JSON in, binary out, dump back.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::fs;

use gram_cfg::CfgGrammar;
use gram_lower::{CompileError, CompileOptions};
use gramc::commands::{check_file, compile_file, dump_file, Dump};
use gramc::DriverError;
use tempfile::tempdir;

const WEATHER: &str = r#"{
    "root": "forecast",
    "rules": [
        {
            "name": "forecast",
            "scope": "public",
            "hooks": { "on_parse": "lookup" },
            "body": [
                { "kind": "token", "text": "weather" },
                { "kind": "token", "text": "in" },
                { "kind": "rule_ref", "rule": "place", "key": "where" }
            ]
        },
        {
            "name": "place",
            "body": [
                { "kind": "one_of", "alternatives": [
                    { "kind": "tag", "name": "id", "value": "LON",
                      "child": { "kind": "token", "text": "london" } },
                    { "kind": "subset", "text": "new york city", "mode": "ordered_subset" }
                ] }
            ]
        }
    ]
}"#;

#[test]
fn compile_writes_a_readable_artifact() {
    let scratch = tempdir().unwrap();
    let dir = scratch.path();
    let input = dir.join("weather.json");
    let output = dir.join("weather.cfg");
    fs::write(&input, WEATHER).unwrap();

    let stats = compile_file(&input, &output, CompileOptions::default()).unwrap();
    assert_eq!(stats.rules, 2);
    assert_eq!(stats.words, 3);
    assert_eq!(stats.scripts, 1);

    let bytes = fs::read(&output).unwrap();
    let grammar = CfgGrammar::parse(&bytes).unwrap();
    assert_eq!(grammar.root().map(|rule| grammar.rule_name(rule)), Some("forecast"));
    assert_eq!(grammar.tags().len(), 1);

    // Same input, same bytes.
    let again = dir.join("again.cfg");
    compile_file(&input, &again, CompileOptions::default()).unwrap();
    assert_eq!(fs::read(&again).unwrap(), bytes);
}

#[test]
fn dump_lists_rules_arcs_and_tags() {
    let scratch = tempdir().unwrap();
    let dir = scratch.path();
    let input = dir.join("weather.json");
    let output = dir.join("weather.cfg");
    fs::write(&input, WEATHER).unwrap();
    compile_file(&input, &output, CompileOptions::default()).unwrap();

    let text = dump_file(&output).unwrap();
    assert!(text.contains("root forecast"));
    assert!(text.contains("rule 0 forecast [public root extended]"));
    assert!(text.contains("\"weather\""));
    assert!(text.contains("<place> as where -> end"));
    assert!(text.contains("subset \"new york city\" OrderedSubset"));
    assert!(text.contains("id#0"));
    assert!(text.contains("\"LON\""));
    assert!(text.contains("forecast OnParse -> lookup"));

    let grammar = CfgGrammar::parse(&fs::read(&output).unwrap()).unwrap();
    assert_eq!(Dump(&grammar).to_string(), text);
}

#[test]
fn check_reports_rules_and_sizes() {
    let scratch = tempdir().unwrap();
    let dir = scratch.path();
    let input = dir.join("weather.json");
    fs::write(&input, WEATHER).unwrap();

    let report = check_file(&input, CompileOptions::default()).unwrap();
    assert_eq!(report.document.rules.len(), 2);
    let text = report.to_string();
    assert!(text.contains("public forecast (root)"));
    assert!(text.contains("private place"));
    assert!(text.contains("2 rules"));
    assert!(text.contains("3 words, 1 tags, 1 scripts"));
}

#[test]
fn errors_name_the_failing_file() {
    let scratch = tempdir().unwrap();
    let dir = scratch.path();

    let missing = dir.join("missing.json");
    let err = compile_file(&missing, &dir.join("out.cfg"), CompileOptions::default()).unwrap_err();
    assert!(matches!(err, DriverError::Io { .. }));
    assert!(err.to_string().contains("missing.json"));

    let broken = dir.join("broken.json");
    fs::write(&broken, "{ \"rules\": [").unwrap();
    let err = check_file(&broken, CompileOptions::default()).unwrap_err();
    assert!(matches!(err, DriverError::Load { .. }));
    assert!(err.to_string().contains("broken.json"));

    let not_cfg = dir.join("not.cfg");
    fs::write(&not_cfg, b"GCFG but not really").unwrap();
    let err = dump_file(&not_cfg).unwrap_err();
    assert!(matches!(err, DriverError::Decode { .. }));
}

#[test]
fn compile_errors_pass_through() {
    let scratch = tempdir().unwrap();
    let dir = scratch.path();
    let input = dir.join("weather.json");
    fs::write(&input, WEATHER).unwrap();

    let err = compile_file(
        &input,
        &dir.join("out.cfg"),
        CompileOptions::default().with_max_nodes(2),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        DriverError::Compile(CompileError::CapacityExceeded { .. })
    ));
    assert!(!dir.join("out.cfg").exists());
}
