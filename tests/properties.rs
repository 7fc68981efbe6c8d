//! Engine-wide properties: determinism, idempotence, cycle soundness,
//! reachability monotonicity and manifest convergence.

mod common;

use std::collections::BTreeSet;
use std::path::Path;

use indoc::indoc;
use pretty_assertions::assert_eq;

use common::{corpus, read, write};
use tether::analysis::cycles::detect_cycles;
use tether::analysis::index_sync::{canonical_names, render_block, synchronize, IndexSync};
use tether::analysis::reachability::analyze;
use tether::config::IndexConfig;
use tether::fix::Transaction;
use tether::graph::ModuleGraph;
use tether::{
    index_source, run, scan, CheckOptions, IndexContext, Mode, Model, ScriptRecord, TetherConfig,
};

fn record(rel: &str, text: &str) -> ScriptRecord {
    index_source(
        &Path::new("/corpus").join(rel),
        rel,
        text,
        &IndexContext::default(),
    )
    .unwrap()
}

fn build(records: Vec<ScriptRecord>) -> Model {
    Model::build(records, Path::new("/corpus"), &TetherConfig::default())
}

fn sample_records() -> Vec<ScriptRecord> {
    vec![
        record("deploy.sh", "#!/bin/bash\nsource \"${UTILITYPATH}/Net.sh\"\n__ping__ host\n"),
        record("Utilities/Net.sh", "source ./Log.sh\n__ping__() { __log__ ping; }\n"),
        record("Utilities/Log.sh", "__log__() { echo \"$1\"; }\n__unused__() { :; }\n"),
        record("a.sh", "source ./b.sh\n"),
        record("b.sh", "source ./a.sh\n"),
    ]
}

#[test]
fn test_snapshot_is_independent_of_input_order() {
    let forward = build(sample_records());
    let mut reversed = sample_records();
    reversed.reverse();
    let backward = build(reversed);
    let mut rotated = sample_records();
    rotated.rotate_left(2);
    let rotated = build(rotated);

    let expected = forward.snapshot_json().unwrap();
    assert_eq!(backward.snapshot_json().unwrap(), expected);
    assert_eq!(rotated.snapshot_json().unwrap(), expected);
}

#[test]
fn test_scanning_twice_gives_the_same_model() {
    let dir = corpus(&[
        ("run.sh", "#!/bin/bash\nsource ./lib/util.sh\nhelper\n"),
        ("lib/util.sh", "helper() { :; }\n"),
        ("tools/check", "#!/usr/bin/env bash\necho check\n"),
    ]);
    let config = TetherConfig::default();
    let first = scan(dir.path(), &config).unwrap();
    let second = scan(dir.path(), &config).unwrap();
    assert_eq!(first.stats.indexed, 3);

    let a = Model::build(first.records, dir.path(), &config);
    let b = Model::build(second.records, dir.path(), &config);
    assert_eq!(a.snapshot_json().unwrap(), b.snapshot_json().unwrap());
}

#[test]
fn test_fix_is_idempotent() {
    let dir = corpus(&[
        (
            "Utilities/Colors.sh",
            indoc! {r#"
                #!/bin/bash
                # Color helpers.

                # Red text.
                __red__() { echo "$1"; }
            "#},
        ),
        (
            "run.sh",
            "#!/bin/bash\r\n# Runs it.\r\n# Usage: run.sh\r\nstep() { __red__ go; }\r\nstep\r\n",
        ),
    ]);
    let options = CheckOptions::new(dir.path()).with_mode(Mode::Fix);

    let first = run(&options).unwrap();
    assert!(!first.fixes.is_empty());
    let colors = read(dir.path(), "Utilities/Colors.sh");
    let script = read(dir.path(), "run.sh");

    let second = run(&options).unwrap();
    assert!(second.fixes.is_empty(), "{:?}", second.fixes);
    assert_eq!(read(dir.path(), "Utilities/Colors.sh"), colors);
    assert_eq!(read(dir.path(), "run.sh"), script);
    assert_eq!(second.counts().fixed, 0);
}

#[test]
fn test_three_file_cycle_is_found_once() {
    let mut graph = ModuleGraph::new();
    for f in ["a.sh", "b.sh", "c.sh", "d.sh"] {
        graph.add_file(f);
    }
    graph.add_include("a.sh", "b.sh", 1);
    graph.add_include("b.sh", "c.sh", 1);
    graph.add_include("c.sh", "a.sh", 1);
    graph.add_include("d.sh", "a.sh", 1);

    let cycles = detect_cycles(&graph);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].members, vec!["a.sh", "b.sh", "c.sh"]);
    assert_eq!(cycles[0].path, vec!["a.sh", "b.sh", "c.sh", "a.sh"]);
}

#[test]
fn test_acyclic_graph_has_no_cycles() {
    let mut graph = ModuleGraph::new();
    for f in ["a.sh", "b.sh", "c.sh"] {
        graph.add_file(f);
    }
    graph.add_include("a.sh", "b.sh", 1);
    graph.add_include("a.sh", "c.sh", 2);
    graph.add_include("b.sh", "c.sh", 1);
    assert!(detect_cycles(&graph).is_empty());
}

#[test]
fn test_adding_an_entry_only_shrinks_the_dead_set() {
    let lib = "a() { :; }\nb() { :; }\n";
    let before = analyze(&build(vec![
        record("lib.sh", lib),
        record("entry1.sh", "source ./lib.sh\na\n"),
    ]));
    let after = analyze(&build(vec![
        record("lib.sh", lib),
        record("entry1.sh", "source ./lib.sh\na\n"),
        record("entry2.sh", "source ./lib.sh\nb\n"),
    ]));

    let dead = |r: &tether::analysis::reachability::ReachabilityReport| -> BTreeSet<String> {
        r.dead_functions.iter().map(|d| d.name.clone()).collect()
    };
    assert_eq!(dead(&before), BTreeSet::from(["b".to_string()]));
    assert!(dead(&after).is_subset(&dead(&before)));
    assert!(dead(&after).is_empty());
    assert!(after.reached.contains(&("lib.sh".to_string(), "a".to_string())));
    assert!(before.reached.is_subset(&after.reached));
}

#[test]
fn test_manifest_converges_after_one_edit() {
    let text = indoc! {"
        #!/bin/bash
        # Function Index:
        #   - foo
        #

        foo() { :; }
        bar() { :; }
    "};
    let config = IndexConfig::default();
    let stale = record("lib.sh", text);
    assert_eq!(canonical_names(&stale, &config), vec!["foo", "bar"]);

    let IndexSync::OutOfSync { missing, stale: gone, edit } = synchronize(&stale, &config) else {
        panic!("expected the manifest to be out of sync");
    };
    assert_eq!(missing, vec!["bar"]);
    assert!(gone.is_empty());
    assert_eq!(
        edit.lines,
        render_block(&["foo".to_string(), "bar".to_string()], &config.marker)
    );

    let mut tx = Transaction::new("lib.sh", text);
    tx.push(edit);
    let fixed = tx.apply().unwrap();
    assert_eq!(synchronize(&record("lib.sh", &fixed), &config), IndexSync::InSync);
}

#[test]
fn test_new_file_only_changes_its_own_fixes() {
    let dir = corpus(&[("lib.sh", "f() { :; }\n")]);
    let before = run(&CheckOptions::new(dir.path())).unwrap();
    write(dir.path(), "notes/other.sh", "#!/bin/bash\necho unrelated\n");
    let after = run(&CheckOptions::new(dir.path())).unwrap();

    let diff_for = |r: &tether::RunReport| {
        r.fixes
            .iter()
            .find(|f| f.path == "lib.sh")
            .map(|f| f.diff.clone())
    };
    assert_eq!(diff_for(&before), diff_for(&after));
}
