//! Property-based tests for resolution and merge determinism

use confold::fragment::MemorySource;
use confold::merge::{DefaultPolicy, Merger};
use confold::resolve::Resolver;
use confold::{Fragment, FragmentId, OptionKey, OptionValue, Pipeline, Schema};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

const MAX_NODES: usize = 8;

/// Node `i` imports node `j` when `j > i` and the matrix says so; always acyclic
fn graph_source(matrix: &[Vec<bool>]) -> MemorySource {
    let mut source = MemorySource::new();
    for (i, row) in matrix.iter().enumerate() {
        let imports: Vec<String> = row
            .iter()
            .enumerate()
            .filter(|&(j, &edge)| edge && j > i && j < matrix.len())
            .map(|(j, _)| format!("./n{}.nix", j))
            .collect();
        source.insert(
            format!("n{}.nix", i),
            format!(
                "{{ imports = [ {} ]; node.n{} = {}; shared = {}; }}",
                imports.join(" "),
                i,
                i,
                i
            ),
        );
    }
    source
}

/// Nodes reachable from n0
fn reachable(matrix: &[Vec<bool>]) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![0usize];
    while let Some(i) = stack.pop() {
        if !seen.insert(format!("n{}.nix", i)) {
            continue;
        }
        for (j, &edge) in matrix[i].iter().enumerate() {
            if edge && j > i && j < matrix.len() {
                stack.push(j);
            }
        }
    }
    seen
}

fn adjacency() -> impl Strategy<Value = Vec<Vec<bool>>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), MAX_NODES), 1..MAX_NODES)
}

/// Test that an acyclic graph resolves every reachable fragment exactly once
#[test]
fn test_acyclic_graph_resolves_each_fragment_once() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&adjacency(), |matrix| {
            let source = graph_source(&matrix);
            let resolution = Resolver::new(&source).resolve_root("n0.nix").unwrap();

            let ids: Vec<String> = resolution.ids().iter().map(|id| id.to_string()).collect();
            let unique: HashSet<&String> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len());
            prop_assert_eq!(ids[0].as_str(), "n0.nix");
            prop_assert_eq!(ids.iter().cloned().collect::<BTreeSet<_>>(), reachable(&matrix));
            Ok(())
        })
        .unwrap();
}

/// Test that the last fragment in resolution order owns every overridden scalar
#[test]
fn test_scalar_override_follows_resolution_order() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&adjacency(), |matrix| {
            let source = graph_source(&matrix);
            let resolution = Resolver::new(&source).resolve_root("n0.nix").unwrap();
            let tree = Merger::new(DefaultPolicy).merge(&resolution.fragments).unwrap();

            let last = resolution.fragments.last().unwrap().id();
            let expected: i64 = last.as_str()[1..last.as_str().len() - 4].parse().unwrap();
            let shared = tree.get(&OptionKey::parse("shared").unwrap()).unwrap();
            prop_assert_eq!(&shared.value, &OptionValue::Int(expected));
            prop_assert_eq!(shared.history.len(), resolution.fragments.len());
            Ok(())
        })
        .unwrap();
}

/// Test that scalar merging is associative: folding a prefix first changes nothing
#[test]
fn test_scalar_merge_is_associative() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(prop::collection::vec(any::<i64>(), 1..10), any::<prop::sample::Index>()),
            |(values, split)| {
                let key = OptionKey::parse("value").unwrap();
                let fragments: Vec<Fragment> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        Fragment::from_assignments(
                            FragmentId::new(format!("f{}.nix", i)),
                            vec![(key.clone(), OptionValue::Int(*v))],
                        )
                    })
                    .collect();

                let whole = Merger::new(DefaultPolicy).merge(&fragments).unwrap();

                // Collapse the prefix into one fragment holding its merged value
                let at = split.index(fragments.len());
                let mut regrouped = Vec::new();
                if at > 0 {
                    let prefix = Merger::new(DefaultPolicy).merge(&fragments[..at]).unwrap();
                    regrouped.push(Fragment::from_assignments(
                        FragmentId::new("prefix.nix"),
                        vec![(key.clone(), prefix.get(&key).unwrap().value.clone())],
                    ));
                }
                regrouped.extend_from_slice(&fragments[at..]);
                let grouped = Merger::new(DefaultPolicy).merge(&regrouped).unwrap();

                prop_assert_eq!(
                    &whole.get(&key).unwrap().value,
                    &grouped.get(&key).unwrap().value
                );
                prop_assert_eq!(&whole.get(&key).unwrap().value, &OptionValue::Int(*values.last().unwrap()));
                Ok(())
            },
        )
        .unwrap();
}

/// Test that materializing the same inputs twice gives identical settings
#[test]
fn test_pipeline_is_idempotent() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&adjacency(), |matrix| {
            let source = graph_source(&matrix);
            let first = Pipeline::new(&source, Schema::empty()).run("n0.nix").unwrap();
            let second = Pipeline::new(&source, Schema::empty()).run("n0.nix").unwrap();
            prop_assert_eq!(first.fingerprint(), second.fingerprint());
            prop_assert_eq!(first, second);
            Ok(())
        })
        .unwrap();
}

/// Test that canonical formatting is a fixed point
#[test]
fn test_canonical_form_is_stable() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &prop::collection::vec(("[a-z][a-zA-Z0-9]{0,6}", any::<i32>(), "[ -~]{0,12}"), 0..6),
            |assignments| {
                let body: String = assignments
                    .iter()
                    .enumerate()
                    .map(|(i, (name, number, text))| {
                        format!(
                            "opt{}.k{} = {}; text{} = {};",
                            i,
                            name,
                            number,
                            i,
                            OptionValue::String(text.clone())
                        )
                    })
                    .collect();
                let source = format!("{{ {} }}", body);

                let once = Fragment::from_source(FragmentId::new("f.nix"), &source)
                    .unwrap()
                    .to_string();
                let twice = Fragment::from_source(FragmentId::new("f.nix"), &once)
                    .unwrap()
                    .to_string();
                prop_assert_eq!(once, twice);
                Ok(())
            },
        )
        .unwrap();
}
