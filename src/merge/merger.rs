//! Merger: walks fragments in resolution order and folds their assignments.

use super::policy::{MergePolicy, MergeStrategy};
use super::tree::{MergedEntry, MergedTree, Provenance};
use crate::error::EngineError;
use crate::fragment::{Fragment, FragmentId};
use crate::key::OptionKey;
use crate::value::{OptionValue, ValueKind};
use tracing::{debug, trace};

pub struct Merger<P: MergePolicy> {
    policy: P,
}

impl<P: MergePolicy> Merger<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// Merge fragments in the given order. No partial tree is returned on failure.
    pub fn merge(&self, fragments: &[Fragment]) -> Result<MergedTree, EngineError> {
        let mut tree = MergedTree::new();
        for fragment in fragments {
            debug!(
                fragment = %fragment.id(),
                assignments = fragment.assignments().len(),
                "Merging fragment"
            );
            for (key, value) in fragment.assignments() {
                self.assign(&mut tree, key, value, fragment.id())?;
            }
        }
        Ok(tree)
    }

    fn assign(
        &self,
        tree: &mut MergedTree,
        key: &OptionKey,
        value: &OptionValue,
        from: &FragmentId,
    ) -> Result<(), EngineError> {
        match value {
            OptionValue::Mapping(map) => {
                declare_mapping(tree, key, from)?;
                for (segment, nested) in map {
                    self.assign(tree, &key.child(segment.clone()), nested, from)?;
                }
                Ok(())
            }
            _ => self.assign_leaf(tree, key, value, from),
        }
    }

    fn assign_leaf(
        &self,
        tree: &mut MergedTree,
        key: &OptionKey,
        value: &OptionValue,
        from: &FragmentId,
    ) -> Result<(), EngineError> {
        declare_ancestors(tree, key, from)?;

        if let Some(declared_by) = tree.mapping_origin(key) {
            return Err(EngineError::TypeConflict {
                key: key.clone(),
                existing_kind: ValueKind::Mapping,
                existing: Provenance::Fragment(declared_by.clone()),
                incoming_kind: value.kind(),
                incoming: Provenance::Fragment(from.clone()),
            });
        }

        let incoming_class = value.kind().merge_class();
        let strategy = self.policy.strategy_for(key, incoming_class);

        let Some(entry) = tree.leaf_mut(key) else {
            trace!(key = %key, fragment = %from, %strategy, "Assigned option");
            let value = match (strategy, value) {
                (MergeStrategy::Set, OptionValue::List(items)) => {
                    let mut unique = Vec::with_capacity(items.len());
                    push_unique(&mut unique, items);
                    OptionValue::List(unique)
                }
                _ => value.clone(),
            };
            tree.insert_leaf(
                key.clone(),
                MergedEntry {
                    value,
                    provenance: Provenance::Fragment(from.clone()),
                    strategy,
                    history: vec![from.clone()],
                },
            );
            return Ok(());
        };

        if entry.value.kind().merge_class() != incoming_class {
            return Err(EngineError::TypeConflict {
                key: key.clone(),
                existing_kind: entry.value.kind(),
                existing: entry.provenance.clone(),
                incoming_kind: value.kind(),
                incoming: Provenance::Fragment(from.clone()),
            });
        }

        match (strategy, &mut entry.value, value) {
            (MergeStrategy::Immutable, existing, incoming) => {
                if existing != incoming {
                    return Err(EngineError::Conflict {
                        key: key.clone(),
                        first: entry.provenance.clone(),
                        first_value: existing.to_string(),
                        second: Provenance::Fragment(from.clone()),
                        second_value: incoming.to_string(),
                    });
                }
                record_contributor(entry, from);
                return Ok(());
            }
            (MergeStrategy::Append, OptionValue::List(existing), OptionValue::List(incoming)) => {
                existing.extend(incoming.iter().cloned());
            }
            (MergeStrategy::Set, OptionValue::List(existing), OptionValue::List(incoming)) => {
                push_unique(existing, incoming);
            }
            (_, existing, incoming) => {
                trace!(key = %key, previous = %entry.provenance, fragment = %from, "Overriding option");
                *existing = incoming.clone();
            }
        }

        entry.provenance = Provenance::Fragment(from.clone());
        entry.strategy = strategy;
        record_contributor(entry, from);
        Ok(())
    }
}

impl Default for Merger<super::policy::DefaultPolicy> {
    fn default() -> Self {
        Self::new(super::policy::DefaultPolicy)
    }
}

/// Append items not already present, keeping first occurrences
fn push_unique(existing: &mut Vec<OptionValue>, incoming: &[OptionValue]) {
    for item in incoming {
        if !existing.contains(item) {
            existing.push(item.clone());
        }
    }
}

fn record_contributor(entry: &mut MergedEntry, from: &FragmentId) {
    if entry.history.last() != Some(from) {
        entry.history.push(from.clone());
    }
}

/// Every strict prefix of `key` becomes a mapping; none may already be a leaf.
fn declare_ancestors(
    tree: &mut MergedTree,
    key: &OptionKey,
    from: &FragmentId,
) -> Result<(), EngineError> {
    for prefix in key.strict_prefixes() {
        if let Some(leaf) = tree.get(&prefix) {
            return Err(EngineError::TypeConflict {
                key: prefix.clone(),
                existing_kind: leaf.value.kind(),
                existing: leaf.provenance.clone(),
                incoming_kind: ValueKind::Mapping,
                incoming: Provenance::Fragment(from.clone()),
            });
        }
        tree.insert_mapping(prefix, from.clone());
    }
    Ok(())
}

fn declare_mapping(
    tree: &mut MergedTree,
    key: &OptionKey,
    from: &FragmentId,
) -> Result<(), EngineError> {
    declare_ancestors(tree, key, from)?;
    if let Some(leaf) = tree.get(key) {
        return Err(EngineError::TypeConflict {
            key: key.clone(),
            existing_kind: leaf.value.kind(),
            existing: leaf.provenance.clone(),
            incoming_kind: ValueKind::Mapping,
            incoming: Provenance::Fragment(from.clone()),
        });
    }
    tree.insert_mapping(key.clone(), from.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::policy::DefaultPolicy;
    use crate::value::MergeClass;

    fn fragment(name: &str, source: &str) -> Fragment {
        Fragment::from_source(FragmentId::new(name), source).unwrap()
    }

    fn key(s: &str) -> OptionKey {
        OptionKey::parse(s).unwrap()
    }

    struct FixedPolicy(MergeStrategy);

    impl MergePolicy for FixedPolicy {
        fn strategy_for(&self, _key: &OptionKey, class: MergeClass) -> MergeStrategy {
            match (self.0, class) {
                (MergeStrategy::Append | MergeStrategy::Set, MergeClass::Scalar) => {
                    MergeStrategy::Override
                }
                (strategy, _) => strategy,
            }
        }
    }

    #[test]
    fn test_last_writer_wins_with_provenance() {
        let fragments = vec![
            fragment("root.nix", r#"{ home.username = "quentin"; }"#),
            fragment("a.nix", r#"{ home.keyboard.layout = "us"; }"#),
            fragment("b.nix", r#"{ home.keyboard = { layout = "fr"; }; }"#),
        ];
        let tree = Merger::new(DefaultPolicy).merge(&fragments).unwrap();

        let layout = tree.get(&key("home.keyboard.layout")).unwrap();
        assert_eq!(layout.value, OptionValue::String("fr".into()));
        assert_eq!(layout.provenance.to_string(), "b.nix");
        assert_eq!(layout.history.len(), 2);
        assert!(tree.is_mapping(&key("home.keyboard")));
        assert_eq!(
            tree.get(&key("home.username")).unwrap().value,
            OptionValue::String("quentin".into())
        );
    }

    #[test]
    fn test_lists_append_in_resolution_order() {
        let fragments = vec![
            fragment("a.nix", "{ home.packages = [ git htop ]; }"),
            fragment("b.nix", "{ home.packages = [ git ripgrep ]; }"),
        ];
        let tree = Merger::new(DefaultPolicy).merge(&fragments).unwrap();
        let packages = tree.get(&key("home.packages")).unwrap();
        assert_eq!(packages.value.to_string(), "[ git htop git ripgrep ]");
        assert_eq!(packages.strategy, MergeStrategy::Append);
    }

    #[test]
    fn test_set_strategy_deduplicates() {
        let fragments = vec![
            fragment("a.nix", "{ home.packages = [ git htop ]; }"),
            fragment("b.nix", "{ home.packages = [ htop git ripgrep ]; }"),
        ];
        let tree = Merger::new(FixedPolicy(MergeStrategy::Set))
            .merge(&fragments)
            .unwrap();
        assert_eq!(
            tree.get(&key("home.packages")).unwrap().value.to_string(),
            "[ git htop ripgrep ]"
        );
    }

    #[test]
    fn test_set_strategy_deduplicates_first_assignment() {
        let fragments = vec![
            fragment("a.nix", "{ home.packages = [ git git htop ]; }"),
            fragment("b.nix", "{ home.packages = [ ripgrep ripgrep htop ]; }"),
        ];
        let tree = Merger::new(FixedPolicy(MergeStrategy::Set))
            .merge(&fragments)
            .unwrap();
        assert_eq!(
            tree.get(&key("home.packages")).unwrap().value.to_string(),
            "[ git htop ripgrep ]"
        );
    }

    #[test]
    fn test_single_fragment_set_is_deduplicated() {
        let fragments = vec![fragment("a.nix", "{ home.packages = [ git git htop ]; }")];
        let tree = Merger::new(FixedPolicy(MergeStrategy::Set))
            .merge(&fragments)
            .unwrap();
        assert_eq!(
            tree.get(&key("home.packages")).unwrap().value.to_string(),
            "[ git htop ]"
        );
    }

    #[test]
    fn test_immutable_conflict_names_both_fragments() {
        let fragments = vec![
            fragment("a.nix", r#"{ home.stateVersion = "23.11"; }"#),
            fragment("b.nix", r#"{ home.stateVersion = "23.11"; }"#),
            fragment("c.nix", r#"{ home.stateVersion = "24.05"; }"#),
        ];
        let err = Merger::new(FixedPolicy(MergeStrategy::Immutable))
            .merge(&fragments)
            .unwrap_err();
        match err {
            EngineError::Conflict { first, second, .. } => {
                assert_eq!(first.to_string(), "a.nix");
                assert_eq!(second.to_string(), "c.nix");
            }
            other => panic!("expected conflict, got {other}"),
        }
    }

    #[test]
    fn test_immutable_equal_value_is_not_a_conflict() {
        let fragments = vec![
            fragment("a.nix", r#"{ x = 1; }"#),
            fragment("b.nix", r#"{ x = 1; }"#),
        ];
        let tree = Merger::new(FixedPolicy(MergeStrategy::Immutable))
            .merge(&fragments)
            .unwrap();
        let entry = tree.get(&key("x")).unwrap();
        assert_eq!(entry.provenance.to_string(), "a.nix");
        assert_eq!(entry.history.len(), 2);
    }

    #[test]
    fn test_scalar_then_mapping_is_a_type_conflict() {
        let fragments = vec![
            fragment("a.nix", r#"{ home.keyboard = "fr"; }"#),
            fragment("b.nix", r#"{ home.keyboard.layout = "fr"; }"#),
        ];
        let err = Merger::new(DefaultPolicy).merge(&fragments).unwrap_err();
        match err {
            EngineError::TypeConflict {
                key,
                existing_kind,
                incoming_kind,
                ..
            } => {
                assert_eq!(key.to_string(), "home.keyboard");
                assert_eq!(existing_kind, ValueKind::String);
                assert_eq!(incoming_kind, ValueKind::Mapping);
            }
            other => panic!("expected type conflict, got {other}"),
        }
    }

    #[test]
    fn test_mapping_then_scalar_is_a_type_conflict() {
        let fragments = vec![
            fragment("a.nix", "{ services = { }; }"),
            fragment("b.nix", "{ services = true; }"),
        ];
        let err = Merger::new(DefaultPolicy).merge(&fragments).unwrap_err();
        assert!(matches!(
            err,
            EngineError::TypeConflict {
                existing_kind: ValueKind::Mapping,
                ..
            }
        ));
    }

    #[test]
    fn test_list_then_scalar_is_a_type_conflict() {
        let fragments = vec![
            fragment("a.nix", "{ x = [ 1 ]; }"),
            fragment("b.nix", "{ x = 2; }"),
        ];
        let err = Merger::new(DefaultPolicy).merge(&fragments).unwrap_err();
        assert!(matches!(err, EngineError::TypeConflict { .. }));
    }

    #[test]
    fn test_override_strategy_replaces_lists() {
        let fragments = vec![
            fragment("a.nix", "{ x = [ 1 2 ]; }"),
            fragment("b.nix", "{ x = [ 3 ]; }"),
        ];
        let tree = Merger::new(FixedPolicy(MergeStrategy::Override))
            .merge(&fragments)
            .unwrap();
        assert_eq!(tree.get(&key("x")).unwrap().value.to_string(), "[ 3 ]");
    }
}
