//! Settings materialization: stamp finalization, schema defaults, reference
//! substitution and the immutable settings object handed to consumers.

use crate::error::EngineError;
use crate::fragment::{Fragment, FragmentId};
use crate::key::OptionKey;
use crate::merge::{MergeStrategy, MergedEntry, MergedTree, Provenance};
use crate::schema::Schema;
use crate::validate::{ValidationReport, Violation};
use crate::value::OptionValue;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Compatibility stamp ("state version"), ordered by numeric components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityStamp {
    raw: String,
    components: Vec<u64>,
}

impl CompatibilityStamp {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let components = raw
            .split('.')
            .map_while(|part| part.parse::<u64>().ok())
            .collect();
        Self { raw, components }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when this stamp is `other` or newer. Non-numeric stamps compare by text.
    pub fn at_least(&self, other: &str) -> bool {
        *self >= CompatibilityStamp::new(other)
    }
}

impl Ord for CompatibilityStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.components.len().max(other.components.len());
        let component = |c: &[u64], i: usize| c.get(i).copied().unwrap_or(0);
        (0..width)
            .map(|i| component(&self.components, i).cmp(&component(&other.components, i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for CompatibilityStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CompatibilityStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for CompatibilityStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// A fragment that contributed to the settings, with its content digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentDigest {
    pub id: FragmentId,
    pub digest: String,
}

/// The final settings object. Immutable; not persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSettings {
    settings: OptionValue,
    stamp: Option<CompatibilityStamp>,
    #[serde(rename = "provenance")]
    entries: BTreeMap<OptionKey, MergedEntry>,
    fragments: Vec<FragmentDigest>,
    warnings: Vec<Violation>,
    fingerprint: String,
}

impl ResolvedSettings {
    /// Nested settings tree
    pub fn settings(&self) -> &OptionValue {
        &self.settings
    }

    pub fn get(&self, key: &OptionKey) -> Option<&OptionValue> {
        self.settings.lookup(key)
    }

    /// Convenience lookup by dotted key text
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(&OptionKey::parse(key).ok()?)?.as_str()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(&OptionKey::parse(key).ok()?)?.as_bool()
    }

    /// Leaf entry with provenance, strategy and history
    pub fn entry(&self, key: &OptionKey) -> Option<&MergedEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&OptionKey, &MergedEntry)> {
        self.entries.iter()
    }

    pub fn stamp(&self) -> Option<&CompatibilityStamp> {
        self.stamp.as_ref()
    }

    pub fn fragments(&self) -> &[FragmentDigest] {
        &self.fragments
    }

    pub fn warnings(&self) -> &[Violation] {
        &self.warnings
    }

    /// BLAKE3 (hex) over the canonical JSON of settings and stamp
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

pub struct Materializer<'a> {
    schema: &'a Schema,
}

impl<'a> Materializer<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    pub fn materialize(
        &self,
        tree: &MergedTree,
        report: &ValidationReport,
        fragments: &[Fragment],
    ) -> Result<ResolvedSettings, EngineError> {
        if report.has_errors() {
            return Err(EngineError::ValidationFailed {
                report: report.clone(),
            });
        }

        let stamp = self.finalize_stamp(tree)?;
        let mut resolved = tree.clone();
        self.apply_defaults(&mut resolved);
        self.substitute_stamp(&mut resolved, stamp.as_ref())?;

        let settings = resolved.to_value();
        let fingerprint = fingerprint(&settings, stamp.as_ref());
        let entries = resolved
            .leaves()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();

        debug!(
            stamp = stamp.as_ref().map(|s| s.as_str()).unwrap_or("none"),
            %fingerprint,
            "Materialized settings"
        );

        Ok(ResolvedSettings {
            settings,
            stamp,
            entries,
            fragments: fragments
                .iter()
                .map(|f| FragmentDigest {
                    id: f.id().clone(),
                    digest: f.digest().to_string(),
                })
                .collect(),
            warnings: report.warnings().cloned().collect(),
            fingerprint,
        })
    }

    /// Phase one: the literal value at the stamp key, or its default
    fn finalize_stamp(&self, tree: &MergedTree) -> Result<Option<CompatibilityStamp>, EngineError> {
        let Some(stamp_key) = self.schema.stamp_key() else {
            return Ok(None);
        };

        let value = match tree.get(stamp_key) {
            Some(entry) => Some(&entry.value),
            None => self
                .schema
                .lookup(stamp_key)
                .and_then(|entry| entry.constraint.default.as_ref()),
        };

        match value {
            None => Ok(None),
            Some(OptionValue::String(s)) => Ok(Some(CompatibilityStamp::new(s.clone()))),
            Some(OptionValue::Reference(_)) => Err(EngineError::UnresolvedStamp {
                key: stamp_key.clone(),
                reason: "the stamp must be a literal, not a reference".to_string(),
            }),
            Some(other) => Err(EngineError::UnresolvedStamp {
                key: stamp_key.clone(),
                reason: format!("expected a string, found {}", other.kind()),
            }),
        }
    }

    fn apply_defaults(&self, tree: &mut MergedTree) {
        for (key, default) in self.schema.defaults() {
            if tree.contains(&key) {
                continue;
            }
            if key.strict_prefixes().any(|prefix| tree.get(&prefix).is_some()) {
                debug!(key = %key, "Skipping default below a scalar option");
                continue;
            }
            tree.insert_leaf(
                key,
                MergedEntry {
                    value: default.clone(),
                    provenance: Provenance::SchemaDefault,
                    strategy: MergeStrategy::Override,
                    history: Vec::new(),
                },
            );
        }
    }

    /// Phase two: replace every reference to the stamp key with the stamp
    fn substitute_stamp(
        &self,
        tree: &mut MergedTree,
        stamp: Option<&CompatibilityStamp>,
    ) -> Result<(), EngineError> {
        let stamp_key = self.schema.stamp_key();
        let referencing: Vec<OptionKey> = tree
            .leaves()
            .filter(|(_, entry)| !entry.value.references().is_empty())
            .map(|(key, _)| key.clone())
            .collect();

        for key in referencing {
            let Some(entry) = tree.leaf_mut(&key) else {
                continue;
            };
            if let Some(target) = entry
                .value
                .references()
                .into_iter()
                .find(|target| Some(*target) != stamp_key)
            {
                return Err(EngineError::UnresolvedReference {
                    key: key.clone(),
                    target: target.clone(),
                });
            }
            let (Some(stamp_key), Some(stamp)) = (stamp_key, stamp) else {
                return Err(EngineError::UnresolvedStamp {
                    key: stamp_key.cloned().unwrap_or_else(|| key.clone()),
                    reason: format!(
                        "'{}' refers to the stamp, but no stamp value or default is set",
                        key
                    ),
                });
            };
            substitute(&mut entry.value, stamp_key, stamp.as_str());
        }
        Ok(())
    }
}

fn substitute(value: &mut OptionValue, stamp_key: &OptionKey, stamp: &str) {
    match value {
        OptionValue::Reference(target) if target == stamp_key => {
            *value = OptionValue::String(stamp.to_string());
        }
        OptionValue::List(items) => items
            .iter_mut()
            .for_each(|item| substitute(item, stamp_key, stamp)),
        OptionValue::Mapping(map) => map
            .values_mut()
            .for_each(|item| substitute(item, stamp_key, stamp)),
        _ => {}
    }
}

fn fingerprint(settings: &OptionValue, stamp: Option<&CompatibilityStamp>) -> String {
    let canonical = serde_json::json!({
        "settings": settings.to_json(),
        "stamp": stamp.map(|s| s.as_str()),
    });
    hex::encode(blake3::hash(canonical.to_string().as_bytes()).as_bytes())
}
