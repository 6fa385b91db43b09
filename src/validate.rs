//! Schema validation of a merged tree.
//!
//! Produces an ordered report: missing required keys first, then leaf
//! violations in key order, then mapping violations. Never mutates the tree.

use crate::key::OptionKey;
use crate::merge::MergedTree;
use crate::schema::{OptionType, Schema};
use crate::value::OptionValue;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingRequired,
    TypeMismatch,
    InvalidEnum,
    UnknownKey,
    UnresolvedReference,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::MissingRequired => "missing required option",
            ViolationKind::TypeMismatch => "type mismatch",
            ViolationKind::InvalidEnum => "value not allowed",
            ViolationKind::UnknownKey => "unknown option",
            ViolationKind::UnresolvedReference => "unresolved reference",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub key: OptionKey,
    pub kind: ViolationKind,
    pub severity: Severity,
    /// Constraint that was not met
    pub expected: String,
    /// Offending value, rendered in fragment syntax
    pub actual: Option<String>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {} (expected {}", level, self.key, self.kind, self.expected)?;
        if let Some(actual) = &self.actual {
            write!(f, ", found {}", actual)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for violation in &self.violations {
            writeln!(f, "{}", violation)?;
        }
        Ok(())
    }
}

pub struct Validator<'a> {
    schema: &'a Schema,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    pub fn validate(&self, tree: &MergedTree) -> ValidationReport {
        let mut violations = Vec::new();
        let stamp = self.schema.stamp_key();

        for (key, entry) in self.schema.required_keys() {
            if !tree.contains(&key) {
                violations.push(Violation {
                    key,
                    kind: ViolationKind::MissingRequired,
                    severity: Severity::Error,
                    expected: entry.constraint.option_type.to_string(),
                    actual: None,
                });
            }
        }

        for (key, entry) in tree.leaves() {
            if Some(key) == stamp && matches!(entry.value, OptionValue::Reference(_)) {
                violations.push(Violation {
                    key: key.clone(),
                    kind: ViolationKind::TypeMismatch,
                    severity: Severity::Error,
                    expected: "a literal compatibility stamp".to_string(),
                    actual: Some(entry.value.to_string()),
                });
                continue;
            }

            for target in entry.value.references() {
                if Some(target) != stamp {
                    violations.push(Violation {
                        key: key.clone(),
                        kind: ViolationKind::UnresolvedReference,
                        severity: Severity::Error,
                        expected: match stamp {
                            Some(stamp) => format!("a literal value or config.{}", stamp),
                            None => "a literal value".to_string(),
                        },
                        actual: Some(format!("config.{}", target)),
                    });
                }
            }

            match self.schema.lookup(key) {
                Some(schema_entry) => {
                    let constraint = &schema_entry.constraint;
                    if !constraint.option_type.accepts(&entry.value, stamp) {
                        violations.push(Violation {
                            key: key.clone(),
                            kind: ViolationKind::TypeMismatch,
                            severity: Severity::Error,
                            expected: constraint.option_type.to_string(),
                            actual: Some(describe(&entry.value)),
                        });
                    } else if !constraint.allows(&entry.value) {
                        violations.push(Violation {
                            key: key.clone(),
                            kind: ViolationKind::InvalidEnum,
                            severity: Severity::Error,
                            expected: format!("one of {}", render_allowed(constraint.allowed.as_deref())),
                            actual: Some(entry.value.to_string()),
                        });
                    }
                }
                None => self.check_unknown(key, &mut violations),
            }
        }

        for (key, _) in tree.mappings() {
            if let Some(schema_entry) = self.schema.lookup(key) {
                let option_type = &schema_entry.constraint.option_type;
                if !matches!(option_type, OptionType::Mapping | OptionType::Any) {
                    violations.push(Violation {
                        key: key.clone(),
                        kind: ViolationKind::TypeMismatch,
                        severity: Severity::Error,
                        expected: option_type.to_string(),
                        actual: Some("mapping".to_string()),
                    });
                }
            }
        }

        for key in tree.empty_mappings() {
            if self.schema.lookup(key).is_none() {
                self.check_unknown(key, &mut violations);
            }
        }

        ValidationReport::new(violations)
    }

    fn check_unknown(&self, key: &OptionKey, violations: &mut Vec<Violation>) {
        if self.schema.covering(key).is_some() {
            return;
        }
        violations.push(Violation {
            key: key.clone(),
            kind: ViolationKind::UnknownKey,
            severity: if self.schema.is_strict() {
                Severity::Error
            } else {
                Severity::Warning
            },
            expected: "a declared option".to_string(),
            actual: None,
        });
    }
}

fn describe(value: &OptionValue) -> String {
    match value {
        OptionValue::List(_) | OptionValue::Mapping(_) => value.kind().to_string(),
        other => format!("{} {}", other.kind(), other),
    }
}

fn render_allowed(allowed: Option<&[OptionValue]>) -> String {
    let values: Vec<String> = allowed
        .unwrap_or_default()
        .iter()
        .map(|v| v.to_string())
        .collect();
    format!("[ {} ]", values.join(" "))
}
