//! Merge strategies and the policy seam that picks one per key.

use crate::key::OptionKey;
use crate::value::MergeClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How colliding values at one key are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Last writer wins
    Override,
    /// Lists concatenate in resolution order
    Append,
    /// Lists concatenate, keeping the first occurrence of each element
    Set,
    /// A second distinct assignment is a conflict
    Immutable,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStrategy::Override => "override",
            MergeStrategy::Append => "append",
            MergeStrategy::Set => "set",
            MergeStrategy::Immutable => "immutable",
        };
        f.write_str(name)
    }
}

/// Chooses the merge strategy for a leaf key.
///
/// `class` is the merge class of the value being assigned.
pub trait MergePolicy {
    fn strategy_for(&self, key: &OptionKey, class: MergeClass) -> MergeStrategy;
}

/// Policy used when no schema is available: scalars override, lists append.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl MergePolicy for DefaultPolicy {
    fn strategy_for(&self, _key: &OptionKey, class: MergeClass) -> MergeStrategy {
        match class {
            MergeClass::List => MergeStrategy::Append,
            _ => MergeStrategy::Override,
        }
    }
}

impl<P: MergePolicy + ?Sized> MergePolicy for &P {
    fn strategy_for(&self, key: &OptionKey, class: MergeClass) -> MergeStrategy {
        (**self).strategy_for(key, class)
    }
}
