//! Option merging: combine fragment assignments into one tree with provenance.

mod merger;
mod policy;
mod tree;

pub use merger::Merger;
pub use policy::{DefaultPolicy, MergePolicy, MergeStrategy};
pub use tree::{MergedEntry, MergedTree, Provenance};
