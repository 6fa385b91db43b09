//! Import graph resolution.
//!
//! Expands `imports` depth-first, pre-order, in listed order. Each fragment
//! appears once, at its first encounter, root first. Unseen imports of a
//! fragment are fetched as one batch before they are visited in order.

use crate::error::EngineError;
use crate::fragment::{Fragment, FragmentId, FragmentSource};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// One `imports` entry after location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportEdge {
    pub from: FragmentId,
    pub to: FragmentId,
}

/// Flattened import graph
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Fragments in resolution (merge) order
    pub fragments: Vec<Fragment>,
    /// Every import edge, in traversal order, duplicates included
    pub edges: Vec<ImportEdge>,
}

impl Resolution {
    pub fn root(&self) -> Option<&Fragment> {
        self.fragments.first()
    }

    pub fn ids(&self) -> Vec<&FragmentId> {
        self.fragments.iter().map(|f| f.id()).collect()
    }

    /// Targets imported by `id`, in listed order
    pub fn imports_of(&self, id: &FragmentId) -> Vec<&FragmentId> {
        self.edges
            .iter()
            .filter(|edge| &edge.from == id)
            .map(|edge| &edge.to)
            .collect()
    }
}

pub struct Resolver<'s, S: FragmentSource + ?Sized> {
    source: &'s S,
}

struct Walk {
    visited: HashSet<FragmentId>,
    stack: Vec<FragmentId>,
    fetched: HashMap<FragmentId, Result<Fragment, EngineError>>,
    order: Vec<Fragment>,
    edges: Vec<ImportEdge>,
}

impl<'s, S: FragmentSource + ?Sized> Resolver<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self { source }
    }

    /// Locate and load the root reference, then resolve it
    pub fn resolve_root(&self, reference: &str) -> Result<Resolution, EngineError> {
        let id = self.source.locate(None, reference)?;
        let root = self.source.load(&id)?;
        self.resolve(root)
    }

    /// Resolve an already-loaded root fragment
    pub fn resolve(&self, root: Fragment) -> Result<Resolution, EngineError> {
        let mut walk = Walk {
            visited: HashSet::new(),
            stack: Vec::new(),
            fetched: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
        };
        self.visit(root, &mut walk)?;
        debug!(
            fragments = walk.order.len(),
            edges = walk.edges.len(),
            "Resolved import graph"
        );
        Ok(Resolution {
            fragments: walk.order,
            edges: walk.edges,
        })
    }

    fn visit(&self, fragment: Fragment, walk: &mut Walk) -> Result<(), EngineError> {
        let id = fragment.id().clone();
        trace!(fragment = %id, depth = walk.stack.len(), "Visiting fragment");
        walk.visited.insert(id.clone());
        walk.stack.push(id.clone());

        let mut targets = Vec::with_capacity(fragment.imports().len());
        for reference in fragment.imports() {
            let target = self
                .source
                .locate(Some(&id), reference)
                .map_err(|e| e.in_chain(&walk.stack))?;
            targets.push(target);
        }
        self.prefetch(&targets, walk);
        walk.order.push(fragment);

        for target in targets {
            walk.edges.push(ImportEdge {
                from: id.clone(),
                to: target.clone(),
            });

            if let Some(pos) = walk.stack.iter().position(|s| s == &target) {
                let mut cycle = walk.stack[pos..].to_vec();
                cycle.push(target);
                return Err(EngineError::CycleDetected { cycle });
            }
            if walk.visited.contains(&target) {
                continue;
            }

            let loaded = match walk.fetched.remove(&target) {
                Some(result) => result,
                None => self.source.load(&target),
            };
            let child = loaded.map_err(|e| e.in_chain(&walk.stack))?;
            self.visit(child, walk)?;
        }

        walk.stack.pop();
        Ok(())
    }

    /// Fetch every import not yet visited or fetched, as one batch
    fn prefetch(&self, targets: &[FragmentId], walk: &mut Walk) {
        let mut pending: Vec<FragmentId> = Vec::new();
        for target in targets {
            if !walk.visited.contains(target)
                && !walk.fetched.contains_key(target)
                && !pending.contains(target)
            {
                pending.push(target.clone());
            }
        }
        if pending.is_empty() {
            return;
        }
        let results = self.source.load_batch(&pending);
        walk.fetched.extend(pending.into_iter().zip(results));
    }
}
