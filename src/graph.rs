//! Per-resolution dependency graph
//!
//! One graph lives for one top-level instance request (or one field
//! injection). Element resolvers record a `dependent -> dependency` edge
//! before requesting the dependency, and the edge is refused when it would
//! close a cycle. The error fires before the recursive request, so a
//! circular chain never reaches the stack limit.

use crate::{DiError, Result};
use ahash::RandomState;
use std::collections::HashMap;

#[cfg(feature = "logging")]
use tracing::trace;

/// Edges between element names recorded during one resolution chain.
#[derive(Debug, Default, Clone)]
pub struct ElementDependencyGraph {
    edges: HashMap<String, Vec<String>, RandomState>,
}

impl ElementDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` needs `dependency`.
    ///
    /// Fails with [`DiError::CircularDependency`] when `dependency` already
    /// reaches `dependent` (or both are the same element). The error path
    /// starts and ends with `dependent`.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<()> {
        if dependent == dependency {
            return Err(DiError::CircularDependency {
                path: vec![dependent.to_string(), dependency.to_string()],
            });
        }

        if let Some(back) = self.path_between(dependency, dependent) {
            let mut path = Vec::with_capacity(back.len() + 1);
            path.push(dependent.to_string());
            path.extend(back);
            return Err(DiError::CircularDependency { path });
        }

        #[cfg(feature = "logging")]
        trace!(target: "element_injector", dependent, dependency, "Recording dependency edge");

        let targets = self.edges.entry(dependent.to_string()).or_default();
        if !targets.iter().any(|t| t == dependency) {
            targets.push(dependency.to_string());
        }
        Ok(())
    }

    /// Direct dependencies recorded for `name`.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `from` reaches `to` through recorded edges.
    pub fn depends_on(&self, from: &str, to: &str) -> bool {
        self.path_between(from, to).is_some()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Path of names from `from` to `to`, both included.
    fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut parent: HashMap<&str, &str, RandomState> = HashMap::default();
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                let mut path = vec![to.to_string()];
                let mut node = to;
                while node != from {
                    node = parent[node];
                    path.push(node.to_string());
                }
                path.reverse();
                return Some(path);
            }

            for next in self.dependencies_of(current) {
                let next = next.as_str();
                if next != from && !parent.contains_key(next) {
                    parent.insert(next, current);
                    stack.push(next);
                }
            }
        }
        None
    }
}
