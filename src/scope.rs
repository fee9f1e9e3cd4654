//! Element scopes and construction tracking
//!
//! Provides the two element lifetimes and the per-thread construction stack
//! that stops an element from re-entering its own construction.

use crate::{DiError, Result};
use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "logging")]
use tracing::trace;

/// Lifetime of the instances produced by an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementScope {
    /// One instance, created on first request and cached
    #[default]
    Singleton,

    /// New instance on every request, never cached
    Prototype,
}

impl ElementScope {
    /// Attribute value used in `Element` tags.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementScope::Singleton => "singleton",
            ElementScope::Prototype => "prototype",
        }
    }
}

impl fmt::Display for ElementScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singleton" => Ok(ElementScope::Singleton),
            "prototype" => Ok(ElementScope::Prototype),
            other => Err(format!("unknown scope '{other}', expected singleton or prototype")),
        }
    }
}

// =============================================================================
// Construction stack
// =============================================================================

thread_local! {
    /// Names of the elements currently being constructed on this thread.
    static CONSTRUCTING: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Marks an element as under construction on the current thread.
///
/// Dependency graphs catch cycles inside one resolution chain. Field
/// injection starts a fresh graph per field, so a cycle running through
/// fields is only visible here. Entering an element that is already on the
/// stack fails instead of blocking on the element's own singleton cell.
pub(crate) struct ConstructionGuard {
    name: String,
}

impl ConstructionGuard {
    pub(crate) fn enter(name: &str) -> Result<Self> {
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();

            if let Some(start) = stack.iter().position(|n| n == name) {
                let mut path: Vec<String> = stack[start..].to_vec();
                path.push(name.to_string());
                return Err(DiError::CircularDependency { path });
            }

            #[cfg(feature = "logging")]
            trace!(
                target: "element_injector",
                element = name,
                depth = stack.len(),
                "Entering element construction"
            );

            stack.push(name.to_string());
            Ok(Self {
                name: name.to_string(),
            })
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|n| *n == self.name) {
                stack.remove(pos);
            }
        });
    }
}
