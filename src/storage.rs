//! Element context storage
//!
//! Keeps contexts in registration order (by-type lookup scans them in that
//! order) and indexes them by name in a `DashMap`.

use crate::ElementContext;
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe storage for element contexts.
///
/// Name lookups go through the sharded index. Lock order is always index
/// shard first, then the ordered list.
pub(crate) struct ElementStorage {
    by_name: DashMap<String, Arc<ElementContext>, RandomState>,
    ordered: RwLock<Vec<Arc<ElementContext>>>,
}

impl ElementStorage {
    /// Create new empty storage.
    ///
    /// 8 shards: containers rarely hold more than a few hundred elements.
    #[inline]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            ordered: RwLock::new(Vec::new()),
        }
    }

    /// Insert unless the name is taken. Returns whether it was inserted.
    pub fn insert(&self, context: Arc<ElementContext>) -> bool {
        match self.by_name.entry(context.name().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                self.ordered
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Arc::clone(&context));
                slot.insert(context);
                true
            }
        }
    }

    /// Insert or replace by name, keeping the original position on replace.
    /// Returns whether a context was replaced.
    pub fn replace(&self, context: Arc<ElementContext>) -> bool {
        match self.by_name.entry(context.name().to_string()) {
            Entry::Occupied(mut slot) => {
                let mut ordered = self.ordered.write().unwrap_or_else(PoisonError::into_inner);
                if let Some(pos) = ordered.iter().position(|c| c.name() == context.name()) {
                    ordered[pos] = Arc::clone(&context);
                }
                slot.insert(context);
                true
            }
            Entry::Vacant(slot) => {
                self.ordered
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Arc::clone(&context));
                slot.insert(context);
                false
            }
        }
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ElementContext>> {
        let (_, removed) = self.by_name.remove(name)?;
        self.ordered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| c.name() != name);
        Some(removed)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<Arc<ElementContext>> {
        self.by_name.get(name).map(|c| Arc::clone(c.value()))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All contexts, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<ElementContext>> {
        self.ordered.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for ElementStorage {
    fn default() -> Self {
        Self::new()
    }
}
