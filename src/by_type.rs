//! Element lookup by type

use crate::{DiError, ElementContext, Result, TypeKey};
use std::sync::Arc;

/// Two-phase lookup of an element context by type.
///
/// Exact type matches are considered first. Only when there is none are
/// contexts whose type is assignable to the requested one considered. More
/// than one candidate within a phase is ambiguous.
pub struct ElementByTypeResolver;

impl ElementByTypeResolver {
    pub fn resolve(contexts: &[Arc<ElementContext>], key: &TypeKey) -> Result<Arc<ElementContext>> {
        let exact: Vec<&Arc<ElementContext>> = contexts
            .iter()
            .filter(|c| c.descriptor().key() == *key)
            .collect();
        if let Some(found) = Self::single(exact, key)? {
            return Ok(found);
        }

        let assignable: Vec<&Arc<ElementContext>> = contexts
            .iter()
            .filter(|c| c.descriptor().key() != *key && c.descriptor().is_assignable_to(key))
            .collect();
        Self::single(assignable, key)?.ok_or_else(|| DiError::ElementTypeNotFound {
            type_name: key.name().to_string(),
        })
    }

    fn single(candidates: Vec<&Arc<ElementContext>>, key: &TypeKey) -> Result<Option<Arc<ElementContext>>> {
        match candidates.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(Arc::clone(one))),
            many => Err(DiError::AmbiguousElementType {
                type_name: key.name().to_string(),
                candidates: many.iter().map(|c| c.name().to_string()).collect(),
            }),
        }
    }
}
