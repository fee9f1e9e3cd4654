//! Tag matching with repeatable containers

use crate::{Tag, TagKey, TagRegistry};
use std::sync::Arc;

/// Decides whether an attached tag satisfies a requested tag type.
///
/// A tag matches when it is of the requested type. If the requested type
/// is repeatable and the attached tag is its container, the repetitions
/// held by the container match instead.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    tags: Arc<TagRegistry>,
}

impl TagMatcher {
    pub fn new(tags: Arc<TagRegistry>) -> Self {
        Self { tags }
    }

    /// Matching tags; empty when `candidate` does not match `expected`.
    pub fn matches(&self, expected: &TagKey, candidate: &Tag) -> Vec<Tag> {
        if candidate.is(expected) {
            return vec![candidate.clone()];
        }

        let container = self.tags.get(expected).and_then(|d| d.repeatable_container());
        match container {
            Some(container) if candidate.is(&container) => candidate
                .tags_attribute("value")
                .iter()
                .filter(|t| t.is(expected))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    fn matcher() -> TagMatcher {
        TagMatcher::new(Arc::new(TagRegistry::new()))
    }

    #[test]
    fn test_direct_match() {
        let tag = tags::element().named("x");
        assert_eq!(matcher().matches(&tags::ELEMENT, &tag), vec![tag]);
    }

    #[test]
    fn test_no_match() {
        assert!(matcher().matches(&tags::ELEMENT, &tags::inject()).is_empty());
    }

    #[test]
    fn test_repeatable_container_unwraps() {
        let container = tags::profiles(["dev", "prod"]);
        let matched = matcher().matches(&tags::PROFILE, &container);
        assert_eq!(matched, vec![tags::profile("dev"), tags::profile("prod")]);
    }

    #[test]
    fn test_container_of_non_repeatable_type_does_not_match() {
        let container = tags::profiles(["dev"]);
        assert!(matcher().matches(&tags::ELEMENT, &container).is_empty());
    }
}
