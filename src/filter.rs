//! Element context filters
//!
//! Filters run after every context is registered and before the container is
//! initialized. A discarded context is removed together with every producer
//! method element whose parent it was.

use crate::{ComposedTagScanner, ElementContext, ElementSource, ProfilesContainer, Result, Tagged, tags};
use std::collections::HashSet;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Everything a filter may look at.
#[derive(Clone, Copy)]
pub struct FilterEnvironment<'a> {
    pub tags: &'a ComposedTagScanner,
    pub profiles: &'a ProfilesContainer,
}

/// Decides whether an assembled context is dropped before initialization.
pub trait ElementContextFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn discard(&self, context: &ElementContext, env: &FilterEnvironment<'_>) -> Result<bool>;
}

/// Drops elements restricted to profiles that are not set.
///
/// The `Profile` tags are read from the element type, or from the producer
/// method for method elements. Untagged elements are always kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileElementFilter;

impl ProfileElementFilter {
    fn profiles_of(context: &ElementContext, env: &FilterEnvironment<'_>) -> Result<Vec<String>> {
        let target: &dyn Tagged = match context.source() {
            ElementSource::Method(source) => &**source.method(),
            ElementSource::Class(_) | ElementSource::PreConstructed(_) => &**context.descriptor(),
        };
        Ok(env
            .tags
            .scan(target, &tags::PROFILE)?
            .iter()
            .filter_map(|tag| tag.str_attribute("value"))
            .map(str::to_string)
            .collect())
    }
}

impl ElementContextFilter for ProfileElementFilter {
    fn name(&self) -> &'static str {
        "ProfileElementFilter"
    }

    fn discard(&self, context: &ElementContext, env: &FilterEnvironment<'_>) -> Result<bool> {
        let profiles = Self::profiles_of(context, env)?;
        if profiles.is_empty() {
            return Ok(false);
        }
        let active = profiles.iter().any(|p| env.profiles.is_profile_set(p));

        #[cfg(feature = "logging")]
        if !active {
            debug!(
                target: "element_injector",
                element = context.name(),
                profiles = ?profiles,
                "Element discarded: none of its profiles is set"
            );
        }

        Ok(!active)
    }
}

/// Names of the contexts to drop: those any filter discards, plus method
/// elements whose parent is dropped.
pub fn discarded_names(
    contexts: &[Arc<ElementContext>],
    filters: &[Box<dyn ElementContextFilter>],
    env: &FilterEnvironment<'_>,
) -> Result<HashSet<String, ahash::RandomState>> {
    let mut discarded = HashSet::with_hasher(ahash::RandomState::new());
    for context in contexts {
        for filter in filters {
            if filter.discard(context, env)? {
                discarded.insert(context.name().to_string());
                break;
            }
        }
    }

    // Producer chains can be deeper than one level when parents were
    // registered by hand; repeat until stable.
    loop {
        let before = discarded.len();
        for context in contexts {
            if let ElementSource::Method(source) = context.source() {
                if discarded.contains(source.parent_name()) {
                    discarded.insert(context.name().to_string());
                }
            }
        }
        if discarded.len() == before {
            break;
        }
    }
    Ok(discarded)
}

/// The standard filters.
pub fn default_filters() -> Vec<Box<dyn ElementContextFilter>> {
    vec![Box::new(ProfileElementFilter)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ClassElementSource, Constructor, ElementScope, MethodElementSource, Method, TagRegistry, TypeDescriptor,
    };

    struct Plain;
    struct DevOnly;
    struct Either;

    fn class_context(descriptor: TypeDescriptor) -> Arc<ElementContext> {
        let constructor = Arc::clone(&descriptor.constructors()[0]);
        Arc::new(ElementContext::new(
            descriptor.name(),
            Arc::new(descriptor),
            ElementScope::Singleton,
            ElementSource::Class(ClassElementSource::new(constructor)),
        ))
    }

    fn scanner() -> ComposedTagScanner {
        ComposedTagScanner::new(Arc::new(TagRegistry::new()))
    }

    #[test]
    fn test_profile_filter() {
        let plain = class_context(
            TypeDescriptor::class::<Plain>()
                .constructor(Constructor::public(), |_| Ok(Plain))
                .build(),
        );
        let dev = class_context(
            TypeDescriptor::class::<DevOnly>()
                .tag(tags::profile("dev"))
                .constructor(Constructor::public(), |_| Ok(DevOnly))
                .build(),
        );
        let either = class_context(
            TypeDescriptor::class::<Either>()
                .tag(tags::profiles(["dev", "prod"]))
                .constructor(Constructor::public(), |_| Ok(Either))
                .build(),
        );

        let tags = scanner();
        let prod = ProfilesContainer::new(["prod"]);
        let env = FilterEnvironment { tags: &tags, profiles: &prod };
        let filter = ProfileElementFilter;

        assert!(!filter.discard(&plain, &env).unwrap());
        assert!(filter.discard(&dev, &env).unwrap());
        assert!(!filter.discard(&either, &env).unwrap());
    }

    #[test]
    fn test_method_elements_follow_their_parent() {
        let parent = class_context(
            TypeDescriptor::class::<DevOnly>()
                .tag(tags::profile("dev"))
                .constructor(Constructor::public(), |_| Ok(DevOnly))
                .producer(Method::public("port"), |_d: &DevOnly, _args| Ok(8080u16))
                .producer(Method::public("host").tag(tags::profile("prod")), |_d: &DevOnly, _args| {
                    Ok(String::from("localhost"))
                })
                .build(),
        );
        let methods = parent.descriptor().methods().to_vec();
        let produced: Vec<Arc<ElementContext>> = methods
            .iter()
            .map(|m| {
                Arc::new(ElementContext::new(
                    m.name(),
                    Arc::clone(m.returns().unwrap()),
                    ElementScope::Singleton,
                    ElementSource::Method(MethodElementSource::new(Arc::clone(m), &parent)),
                ))
            })
            .collect();

        let mut contexts = vec![Arc::clone(&parent)];
        contexts.extend(produced.iter().cloned());

        let tags = scanner();
        let none = ProfilesContainer::default();
        let env = FilterEnvironment { tags: &tags, profiles: &none };
        let discarded = discarded_names(&contexts, &default_filters(), &env).unwrap();
        assert_eq!(discarded.len(), 3);

        // The producer's own tag decides, not the parent's.
        let prod = ProfilesContainer::new(["prod"]);
        let env = FilterEnvironment { tags: &tags, profiles: &prod };
        assert!(!ProfileElementFilter.discard(&produced[1], &env).unwrap());
        assert!(!ProfileElementFilter.discard(&produced[0], &env).unwrap());
    }
}
