//! Properties and profiles
//!
//! In-memory snapshots handed to the element machinery. Loading them from
//! files, the environment or the command line happens elsewhere; the
//! containers here are immutable once built.

use crate::{DiError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable string-keyed property values.
///
/// ```rust
/// use element_injector::PropertiesContainer;
///
/// let properties = PropertiesContainer::new()
///     .with("db.url", "postgres://localhost")
///     .with("db.replicas", "a, b,,c");
///
/// assert_eq!(properties.property_value("db.url").unwrap(), "postgres://localhost");
/// assert_eq!(properties.property_value_list("db.replicas", &[]), vec!["a", "b", "c"]);
/// assert!(properties.property_value("db.user").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesContainer {
    values: BTreeMap<String, String>,
}

impl PropertiesContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a property.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn property_value(&self, name: &str) -> Result<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| DiError::PropertyNotFound { name: name.to_string() })
    }

    #[inline]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Comma separated list value, trimmed, empty entries dropped.
    /// Returns `default` when the property is absent.
    pub fn property_value_list(&self, name: &str, default: &[&str]) -> Vec<String> {
        match self.values.get(name) {
            Some(value) => split_list(value),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Property names starting with `prefix`, in sorted order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .range(prefix.to_string()..)
            .map(|(k, _)| k.as_str())
            .take_while(move |k| k.starts_with(prefix))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertiesContainer {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Immutable set of active profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilesContainer {
    profiles: BTreeSet<String>,
}

impl ProfilesContainer {
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            profiles: profiles.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn is_profile_set(&self, name: &str) -> bool {
        self.profiles.contains(name)
    }

    #[inline]
    pub fn profiles(&self) -> &BTreeSet<String> {
        &self.profiles
    }
}

impl<S: Into<String>> FromIterator<S> for ProfilesContainer {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_default_when_absent() {
        let properties = PropertiesContainer::new();
        assert_eq!(properties.property_value_list("missing", &["x"]), vec!["x"]);
        assert!(properties.property_value_list("missing", &[]).is_empty());
    }

    #[test]
    fn test_keys_with_prefix() {
        let properties: PropertiesContainer = [
            ("elements.scan-classes", "a"),
            ("elements.scan-classes-extra", "b"),
            ("elements.scan-packages", "c"),
            ("other", "d"),
        ]
        .into_iter()
        .collect();

        let keys: Vec<&str> = properties.keys_with_prefix("elements.scan-classes").collect();
        assert_eq!(keys, vec!["elements.scan-classes", "elements.scan-classes-extra"]);
        assert_eq!(properties.len(), 4);
    }

    #[test]
    fn test_missing_property_is_lookup_miss() {
        let err = PropertiesContainer::new().property_value("nope").unwrap_err();
        assert!(err.is_lookup_miss());
    }

    #[test]
    fn test_profiles() {
        let profiles: ProfilesContainer = ["dev", "local"].into_iter().collect();
        assert!(profiles.is_profile_set("dev"));
        assert!(!profiles.is_profile_set("prod"));
        assert_eq!(profiles.profiles().len(), 2);
    }
}
