//! Composed tag scanning
//!
//! Finds tags on a target either directly or through composed tags: tag
//! types that carry the requested tag among their own meta-tags. Given
//!
//! ```text
//! Service   tagged  @Element(scope = "prototype")
//! Mailer    tagged  @Service
//! ```
//!
//! scanning `Mailer` for `Element` finds the `Element` tag declared on
//! `Service`. Meta-tags from unsupported packages (the tag machinery in
//! [`lang`](crate::lang) by default) are never descended into, and a tag
//! type already on the current path is not visited again, so self- and
//! mutually-referencing tag types terminate.

use crate::{DiError, Result, Tag, TagKey, TagMatcher, TagRegistry, Tagged, lang};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    All,
    First,
}

/// Scanner resolving tags directly attached or composed through meta-tags.
#[derive(Debug, Clone)]
pub struct ComposedTagScanner {
    tags: Arc<TagRegistry>,
    matcher: TagMatcher,
    unsupported: Vec<String>,
}

impl ComposedTagScanner {
    pub fn new(tags: Arc<TagRegistry>) -> Self {
        Self {
            matcher: TagMatcher::new(Arc::clone(&tags)),
            tags,
            unsupported: vec![lang::PACKAGE.to_string()],
        }
    }

    /// Add a package whose tag types are never scanned.
    pub fn with_unsupported_package(mut self, package: impl Into<String>) -> Self {
        self.unsupported.push(package.into());
        self
    }

    #[inline]
    pub fn tag_registry(&self) -> &Arc<TagRegistry> {
        &self.tags
    }

    #[inline]
    pub fn is_unsupported(&self, key: &TagKey) -> bool {
        let package = key.package();
        self.unsupported.iter().any(|p| p == package)
    }

    /// Every match, direct or composed.
    pub fn scan(&self, target: &dyn Tagged, tag: &TagKey) -> Result<Vec<Tag>> {
        self.scan_with(target, tag, ScanMode::All)
    }

    /// The first match, if any.
    pub fn scan_one(&self, target: &dyn Tagged, tag: &TagKey) -> Result<Option<Tag>> {
        Ok(self.scan_with(target, tag, ScanMode::First)?.into_iter().next())
    }

    /// The only match, if any. More than one match is an error.
    pub fn scan_one_strict(&self, target: &dyn Tagged, tag: &TagKey) -> Result<Option<Tag>> {
        let mut found = self.scan_with(target, tag, ScanMode::All)?;
        if found.len() > 1 {
            return Err(DiError::MultipleTagsScanned {
                target: target.target_name(),
                tag: tag.to_string(),
                found: found.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(found.pop())
    }

    /// Whether `target` carries `tag`, directly or composed.
    pub fn contains(&self, target: &dyn Tagged, tag: &TagKey) -> Result<bool> {
        Ok(self.scan_one(target, tag)?.is_some())
    }

    fn scan_with(&self, target: &dyn Tagged, tag: &TagKey, mode: ScanMode) -> Result<Vec<Tag>> {
        if self.is_unsupported(tag) {
            return Err(DiError::UnsupportedTag { tag: tag.to_string() });
        }

        let mut found = Vec::new();
        let mut path = Vec::new();
        self.walk(target.tags(), tag, mode, &mut path, &mut found);
        Ok(found)
    }

    fn walk(&self, attached: &[Tag], expected: &TagKey, mode: ScanMode, path: &mut Vec<TagKey>, found: &mut Vec<Tag>) {
        for candidate in attached {
            if mode == ScanMode::First && !found.is_empty() {
                return;
            }
            if self.is_unsupported(candidate.key()) {
                continue;
            }

            let matched = self.matcher.matches(expected, candidate);
            if !matched.is_empty() {
                found.extend(matched);
                continue;
            }

            if path.contains(candidate.key()) {
                continue;
            }
            let Some(descriptor) = self.tags.get(candidate.key()) else {
                continue;
            };

            path.push(candidate.key().clone());
            self.walk(descriptor.tags(), expected, mode, path, found);
            path.pop();
        }
    }
}
