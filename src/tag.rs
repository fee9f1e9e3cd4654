//! Metadata tags
//!
//! A [`Tag`] is a piece of metadata attached to a type, constructor, field,
//! method or parameter descriptor. Tags are identified by a [`TagKey`] and
//! carry named attributes. Tag types themselves are described by a
//! [`TagDescriptor`], which may carry tags of its own ("meta-tags"). That is
//! what makes composed tags possible: a tag type tagged with `Element` turns
//! every use of it into an element declaration.

use crate::ElementScope;
use ahash::RandomState;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Fully qualified name of a tag type, e.g. `element_injector::Element`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagKey(Cow<'static, str>);

impl TagKey {
    /// Create a key from a static name (usable in `const` items).
    #[inline]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Create a key from an owned name.
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The full name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module path the tag type lives in (everything before the last `::`).
    pub fn package(&self) -> &str {
        match self.0.rfind("::") {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Last path segment.
    pub fn simple_name(&self) -> &str {
        match self.0.rfind("::") {
            Some(idx) => &self.0[idx + 2..],
            None => &self.0,
        }
    }
}

impl From<&'static str> for TagKey {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for TagKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagKey({})", self.0)
    }
}

/// Attribute value carried by a tag.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
    /// Nested tags, used by repeatable containers
    Tags(Vec<Tag>),
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Str(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Str(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

impl From<Vec<String>> for TagValue {
    fn from(value: Vec<String>) -> Self {
        TagValue::List(value)
    }
}

impl From<Vec<Tag>> for TagValue {
    fn from(value: Vec<Tag>) -> Self {
        TagValue::Tags(value)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Str(s) => write!(f, "{s:?}"),
            TagValue::Bool(b) => write!(f, "{b}"),
            TagValue::Int(i) => write!(f, "{i}"),
            TagValue::List(items) => write!(f, "{items:?}"),
            TagValue::Tags(tags) => {
                f.write_str("[")?;
                for (i, tag) in tags.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{tag}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A metadata tag instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    key: TagKey,
    attributes: BTreeMap<String, TagValue>,
}

impl Tag {
    /// Create a tag without attributes.
    #[inline]
    pub fn new(key: impl Into<TagKey>) -> Self {
        Self {
            key: key.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the `name` attribute.
    pub fn named(self, name: impl Into<String>) -> Self {
        self.with("name", name.into())
    }

    /// Set the `scope` attribute.
    pub fn scoped(self, scope: ElementScope) -> Self {
        self.with("scope", scope.as_str())
    }

    #[inline]
    pub fn key(&self) -> &TagKey {
        &self.key
    }

    /// Whether this tag is of the given tag type.
    #[inline]
    pub fn is(&self, key: &TagKey) -> bool {
        &self.key == key
    }

    pub fn attribute(&self, name: &str) -> Option<&TagValue> {
        self.attributes.get(name)
    }

    /// String attribute, `None` when absent or not a string.
    pub fn str_attribute(&self, name: &str) -> Option<&str> {
        match self.attributes.get(name) {
            Some(TagValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Nested tags attribute, empty when absent or not a tag list.
    pub fn tags_attribute(&self, name: &str) -> &[Tag] {
        match self.attributes.get(name) {
            Some(TagValue::Tags(tags)) => tags,
            _ => &[],
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.key.simple_name())?;
        if !self.attributes.is_empty() {
            f.write_str("(")?;
            for (i, (name, value)) in self.attributes.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name} = {value}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Anything tags can be attached to.
pub trait Tagged {
    /// Tags directly attached to this target.
    fn tags(&self) -> &[Tag];

    /// Human readable name of the target, used in diagnostics.
    fn target_name(&self) -> String;
}

/// Description of a tag type and the meta-tags attached to it.
#[derive(Clone, Debug)]
pub struct TagDescriptor {
    key: TagKey,
    tags: Vec<Tag>,
}

impl TagDescriptor {
    pub fn new(key: impl Into<TagKey>) -> Self {
        Self {
            key: key.into(),
            tags: Vec::new(),
        }
    }

    /// Attach a meta-tag.
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Declare this tag type repeatable through the given container tag type.
    pub fn repeatable(self, container: impl Into<TagKey>) -> Self {
        self.tag(lang::repeatable(container))
    }

    #[inline]
    pub fn key(&self) -> &TagKey {
        &self.key
    }

    /// Container tag type wrapping repetitions of this tag, if any.
    pub fn repeatable_container(&self) -> Option<TagKey> {
        self.tags
            .iter()
            .find(|t| t.is(&lang::REPEATABLE))
            .and_then(|t| t.str_attribute("value"))
            .map(|name| TagKey::new(name))
    }
}

impl Tagged for TagDescriptor {
    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn target_name(&self) -> String {
        format!("tag type {}", self.key)
    }
}

/// Table of known tag types.
///
/// [`TagRegistry::new`] includes the built-in tag types; applications add
/// their own composed tags with [`TagRegistry::register`].
#[derive(Clone)]
pub struct TagRegistry {
    descriptors: HashMap<TagKey, TagDescriptor, RandomState>,
}

impl TagRegistry {
    /// Registry holding the built-in tag types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for descriptor in lang::descriptors().into_iter().chain(tags::descriptors()) {
            registry.register(descriptor);
        }
        registry
    }

    /// Registry without any tag types.
    pub fn empty() -> Self {
        Self {
            descriptors: HashMap::with_hasher(RandomState::new()),
        }
    }

    /// Register a tag type, returning the descriptor it replaced.
    pub fn register(&mut self, descriptor: TagDescriptor) -> Option<TagDescriptor> {
        self.descriptors.insert(descriptor.key.clone(), descriptor)
    }

    #[inline]
    pub fn get(&self, key: &TagKey) -> Option<&TagDescriptor> {
        self.descriptors.get(key)
    }

    #[inline]
    pub fn contains(&self, key: &TagKey) -> bool {
        self.descriptors.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("count", &self.len())
            .finish()
    }
}

/// Tag machinery itself. Composed scanning never descends into this package.
pub mod lang {
    use super::{Tag, TagDescriptor, TagKey};

    /// Package of the tag machinery.
    pub const PACKAGE: &str = "element_injector::lang";

    /// Marks a tag type as documented. Tagged with itself.
    pub const DOCUMENTED: TagKey = TagKey::from_static("element_injector::lang::Documented");

    /// Declares the container tag type of a repeatable tag (`value`).
    pub const REPEATABLE: TagKey = TagKey::from_static("element_injector::lang::Repeatable");

    pub fn documented() -> Tag {
        Tag::new(DOCUMENTED)
    }

    pub fn repeatable(container: impl Into<TagKey>) -> Tag {
        Tag::new(REPEATABLE).with("value", container.into().as_str())
    }

    pub(super) fn descriptors() -> Vec<TagDescriptor> {
        vec![
            TagDescriptor::new(DOCUMENTED).tag(documented()),
            TagDescriptor::new(REPEATABLE).tag(documented()),
        ]
    }
}

/// Built-in framework tags.
pub mod tags {
    use super::{Tag, TagDescriptor, TagKey, lang};

    /// Marks a type or producer method as an element (`name`, `scope`).
    pub const ELEMENT: TagKey = TagKey::from_static("element_injector::Element");
    /// Selects the element constructor among several public ones.
    pub const ELEMENT_CONSTRUCTOR: TagKey = TagKey::from_static("element_injector::ElementConstructor");
    /// Injects another element, by `name` or by the required type's name.
    pub const INJECT_ELEMENT: TagKey = TagKey::from_static("element_injector::InjectElement");
    /// Injects a property value (`value` is the property name).
    pub const INJECT_PROPERTY: TagKey = TagKey::from_static("element_injector::InjectProperty");
    /// Marks a lifecycle method invoked after field injection.
    pub const POST_INITIALIZATION: TagKey = TagKey::from_static("element_injector::PostInitialization");
    /// Restricts an element to an active profile (`value`). Repeatable.
    pub const PROFILE: TagKey = TagKey::from_static("element_injector::Profile");
    /// Container of repeated [`PROFILE`] tags.
    pub const PROFILES: TagKey = TagKey::from_static("element_injector::Profiles");

    pub fn element() -> Tag {
        Tag::new(ELEMENT)
    }

    pub fn element_constructor() -> Tag {
        Tag::new(ELEMENT_CONSTRUCTOR)
    }

    /// Inject an element looked up by the required type's name.
    pub fn inject() -> Tag {
        Tag::new(INJECT_ELEMENT)
    }

    /// Inject the element registered under `name`.
    pub fn inject_named(name: impl Into<String>) -> Tag {
        Tag::new(INJECT_ELEMENT).named(name)
    }

    pub fn inject_property(property: impl Into<String>) -> Tag {
        Tag::new(INJECT_PROPERTY).with("value", property.into())
    }

    pub fn post_initialization() -> Tag {
        Tag::new(POST_INITIALIZATION)
    }

    pub fn profile(name: impl Into<String>) -> Tag {
        Tag::new(PROFILE).with("value", name.into())
    }

    /// Container form of several `Profile` tags.
    pub fn profiles<I, S>(names: I) -> Tag
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let repeated: Vec<Tag> = names.into_iter().map(profile).collect();
        Tag::new(PROFILES).with("value", repeated)
    }

    pub(super) fn descriptors() -> Vec<TagDescriptor> {
        vec![
            TagDescriptor::new(ELEMENT).tag(lang::documented()),
            TagDescriptor::new(ELEMENT_CONSTRUCTOR).tag(lang::documented()),
            TagDescriptor::new(INJECT_ELEMENT).tag(lang::documented()),
            TagDescriptor::new(INJECT_PROPERTY).tag(lang::documented()),
            TagDescriptor::new(POST_INITIALIZATION).tag(lang::documented()),
            TagDescriptor::new(PROFILE)
                .tag(lang::documented())
                .repeatable(PROFILES),
            TagDescriptor::new(PROFILES).tag(lang::documented()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_package_and_simple_name() {
        let key = TagKey::from_static("app::web::Controller");
        assert_eq!(key.package(), "app::web");
        assert_eq!(key.simple_name(), "Controller");

        let bare = TagKey::new("Bare");
        assert_eq!(bare.package(), "");
        assert_eq!(bare.simple_name(), "Bare");
    }

    #[test]
    fn test_tag_attributes() {
        let tag = tags::element().named("users").scoped(ElementScope::Prototype);
        assert_eq!(tag.str_attribute("name"), Some("users"));
        assert_eq!(tag.str_attribute("scope"), Some("prototype"));
        assert_eq!(tag.str_attribute("missing"), None);
        assert!(tag.tags_attribute("name").is_empty());
    }

    #[test]
    fn test_tag_display() {
        let tag = tags::inject_property("db.url");
        assert_eq!(tag.to_string(), "@InjectProperty(value = \"db.url\")");
        assert_eq!(tags::element().to_string(), "@Element");
    }

    #[test]
    fn test_builtin_registry() {
        let registry = TagRegistry::new();
        assert!(registry.contains(&tags::ELEMENT));
        assert!(registry.contains(&lang::DOCUMENTED));

        let profile = registry.get(&tags::PROFILE).unwrap();
        assert_eq!(profile.repeatable_container(), Some(tags::PROFILES));
        assert_eq!(registry.get(&tags::ELEMENT).unwrap().repeatable_container(), None);
    }

    #[test]
    fn test_profiles_container_holds_repetitions() {
        let container = tags::profiles(["dev", "test"]);
        let repeated = container.tags_attribute("value");
        assert_eq!(repeated.len(), 2);
        assert!(repeated.iter().all(|t| t.is(&tags::PROFILE)));
    }
}
