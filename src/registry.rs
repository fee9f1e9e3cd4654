//! Type registry
//!
//! The registry is the crate's stand-in for a class path: the explicit set
//! of types element discovery may look at. Scanners enumerate it by module
//! path or look types up by full name. A name that was never registered
//! "fails to load".

use crate::{Describe, TagDescriptor, TagRegistry, TypeDescriptor};
use ahash::RandomState;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Ordered table of type descriptors, plus the tag types they use.
#[derive(Clone)]
pub struct TypeRegistry {
    types: Vec<Arc<TypeDescriptor>>,
    by_name: HashMap<&'static str, usize, RandomState>,
    tags: Arc<TagRegistry>,
}

impl TypeRegistry {
    /// Empty registry knowing the built-in tag types.
    pub fn new() -> Self {
        Self::with_tags(TagRegistry::new())
    }

    pub fn with_tags(tags: TagRegistry) -> Self {
        Self {
            types: Vec::new(),
            by_name: HashMap::with_hasher(RandomState::new()),
            tags: Arc::new(tags),
        }
    }

    /// Register a self-describing type.
    pub fn register<T: Describe>(&mut self) -> Arc<TypeDescriptor> {
        self.register_descriptor(T::describe())
    }

    /// Register a descriptor. Registering the same type name again replaces
    /// the earlier descriptor in place.
    pub fn register_descriptor(&mut self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        let name = descriptor.name();

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            type_name = name,
            package = descriptor.package(),
            "Registering type"
        );

        match self.by_name.get(name) {
            Some(&idx) => self.types[idx] = Arc::clone(&descriptor),
            None => {
                self.by_name.insert(name, self.types.len());
                self.types.push(Arc::clone(&descriptor));
            }
        }
        descriptor
    }

    /// Register a composed tag type.
    pub fn register_tag(&mut self, descriptor: TagDescriptor) {
        Arc::make_mut(&mut self.tags).register(descriptor);
    }

    /// Look a type up by its full name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.by_name.get(name).map(|&idx| &self.types[idx])
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All types, in registration order.
    #[inline]
    pub fn types(&self) -> &[Arc<TypeDescriptor>] {
        &self.types
    }

    /// Types declared directly in `package`.
    pub fn in_package<'a>(&'a self, package: &'a str) -> impl Iterator<Item = &'a Arc<TypeDescriptor>> + 'a {
        self.types.iter().filter(move |t| t.package() == package)
    }

    /// Types declared in `package` or any of its sub-packages.
    pub fn in_package_tree<'a>(&'a self, package: &'a str) -> impl Iterator<Item = &'a Arc<TypeDescriptor>> + 'a {
        self.types
            .iter()
            .filter(move |t| is_in_package_tree(t.package(), package))
    }

    /// Types nested in `enclosing`, at any depth.
    pub fn nested_in(&self, enclosing: &str) -> Vec<Arc<TypeDescriptor>> {
        let mut found = Vec::new();
        let mut pending = vec![enclosing.to_string()];

        while let Some(outer) = pending.pop() {
            for ty in &self.types {
                if ty.enclosing() == Some(outer.as_str()) && !found.iter().any(|f: &Arc<TypeDescriptor>| f.name() == ty.name()) {
                    pending.push(ty.name().to_string());
                    found.push(Arc::clone(ty));
                }
            }
        }
        found
    }

    #[inline]
    pub fn tags(&self) -> &Arc<TagRegistry> {
        &self.tags
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.len())
            .field("tags", &self.tags.len())
            .finish()
    }
}

/// `package` equals `root` or is one of its sub-packages.
pub(crate) fn is_in_package_tree(package: &str, root: &str) -> bool {
    if root.is_empty() {
        return true;
    }
    package == root
        || (package.len() > root.len() + 1 && package.starts_with(root) && package[root.len()..].starts_with("::"))
}
