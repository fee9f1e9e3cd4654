//! Elements container
//!
//! The `ElementsContainer` owns every [`ElementContext`] of an application.
//! Contexts are registered while the container is open, then the container
//! initializes them all at once and stops accepting modifications.
//! Instances are obtained by name or by type afterwards.

use crate::storage::ElementStorage;
use crate::{
    ComposedTagScanner, DiError, ElementByTypeResolver, ElementContext, ElementDependencyGraph, ElementEnvironment,
    ElementScope, ElementSource, Instance, PostProcessorAggregator, PreConstructedElementSource, PropertiesContainer,
    Resolved, Result, TagRegistry, TypeDescriptor, TypeKey,
};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Name under which a container registers itself.
pub const CONTAINER_ELEMENT_NAME: &str = "element_injector::ElementsContainer";

pub(crate) struct ContainerInner {
    storage: ElementStorage,
    /// Set once by `initialize_element_contexts`; no modifications afterwards
    initialized: AtomicBool,
    tags: ComposedTagScanner,
    properties: Arc<PropertiesContainer>,
}

/// Registry of element contexts with name and type lookup.
///
/// Cloning is cheap and yields a handle to the same container.
///
/// # Examples
///
/// ```rust
/// use element_injector::{ElementContext, ElementsContainer, PostProcessorAggregator, TypeDescriptor};
/// use std::sync::Arc;
///
/// let container = ElementsContainer::default();
/// container
///     .add_element_context(Arc::new(ElementContext::pre_constructed(
///         "greeting",
///         Arc::new(String::from("hello")),
///         Arc::new(TypeDescriptor::opaque::<String>()),
///     )))
///     .unwrap();
/// container.initialize_element_contexts(PostProcessorAggregator::standard()).unwrap();
///
/// let greeting = container.get::<String>("greeting").unwrap();
/// assert_eq!(greeting.as_str(), "hello");
/// ```
#[derive(Clone)]
pub struct ElementsContainer {
    pub(crate) inner: Arc<ContainerInner>,
}

impl ElementsContainer {
    pub fn new(tags: ComposedTagScanner, properties: Arc<PropertiesContainer>) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            properties = properties.len(),
            "Creating elements container"
        );

        Self {
            inner: Arc::new(ContainerInner {
                storage: ElementStorage::new(),
                initialized: AtomicBool::new(false),
                tags,
                properties,
            }),
        }
    }

    /// Container with the built-in tag types and the given properties.
    pub fn with_properties(properties: PropertiesContainer) -> Self {
        Self::new(
            ComposedTagScanner::new(Arc::new(TagRegistry::new())),
            Arc::new(properties),
        )
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    /// Whether both handles refer to the same container.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    pub fn tag_scanner(&self) -> &ComposedTagScanner {
        &self.inner.tags
    }

    #[inline]
    pub fn properties(&self) -> &Arc<PropertiesContainer> {
        &self.inner.properties
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a context under its name.
    pub fn add_element_context(&self, context: Arc<ElementContext>) -> Result<()> {
        self.check_not_initialized()?;
        let name = context.name().to_string();

        if !self.inner.storage.insert(context) {
            return Err(DiError::ElementNameNotUnique { name });
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            element = %name,
            count = self.inner.storage.len(),
            "Element context registered"
        );

        Ok(())
    }

    /// Register a context, replacing any context with the same name.
    /// Returns whether a context was replaced.
    pub fn override_element_context(&self, context: Arc<ElementContext>) -> Result<bool> {
        self.check_not_initialized()?;

        #[cfg(feature = "logging")]
        let name = context.name().to_string();

        let replaced = self.inner.storage.replace(context);

        #[cfg(feature = "logging")]
        debug!(target: "element_injector", element = %name, replaced, "Element context overridden");

        Ok(replaced)
    }

    pub fn remove_element_context(&self, name: &str) -> Result<Option<Arc<ElementContext>>> {
        self.check_not_initialized()?;
        Ok(self.inner.storage.remove(name))
    }

    /// Remove every context `keep` rejects. Returns the removed contexts.
    pub fn retain_element_contexts<F>(&self, mut keep: F) -> Result<Vec<Arc<ElementContext>>>
    where
        F: FnMut(&Arc<ElementContext>) -> bool,
    {
        self.check_not_initialized()?;
        let mut removed = Vec::new();
        for context in self.inner.storage.snapshot() {
            if keep(&context) {
                continue;
            }
            if let Some(context) = self.inner.storage.remove(context.name()) {
                removed.push(context);
            }
        }
        Ok(removed)
    }

    /// Register this container as a pre-constructed element of itself.
    pub(crate) fn register_self(&self) -> Result<()> {
        self.override_element_context(Arc::new(ElementContext::new(
            CONTAINER_ELEMENT_NAME,
            Arc::new(TypeDescriptor::opaque::<ElementsContainer>()),
            ElementScope::Singleton,
            ElementSource::PreConstructed(PreConstructedElementSource::container(&self.inner)),
        )))
        .map(|_| ())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn element_context(&self, name: &str) -> Result<Arc<ElementContext>> {
        self.inner
            .storage
            .get(name)
            .ok_or_else(|| DiError::element_not_found(name))
    }

    /// Context by exact type, or by assignable type when no exact match exists.
    pub fn element_context_by_type(&self, key: &TypeKey) -> Result<Arc<ElementContext>> {
        ElementByTypeResolver::resolve(&self.inner.storage.snapshot(), key)
    }

    /// All contexts, in registration order.
    pub fn element_contexts(&self) -> Vec<Arc<ElementContext>> {
        self.inner.storage.snapshot()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.storage.contains(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.storage.is_empty()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initialize every registered context. Allowed exactly once; the
    /// container accepts no modifications afterwards.
    pub fn initialize_element_contexts(&self, post_processors: PostProcessorAggregator) -> Result<()> {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            return Err(DiError::AlreadyInitialized {
                what: "elements container".to_string(),
            });
        }

        let env = Arc::new(ElementEnvironment::new(&self.inner, post_processors));
        let contexts = self.inner.storage.snapshot();
        for context in &contexts {
            context.initialize(Arc::clone(&env))?;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            elements = contexts.len(),
            "Elements container initialized"
        );

        Ok(())
    }

    /// Construct every singleton now, on the calling thread, each with a
    /// fresh dependency graph. Stops at the first error. Returns the number
    /// of singletons requested.
    ///
    /// The bootstrap calls this before handing the container out.
    pub fn instantiate_singletons(&self) -> Result<usize> {
        if !self.is_initialized() {
            return Err(DiError::NotInitialized {
                name: "elements container".to_string(),
            });
        }

        let mut count = 0;
        for context in self.inner.storage.snapshot() {
            if context.scope() != ElementScope::Singleton {
                continue;
            }
            context.request_instance(&mut ElementDependencyGraph::new())?;
            count += 1;
        }

        #[cfg(feature = "logging")]
        debug!(target: "element_injector", singletons = count, "Singletons instantiated");

        Ok(count)
    }

    /// Instance of the element named `name`, with a fresh dependency graph.
    pub fn get_instance(&self, name: &str) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(target: "element_injector", element = name, "Requesting element instance");

        self.element_context(name)?
            .request_instance(&mut ElementDependencyGraph::new())
    }

    /// Instance of the element named `name`, viewed as `T`.
    pub fn get<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.element_context(name)?
            .request(&mut ElementDependencyGraph::new())?
            .cast::<T>()
    }

    /// Instance of the only element of type `T` (exact first, then assignable).
    pub fn get_by_type<T: ?Sized + 'static>(&self) -> Result<Arc<T>> {
        self.request_by_type(&TypeKey::of::<T>())?.cast::<T>()
    }

    pub fn request_by_type(&self, key: &TypeKey) -> Result<Resolved> {
        self.element_context_by_type(key)?
            .request(&mut ElementDependencyGraph::new())
    }

    fn check_not_initialized(&self) -> Result<()> {
        if self.inner.initialized.load(Ordering::Acquire) {
            return Err(DiError::ContainerLocked);
        }
        Ok(())
    }
}

impl Default for ElementsContainer {
    fn default() -> Self {
        Self::with_properties(PropertiesContainer::new())
    }
}

impl fmt::Debug for ElementsContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementsContainer")
            .field("elements", &self.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn label(&self) -> String;
    }

    struct Plain(&'static str);

    impl Named for Plain {
        fn label(&self) -> String {
            self.0.to_string()
        }
    }

    fn plain(name: &str, label: &'static str) -> Arc<ElementContext> {
        Arc::new(ElementContext::pre_constructed(
            name,
            Arc::new(Plain(label)),
            Arc::new(TypeDescriptor::class::<Plain>().implements::<dyn Named>(|p| p).build()),
        ))
    }

    #[test]
    fn test_name_must_be_unique() {
        let container = ElementsContainer::default();
        container.add_element_context(plain("a", "first")).unwrap();
        assert!(matches!(
            container.add_element_context(plain("a", "second")),
            Err(DiError::ElementNameNotUnique { .. })
        ));
    }

    #[test]
    fn test_override_reports_replacement() {
        let container = ElementsContainer::default();
        assert!(!container.override_element_context(plain("a", "first")).unwrap());
        assert!(container.override_element_context(plain("a", "second")).unwrap());
        container
            .initialize_element_contexts(PostProcessorAggregator::standard())
            .unwrap();
        assert_eq!(container.get::<Plain>("a").unwrap().0, "second");
    }

    #[test]
    fn test_locked_after_initialization() {
        let container = ElementsContainer::default();
        container.add_element_context(plain("a", "x")).unwrap();
        container
            .initialize_element_contexts(PostProcessorAggregator::standard())
            .unwrap();

        assert!(matches!(container.add_element_context(plain("b", "y")), Err(DiError::ContainerLocked)));
        assert!(matches!(container.override_element_context(plain("a", "y")), Err(DiError::ContainerLocked)));
        assert!(matches!(container.remove_element_context("a"), Err(DiError::ContainerLocked)));
        assert!(matches!(
            container.initialize_element_contexts(PostProcessorAggregator::standard()),
            Err(DiError::AlreadyInitialized { .. })
        ));
    }

    #[test]
    fn test_lookup_by_name_and_type() {
        let container = ElementsContainer::default();
        container.add_element_context(plain("a", "only")).unwrap();
        container
            .initialize_element_contexts(PostProcessorAggregator::standard())
            .unwrap();

        assert!(matches!(container.element_context("missing"), Err(DiError::ElementNotFound { .. })));
        assert_eq!(container.get_by_type::<dyn Named>().unwrap().label(), "only");
        assert_eq!(container.get::<dyn Named>("a").unwrap().label(), "only");
    }

    #[test]
    fn test_retain_before_initialization() {
        let container = ElementsContainer::default();
        container.add_element_context(plain("keep", "k")).unwrap();
        container.add_element_context(plain("drop", "d")).unwrap();

        let removed = container.retain_element_contexts(|c| c.name() != "drop").unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(container.len(), 1);
        assert!(container.contains("keep"));
    }

    #[test]
    fn test_instantiate_singletons_after_initialization() {
        let container = ElementsContainer::default();
        container.add_element_context(plain("a", "x")).unwrap();
        container.add_element_context(plain("b", "y")).unwrap();
        assert!(matches!(
            container.instantiate_singletons(),
            Err(DiError::NotInitialized { .. })
        ));

        container
            .initialize_element_contexts(PostProcessorAggregator::standard())
            .unwrap();
        assert_eq!(container.instantiate_singletons().unwrap(), 2);
    }

    #[test]
    fn test_container_registers_itself_without_owning_itself() {
        let container = ElementsContainer::default();
        container.register_self().unwrap();
        container
            .initialize_element_contexts(PostProcessorAggregator::standard())
            .unwrap();

        let resolved = container.get::<ElementsContainer>(CONTAINER_ELEMENT_NAME).unwrap();
        assert!(resolved.ptr_eq(&container));
        drop(resolved);
        assert_eq!(Arc::strong_count(&container.inner), 1);
    }
}
