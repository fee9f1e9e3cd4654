//! Elements initialization process
//!
//! The bootstrap entry point. One call to
//! [`ElementsInitializationProcess::initialize`] runs discovery, assembly,
//! registration of pre-constructed elements, filtering, container
//! initialization and singleton instantiation, in that order, and returns
//! the initialized container.
//!
//! Any error aborts the whole bootstrap.

use crate::{
    ClassElementContextAssembler, ComposedTagScanner, DiError, ElementClassScanner, ElementContext, ElementContextFilter,
    ElementMethodScanner, ElementsConfig, ElementsContainer, FilterEnvironment, Instance,
    MethodElementContextAssembler, PostProcessorAggregator, ProfilesContainer, PropertiesContainer, Result,
    ScanEnvironment, TypeDescriptor, TypeRegistry, assemble_result, dedup_results, default_class_scanners,
    default_filters, discarded_names,
};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, info};

/// An existing instance registered as an element.
#[derive(Clone)]
pub struct PreConstructedElement {
    name: Option<String>,
    instance: Instance,
    ty: Arc<TypeDescriptor>,
    override_existing: bool,
}

impl PreConstructedElement {
    pub fn new(instance: Instance, ty: Arc<TypeDescriptor>) -> Self {
        Self {
            name: None,
            instance,
            ty,
            override_existing: false,
        }
    }

    /// A plain value described only by its type.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value), Arc::new(TypeDescriptor::opaque::<T>()))
    }

    /// Register under `name` instead of the type's name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace a discovered element of the same name instead of failing.
    pub fn overriding(mut self) -> Self {
        self.override_existing = true;
        self
    }

    /// The element name: the given one, or the type's full name.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.ty.name())
    }

    fn into_context(self) -> (ElementContext, bool) {
        let name = self.name().to_string();
        (
            ElementContext::pre_constructed(name, self.instance, self.ty),
            self.override_existing,
        )
    }
}

impl fmt::Debug for PreConstructedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreConstructedElement")
            .field("name", &self.name())
            .field("type", &self.ty.name())
            .field("override", &self.override_existing)
            .finish()
    }
}

/// What the application hands to the bootstrap.
#[derive(Debug, Clone, Default)]
pub struct InitializationInput {
    root: Option<String>,
    pre_constructed: Vec<PreConstructedElement>,
}

impl InitializationInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// The application's root type, by full name.
    pub fn root_name(mut self, name: impl Into<String>) -> Self {
        self.root = Some(name.into());
        self
    }

    /// The application's root type.
    pub fn root<T: ?Sized + 'static>(self) -> Self {
        self.root_name(std::any::type_name::<T>())
    }

    pub fn pre_constructed(mut self, element: PreConstructedElement) -> Self {
        self.pre_constructed.push(element);
        self
    }
}

/// The pluggable parts of the bootstrap.
pub struct ContextBundle {
    pub class_scanners: Vec<Box<dyn ElementClassScanner>>,
    pub method_scanner: ElementMethodScanner,
    pub class_assembler: ClassElementContextAssembler,
    pub method_assembler: MethodElementContextAssembler,
    pub filters: Vec<Box<dyn ElementContextFilter>>,
    pub post_processors: PostProcessorAggregator,
}

impl ContextBundle {
    pub fn with_class_scanner(mut self, scanner: Box<dyn ElementClassScanner>) -> Self {
        self.class_scanners.push(scanner);
        self
    }

    pub fn with_filter(mut self, filter: Box<dyn ElementContextFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_post_processors(mut self, post_processors: PostProcessorAggregator) -> Self {
        self.post_processors = post_processors;
        self
    }
}

impl Default for ContextBundle {
    fn default() -> Self {
        Self {
            class_scanners: default_class_scanners(),
            method_scanner: ElementMethodScanner,
            class_assembler: ClassElementContextAssembler,
            method_assembler: MethodElementContextAssembler,
            filters: default_filters(),
            post_processors: PostProcessorAggregator::standard(),
        }
    }
}

impl fmt::Debug for ContextBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBundle")
            .field("class_scanners", &self.class_scanners.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("filters", &self.filters.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("post_processors", &self.post_processors)
            .finish()
    }
}

/// Bootstraps an [`ElementsContainer`] from a type registry.
///
/// # Examples
///
/// ```rust
/// use element_injector::{
///     Constructor, ContextBundle, ElementsInitializationProcess, InitializationInput, ProfilesContainer,
///     PropertiesContainer, TypeDescriptor, TypeRegistry, tags,
/// };
///
/// struct Clock;
///
/// let mut registry = TypeRegistry::new();
/// registry.register_descriptor(
///     TypeDescriptor::class::<Clock>()
///         .tag(tags::element().named("clock"))
///         .constructor(Constructor::public(), |_args| Ok(Clock))
///         .build(),
/// );
///
/// let process = ElementsInitializationProcess::new(registry, PropertiesContainer::new(), ProfilesContainer::default());
/// let container = process
///     .initialize(InitializationInput::new().root::<Clock>(), ContextBundle::default())
///     .unwrap();
/// assert!(container.get::<Clock>("clock").is_ok());
/// ```
pub struct ElementsInitializationProcess {
    registry: Arc<TypeRegistry>,
    properties: Arc<PropertiesContainer>,
    profiles: Arc<ProfilesContainer>,
}

impl ElementsInitializationProcess {
    pub fn new(registry: TypeRegistry, properties: PropertiesContainer, profiles: ProfilesContainer) -> Self {
        Self {
            registry: Arc::new(registry),
            properties: Arc::new(properties),
            profiles: Arc::new(profiles),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn initialize(&self, input: InitializationInput, bundle: ContextBundle) -> Result<ElementsContainer> {
        let config = ElementsConfig::from_properties(&self.properties)?;
        let tags = ComposedTagScanner::new(Arc::clone(self.registry.tags()));
        let container = ElementsContainer::new(tags.clone(), Arc::clone(&self.properties));

        if !config.initialization_enabled {
            #[cfg(feature = "logging")]
            info!(target: "element_injector", "Element initialization disabled; container left empty");

            container.initialize_element_contexts(bundle.post_processors)?;
            return Ok(container);
        }

        let root = match &input.root {
            Some(name) => Some(
                self.registry
                    .get(name)
                    .ok_or_else(|| DiError::TypeNotRegistered { type_name: name.clone() })?,
            ),
            None => None,
        };

        let env = ScanEnvironment {
            registry: &self.registry,
            tags: &tags,
            config: &config,
            properties: &self.properties,
            root,
        };

        let mut results = Vec::new();
        for scanner in &bundle.class_scanners {
            if !scanner.is_enabled(&config) {
                #[cfg(feature = "logging")]
                debug!(target: "element_injector", scanner = scanner.name(), "Class scanner disabled");
                continue;
            }
            results.extend(scanner.scan(&env)?);
        }
        let results = dedup_results(results);

        let mut classes = Vec::with_capacity(results.len());
        for result in &results {
            let context = Arc::new(assemble_result(
                result,
                &bundle.class_assembler,
                &bundle.method_assembler,
                &tags,
            )?);
            container.add_element_context(Arc::clone(&context))?;
            classes.push(context);
        }

        let methods = bundle.method_scanner.scan(&classes, &tags)?;
        for result in &methods {
            let context = assemble_result(result, &bundle.class_assembler, &bundle.method_assembler, &tags)?;
            container.add_element_context(Arc::new(context))?;
        }

        self.register_pre_constructed(&container, input.pre_constructed)?;

        let filter_env = FilterEnvironment {
            tags: &tags,
            profiles: &self.profiles,
        };
        let discarded = discarded_names(&container.element_contexts(), &bundle.filters, &filter_env)?;
        if !discarded.is_empty() {
            container.retain_element_contexts(|context| !discarded.contains(context.name()))?;
        }

        container.initialize_element_contexts(bundle.post_processors)?;
        #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
        let singletons = container.instantiate_singletons()?;

        #[cfg(feature = "logging")]
        info!(
            target: "element_injector",
            classes = classes.len(),
            methods = methods.len(),
            discarded = discarded.len(),
            elements = container.len(),
            singletons,
            "Elements initialized"
        );

        Ok(container)
    }

    /// The container, the properties and the profiles are always injectable.
    fn register_pre_constructed(&self, container: &ElementsContainer, inputs: Vec<PreConstructedElement>) -> Result<()> {
        container.register_self()?;

        let properties: Instance = Arc::clone(&self.properties) as Instance;
        let profiles: Instance = Arc::clone(&self.profiles) as Instance;
        for element in [
            PreConstructedElement::new(properties, Arc::new(TypeDescriptor::opaque::<PropertiesContainer>())),
            PreConstructedElement::new(profiles, Arc::new(TypeDescriptor::opaque::<ProfilesContainer>())),
        ] {
            let (context, _) = element.into_context();
            container.override_element_context(Arc::new(context))?;
        }

        for element in inputs {
            let (context, override_existing) = element.into_context();

            #[cfg(feature = "logging")]
            debug!(
                target: "element_injector",
                element = context.name(),
                override_existing,
                "Registering pre-constructed element"
            );

            if override_existing {
                container.override_element_context(Arc::new(context))?;
            } else {
                container.add_element_context(Arc::new(context))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ElementsInitializationProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementsInitializationProcess")
            .field("types", &self.registry.len())
            .field("properties", &self.properties.len())
            .field("profiles", &self.profiles.profiles())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CONTAINER_ELEMENT_NAME, Constructor, tags};

    struct Root;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_descriptor(
            TypeDescriptor::class::<Root>()
                .tag(tags::element())
                .constructor(Constructor::public(), |_| Ok(Root))
                .build(),
        );
        registry
    }

    #[test]
    fn test_initialization_disabled_returns_empty_container() {
        let properties = PropertiesContainer::new().with(crate::config::INITIALIZATION_ENABLED, "false");
        let process = ElementsInitializationProcess::new(registry(), properties, ProfilesContainer::default());
        let container = process
            .initialize(InitializationInput::new().root::<Root>(), ContextBundle::default())
            .unwrap();
        assert!(container.is_empty());
        assert!(container.is_initialized());
    }

    #[test]
    fn test_framework_elements_registered() {
        let process = ElementsInitializationProcess::new(registry(), PropertiesContainer::new(), ProfilesContainer::new(["dev"]));
        let container = process
            .initialize(InitializationInput::new().root::<Root>(), ContextBundle::default())
            .unwrap();

        assert!(container.contains(std::any::type_name::<Root>()));
        let itself = container.get::<ElementsContainer>(CONTAINER_ELEMENT_NAME).unwrap();
        assert!(itself.ptr_eq(&container));
        let profiles = container.get_by_type::<ProfilesContainer>().unwrap();
        assert!(profiles.is_profile_set("dev"));
        assert!(container.get_by_type::<PropertiesContainer>().is_ok());
    }

    #[test]
    fn test_pre_constructed_name_collision() {
        let process = ElementsInitializationProcess::new(registry(), PropertiesContainer::new(), ProfilesContainer::default());
        let root_name = std::any::type_name::<Root>();

        let clash = InitializationInput::new()
            .root::<Root>()
            .pre_constructed(PreConstructedElement::value(7u8).named(root_name));
        assert!(matches!(
            process.initialize(clash, ContextBundle::default()),
            Err(DiError::ElementNameNotUnique { .. })
        ));

        let replace = InitializationInput::new()
            .root::<Root>()
            .pre_constructed(PreConstructedElement::value(7u8).named(root_name).overriding());
        let container = process.initialize(replace, ContextBundle::default()).unwrap();
        assert_eq!(*container.get::<u8>(root_name).unwrap(), 7);
    }

    #[test]
    fn test_unknown_root_type() {
        let process = ElementsInitializationProcess::new(registry(), PropertiesContainer::new(), ProfilesContainer::default());
        let result = process.initialize(InitializationInput::new().root_name("nowhere::Missing"), ContextBundle::default());
        assert!(matches!(result, Err(DiError::TypeNotRegistered { .. })));
    }
}
