//! Element contexts
//!
//! An [`ElementContext`] owns everything needed to produce one element:
//! its name, type, scope and [`ElementSource`]. Contexts start
//! uninitialized; the container initializes each exactly once, after which
//! instances can be requested.
//!
//! Singletons are constructed at most once, even under concurrent first
//! access: the cached instance lives in a `OnceCell` and only one caller
//! runs the construction. Prototypes construct a new instance per request.
//! Every constructed instance passes through the post-processors before it
//! is handed out.

use crate::container::ContainerInner;
use crate::scope::ConstructionGuard;
use crate::{
    Args, DependencyDefinition, DependencyResolverChain, DiError, ElementDependencyGraph, ElementScope, ElementSource,
    ElementsContainer, Instance, PostProcessorAggregator, PreConstructedElementSource, Resolved, Result, TypeDescriptor,
};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Shared state handed to every context when the container initializes.
pub struct ElementEnvironment {
    container: Weak<ContainerInner>,
    post_processors: PostProcessorAggregator,
    parameter_resolvers: DependencyResolverChain,
    field_resolvers: DependencyResolverChain,
}

impl ElementEnvironment {
    pub(crate) fn new(container: &Arc<ContainerInner>, post_processors: PostProcessorAggregator) -> Self {
        Self {
            container: Arc::downgrade(container),
            post_processors,
            parameter_resolvers: DependencyResolverChain::parameters(),
            field_resolvers: DependencyResolverChain::fields(),
        }
    }

    /// Handle to the owning container.
    pub fn container(&self) -> Result<ElementsContainer> {
        self.container
            .upgrade()
            .map(ElementsContainer::from_inner)
            .ok_or_else(|| DiError::creation_failed::<ElementsContainer>("container has been dropped"))
    }

    #[inline]
    pub fn post_processors(&self) -> &PostProcessorAggregator {
        &self.post_processors
    }

    /// Chain for constructor and producer method parameters.
    #[inline]
    pub fn parameter_resolvers(&self) -> &DependencyResolverChain {
        &self.parameter_resolvers
    }

    /// Chain for injected fields.
    #[inline]
    pub fn field_resolvers(&self) -> &DependencyResolverChain {
        &self.field_resolvers
    }
}

impl fmt::Debug for ElementEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementEnvironment")
            .field("post_processors", &self.post_processors)
            .finish()
    }
}

/// A registered element and its lifecycle state.
pub struct ElementContext {
    name: String,
    ty: Arc<TypeDescriptor>,
    scope: ElementScope,
    source: ElementSource,
    env: OnceCell<Arc<ElementEnvironment>>,
    singleton: OnceCell<Instance>,
}

impl ElementContext {
    pub fn new(name: impl Into<String>, ty: Arc<TypeDescriptor>, scope: ElementScope, source: ElementSource) -> Self {
        Self {
            name: name.into(),
            ty,
            scope,
            source,
            env: OnceCell::new(),
            singleton: OnceCell::new(),
        }
    }

    /// Singleton context handing out an existing instance.
    pub fn pre_constructed(name: impl Into<String>, instance: Instance, ty: Arc<TypeDescriptor>) -> Self {
        Self::new(
            name,
            ty,
            ElementScope::Singleton,
            ElementSource::PreConstructed(PreConstructedElementSource::new(instance)),
        )
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor of the produced value's type.
    #[inline]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    #[inline]
    pub fn scope(&self) -> ElementScope {
        self.scope
    }

    #[inline]
    pub fn source(&self) -> &ElementSource {
        &self.source
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.env.get().is_some()
    }

    /// Parent context a producer method element was assembled against.
    ///
    /// Construction looks the parent up by name in the container instead,
    /// so this may be `None` after the parent was overridden.
    pub fn parent(&self) -> Option<Arc<ElementContext>> {
        match &self.source {
            ElementSource::Method(source) => source.parent(),
            _ => None,
        }
    }

    /// Move to the initialized state. Allowed exactly once.
    pub fn initialize(&self, env: Arc<ElementEnvironment>) -> Result<()> {
        self.env.set(env).map_err(|_| DiError::AlreadyInitialized {
            what: format!("element context {}", self.name),
        })?;

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            element = %self.name,
            scope = %self.scope,
            source = self.source.kind(),
            "Element context initialized"
        );

        Ok(())
    }

    /// Obtain an instance, constructing it if the scope requires.
    ///
    /// `graph` is the dependency graph of the resolution chain this request
    /// belongs to. A cached singleton ignores it.
    pub fn request_instance(&self, graph: &mut ElementDependencyGraph) -> Result<Instance> {
        let env = self.env.get().ok_or_else(|| DiError::NotInitialized {
            name: self.name.clone(),
        })?;

        match self.scope {
            ElementScope::Singleton if self.is_cacheable() => {
                if let Some(instance) = self.singleton.get() {
                    #[cfg(feature = "logging")]
                    trace!(target: "element_injector", element = %self.name, "Singleton cache hit");
                    return Ok(Arc::clone(instance));
                }

                let _guard = ConstructionGuard::enter(&self.name)?;
                self.singleton
                    .get_or_try_init(|| self.construct(env, graph))
                    .map(Arc::clone)
            }
            _ => {
                let _guard = ConstructionGuard::enter(&self.name)?;
                self.construct(env, graph)
            }
        }
    }

    /// Like [`request_instance`](Self::request_instance), paired with the descriptor.
    pub fn request(&self, graph: &mut ElementDependencyGraph) -> Result<Resolved> {
        let instance = self.request_instance(graph)?;
        Ok(Resolved::new(instance, Arc::clone(&self.ty)))
    }

    fn is_cacheable(&self) -> bool {
        match &self.source {
            ElementSource::PreConstructed(source) => source.is_cacheable(),
            _ => true,
        }
    }

    fn construct(&self, env: &ElementEnvironment, graph: &mut ElementDependencyGraph) -> Result<Instance> {
        let container = env.container()?;

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            element = %self.name,
            scope = %self.scope,
            source = self.source.kind(),
            "Constructing element"
        );

        let instance = match &self.source {
            ElementSource::Class(source) => {
                let args = self.resolve_arguments(&source.dependency_definitions(), env, graph, &container)?;
                source.constructor().instantiate(&args)?
            }
            ElementSource::Method(source) => {
                // By name, so a context overriding the parent takes its place.
                let parent = container
                    .element_context(source.parent_name())
                    .map_err(|_| DiError::ParentDropped {
                        name: self.name.clone(),
                    })?;
                graph.add_dependency(&self.name, parent.name())?;
                let target = parent.request_instance(graph)?;

                let args = self.resolve_arguments(&source.dependency_definitions(), env, graph, &container)?;
                source.method().invoke(&target, &args)?.ok_or_else(|| DiError::CreationFailed {
                    type_name: self.ty.name().to_string(),
                    reason: format!("producer method {} returned no value", source.method().name()),
                })?
            }
            ElementSource::PreConstructed(source) => source.instance()?,
        };

        env.post_processors().process(self, &instance, env)?;
        Ok(instance)
    }

    fn resolve_arguments(
        &self,
        definitions: &[DependencyDefinition],
        env: &ElementEnvironment,
        graph: &mut ElementDependencyGraph,
        container: &ElementsContainer,
    ) -> Result<Args> {
        let mut values = Vec::with_capacity(definitions.len());
        for definition in definitions {
            values.push(env.parameter_resolvers().resolve(definition, self, graph, container)?);
        }
        Ok(Args::new(values))
    }
}

impl fmt::Debug for ElementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementContext")
            .field("name", &self.name)
            .field("type", &self.ty.name())
            .field("scope", &self.scope)
            .field("source", &self.source)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
