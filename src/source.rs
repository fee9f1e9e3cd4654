//! Where element instances come from

use crate::container::ContainerInner;
use crate::{
    ConstructorDescriptor, DependencyDefinition, DiError, ElementContext, ElementsContainer, Instance, MethodDescriptor, Result,
};
use std::fmt;
use std::sync::{Arc, Weak};

/// How an element produces its instances.
pub enum ElementSource {
    /// Calls a constructor of the element type
    Class(ClassElementSource),
    /// Calls a producer method on a parent element
    Method(MethodElementSource),
    /// Hands out an instance that already exists
    PreConstructed(PreConstructedElementSource),
}

impl ElementSource {
    /// Definitions of the parameters that must be resolved per instance.
    pub fn dependency_definitions(&self) -> Vec<DependencyDefinition> {
        match self {
            ElementSource::Class(source) => source.dependency_definitions(),
            ElementSource::Method(source) => source.dependency_definitions(),
            ElementSource::PreConstructed(_) => Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ElementSource::Class(_) => "class",
            ElementSource::Method(_) => "method",
            ElementSource::PreConstructed(_) => "pre-constructed",
        }
    }
}

impl fmt::Debug for ElementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementSource::Class(source) => f.debug_tuple("Class").field(&source.constructor).finish(),
            ElementSource::Method(source) => f
                .debug_struct("Method")
                .field("method", &source.method.name())
                .field("parent", &source.parent_name)
                .finish(),
            ElementSource::PreConstructed(_) => f.write_str("PreConstructed"),
        }
    }
}

/// Source backed by the selected constructor.
pub struct ClassElementSource {
    constructor: Arc<ConstructorDescriptor>,
}

impl ClassElementSource {
    pub fn new(constructor: Arc<ConstructorDescriptor>) -> Self {
        Self { constructor }
    }

    #[inline]
    pub fn constructor(&self) -> &Arc<ConstructorDescriptor> {
        &self.constructor
    }

    pub fn dependency_definitions(&self) -> Vec<DependencyDefinition> {
        DependencyDefinition::for_constructor(&self.constructor)
    }
}

/// Source backed by an instance method of another element.
///
/// The parent is held weakly: the produced element does not keep its
/// parent alive, the container does.
pub struct MethodElementSource {
    method: Arc<MethodDescriptor>,
    parent: Weak<ElementContext>,
    parent_name: String,
}

impl MethodElementSource {
    pub fn new(method: Arc<MethodDescriptor>, parent: &Arc<ElementContext>) -> Self {
        Self {
            method,
            parent: Arc::downgrade(parent),
            parent_name: parent.name().to_string(),
        }
    }

    #[inline]
    pub fn method(&self) -> &Arc<MethodDescriptor> {
        &self.method
    }

    /// The parent context, `None` once it has been dropped.
    #[inline]
    pub fn parent(&self) -> Option<Arc<ElementContext>> {
        self.parent.upgrade()
    }

    #[inline]
    pub fn parent_name(&self) -> &str {
        &self.parent_name
    }

    pub fn dependency_definitions(&self) -> Vec<DependencyDefinition> {
        DependencyDefinition::for_method(&self.method)
    }
}

enum PreConstructed {
    Value(Instance),
    /// The container itself, bound late so it does not own itself.
    Container(Weak<ContainerInner>),
}

/// Source holding an existing instance.
pub struct PreConstructedElementSource {
    value: PreConstructed,
}

impl PreConstructedElementSource {
    pub fn new(instance: Instance) -> Self {
        Self {
            value: PreConstructed::Value(instance),
        }
    }

    pub(crate) fn container(inner: &Arc<ContainerInner>) -> Self {
        Self {
            value: PreConstructed::Container(Arc::downgrade(inner)),
        }
    }

    /// Whether the instance is the same on every call and may be cached.
    #[inline]
    pub(crate) fn is_cacheable(&self) -> bool {
        matches!(self.value, PreConstructed::Value(_))
    }

    pub(crate) fn instance(&self) -> Result<Instance> {
        match &self.value {
            PreConstructed::Value(instance) => Ok(Arc::clone(instance)),
            PreConstructed::Container(inner) => inner
                .upgrade()
                .map(|inner| Arc::new(ElementsContainer::from_inner(inner)) as Instance)
                .ok_or_else(|| DiError::creation_failed::<ElementsContainer>("container has been dropped")),
        }
    }
}
