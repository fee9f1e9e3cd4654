//! Dependency resolvers
//!
//! Resolvers come in two kinds. Basic resolvers produce a value directly
//! from static data (properties). Element resolvers request another
//! element, which may recursively resolve its own dependencies, so they
//! need the in-flight [`ElementDependencyGraph`] and the dependent context.
//!
//! A [`DependencyResolverChain`] tries its resolvers in order. The first
//! value wins. A lookup miss inside a resolver means "abstain" and the
//! next resolver is tried; every other error aborts the resolution.

use crate::{
    DependencyDefinition, DiError, ElementContext, ElementDependencyGraph, ElementsContainer, Resolved, Result, Tagged,
    TypeDescriptor, TypeKey, properties::split_list, tags,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

static STRING_TYPE: Lazy<Arc<TypeDescriptor>> = Lazy::new(|| Arc::new(TypeDescriptor::opaque::<String>()));
static STRING_LIST_TYPE: Lazy<Arc<TypeDescriptor>> = Lazy::new(|| Arc::new(TypeDescriptor::opaque::<Vec<String>>()));

/// Non-recursive resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicDependencyResolver {
    /// `InjectProperty("name")` sites, resolved from the properties container.
    /// Supports `String` and `Vec<String>` (comma separated list).
    Property,
}

impl BasicDependencyResolver {
    pub fn name(&self) -> &'static str {
        match self {
            BasicDependencyResolver::Property => "PropertyDependencyResolver",
        }
    }

    pub fn resolve(&self, definition: &DependencyDefinition, container: &ElementsContainer) -> Result<Option<Resolved>> {
        match self {
            BasicDependencyResolver::Property => resolve_property(definition, container),
        }
    }
}

/// Recursive resolvers that request other elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementDependencyResolver {
    /// `InjectElement` sites, looked up by the tag's name or the required type's name.
    AnnotatedElement,
    /// Untagged sites, looked up by required type.
    Fallback,
}

impl ElementDependencyResolver {
    pub fn name(&self) -> &'static str {
        match self {
            ElementDependencyResolver::AnnotatedElement => "AnnotatedElementDependencyResolver",
            ElementDependencyResolver::Fallback => "FallbackDependencyResolver",
        }
    }

    pub fn resolve(
        &self,
        definition: &DependencyDefinition,
        dependent: &ElementContext,
        graph: &mut ElementDependencyGraph,
        container: &ElementsContainer,
    ) -> Result<Option<Resolved>> {
        let target = match self {
            ElementDependencyResolver::AnnotatedElement => {
                let scanner = container.tag_scanner();
                let Some(tag) = scanner.scan_one_strict(definition, &tags::INJECT_ELEMENT)? else {
                    return Ok(None);
                };

                let name = tag
                    .str_attribute("name")
                    .filter(|n| !n.is_empty())
                    .unwrap_or(definition.required().name());
                let target = container.element_context(name)?;

                if !target.descriptor().is_assignable_to(&definition.required()) {
                    return Err(DiError::type_mismatch(
                        definition.required().name(),
                        format!("element {} of type {}", target.name(), target.descriptor().name()),
                    ));
                }
                target
            }
            ElementDependencyResolver::Fallback => {
                let scanner = container.tag_scanner();
                if scanner.contains(definition, &tags::INJECT_ELEMENT)? || scanner.contains(definition, &tags::INJECT_PROPERTY)? {
                    return Ok(None);
                }
                container.element_context_by_type(&definition.required())?
            }
        };

        graph.add_dependency(dependent.name(), target.name())?;
        target.request(graph).map(Some)
    }
}

/// A resolver of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyResolver {
    Basic(BasicDependencyResolver),
    Element(ElementDependencyResolver),
}

impl DependencyResolver {
    pub fn name(&self) -> &'static str {
        match self {
            DependencyResolver::Basic(resolver) => resolver.name(),
            DependencyResolver::Element(resolver) => resolver.name(),
        }
    }
}

/// Ordered list of resolvers tried until one produces a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyResolverChain {
    resolvers: Vec<DependencyResolver>,
}

impl DependencyResolverChain {
    pub fn new(resolvers: Vec<DependencyResolver>) -> Self {
        Self { resolvers }
    }

    /// Constructor and producer method parameters: annotated element,
    /// property, then fallback by type.
    pub fn parameters() -> Self {
        Self::new(vec![
            DependencyResolver::Element(ElementDependencyResolver::AnnotatedElement),
            DependencyResolver::Basic(BasicDependencyResolver::Property),
            DependencyResolver::Element(ElementDependencyResolver::Fallback),
        ])
    }

    /// Fields: annotated element, then property. Untagged fields are never resolved.
    pub fn fields() -> Self {
        Self::new(vec![
            DependencyResolver::Element(ElementDependencyResolver::AnnotatedElement),
            DependencyResolver::Basic(BasicDependencyResolver::Property),
        ])
    }

    #[inline]
    pub fn resolvers(&self) -> &[DependencyResolver] {
        &self.resolvers
    }

    pub fn resolve(
        &self,
        definition: &DependencyDefinition,
        dependent: &ElementContext,
        graph: &mut ElementDependencyGraph,
        container: &ElementsContainer,
    ) -> Result<Resolved> {
        for resolver in &self.resolvers {
            let attempt = match resolver {
                DependencyResolver::Basic(basic) => basic.resolve(definition, container),
                DependencyResolver::Element(element) => element.resolve(definition, dependent, graph, container),
            };

            match attempt {
                Ok(Some(resolved)) => {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "element_injector",
                        element = dependent.name(),
                        site = %definition.target_name(),
                        resolver = resolver.name(),
                        "Dependency resolved"
                    );
                    return Ok(resolved);
                }
                Ok(None) => {}
                Err(e) if e.is_lookup_miss() => {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "element_injector",
                        element = dependent.name(),
                        site = %definition.target_name(),
                        resolver = resolver.name(),
                        error = %e,
                        "Resolver could not resolve dependency"
                    );
                    #[cfg(not(feature = "logging"))]
                    let _ = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(DiError::DependencyResolutionFailed {
            site: definition.target_name(),
            required: definition.required().name().to_string(),
            resolvers: self.resolvers.iter().map(DependencyResolver::name).collect(),
        })
    }
}

fn resolve_property(definition: &DependencyDefinition, container: &ElementsContainer) -> Result<Option<Resolved>> {
    let Some(tag) = container
        .tag_scanner()
        .scan_one_strict(definition, &tags::INJECT_PROPERTY)?
    else {
        return Ok(None);
    };

    let name = tag
        .str_attribute("value")
        .filter(|n| !n.is_empty())
        .ok_or_else(|| DiError::InvalidElementTag {
            target: definition.target_name(),
            reason: "InjectProperty requires a property name".to_string(),
        })?;

    let properties = container.properties();
    let required = definition.required();

    if required == TypeKey::of::<String>() {
        let value = properties.property_value(name)?;
        Ok(Some(Resolved::new(Arc::new(value), Arc::clone(&STRING_TYPE))))
    } else if required == TypeKey::of::<Vec<String>>() {
        let value = properties.property_value(name)?;
        Ok(Some(Resolved::new(Arc::new(split_list(&value)), Arc::clone(&STRING_LIST_TYPE))))
    } else {
        Err(DiError::type_mismatch(required.name(), "property value (String or Vec<String>)"))
    }
}
