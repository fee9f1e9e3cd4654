//! Element context assembly
//!
//! Turns scanning results into [`ElementContext`]s. Class assembly selects
//! the constructor; method assembly validates the producer method and links
//! the produced element to its parent.

use crate::{
    AnnotationSource, ClassElementSource, ComposedTagScanner, ConstructorDescriptor, DiError, ElementContext,
    ElementScanningResult, ElementSource, ElementTag, MethodDescriptor, MethodElementSource, Result, Tagged,
    TypeDescriptor, tags,
};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Assembles contexts for element types.
///
/// Constructor selection:
/// - no public constructor: error
/// - one public constructor: that one
/// - several: the single one tagged `ElementConstructor`, error if none or
///   more than one is tagged
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassElementContextAssembler;

impl ClassElementContextAssembler {
    pub fn assemble(&self, element: &ElementTag, ty: &Arc<TypeDescriptor>, scanner: &ComposedTagScanner) -> Result<ElementContext> {
        if !ty.is_instantiable() {
            return Err(DiError::NotInstantiable {
                type_name: ty.name().to_string(),
                kind: ty.kind().describe().to_string(),
            });
        }

        let constructor = Self::select_constructor(ty, scanner)?;
        let name = element
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| ty.name().to_string());

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            element = %name,
            scope = %element.scope(),
            constructor = %constructor.target_name(),
            "Class element assembled"
        );

        Ok(ElementContext::new(
            name,
            Arc::clone(ty),
            element.scope(),
            ElementSource::Class(ClassElementSource::new(constructor)),
        ))
    }

    fn select_constructor(ty: &TypeDescriptor, scanner: &ComposedTagScanner) -> Result<Arc<ConstructorDescriptor>> {
        let public: Vec<&Arc<ConstructorDescriptor>> = ty
            .constructors()
            .iter()
            .filter(|c| c.visibility().is_public())
            .collect();

        match public.as_slice() {
            [] => Err(DiError::NoPublicConstructor {
                type_name: ty.name().to_string(),
            }),
            [only] => Ok(Arc::clone(only)),
            _ => {
                let mut marked = Vec::new();
                for constructor in public {
                    if scanner.contains(&**constructor, &tags::ELEMENT_CONSTRUCTOR)? {
                        marked.push(constructor);
                    }
                }
                match marked.as_slice() {
                    [] => Err(DiError::MultiplePublicConstructors {
                        type_name: ty.name().to_string(),
                    }),
                    [only] => Ok(Arc::clone(only)),
                    _ => Err(DiError::MultipleElementConstructors {
                        type_name: ty.name().to_string(),
                    }),
                }
            }
        }
    }
}

/// Assembles contexts for producer methods.
///
/// The method must be public, non-static, have a body and return a value.
/// The produced element is named after the returned type unless the tag
/// names it.
#[derive(Debug, Default, Clone, Copy)]
pub struct MethodElementContextAssembler;

impl MethodElementContextAssembler {
    pub fn assemble(
        &self,
        element: &ElementTag,
        method: &Arc<MethodDescriptor>,
        parent: &Arc<ElementContext>,
    ) -> Result<ElementContext> {
        let target = method.target_name();
        if !method.visibility().is_public() {
            return Err(DiError::invalid_producer(target, "method is not public"));
        }
        if method.is_static() {
            return Err(DiError::invalid_producer(target, "method is static"));
        }
        if method.is_abstract() {
            return Err(DiError::invalid_producer(target, "method has no body"));
        }
        let Some(returns) = method.returns() else {
            return Err(DiError::invalid_producer(target, "method returns nothing"));
        };

        let name = element
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| returns.name().to_string());

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            element = %name,
            scope = %element.scope(),
            parent = parent.name(),
            method = method.name(),
            "Method element assembled"
        );

        Ok(ElementContext::new(
            name,
            Arc::clone(returns),
            element.scope(),
            ElementSource::Method(MethodElementSource::new(Arc::clone(method), parent)),
        ))
    }
}

/// Assemble any scanning result with the matching assembler.
pub fn assemble_result(
    result: &ElementScanningResult,
    classes: &ClassElementContextAssembler,
    methods: &MethodElementContextAssembler,
    scanner: &ComposedTagScanner,
) -> Result<ElementContext> {
    match result.source() {
        AnnotationSource::Class(ty) => classes.assemble(result.element(), ty, scanner),
        AnnotationSource::Method { method, parent } => methods.assemble(result.element(), method, parent),
    }
}
