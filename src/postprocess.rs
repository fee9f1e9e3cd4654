//! Instance post-processing
//!
//! Every freshly constructed instance runs through a
//! [`PostProcessorAggregator`] before it is handed out. The standard
//! pipeline injects tagged fields first and invokes post-initialization
//! methods last, so lifecycle hooks see a fully injected instance.

use crate::{
    Args, DependencyDefinition, DiError, ElementContext, ElementDependencyGraph, ElementEnvironment, Instance,
    MethodDescriptor, Result, tags,
};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// A step applied to every newly constructed instance.
pub trait ElementPostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn post_process(&self, context: &ElementContext, instance: &Instance, env: &ElementEnvironment) -> Result<()>;
}

/// Injects non-static fields tagged `InjectElement` or `InjectProperty`.
///
/// Each field is resolved with its own, empty dependency graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldInjectionPostProcessor;

impl ElementPostProcessor for FieldInjectionPostProcessor {
    fn name(&self) -> &'static str {
        "FieldInjectionPostProcessor"
    }

    fn post_process(&self, context: &ElementContext, instance: &Instance, env: &ElementEnvironment) -> Result<()> {
        let container = env.container()?;
        let scanner = container.tag_scanner();

        for field in context.descriptor().fields() {
            if field.is_static() {
                continue;
            }
            let tagged = scanner.contains(&**field, &tags::INJECT_ELEMENT)?
                || scanner.contains(&**field, &tags::INJECT_PROPERTY)?;
            if !tagged {
                continue;
            }

            let definition = DependencyDefinition::field(field);
            let mut graph = ElementDependencyGraph::new();
            let value = env
                .field_resolvers()
                .resolve(&definition, context, &mut graph, &container)?;
            field.inject(instance, &value)?;

            #[cfg(feature = "logging")]
            debug!(
                target: "element_injector",
                element = context.name(),
                field = field.name(),
                "Field injected"
            );
        }
        Ok(())
    }
}

/// Invokes `PostInitialization` methods.
///
/// Candidates must be public, non-static, non-abstract and take no
/// parameters. All violations are reported together. Returned values are
/// discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostInitializationPostProcessor;

impl PostInitializationPostProcessor {
    pub const NAME: &'static str = "PostInitializationPostProcessor";

    fn problems(method: &MethodDescriptor) -> Vec<String> {
        let mut problems = Vec::new();
        if !method.visibility().is_public() {
            problems.push(format!("method {} is not public", method.name()));
        }
        if method.is_static() {
            problems.push(format!("method {} is static", method.name()));
        }
        if method.is_abstract() {
            problems.push(format!("method {} is abstract", method.name()));
        }
        if !method.params().is_empty() {
            problems.push(format!(
                "method {} takes {} parameters, expected none",
                method.name(),
                method.params().len()
            ));
        }
        problems
    }
}

impl ElementPostProcessor for PostInitializationPostProcessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn post_process(&self, context: &ElementContext, instance: &Instance, env: &ElementEnvironment) -> Result<()> {
        let container = env.container()?;
        let scanner = container.tag_scanner();

        let mut candidates = Vec::new();
        for method in context.descriptor().methods() {
            if scanner.contains(&**method, &tags::POST_INITIALIZATION)? {
                candidates.push(method);
            }
        }

        let problems: Vec<String> = candidates.iter().flat_map(|m| Self::problems(m)).collect();
        if !problems.is_empty() {
            return Err(DiError::InvalidPostInitialization {
                type_name: context.descriptor().name().to_string(),
                problems,
            });
        }

        for method in candidates {
            #[cfg(feature = "logging")]
            if method.returns().is_some() {
                warn!(
                    target: "element_injector",
                    element = context.name(),
                    method = method.name(),
                    "Post-initialization method returns a value; it will be discarded"
                );
            }

            method.invoke(instance, &Args::empty())?;

            #[cfg(feature = "logging")]
            debug!(
                target: "element_injector",
                element = context.name(),
                method = method.name(),
                "Post-initialization method invoked"
            );
        }
        Ok(())
    }
}

/// Ordered post-processors.
#[derive(Clone)]
pub struct PostProcessorAggregator {
    processors: Vec<Arc<dyn ElementPostProcessor>>,
}

impl PostProcessorAggregator {
    /// Field injection, then post-initialization.
    pub fn standard() -> Self {
        Self {
            processors: vec![
                Arc::new(FieldInjectionPostProcessor),
                Arc::new(PostInitializationPostProcessor),
            ],
        }
    }

    /// Add a processor. It runs after field injection and before
    /// post-initialization.
    pub fn with(mut self, processor: Arc<dyn ElementPostProcessor>) -> Self {
        let position = self
            .processors
            .iter()
            .position(|p| p.name() == PostInitializationPostProcessor::NAME)
            .unwrap_or(self.processors.len());
        self.processors.insert(position, processor);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Apply every processor in order.
    pub fn process(&self, context: &ElementContext, instance: &Instance, env: &ElementEnvironment) -> Result<()> {
        for processor in &self.processors {
            processor.post_process(context, instance, env)?;
        }
        Ok(())
    }
}

impl Default for PostProcessorAggregator {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for PostProcessorAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ClassElementSource, Constructor, ElementScope, ElementSource, ElementsContainer, Field, Injected, Method, Parameter,
        PropertiesContainer, TypeDescriptor,
    };
    use std::sync::Mutex;

    struct Marker;

    impl ElementPostProcessor for Marker {
        fn name(&self) -> &'static str {
            "Marker"
        }

        fn post_process(&self, _context: &ElementContext, _instance: &Instance, _env: &ElementEnvironment) -> Result<()> {
            Ok(())
        }
    }

    struct Service {
        prop: Injected<String>,
        untagged: Injected<String>,
        seen: Mutex<Vec<String>>,
    }

    fn service_context(descriptor: TypeDescriptor) -> Arc<ElementContext> {
        let constructor = Arc::clone(&descriptor.constructors()[0]);
        Arc::new(ElementContext::new(
            "service",
            Arc::new(descriptor),
            ElementScope::Singleton,
            ElementSource::Class(ClassElementSource::new(constructor)),
        ))
    }

    fn new_service(_args: &Args) -> Result<Service> {
        Ok(Service {
            prop: Injected::new(),
            untagged: Injected::new(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn bootstrap(context: &Arc<ElementContext>) -> ElementsContainer {
        let container = ElementsContainer::with_properties(PropertiesContainer::new().with("some.cool.prop", "123"));
        container.add_element_context(Arc::clone(context)).unwrap();
        container
            .initialize_element_contexts(PostProcessorAggregator::standard())
            .unwrap();
        container
    }

    #[test]
    fn test_custom_processor_runs_before_post_initialization() {
        let aggregator = PostProcessorAggregator::standard().with(Arc::new(Marker));
        assert_eq!(
            aggregator.names(),
            vec!["FieldInjectionPostProcessor", "Marker", "PostInitializationPostProcessor"]
        );
    }

    #[test]
    fn test_fields_injected_before_post_initialization() {
        let descriptor = TypeDescriptor::class::<Service>()
            .constructor(Constructor::public(), new_service)
            .field(Field::named("prop").tag(tags::inject_property("some.cool.prop")), |s: &Service| &s.prop)
            .field(Field::named("untagged"), |s: &Service| &s.untagged)
            .method(Method::public("ready").tag(tags::post_initialization()), |s: &Service, _args| {
                let value = s.prop.get().map(|v| v.to_string()).unwrap_or_default();
                s.seen.lock().unwrap().push(value);
                Ok(())
            })
            .build();
        let context = service_context(descriptor);
        let container = bootstrap(&context);

        let service = container.get::<Service>("service").unwrap();
        assert_eq!(service.prop.as_str(), "123");
        assert!(!service.untagged.is_injected());
        assert_eq!(*service.seen.lock().unwrap(), vec!["123"]);
    }

    #[test]
    fn test_invalid_post_initialization_collects_all_problems() {
        let descriptor = TypeDescriptor::class::<Service>()
            .constructor(Constructor::public(), new_service)
            .method(
                Method::private("hidden")
                    .param(Parameter::of::<String>())
                    .tag(tags::post_initialization()),
                |_s: &Service, _args| Ok(()),
            )
            .static_method(Method::public("global").tag(tags::post_initialization()), |_args| Ok(()))
            .abstract_method(Method::public("todo").tag(tags::post_initialization()))
            .build();
        let context = service_context(descriptor);
        let container = bootstrap(&context);

        match container.get_instance("service") {
            Err(DiError::InvalidPostInitialization { problems, .. }) => assert_eq!(problems.len(), 4),
            other => panic!("expected invalid post-initialization, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_returned_value_is_discarded() {
        let descriptor = TypeDescriptor::class::<Service>()
            .constructor(Constructor::public(), new_service)
            .producer(Method::public("start").tag(tags::post_initialization()), |_s: &Service, _args| Ok(7u32))
            .build();
        let context = service_context(descriptor);
        let container = bootstrap(&context);
        assert!(container.get_instance("service").is_ok());
    }
}
