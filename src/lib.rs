//! # Element Injector - Tag-Driven Dependency Injection for Rust
//!
//! Discovers injectable components ("elements") in a registry of type
//! descriptors, assembles how to construct them, resolves their dependency
//! graphs and manages singleton and prototype lifecycles.
//!
//! ## Features
//!
//! - **Tag-driven discovery** - types and producer methods carrying an `Element` tag, directly or through composed tags
//! - **Constructor selection** - single public constructor, or the one tagged `ElementConstructor`
//! - **Resolver chain** - by name, by property, then by type, with cycle detection
//! - **Singletons and prototypes** - at-most-once construction under concurrent first access
//! - **Post-processing** - field injection, then post-initialization methods
//! - **Profiles** - elements restricted to active profiles
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use element_injector::{
//!     Args, Constructor, ContextBundle, ElementsInitializationProcess, InitializationInput, Parameter,
//!     ProfilesContainer, PropertiesContainer, TypeDescriptor, TypeRegistry, tags,
//! };
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: std::sync::Arc<Database>,
//! }
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_descriptor(
//!     TypeDescriptor::class::<Database>()
//!         .tag(tags::element())
//!         .constructor(
//!             Constructor::public().param(Parameter::of::<String>().tag(tags::inject_property("db.url"))),
//!             |args: &Args| Ok(Database { url: args.get::<String>(0)?.to_string() }),
//!         )
//!         .build(),
//! );
//! registry.register_descriptor(
//!     TypeDescriptor::class::<UserService>()
//!         .tag(tags::element().named("users"))
//!         .constructor(Constructor::public().param(Parameter::of::<Database>()), |args: &Args| {
//!             Ok(UserService { db: args.get::<Database>(0)? })
//!         })
//!         .build(),
//! );
//!
//! let properties = PropertiesContainer::new().with("db.url", "postgres://localhost");
//! let container = ElementsInitializationProcess::new(registry, properties, ProfilesContainer::default())
//!     .initialize(InitializationInput::new().root::<UserService>(), ContextBundle::default())
//!     .unwrap();
//!
//! let users = container.get::<UserService>("users").unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Scopes
//!
//! Tag an element with `scope = "prototype"` (or [`Tag::scoped`]) to get a
//! fresh instance on every request. Singletons are constructed once, during
//! the bootstrap, so a missing dependency or a cycle fails
//! [`ElementsInitializationProcess::initialize`] rather than a later request.

// Lets generated `::element_injector::` paths resolve inside this crate too.
extern crate self as element_injector;

mod assembly;
mod by_type;
mod composed;
pub mod config;
mod container;
mod context;
mod definition;
mod descriptor;
mod error;
mod filter;
mod graph;
mod injected;
#[cfg(feature = "logging")]
pub mod logging;
mod matcher;
mod postprocess;
mod process;
mod properties;
mod registry;
mod resolver;
mod scanner;
mod scope;
mod source;
mod storage;
mod tag;

pub use assembly::*;
pub use by_type::*;
pub use composed::*;
pub use config::ElementsConfig;
pub use container::*;
pub use context::*;
pub use definition::*;
pub use descriptor::*;
pub use error::*;
pub use filter::*;
pub use graph::*;
pub use injected::*;
pub use matcher::*;
pub use postprocess::*;
pub use process::*;
pub use properties::*;
pub use registry::*;
pub use resolver::*;
pub use scanner::*;
pub use scope::*;
pub use source::*;
pub use tag::*;

#[cfg(feature = "derive")]
pub use element_injector_derive::Element;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Constructor, ContextBundle, Describe, DiError, ElementScope, ElementsContainer,
        ElementsInitializationProcess, Field, InitializationInput, Injected, Method, Parameter, PreConstructedElement,
        ProfilesContainer, PropertiesContainer, Result, TypeDescriptor, TypeRegistry, tags,
    };
    #[cfg(feature = "derive")]
    pub use crate::Element;
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Database {
        url: String,
    }

    struct RequestId(u32);

    fn bootstrap(registry: TypeRegistry) -> ElementsContainer {
        ElementsInitializationProcess::new(
            registry,
            PropertiesContainer::new().with("db.url", "postgres://localhost"),
            ProfilesContainer::default(),
        )
        .initialize(InitializationInput::new().root::<Database>(), ContextBundle::default())
        .unwrap()
    }

    #[test]
    fn test_singleton_constructed_at_bootstrap() {
        static CREATED: AtomicU32 = AtomicU32::new(0);

        let mut registry = TypeRegistry::new();
        registry.register_descriptor(
            TypeDescriptor::class::<Database>()
                .tag(tags::element().named("db"))
                .constructor(
                    Constructor::public().param(Parameter::of::<String>().tag(tags::inject_property("db.url"))),
                    |args: &Args| {
                        CREATED.fetch_add(1, Ordering::SeqCst);
                        Ok(Database {
                            url: args.get::<String>(0)?.to_string(),
                        })
                    },
                )
                .build(),
        );
        let container = bootstrap(registry);
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);

        let first = container.get::<Database>("db").unwrap();
        let second = container.get_by_type::<Database>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.url, "postgres://localhost");
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prototype_creates_new_instance() {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let mut registry = TypeRegistry::new();
        registry.register_descriptor(
            TypeDescriptor::class::<Database>()
                .constructor(Constructor::public(), |_| Ok(Database { url: String::new() }))
                .build(),
        );
        registry.register_descriptor(
            TypeDescriptor::class::<RequestId>()
                .tag(tags::element().scoped(ElementScope::Prototype))
                .constructor(Constructor::public(), |_| {
                    Ok(RequestId(COUNTER.fetch_add(1, Ordering::SeqCst)))
                })
                .build(),
        );
        let container = bootstrap(registry);

        let a = container.get_by_type::<RequestId>().unwrap();
        let b = container.get_by_type::<RequestId>().unwrap();
        assert_ne!(a.0, b.0);
    }
}
