//! Error types for element discovery, assembly and resolution

use thiserror::Error;

/// Errors that can occur while discovering, assembling, resolving or
/// initializing elements.
///
/// Every variant is fatal to the bootstrap that raised it. The lookup
/// misses (see [`DiError::is_lookup_miss`]) are the only kind a resolver
/// swallows and treats as "this resolver abstains".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    // ---------------------------------------------------------------------
    // Assembly
    // ---------------------------------------------------------------------
    /// The type is an interface, abstract type, tag type or enumeration
    #[error("Type {type_name} cannot be instantiated: it is {kind}")]
    NotInstantiable { type_name: String, kind: String },

    /// The type declares no public constructor
    #[error("Type {type_name} has no public constructor")]
    NoPublicConstructor { type_name: String },

    /// Several public constructors and none marked as the element constructor
    #[error(
        "Type {type_name} has multiple public constructors; mark exactly one with ElementConstructor to disambiguate"
    )]
    MultiplePublicConstructors { type_name: String },

    /// More than one constructor carries the element constructor marker
    #[error("Type {type_name} has multiple constructors marked with ElementConstructor; only one marker is allowed")]
    MultipleElementConstructors { type_name: String },

    /// A producer method is not public, is static or returns nothing
    #[error("Method {method} cannot produce an element: {reason}")]
    InvalidProducerMethod { method: String, reason: String },

    // ---------------------------------------------------------------------
    // Scanning
    // ---------------------------------------------------------------------
    /// Strict scanning found more than one matching tag
    #[error("Multiple {tag} tags scanned on {target}: {found:?}")]
    MultipleTagsScanned {
        target: String,
        tag: String,
        found: Vec<String>,
    },

    /// Composed scanning was asked for a tag from an unsupported package
    #[error("Tag {tag} belongs to an unsupported package and cannot be scanned")]
    UnsupportedTag { tag: String },

    /// An Element tag carries an attribute value that cannot be interpreted
    #[error("Invalid Element tag on {target}: {reason}")]
    InvalidElementTag { target: String, reason: String },

    /// A type name was requested from the registry but never registered
    #[error("Type not registered: {type_name}")]
    TypeNotRegistered { type_name: String },

    // ---------------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------------
    /// Every resolver in the chain abstained
    #[error("Failed to resolve {required} for {site}; tried resolvers {resolvers:?}")]
    DependencyResolutionFailed {
        site: String,
        required: String,
        resolvers: Vec<&'static str>,
    },

    /// A resolved value cannot be viewed as the requested type
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Resolution would re-enter an element already on the current path
    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    // ---------------------------------------------------------------------
    // Container
    // ---------------------------------------------------------------------
    /// An element with the same name is already registered
    #[error("Element name is not unique: {name}")]
    ElementNameNotUnique { name: String },

    /// The container was initialized and no longer accepts modifications
    #[error("Container is initialized - cannot modify element contexts")]
    ContainerLocked,

    /// A one-shot initialization was triggered twice
    #[error("{what} is already initialized")]
    AlreadyInitialized { what: String },

    /// An element was requested before its context was initialized
    #[error("Element context {name} is not initialized")]
    NotInitialized { name: String },

    /// The parent of a producer method element is no longer registered
    #[error("Parent element of {name} is not registered")]
    ParentDropped { name: String },

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------
    /// No element registered under the name
    #[error("Element not found: {name}")]
    ElementNotFound { name: String },

    /// No element is of, or assignable to, the type
    #[error("No element of type {type_name}")]
    ElementTypeNotFound { type_name: String },

    /// Several elements match the type in the same lookup phase
    #[error("Ambiguous element type {type_name}; candidates: {candidates:?}")]
    AmbiguousElementType {
        type_name: String,
        candidates: Vec<String>,
    },

    /// The property is absent from the properties container
    #[error("Property not found: {name}")]
    PropertyNotFound { name: String },

    // ---------------------------------------------------------------------
    // Validation and lifecycle
    // ---------------------------------------------------------------------
    /// One or more post-initialization methods have an invalid signature
    #[error("Invalid post-initialization methods on {type_name}: {}", problems.join("; "))]
    InvalidPostInitialization {
        type_name: String,
        problems: Vec<String>,
    },

    /// A constructor, producer or lifecycle body failed
    #[error("Failed to create {type_name}: {reason}")]
    CreationFailed { type_name: String, reason: String },

    /// An `Injected` slot was written twice
    #[error("Field {field} is already injected")]
    FieldAlreadyInjected { field: String },

    /// A configuration property has a value that cannot be interpreted
    #[error("Invalid configuration {key}={value}: {reason}")]
    InvalidConfiguration {
        key: String,
        value: String,
        reason: String,
    },
}

impl DiError {
    /// Create a CreationFailed error for a type
    #[inline]
    pub fn creation_failed<T: ?Sized + 'static>(reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            type_name: std::any::type_name::<T>().to_string(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error
    #[inline]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an ElementNotFound error
    #[inline]
    pub fn element_not_found(name: impl Into<String>) -> Self {
        Self::ElementNotFound { name: name.into() }
    }

    /// Create an InvalidProducerMethod error
    #[inline]
    pub fn invalid_producer(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProducerMethod {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a not-found lookup a resolver may treat as abstaining.
    ///
    /// Ambiguity is deliberately excluded: an ambiguous type lookup surfaces
    /// to the caller instead of silently falling through the chain.
    #[inline]
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::ElementTypeNotFound { .. }
                | Self::PropertyNotFound { .. }
        )
    }
}

/// Result type alias for element operations
pub type Result<T> = std::result::Result<T, DiError>;
