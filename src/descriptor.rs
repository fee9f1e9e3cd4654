//! Type descriptors
//!
//! Rust has no runtime reflection, so every type taking part in element
//! discovery describes itself: its kind, module path, tags, constructors,
//! injectable fields and methods. Descriptors are built once with
//! [`TypeDescriptor::class`] (or [`TypeDescriptor::interface`]) and are
//! immutable afterwards.
//!
//! # Example
//!
//! ```rust
//! use element_injector::{Constructor, Describe, Injected, Field, Parameter, TypeDescriptor, tags};
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct SystemClock;
//!
//! impl Clock for SystemClock {
//!     fn now(&self) -> u64 { 42 }
//! }
//!
//! struct Greeter {
//!     prefix: String,
//!     clock: Injected<dyn Clock>,
//! }
//!
//! impl Describe for Greeter {
//!     fn describe() -> TypeDescriptor {
//!         TypeDescriptor::class::<Greeter>()
//!             .tag(tags::element().named("greeter"))
//!             .constructor(
//!                 Constructor::public()
//!                     .param(Parameter::of::<String>().tag(tags::inject_property("greeting.prefix"))),
//!                 |args| Ok(Greeter { prefix: (*args.get::<String>(0)?).clone(), clock: Injected::new() }),
//!             )
//!             .field(Field::named("clock").tag(tags::inject()), |g: &Greeter| &g.clock)
//!             .build()
//!     }
//! }
//!
//! let descriptor = Greeter::describe();
//! assert_eq!(descriptor.constructors().len(), 1);
//! assert_eq!(descriptor.fields().len(), 1);
//! ```

use crate::{DiError, Injected, Result, Tag, Tagged};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased element instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// The universal supertype: every described concrete type is assignable to it.
pub type AnyElement = dyn Any + Send + Sync;

/// Types that can produce their own descriptor.
///
/// Implemented by hand with the builders in this module, or generated by
/// `#[derive(Element)]` with the `derive` feature.
pub trait Describe: Send + Sync + 'static {
    fn describe() -> TypeDescriptor;
}

// =============================================================================
// TypeKey
// =============================================================================

/// Identity of a Rust type, sized or not.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name as reported by `std::any::type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Module path of a type name: generics and `dyn` stripped, last segment removed.
pub(crate) fn package_of(type_name: &str) -> &str {
    let path = type_name.strip_prefix("dyn ").unwrap_or(type_name);
    let end = path.find(['<', ' ']).unwrap_or(path.len());
    let path = &path[..end];
    match path.rfind("::") {
        Some(idx) => &path[..idx],
        None => "",
    }
}

// =============================================================================
// Kinds and visibility
// =============================================================================

/// What sort of type a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeKind {
    /// Concrete, instantiable type
    #[default]
    Class,
    /// Trait object type
    Interface,
    Abstract,
    /// A type that is itself a tag type
    Tag,
    Enum,
}

impl TypeKind {
    #[inline]
    pub fn is_instantiable(&self) -> bool {
        matches!(self, TypeKind::Class)
    }

    /// Article + noun, for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TypeKind::Class => "a class",
            TypeKind::Interface => "an interface",
            TypeKind::Abstract => "abstract",
            TypeKind::Tag => "a tag type",
            TypeKind::Enum => "an enumeration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Crate,
    Private,
}

impl Visibility {
    #[inline]
    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}

// =============================================================================
// Resolved values and arguments
// =============================================================================

type CastFn = Arc<dyn Fn(&Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

#[derive(Clone)]
struct Cast {
    target: TypeKey,
    cast: CastFn,
}

/// A resolved dependency: the instance plus the descriptor of its type.
#[derive(Clone)]
pub struct Resolved {
    instance: Instance,
    ty: Arc<TypeDescriptor>,
}

impl Resolved {
    #[inline]
    pub fn new(instance: Instance, ty: Arc<TypeDescriptor>) -> Self {
        Self { instance, ty }
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    /// View the instance as `T`: its own type, an implemented trait object
    /// or [`AnyElement`].
    pub fn cast<T: ?Sized + 'static>(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        self.ty
            .cast_instance(&self.instance, &key)
            .and_then(|boxed| boxed.downcast::<Arc<T>>().ok())
            .map(|boxed| *boxed)
            .ok_or_else(|| DiError::type_mismatch(key.name(), self.ty.name()))
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved").field("type", &self.ty.name()).finish()
    }
}

/// Positional arguments handed to constructor and method bodies.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Resolved>,
}

impl Args {
    #[inline]
    pub fn new(values: Vec<Resolved>) -> Self {
        Self { values }
    }

    /// No arguments.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Argument `index` viewed as `T`.
    pub fn get<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>> {
        match self.values.get(index) {
            Some(value) => value.cast::<T>(),
            None => Err(DiError::type_mismatch(
                format!("argument {index} of type {}", std::any::type_name::<T>()),
                format!("{} arguments", self.values.len()),
            )),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[Resolved] {
        &self.values
    }
}

// =============================================================================
// Parameters, constructors, fields, methods
// =============================================================================

/// A constructor or method parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: Option<String>,
    required: TypeKey,
    tags: Vec<Tag>,
}

impl Parameter {
    /// Parameter requiring a `T` (a concrete type, trait object or [`AnyElement`]).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: None,
            required: TypeKey::of::<T>(),
            tags: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn required(&self) -> TypeKey {
        self.required
    }
}

impl Tagged for Parameter {
    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn target_name(&self) -> String {
        match &self.name {
            Some(name) => format!("parameter {name}: {}", self.required),
            None => format!("parameter of type {}", self.required),
        }
    }
}

type ConstructorFn = Arc<dyn Fn(&Args) -> Result<Instance> + Send + Sync>;

/// Builder input for a constructor.
#[derive(Debug, Clone, Default)]
pub struct Constructor {
    visibility: Visibility,
    params: Vec<Parameter>,
    tags: Vec<Tag>,
}

impl Constructor {
    pub fn public() -> Self {
        Self::with_visibility(Visibility::Public)
    }

    pub fn private() -> Self {
        Self::with_visibility(Visibility::Private)
    }

    pub fn with_visibility(visibility: Visibility) -> Self {
        Self {
            visibility,
            ..Self::default()
        }
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }
}

/// A constructor of a described type.
pub struct ConstructorDescriptor {
    declaring: &'static str,
    visibility: Visibility,
    params: Vec<Parameter>,
    tags: Vec<Tag>,
    body: ConstructorFn,
}

impl ConstructorDescriptor {
    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    #[inline]
    pub fn declaring_type(&self) -> &'static str {
        self.declaring
    }

    /// Run the constructor body.
    pub fn instantiate(&self, args: &Args) -> Result<Instance> {
        (self.body)(args)
    }
}

impl Tagged for ConstructorDescriptor {
    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn target_name(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.required.name()).collect();
        format!("constructor {}({})", self.declaring, params.join(", "))
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target_name())
    }
}

type InjectFn = Arc<dyn Fn(&Instance, &Resolved) -> Result<()> + Send + Sync>;

/// Builder input for a field.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    tags: Vec<Tag>,
}

impl Field {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }
}

/// A field of a described type.
///
/// Instance fields are backed by an [`Injected`] slot and can be written
/// once after construction.
pub struct FieldDescriptor {
    declaring: &'static str,
    name: String,
    required: TypeKey,
    is_static: bool,
    tags: Vec<Tag>,
    inject: Option<InjectFn>,
}

impl FieldDescriptor {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn required(&self) -> TypeKey {
        self.required
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline]
    pub fn declaring_type(&self) -> &'static str {
        self.declaring
    }

    /// Write `value` into this field of `target`.
    pub fn inject(&self, target: &Instance, value: &Resolved) -> Result<()> {
        match &self.inject {
            Some(inject) => inject(target, value),
            None => Err(DiError::CreationFailed {
                type_name: self.declaring.to_string(),
                reason: format!("static field {} cannot be injected", self.name),
            }),
        }
    }
}

impl Tagged for FieldDescriptor {
    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn target_name(&self) -> String {
        format!("field {}::{}", self.declaring, self.name)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("static", &self.is_static)
            .finish()
    }
}

type InvokeFn = Arc<dyn Fn(&Instance, &Args) -> Result<Option<Instance>> + Send + Sync>;

/// Builder input for a method.
#[derive(Debug, Clone)]
pub struct Method {
    name: String,
    visibility: Visibility,
    params: Vec<Parameter>,
    tags: Vec<Tag>,
}

impl Method {
    pub fn public(name: impl Into<String>) -> Self {
        Self::with_visibility(name, Visibility::Public)
    }

    pub fn private(name: impl Into<String>) -> Self {
        Self::with_visibility(name, Visibility::Private)
    }

    pub fn with_visibility(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            visibility,
            params: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }
}

/// A method of a described type.
pub struct MethodDescriptor {
    declaring: &'static str,
    name: String,
    visibility: Visibility,
    is_static: bool,
    is_abstract: bool,
    params: Vec<Parameter>,
    tags: Vec<Tag>,
    returns: Option<Arc<TypeDescriptor>>,
    invoke: Option<InvokeFn>,
}

impl MethodDescriptor {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    #[inline]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Descriptor of the returned type, `None` for methods returning nothing.
    #[inline]
    pub fn returns(&self) -> Option<&Arc<TypeDescriptor>> {
        self.returns.as_ref()
    }

    #[inline]
    pub fn declaring_type(&self) -> &'static str {
        self.declaring
    }

    /// Invoke on `target`. Returns the produced value for non-void methods.
    pub fn invoke(&self, target: &Instance, args: &Args) -> Result<Option<Instance>> {
        match &self.invoke {
            Some(invoke) => invoke(target, args),
            None => Err(DiError::CreationFailed {
                type_name: self.declaring.to_string(),
                reason: format!("abstract method {} has no body", self.name),
            }),
        }
    }
}

impl Tagged for MethodDescriptor {
    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn target_name(&self) -> String {
        format!("method {}::{}", self.declaring, self.name)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("declaring", &self.declaring)
            .field("visibility", &self.visibility)
            .field("static", &self.is_static)
            .field("abstract", &self.is_abstract)
            .field("returns", &self.returns.as_ref().map(|r| r.name()))
            .finish()
    }
}

// =============================================================================
// TypeDescriptor
// =============================================================================

/// Everything the framework knows about one type.
pub struct TypeDescriptor {
    key: TypeKey,
    package: String,
    kind: TypeKind,
    enclosing: Option<&'static str>,
    tags: Vec<Tag>,
    constructors: Vec<Arc<ConstructorDescriptor>>,
    fields: Vec<Arc<FieldDescriptor>>,
    methods: Vec<Arc<MethodDescriptor>>,
    casts: Vec<Cast>,
}

impl TypeDescriptor {
    /// Start describing a concrete type.
    pub fn class<T: Send + Sync + 'static>() -> TypeDescriptorBuilder<T> {
        let mut builder = TypeDescriptorBuilder::<T>::new(TypeKind::Class);
        builder.descriptor.casts.push(Cast {
            target: TypeKey::of::<T>(),
            cast: Arc::new(|instance: &Instance| {
                Arc::clone(instance)
                    .downcast::<T>()
                    .ok()
                    .map(|typed| Box::new(typed) as Box<dyn Any + Send + Sync>)
            }),
        });
        builder.descriptor.casts.push(Cast {
            target: TypeKey::of::<AnyElement>(),
            cast: Arc::new(|instance: &Instance| {
                Some(Box::new(Arc::clone(instance)) as Box<dyn Any + Send + Sync>)
            }),
        });
        builder
    }

    /// Start describing a trait object type. Interfaces are never instantiated.
    pub fn interface<T: ?Sized + 'static>() -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder::new(TypeKind::Interface)
    }

    /// Descriptor of a concrete type with no metadata besides its identity.
    pub fn opaque<T: Send + Sync + 'static>() -> Self {
        Self::class::<T>().build()
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Full type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    /// Last path segment of the name, generics included.
    pub fn simple_name(&self) -> &'static str {
        let name = self.key.name();
        let end = name.find('<').unwrap_or(name.len());
        match name[..end].rfind("::") {
            Some(idx) => &name[idx + 2..],
            None => name,
        }
    }

    /// Module path the type lives in.
    #[inline]
    pub fn package(&self) -> &str {
        &self.package
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Name of the type this one is nested in.
    #[inline]
    pub fn enclosing(&self) -> Option<&'static str> {
        self.enclosing
    }

    #[inline]
    pub fn constructors(&self) -> &[Arc<ConstructorDescriptor>] {
        &self.constructors
    }

    #[inline]
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    #[inline]
    pub fn methods(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }

    #[inline]
    pub fn is_instantiable(&self) -> bool {
        self.kind.is_instantiable()
    }

    /// Whether instances can be viewed as `key` (the type itself included).
    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        self.casts.iter().any(|c| &c.target == key)
    }

    /// Types this one can be viewed as, excluding itself.
    pub fn supertypes(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.casts
            .iter()
            .map(|c| c.target)
            .filter(move |key| *key != self.key)
    }

    fn cast_instance(&self, instance: &Instance, key: &TypeKey) -> Option<Box<dyn Any + Send + Sync>> {
        self.casts
            .iter()
            .find(|c| &c.target == key)
            .and_then(|c| (c.cast)(instance))
    }
}

impl Tagged for TypeDescriptor {
    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn target_name(&self) -> String {
        format!("type {}", self.key.name())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.key.name())
            .field("package", &self.package)
            .field("kind", &self.kind)
            .field("constructors", &self.constructors.len())
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Fluent builder for a [`TypeDescriptor`].
pub struct TypeDescriptorBuilder<T: ?Sized> {
    descriptor: TypeDescriptor,
    _type: PhantomData<fn(&T)>,
}

impl<T: ?Sized + 'static> TypeDescriptorBuilder<T> {
    fn new(kind: TypeKind) -> Self {
        let key = TypeKey::of::<T>();
        Self {
            descriptor: TypeDescriptor {
                key,
                package: package_of(key.name()).to_string(),
                kind,
                enclosing: None,
                tags: Vec::new(),
                constructors: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                casts: Vec::new(),
            },
            _type: PhantomData,
        }
    }

    /// Override the module path derived from the type name.
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.descriptor.package = package.into();
        self
    }

    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.descriptor.kind = kind;
        self
    }

    /// Declare this type as nested in `O`.
    pub fn nested_in<O: ?Sized + 'static>(mut self) -> Self {
        self.descriptor.enclosing = Some(std::any::type_name::<O>());
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.descriptor.tags.push(tag);
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

impl<T: Send + Sync + 'static> TypeDescriptorBuilder<T> {
    /// Declare that `T` can be viewed as `U`, typically `dyn Trait`.
    pub fn implements<U: ?Sized + Send + Sync + 'static>(mut self, upcast: fn(Arc<T>) -> Arc<U>) -> Self {
        self.descriptor.casts.push(Cast {
            target: TypeKey::of::<U>(),
            cast: Arc::new(move |instance: &Instance| {
                Arc::clone(instance)
                    .downcast::<T>()
                    .ok()
                    .map(|typed| Box::new(upcast(typed)) as Box<dyn Any + Send + Sync>)
            }),
        });
        self
    }

    pub fn constructor<F>(mut self, constructor: Constructor, body: F) -> Self
    where
        F: Fn(&Args) -> Result<T> + Send + Sync + 'static,
    {
        self.descriptor.constructors.push(Arc::new(ConstructorDescriptor {
            declaring: std::any::type_name::<T>(),
            visibility: constructor.visibility,
            params: constructor.params,
            tags: constructor.tags,
            body: Arc::new(move |args| body(args).map(|value| Arc::new(value) as Instance)),
        }));
        self
    }

    /// Instance field backed by an [`Injected`] slot.
    pub fn field<F: ?Sized + Send + Sync + 'static>(mut self, field: Field, slot: fn(&T) -> &Injected<F>) -> Self {
        let declaring = std::any::type_name::<T>();
        let field_name = format!("{}::{}", declaring, field.name);
        self.descriptor.fields.push(Arc::new(FieldDescriptor {
            declaring,
            name: field.name,
            required: TypeKey::of::<F>(),
            is_static: false,
            tags: field.tags,
            inject: Some(Arc::new(move |target: &Instance, value: &Resolved| {
                let target = target
                    .downcast_ref::<T>()
                    .ok_or_else(|| DiError::type_mismatch(declaring, "another element type"))?;
                let value = value.cast::<F>()?;
                slot(target)
                    .set(value)
                    .map_err(|_| DiError::FieldAlreadyInjected {
                        field: field_name.clone(),
                    })
            })),
        }));
        self
    }

    /// Static field of type `F`. Never injected.
    pub fn static_field<F: ?Sized + 'static>(mut self, field: Field) -> Self {
        self.descriptor.fields.push(Arc::new(FieldDescriptor {
            declaring: std::any::type_name::<T>(),
            name: field.name,
            required: TypeKey::of::<F>(),
            is_static: true,
            tags: field.tags,
            inject: None,
        }));
        self
    }

    /// Instance method returning nothing.
    pub fn method<F>(self, method: Method, body: F) -> Self
    where
        F: Fn(&T, &Args) -> Result<()> + Send + Sync + 'static,
    {
        self.push_method(method, false, false, None, Some(Arc::new(move |target, args| {
            body(downcast_target::<T>(target)?, args).map(|_| None)
        })))
    }

    /// Instance method returning an `R`, described opaquely.
    pub fn producer<R, F>(self, method: Method, body: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&T, &Args) -> Result<R> + Send + Sync + 'static,
    {
        self.producer_returning(method, TypeDescriptor::opaque::<R>(), body)
    }

    /// Instance method returning an `R` that describes itself, so the
    /// produced element keeps `R`'s fields, methods and supertypes.
    pub fn described_producer<R, F>(self, method: Method, body: F) -> Self
    where
        R: Describe,
        F: Fn(&T, &Args) -> Result<R> + Send + Sync + 'static,
    {
        self.producer_returning(method, R::describe(), body)
    }

    fn producer_returning<R, F>(self, method: Method, returns: TypeDescriptor, body: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&T, &Args) -> Result<R> + Send + Sync + 'static,
    {
        self.push_method(method, false, false, Some(Arc::new(returns)), Some(Arc::new(move |target, args| {
            body(downcast_target::<T>(target)?, args).map(|value| Some(Arc::new(value) as Instance))
        })))
    }

    /// Associated function (no receiver) returning nothing.
    pub fn static_method<F>(self, method: Method, body: F) -> Self
    where
        F: Fn(&Args) -> Result<()> + Send + Sync + 'static,
    {
        self.push_method(method, true, false, None, Some(Arc::new(move |_target, args| {
            body(args).map(|_| None)
        })))
    }

    /// Method without a body.
    pub fn abstract_method(self, method: Method) -> Self {
        self.push_method(method, false, true, None, None)
    }

    fn push_method(
        mut self,
        method: Method,
        is_static: bool,
        is_abstract: bool,
        returns: Option<Arc<TypeDescriptor>>,
        invoke: Option<InvokeFn>,
    ) -> Self {
        self.descriptor.methods.push(Arc::new(MethodDescriptor {
            declaring: std::any::type_name::<T>(),
            name: method.name,
            visibility: method.visibility,
            is_static,
            is_abstract,
            params: method.params,
            tags: method.tags,
            returns,
            invoke,
        }));
        self
    }
}

fn downcast_target<T: Send + Sync + 'static>(target: &Instance) -> Result<&T> {
    target
        .downcast_ref::<T>()
        .ok_or_else(|| DiError::type_mismatch(std::any::type_name::<T>(), "another element type"))
}
