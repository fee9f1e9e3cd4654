//! Bootstrap scenarios through `ElementsInitializationProcess`.

use element_injector::config::{ROOT_SCANNING_ENABLED, SCAN_CLASSES};
use element_injector::{
    Args, Constructor, ContextBundle, DiError, ElementScope, ElementsContainer, ElementsInitializationProcess, Field,
    InitializationInput, Injected, Method, Parameter, PreConstructedElement, ProfilesContainer, PropertiesContainer,
    Tag, TagDescriptor, TagKey, TypeDescriptor, TypeRegistry, tags,
};
use std::any::type_name;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn try_bootstrap(
    registry: TypeRegistry,
    properties: PropertiesContainer,
    input: InitializationInput,
) -> element_injector::Result<ElementsContainer> {
    ElementsInitializationProcess::new(registry, properties, ProfilesContainer::default())
        .initialize(input, ContextBundle::default())
}

fn bootstrap(registry: TypeRegistry, properties: PropertiesContainer, input: InitializationInput) -> ElementsContainer {
    try_bootstrap(registry, properties, input).unwrap()
}

fn assert_cycle_through<A, B>(result: element_injector::Result<ElementsContainer>) {
    match result {
        Err(DiError::CircularDependency { path }) => {
            assert!(path.iter().any(|p| p == type_name::<A>()), "{path:?}");
            assert!(path.iter().any(|p| p == type_name::<B>()), "{path:?}");
        }
        other => panic!("expected a circular dependency, got {:?}", other.map(|_| ())),
    }
}

// =============================================================================
// Cycles
// =============================================================================

struct X;
struct Y;

#[test]
fn test_constructor_cycle_is_reported() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<X>()
            .tag(tags::element())
            .constructor(Constructor::public().param(Parameter::of::<Y>().tag(tags::inject())), |args: &Args| {
                args.get::<Y>(0)?;
                Ok(X)
            })
            .build(),
    );
    registry.register_descriptor(
        TypeDescriptor::class::<Y>()
            .tag(tags::element())
            .constructor(Constructor::public().param(Parameter::of::<X>().tag(tags::inject())), |args: &Args| {
                args.get::<X>(0)?;
                Ok(Y)
            })
            .build(),
    );

    let result = try_bootstrap(registry, PropertiesContainer::new(), InitializationInput::new().root::<X>());
    assert_cycle_through::<X, Y>(result);
}

struct Ping {
    pong: Injected<Pong>,
}

struct Pong {
    ping: Injected<Ping>,
}

#[test]
fn test_field_injection_cycle_is_reported() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<Ping>()
            .tag(tags::element())
            .constructor(Constructor::public(), |_| Ok(Ping { pong: Injected::new() }))
            .field(Field::named("pong").tag(tags::inject()), |p: &Ping| &p.pong)
            .build(),
    );
    registry.register_descriptor(
        TypeDescriptor::class::<Pong>()
            .tag(tags::element())
            .constructor(Constructor::public(), |_| Ok(Pong { ping: Injected::new() }))
            .field(Field::named("ping").tag(tags::inject()), |p: &Pong| &p.ping)
            .build(),
    );

    let result = try_bootstrap(registry, PropertiesContainer::new(), InitializationInput::new().root::<Ping>());
    assert_cycle_through::<Ping, Pong>(result);
}

#[allow(dead_code)]
struct Pool {
    size: Arc<usize>,
}

#[test]
fn test_parent_depending_on_its_producer_is_a_cycle() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<Pool>()
            .tag(tags::element().named("pool"))
            .constructor(
                Constructor::public().param(Parameter::of::<usize>().tag(tags::inject_named("pool-size"))),
                |args: &Args| Ok(Pool { size: args.get::<usize>(0)? }),
            )
            .producer(Method::public("size").tag(tags::element().named("pool-size")), |_p: &Pool, _args| {
                Ok(4usize)
            })
            .build(),
    );

    match try_bootstrap(registry, PropertiesContainer::new(), InitializationInput::new().root::<Pool>()) {
        Err(DiError::CircularDependency { path }) => {
            assert!(path.iter().any(|p| p == "pool"), "{path:?}");
            assert!(path.iter().any(|p| p == "pool-size"), "{path:?}");
        }
        other => panic!("expected a circular dependency, got {:?}", other.map(|_| ())),
    }
}

struct Left;
struct Right;
struct LeftDelay;
struct RightDelay;

fn racing_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<LeftDelay>()
            .tag(tags::element().scoped(ElementScope::Prototype))
            .constructor(Constructor::public(), |_| {
                thread::sleep(Duration::from_millis(50));
                Ok(LeftDelay)
            })
            .build(),
    );
    registry.register_descriptor(
        TypeDescriptor::class::<RightDelay>()
            .tag(tags::element().scoped(ElementScope::Prototype))
            .constructor(Constructor::public(), |_| {
                thread::sleep(Duration::from_millis(50));
                Ok(RightDelay)
            })
            .build(),
    );
    registry.register_descriptor(
        TypeDescriptor::class::<Left>()
            .tag(tags::element())
            .constructor(
                Constructor::public()
                    .param(Parameter::of::<LeftDelay>())
                    .param(Parameter::of::<Right>().tag(tags::inject())),
                |args: &Args| {
                    args.get::<Right>(1)?;
                    Ok(Left)
                },
            )
            .build(),
    );
    registry.register_descriptor(
        TypeDescriptor::class::<Right>()
            .tag(tags::element())
            .constructor(
                Constructor::public()
                    .param(Parameter::of::<RightDelay>())
                    .param(Parameter::of::<Left>().tag(tags::inject())),
                |args: &Args| {
                    args.get::<Left>(1)?;
                    Ok(Right)
                },
            )
            .build(),
    );
    registry
}

#[test]
fn test_cycle_reported_when_bootstrapped_from_two_threads() {
    let (tx, rx) = mpsc::channel();
    for root in [type_name::<Left>(), type_name::<Right>()] {
        let tx = tx.clone();
        thread::spawn(move || {
            let result = try_bootstrap(
                racing_registry(),
                PropertiesContainer::new(),
                InitializationInput::new().root_name(root),
            );
            let _ = tx.send(matches!(result, Err(DiError::CircularDependency { .. })));
        });
    }

    for _ in 0..2 {
        let reported = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("bootstrap did not finish");
        assert!(reported);
    }
}

// =============================================================================
// Unresolvable dependencies
// =============================================================================

struct Missing;

struct NeedsMissing;

#[test]
fn test_unresolvable_dependency_fails_bootstrap() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<NeedsMissing>()
            .tag(tags::element())
            .constructor(Constructor::public().param(Parameter::of::<Missing>()), |args: &Args| {
                args.get::<Missing>(0)?;
                Ok(NeedsMissing)
            })
            .build(),
    );

    let result = try_bootstrap(registry, PropertiesContainer::new(), InitializationInput::new().root::<NeedsMissing>());
    assert!(matches!(result, Err(DiError::DependencyResolutionFailed { .. })));
}

// =============================================================================
// Properties
// =============================================================================

struct Configured {
    prop: Injected<String>,
}

#[test]
fn test_property_field_injected() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<Configured>()
            .tag(tags::element())
            .constructor(Constructor::public(), |_| Ok(Configured { prop: Injected::new() }))
            .field(
                Field::named("prop").tag(tags::inject_property("some.cool.prop")),
                |c: &Configured| &c.prop,
            )
            .build(),
    );

    let properties = PropertiesContainer::new().with("some.cool.prop", "123");
    let container = bootstrap(registry, properties, InitializationInput::new().root::<Configured>());

    let configured = container.get_by_type::<Configured>().unwrap();
    assert_eq!(configured.prop.as_str(), "123");
}

// =============================================================================
// Classes scanner
// =============================================================================

struct Extra;
struct Listed;

fn scan_class_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    for descriptor in [
        TypeDescriptor::class::<Extra>()
            .tag(tags::element())
            .constructor(Constructor::public(), |_| Ok(Extra))
            .build(),
        TypeDescriptor::class::<Listed>()
            .tag(tags::element())
            .constructor(Constructor::public(), |_| Ok(Listed))
            .build(),
    ] {
        registry.register_descriptor(descriptor);
    }
    registry
}

#[test]
fn test_classes_scanner_skips_unregistered_names() {
    let properties = PropertiesContainer::new()
        .with(ROOT_SCANNING_ENABLED, "false")
        .with(SCAN_CLASSES, format!("{}, {}::Missing", type_name::<Extra>(), module_path!()));
    let container = bootstrap(scan_class_registry(), properties, InitializationInput::new());

    assert!(container.contains(type_name::<Extra>()));
    assert!(!container.contains(type_name::<Listed>()));
}

#[test]
fn test_classes_scanner_merges_suffixed_keys() {
    let properties = PropertiesContainer::new()
        .with(ROOT_SCANNING_ENABLED, "false")
        .with(SCAN_CLASSES, type_name::<Extra>())
        .with(format!("{SCAN_CLASSES}-more"), type_name::<Listed>());
    let container = bootstrap(scan_class_registry(), properties, InitializationInput::new());

    assert!(container.contains(type_name::<Extra>()));
    assert!(container.contains(type_name::<Listed>()));
}

// =============================================================================
// Producer methods and pre-constructed elements
// =============================================================================

struct ServerConfig;

struct Server {
    port: u16,
    banner: Arc<String>,
}

#[test]
fn test_producer_method_and_pre_constructed_inputs() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<ServerConfig>()
            .tag(tags::element())
            .constructor(Constructor::public(), |_| Ok(ServerConfig))
            .producer(Method::public("port").tag(tags::element().named("port")), |_c: &ServerConfig, _args| {
                Ok(8080u16)
            })
            .build(),
    );
    registry.register_descriptor(
        TypeDescriptor::class::<Server>()
            .tag(tags::element())
            .constructor(
                Constructor::public()
                    .param(Parameter::of::<u16>().tag(tags::inject_named("port")))
                    .param(Parameter::of::<String>().tag(tags::inject_named("banner"))),
                |args: &Args| {
                    Ok(Server {
                        port: *args.get::<u16>(0)?,
                        banner: args.get::<String>(1)?,
                    })
                },
            )
            .build(),
    );

    let input = InitializationInput::new()
        .root::<Server>()
        .pre_constructed(PreConstructedElement::value(String::from("welcome")).named("banner"));
    let container = bootstrap(registry, PropertiesContainer::new(), input);

    let server = container.get_by_type::<Server>().unwrap();
    assert_eq!(server.port, 8080);
    assert_eq!(server.banner.as_str(), "welcome");
    assert!(Arc::ptr_eq(&server.banner, &container.get::<String>("banner").unwrap()));
}

struct Settings {
    port: u16,
}

#[test]
fn test_producer_follows_overridden_parent() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<Settings>()
            .tag(tags::element().named("settings"))
            .constructor(Constructor::public(), |_| Ok(Settings { port: 8080 }))
            .producer(Method::public("port").tag(tags::element().named("port")), |s: &Settings, _args| {
                Ok(s.port)
            })
            .build(),
    );

    let input = InitializationInput::new()
        .root::<Settings>()
        .pre_constructed(PreConstructedElement::value(Settings { port: 9090 }).named("settings").overriding());
    let container = bootstrap(registry, PropertiesContainer::new(), input);

    assert_eq!(container.get::<Settings>("settings").unwrap().port, 9090);
    assert_eq!(*container.get::<u16>("port").unwrap(), 9090);
}

// =============================================================================
// Resolution by type
// =============================================================================

trait Greeter: Send + Sync {
    fn greet(&self) -> &'static str;
}

struct English;
struct French;

impl Greeter for English {
    fn greet(&self) -> &'static str {
        "hello"
    }
}

impl Greeter for French {
    fn greet(&self) -> &'static str {
        "bonjour"
    }
}

struct Host {
    greeter: Arc<dyn Greeter>,
    container: Arc<ElementsContainer>,
}

fn greeter_registry(with_french: bool) -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<Host>()
            .tag(tags::element())
            .constructor(
                Constructor::public()
                    .param(Parameter::of::<dyn Greeter>())
                    .param(Parameter::of::<ElementsContainer>()),
                |args: &Args| {
                    Ok(Host {
                        greeter: args.get::<dyn Greeter>(0)?,
                        container: args.get::<ElementsContainer>(1)?,
                    })
                },
            )
            .build(),
    );
    registry.register_descriptor(
        TypeDescriptor::class::<English>()
            .tag(tags::element())
            .implements::<dyn Greeter>(|e| e)
            .constructor(Constructor::public(), |_| Ok(English))
            .build(),
    );
    if with_french {
        registry.register_descriptor(
            TypeDescriptor::class::<French>()
                .tag(tags::element())
                .implements::<dyn Greeter>(|f| f)
                .constructor(Constructor::public(), |_| Ok(French))
                .build(),
        );
    }
    registry
}

#[test]
fn test_untagged_parameters_resolve_by_type() {
    let container = bootstrap(greeter_registry(false), PropertiesContainer::new(), InitializationInput::new().root::<Host>());

    let host = container.get_by_type::<Host>().unwrap();
    assert_eq!(host.greeter.greet(), "hello");
    assert!(host.container.ptr_eq(&container));
}

#[test]
fn test_ambiguous_fallback_fails_bootstrap() {
    let result = try_bootstrap(greeter_registry(true), PropertiesContainer::new(), InitializationInput::new().root::<Host>());

    assert!(matches!(result, Err(DiError::AmbiguousElementType { .. })));
}

// =============================================================================
// Composed tags, assembly errors, concurrency
// =============================================================================

const SERVICE: TagKey = TagKey::from_static("initialization::Service");

struct Mailer;

#[test]
fn test_composed_element_tag_discovered() {
    let mut registry = TypeRegistry::new();
    registry.register_tag(TagDescriptor::new(SERVICE).tag(tags::element()));
    registry.register_descriptor(
        TypeDescriptor::class::<Mailer>()
            .tag(Tag::new(SERVICE))
            .constructor(Constructor::public(), |_| Ok(Mailer))
            .build(),
    );

    let container = bootstrap(registry, PropertiesContainer::new(), InitializationInput::new().root::<Mailer>());
    assert!(container.get_by_type::<Mailer>().is_ok());
}

struct Ambiguous;

#[test]
fn test_assembly_errors_abort_bootstrap() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<Ambiguous>()
            .tag(tags::element())
            .constructor(Constructor::public(), |_| Ok(Ambiguous))
            .constructor(Constructor::public().param(Parameter::of::<u8>()), |_| Ok(Ambiguous))
            .build(),
    );

    let result = ElementsInitializationProcess::new(registry, PropertiesContainer::new(), ProfilesContainer::default())
        .initialize(InitializationInput::new().root::<Ambiguous>(), ContextBundle::default());
    assert!(matches!(result, Err(DiError::MultiplePublicConstructors { .. })));
}

static CONSTRUCTED: AtomicU32 = AtomicU32::new(0);

struct Shared;

#[test]
fn test_singleton_shared_across_threads() {
    let mut registry = TypeRegistry::new();
    registry.register_descriptor(
        TypeDescriptor::class::<Shared>()
            .tag(tags::element())
            .constructor(Constructor::public(), |_| {
                CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(5));
                Ok(Shared)
            })
            .build(),
    );
    let container = bootstrap(registry, PropertiesContainer::new(), InitializationInput::new().root::<Shared>());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || container.get_by_type::<Shared>().unwrap())
        })
        .collect();
    let instances: Vec<Arc<Shared>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}
