//! Element discovery
//!
//! Class scanners pick candidate types out of the [`TypeRegistry`] and keep
//! those carrying exactly one `Element` tag (directly or composed). The
//! method scanner looks at the methods of already assembled elements for
//! producer methods.
//!
//! | scanner  | candidates |
//! |----------|------------|
//! | root     | root package and sub-packages, or root type and its nested types |
//! | internal | everything under `element_injector`, test modules excluded |
//! | packages | `elements.scan-packages` patterns |
//! | classes  | `elements.scan-classes` and `elements.scan-classes-*` type names |
//!
//! The crate's own elements (the container, the properties and the
//! profiles) are registered as pre-constructed elements by the bootstrap,
//! not discovered. The crate ships no descriptors of its own, so the
//! internal scanner only finds `element_injector` types that the
//! application's [`TypeRegistry`] supplies, and finds nothing otherwise.

use crate::{
    ComposedTagScanner, DiError, ElementContext, ElementScope, ElementSource, ElementsConfig, MethodDescriptor,
    PropertiesContainer, Result, Tag, TagValue, Tagged, TypeDescriptor, TypeRegistry, tags,
};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, error, warn};

/// Root package of the crate's own elements.
pub const INTERNAL_PACKAGE: &str = "element_injector";

/// Module names whose types the internal scanner never picks up.
pub const INTERNAL_TEST_MODULES: [&str; 2] = ["test", "tests"];

// =============================================================================
// Scanning results
// =============================================================================

/// `name` and `scope` read from an `Element` tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementTag {
    name: Option<String>,
    scope: ElementScope,
}

impl ElementTag {
    pub fn new(name: Option<String>, scope: ElementScope) -> Self {
        Self { name, scope }
    }

    /// Interpret `tag` found on `target`.
    pub fn from_tag(tag: &Tag, target: &dyn Tagged) -> Result<Self> {
        let invalid = |reason: String| DiError::InvalidElementTag {
            target: target.target_name(),
            reason,
        };

        let name = match tag.attribute("name") {
            None => None,
            Some(TagValue::Str(name)) if name.trim().is_empty() => None,
            Some(TagValue::Str(name)) => Some(name.trim().to_string()),
            Some(other) => return Err(invalid(format!("name must be a string, found {other}"))),
        };

        let scope = match tag.attribute("scope") {
            None => ElementScope::default(),
            Some(TagValue::Str(scope)) => scope.parse().map_err(invalid)?,
            Some(other) => return Err(invalid(format!("scope must be a string, found {other}"))),
        };

        Ok(Self { name, scope })
    }

    /// Explicit element name, if any.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn scope(&self) -> ElementScope {
        self.scope
    }
}

/// The component an `Element` tag was found on.
#[derive(Debug, Clone)]
pub enum AnnotationSource {
    Class(Arc<TypeDescriptor>),
    /// A producer method, with the element it belongs to
    Method {
        method: Arc<MethodDescriptor>,
        parent: Arc<ElementContext>,
    },
}

impl AnnotationSource {
    /// Identity used to drop duplicate discoveries.
    pub fn identity(&self) -> String {
        match self {
            AnnotationSource::Class(ty) => ty.name().to_string(),
            AnnotationSource::Method { method, parent } => format!("{}#{}", parent.name(), method.name()),
        }
    }
}

/// A discovered element: its tag and where the tag was found.
#[derive(Debug, Clone)]
pub struct ElementScanningResult {
    tag: Tag,
    element: ElementTag,
    source: AnnotationSource,
}

impl ElementScanningResult {
    pub fn class(tag: Tag, ty: Arc<TypeDescriptor>) -> Result<Self> {
        let element = ElementTag::from_tag(&tag, &*ty)?;
        Ok(Self {
            tag,
            element,
            source: AnnotationSource::Class(ty),
        })
    }

    pub fn method(tag: Tag, method: Arc<MethodDescriptor>, parent: Arc<ElementContext>) -> Result<Self> {
        let element = ElementTag::from_tag(&tag, &*method)?;
        Ok(Self {
            tag,
            element,
            source: AnnotationSource::Method { method, parent },
        })
    }

    /// The raw `Element` tag.
    #[inline]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    #[inline]
    pub fn element(&self) -> &ElementTag {
        &self.element
    }

    #[inline]
    pub fn source(&self) -> &AnnotationSource {
        &self.source
    }
}

/// Drop results whose source was already seen, keeping the first.
pub fn dedup_results(results: Vec<ElementScanningResult>) -> Vec<ElementScanningResult> {
    let mut seen = std::collections::HashSet::with_hasher(ahash::RandomState::new());
    results
        .into_iter()
        .filter(|r| seen.insert(r.source.identity()))
        .collect()
}

// =============================================================================
// Class scanners
// =============================================================================

/// Everything a class scanner may look at.
#[derive(Clone, Copy)]
pub struct ScanEnvironment<'a> {
    pub registry: &'a TypeRegistry,
    pub tags: &'a ComposedTagScanner,
    pub config: &'a ElementsConfig,
    pub properties: &'a PropertiesContainer,
    /// The application's designated root type
    pub root: Option<&'a Arc<TypeDescriptor>>,
}

/// A strategy producing candidate types.
pub trait ElementClassScanner: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_enabled(&self, _config: &ElementsConfig) -> bool {
        true
    }

    /// Types to check for the `Element` tag.
    fn candidates(&self, env: &ScanEnvironment<'_>) -> Vec<Arc<TypeDescriptor>>;

    /// Candidates carrying exactly one `Element` tag. More than one is an error.
    fn scan(&self, env: &ScanEnvironment<'_>) -> Result<Vec<ElementScanningResult>> {
        let mut results = Vec::new();
        let mut seen = std::collections::HashSet::with_hasher(ahash::RandomState::new());

        for ty in self.candidates(env) {
            if !seen.insert(ty.name()) {
                continue;
            }
            if let Some(tag) = env.tags.scan_one_strict(&*ty, &tags::ELEMENT)? {
                results.push(ElementScanningResult::class(tag, ty)?);
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            scanner = self.name(),
            elements = results.len(),
            "Class scanning finished"
        );

        Ok(results)
    }
}

/// Scans around the root type.
#[derive(Debug, Default, Clone, Copy)]
pub struct RootElementClassScanner;

impl ElementClassScanner for RootElementClassScanner {
    fn name(&self) -> &'static str {
        "RootElementClassScanner"
    }

    fn is_enabled(&self, config: &ElementsConfig) -> bool {
        config.root_scanning_enabled
    }

    fn candidates(&self, env: &ScanEnvironment<'_>) -> Vec<Arc<TypeDescriptor>> {
        let Some(root) = env.root else {
            #[cfg(feature = "logging")]
            warn!(target: "element_injector", "No root type given; root scanning skipped");
            return Vec::new();
        };

        if env.config.root_hierarchy {
            env.registry.in_package_tree(root.package()).cloned().collect()
        } else {
            let mut found = vec![Arc::clone(root)];
            found.extend(env.registry.nested_in(root.name()));
            found
        }
    }
}

/// Scans the crate's own namespace. Always enabled.
///
/// Candidates come from the registry the application builds. Without
/// descriptors registered under `element_injector` it yields nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct InternalElementClassScanner;

impl InternalElementClassScanner {
    fn is_test_package(package: &str) -> bool {
        package
            .split("::")
            .skip(1)
            .any(|segment| INTERNAL_TEST_MODULES.contains(&segment))
    }
}

impl ElementClassScanner for InternalElementClassScanner {
    fn name(&self) -> &'static str {
        "InternalElementClassScanner"
    }

    fn candidates(&self, env: &ScanEnvironment<'_>) -> Vec<Arc<TypeDescriptor>> {
        env.registry
            .in_package_tree(INTERNAL_PACKAGE)
            .filter(|t| !Self::is_test_package(t.package()))
            .cloned()
            .collect()
    }
}

/// Scans configured packages. Patterns may use `*` and `?` wildcards; a
/// type matches when its package or one of its ancestors matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackagesElementClassScanner;

impl PackagesElementClassScanner {
    fn glob_set(patterns: &[String]) -> Option<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        let mut added = 0;

        for pattern in patterns {
            let valid_chars = pattern
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '*' | '?'));
            if !valid_chars {
                #[cfg(feature = "logging")]
                warn!(target: "element_injector", pattern = %pattern, "Invalid package pattern skipped");
                continue;
            }

            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    added += 1;
                }
                Err(_e) => {
                    #[cfg(feature = "logging")]
                    warn!(target: "element_injector", pattern = %pattern, error = %_e, "Invalid package pattern skipped");
                }
            }
        }

        if added == 0 {
            return None;
        }
        match builder.build() {
            Ok(set) => Some(set),
            Err(_e) => {
                #[cfg(feature = "logging")]
                warn!(target: "element_injector", error = %_e, "Package patterns could not be compiled");
                None
            }
        }
    }
}

/// `a::b::c` yields `a`, `a::b`, `a::b::c`.
fn package_ancestors(package: &str) -> impl Iterator<Item = &str> {
    package
        .match_indices("::")
        .map(move |(idx, _)| &package[..idx])
        .chain(std::iter::once(package))
}

impl ElementClassScanner for PackagesElementClassScanner {
    fn name(&self) -> &'static str {
        "PackagesElementClassScanner"
    }

    fn is_enabled(&self, config: &ElementsConfig) -> bool {
        !config.scan_packages.is_empty()
    }

    fn candidates(&self, env: &ScanEnvironment<'_>) -> Vec<Arc<TypeDescriptor>> {
        let Some(globs) = Self::glob_set(&env.config.scan_packages) else {
            #[cfg(feature = "logging")]
            warn!(target: "element_injector", "No usable package patterns configured");
            return Vec::new();
        };

        env.registry
            .types()
            .iter()
            .filter(|t| package_ancestors(t.package()).any(|p| globs.is_match(p)))
            .cloned()
            .collect()
    }
}

/// Scans configured type names and their nested types. Unknown names are
/// logged and skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassesElementClassScanner;

impl ElementClassScanner for ClassesElementClassScanner {
    fn name(&self) -> &'static str {
        "ClassesElementClassScanner"
    }

    fn is_enabled(&self, config: &ElementsConfig) -> bool {
        !config.scan_classes.is_empty()
    }

    fn candidates(&self, env: &ScanEnvironment<'_>) -> Vec<Arc<TypeDescriptor>> {
        let mut found = Vec::new();
        for name in &env.config.scan_classes {
            match env.registry.get(name) {
                Some(ty) => {
                    found.push(Arc::clone(ty));
                    found.extend(env.registry.nested_in(ty.name()));
                }
                None => {
                    #[cfg(feature = "logging")]
                    error!(
                        target: "element_injector",
                        type_name = %name,
                        "Configured scan class is not registered; skipped"
                    );
                }
            }
        }
        found
    }
}

/// Root, internal, packages and classes scanners, in that order.
pub fn default_class_scanners() -> Vec<Box<dyn ElementClassScanner>> {
    vec![
        Box::new(RootElementClassScanner),
        Box::new(InternalElementClassScanner),
        Box::new(PackagesElementClassScanner),
        Box::new(ClassesElementClassScanner),
    ]
}

// =============================================================================
// Method scanner
// =============================================================================

/// Finds producer methods on class elements. Elements produced by methods
/// are not scanned again.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementMethodScanner;

impl ElementMethodScanner {
    pub fn scan(&self, parents: &[Arc<ElementContext>], tags: &ComposedTagScanner) -> Result<Vec<ElementScanningResult>> {
        let mut results = Vec::new();

        for parent in parents {
            if !matches!(parent.source(), ElementSource::Class(_)) {
                continue;
            }
            for method in parent.descriptor().methods() {
                if let Some(tag) = tags.scan_one_strict(&**method, &tags::ELEMENT)? {
                    results.push(ElementScanningResult::method(tag, Arc::clone(method), Arc::clone(parent))?);
                }
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "element_injector",
            parents = parents.len(),
            elements = results.len(),
            "Method scanning finished"
        );

        Ok(results)
    }
}
