//! Element discovery configuration
//!
//! Read from the [`PropertiesContainer`] once per bootstrap. Nothing here
//! touches process-wide state.

use crate::{DiError, PropertiesContainer, Result};

#[cfg(feature = "logging")]
use tracing::warn;

/// `false` disables element discovery entirely.
pub const INITIALIZATION_ENABLED: &str = "elements.initialization.enabled";
pub const ROOT_SCANNING_ENABLED: &str = "elements.scanning.root.enabled";
/// `true`: root package and sub-packages. `false`: root type and its nested types.
pub const ROOT_SCANNING_HIERARCHY: &str = "elements.scanning.root.hierarchy";
/// Recognised but cannot be turned off.
pub const INTERNAL_SCANNING_ENABLED: &str = "elements.scanning.internal.enabled";
pub const SCAN_PACKAGES: &str = "elements.scan-packages";
pub const SCAN_CLASSES: &str = "elements.scan-classes";

/// Parsed discovery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementsConfig {
    pub initialization_enabled: bool,
    pub root_scanning_enabled: bool,
    pub root_hierarchy: bool,
    /// Package patterns, `*` wildcards allowed
    pub scan_packages: Vec<String>,
    /// Full type names from `elements.scan-classes` and every `elements.scan-classes-*` key
    pub scan_classes: Vec<String>,
}

impl Default for ElementsConfig {
    fn default() -> Self {
        Self {
            initialization_enabled: true,
            root_scanning_enabled: true,
            root_hierarchy: true,
            scan_packages: Vec::new(),
            scan_classes: Vec::new(),
        }
    }
}

impl ElementsConfig {
    pub fn from_properties(properties: &PropertiesContainer) -> Result<Self> {
        let defaults = Self::default();

        if !bool_property(properties, INTERNAL_SCANNING_ENABLED, true)? {
            #[cfg(feature = "logging")]
            warn!(
                target: "element_injector",
                key = INTERNAL_SCANNING_ENABLED,
                "Internal element scanning cannot be disabled; ignoring"
            );
        }

        let mut scan_classes = Vec::new();
        for key in properties.keys_with_prefix(SCAN_CLASSES) {
            if key == SCAN_CLASSES || key[SCAN_CLASSES.len()..].starts_with('-') {
                for name in properties.property_value_list(key, &[]) {
                    if !scan_classes.contains(&name) {
                        scan_classes.push(name);
                    }
                }
            }
        }

        Ok(Self {
            initialization_enabled: bool_property(properties, INITIALIZATION_ENABLED, defaults.initialization_enabled)?,
            root_scanning_enabled: bool_property(properties, ROOT_SCANNING_ENABLED, defaults.root_scanning_enabled)?,
            root_hierarchy: bool_property(properties, ROOT_SCANNING_HIERARCHY, defaults.root_hierarchy)?,
            scan_packages: properties.property_value_list(SCAN_PACKAGES, &[]),
            scan_classes,
        })
    }
}

fn bool_property(properties: &PropertiesContainer, key: &str, default: bool) -> Result<bool> {
    match properties.property(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(DiError::InvalidConfiguration {
                key: key.to_string(),
                value: value.to_string(),
                reason: "expected true or false".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ElementsConfig::from_properties(&PropertiesContainer::new()).unwrap();
        assert_eq!(config, ElementsConfig::default());
    }

    #[test]
    fn test_flags_and_lists() {
        let properties = PropertiesContainer::new()
            .with(INITIALIZATION_ENABLED, "TRUE")
            .with(ROOT_SCANNING_ENABLED, "false")
            .with(ROOT_SCANNING_HIERARCHY, "False")
            .with(SCAN_PACKAGES, "app::web, app::jobs::*")
            .with(SCAN_CLASSES, "app::A, app::B")
            .with("elements.scan-classes-extra", "app::C,app::A")
            .with("elements.scan-classesX", "ignored::D");

        let config = ElementsConfig::from_properties(&properties).unwrap();
        assert!(config.initialization_enabled);
        assert!(!config.root_scanning_enabled);
        assert!(!config.root_hierarchy);
        assert_eq!(config.scan_packages, vec!["app::web", "app::jobs::*"]);
        assert_eq!(config.scan_classes, vec!["app::A", "app::B", "app::C"]);
    }

    #[test]
    fn test_internal_scanning_cannot_be_disabled() {
        let properties = PropertiesContainer::new().with(INTERNAL_SCANNING_ENABLED, "false");
        assert!(ElementsConfig::from_properties(&properties).is_ok());
    }

    #[test]
    fn test_invalid_boolean() {
        let properties = PropertiesContainer::new().with(ROOT_SCANNING_ENABLED, "maybe");
        match ElementsConfig::from_properties(&properties) {
            Err(DiError::InvalidConfiguration { key, value, .. }) => {
                assert_eq!(key, ROOT_SCANNING_ENABLED);
                assert_eq!(value, "maybe");
            }
            other => panic!("expected invalid configuration, got {other:?}"),
        }
    }
}
