//! Dependency definitions

use crate::{ConstructorDescriptor, FieldDescriptor, MethodDescriptor, Parameter, Tag, Tagged, TypeKey};
use std::fmt;
use std::sync::Arc;

/// Where a dependency is declared.
#[derive(Debug, Clone)]
pub enum DeclaringSite {
    /// Parameter `index` of a constructor or producer method
    Parameter {
        owner: String,
        index: usize,
        parameter: Parameter,
    },
    /// An injectable field
    Field { field: Arc<FieldDescriptor> },
}

/// A declaring site and the type it requires.
#[derive(Debug, Clone)]
pub struct DependencyDefinition {
    site: DeclaringSite,
    required: TypeKey,
}

impl DependencyDefinition {
    pub fn parameter(owner: impl Into<String>, index: usize, parameter: &Parameter) -> Self {
        Self {
            required: parameter.required(),
            site: DeclaringSite::Parameter {
                owner: owner.into(),
                index,
                parameter: parameter.clone(),
            },
        }
    }

    pub fn field(field: &Arc<FieldDescriptor>) -> Self {
        Self {
            required: field.required(),
            site: DeclaringSite::Field {
                field: Arc::clone(field),
            },
        }
    }

    /// Definitions for every constructor parameter, in order.
    pub fn for_constructor(constructor: &ConstructorDescriptor) -> Vec<Self> {
        let owner = constructor.target_name();
        constructor
            .params()
            .iter()
            .enumerate()
            .map(|(index, param)| Self::parameter(owner.clone(), index, param))
            .collect()
    }

    /// Definitions for every method parameter, in order.
    pub fn for_method(method: &MethodDescriptor) -> Vec<Self> {
        let owner = method.target_name();
        method
            .params()
            .iter()
            .enumerate()
            .map(|(index, param)| Self::parameter(owner.clone(), index, param))
            .collect()
    }

    #[inline]
    pub fn site(&self) -> &DeclaringSite {
        &self.site
    }

    #[inline]
    pub fn required(&self) -> TypeKey {
        self.required
    }

    #[inline]
    pub fn is_field(&self) -> bool {
        matches!(self.site, DeclaringSite::Field { .. })
    }
}

impl Tagged for DependencyDefinition {
    fn tags(&self) -> &[Tag] {
        match &self.site {
            DeclaringSite::Parameter { parameter, .. } => parameter.tags(),
            DeclaringSite::Field { field } => field.tags(),
        }
    }

    fn target_name(&self) -> String {
        match &self.site {
            DeclaringSite::Parameter { owner, index, parameter } => match parameter.name() {
                Some(name) => format!("parameter {index} ({name}) of {owner}"),
                None => format!("parameter {index} of {owner}"),
            },
            DeclaringSite::Field { field } => field.target_name(),
        }
    }
}

impl fmt::Display for DependencyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requiring {}", self.target_name(), self.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Constructor, Field, Injected, TypeDescriptor, tags};

    struct Report {
        title: Injected<String>,
    }

    #[test]
    fn test_constructor_definitions() {
        let descriptor = TypeDescriptor::class::<Report>()
            .constructor(
                Constructor::public()
                    .param(Parameter::of::<String>().named("title").tag(tags::inject_property("report.title")))
                    .param(Parameter::of::<u32>()),
                |_args| Ok(Report { title: Injected::new() }),
            )
            .build();

        let definitions = DependencyDefinition::for_constructor(&descriptor.constructors()[0]);
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].required(), TypeKey::of::<String>());
        assert_eq!(definitions[0].tags().len(), 1);
        assert!(definitions[0].target_name().starts_with("parameter 0 (title) of constructor"));
        assert!(definitions[1].tags().is_empty());
        assert!(!definitions[1].is_field());
    }

    #[test]
    fn test_field_definition() {
        let descriptor = TypeDescriptor::class::<Report>()
            .field(Field::named("title").tag(tags::inject()), |r: &Report| &r.title)
            .build();

        let definition = DependencyDefinition::field(&descriptor.fields()[0]);
        assert!(definition.is_field());
        assert_eq!(definition.required(), TypeKey::of::<String>());
        assert!(definition.to_string().ends_with("requiring alloc::string::String"));
    }
}
