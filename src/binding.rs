//! Argument binding
//!
//! Every input of a declared factory is bound, once at factory construction,
//! to exactly one resolution strategy:
//!
//! - the generator itself, for build logic that generates further services
//! - a configuration parameter, read from the descriptor's configuration
//! - a collaborator role, generated recursively from nested descriptors
//!
//! Parameters and roles are either single-valued or array-valued, and may
//! declare defaults used when the descriptor does not mention them.

use crate::factory::downcast;
use crate::{
    BindingKind, FactoryKey, GenerationError, Result, Service, ServiceDescriptor, ServiceGenerator,
    ServiceType,
};
use std::any::Any;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// How many values a binding accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Multiplicity {
    /// Exactly one value or collaborator
    #[default]
    Single,
    /// Any number of values or collaborators, in order
    Array,
}

/// The binding directives of one factory input.
///
/// Directives can be combined freely here; [`ArgumentResolver::from_declaration`]
/// rejects combinations the binding protocol cannot honour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDeclaration {
    generator: bool,
    parameter: Option<String>,
    role: Option<(String, ServiceType)>,
    default: Option<Vec<String>>,
    multiplicity: Multiplicity,
}

impl InputDeclaration {
    /// A declaration with no directive
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the generator performing the generation
    #[inline]
    pub fn generator() -> Self {
        Self::new().with_generator()
    }

    /// Bind to the configuration parameter `name`
    #[inline]
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::new().with_parameter(name)
    }

    /// Bind to the collaborator role `name`, generated as `service_type`
    #[inline]
    pub fn role(name: impl Into<String>, service_type: impl Into<ServiceType>) -> Self {
        Self::new().with_role(name, service_type)
    }

    pub fn with_generator(mut self) -> Self {
        self.generator = true;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameter = Some(name.into());
        self
    }

    pub fn with_role(mut self, name: impl Into<String>, service_type: impl Into<ServiceType>) -> Self {
        self.role = Some((name.into(), service_type.into()));
        self
    }

    /// Values (parameters) or collaborator names (roles) used when absent
    pub fn with_default<I, V>(mut self, default: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.default = Some(default.into_iter().map(Into::into).collect());
        self
    }

    /// Accept any number of values instead of exactly one
    pub fn array(mut self) -> Self {
        self.multiplicity = Multiplicity::Array;
        self
    }

    #[inline]
    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }
}

/// What an input slot was bound to, for name-based lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Generator,
    Parameter(String),
    Role(String),
}

/// A resolved input value
#[derive(Clone)]
pub enum Argument {
    /// The generator pass-through
    Generator,
    Value(String),
    Values(Vec<String>),
    Collaborator(Service),
    Collaborators(Vec<Service>),
}

impl std::fmt::Debug for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generator => f.write_str("Generator"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Values(values) => f.debug_tuple("Values").field(values).finish(),
            Self::Collaborator(_) => f.write_str("Collaborator(..)"),
            Self::Collaborators(services) => write!(f, "Collaborators([..; {}])", services.len()),
        }
    }
}

/// Resolves a configuration parameter from a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterResolver {
    name: String,
    default: Option<Vec<String>>,
    multiplicity: Multiplicity,
}

impl ParameterResolver {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn default_values(&self) -> Option<&[String]> {
        self.default.as_deref()
    }

    pub fn resolve(&self, descriptor: &ServiceDescriptor) -> Result<Argument> {
        let values = match (descriptor.values(&self.name), &self.default) {
            (Some(values), _) => values,
            (None, Some(default)) => default.as_slice(),
            (None, None) => {
                return Err(GenerationError::MissingParameter {
                    parameter: self.name.clone(),
                    service: descriptor.name().to_string(),
                });
            }
        };

        match self.multiplicity {
            Multiplicity::Single => match values {
                [value] => Ok(Argument::Value(value.clone())),
                _ => Err(GenerationError::MultiplicityMismatch {
                    kind: BindingKind::Parameter,
                    binding: self.name.clone(),
                    found: values.len(),
                }),
            },
            Multiplicity::Array => Ok(Argument::Values(values.to_vec())),
        }
    }
}

/// Resolves a collaborator role by generating nested descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleResolver {
    name: String,
    service_type: ServiceType,
    default: Option<Vec<ServiceDescriptor>>,
    multiplicity: Multiplicity,
}

impl RoleResolver {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    /// Names of the default collaborators, if any
    pub fn default_names(&self) -> Option<Vec<String>> {
        self.default
            .as_ref()
            .map(|defaults| defaults.iter().map(|d| d.name().to_string()).collect())
    }

    pub fn resolve(&self, generator: &dyn ServiceGenerator, descriptor: &ServiceDescriptor) -> Result<Argument> {
        let collaborators = match (descriptor.collaborators_for(&self.name), &self.default) {
            (Some(collaborators), _) => collaborators,
            (None, Some(default)) => default.as_slice(),
            (None, None) => {
                return Err(GenerationError::MissingCollaborator {
                    role: self.name.clone(),
                    collaborator_type: self.service_type.clone(),
                    service: descriptor.name().to_string(),
                });
            }
        };

        match self.multiplicity {
            Multiplicity::Single => match collaborators {
                [collaborator] => generator
                    .generate(&self.service_type, collaborator)
                    .map(Argument::Collaborator),
                _ => Err(GenerationError::MultiplicityMismatch {
                    kind: BindingKind::Collaborator,
                    binding: self.name.clone(),
                    found: collaborators.len(),
                }),
            },
            Multiplicity::Array => collaborators
                .iter()
                .map(|collaborator| generator.generate(&self.service_type, collaborator))
                .collect::<Result<Vec<_>>>()
                .map(Argument::Collaborators),
        }
    }
}

/// The resolution strategy of one factory input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentResolver {
    Generator,
    Parameter(ParameterResolver),
    Role(RoleResolver),
}

impl ArgumentResolver {
    /// Pick the strategy matching `declaration`.
    ///
    /// Fails with [`GenerationError::InvalidFactoryDefinition`] unless exactly
    /// one directive is present and its defaults fit its multiplicity.
    pub fn from_declaration(factory: &FactoryKey, declaration: InputDeclaration) -> Result<Self> {
        let InputDeclaration {
            generator,
            parameter,
            role,
            default,
            multiplicity,
        } = declaration;

        match (generator, parameter, role) {
            (true, None, None) => {
                if default.is_some() {
                    return Err(GenerationError::invalid_definition(
                        factory,
                        "the generator input cannot declare defaults",
                    ));
                }
                Ok(Self::Generator)
            }
            (false, Some(name), None) => {
                check_binding(factory, "parameter", &name, default.as_deref(), multiplicity)?;
                Ok(Self::Parameter(ParameterResolver {
                    name,
                    default,
                    multiplicity,
                }))
            }
            (false, None, Some((name, service_type))) => {
                check_binding(factory, "role", &name, default.as_deref(), multiplicity)?;
                let default = default.map(|names| {
                    names
                        .into_iter()
                        .map(ServiceDescriptor::not_parameterized)
                        .collect()
                });
                Ok(Self::Role(RoleResolver {
                    name,
                    service_type,
                    default,
                    multiplicity,
                }))
            }
            (false, Some(parameter), Some((role, _))) => Err(GenerationError::invalid_definition(
                factory,
                format!("input cannot be bound to both parameter {parameter} and role {role}"),
            )),
            (true, _, _) => Err(GenerationError::invalid_definition(
                factory,
                "the generator input cannot also be bound to a parameter or role",
            )),
            (false, None, None) => Err(GenerationError::invalid_definition(
                factory,
                "input must be bound to a parameter, a role, or the generator",
            )),
        }
    }

    /// The binding this resolver fills
    pub fn binding(&self) -> Binding {
        match self {
            Self::Generator => Binding::Generator,
            Self::Parameter(resolver) => Binding::Parameter(resolver.name.clone()),
            Self::Role(resolver) => Binding::Role(resolver.name.clone()),
        }
    }

    pub fn resolve(&self, generator: &dyn ServiceGenerator, descriptor: &ServiceDescriptor) -> Result<Argument> {
        let argument = match self {
            Self::Generator => Ok(Argument::Generator),
            Self::Parameter(resolver) => resolver.resolve(descriptor),
            Self::Role(resolver) => resolver.resolve(generator, descriptor),
        }?;

        #[cfg(feature = "logging")]
        self.log_resolved(descriptor, &argument);

        Ok(argument)
    }

    // Not inlined: `resolve` is on the recursive path
    #[cfg(feature = "logging")]
    #[inline(never)]
    fn log_resolved(&self, descriptor: &ServiceDescriptor, argument: &Argument) {
        trace!(
            target: "service_generator",
            service = descriptor.name(),
            binding = ?self.binding(),
            argument = ?argument,
            "Resolved factory input"
        );
    }
}

fn check_binding(
    factory: &FactoryKey,
    kind: &str,
    name: &str,
    default: Option<&[String]>,
    multiplicity: Multiplicity,
) -> Result<()> {
    if name.is_empty() {
        return Err(GenerationError::invalid_definition(
            factory,
            format!("{kind} name cannot be empty"),
        ));
    }
    match (default, multiplicity) {
        (Some(default), Multiplicity::Single) if default.len() != 1 => {
            Err(GenerationError::invalid_definition(
                factory,
                format!(
                    "single-valued {kind} {name} must declare exactly one default, found {}",
                    default.len()
                ),
            ))
        }
        _ => Ok(()),
    }
}

/// Resolved inputs handed to a declared factory's build logic.
///
/// Inputs are looked up by the name they were bound to; positional access is
/// available through [`get`](Arguments::get).
pub struct Arguments<'a> {
    generator: &'a dyn ServiceGenerator,
    descriptor: &'a ServiceDescriptor,
    slots: Vec<(Binding, Argument)>,
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(
        generator: &'a dyn ServiceGenerator,
        descriptor: &'a ServiceDescriptor,
        slots: Vec<(Binding, Argument)>,
    ) -> Self {
        Self {
            generator,
            descriptor,
            slots,
        }
    }

    /// The descriptor being generated
    #[inline]
    pub fn descriptor(&self) -> &'a ServiceDescriptor {
        self.descriptor
    }

    /// The generator, when the factory declared a generator input
    pub fn generator(&self) -> Result<&'a dyn ServiceGenerator> {
        if self.slots.iter().any(|(binding, _)| *binding == Binding::Generator) {
            Ok(self.generator)
        } else {
            Err(GenerationError::InvalidArgument(
                "the generator input is not declared".into(),
            ))
        }
    }

    /// A single-valued parameter
    pub fn parameter(&self, name: &str) -> Result<&str> {
        match self.parameter_slot(name)? {
            Argument::Value(value) => Ok(value),
            _ => Err(GenerationError::InvalidArgument(format!(
                "parameter {name} is array-valued"
            ))),
        }
    }

    /// An array-valued parameter
    pub fn parameters(&self, name: &str) -> Result<&[String]> {
        match self.parameter_slot(name)? {
            Argument::Values(values) => Ok(values),
            _ => Err(GenerationError::InvalidArgument(format!(
                "parameter {name} is single-valued"
            ))),
        }
    }

    /// A single-valued parameter parsed with [`str::parse`]
    pub fn parse<T>(&self, name: &str) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.parameter(name)?
            .parse()
            .map_err(GenerationError::build_failed)
    }

    /// A single collaborator, viewed as `Arc<T>`
    pub fn collaborator<T: Any + Send + Sync>(&self, role: &str) -> Result<Arc<T>> {
        downcast(self.service(role)?, || format!("collaborator {role}"))
    }

    /// The collaborators of an array-valued role, viewed as `Arc<T>`
    pub fn collaborators<T: Any + Send + Sync>(&self, role: &str) -> Result<Vec<Arc<T>>> {
        self.services(role)?
            .iter()
            .enumerate()
            .map(|(index, service)| {
                downcast(Arc::clone(service), || format!("collaborator {role}[{index}]"))
            })
            .collect()
    }

    /// A single collaborator, type-erased
    pub fn service(&self, role: &str) -> Result<Service> {
        match self.role_slot(role)? {
            Argument::Collaborator(service) => Ok(Arc::clone(service)),
            _ => Err(GenerationError::InvalidArgument(format!(
                "role {role} is array-valued"
            ))),
        }
    }

    /// The collaborators of an array-valued role, type-erased
    pub fn services(&self, role: &str) -> Result<&[Service]> {
        match self.role_slot(role)? {
            Argument::Collaborators(services) => Ok(services),
            _ => Err(GenerationError::InvalidArgument(format!(
                "role {role} is single-valued"
            ))),
        }
    }

    /// The input at `index`, in declaration order
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.slots.get(index).map(|(_, argument)| argument)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn parameter_slot(&self, name: &str) -> Result<&Argument> {
        self.find(|binding| matches!(binding, Binding::Parameter(p) if p == name))
            .ok_or_else(|| {
                GenerationError::InvalidArgument(format!("parameter {name} is not declared"))
            })
    }

    fn role_slot(&self, name: &str) -> Result<&Argument> {
        self.find(|binding| matches!(binding, Binding::Role(r) if r == name))
            .ok_or_else(|| GenerationError::InvalidArgument(format!("role {name} is not declared")))
    }

    fn find(&self, predicate: impl Fn(&Binding) -> bool) -> Option<&Argument> {
        self.slots
            .iter()
            .find(|(binding, _)| predicate(binding))
            .map(|(_, argument)| argument)
    }
}
