//! The factory contract and the generator capability
//!
//! A factory is a named, capability-typed builder. It declares the
//! parameters and collaborator roles it needs, and builds one service from a
//! descriptor, asking the generator it is handed for any collaborators.

use crate::{GenerationError, Result, ServiceDescriptor, ServiceType};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased built service.
///
/// Factories produce values of arbitrary Rust types; the engine moves them
/// around behind this alias and callers view them again with a downcast.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Identity of a factory: its service name and declared output type.
///
/// This is the key used for registry indexing, duplicate detection and
/// generation stacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactoryKey {
    pub name: String,
    pub service_type: ServiceType,
}

impl FactoryKey {
    #[inline]
    pub fn new(name: impl Into<String>, service_type: impl Into<ServiceType>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
        }
    }
}

impl fmt::Display for FactoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{})", self.name, self.service_type)
    }
}

/// The collaborator contract of one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    /// Type requested from the generator for each collaborator
    pub service_type: ServiceType,
    /// Collaborator names generated when the descriptor leaves the role empty
    pub default: Option<Vec<String>>,
}

/// Parameter name to optional default values
pub type ParameterSpecs = BTreeMap<String, Option<Vec<String>>>;

/// Role name to collaborator contract
pub type RoleSpecs = BTreeMap<String, RoleSpec>;

/// Something that can build a service from a descriptor.
///
/// Implementations are constructed once and are reused, possibly from
/// several threads, for every generation that selects them. They report raw
/// failures from [`build`](ServiceFactory::build): the context attributes
/// them to [`key`](ServiceFactory::key).
pub trait ServiceFactory: Send + Sync {
    fn service_name(&self) -> &str;

    fn service_type(&self) -> &ServiceType;

    /// Declared parameters and their defaults
    fn parameters(&self) -> &ParameterSpecs;

    /// Declared collaborator roles
    fn roles(&self) -> &RoleSpecs;

    /// Build the service described by `descriptor`.
    ///
    /// `generator` generates collaborators in the same context.
    fn build(&self, generator: &dyn ServiceGenerator, descriptor: &ServiceDescriptor) -> Result<Service>;

    fn key(&self) -> FactoryKey {
        FactoryKey::new(self.service_name(), self.service_type().clone())
    }
}

impl fmt::Debug for dyn ServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFactory")
            .field("key", &self.key())
            .field("parameters", self.parameters())
            .field("roles", self.roles())
            .finish()
    }
}

/// The capability to build a service from a descriptor.
pub trait ServiceGenerator {
    /// Generate the service described by `descriptor`, as `requested`
    fn generate(&self, requested: &ServiceType, descriptor: &ServiceDescriptor) -> Result<Service>;
}

impl<G: ServiceGenerator + ?Sized> ServiceGenerator for &G {
    #[inline]
    fn generate(&self, requested: &ServiceType, descriptor: &ServiceDescriptor) -> Result<Service> {
        (**self).generate(requested, descriptor)
    }
}

/// Typed helpers over [`ServiceGenerator`]
pub trait ServiceGeneratorExt: ServiceGenerator {
    /// Generate a service and view it as `Arc<T>`
    fn generate_as<T: Any + Send + Sync>(
        &self,
        requested: &ServiceType,
        descriptor: &ServiceDescriptor,
    ) -> Result<Arc<T>> {
        let service = self.generate(requested, descriptor)?;
        downcast(service, || format!("service {}", descriptor.name()))
    }
}

impl<G: ServiceGenerator + ?Sized> ServiceGeneratorExt for G {}

/// View a type-erased service as `Arc<T>`
pub(crate) fn downcast<T: Any + Send + Sync>(service: Service, what: impl FnOnce() -> String) -> Result<Arc<T>> {
    service.downcast::<T>().map_err(|_| GenerationError::TypeMismatch {
        binding: what(),
        expected: std::any::type_name::<T>(),
    })
}
