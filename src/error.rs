//! Error types for service generation
//!
//! Construction-time failures (registry, hierarchy and factory definitions)
//! are reported directly. Failures raised while a factory builds its service
//! are wrapped into a [`ServiceGenerationError`] at every level of the
//! collaborator graph, so the caller can recover the whole generation stack.

use crate::{FactoryKey, ServiceType};
use std::fmt;
use thiserror::Error;

/// Boxed error returned by user build logic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while assembling a context or generating a service
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Two factories were registered with the same name and type
    #[error("found two service factories with same name and type ({name}, {service_type})")]
    DuplicateFactory {
        name: String,
        service_type: ServiceType,
    },

    /// No factory matches the requested name, or none matches the requested type
    #[error("cannot find a service factory for service {name} of type {service_type}")]
    UnknownService {
        name: String,
        service_type: ServiceType,
    },

    /// Several incomparable factory types are equally specific for a request
    #[error("found multiple service factory types for service {name} requested as {service_type}: {}", list(.candidates))]
    AmbiguousFactory {
        name: String,
        service_type: ServiceType,
        candidates: Vec<ServiceType>,
    },

    /// A required parameter is absent and has no default
    #[error("missing parameter {parameter} in configuration for service {service}")]
    MissingParameter { parameter: String, service: String },

    /// A required collaborator is absent and has no default
    #[error("missing collaborator with role {role} ({collaborator_type}) for service {service}")]
    MissingCollaborator {
        role: String,
        collaborator_type: ServiceType,
        service: String,
    },

    /// A single-valued binding received a number of values other than one
    #[error("expected a single {kind} for {binding}, but {found} found")]
    MultiplicityMismatch {
        kind: BindingKind,
        binding: String,
        found: usize,
    },

    /// A factory declares an input the binding protocol cannot fill
    #[error("invalid definition for service factory {factory}: {reason}")]
    InvalidFactoryDefinition { factory: String, reason: String },

    /// The declared capability tags do not form a hierarchy
    #[error("invalid type hierarchy: {reason}")]
    InvalidHierarchy { reason: String },

    /// A context setting is out of range
    #[error("invalid context configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A descriptor re-entered a factory that is already generating it
    #[error("cyclic dependency detected while generating {key}: {}", path_list(.path))]
    CyclicDependency {
        key: FactoryKey,
        path: Vec<FactoryKey>,
    },

    /// The collaborator graph is nested deeper than the context allows
    #[error("generation depth limit of {limit} exceeded while generating {key}")]
    DepthLimitExceeded { key: FactoryKey, limit: usize },

    /// A built value could not be viewed as the Rust type asked for
    #[error("{binding} cannot be viewed as {expected}")]
    TypeMismatch {
        binding: String,
        expected: &'static str,
    },

    /// Build logic asked for an argument the factory never declared
    #[error("invalid argument access: {0}")]
    InvalidArgument(String),

    /// User build logic failed
    #[error("{0}")]
    BuildFailed(#[source] BoxError),

    /// A factory failed while generating its service
    #[error(transparent)]
    Generation(#[from] ServiceGenerationError),
}

impl GenerationError {
    /// Create a BuildFailed error from any error value
    #[inline]
    pub fn build_failed(error: impl Into<BoxError>) -> Self {
        Self::BuildFailed(error.into())
    }

    /// Create an InvalidFactoryDefinition error
    #[inline]
    pub fn invalid_definition(factory: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidFactoryDefinition {
            factory: factory.to_string(),
            reason: reason.into(),
        }
    }

    /// Factories involved in this failure, innermost first.
    ///
    /// Empty unless the failure happened inside a factory.
    pub fn generation_stack(&self) -> Vec<FactoryKey> {
        match self {
            Self::Generation(error) => error.generation_stack(),
            _ => Vec::new(),
        }
    }

    /// The innermost error, skipping every generation wrapper
    pub fn root_cause(&self) -> &GenerationError {
        match self {
            Self::Generation(error) => error.root_cause(),
            other => other,
        }
    }

    /// Whether this error belongs to registry or factory construction
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateFactory { .. }
                | Self::InvalidFactoryDefinition { .. }
                | Self::InvalidHierarchy { .. }
                | Self::InvalidConfiguration { .. }
        )
    }
}

/// What a multiplicity check was counting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Parameter,
    Collaborator,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter => f.write_str("parameter"),
            Self::Collaborator => f.write_str("collaborator"),
        }
    }
}

/// A failure inside a factory, tagged with the factory that raised it.
///
/// Nesting these errors through [`GenerationError::Generation`] builds the
/// generation stack: the deepest wrapper names the factory where the problem
/// originated, the outermost names the service the caller asked for.
#[derive(Error, Debug)]
#[error("{}", .source.root_cause())]
pub struct ServiceGenerationError {
    factory: FactoryKey,
    #[source]
    source: Box<GenerationError>,
}

impl ServiceGenerationError {
    /// Wrap a failure raised by `factory`
    pub fn new(factory: FactoryKey, source: GenerationError) -> Self {
        Self {
            factory,
            source: Box::new(source),
        }
    }

    /// The factory this failure is attributed to
    #[inline]
    pub fn factory(&self) -> &FactoryKey {
        &self.factory
    }

    /// The wrapped cause
    #[inline]
    pub fn cause(&self) -> &GenerationError {
        &self.source
    }

    /// Factories from the originating one to the outermost one
    pub fn generation_stack(&self) -> Vec<FactoryKey> {
        let mut stack = match self.source.as_ref() {
            GenerationError::Generation(inner) => inner.generation_stack(),
            _ => Vec::new(),
        };
        stack.push(self.factory.clone());
        stack
    }

    /// The innermost error that is not a generation wrapper
    pub fn root_cause(&self) -> &GenerationError {
        self.source.root_cause()
    }
}

fn list(types: &[ServiceType]) -> String {
    let names: Vec<&str> = types.iter().map(ServiceType::name).collect();
    format!("[{}]", names.join(","))
}

fn path_list(path: &[FactoryKey]) -> String {
    let keys: Vec<String> = path.iter().map(ToString::to_string).collect();
    keys.join(" -> ")
}

/// Result type alias for generation operations
pub type Result<T> = std::result::Result<T, GenerationError>;
