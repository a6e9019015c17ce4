//! Declared factories
//!
//! [`FactoryBuilder`] lists a factory's inputs explicitly, in the order its
//! build logic expects them, and produces a [`DeclaredServiceFactory`] that
//! resolves them through the binding protocol before calling the logic.

use crate::binding::{ArgumentResolver, Arguments, InputDeclaration};
use crate::{
    BoxError, FactoryKey, GenerationError, ParameterSpecs, Result, RoleSpec, RoleSpecs, Service,
    ServiceDescriptor, ServiceFactory, ServiceGenerator, ServiceType,
};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Type-erased build logic
type BuildFn = Arc<dyn Fn(&Arguments<'_>) -> std::result::Result<Service, BoxError> + Send + Sync>;

/// Declares the inputs of a factory, then attaches its build logic.
///
/// # Examples
///
/// ```rust
/// use service_generator::{FactoryBuilder, ServiceDescriptor, ServiceFactory};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// let factory = FactoryBuilder::new("greeter", "Greeter")
///     .parameter_with_default("greeting", "hello")
///     .build(|args| {
///         Ok(Greeter {
///             greeting: args.parameter("greeting")?.to_string(),
///         })
///     })
///     .unwrap();
///
/// assert_eq!(factory.parameters()["greeting"], Some(vec!["hello".to_string()]));
/// ```
#[derive(Debug)]
pub struct FactoryBuilder {
    key: FactoryKey,
    inputs: Vec<InputDeclaration>,
}

impl FactoryBuilder {
    pub fn new(name: impl Into<String>, service_type: impl Into<ServiceType>) -> Self {
        Self {
            key: FactoryKey::new(name, service_type),
            inputs: Vec::new(),
        }
    }

    /// Append an input with arbitrary directives
    pub fn input(mut self, declaration: InputDeclaration) -> Self {
        self.inputs.push(declaration);
        self
    }

    /// Receive the generator performing the generation
    pub fn generator(self) -> Self {
        self.input(InputDeclaration::generator())
    }

    /// A required single-valued parameter
    pub fn parameter(self, name: impl Into<String>) -> Self {
        self.input(InputDeclaration::parameter(name))
    }

    /// A single-valued parameter with a default value
    pub fn parameter_with_default(self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.input(InputDeclaration::parameter(name).with_default([default.into()]))
    }

    /// A required array-valued parameter
    pub fn parameters(self, name: impl Into<String>) -> Self {
        self.input(InputDeclaration::parameter(name).array())
    }

    /// An array-valued parameter with default values
    pub fn parameters_with_default<I, V>(self, name: impl Into<String>, default: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.input(InputDeclaration::parameter(name).array().with_default(default))
    }

    /// A required single collaborator
    pub fn role(self, name: impl Into<String>, service_type: impl Into<ServiceType>) -> Self {
        self.input(InputDeclaration::role(name, service_type))
    }

    /// A single collaborator defaulting to the service named `default`
    pub fn role_with_default(
        self,
        name: impl Into<String>,
        service_type: impl Into<ServiceType>,
        default: impl Into<String>,
    ) -> Self {
        self.input(InputDeclaration::role(name, service_type).with_default([default.into()]))
    }

    /// A required array of collaborators
    pub fn roles(self, name: impl Into<String>, service_type: impl Into<ServiceType>) -> Self {
        self.input(InputDeclaration::role(name, service_type).array())
    }

    /// An array of collaborators defaulting to the services named in `default`
    pub fn roles_with_default<I, V>(
        self,
        name: impl Into<String>,
        service_type: impl Into<ServiceType>,
        default: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.input(
            InputDeclaration::role(name, service_type)
                .array()
                .with_default(default),
        )
    }

    /// Attach the build logic and validate every input declaration.
    ///
    /// The logic may fail with any error; [`GenerationError`]s it propagates
    /// keep their structure, anything else becomes
    /// [`GenerationError::BuildFailed`].
    pub fn build<T, F>(self, body: F) -> Result<DeclaredServiceFactory>
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments<'_>) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        let body: BuildFn = Arc::new(move |args: &Arguments<'_>| {
            body(args).map(|value| Arc::new(value) as Service)
        });
        DeclaredServiceFactory::from_declarations(self.key, self.inputs, body)
    }
}

/// A factory whose inputs were declared explicitly.
///
/// Inputs are resolved in declaration order; the first failing input aborts
/// the build.
#[derive(Clone)]
pub struct DeclaredServiceFactory {
    key: FactoryKey,
    resolvers: Vec<ArgumentResolver>,
    parameters: ParameterSpecs,
    roles: RoleSpecs,
    body: BuildFn,
}

impl DeclaredServiceFactory {
    fn from_declarations(key: FactoryKey, inputs: Vec<InputDeclaration>, body: BuildFn) -> Result<Self> {
        let mut parameters = ParameterSpecs::new();
        let mut roles = RoleSpecs::new();
        let mut resolvers = Vec::with_capacity(inputs.len());

        for declaration in inputs {
            let resolver = ArgumentResolver::from_declaration(&key, declaration)?;
            match &resolver {
                ArgumentResolver::Generator => {}
                ArgumentResolver::Parameter(parameter) => {
                    let previous = parameters.insert(
                        parameter.name().to_string(),
                        parameter.default_values().map(<[String]>::to_vec),
                    );
                    if previous.is_some() {
                        return Err(GenerationError::invalid_definition(
                            &key,
                            format!("parameter {} is declared twice", parameter.name()),
                        ));
                    }
                }
                ArgumentResolver::Role(role) => {
                    let spec = RoleSpec {
                        service_type: role.service_type().clone(),
                        default: role.default_names(),
                    };
                    if roles.insert(role.name().to_string(), spec).is_some() {
                        return Err(GenerationError::invalid_definition(
                            &key,
                            format!("role {} is declared twice", role.name()),
                        ));
                    }
                }
            }
            resolvers.push(resolver);
        }

        Ok(Self {
            key,
            resolvers,
            parameters,
            roles,
            body,
        })
    }

    /// A factory without inputs that always hands out `value`
    pub fn constant<T: Send + Sync + 'static>(
        name: impl Into<String>,
        service_type: impl Into<ServiceType>,
        value: T,
    ) -> Self {
        let value: Service = Arc::new(value);
        Self {
            key: FactoryKey::new(name, service_type),
            resolvers: Vec::new(),
            parameters: ParameterSpecs::new(),
            roles: RoleSpecs::new(),
            body: Arc::new(move |_: &Arguments<'_>| Ok(Arc::clone(&value))),
        }
    }

    /// The input resolvers, in declaration order
    #[inline]
    pub fn resolvers(&self) -> &[ArgumentResolver] {
        &self.resolvers
    }
}

impl ServiceFactory for DeclaredServiceFactory {
    #[inline]
    fn service_name(&self) -> &str {
        &self.key.name
    }

    #[inline]
    fn service_type(&self) -> &ServiceType {
        &self.key.service_type
    }

    #[inline]
    fn parameters(&self) -> &ParameterSpecs {
        &self.parameters
    }

    #[inline]
    fn roles(&self) -> &RoleSpecs {
        &self.roles
    }

    fn build(&self, generator: &dyn ServiceGenerator, descriptor: &ServiceDescriptor) -> Result<Service> {
        let slots = self
            .resolvers
            .iter()
            .map(|resolver| -> Result<_> {
                Ok((resolver.binding(), resolver.resolve(generator, descriptor)?))
            })
            .collect::<Result<Vec<_>>>()?;

        #[cfg(feature = "logging")]
        log_invoking(&self.key, slots.len());

        let arguments = Arguments::new(generator, descriptor, slots);
        (self.body)(&arguments).map_err(|error| match error.downcast::<GenerationError>() {
            Ok(error) => *error,
            Err(other) => GenerationError::BuildFailed(other),
        })
    }

    #[inline]
    fn key(&self) -> FactoryKey {
        self.key.clone()
    }
}

#[cfg(feature = "logging")]
#[inline(never)]
fn log_invoking(key: &FactoryKey, inputs: usize) {
    trace!(
        target: "service_generator",
        factory = %key,
        inputs,
        "Invoking build logic"
    );
}

impl fmt::Debug for DeclaredServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredServiceFactory")
            .field("key", &self.key)
            .field("resolvers", &self.resolvers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyGenerator;

    impl ServiceGenerator for DummyGenerator {
        fn generate(&self, _: &ServiceType, descriptor: &ServiceDescriptor) -> Result<Service> {
            Ok(Arc::new(format!("generated {}", descriptor.name())))
        }
    }

    #[derive(Debug, PartialEq)]
    struct Server {
        port: u16,
        hosts: Vec<String>,
        handler: String,
    }

    fn server_factory() -> DeclaredServiceFactory {
        FactoryBuilder::new("server", "Server")
            .parameter_with_default("port", "80")
            .parameters("hosts")
            .role("handler", "Handler")
            .build(|args| {
                Ok(Server {
                    port: args.parse("port")?,
                    hosts: args.parameters("hosts")?.to_vec(),
                    handler: args.collaborator::<String>("handler")?.to_string(),
                })
            })
            .unwrap()
    }

    #[test]
    fn test_declared_contract_is_introspectable() {
        let factory = server_factory();

        assert_eq!(factory.key(), FactoryKey::new("server", "Server"));
        assert_eq!(factory.parameters().len(), 2);
        assert_eq!(factory.parameters()["port"], Some(vec!["80".to_string()]));
        assert_eq!(factory.parameters()["hosts"], None);
        assert_eq!(
            factory.roles()["handler"],
            RoleSpec {
                service_type: ServiceType::new("Handler"),
                default: None,
            }
        );
    }

    #[test]
    fn test_build_resolves_inputs_before_invoking_logic() {
        let factory = server_factory();
        let descriptor = ServiceDescriptor::builder("server")
            .parameters("hosts", ["a", "b"])
            .collaborator("handler", ServiceDescriptor::not_parameterized("files"))
            .build();

        let service = factory.build(&DummyGenerator, &descriptor).unwrap();
        let server = service.downcast::<Server>().unwrap();

        assert_eq!(
            *server,
            Server {
                port: 80,
                hosts: vec!["a".into(), "b".into()],
                handler: "generated files".into(),
            }
        );
    }

    #[test]
    fn test_binding_failure_is_reported_unwrapped() {
        let factory = server_factory();
        let descriptor = ServiceDescriptor::builder("server")
            .parameters("hosts", ["a"])
            .build();

        let error = factory.build(&DummyGenerator, &descriptor).unwrap_err();
        assert!(matches!(error, GenerationError::MissingCollaborator { .. }));
    }

    #[test]
    fn test_logic_errors_keep_their_structure() {
        let descriptor = ServiceDescriptor::builder("server")
            .parameter("port", "not-a-port")
            .parameters("hosts", ["a"])
            .collaborator("handler", ServiceDescriptor::not_parameterized("files"))
            .build();

        let error = server_factory().build(&DummyGenerator, &descriptor).unwrap_err();
        assert!(matches!(error, GenerationError::BuildFailed(_)));
    }

    #[test]
    fn test_foreign_errors_become_build_failures() {
        let factory = FactoryBuilder::new("broken", "Broken")
            .build(|_| -> std::result::Result<(), BoxError> { Err("out of coffee".into()) })
            .unwrap();

        let error = factory
            .build(&DummyGenerator, &ServiceDescriptor::not_parameterized("broken"))
            .unwrap_err();
        assert_eq!(error.to_string(), "out of coffee");
    }

    #[test]
    fn test_duplicate_parameter_is_invalid() {
        let result = FactoryBuilder::new("svc", "Svc")
            .parameter("x")
            .parameters("x")
            .build(|_| Ok(()));

        assert!(matches!(
            result,
            Err(GenerationError::InvalidFactoryDefinition { .. })
        ));
    }

    #[test]
    fn test_duplicate_role_is_invalid() {
        let result = FactoryBuilder::new("svc", "Svc")
            .role("x", "A")
            .role("x", "B")
            .build(|_| Ok(()));

        assert!(result.is_err());
    }

    #[test]
    fn test_parameter_and_role_may_share_a_name() {
        let factory = FactoryBuilder::new("svc", "Svc")
            .parameter("x")
            .role("x", "A")
            .build(|_| Ok(()))
            .unwrap();

        assert_eq!(factory.resolvers().len(), 2);
    }

    #[test]
    fn test_unbound_input_is_invalid() {
        let result = FactoryBuilder::new("svc", "Svc")
            .input(InputDeclaration::new())
            .build(|_| Ok(()));

        assert!(result.unwrap_err().is_construction_error());
    }

    #[test]
    fn test_generator_input_is_exposed() {
        let factory = FactoryBuilder::new("svc", "Svc")
            .generator()
            .build(|args| {
                let generated = args
                    .generator()?
                    .generate(&ServiceType::any(), &ServiceDescriptor::not_parameterized("dep"))?;
                Ok(generated.downcast_ref::<String>().cloned().unwrap_or_default())
            })
            .unwrap();

        let service = factory
            .build(&DummyGenerator, &ServiceDescriptor::not_parameterized("svc"))
            .unwrap();
        assert_eq!(service.downcast_ref::<String>().unwrap(), "generated dep");
    }

    #[test]
    fn test_constant_factory() {
        let factory = DeclaredServiceFactory::constant("answer", "Number", 42_i64);
        let service = factory
            .build(&DummyGenerator, &ServiceDescriptor::not_parameterized("answer"))
            .unwrap();

        assert_eq!(service.downcast_ref::<i64>(), Some(&42));
        assert!(factory.parameters().is_empty());
    }
}
