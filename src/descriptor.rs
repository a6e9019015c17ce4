//! Service descriptors
//!
//! A descriptor is the declarative request for one service: which factory
//! name to use, the configuration values to bind to its parameters, and the
//! nested descriptors to generate for its collaborator roles.

use std::collections::BTreeMap;

/// An immutable request describing one service instantiation.
///
/// Descriptors carry no identity: two descriptors with equal name,
/// configuration and collaborators are interchangeable.
///
/// # Examples
///
/// ```rust
/// use service_generator::ServiceDescriptor;
///
/// let descriptor = ServiceDescriptor::builder("http-server")
///     .parameter("port", "8080")
///     .parameters("hosts", ["a.example", "b.example"])
///     .collaborator("handler", ServiceDescriptor::not_parameterized("static-files"))
///     .build();
///
/// assert_eq!(descriptor.name(), "http-server");
/// assert_eq!(descriptor.configuration()["port"], vec!["8080".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceDescriptor {
    name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    configuration: BTreeMap<String, Vec<String>>,
    #[cfg_attr(feature = "serde", serde(default))]
    collaborators: BTreeMap<String, Vec<ServiceDescriptor>>,
}

impl ServiceDescriptor {
    /// Create a descriptor from its parts
    pub fn new(
        name: impl Into<String>,
        configuration: BTreeMap<String, Vec<String>>,
        collaborators: BTreeMap<String, Vec<ServiceDescriptor>>,
    ) -> Self {
        Self {
            name: name.into(),
            configuration,
            collaborators,
        }
    }

    /// A descriptor with only a name, used for defaults
    pub fn not_parameterized(name: impl Into<String>) -> Self {
        Self::new(name, BTreeMap::new(), BTreeMap::new())
    }

    /// Start building a descriptor for `name`
    #[inline]
    pub fn builder(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            descriptor: Self::not_parameterized(name),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn configuration(&self) -> &BTreeMap<String, Vec<String>> {
        &self.configuration
    }

    #[inline]
    pub fn collaborators(&self) -> &BTreeMap<String, Vec<ServiceDescriptor>> {
        &self.collaborators
    }

    /// Values configured for `parameter`, if any
    #[inline]
    pub fn values(&self, parameter: &str) -> Option<&[String]> {
        self.configuration.get(parameter).map(Vec::as_slice)
    }

    /// Descriptors configured for `role`, if any
    #[inline]
    pub fn collaborators_for(&self, role: &str) -> Option<&[ServiceDescriptor]> {
        self.collaborators.get(role).map(Vec::as_slice)
    }

    /// Whether nothing but the name is set
    pub fn is_not_parameterized(&self) -> bool {
        self.configuration.is_empty() && self.collaborators.is_empty()
    }

    /// Deepest collaborator nesting below this descriptor (0 for a leaf)
    pub fn depth(&self) -> usize {
        self.collaborators
            .values()
            .flatten()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Fluent construction of a [`ServiceDescriptor`].
///
/// Repeating a parameter or role appends to its value sequence.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    descriptor: ServiceDescriptor,
}

impl DescriptorBuilder {
    /// Add one value to `parameter`
    pub fn parameter(mut self, parameter: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor
            .configuration
            .entry(parameter.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Add several values to `parameter`; an empty iterator still records the key
    pub fn parameters<I, V>(mut self, parameter: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.descriptor
            .configuration
            .entry(parameter.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Add one collaborator to `role`
    pub fn collaborator(mut self, role: impl Into<String>, collaborator: ServiceDescriptor) -> Self {
        self.descriptor
            .collaborators
            .entry(role.into())
            .or_default()
            .push(collaborator);
        self
    }

    /// Add several collaborators to `role`; an empty iterator still records the key
    pub fn collaborators<I>(mut self, role: impl Into<String>, collaborators: I) -> Self
    where
        I: IntoIterator<Item = ServiceDescriptor>,
    {
        self.descriptor
            .collaborators
            .entry(role.into())
            .or_default()
            .extend(collaborators);
        self
    }

    #[inline]
    pub fn build(self) -> ServiceDescriptor {
        self.descriptor
    }
}

impl From<DescriptorBuilder> for ServiceDescriptor {
    fn from(builder: DescriptorBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_parameterized() {
        let descriptor = ServiceDescriptor::not_parameterized("cache");

        assert_eq!(descriptor.name(), "cache");
        assert!(descriptor.is_not_parameterized());
        assert_eq!(descriptor.depth(), 0);
    }

    #[test]
    fn test_structural_equality() {
        let a = ServiceDescriptor::builder("svc")
            .parameter("x", "1")
            .collaborator("dep", ServiceDescriptor::not_parameterized("other"))
            .build();
        let b = ServiceDescriptor::builder("svc")
            .collaborator("dep", ServiceDescriptor::not_parameterized("other"))
            .parameter("x", "1")
            .build();

        assert_eq!(a, b);
    }

    #[test]
    fn test_builder_appends_values() {
        let descriptor = ServiceDescriptor::builder("svc")
            .parameter("hosts", "a")
            .parameters("hosts", ["b", "c"])
            .parameters("empty", Vec::<String>::new())
            .build();

        assert_eq!(descriptor.values("hosts").unwrap(), ["a", "b", "c"]);
        assert_eq!(descriptor.values("empty").unwrap().len(), 0);
        assert!(descriptor.values("missing").is_none());
    }

    #[test]
    fn test_depth() {
        let leaf = ServiceDescriptor::not_parameterized("leaf");
        let middle = ServiceDescriptor::builder("middle")
            .collaborator("inner", leaf.clone())
            .build();
        let root = ServiceDescriptor::builder("root")
            .collaborators("items", [middle, leaf])
            .build();

        assert_eq!(root.depth(), 2);
        assert_eq!(root.collaborators_for("items").unwrap().len(), 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_from_json() {
        let descriptor: ServiceDescriptor = serde_json::from_str(
            r#"{
                "name": "server",
                "configuration": { "port": ["8080"] },
                "collaborators": { "handler": [{ "name": "files" }] }
            }"#,
        )
        .unwrap();

        let expected = ServiceDescriptor::builder("server")
            .parameter("port", "8080")
            .collaborator("handler", ServiceDescriptor::not_parameterized("files"))
            .build();
        assert_eq!(descriptor, expected);
    }
}
