//! The generation context
//!
//! `GenerationContext` indexes factories by service name and declared type,
//! and generates services from descriptors. For every request it picks the
//! single most specific registered type compatible with the requested one,
//! then hands the selected factory a generator bound to the same context so
//! collaborators are generated recursively.

use crate::{
    FactoryKey, GenerationError, Result, Service, ServiceDescriptor, ServiceFactory,
    ServiceGenerationError, ServiceGenerator, ServiceModule, ServiceType, TypeHierarchy,
};
use ahash::RandomState;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Factories allowed on one generation path, the root request's included
pub const DEFAULT_MAX_DEPTH: usize = 64;

type FactoriesByType = HashMap<ServiceType, Arc<dyn ServiceFactory>, RandomState>;

/// An immutable registry of factories that generates services.
///
/// A context can be shared between threads; each call to
/// [`generate`](GenerationContext::generate) walks its descriptor tree
/// independently.
///
/// # Examples
///
/// ```rust
/// use service_generator::{
///     FactoryBuilder, GenerationContext, ServiceDescriptor, ServiceGeneratorExt, ServiceType,
///     TypeHierarchy,
/// };
///
/// struct Pool { size: usize }
/// struct Repository { pool: std::sync::Arc<Pool> }
///
/// let hierarchy = TypeHierarchy::builder()
///     .declare("PgPool", ["Pool"])
///     .build()
///     .unwrap();
///
/// let context = GenerationContext::builder()
///     .hierarchy(hierarchy)
///     .factory(
///         FactoryBuilder::new("postgres", "PgPool")
///             .parameter_with_default("size", "4")
///             .build(|args| Ok(Pool { size: args.parse("size")? }))
///             .unwrap(),
///     )
///     .factory(
///         FactoryBuilder::new("users", "Repository")
///             .role("pool", "Pool")
///             .build(|args| Ok(Repository { pool: args.collaborator("pool")? }))
///             .unwrap(),
///     )
///     .build()
///     .unwrap();
///
/// let descriptor = ServiceDescriptor::builder("users")
///     .collaborator("pool", ServiceDescriptor::builder("postgres").parameter("size", "16").build())
///     .build();
///
/// let users = context
///     .generate_as::<Repository>(&ServiceType::new("Repository"), &descriptor)
///     .unwrap();
/// assert_eq!(users.pool.size, 16);
/// ```
pub struct GenerationContext {
    hierarchy: TypeHierarchy,
    /// Service name -> declared type -> factory
    factories: HashMap<String, FactoriesByType, RandomState>,
    max_depth: usize,
}

impl GenerationContext {
    /// Index `factories`, rejecting two factories with the same name and type.
    pub fn new<I>(hierarchy: TypeHierarchy, factories: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn ServiceFactory>>,
    {
        let mut index: HashMap<String, FactoriesByType, RandomState> = HashMap::default();

        for factory in factories {
            let by_type = index.entry(factory.service_name().to_string()).or_default();
            match by_type.entry(factory.service_type().clone()) {
                Entry::Occupied(_) => {
                    return Err(GenerationError::DuplicateFactory {
                        name: factory.service_name().to_string(),
                        service_type: factory.service_type().clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    #[cfg(feature = "logging")]
                    trace!(
                        target: "service_generator",
                        factory = %factory.key(),
                        "Registering service factory"
                    );

                    slot.insert(factory);
                }
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_generator",
            factories = index.values().map(HashMap::len).sum::<usize>(),
            services = index.len(),
            "Created generation context"
        );

        Ok(Self {
            hierarchy,
            factories: index,
            max_depth: DEFAULT_MAX_DEPTH,
        })
    }

    /// Start assembling a context
    #[inline]
    pub fn builder() -> GenerationContextBuilder {
        GenerationContextBuilder::default()
    }

    /// Generate the service described by `descriptor`, as `requested`.
    ///
    /// Failures inside factories come back as
    /// [`GenerationError::Generation`], whose
    /// [`generation_stack`](GenerationError::generation_stack) lists the
    /// factories involved from the originating one outwards.
    pub fn generate(&self, requested: &ServiceType, descriptor: &ServiceDescriptor) -> Result<Service> {
        Generation::root(self).generate(requested, descriptor)
    }

    /// The factory that would generate `descriptor` as `requested`.
    ///
    /// Implements narrowest-match selection: among the factories registered
    /// under the descriptor's name whose type is assignable to `requested`,
    /// keep only those with no more specific compatible competitor. Exactly
    /// one must remain.
    pub fn select(&self, requested: &ServiceType, descriptor: &ServiceDescriptor) -> Result<&Arc<dyn ServiceFactory>> {
        let unknown = || GenerationError::UnknownService {
            name: descriptor.name().to_string(),
            service_type: requested.clone(),
        };

        let by_type = self.factories.get(descriptor.name()).ok_or_else(unknown)?;

        let mut narrowest: Vec<&ServiceType> = Vec::new();
        for candidate in by_type
            .keys()
            .filter(|ty| self.hierarchy.is_assignable(ty, requested))
        {
            narrowest.retain(|kept| !self.hierarchy.is_assignable(candidate, kept));
            if !narrowest
                .iter()
                .any(|kept| self.hierarchy.is_assignable(kept, candidate))
            {
                narrowest.push(candidate);
            }
        }

        match narrowest.as_slice() {
            [] => Err(unknown()),
            [selected] => Ok(&by_type[*selected]),
            _ => {
                let mut candidates: Vec<ServiceType> = narrowest.into_iter().cloned().collect();
                candidates.sort();
                Err(GenerationError::AmbiguousFactory {
                    name: descriptor.name().to_string(),
                    service_type: requested.clone(),
                    candidates,
                })
            }
        }
    }

    #[inline]
    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Every registered factory, in no particular order
    pub fn factories(&self) -> impl Iterator<Item = &Arc<dyn ServiceFactory>> {
        self.factories.values().flat_map(HashMap::values)
    }

    /// The factory registered under exactly `name` and `service_type`
    pub fn factory(&self, name: &str, service_type: &ServiceType) -> Option<&Arc<dyn ServiceFactory>> {
        self.factories.get(name)?.get(service_type)
    }

    /// Factories registered under `name`, ordered by type
    pub fn describe(&self, name: &str) -> Vec<&Arc<dyn ServiceFactory>> {
        let mut factories: Vec<_> = self
            .factories
            .get(name)
            .map(|by_type| by_type.values().collect())
            .unwrap_or_default();
        factories.sort_by(|a, b| a.service_type().cmp(b.service_type()));
        factories
    }

    /// Registered service names, sorted
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.values().map(HashMap::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl ServiceGenerator for GenerationContext {
    #[inline]
    fn generate(&self, requested: &ServiceType, descriptor: &ServiceDescriptor) -> Result<Service> {
        GenerationContext::generate(self, requested, descriptor)
    }
}

impl fmt::Debug for GenerationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationContext")
            .field("services", &self.factories.len())
            .field("factories", &self.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// One level of a generation walk.
///
/// Links back to the levels above it, so a descriptor that would re-enter a
/// factory already generating it is rejected instead of recursing forever.
/// Each level only borrows its parent; nothing is copied per level.
struct Generation<'a> {
    context: &'a GenerationContext,
    parent: Option<&'a Generation<'a>>,
    /// Factory and descriptor generated at this level; `None` at the root
    entry: Option<(FactoryKey, &'a ServiceDescriptor)>,
    depth: usize,
}

impl<'a> Generation<'a> {
    fn root(context: &'a GenerationContext) -> Self {
        Self {
            context,
            parent: None,
            entry: None,
            depth: 0,
        }
    }

    /// Entries from this level up to the root
    fn entries(&self) -> impl Iterator<Item = &(FactoryKey, &'a ServiceDescriptor)> {
        std::iter::successors(Some(self), |level| level.parent).filter_map(|level| level.entry.as_ref())
    }

    /// The walk one level below this one, generating `descriptor` with `key`
    fn enter<'n>(&'n self, key: &FactoryKey, descriptor: &'n ServiceDescriptor) -> Result<Generation<'n>>
    where
        'a: 'n,
    {
        if self
            .entries()
            .any(|(entered, previous)| entered == key && *previous == descriptor)
        {
            let mut path: Vec<FactoryKey> = self.entries().map(|(k, _)| k.clone()).collect();
            path.reverse();
            path.push(key.clone());
            return Err(GenerationError::CyclicDependency {
                key: key.clone(),
                path,
            });
        }
        if self.depth >= self.context.max_depth {
            return Err(GenerationError::DepthLimitExceeded {
                key: key.clone(),
                limit: self.context.max_depth,
            });
        }

        Ok(Generation {
            context: self.context,
            parent: Some(self),
            entry: Some((key.clone(), descriptor)),
            depth: self.depth + 1,
        })
    }
}

impl ServiceGenerator for Generation<'_> {
    fn generate(&self, requested: &ServiceType, descriptor: &ServiceDescriptor) -> Result<Service> {
        let factory = self.context.select(requested, descriptor)?;
        let key = factory.key();

        #[cfg(feature = "logging")]
        log_selected(&key, requested, self.depth);

        let nested = self.enter(&key, descriptor)?;

        factory.build(&nested, descriptor).map_err(|error| {
            #[cfg(feature = "logging")]
            log_failed(&key, self.depth, &error);

            ServiceGenerationError::new(key, error).into()
        })
    }
}

// Not inlined into the recursive frames

#[cfg(feature = "logging")]
#[inline(never)]
fn log_selected(key: &FactoryKey, requested: &ServiceType, depth: usize) {
    debug!(
        target: "service_generator",
        factory = %key,
        requested = %requested,
        depth,
        "Selected service factory"
    );
}

#[cfg(feature = "logging")]
#[inline(never)]
fn log_failed(key: &FactoryKey, depth: usize, error: &GenerationError) {
    debug!(
        target: "service_generator",
        factory = %key,
        depth,
        error = %error,
        "Service generation failed"
    );
}

/// Assembles a [`GenerationContext`] from factories and modules.
#[derive(Default)]
pub struct GenerationContextBuilder {
    hierarchy: Option<TypeHierarchy>,
    factories: Vec<Arc<dyn ServiceFactory>>,
    modules: Vec<Box<dyn ServiceModule>>,
    max_depth: Option<usize>,
}

impl GenerationContextBuilder {
    /// Use `hierarchy` to compare types (defaults to [`TypeHierarchy::flat`])
    pub fn hierarchy(mut self, hierarchy: TypeHierarchy) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    pub fn factory(mut self, factory: impl ServiceFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn shared_factory(mut self, factory: Arc<dyn ServiceFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn factories<I>(mut self, factories: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ServiceFactory>>,
    {
        self.factories.extend(factories);
        self
    }

    /// Register the factories `module` assembles when the context is built
    pub fn module(mut self, module: impl ServiceModule + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Limit how many factories one generation path may pass through, the
    /// root included (defaults to [`DEFAULT_MAX_DEPTH`]). Must be at least 1.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn build(self) -> Result<GenerationContext> {
        if self.max_depth == Some(0) {
            return Err(GenerationError::InvalidConfiguration {
                reason: "max_depth must be at least 1".into(),
            });
        }

        let mut factories = self.factories;
        for module in &self.modules {
            let assembled = module.assemble()?;

            #[cfg(feature = "logging")]
            debug!(
                target: "service_generator",
                module = module.name(),
                factories = assembled.len(),
                "Assembled service module"
            );

            factories.extend(assembled);
        }

        let mut context = GenerationContext::new(self.hierarchy.unwrap_or_default(), factories)?;
        if let Some(max_depth) = self.max_depth {
            context.max_depth = max_depth;
        }
        Ok(context)
    }
}

impl fmt::Debug for GenerationContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationContextBuilder")
            .field("factories", &self.factories.len())
            .field("modules", &self.modules.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
