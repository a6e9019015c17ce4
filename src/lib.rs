//! # Service Generator - Declarative Service Composition for Rust
//!
//! Build object graphs from descriptor trees. A [`ServiceDescriptor`] names a
//! service, carries its string configuration and nests the descriptors of
//! its collaborators. A [`GenerationContext`] turns descriptors into live
//! services with the factories registered for each name.
//!
//! ## Features
//!
//! - **Narrowest match** - several factories may share a name; the most
//!   specific type compatible with the request is chosen
//! - **Declared inputs** - factories bind parameters, collaborator roles and
//!   the generator itself, with defaults and single/array multiplicity
//! - **Failure stacks** - errors keep every factory involved, innermost first
//! - **Cycle detection** - descriptors that re-enter themselves fail fast
//! - **Thread-safe** - a context is immutable and can be shared freely
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use service_generator::prelude::*;
//!
//! struct Database { url: String }
//! struct UserService { db: Arc<Database>, page_size: usize }
//!
//! let context = GenerationContext::builder()
//!     .factory(
//!         FactoryBuilder::new("postgres", "Database")
//!             .parameter("url")
//!             .build(|args| Ok(Database { url: args.parameter("url")?.to_string() }))
//!             .unwrap(),
//!     )
//!     .factory(
//!         FactoryBuilder::new("users", "UserService")
//!             .role("db", "Database")
//!             .parameter_with_default("page_size", "50")
//!             .build(|args| {
//!                 Ok(UserService {
//!                     db: args.collaborator("db")?,
//!                     page_size: args.parse("page_size")?,
//!                 })
//!             })
//!             .unwrap(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let descriptor = ServiceDescriptor::builder("users")
//!     .collaborator(
//!         "db",
//!         ServiceDescriptor::builder("postgres")
//!             .parameter("url", "postgres://localhost")
//!             .build(),
//!     )
//!     .build();
//!
//! let users = context
//!     .generate_as::<UserService>(&"UserService".into(), &descriptor)
//!     .unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! assert_eq!(users.page_size, 50);
//! ```
//!
//! ## Failures
//!
//! ```rust
//! use service_generator::prelude::*;
//!
//! let context = GenerationContext::builder()
//!     .factory(
//!         FactoryBuilder::new("postgres", "Database")
//!             .parameter("url")
//!             .build(|args| Ok(args.parameter("url")?.to_string()))
//!             .unwrap(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let error = context
//!     .generate(&"Database".into(), &ServiceDescriptor::not_parameterized("postgres"))
//!     .unwrap_err();
//!
//! assert_eq!(error.generation_stack(), vec![FactoryKey::new("postgres", "Database")]);
//! assert!(matches!(error.root_cause(), GenerationError::MissingParameter { .. }));
//! ```

mod binding;
mod builder;
mod context;
mod descriptor;
mod error;
mod factory;
#[cfg(feature = "logging")]
pub mod logging;
mod module;
mod types;

pub use binding::*;
pub use builder::*;
pub use context::*;
pub use descriptor::*;
pub use error::*;
pub use factory::*;
pub use module::*;
pub use types::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Arguments, DeclaredServiceFactory, FactoryBuilder, FactoryKey, GenerationContext,
        GenerationError, InputDeclaration, Result, Service, ServiceDescriptor, ServiceFactory,
        ServiceGenerator, ServiceGeneratorExt, ServiceModule, ServiceType, TypeHierarchy,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    trait Store: Send + Sync {
        fn describe(&self) -> String;
    }

    struct MemoryStore;

    impl Store for MemoryStore {
        fn describe(&self) -> String {
            "memory".into()
        }
    }

    struct FileStore {
        path: String,
    }

    impl Store for FileStore {
        fn describe(&self) -> String {
            format!("file:{}", self.path)
        }
    }

    struct Cache {
        store: Arc<Box<dyn Store>>,
        capacity: usize,
    }

    struct Gateway {
        caches: Vec<Arc<Cache>>,
        hosts: Vec<String>,
    }

    fn hierarchy() -> TypeHierarchy {
        TypeHierarchy::builder()
            .declare("MemoryStore", ["Store"])
            .declare("FileStore", ["Store"])
            .declare("LruCache", ["Cache"])
            .build()
            .unwrap()
    }

    fn stores() -> Result<Vec<Arc<dyn ServiceFactory>>> {
        let memory = FactoryBuilder::new("memory", "MemoryStore")
            .build(|_| Ok(Box::new(MemoryStore) as Box<dyn Store>))?;
        let file = FactoryBuilder::new("file", "FileStore")
            .parameter("path")
            .build(|args| {
                Ok(Box::new(FileStore {
                    path: args.parameter("path")?.to_string(),
                }) as Box<dyn Store>)
            })?;
        Ok(vec![Arc::new(memory), Arc::new(file)])
    }

    fn context() -> GenerationContext {
        GenerationContext::builder()
            .hierarchy(hierarchy())
            .module(stores)
            .factory(
                FactoryBuilder::new("lru", "LruCache")
                    .role_with_default("store", "Store", "memory")
                    .parameter_with_default("capacity", "128")
                    .build(|args| {
                        Ok(Cache {
                            store: args.collaborator("store")?,
                            capacity: args.parse("capacity")?,
                        })
                    })
                    .unwrap(),
            )
            .factory(
                FactoryBuilder::new("gateway", "Gateway")
                    .roles("caches", "Cache")
                    .parameters_with_default("hosts", ["localhost"])
                    .build(|args| {
                        Ok(Gateway {
                            caches: args.collaborators("caches")?,
                            hosts: args.parameters("hosts")?.to_vec(),
                        })
                    })
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_end_to_end_composition() {
        let context = context();
        let descriptor = ServiceDescriptor::builder("gateway")
            .parameters("hosts", ["a.example", "b.example"])
            .collaborators(
                "caches",
                [
                    ServiceDescriptor::not_parameterized("lru"),
                    ServiceDescriptor::builder("lru")
                        .parameter("capacity", "16")
                        .collaborator(
                            "store",
                            ServiceDescriptor::builder("file").parameter("path", "/tmp/cache").build(),
                        )
                        .build(),
                ],
            )
            .build();

        let gateway = context.generate_as::<Gateway>(&"Gateway".into(), &descriptor).unwrap();

        assert_eq!(gateway.hosts, ["a.example", "b.example"]);
        assert_eq!(gateway.caches.len(), 2);
        assert_eq!(gateway.caches[0].capacity, 128);
        assert_eq!(gateway.caches[0].store.describe(), "memory");
        assert_eq!(gateway.caches[1].capacity, 16);
        assert_eq!(gateway.caches[1].store.describe(), "file:/tmp/cache");
    }

    #[test]
    fn test_requesting_a_capability_finds_the_implementation() {
        let context = context();

        let cache = context
            .generate_as::<Cache>(&"Cache".into(), &ServiceDescriptor::not_parameterized("lru"))
            .unwrap();
        assert_eq!(cache.capacity, 128);

        let error = context
            .generate(&"Store".into(), &ServiceDescriptor::not_parameterized("lru"))
            .unwrap_err();
        assert!(matches!(error, GenerationError::UnknownService { .. }));
    }

    #[test]
    fn test_nested_failure_reports_every_level() {
        let context = context();
        let descriptor = ServiceDescriptor::builder("gateway")
            .collaborator(
                "caches",
                ServiceDescriptor::builder("lru")
                    .collaborator("store", ServiceDescriptor::not_parameterized("file"))
                    .build(),
            )
            .build();

        let error = context.generate(&"Gateway".into(), &descriptor).unwrap_err();

        assert_eq!(
            error.generation_stack(),
            vec![
                FactoryKey::new("file", "FileStore"),
                FactoryKey::new("lru", "LruCache"),
                FactoryKey::new("gateway", "Gateway"),
            ]
        );
        assert!(error.to_string().contains("path"));
    }

    #[test]
    fn test_build_errors_are_wrapped() {
        #[derive(Debug, thiserror::Error)]
        #[error("connection refused")]
        struct Refused;

        let context = GenerationContext::builder()
            .factory(
                FactoryBuilder::new("remote", "Client")
                    .build(|_| -> std::result::Result<(), crate::BoxError> { Err(Refused.into()) })
                    .unwrap(),
            )
            .build()
            .unwrap();

        let error = context
            .generate(&"Client".into(), &ServiceDescriptor::not_parameterized("remote"))
            .unwrap_err();

        assert_eq!(error.generation_stack(), vec![FactoryKey::new("remote", "Client")]);
        assert!(matches!(error.root_cause(), GenerationError::BuildFailed(_)));
        assert_eq!(error.to_string(), "connection refused");
    }

    #[test]
    fn test_each_generation_builds_fresh_services() {
        static BUILT: AtomicU32 = AtomicU32::new(0);

        let context = GenerationContext::builder()
            .factory(
                FactoryBuilder::new("counter", "Counter")
                    .build(|_| Ok(BUILT.fetch_add(1, Ordering::SeqCst)))
                    .unwrap(),
            )
            .build()
            .unwrap();
        let descriptor = ServiceDescriptor::not_parameterized("counter");

        let first = context.generate_as::<u32>(&"Counter".into(), &descriptor).unwrap();
        let second = context.generate_as::<u32>(&"Counter".into(), &descriptor).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(BUILT.load(Ordering::SeqCst), 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_descriptors_load_from_json() {
        let descriptor: ServiceDescriptor = serde_json::from_str(
            r#"{
                "name": "lru",
                "configuration": { "capacity": ["8"] },
                "collaborators": {
                    "store": [{ "name": "file", "configuration": { "path": ["/var/cache"] } }]
                }
            }"#,
        )
        .unwrap();

        let cache = context().generate_as::<Cache>(&"Cache".into(), &descriptor).unwrap();
        assert_eq!(cache.capacity, 8);
        assert_eq!(cache.store.describe(), "file:/var/cache");
    }
}
