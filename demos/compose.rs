//! Composing an application from a descriptor tree, with logging
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example compose --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example compose --features logging-pretty
//! ```
//!
//! `SERVICE_GENERATOR_LOG=service_generator=trace` shows argument resolution too.

use service_generator::prelude::*;

trait Transport: Send + Sync {
    fn endpoint(&self) -> String;
}

struct Tcp {
    host: String,
    port: u16,
}

impl Transport for Tcp {
    fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

struct Unix {
    path: String,
}

impl Transport for Unix {
    fn endpoint(&self) -> String {
        format!("unix://{}", self.path)
    }
}

struct Server {
    name: String,
    listeners: Vec<Arc<Box<dyn Transport>>>,
}

fn transports() -> Result<Vec<Arc<dyn ServiceFactory>>> {
    let tcp = FactoryBuilder::new("tcp", "TcpTransport")
        .parameter_with_default("host", "127.0.0.1")
        .parameter("port")
        .build(|args| {
            Ok(Box::new(Tcp {
                host: args.parameter("host")?.to_string(),
                port: args.parse("port")?,
            }) as Box<dyn Transport>)
        })?;

    let unix = FactoryBuilder::new("unix", "UnixTransport")
        .parameter("path")
        .build(|args| {
            Ok(Box::new(Unix {
                path: args.parameter("path")?.to_string(),
            }) as Box<dyn Transport>)
        })?;

    Ok(vec![Arc::new(tcp), Arc::new(unix)])
}

fn main() {
    #[cfg(feature = "logging")]
    {
        service_generator::logging::init();
    }

    println!("=== Service Generator Demo ===\n");

    let hierarchy = TypeHierarchy::builder()
        .declare("TcpTransport", ["Transport"])
        .declare("UnixTransport", ["Transport"])
        .build()
        .unwrap();

    let context = GenerationContext::builder()
        .hierarchy(hierarchy)
        .module(transports)
        .factory(
            FactoryBuilder::new("server", "Server")
                .parameter("name")
                .roles("listeners", "Transport")
                .build(|args| {
                    Ok(Server {
                        name: args.parameter("name")?.to_string(),
                        listeners: args.collaborators("listeners")?,
                    })
                })
                .unwrap(),
        )
        .build()
        .unwrap();

    println!("Registered services: {:?}", context.service_names());
    for name in context.service_names() {
        for factory in context.describe(name) {
            println!("  {} parameters={:?} roles={:?}", factory.key(), factory.parameters(), factory.roles());
        }
    }

    let descriptor = ServiceDescriptor::builder("server")
        .parameter("name", "api")
        .collaborators(
            "listeners",
            [
                ServiceDescriptor::builder("tcp").parameter("port", "8080").build(),
                ServiceDescriptor::builder("unix").parameter("path", "/run/api.sock").build(),
            ],
        )
        .build();

    let server = context
        .generate_as::<Server>(&"Server".into(), &descriptor)
        .unwrap();
    println!("\nGenerated server {}", server.name);
    for listener in &server.listeners {
        println!("  listening on {}", listener.endpoint());
    }

    // The tcp listener is missing its port
    let broken = ServiceDescriptor::builder("server")
        .parameter("name", "broken")
        .collaborator("listeners", ServiceDescriptor::not_parameterized("tcp"))
        .build();

    match context.generate(&"Server".into(), &broken) {
        Ok(_) => println!("\nUnexpectedly generated the broken server"),
        Err(error) => {
            println!("\nGeneration failed: {error}");
            for (level, key) in error.generation_stack().iter().enumerate() {
                println!("  {level}: {key}");
            }
        }
    }

    println!("\n=== Demo Complete ===");
}
