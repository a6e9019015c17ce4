//! Benchmarks for service generation

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use service_generator::{
    FactoryBuilder, GenerationContext, InputDeclaration, ServiceDescriptor, ServiceType,
    TypeHierarchy,
};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct Leaf {
    value: i64,
}

#[allow(dead_code)]
struct Node {
    children: Vec<Arc<Node>>,
    leaf: Arc<Leaf>,
}

fn hierarchy() -> TypeHierarchy {
    TypeHierarchy::builder()
        .declare("Integer", ["Number"])
        .declare("Double", ["Number"])
        .declare("Number", ["Object"])
        .build()
        .unwrap()
}

fn context() -> GenerationContext {
    GenerationContext::builder()
        .hierarchy(hierarchy())
        .factory(
            FactoryBuilder::new("leaf", "Leaf")
                .parameter_with_default("value", "0")
                .build(|args| Ok(Leaf { value: args.parse("value")? }))
                .unwrap(),
        )
        .factory(
            FactoryBuilder::new("node", "Node")
                .input(
                    InputDeclaration::role("children", "Node")
                        .array()
                        .with_default(Vec::<String>::new()),
                )
                .role_with_default("leaf", "Leaf", "leaf")
                .build(|args| {
                    Ok(Node {
                        children: args.collaborators("children")?,
                        leaf: args.collaborator("leaf")?,
                    })
                })
                .unwrap(),
        )
        .factory(
            FactoryBuilder::new("number", "Integer")
                .build(|_| Ok(1_i64))
                .unwrap(),
        )
        .factory(
            FactoryBuilder::new("number", "Object")
                .build(|_| Ok(()))
                .unwrap(),
        )
        .build()
        .unwrap()
}

/// A complete tree of `node` descriptors
fn tree(depth: usize, fanout: usize) -> ServiceDescriptor {
    let mut builder = ServiceDescriptor::builder("node");
    if depth > 0 {
        builder = builder.collaborators("children", (0..fanout).map(|_| tree(depth - 1, fanout)));
    }
    builder
        .collaborator(
            "leaf",
            ServiceDescriptor::builder("leaf").parameter("value", depth.to_string()).build(),
        )
        .build()
}

fn bench_context(c: &mut Criterion) {
    let mut group = c.benchmark_group("context");

    group.bench_function("build_four_factories", |b| b.iter(|| black_box(context())));

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    let context = context();
    let descriptor = ServiceDescriptor::not_parameterized("number");

    group.bench_function("exact_type", |b| {
        let requested = ServiceType::new("Integer");
        b.iter(|| black_box(context.generate(&requested, &descriptor)))
    });

    group.bench_function("narrowest_of_two", |b| {
        let requested = ServiceType::new("Object");
        b.iter(|| black_box(context.generate(&requested, &descriptor)))
    });

    group.bench_function("any", |b| {
        let requested = ServiceType::any();
        b.iter(|| black_box(context.generate(&requested, &descriptor)))
    });

    group.finish();
}

fn bench_trees(c: &mut Criterion) {
    let mut group = c.benchmark_group("trees");
    let context = context();
    let requested = ServiceType::new("Node");

    for (depth, fanout) in [(1, 4), (3, 3), (6, 2)] {
        let descriptor = tree(depth, fanout);
        let nodes = (0..=depth).map(|level| fanout.pow(level as u32)).sum::<usize>();
        group.throughput(Throughput::Elements(nodes as u64));
        group.bench_with_input(
            BenchmarkId::new("generate", format!("{depth}x{fanout}")),
            &descriptor,
            |b, descriptor| b.iter(|| black_box(context.generate(&requested, descriptor))),
        );
    }

    group.finish();
}

fn bench_failures(c: &mut Criterion) {
    let mut group = c.benchmark_group("failures");
    let context = context();

    group.bench_function("unknown_service", |b| {
        let descriptor = ServiceDescriptor::not_parameterized("missing");
        b.iter(|| black_box(context.generate(&ServiceType::any(), &descriptor)))
    });

    group.bench_function("nested_stack", |b| {
        let descriptor = ServiceDescriptor::builder("node")
            .collaborator(
                "children",
                ServiceDescriptor::builder("node")
                    .collaborator("leaf", ServiceDescriptor::builder("leaf").parameter("value", "x").build())
                    .build(),
            )
            .build();
        let requested = ServiceType::new("Node");
        b.iter(|| black_box(context.generate(&requested, &descriptor).unwrap_err().generation_stack()))
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("shared_context_4_threads", |b| {
        let context = context();
        let descriptor = tree(2, 3);
        let requested = ServiceType::new("Node");

        b.iter(|| {
            thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        for _ in 0..25 {
                            let _ = context.generate(&requested, &descriptor).unwrap();
                        }
                    });
                }
            })
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_context,
    bench_selection,
    bench_trees,
    bench_failures,
    bench_concurrent,
);

criterion_main!(benches);
