//! Benchmarks for the kernel's hot paths.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use doxa::allen::{AllenRelation, compose};
use doxa::kernel::Kernel;
use doxa::truth::Truth;

fn bench_revision(c: &mut Criterion) {
    let a = Truth::new(0.9, 0.8);
    let b = Truth::new(0.4, 0.6);
    c.bench_function("truth_revise", |bench| {
        bench.iter(|| black_box(a.revise(&b)))
    });
}

fn bench_allen_compose(c: &mut Criterion) {
    let relations = [
        AllenRelation::Before,
        AllenRelation::Meets,
        AllenRelation::Overlaps,
        AllenRelation::Starts,
        AllenRelation::During,
        AllenRelation::Finishes,
        AllenRelation::Equals,
        AllenRelation::After,
        AllenRelation::MetBy,
        AllenRelation::OverlappedBy,
        AllenRelation::StartedBy,
        AllenRelation::Contains,
        AllenRelation::FinishedBy,
    ];
    c.bench_function("allen_compose_full_table", |bench| {
        bench.iter(|| {
            for &r1 in &relations {
                for &r2 in &relations {
                    black_box(compose(r1, r2));
                }
            }
        })
    });
}

fn bench_step_throughput(c: &mut Criterion) {
    c.bench_function("kernel_100_steps", |bench| {
        bench.iter(|| {
            let mut kernel = Kernel::with_defaults();
            for i in 0..20 {
                kernel.inheritance(
                    &format!("c{i}"),
                    &format!("c{}", i + 1),
                    Some(Truth::new(1.0, 0.9)),
                );
            }
            black_box(kernel.run(100))
        })
    });
}

criterion_group!(
    benches,
    bench_revision,
    bench_allen_compose,
    bench_step_throughput
);
criterion_main!(benches);
