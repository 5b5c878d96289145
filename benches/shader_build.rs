//! Benchmarks for shader generation and stage compilation.
//!
//! Run with: `cargo bench --bench shader_build`

use compute_particles::gpu::program::resolve_interface;
use compute_particles::gpu::render::{FRAGMENT_SHADER, VERTEX_SHADER};
use compute_particles::gpu::{compile_stage, simulation_shader, ProgramRole, StageKind};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_generate(c: &mut Criterion) {
    c.bench_function("simulation_shader", |b| b.iter(|| black_box(simulation_shader())));
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_stage");
    let compute = simulation_shader();

    group.bench_function("compute", |b| {
        b.iter(|| compile_stage(StageKind::Compute, black_box(&compute)))
    });
    group.bench_function("vertex", |b| {
        b.iter(|| compile_stage(StageKind::Vertex, black_box(VERTEX_SHADER)))
    });
    group.bench_function("fragment", |b| {
        b.iter(|| compile_stage(StageKind::Fragment, black_box(FRAGMENT_SHADER)))
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    c.bench_function("resolve_draw_interface", |b| {
        b.iter_batched(
            || {
                let vertex = compile_stage(StageKind::Vertex, VERTEX_SHADER).ok();
                let fragment = compile_stage(StageKind::Fragment, FRAGMENT_SHADER).ok();
                vertex.into_iter().chain(fragment).collect::<Vec<_>>()
            },
            |stages| resolve_interface(ProgramRole::Draw, &stages),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_generate, bench_compile, bench_resolve);
criterion_main!(benches);
