//! Benchmarks for compiled-program evaluation throughput.
//!
//! Run with: `cargo bench` in the core/ directory.
//!
//! Benchmark groups:
//! 1. eval_only: repeated evaluation of a pre-compiled program, the
//!    workload the compiler optimizes for
//! 2. compile: building and finalizing the same instruction streams

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use vivace_core::{
    compiler::ProgramBuilder,
    ops,
    symbols::VarTable,
    vm::{Affine, Callable, Evaluator, Program},
};

/// Alternating-variable addition chain `x + y + x + y + ...` with `n`
/// additions. Distinct variables keep the optimizer from collapsing the
/// chain, so instruction count scales with `n`.
fn build_chain(n: usize, vars: &mut VarTable) -> Program {
    let x = vars.define("x", 1.0);
    let y = vars.define("y", 2.0);

    let mut builder = ProgramBuilder::new();
    builder.append_value(Affine::variable(x));
    for i in 0..n {
        let cell = if i % 2 == 0 { y } else { x };
        builder.append_value(Affine::variable(cell));
        builder
            .append_function(Callable::infix("+", ops::add))
            .expect("append failed");
    }
    builder.finalize()
}

/// Benchmark: repeated evaluation with the scratch buffer reused.
fn bench_eval_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval_only");

    for size in [10, 100, 400, 1600] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut vars = VarTable::new();
            let program = build_chain(size, &mut vars);
            let mut evaluator = Evaluator::new(&program);

            b.iter(|| {
                let result = evaluator.eval(black_box(&program), vars.cells_mut());
                black_box(result)
            });
        });
    }

    group.finish();
}

/// Benchmark: compilation cost, building plus finalization.
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for size in [10, 100, 400] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut vars = VarTable::new();
            b.iter(|| black_box(build_chain(size, &mut vars)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_eval_only, bench_compile);
criterion_main!(benches);
