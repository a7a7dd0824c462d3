//! Compile and execution benchmarks for the two code generators.
//!
//! - Compilation: direct emitter vs. TAC with and without passes
//! - Execution: the same programs run from each pipeline's bytecode

use std::hint::black_box;
use std::rc::Rc;

use criterion::{Criterion, criterion_group, criterion_main};
use ember_engine::{Engine, EngineConfig, OptimizationPasses, Pipeline, Vm};

const FIB: &str = "
    function fib(n) {
        if (n < 2) return n;
        return fib(n - 1) + fib(n - 2);
    }
    fib(18)
";

const LOOPS: &str = "
    var total = 0;
    for (var i = 0; i < 2000; i++) {
        total += i * 0 + i % 7;
        if (total > 100000) { total = 0; }
    }
    total
";

const OBJECTS: &str = "
    function Point(x, y) { this.x = x; this.y = y; }
    var points = [];
    for (var i = 0; i < 200; i++) { points.push(new Point(i, i + 1)); }
    var sum = 0;
    for (var j = 0; j < points.length; j++) { sum += points[j].x + points[j].y; }
    sum
";

fn configs() -> [(&'static str, EngineConfig); 3] {
    [
        ("direct", EngineConfig::default().with_pipeline(Pipeline::Direct)),
        (
            "tac",
            EngineConfig::default()
                .with_pipeline(Pipeline::Tac)
                .with_passes(OptimizationPasses::none()),
        ),
        (
            "tac_optimized",
            EngineConfig::default()
                .with_pipeline(Pipeline::Tac)
                .with_passes(OptimizationPasses::all()),
        ),
    ]
}

fn compile_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (name, config) in configs() {
        let engine = Engine::with_config(config);
        group.bench_function(name, |b| {
            b.iter(|| {
                let code = engine.compile(black_box(OBJECTS)).unwrap();
                black_box(code.len())
            });
        });
    }
    group.finish();
}

fn execute_benchmarks(c: &mut Criterion) {
    for (program, source) in [("fib", FIB), ("loops", LOOPS), ("objects", OBJECTS)] {
        let mut group = c.benchmark_group(format!("execute/{}", program));
        for (name, config) in configs() {
            let code = Rc::new(Engine::with_config(config).compile(source).unwrap());
            group.bench_function(name, |b| {
                b.iter(|| {
                    let mut vm = Vm::new();
                    black_box(vm.execute(code.clone()).unwrap())
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, compile_benchmarks, execute_benchmarks);
criterion_main!(benches);
