//! Benchmarks for the hot paths of the reactive runtime: wrapper reads,
//! trigger fan-out, and computed cache hits.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_core::{Computed, Effect, Obj, Reactive};

fn bench_wrapper_read(c: &mut Criterion) {
    let obj = Obj::new();
    obj.set("a", 1);
    let state = Reactive::new(obj);

    // No active observer, so this is the untracked fast path.
    c.bench_function("wrapper_read_untracked", |b| {
        b.iter(|| black_box(state.get("a")))
    });
}

fn bench_trigger_fan_out(c: &mut Criterion) {
    let obj = Obj::new();
    obj.set("a", 0i64);
    let state = Reactive::new(obj);

    let effects: Vec<Effect> = (0..10)
        .map(|_| {
            let state = state.clone();
            Effect::new(move || {
                black_box(state.get("a"));
            })
        })
        .collect();

    let mut next = 0i64;
    c.bench_function("trigger_10_subscribers", |b| {
        b.iter(|| {
            next += 1;
            state.set("a", next);
        })
    });

    for effect in &effects {
        effect.stop();
    }
}

fn bench_computed_cache_hit(c: &mut Criterion) {
    let obj = Obj::new();
    obj.set("a", 1);
    let state = Reactive::new(obj);

    let computed = {
        let state = state.clone();
        Computed::new(move || state.get("a").as_int().unwrap_or(0) + 1)
    };
    computed.get();

    c.bench_function("computed_cache_hit", |b| b.iter(|| black_box(computed.get())));
}

criterion_group!(
    benches,
    bench_wrapper_read,
    bench_trigger_fan_out,
    bench_computed_cache_hit
);
criterion_main!(benches);
