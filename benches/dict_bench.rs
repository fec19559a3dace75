use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rc_dict::Dict;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert_distinct(c: &mut Criterion) {
    c.bench_function("dict_insert_distinct_10k", |b| {
        let keys: Vec<_> = lcg(1).take(10_000).map(key).collect();
        b.iter_batched(
            || Dict::new().unwrap(),
            |d| {
                for k in &keys {
                    d.insert_str(k).unwrap();
                }
                black_box(d)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_duplicate(c: &mut Criterion) {
    c.bench_function("dict_insert_duplicate", |b| {
        let d = Dict::new().unwrap();
        let keys: Vec<_> = lcg(7).take(1_000).map(key).collect();
        for k in &keys {
            d.insert_str(k).unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            let p = d.insert_str(k).unwrap();
            d.remove(k.as_bytes()).unwrap();
            black_box(p);
        })
    });
}

fn bench_insert_remove_cycle(c: &mut Criterion) {
    c.bench_function("dict_insert_remove_10k", |b| {
        let keys: Vec<_> = lcg(11).take(10_000).map(key).collect();
        let d = Dict::new().unwrap();
        b.iter(|| {
            for k in &keys {
                d.insert_str(k).unwrap();
            }
            for k in &keys {
                d.remove(k.as_bytes()).unwrap();
            }
        })
    });
}

fn bench_interned_clone_drop(c: &mut Criterion) {
    c.bench_function("dict_interned_clone_drop", |b| {
        let d = Dict::new().unwrap();
        let r = d.intern("key").unwrap();
        b.iter(|| {
            let x = r.clone();
            black_box(&x);
            drop(x);
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert_distinct, bench_insert_duplicate, bench_insert_remove_cycle, bench_interned_clone_drop
}
criterion_main!(benches);
