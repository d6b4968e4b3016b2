use core_history::HistorySearchIndex;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn commands(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("git commit -m 'change {i:04}' --author dev{}", i % 7))
        .collect()
}

fn bench_push(c: &mut Criterion) {
    let values = commands(100);
    c.bench_function("history_push/100_into_cap_50", |b| {
        b.iter_batched(
            || HistorySearchIndex::new(50),
            |mut idx| {
                for v in &values {
                    idx.push(v.as_str());
                }
                black_box(idx.len());
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find(c: &mut Criterion) {
    let mut idx = HistorySearchIndex::new(100);
    for v in commands(100) {
        idx.push(v);
    }
    c.bench_function("history_find/short_pattern", |b| {
        b.iter(|| black_box(idx.find(black_box("dev3")).len()))
    });
    c.bench_function("history_find/miss", |b| {
        b.iter(|| black_box(idx.find(black_box("zzz")).len()))
    });
}

criterion_group!(benches, bench_push, bench_find);
criterion_main!(benches);
