use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fragvault::codec::{join, partition};
use fragvault::recovery::classify;

fn bench_codec(c: &mut Criterion) {
    let block = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVo=".repeat(64);
    let fragments = partition(&block, 4).unwrap();

    c.bench_function("partition_4", |b| b.iter(|| partition(black_box(&block), 4)));
    c.bench_function("join_4", |b| b.iter(|| join(black_box(&fragments))));

    let mut shuffled = fragments.clone();
    shuffled.reverse();
    c.bench_function("join_4_reversed", |b| b.iter(|| join(black_box(&shuffled))));
}

fn bench_classify(c: &mut Criterion) {
    let fragment = partition(&"A".repeat(1024), 4).unwrap()[0].to_wire();
    let targets = r#"["https://a.example.com/restore","https://b.example.com/restore"]"#;

    c.bench_function("classify_fragment", |b| b.iter(|| classify(black_box(&fragment))));
    c.bench_function("classify_targets", |b| b.iter(|| classify(black_box(targets))));
    c.bench_function("classify_hint", |b| b.iter(|| classify(black_box("under the stairs"))));
}

criterion_group!(benches, bench_codec, bench_classify);
criterion_main!(benches);
