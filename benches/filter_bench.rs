use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tagsieve::encoding::escape_tag_value;
use tagsieve::{RegexpCacheConfig, RegexpCaches, TagFilter, TagFilters};

fn escaped(raw: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    escape_tag_value(&mut buf, raw);
    buf
}

fn bench_filter_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construct");

    for (name, value, is_regexp) in [
        ("literal", "backend-7", false),
        ("or_values", "api(foo|bar|baz)", true),
        ("residual_regexp", "api.*errors", true),
    ] {
        group.bench_function(name, |b| {
            // One warm cache across iterations, as a long-lived engine would hold.
            let caches = RegexpCaches::new(RegexpCacheConfig::default());
            b.iter(|| {
                let tf = TagFilter::new(
                    &caches,
                    black_box(b"prefix"),
                    black_box(b"job"),
                    black_box(value.as_bytes()),
                    false,
                    is_regexp,
                )
                .unwrap();
                black_box(tf);
            })
        });
    }

    group.finish();
}

fn bench_match_suffix(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_suffix");
    let caches = RegexpCaches::new(RegexpCacheConfig::default());

    let literal = TagFilter::new(&caches, b"prefix", b"job", b"backend-7", false, false).unwrap();
    group.bench_function("literal_hit", |b| {
        b.iter(|| literal.match_suffix(black_box(b"")).unwrap())
    });

    let or = TagFilter::new(&caches, b"prefix", b"job", b"api(foo|bar|baz)", false, true).unwrap();
    let or_suffix = escaped(b"baz");
    group.bench_function("or_suffix_hit", |b| {
        b.iter(|| or.match_suffix(black_box(&or_suffix)).unwrap())
    });

    let re = TagFilter::new(&caches, b"prefix", b"job", b"api.*errors", false, true).unwrap();
    let re_suffix = escaped(b"-gateway-errors");
    group.bench_function("residual_regexp", |b| {
        b.iter(|| re.match_suffix(black_box(&re_suffix)).unwrap())
    });

    group.finish();
}

fn bench_filter_set_build(c: &mut Criterion) {
    let caches = Arc::new(RegexpCaches::new(RegexpCacheConfig::default()));
    c.bench_function("tag_filters_add_mixed", |b| {
        b.iter(|| {
            let mut tfs = TagFilters::new(Arc::clone(&caches), b"prefix");
            tfs.add(b"env", b"prod", false, false).unwrap();
            tfs.add(b"job", b"api(foo|bar)", false, true).unwrap();
            tfs.add(b"host", b"web.*", true, true).unwrap();
            tfs.add(b"dc", b"", false, false).unwrap();
            black_box(tfs);
        })
    });
}

criterion_group!(
    benches,
    bench_filter_construction,
    bench_match_suffix,
    bench_filter_set_build
);
criterion_main!(benches);
