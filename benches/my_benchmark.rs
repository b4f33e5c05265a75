use std::net::Ipv4Addr;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mcrangescan::{
    exclude,
    scanner::targets::{Ipv4Range, is_private_or_reserved},
};

fn criterion_benchmark(c: &mut Criterion) {
    // a /16 that crosses into 10.0.0.0/8
    let range = Ipv4Range::new(Ipv4Addr::new(9, 255, 128, 0), Ipv4Addr::new(10, 0, 127, 255))
        .expect("valid range");

    c.bench_function("windows_filter", |b| {
        b.iter(|| {
            let mut kept = 0;
            for window in range.windows(black_box(500)) {
                kept += window
                    .addresses()
                    .filter(|addr| !is_private_or_reserved(*addr))
                    .count();
            }
            kept
        })
    });

    let exclude_ranges = exclude::parse(
        &(0..10_000u32)
            .map(|i| format!("{}/24\n", Ipv4Addr::from(i << 8)))
            .collect::<String>(),
    )
    .expect("valid exclude list");

    c.bench_function("exclude_contains", |b| {
        b.iter(|| exclude_ranges.contains(black_box(Ipv4Addr::new(0, 20, 1, 1))))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
