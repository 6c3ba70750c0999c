// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for per-job resolution in labelwerk-print: page range
// parsing and predefined paper lookup.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use labelwerk_core::types::MediaSize;
use labelwerk_print::{parse_page_range, resolve_paper};

fn bench_page_range(c: &mut Criterion) {
    let spec = "1-40,45,47-60,3-1,abc,61,62-200";
    c.bench_function("parse_page_range (mixed)", |b| {
        b.iter(|| black_box(parse_page_range(black_box(spec))));
    });
}

fn bench_paper_lookup(c: &mut Criterion) {
    // A driver-sized catalog with the match near the end.
    let mut sizes: Vec<MediaSize> = (0..60)
        .map(|i| MediaSize::new(format!("size {i}"), 800 + i * 10, 1100 + i * 10))
        .collect();
    sizes.push(MediaSize::from_mm("100x150", 100, 150));

    c.bench_function("resolve_paper (61 sizes)", |b| {
        b.iter(|| black_box(resolve_paper(black_box(100), black_box(150), &sizes)));
    });
}

criterion_group!(benches, bench_page_range, bench_paper_lookup);
criterion_main!(benches);
