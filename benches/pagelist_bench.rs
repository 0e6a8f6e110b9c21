// Page list performance benchmarks.
// Exercises the hot paths an interactive terminal actually drives at
// frame rate: single-row append (grow), trailing-blank scroll, and
// column reflow on a screen with real scrollback behind it.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use termstore::pagelist::resize::ResizeRequest;
use termstore::pagelist::{PointTag, TaggedPoint};
use termstore::PageList;

fn filled_list(cols: u32, rows: u32, scrollback_rows: u32) -> PageList {
    let mut list = PageList::new(cols, rows, None).unwrap();
    for _ in 0..scrollback_rows {
        list.grow().unwrap();
    }
    for y in 0..rows.min(50) {
        for x in 0..cols {
            if let Some(pin) = list.pin(TaggedPoint::new(PointTag::Active, x, y)) {
                list.row_and_cell_mut(pin).unwrap().1.set_codepoint('x' as u32);
            }
        }
    }
    list
}

fn bench_grow(c: &mut Criterion) {
    let mut group = c.benchmark_group("grow");
    for scrollback in [0u32, 10_000] {
        group.bench_with_input(BenchmarkId::new("append_row", scrollback), &scrollback, |b, &sb| {
            b.iter_batched(
                || filled_list(80, 24, sb),
                |mut list| {
                    list.grow().unwrap();
                    black_box(&list);
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_scroll_clear(c: &mut Criterion) {
    c.bench_function("scroll_clear_empty_prompt", |b| {
        b.iter_batched(
            || filled_list(80, 24, 1_000),
            |mut list| {
                list.scroll_clear().unwrap();
                black_box(&list);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_reflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("reflow");
    for scrollback in [0u32, 5_000] {
        group.bench_with_input(BenchmarkId::new("resize_80_to_120", scrollback), &scrollback, |b, &sb| {
            b.iter_batched(
                || filled_list(80, 24, sb),
                |mut list| {
                    list.resize(ResizeRequest { cols: Some(120), rows: None, reflow: true, cursor: None }).unwrap();
                    black_box(&list);
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_verify_integrity(c: &mut Criterion) {
    c.bench_function("verify_integrity_full_screen", |b| {
        b.iter_batched(
            || filled_list(80, 24, 2_000),
            |mut list| {
                list.verify_integrity().unwrap();
                black_box(&list);
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_grow, bench_scroll_clear, bench_reflow, bench_verify_integrity);
criterion_main!(benches);
