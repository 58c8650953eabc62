use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kunquat_sheet::sheet::BEAT;
use kunquat_sheet::view::SheetStyle;
use kunquat_sheet::view::ruler::render_column_tile;
use kunquat_sheet::view::tile_cache::TileCache;
use kunquat_sheet::{Column, ColumnId, Tstamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

fn filled_column(rows: usize) -> Column {
    let mut rng = StdRng::seed_from_u64(7);
    let mut column = Column::new(ColumnId::Channel(0));
    for _ in 0..rows {
        let ts = Tstamp::new(rng.gen_range(0..256), rng.gen_range(0..BEAT as i64));
        let _ = column.insert(ts, "n+", &[json!(rng.gen_range(-2400..2400))]);
    }
    column
}

/// Visible-row queries, as done once per painted column
fn bench_column_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_range");

    for &rows in &[64, 1024, 16384] {
        let column = filled_column(rows);
        group.bench_with_input(BenchmarkId::new("one_screen", rows), &column, |b, column| {
            b.iter(|| {
                let count = column
                    .iter_range(Tstamp::from_beats(100), Tstamp::from_beats(108))
                    .count();
                black_box(count)
            });
        });
    }

    group.finish();
}

/// Scrolling through a long pattern with a warm and a cold tile cache
fn bench_tile_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile_cache");
    let style = SheetStyle::default();

    group.bench_function("scroll_warm", |b| {
        let mut cache = TileCache::new(64 << 20);
        cache.set_geometry(128, 64.0);
        let mut y = 0.0;
        b.iter(|| {
            let range = cache.range(y, y + 600.0, |key, pixmap| {
                render_column_tile(key, pixmap, &style.colours)
            });
            black_box(range.pieces.len());
            y = (y + 7.0) % 4096.0;
        });
    });

    group.bench_function("zoom_flush", |b| {
        let mut cache = TileCache::new(64 << 20);
        let mut zoom = 32.0;
        b.iter(|| {
            zoom = if zoom > 200.0 { 32.0 } else { zoom + 8.0 };
            cache.set_geometry(128, zoom);
            let range = cache.range(0.0, 600.0, |key, pixmap| {
                render_column_tile(key, pixmap, &style.colours)
            });
            black_box(range.pieces.len());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_column_range, bench_tile_cache);
criterion_main!(benches);
