use anime_downloader_rust::input::parse_episode_range;
use anime_downloader_rust::manifest::parse_master_playlist;
use anime_downloader_rust::quality::sort_variants;
use anime_downloader_rust::QualityNegotiator;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const MASTER_URL: &str = "https://cdn.example/hls/list,abc123/master.m3u8";

fn master_playlist(variants: usize) -> String {
    let heights = [360, 480, 720, 1080, 1440, 2160];
    let mut content = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for i in 0..variants {
        let height = heights[i % heights.len()];
        content.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{},CODECS=\"avc1.640028,mp4a.40.2\"\n{}p/{}/index.m3u8\n",
            height * 2500,
            height * 16 / 9,
            height,
            height,
            i
        ));
    }
    content
}

/// Benchmark master playlist decoding at growing variant counts
fn bench_parse_master(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_master_playlist");
    for variants in [4usize, 16, 64] {
        let content = master_playlist(variants);
        group.bench_with_input(BenchmarkId::from_parameter(variants), &content, |b, content| {
            b.iter(|| parse_master_playlist(black_box(MASTER_URL), black_box(content)))
        });
    }
    group.finish();
}

/// Benchmark menu ordering of parsed variants
fn bench_sort_variants(c: &mut Criterion) {
    let parsed = parse_master_playlist(MASTER_URL, &master_playlist(64)).unwrap_or_default();

    c.bench_function("sort_variants", |b| {
        b.iter(|| {
            let mut variants = parsed.clone();
            sort_variants(black_box(&mut variants));
            variants
        })
    });
}

/// Benchmark preference fallback against a batch-sized variant list
fn bench_resolve_preference(c: &mut Criterion) {
    let parsed = parse_master_playlist(MASTER_URL, &master_playlist(6)).unwrap_or_default();
    let negotiator = QualityNegotiator::new();

    c.bench_function("resolve_missing_preference", |b| {
        b.iter(|| negotiator.resolve(black_box("4320p"), black_box(&parsed)))
    });
}

fn bench_episode_range(c: &mut Criterion) {
    c.bench_function("parse_episode_range", |b| {
        b.iter(|| parse_episode_range(black_box("1-1200")))
    });
}

criterion_group!(
    benches,
    bench_parse_master,
    bench_sort_variants,
    bench_resolve_preference,
    bench_episode_range
);
criterion_main!(benches);
