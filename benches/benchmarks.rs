//! Benchmark suite for dotnet-depgraph
//!
//! Run with: `cargo bench --bench benchmarks`
//! View report: `open target/criterion/report/index.html`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use dotnet_depgraph::cache::sqlite::SqliteCache;
use dotnet_depgraph::cache::MemoryCache;
use dotnet_depgraph::framework::Tfm;
use dotnet_depgraph::registries::PackageMetadata;
use dotnet_depgraph::version::{Version, VersionRange};

// =============================================================================
// Test Data Generation
// =============================================================================

fn sample_metadata(version: &str) -> PackageMetadata {
    PackageMetadata {
        version: version.parse().unwrap(),
        listed: true,
        description: Some("benchmark fixture".to_string()),
        project_url: None,
        license_expression: Some("MIT".to_string()),
        license_url: None,
        authors: None,
        owners: None,
        tags: None,
        deprecated: false,
        published: None,
        dependency_groups: vec![],
    }
}

fn version_strings(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{}.{}.{}", i / 100, (i / 10) % 10, i % 10))
        .collect()
}

// =============================================================================
// Version Parsing Benchmarks
// =============================================================================

fn bench_version_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("version/parse");

    let inputs = [
        "1.0.0",
        "1.2.3.4",
        "1.0.0-beta.1",
        "1.0.0-rc.1+build.123",
        "10.20.30.40-preview.5",
    ];
    for input in inputs {
        group.bench_with_input(BenchmarkId::new("parse", input), input, |b, input| {
            b.iter(|| black_box(input.parse::<Version>()));
        });
    }

    group.finish();
}

fn bench_version_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("version/compare");

    let a: Version = "1.2.3".parse().unwrap();
    let b: Version = "1.2.4-beta.1".parse().unwrap();

    group.bench_function("ord", |bench| {
        bench.iter(|| black_box(a.cmp(black_box(&b))));
    });

    group.finish();
}

// =============================================================================
// Version Range Benchmarks
// =============================================================================

fn bench_range_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("range/parse");

    let inputs = [
        "1.0.0",
        "[1.0.0,2.0.0)",
        "(1.0.0,)",
        "[1.0.0]",
        "[1.0.0,2.0.0)",
    ];
    for input in inputs {
        group.bench_with_input(BenchmarkId::new("parse", input), input, |b, input| {
            b.iter(|| black_box(input.parse::<VersionRange>()));
        });
    }

    group.finish();
}

fn bench_range_intersect(c: &mut Criterion) {
    let mut group = c.benchmark_group("range/intersect");

    let a: VersionRange = "[1.0.0,5.0.0)".parse().unwrap();
    let b: VersionRange = "[2.0.0,8.0.0)".parse().unwrap();

    group.bench_function("overlapping", |bench| {
        bench.iter(|| black_box(a.intersect(black_box(&b))));
    });

    group.finish();
}

fn bench_range_best_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("range/best_match");

    for candidate_count in [10, 100, 1000] {
        let range: VersionRange = "[1.0.0,)".parse().unwrap();
        let candidates: Vec<Version> = version_strings(candidate_count)
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();

        group.bench_with_input(
            BenchmarkId::new("candidates", candidate_count),
            &candidates,
            |b, candidates| {
                b.iter(|| black_box(range.best_match(black_box(candidates))));
            },
        );
    }

    group.finish();
}

// =============================================================================
// Target Framework Benchmarks
// =============================================================================

fn bench_tfm_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("tfm/parse");

    let inputs = [
        "net8.0",
        "netstandard2.0",
        "net472",
        "net8.0-windows10.0.19041",
        "netcoreapp3.1",
    ];
    for input in inputs {
        group.bench_with_input(BenchmarkId::new("parse", input), input, |b, input| {
            b.iter(|| black_box(Tfm::parse(input)));
        });
    }

    group.finish();
}

fn bench_tfm_compatibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("tfm/is_compatible_with");

    let project = Tfm::parse("net8.0").unwrap();
    let dependency = Tfm::parse("netstandard2.0").unwrap();

    group.bench_function("net8.0_accepts_netstandard2.0", |bench| {
        bench.iter(|| black_box(dependency.is_compatible_with(black_box(&project))));
    });

    group.finish();
}

// =============================================================================
// Cache Benchmarks
// =============================================================================

fn bench_memory_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/memory");

    for entry_count in [100, 1000, 10000] {
        let cache = MemoryCache::new();

        for i in 0..entry_count {
            cache.insert(format!("package_{i}"), vec![sample_metadata("1.0.0")]);
        }

        group.bench_with_input(
            BenchmarkId::new("get_hit", entry_count),
            &cache,
            |b, cache| {
                b.iter(|| black_box(cache.get("package_500")));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("get_miss", entry_count),
            &cache,
            |b, cache| {
                b.iter(|| black_box(cache.get("nonexistent_package")));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("insert", entry_count),
            &cache,
            |b, cache| {
                let mut i = entry_count;
                b.iter(|| {
                    cache.insert(format!("new_package_{i}"), vec![sample_metadata("1.0.0")]);
                    i += 1;
                });
            },
        );
    }

    group.finish();
}

fn bench_sqlite_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/sqlite");

    let temp_dir = std::env::temp_dir();
    let db_path = temp_dir.join("dotnet_depgraph_bench_cache.db");
    let _ = std::fs::remove_file(&db_path);

    let cache = SqliteCache::with_path(db_path.clone())
        .expect("failed to create SQLite cache for benchmarks");

    for entry_count in [100, 1000] {
        for i in 0..entry_count {
            cache.insert(format!("package_{i}"), &[sample_metadata("1.0.0")]);
        }

        group.bench_with_input(
            BenchmarkId::new("get_hit", entry_count),
            &entry_count,
            |b, _| {
                b.iter(|| black_box(cache.get("package_500")));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("get_miss", entry_count),
            &entry_count,
            |b, _| {
                b.iter(|| black_box(cache.get("nonexistent_package")));
            },
        );

        let mut insert_counter = entry_count;
        group.bench_with_input(
            BenchmarkId::new("insert", entry_count),
            &entry_count,
            |b, _| {
                b.iter(|| {
                    cache.insert(format!("new_package_{insert_counter}"), &[sample_metadata("1.0.0")]);
                    insert_counter += 1;
                });
            },
        );
    }

    group.finish();

    let _ = std::fs::remove_file(&db_path);
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(
    benches,
    bench_version_parse,
    bench_version_compare,
    bench_range_parse,
    bench_range_intersect,
    bench_range_best_match,
    bench_tfm_parse,
    bench_tfm_compatibility,
    bench_memory_cache,
    bench_sqlite_cache,
);

criterion_main!(benches);
