//! Async vs. sync writer throughput, and in-memory vs. file-backed sinks.
//! STORE-only writer, so there's no compression-level axis to vary here
//! (see `write_bench.rs`).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fluxzip::async_writer::ZipWriter as AsyncZipWriter;
use fluxzip::writer::{EntryOptions, ZipWriter};
use tempfile::NamedTempFile;

fn generate_data(size: usize) -> Vec<u8> {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn bench_async_vs_sync(c: &mut Criterion) {
    let sizes = vec![10 * 1024, 100 * 1024, 1024 * 1024, 5 * 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("async_vs_sync_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = generate_data(size);

        group.bench_with_input(BenchmarkId::new("sync", size), &data, |b, data| {
            b.iter(|| {
                let temp = NamedTempFile::new().unwrap();
                let file = std::fs::File::create(temp.path()).unwrap();
                let mut writer = ZipWriter::new(file);
                writer.start_entry(EntryOptions::new("test.bin")).unwrap();
                writer.write_data(black_box(data)).unwrap();
                writer.finish().unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("async", size), &data, |b, data| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            b.iter(|| {
                rt.block_on(async {
                    let temp = NamedTempFile::new().unwrap();
                    let file = tokio::fs::File::create(temp.path()).await.unwrap();
                    let mut writer = AsyncZipWriter::new(file);
                    writer.start_entry(EntryOptions::new("test.bin")).await.unwrap();
                    writer.write_data(black_box(data)).await.unwrap();
                    writer.finish().await.unwrap();
                })
            });
        });

        group.finish();
    }
}

fn bench_async_multiple_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_multiple_entries");

    let entry_count = 50;
    let entry_size = 10 * 1024; // 10KB per entry
    group.throughput(Throughput::Bytes((entry_count * entry_size) as u64));

    let data = generate_data(entry_size);

    group.bench_function("sync_50_entries", |b| {
        b.iter(|| {
            let temp = NamedTempFile::new().unwrap();
            let file = std::fs::File::create(temp.path()).unwrap();
            let mut writer = ZipWriter::new(file);
            for i in 0..entry_count {
                writer.start_entry(EntryOptions::new(format!("file_{i}.txt"))).unwrap();
                writer.write_data(black_box(&data)).unwrap();
            }
            writer.finish().unwrap();
        });
    });

    group.bench_function("async_50_entries", |b| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        b.iter(|| {
            rt.block_on(async {
                let temp = NamedTempFile::new().unwrap();
                let file = tokio::fs::File::create(temp.path()).await.unwrap();
                let mut writer = AsyncZipWriter::new(file);
                for i in 0..entry_count {
                    writer
                        .start_entry(EntryOptions::new(format!("file_{i}.txt")))
                        .await
                        .unwrap();
                    writer.write_data(black_box(&data)).await.unwrap();
                }
                writer.finish().await.unwrap();
            })
        });
    });

    group.finish();
}

fn bench_async_in_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_memory_operations");

    let size = 100 * 1024; // 100KB
    group.throughput(Throughput::Bytes(size as u64));

    let data = generate_data(size);

    group.bench_with_input(BenchmarkId::new("sync_memory", size), &data, |b, data| {
        b.iter(|| {
            let mut writer = ZipWriter::new(Vec::new());
            writer.start_entry(EntryOptions::new("test.bin")).unwrap();
            writer.write_data(black_box(data)).unwrap();
            black_box(writer.finish().unwrap());
        });
    });

    group.bench_with_input(BenchmarkId::new("async_memory", size), &data, |b, data| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        b.iter(|| {
            rt.block_on(async {
                let mut writer = AsyncZipWriter::new(std::io::Cursor::new(Vec::new()));
                writer.start_entry(EntryOptions::new("test.bin")).await.unwrap();
                writer.write_data(black_box(data)).await.unwrap();
                let cursor = writer.finish().await.unwrap();
                black_box(cursor.into_inner());
            })
        });
    });

    group.finish();
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{}MB", bytes / (1024 * 1024))
    }
}

criterion_group!(
    benches,
    bench_async_vs_sync,
    bench_async_multiple_entries,
    bench_async_in_memory
);
criterion_main!(benches);
