//! Read-path throughput for both methods this crate understands: STORE
//! (produced by [`fluxzip::writer::ZipWriter`] itself) and DEFLATE
//! (produced by no tool in this crate, since the writer only emits
//! STORE — so the DEFLATE fixture here is hand-assembled the way
//! `tests/zip64_reader.rs` hand-assembles a ZIP64 archive, to exercise
//! the decompression path against a minimal but wire-correct input).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fluxzip::reader::ZipArchive;
use fluxzip::writer::{EntryOptions, ZipWriter};
use std::io::{Read, Write};
use tempfile::NamedTempFile;

fn generate_compressible_data(size: usize) -> Vec<u8> {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn generate_random_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state = 0x1234_5678u32;
    for _ in 0..size {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

fn create_test_zip_store(data: &[u8]) -> NamedTempFile {
    let temp = NamedTempFile::new().unwrap();
    let file = std::fs::File::create(temp.path()).unwrap();
    let mut writer = ZipWriter::new(file);
    writer.start_entry(EntryOptions::new("test.bin")).unwrap();
    writer.write_data(data).unwrap();
    writer.finish().unwrap();
    temp
}

/// Hand-assembles a single-entry DEFLATE archive with no data descriptor
/// (sizes are known upfront, so this skips the streaming protocol
/// entirely): local header, compressed bytes, central directory, EOCD.
fn create_test_zip_deflate(data: &[u8]) -> NamedTempFile {
    let mut compressed = Vec::new();
    {
        let mut encoder = flate2::write::DeflateEncoder::new(&mut compressed, flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap();
    }
    let crc = crc32fast::hash(data);
    let name = b"test.bin";

    let mut blob = Vec::new();
    let local_offset = 0u32;
    blob.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
    blob.extend_from_slice(&20u16.to_le_bytes()); // version needed
    blob.extend_from_slice(&0u16.to_le_bytes()); // flags
    blob.extend_from_slice(&8u16.to_le_bytes()); // method: deflate
    blob.extend_from_slice(&0u16.to_le_bytes()); // time
    blob.extend_from_slice(&0u16.to_le_bytes()); // date
    blob.extend_from_slice(&crc.to_le_bytes());
    blob.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    blob.extend_from_slice(&(data.len() as u32).to_le_bytes());
    blob.extend_from_slice(&(name.len() as u16).to_le_bytes());
    blob.extend_from_slice(&0u16.to_le_bytes()); // extra length
    blob.extend_from_slice(name);
    blob.extend_from_slice(&compressed);

    let cd_offset = blob.len() as u32;
    blob.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
    blob.extend_from_slice(&20u16.to_le_bytes()); // version made by
    blob.extend_from_slice(&20u16.to_le_bytes()); // version needed
    blob.extend_from_slice(&0u16.to_le_bytes()); // flags
    blob.extend_from_slice(&8u16.to_le_bytes()); // method
    blob.extend_from_slice(&0u16.to_le_bytes());
    blob.extend_from_slice(&0u16.to_le_bytes());
    blob.extend_from_slice(&crc.to_le_bytes());
    blob.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    blob.extend_from_slice(&(data.len() as u32).to_le_bytes());
    blob.extend_from_slice(&(name.len() as u16).to_le_bytes());
    blob.extend_from_slice(&0u16.to_le_bytes()); // extra length
    blob.extend_from_slice(&0u16.to_le_bytes()); // comment length
    blob.extend_from_slice(&0u16.to_le_bytes()); // disk start
    blob.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
    blob.extend_from_slice(&0u32.to_le_bytes()); // external attrs
    blob.extend_from_slice(&local_offset.to_le_bytes());
    blob.extend_from_slice(name);
    let cd_size = blob.len() as u32 - cd_offset;

    blob.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    blob.extend_from_slice(&0u16.to_le_bytes());
    blob.extend_from_slice(&0u16.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes());
    blob.extend_from_slice(&cd_size.to_le_bytes());
    blob.extend_from_slice(&cd_offset.to_le_bytes());
    blob.extend_from_slice(&0u16.to_le_bytes());

    let temp = NamedTempFile::new().unwrap();
    std::fs::write(temp.path(), &blob).unwrap();
    temp
}

fn bench_read_compressible_data(c: &mut Criterion) {
    let sizes = vec![100 * 1024, 1024 * 1024, 10 * 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("read_compressible_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = generate_compressible_data(size);

        let zip_store = create_test_zip_store(&data);
        group.bench_function(BenchmarkId::new("store", size), |b| {
            b.iter(|| {
                let bytes = std::fs::read(zip_store.path()).unwrap();
                let archive = ZipArchive::open(&bytes).unwrap();
                for entry in archive.entries() {
                    black_box(archive.read(entry).unwrap());
                }
            });
        });

        let zip_deflate = create_test_zip_deflate(&data);
        group.bench_function(BenchmarkId::new("deflate", size), |b| {
            b.iter(|| {
                let bytes = std::fs::read(zip_deflate.path()).unwrap();
                let archive = ZipArchive::open(&bytes).unwrap();
                for entry in archive.entries() {
                    black_box(archive.read(entry).unwrap());
                }
            });
        });

        group.finish();
    }
}

fn bench_read_random_data(c: &mut Criterion) {
    let sizes = vec![100 * 1024, 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("read_random_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = generate_random_data(size);

        let zip_store = create_test_zip_store(&data);
        group.bench_function(BenchmarkId::new("store", size), |b| {
            b.iter(|| {
                let bytes = std::fs::read(zip_store.path()).unwrap();
                let archive = ZipArchive::open(&bytes).unwrap();
                for entry in archive.entries() {
                    black_box(archive.read(entry).unwrap());
                }
            });
        });

        group.finish();
    }
}

fn bench_read_multiple_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_multiple_entries");

    let entry_count = 100;
    let entry_size = 10 * 1024; // 10KB per entry
    group.throughput(Throughput::Bytes((entry_count * entry_size) as u64));

    let data = generate_compressible_data(entry_size);

    let temp = NamedTempFile::new().unwrap();
    {
        let file = std::fs::File::create(temp.path()).unwrap();
        let mut writer = ZipWriter::new(file);
        for i in 0..entry_count {
            writer.start_entry(EntryOptions::new(format!("file_{i}.txt"))).unwrap();
            writer.write_data(&data).unwrap();
        }
        writer.finish().unwrap();
    }

    group.bench_function("store_100_entries", |b| {
        b.iter(|| {
            let bytes = std::fs::read(temp.path()).unwrap();
            let archive = ZipArchive::open(&bytes).unwrap();
            for entry in archive.entries() {
                black_box(archive.read(entry).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_read_streaming_vs_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_method_comparison");

    let size = 1024 * 1024; // 1MB
    let data = generate_compressible_data(size);
    group.throughput(Throughput::Bytes(size as u64));

    let zip_file = create_test_zip_store(&data);
    let bytes = std::fs::read(zip_file.path()).unwrap();

    group.bench_function("read_raw_then_drain", |b| {
        b.iter(|| {
            let archive = ZipArchive::open(&bytes).unwrap();
            let mut buf = Vec::new();
            for entry in archive.entries() {
                archive.read_raw(entry).unwrap().read_to_end(black_box(&mut buf)).unwrap();
                buf.clear();
            }
        });
    });

    group.bench_function("read_into_vec", |b| {
        b.iter(|| {
            let archive = ZipArchive::open(&bytes).unwrap();
            for entry in archive.entries() {
                let _ = black_box(archive.read(entry).unwrap());
            }
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
    bench_read_compressible_data,
    bench_read_random_data,
    bench_read_multiple_entries,
    bench_read_streaming_vs_full
);
criterion_main!(benches);
