//! Benchmarks for CRC-32 and the MSB-first bit stream.
//!
//! CRC-32 runs once per archive member during key derivation, over key
//! strings of a few dozen bytes up to the 2 KiB buffer limit, so those sizes
//! are measured alongside a bulk size.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use dxarc_core::bitstream::BitStream;
use dxarc_core::crc::Crc32;
use std::hint::black_box;

fn key_string_like(size: usize) -> Vec<u8> {
    let text = b"DXBDXARC\0MAPDATA.MPSBASICDATA";
    text.iter().copied().cycle().take(size).collect()
}

fn bench_crc32_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32_sizes");

    let sizes = [("9B", 9), ("64B", 64), ("2KB", 2048), ("1MB", 1024 * 1024)];

    for (size_name, size) in sizes {
        let data = key_string_like(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size_name), &data, |b, data| {
            b.iter(|| black_box(Crc32::compute(black_box(data))));
        });
    }

    group.finish();
}

fn bench_bitstream_weights(c: &mut Criterion) {
    // 256 delta-coded weights, the shape of a Huffman header.
    c.bench_function("bitstream_weight_table", |b| {
        b.iter(|| {
            let mut stream = BitStream::new();
            for i in 0..256u64 {
                stream.write(3, i % 8);
                stream.write(1, i & 1);
                stream.write(((i % 8) as u8 + 1) * 2, black_box(i * 37) & 0xFFFF);
            }
            black_box(stream.into_bytes())
        });
    });
}

criterion_group!(benches, bench_crc32_sizes, bench_bitstream_weights);
criterion_main!(benches);
