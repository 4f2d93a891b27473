use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use blockdedup::engine::{self, DedupOptions};
use blockdedup::hash::{BlockHash, HashIndex};
use blockdedup::progress::NoProgress;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::fs;
use std::io::Cursor;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut out = vec![0u8; size];
    StdRng::seed_from_u64(seed).fill_bytes(&mut out);
    out
}

/// Overwrite roughly `fraction` of the blocks with fresh random bytes.
fn mutate_blocks(base: &[u8], block_size: usize, fraction: f64, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = base.to_vec();
    for chunk in out.chunks_mut(block_size) {
        if rng.random_bool(fraction) {
            rng.fill_bytes(chunk);
        }
    }
    out
}

fn opts(block_size: usize) -> DedupOptions {
    DedupOptions {
        block_size,
        ..Default::default()
    }
}

fn index(data: &[u8], block_size: usize) -> HashIndex {
    HashIndex::compute(&mut Cursor::new(data), block_size, &mut NoProgress).unwrap()
}

fn encode_diff(base: &HashIndex, child_index: &HashIndex, child: &[u8], block_size: usize) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    engine::encode(
        base,
        child_index,
        &mut Cursor::new(child),
        &mut out,
        &opts(block_size),
        &mut NoProgress,
    )
    .unwrap();
    out.into_inner()
}

fn write_size_snapshot() {
    let block_size = 4096;
    let base = gen_data(4 * 1024 * 1024, 123);
    let base_index = index(&base, block_size);
    let mut csv = String::from("changed_fraction,diff_bytes,child_bytes,ratio\n");
    for pct in [0u32, 1, 5, 10, 25, 50, 100] {
        let child = mutate_blocks(&base, block_size, pct as f64 / 100.0, pct as u64);
        let diff = encode_diff(&base_index, &index(&child, block_size), &child, block_size);
        let ratio = diff.len() as f64 / child.len() as f64;
        csv.push_str(&format!("{pct},{},{},{ratio}\n", diff.len(), child.len()));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("diff_size_snapshot.csv"), csv);
}

fn bench_hashing_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("hashing_speed_mb_s");
    let data = gen_data(8 * 1024 * 1024, 1);
    for block_size in [4 * 1024usize, 64 * 1024, 1024 * 1024] {
        g.throughput(Throughput::Bytes(data.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(block_size), &block_size, |b, bs| {
            b.iter(|| black_box(index(black_box(&data), *bs)));
        });
    }
    g.finish();
}

fn bench_digest(c: &mut Criterion) {
    let block = gen_data(64 * 1024, 9);
    let mut g = c.benchmark_group("block_digest");
    g.throughput(Throughput::Bytes(block.len() as u64));
    g.bench_function("sha256_64k", |b| {
        b.iter(|| black_box(BlockHash::of(black_box(&block))));
    });
    g.finish();
}

fn bench_diff_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("diff_speed_vs_change");
    let block_size = 4096;
    let base = gen_data(8 * 1024 * 1024, 2);
    let base_index = index(&base, block_size);
    for pct in [1u32, 10, 50] {
        let child = mutate_blocks(&base, block_size, pct as f64 / 100.0, 7);
        let child_index = index(&child, block_size);
        g.throughput(Throughput::Bytes(child.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(pct), &pct, |b, _| {
            b.iter(|| {
                black_box(encode_diff(&base_index, &child_index, black_box(&child), block_size))
            });
        });
    }
    g.finish();
}

fn bench_restore_speed(c: &mut Criterion) {
    write_size_snapshot();
    let mut g = c.benchmark_group("restore_speed_mb_s");
    let block_size = 4096;
    let base = gen_data(8 * 1024 * 1024, 3);
    let base_index = index(&base, block_size);
    for pct in [1u32, 10, 50] {
        let child = mutate_blocks(&base, block_size, pct as f64 / 100.0, 11);
        let diff = encode_diff(&base_index, &index(&child, block_size), &child, block_size);
        g.throughput(Throughput::Bytes(child.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(pct), &pct, |b, _| {
            b.iter(|| {
                let mut out = Vec::with_capacity(child.len());
                engine::restore(
                    &mut Cursor::new(&base),
                    &mut Cursor::new(&diff),
                    &mut out,
                    &opts(block_size),
                    &mut NoProgress,
                )
                .unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_index_lookup(c: &mut Criterion) {
    let mut g = c.benchmark_group("hash_index_lookup");
    for blocks in [1usize << 12, 1 << 16, 1 << 18] {
        let idx: HashIndex = (0..blocks as u64)
            .map(|i| BlockHash::of(&i.to_le_bytes()))
            .collect();
        let probe = BlockHash::of(&((blocks / 2) as u64).to_le_bytes());
        g.bench_with_input(BenchmarkId::from_parameter(blocks), &blocks, |b, _| {
            b.iter(|| black_box(idx.first_index(black_box(&probe))));
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_hashing_speed,
    bench_digest,
    bench_diff_speed,
    bench_restore_speed,
    bench_index_lookup
);
criterion_main!(benches);
