#![no_main]
use blockdedup::engine::{self, DedupOptions};
use blockdedup::hash::HashIndex;
use blockdedup::progress::NoProgress;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let block_size = usize::from(data[0] % 16) + 1;
    let payload = &data[1..];
    let split = payload.len() / 2;
    let (base, child) = payload.split_at(split);

    let opts = DedupOptions {
        block_size,
        ..Default::default()
    };
    let index = |d: &[u8]| HashIndex::compute(&mut Cursor::new(d), block_size, &mut NoProgress).unwrap();

    let mut diff = Cursor::new(Vec::new());
    engine::encode(
        &index(base),
        &index(child),
        &mut Cursor::new(child),
        &mut diff,
        &opts,
        &mut NoProgress,
    )
    .unwrap();

    let mut out = Vec::new();
    engine::restore(
        &mut Cursor::new(base),
        &mut Cursor::new(diff.into_inner()),
        &mut out,
        &opts,
        &mut NoProgress,
    )
    .unwrap();
    assert_eq!(out, child);
});
