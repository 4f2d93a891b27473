#![no_main]
use blockdedup::engine::{self, DedupOptions};
use blockdedup::progress::NoProgress;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let block_size = usize::from(data[0] % 32) + 1;
    let payload = &data[1..];
    let split = payload.len() / 2;
    let (base, diff) = payload.split_at(split);

    let opts = DedupOptions {
        block_size,
        ..Default::default()
    };
    let mut out = Vec::new();
    if let Ok(stats) = engine::restore(
        &mut Cursor::new(base),
        &mut Cursor::new(diff),
        &mut out,
        &opts,
        &mut NoProgress,
    ) {
        assert_eq!(stats.output_size, out.len() as u64);
    }
});
