#![no_main]
use blockdedup::format::{IndexRecord, RECORD_LEN, read_index_table};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must parse or fail, never panic.
    let Ok(table) = read_index_table(&mut Cursor::new(data)) else {
        return;
    };
    assert_eq!(table.payload_offset, ((table.records.len() + 1) * RECORD_LEN) as u64);
    assert!(table.payload_offset as usize <= data.len());
    assert!(!table.records.contains(&IndexRecord::End));
});
