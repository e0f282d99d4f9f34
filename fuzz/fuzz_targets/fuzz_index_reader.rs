#![no_main]

use fgi::index::reader::IndexReader;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

// The reader must stop cleanly at any malformed tail and never hand back a
// record whose shape violates the header invariants.
fuzz_target!(|data: &[u8]| {
    if let Ok(Some(mut reader)) = IndexReader::from_reader(Cursor::new(data)) {
        while let Ok(Some(record)) = reader.next_record() {
            assert!(record.header.logsize() <= 16);
            assert_eq!(Some(record.hashes.len()), record.header.hashes_len());
            assert_eq!(record.basename.len(), record.header.basename_len as usize);
        }
    }
});
