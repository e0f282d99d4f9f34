#![no_main]

use fgi::index::types::MAX_HASHES_SIZE;
use fgi::utils::fingerprint::{Fingerprint, MIN_SIZE};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

// Any input must produce a table whose size is a power of two within the
// fold bounds, with a noise fraction in [0, 1].
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let accuracy = data[0] % 10;
    let fp = Fingerprint::scan(&mut Cursor::new(&data[1..]), accuracy, false).unwrap();
    let size = fp.size();
    assert!(
        size == 0 || (size.is_power_of_two() && (MIN_SIZE..=MAX_HASHES_SIZE).contains(&size))
    );
    assert!((0.0..=1.0).contains(&fp.noise));
});
