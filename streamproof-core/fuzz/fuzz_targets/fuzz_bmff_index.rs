#![no_main]

//! Fuzz target for BoxIndex::parse()
//!
//! Demuxes arbitrary bytes as a fragmented MP4 segment, decodes its c2pa box
//! and resolves a few exclusion paths against it.
//!
//! Run with: cargo +nightly fuzz run fuzz_bmff_index

use libfuzzer_sys::fuzz_target;
use streamproof_core::bmff::BoxIndex;

fuzz_target!(|data: &[u8]| {
    let Ok(index) = BoxIndex::parse(data) else {
        return;
    };

    let _ = index.c2pa_box(data);
    for path in ["/uuid", "/moof/mfhd", "/moof/traf[2]/tfhd", "/mdat"] {
        let _ = index.find_by_path(path);
    }
});
