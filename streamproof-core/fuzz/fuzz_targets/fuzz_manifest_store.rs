#![no_main]

//! Fuzz target for ManifestStore::from_bytes()
//!
//! Parses arbitrary bytes as a JUMBF manifest store and walks every manifest
//! it resolves. Malformed input must surface as an error, never a panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_manifest_store

use libfuzzer_sys::fuzz_target;
use streamproof_core::ManifestStore;

fuzz_target!(|data: &[u8]| {
    let Ok(store) = ManifestStore::from_bytes(data) else {
        return;
    };

    for manifest in store.resolve_manifests() {
        let _ = manifest.manifest_type();
        if let Ok(claim) = manifest.resolve_claim() {
            for assertion in &claim.assertions {
                let _ = store.resolve_box_bytes(&assertion.url);
            }
        }
        let _ = manifest.resolve_content_assertion("fuzz");
    }
});
