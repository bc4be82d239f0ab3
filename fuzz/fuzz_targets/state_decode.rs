#![no_main]

use std::collections::HashMap;

use deriva::detector::DetectorState;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Interpret arbitrary bytes as a JSON field map and decode it.
    // Decoding must return an error for malformed input, never panic.
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(fields) = serde_json::from_str::<HashMap<String, String>>(input) {
            let _ = DetectorState::from_field_map(&fields);
        }
    }
});
