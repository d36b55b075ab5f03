#![no_main]

use libfuzzer_sys::fuzz_target;
use trackseq::contracts::{DateKey, Prefix, TrackingId};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);

    // Anything that parses must render back to exactly the input
    if let Ok(id) = input.parse::<TrackingId>() {
        assert_eq!(id.to_string(), input);
        assert!(id.counter() >= 1);
    }

    let _ = input.parse::<DateKey>();
    let _ = input.parse::<Prefix>();
});
