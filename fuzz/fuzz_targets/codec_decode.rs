#![no_main]

use libfuzzer_sys::fuzz_target;
use schnorr_auth::protocol::{decode, encode};

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(event) = decode(line) {
        // Whatever decodes must encode to a single line.
        let encoded = encode(&event);
        assert_eq!(encoded.matches('\n').count(), 1);
    }
});
