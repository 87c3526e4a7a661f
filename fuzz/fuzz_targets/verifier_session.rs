#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use schnorr_auth::{Session, X509Resolver};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut session = Session::verifier(Arc::new(X509Resolver));
    for line in text.lines() {
        let output = session.on_incoming(line);
        for reply in &output.lines {
            assert!(reply.ends_with('\n'));
        }
    }
});
