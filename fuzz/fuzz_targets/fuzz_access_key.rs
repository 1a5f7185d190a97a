#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Any key that parses must decode without panicking.
        if let Ok(key) = comprobantes::core::AccessKey::parse(s) {
            let _ = key.fields();
        }
    }
});
