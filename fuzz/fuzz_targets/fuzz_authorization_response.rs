#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(response) = comprobantes::sri::soap::parse_authorization_response(s) {
            let _ = comprobantes::sri::ProtocolRejection::from_authorization(&response);
        }
    }
});
