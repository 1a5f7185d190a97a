#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(root) = comprobantes::xades::fragments::root_element(s) {
            let _ = comprobantes::xades::fragments::with_namespaces(root);
        }
    }
});
