#![no_main]

use libfuzzer_sys::fuzz_target;
use tollgate_ai::extract_json_object;

fuzz_target!(|data: &[u8]| {
    let reply = String::from_utf8_lossy(data);
    if let Some(value) = extract_json_object(&reply) {
        assert!(value.is_object());
    }
});
